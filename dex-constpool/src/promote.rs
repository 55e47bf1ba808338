//! C7: the constant promoter.
//!
//! Runs once per method, after the type solver (C6) has produced
//! concrete destination types. Converts each untyped numeric-constant
//! opcode into a class-constant-pool reference (choosing int/float for
//! 32-bit constants and long/double for 64-bit ones based on the now-
//! solved destination type) and expands a `fill-array-data` payload's
//! raw words into one constant-pool reference per element. Net-new
//! against `dex-ir::IrInsn`/`dex-constpool::ConstantPool`; the promotion
//! *policy* (which pool kind a destination type selects) is structural,
//! not ported line-by-line from one original file.

use dex_ir::{IrInsn, InsnData, Kind, MethodBody, Opcode};
use crate::pool::ConstantPool;

/// Promotes every still-unpromoted numeric constant in `body`, using
/// `pool` to intern the resulting constant-pool entries. Idempotent
/// (SPEC_FULL.md §8 property 9): an instruction whose `reference` is
/// already `Some(_)` is left untouched, so running this twice on the
/// same body is a no-op the second time.
pub fn promote_constants(body: &mut MethodBody, pool: &mut ConstantPool) {
	for id in body.ids().collect::<Vec<_>>() {
		let insn = body.get(id);
		if insn.reference.is_some() {
			continue;
		}

		match insn.opcode {
			Opcode::Const32 => {
				let Some(word) = const32_word(insn) else { continue };
				let is_float = insn.destination.as_ref().is_some_and(|op| matches!(op.ty.kind, Kind::Float));
				let r = if is_float {
					pool.put_float(f32::from_bits(word as u32))
				} else {
					pool.put_integer(word)
				};
				body.get_mut(id).reference = Some(r);
			},
			Opcode::Const64 => {
				let Some(word) = const64_word(insn) else { continue };
				let is_double = insn.destination.as_ref().is_some_and(|op| matches!(op.ty.kind, Kind::Double));
				let r = if is_double {
					pool.put_double(f64::from_bits(word as u64))
				} else {
					pool.put_long(word)
				};
				body.get_mut(id).reference = Some(r);
			},
			Opcode::FillArrayData => {
				promote_fill_array_data(body, pool, id);
			},
			_ => {},
		}
	}
}

fn const32_word(insn: &IrInsn) -> Option<i32> {
	match insn.data {
		InsnData::Const32(word) => Some(word),
		_ => None,
	}
}

fn const64_word(insn: &IrInsn) -> Option<i64> {
	match insn.data {
		InsnData::Const64(word) => Some(word),
		_ => None,
	}
}

/// A promoted `fill-array-data` payload doesn't fit in a single
/// `PoolRef` (it names one array element per word), so the per-element
/// references are written back into `InsnData::FillArrayData::refs`
/// rather than `IrInsn::reference`. `reference` is still set, to the
/// first element's ref, purely as the "already promoted" marker
/// `promote_constants` checks before re-running this function.
fn promote_fill_array_data(body: &mut MethodBody, pool: &mut ConstantPool, id: dex_ir::IrInsnId) {
	let insn = body.get(id);
	let (element_width, words) = match &insn.data {
		InsnData::FillArrayData { element_width, words, .. } => (*element_width, words.clone()),
		_ => return,
	};
	let array_ty = insn.sources.first().map(|op| op.ty.clone());

	let refs: Vec<_> = words.iter().map(|&word| {
		match array_ty.as_ref().map(|t| &t.kind) {
			Some(Kind::Float) if element_width == 4 => pool.put_float(f32::from_bits(word as u32)),
			Some(Kind::Double) if element_width == 8 => pool.put_double(f64::from_bits(word as u64)),
			_ if element_width == 8 => pool.put_long(word),
			_ => pool.put_integer(word as i32),
		}
	}).collect();

	let insn = body.get_mut(id);
	insn.reference = refs.first().copied();
	insn.data = InsnData::FillArrayData { element_width, words, refs };
}

#[cfg(test)]
mod tests {
	use super::*;
	use dex_ir::{IrInsn, MethodBody, Operand, Type};
	use pretty_assertions::assert_eq;

	#[test]
	fn const32_promotes_to_int_by_default() {
		let mut body = MethodBody::new(2, 0);
		let mut insn = IrInsn::new(Opcode::Const32, 0).with_destination(Operand::new(0, Type::scalar(Kind::Int)));
		insn.data = InsnData::Const32(7);
		body.push(insn);
		body.push(IrInsn::new(Opcode::Nop, 1));

		let mut pool = ConstantPool::new();
		promote_constants(&mut body, &mut pool);

		assert!(body.get(dex_ir::IrInsnId(0)).reference.is_some());
		assert_eq!(pool.len(), 1);
	}

	#[test]
	fn const32_promotes_to_float_when_destination_is_float() {
		let mut body = MethodBody::new(2, 0);
		let mut insn = IrInsn::new(Opcode::Const32, 0).with_destination(Operand::new(0, Type::scalar(Kind::Float)));
		insn.data = InsnData::Const32(1_065_353_216); // bits of 1.0f32
		body.push(insn);

		let mut pool = ConstantPool::new();
		promote_constants(&mut body, &mut pool);

		match pool.iter().next() {
			Some((_, crate::pool::ConstantPoolEntry::Float(bits))) => assert_eq!(*bits, 1_065_353_216u32),
			other => panic!("expected a Float entry, got {other:?}"),
		}
	}

	#[test]
	fn fill_array_data_gets_a_pool_ref_per_element() {
		let mut body = MethodBody::new(2, 0);
		let mut insn = IrInsn::new(Opcode::FillArrayData, 0);
		insn.sources = vec![Operand::new(0, Type::new(Kind::Int, 1))];
		insn.data = InsnData::FillArrayData { element_width: 4, words: vec![1, 2, 3], refs: Vec::new() };
		body.push(insn);

		let mut pool = ConstantPool::new();
		promote_constants(&mut body, &mut pool);

		match &body.get(dex_ir::IrInsnId(0)).data {
			InsnData::FillArrayData { words, refs, .. } => {
				assert_eq!(refs.len(), words.len());
				assert_eq!(pool.len(), 3);
			},
			other => panic!("expected FillArrayData, got {other:?}"),
		}
	}

	#[test]
	fn running_twice_is_a_no_op() {
		let mut body = MethodBody::new(2, 0);
		let mut insn = IrInsn::new(Opcode::Const32, 0).with_destination(Operand::new(0, Type::scalar(Kind::Int)));
		insn.data = InsnData::Const32(7);
		body.push(insn);

		let mut pool = ConstantPool::new();
		promote_constants(&mut body, &mut pool);
		let len_after_first = pool.len();
		promote_constants(&mut body, &mut pool);
		assert_eq!(pool.len(), len_after_first);
	}
}
