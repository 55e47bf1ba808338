//! C4: the decoder proper.
//!
//! Walks a [`RawMethodBody`]'s code-unit stream once, dispatching each
//! instruction through the fixed per-opcode schema of SPEC_FULL.md §4.3.
//! Grounded on `original_source/dare/decompiler/src/tyde/tyde_instruction.cpp`'s
//! `FromCode` family of per-opcode constructors, re-cast from "one C++
//! constructor per opcode, called from a giant switch" into one Rust match
//! arm per [`dex_ir::Opcode`] family here.
//!
//! Offsets: every real instruction's `original_offset` is its raw
//! code-unit position plus one; the synthetic leading sentinel `nop` sits
//! at offset `0`, and the trailing sentinel sits at `code_units.len() + 1`.
//! This shift buys two things at once: offsets stay strictly ascending (so
//! [`dex_ir::MethodBody::find_by_original_offset`]'s binary search has a
//! unique key to find) and a branch or try-range boundary that lands
//! exactly at the end of the raw stream resolves to the trailing sentinel
//! without a special case.

use std::collections::HashMap;

use thiserror::Error;

use dex_constpool::ConstantPool;
use dex_ir::{IrInsn, IrInsnId, InsnData, Kind, MethodBody, Opcode, Operand, Register, Type};
use dex_verify::MethodVerification;

use crate::opcodes::{self, Format, RawOperands};
use crate::payload;
use crate::raw::RawMethodBody;
use crate::resolver::ReferenceResolver;

/// The one seam with a typed error (SPEC_FULL.md §7); every other boundary
/// in this pipeline reports through `anyhow::Result`.
#[derive(Debug, Error)]
pub enum DecodeError {
	#[error("unknown or unused opcode byte {byte:#04x} at offset {offset}")]
	UnknownOpcode { byte: u8, offset: u32 },
	#[error("instruction stream truncated at offset {offset}: needs {needed} more code units")]
	TruncatedStream { offset: u32, needed: u32 },
	#[error("malformed {kind} payload at offset {offset}: {message}")]
	MalformedPayload { kind: &'static str, offset: u32, message: String },
	#[error("offset {offset} does not fall within the method's code-unit stream")]
	OffsetOutOfRange { offset: u32 },
}

/// The two per-method seed lists C6 consumes (SPEC_FULL.md's "Ambiguity
/// seeds" section): registers used, or defined, through a type-ambiguous
/// opcode.
#[derive(Debug, Default, Clone)]
pub struct AmbiguitySeeds {
	pub ambiguous_sources: Vec<(IrInsnId, Register)>,
	pub ambiguous_destinations: Vec<(IrInsnId, Register)>,
}

/// What decoding one method produced.
pub struct DecodeOutput {
	pub body: MethodBody,
	pub seeds: AmbiguitySeeds,
	/// `false` when the verifier map marked the whole method as failing;
	/// downstream phases (C5/C6/C7) should skip a body whose
	/// `translation_needed` is `false`.
	pub translation_needed: bool,
}

const CONST32_AMBIGUOUS_ZERO: Kind = Kind::TrioUnknown;

/// Decodes one method body. `resolver` stands in for the raw `.dex`
/// container's own constant pool (SPEC_FULL.md §1's external
/// collaborator); `pool` is the translation unit's own class-level
/// constant pool, shared by every method of the class, used here to
/// intern string/class/field/method references at the point they're first
/// seen (numeric constants are deferred to C7, see SPEC_FULL.md §4.6).
pub fn decode_method(
	raw: &RawMethodBody,
	resolver: &impl ReferenceResolver,
	pool: &mut ConstantPool,
	verification: Option<&MethodVerification>,
) -> Result<DecodeOutput, DecodeError> {
	let code_len = raw.code_units.len() as u32;
	let mut body = MethodBody::new(raw.num_registers, raw.num_incoming_args);
	let mut seeds = AmbiguitySeeds::default();

	body.push(IrInsn::new(Opcode::Nop, 0));

	if matches!(verification, Some(MethodVerification::WholeMethodFails)) {
		let mut insn = IrInsn::new(Opcode::VerifyError, 1);
		insn.data = InsnData::VerifyError { descriptor: dex_verify::ErrorKind::Generic.descriptor(), whole_method: true };
		body.push(insn);
		body.push(IrInsn::new(Opcode::Nop, code_len + 1));
		return Ok(DecodeOutput { body, seeds, translation_needed: false });
	}

	let per_offset_errors: HashMap<u32, dex_verify::ErrorKind> = match verification {
		Some(MethodVerification::Instructions(list)) => list.iter().copied().collect(),
		_ => HashMap::new(),
	};

	let mut pc: u32 = 0;
	let mut force_next_move_result_nop = false;
	let mut pending_result_type: Option<Type> = None;

	while pc < code_len {
		let raw_offset = pc;
		let shifted_offset = raw_offset + 1;
		let byte = (raw.code_units[pc as usize] & 0xff) as u8;

		if let Some(kind) = per_offset_errors.get(&raw_offset).copied() {
			let (_, format) = opcodes::opcode_info(byte).ok_or(DecodeError::UnknownOpcode { byte, offset: raw_offset })?;
			let mut insn = IrInsn::new(Opcode::VerifyError, shifted_offset);
			insn.data = InsnData::VerifyError { descriptor: kind.descriptor(), whole_method: false };
			body.push(insn);
			force_next_move_result_nop = true;
			pending_result_type = None;
			pc += format.width();
			continue;
		}

		let (opcode, format) = opcodes::opcode_info(byte).ok_or(DecodeError::UnknownOpcode { byte, offset: raw_offset })?;
		let width = format.width();
		if pc + width > code_len {
			return Err(DecodeError::TruncatedStream { offset: raw_offset, needed: width });
		}

		if force_next_move_result_nop {
			force_next_move_result_nop = false;
			if opcode.is_move_result() {
				body.push(IrInsn::new(Opcode::Nop, shifted_offset));
				pc += width;
				continue;
			}
		}

		let ops = opcodes::decode_operands(&raw.code_units, pc as usize, format);

		let next_pc = pc + width;
		let next_is_move_result = next_pc < code_len
			&& opcodes::opcode_info((raw.code_units[next_pc as usize] & 0xff) as u8)
				.is_some_and(|(op, _)| op.is_move_result());

		let (id, next_pending) = decode_one(
			&mut body,
			&mut seeds,
			raw,
			resolver,
			pool,
			byte,
			opcode,
			&ops,
			shifted_offset,
			raw_offset,
			next_is_move_result,
			pending_result_type.take(),
		)?;
		let _ = id;
		pending_result_type = next_pending;

		pc += width;
	}

	body.push(IrInsn::new(Opcode::Nop, code_len + 1));

	Ok(DecodeOutput { body, seeds, translation_needed: true })
}

fn is_ambiguous_kind(kind: &Kind) -> bool {
	matches!(kind,
		Kind::Unknown | Kind::TrioUnknown | Kind::FiUnknown | Kind::DlUnknown |
		Kind::AfiUnknown | Kind::AdlUnknown | Kind::AcsUnknown | Kind::AobjectUnknown)
}

/// Pushes `insn` and registers any ambiguous operand automatically. A few
/// opcodes (aget-object/aput-object's component register, fill-array-data
/// whose resolved width is concretely `byte`) need an ambiguity seed even
/// though their assigned [`Kind`] isn't itself one of the tags this
/// function recognizes; those callers push the extra seed themselves
/// after calling this (duplicate seeds are harmless — SPEC_FULL.md §4.5
/// dedups constraint-graph nodes by identity tuple).
fn finish(body: &mut MethodBody, seeds: &mut AmbiguitySeeds, insn: IrInsn) -> IrInsnId {
	let id = body.push(insn);
	let inserted = body.get(id);
	for src in &inserted.sources {
		if is_ambiguous_kind(&src.ty.kind) {
			seeds.ambiguous_sources.push((id, src.register));
		}
	}
	if let Some(dst) = &inserted.destination {
		if is_ambiguous_kind(&dst.ty.kind) {
			seeds.ambiguous_destinations.push((id, dst.register));
		}
	}
	id
}

fn decode_const32_bits(byte: u8, ops: &RawOperands) -> i32 {
	if byte == 0x15 {
		// const/high16: raw 16-bit pattern goes in the high half.
		((ops.imm as u32) << 16) as i32
	} else {
		ops.imm as i32
	}
}

fn decode_const64_bits(byte: u8, ops: &RawOperands) -> i64 {
	if byte == 0x19 {
		// const-wide/high16: raw 16-bit pattern goes in the high 16 bits.
		((ops.imm as u64) << 48) as i64
	} else if byte == 0x18 {
		ops.imm64
	} else {
		ops.imm
	}
}

#[allow(clippy::too_many_arguments)]
fn decode_one(
	body: &mut MethodBody,
	seeds: &mut AmbiguitySeeds,
	raw: &RawMethodBody,
	resolver: &impl ReferenceResolver,
	pool: &mut ConstantPool,
	byte: u8,
	opcode: Opcode,
	ops: &RawOperands,
	original_offset: u32,
	raw_pc: u32,
	next_is_move_result: bool,
	pending_result_type: Option<Type>,
) -> Result<(IrInsnId, Option<Type>), DecodeError> {
	let mut insn = IrInsn::new(opcode, original_offset);
	let mut next_pending: Option<Type> = None;

	match opcode {
		Opcode::Nop | Opcode::MoveException => {
			if opcode == Opcode::MoveException {
				insn.destination = Some(Operand::new(ops.regs[0], Type::scalar(Kind::NonArrayObject)));
			}
		},

		Opcode::Move => {
			insn.sources = vec![Operand::new(ops.regs[1], Type::scalar(Kind::FiUnknown))];
			insn.destination = Some(Operand::new(ops.regs[0], Type::scalar(Kind::FiUnknown)));
		},
		Opcode::MoveWide => {
			insn.sources = vec![Operand::new(ops.regs[1], Type::scalar(Kind::DlUnknown))];
			insn.destination = Some(Operand::new(ops.regs[0], Type::scalar(Kind::DlUnknown)));
		},
		Opcode::MoveObject => {
			insn.sources = vec![Operand::new(ops.regs[1], Type::scalar(Kind::BottomObject))];
			insn.destination = Some(Operand::new(ops.regs[0], Type::scalar(Kind::BottomObject)));
		},

		Opcode::MoveResult | Opcode::MoveResultWide | Opcode::MoveResultObject => {
			let ty = pending_result_type.unwrap_or_else(Type::unknown);
			insn.destination = Some(Operand::new(ops.regs[0], ty));
		},

		Opcode::ReturnVoid => {},
		Opcode::Return | Opcode::ReturnWide | Opcode::ReturnObject => {
			insn.sources = vec![Operand::new(ops.regs[0], raw.return_type.clone())];
		},

		Opcode::Const32 => {
			let bits = decode_const32_bits(byte, ops);
			let kind = if bits == 0 { CONST32_AMBIGUOUS_ZERO } else { Kind::FiUnknown };
			insn.data = InsnData::Const32(bits);
			insn.destination = Some(Operand::new(ops.regs[0], Type::scalar(kind)));
		},
		Opcode::Const64 => {
			let bits = decode_const64_bits(byte, ops);
			insn.data = InsnData::Const64(bits);
			insn.destination = Some(Operand::new(ops.regs[0], Type::scalar(Kind::DlUnknown)));
		},
		Opcode::ConstString => {
			let value = resolver.resolve_string(ops.index);
			insn.reference = Some(pool.put_string(value));
			insn.destination = Some(Operand::new(ops.regs[0], Type::object(dex_ir::ClassName::java_lang_string())));
		},
		Opcode::ConstClass => {
			let class = resolver.resolve_class(ops.index);
			insn.reference = Some(pool.put_class(class));
			insn.destination = Some(Operand::new(ops.regs[0], Type::object(dex_ir::ClassName::java_lang_class())));
		},

		Opcode::MonitorEnter | Opcode::MonitorExit => {
			insn.sources = vec![Operand::new(ops.regs[0], Type::scalar(Kind::NonArrayObject))];
		},

		Opcode::CheckCast => {
			let class = resolver.resolve_class(ops.index);
			insn.reference = Some(pool.put_class(class.clone()));
			insn.sources = vec![Operand::new(ops.regs[0], Type::scalar(Kind::NonArrayObject))];
			insn.destination = Some(Operand::new(ops.regs[0], Type::object(class)));
		},
		Opcode::InstanceOf => {
			let class = resolver.resolve_class(ops.index);
			insn.reference = Some(pool.put_class(class));
			insn.sources = vec![Operand::new(ops.regs[1], Type::scalar(Kind::NonArrayObject))];
			insn.destination = Some(Operand::new(ops.regs[0], Type::scalar(Kind::Boolean)));
		},
		Opcode::ArrayLength => {
			insn.sources = vec![Operand::new(ops.regs[1], Type::scalar(Kind::NonArrayObject))];
			insn.destination = Some(Operand::new(ops.regs[0], Type::scalar(Kind::Int)));
		},

		Opcode::NewInstance => {
			let class = resolver.resolve_class(ops.index);
			insn.reference = Some(pool.put_class(class.clone()));
			insn.destination = Some(Operand::new(ops.regs[0], Type::object(class)));
		},
		Opcode::NewArray => {
			let array_ty = resolver.resolve_type(ops.index);
			if let Kind::Object(class) = &array_ty.kind {
				insn.reference = Some(pool.put_class(class.clone()));
			}
			insn.data = InsnData::ArrayComponent(Type::new(array_ty.kind.clone(), array_ty.dim.saturating_sub(1)));
			insn.sources = vec![Operand::new(ops.regs[1], Type::scalar(Kind::Int))];
			insn.destination = Some(Operand::new(ops.regs[0], array_ty));
		},
		Opcode::FilledNewArray => {
			let array_ty = resolver.resolve_type(ops.index);
			if let Kind::Object(class) = &array_ty.kind {
				insn.reference = Some(pool.put_class(class.clone()));
			}
			let component = Type::new(array_ty.kind.clone(), array_ty.dim.saturating_sub(1));
			insn.data = InsnData::ArrayComponent(component);
			let count = ops.invoke_arg_count as usize;
			insn.sources = ops.regs[..count].iter().map(|&r| Operand::new(r, array_ty.clone())).collect();
			next_pending = Some(array_ty);
		},
		Opcode::FillArrayData => {
			let payload_offset = (raw_pc as i64 + ops.imm) as i64;
			if payload_offset < 0 || payload_offset as usize >= raw.code_units.len() {
				return Err(DecodeError::OffsetOutOfRange { offset: original_offset });
			}
			let payload = payload::read_fill_array_data(&raw.code_units, payload_offset as usize)
				.map_err(|e| DecodeError::MalformedPayload { kind: "fill-array-data", offset: original_offset, message: e.to_string() })?;
			let kind = match payload.element_width {
				1 => Kind::Byte,
				2 => Kind::AcsUnknown,
				4 => Kind::AfiUnknown,
				8 => Kind::AdlUnknown,
				other => return Err(DecodeError::MalformedPayload {
					kind: "fill-array-data", offset: original_offset,
					message: format!("unsupported element width {other}"),
				}),
			};
			insn.sources = vec![Operand::new(ops.regs[0], Type::new(kind, 1))];
			insn.data = InsnData::FillArrayData { element_width: payload.element_width, words: payload.words, refs: Vec::new() };
			let id = finish(body, seeds, insn);
			seeds.ambiguous_sources.push((id, ops.regs[0]));
			return Ok((id, next_pending));
		},

		Opcode::Throw => {
			insn.sources = vec![Operand::new(ops.regs[0], Type::scalar(Kind::NonArrayObject))];
		},
		Opcode::Goto => {
			let target = (raw_pc as i64 + ops.imm + 1) as u32;
			insn.data = InsnData::BranchTarget(target);
		},
		Opcode::PackedSwitch => {
			let payload_offset = (raw_pc as i64 + ops.imm) as i64;
			if payload_offset < 0 || payload_offset as usize >= raw.code_units.len() {
				return Err(DecodeError::OffsetOutOfRange { offset: original_offset });
			}
			let payload = payload::read_packed_switch(&raw.code_units, payload_offset as usize)
				.map_err(|e| DecodeError::MalformedPayload { kind: "packed-switch", offset: original_offset, message: e.to_string() })?;
			let targets = payload.targets.iter().map(|&delta| (raw_pc as i64 + delta as i64 + 1) as u32).collect();
			insn.data = InsnData::PackedSwitch { first_key: payload.first_key, targets };
			insn.sources = vec![Operand::new(ops.regs[0], Type::scalar(Kind::Int))];
		},
		Opcode::SparseSwitch => {
			let payload_offset = (raw_pc as i64 + ops.imm) as i64;
			if payload_offset < 0 || payload_offset as usize >= raw.code_units.len() {
				return Err(DecodeError::OffsetOutOfRange { offset: original_offset });
			}
			let payload = payload::read_sparse_switch(&raw.code_units, payload_offset as usize)
				.map_err(|e| DecodeError::MalformedPayload { kind: "sparse-switch", offset: original_offset, message: e.to_string() })?;
			let entries = payload.entries.iter().map(|&(k, delta)| (k, (raw_pc as i64 + delta as i64 + 1) as u32)).collect();
			insn.data = InsnData::SparseSwitch { entries };
			insn.sources = vec![Operand::new(ops.regs[0], Type::scalar(Kind::Int))];
		},

		Opcode::Cmp => {
			let kind = opcodes::cmp_operand_kind(byte);
			insn.sources = vec![
				Operand::new(ops.regs[1], Type::scalar(kind.clone())),
				Operand::new(ops.regs[2], Type::scalar(kind)),
			];
			insn.destination = Some(Operand::new(ops.regs[0], Type::scalar(Kind::Int)));
		},
		Opcode::IfEqNe => {
			insn.sources = vec![
				Operand::new(ops.regs[0], Type::scalar(Kind::TrioUnknown)),
				Operand::new(ops.regs[1], Type::scalar(Kind::TrioUnknown)),
			];
			let target = (raw_pc as i64 + ops.imm + 1) as u32;
			insn.data = InsnData::BranchTarget(target);
		},
		Opcode::IfOrdered => {
			insn.sources = if ops.regs.len() >= 2 {
				vec![Operand::new(ops.regs[0], Type::scalar(Kind::Int)), Operand::new(ops.regs[1], Type::scalar(Kind::Int))]
			} else {
				vec![Operand::new(ops.regs[0], Type::scalar(Kind::Int))]
			};
			let target = (raw_pc as i64 + ops.imm + 1) as u32;
			insn.data = InsnData::BranchTarget(target);
		},
		Opcode::IfZero => {
			insn.sources = vec![Operand::new(ops.regs[0], Type::scalar(Kind::TrioUnknown))];
			let target = (raw_pc as i64 + ops.imm + 1) as u32;
			insn.data = InsnData::BranchTarget(target);
		},

		Opcode::AgetBoolean | Opcode::AgetByte | Opcode::AgetChar | Opcode::AgetShort => {
			let kind = primitive_aget_kind(opcode);
			insn.sources = vec![
				Operand::new(ops.regs[1], Type::new(kind.clone(), 1)),
				Operand::new(ops.regs[2], Type::scalar(Kind::Int)),
			];
			insn.destination = Some(Operand::new(ops.regs[0], Type::scalar(kind)));
		},
		Opcode::Aget => {
			insn.sources = vec![
				Operand::new(ops.regs[1], Type::new(Kind::AfiUnknown, 1)),
				Operand::new(ops.regs[2], Type::scalar(Kind::Int)),
			];
			insn.destination = Some(Operand::new(ops.regs[0], Type::scalar(Kind::FiUnknown)));
		},
		Opcode::AgetWide => {
			insn.sources = vec![
				Operand::new(ops.regs[1], Type::new(Kind::AdlUnknown, 1)),
				Operand::new(ops.regs[2], Type::scalar(Kind::Int)),
			];
			insn.destination = Some(Operand::new(ops.regs[0], Type::scalar(Kind::DlUnknown)));
		},
		Opcode::AgetObject => {
			insn.sources = vec![
				Operand::new(ops.regs[1], Type::new(Kind::AobjectUnknown, 1)),
				Operand::new(ops.regs[2], Type::scalar(Kind::Int)),
			];
			insn.destination = Some(Operand::new(ops.regs[0], Type::scalar(Kind::NonArrayObject)));
			let id = finish(body, seeds, insn);
			seeds.ambiguous_destinations.push((id, ops.regs[0]));
			return Ok((id, next_pending));
		},

		Opcode::AputBoolean | Opcode::AputByte | Opcode::AputChar | Opcode::AputShort => {
			let kind = primitive_aput_kind(opcode);
			insn.sources = vec![
				Operand::new(ops.regs[0], Type::scalar(kind.clone())),
				Operand::new(ops.regs[1], Type::new(kind, 1)),
				Operand::new(ops.regs[2], Type::scalar(Kind::Int)),
			];
		},
		Opcode::Aput => {
			insn.sources = vec![
				Operand::new(ops.regs[0], Type::scalar(Kind::FiUnknown)),
				Operand::new(ops.regs[1], Type::new(Kind::AfiUnknown, 1)),
				Operand::new(ops.regs[2], Type::scalar(Kind::Int)),
			];
		},
		Opcode::AputWide => {
			insn.sources = vec![
				Operand::new(ops.regs[0], Type::scalar(Kind::DlUnknown)),
				Operand::new(ops.regs[1], Type::new(Kind::AdlUnknown, 1)),
				Operand::new(ops.regs[2], Type::scalar(Kind::Int)),
			];
		},
		Opcode::AputObject => {
			insn.sources = vec![
				Operand::new(ops.regs[0], Type::scalar(Kind::NonArrayObject)),
				Operand::new(ops.regs[1], Type::new(Kind::AobjectUnknown, 1)),
				Operand::new(ops.regs[2], Type::scalar(Kind::Int)),
			];
			let id = finish(body, seeds, insn);
			seeds.ambiguous_sources.push((id, ops.regs[0]));
			return Ok((id, next_pending));
		},

		Opcode::IgetBoolean | Opcode::IgetByte | Opcode::IgetChar | Opcode::IgetShort |
		Opcode::Iget | Opcode::IgetWide | Opcode::IgetObject => {
			let field = resolver.resolve_field(ops.index);
			insn.reference = Some(pool.put_field_ref(field.clone()));
			insn.sources = vec![Operand::new(ops.regs[1], Type::scalar(Kind::NonArrayObject))];
			insn.destination = Some(Operand::new(ops.regs[0], field.descriptor));
		},
		Opcode::IputBoolean | Opcode::IputByte | Opcode::IputChar | Opcode::IputShort |
		Opcode::Iput | Opcode::IputWide | Opcode::IputObject => {
			let field = resolver.resolve_field(ops.index);
			insn.reference = Some(pool.put_field_ref(field.clone()));
			insn.sources = vec![
				Operand::new(ops.regs[0], field.descriptor),
				Operand::new(ops.regs[1], Type::scalar(Kind::NonArrayObject)),
			];
		},
		Opcode::SgetBoolean | Opcode::SgetByte | Opcode::SgetChar | Opcode::SgetShort |
		Opcode::Sget | Opcode::SgetWide | Opcode::SgetObject => {
			let field = resolver.resolve_field(ops.index);
			insn.reference = Some(pool.put_field_ref(field.clone()));
			insn.destination = Some(Operand::new(ops.regs[0], field.descriptor));
		},
		Opcode::SputBoolean | Opcode::SputByte | Opcode::SputChar | Opcode::SputShort |
		Opcode::Sput | Opcode::SputWide | Opcode::SputObject => {
			let field = resolver.resolve_field(ops.index);
			insn.reference = Some(pool.put_field_ref(field.clone()));
			insn.sources = vec![Operand::new(ops.regs[0], field.descriptor)];
		},

		Opcode::InvokeVirtual | Opcode::InvokeSuper | Opcode::InvokeDirect |
		Opcode::InvokeStatic | Opcode::InvokeInterface => {
			let is_interface = opcode == Opcode::InvokeInterface;
			let method = resolver.resolve_method(ops.index, is_interface);
			insn.reference = Some(if is_interface {
				pool.put_interface_method_ref(method.clone())
			} else {
				pool.put_method_ref(method.clone())
			});

			let mut cursor = 0usize;
			let mut sources = Vec::with_capacity(method.parameters.len() + 1);
			if opcode != Opcode::InvokeStatic {
				sources.push(Operand::new(ops.regs[cursor], Type::scalar(Kind::NonArrayObject)));
				cursor += 1;
			}
			for param in &method.parameters {
				sources.push(Operand::new(ops.regs[cursor], param.clone()));
				cursor += param.width() as usize;
			}
			insn.sources = sources;

			if method.return_type.kind != Kind::Void {
				if next_is_move_result {
					next_pending = Some(method.return_type.clone());
				} else {
					let discard = if method.return_type.width() == 2 { Kind::Pop2 } else { Kind::Pop };
					insn.destination = Some(Operand::new(0, Type::scalar(discard)));
				}
			}
		},

		Opcode::UnaryOp => {
			let (src, dst) = opcodes::unop_types(byte);
			insn.sources = vec![Operand::new(ops.regs[1], Type::scalar(src))];
			insn.destination = Some(Operand::new(ops.regs[0], Type::scalar(dst)));
		},
		Opcode::BinaryOp => {
			let (k1, k2, kd) = opcodes::binop_types(byte);
			let (t1, t2, td) = (Type::scalar(k1), Type::scalar(k2), Type::scalar(kd));
			if opcodes::binop_is_2addr(byte) {
				insn.sources = vec![Operand::new(ops.regs[0], t1), Operand::new(ops.regs[1], t2)];
				insn.destination = Some(Operand::new(ops.regs[0], td));
			} else {
				insn.sources = vec![Operand::new(ops.regs[1], t1), Operand::new(ops.regs[2], t2)];
				insn.destination = Some(Operand::new(ops.regs[0], td));
			}
		},
		Opcode::BinaryOpLit => {
			insn.sources = vec![Operand::new(ops.regs[1], Type::scalar(Kind::Int))];
			insn.destination = Some(Operand::new(ops.regs[0], Type::scalar(Kind::Int)));
		},

		Opcode::VerifyError => unreachable!("synthesized directly, never decoded from a raw opcode byte"),
	}

	let id = finish(body, seeds, insn);
	Ok((id, next_pending))
}

fn primitive_aget_kind(opcode: Opcode) -> Kind {
	match opcode {
		Opcode::AgetBoolean => Kind::Boolean,
		Opcode::AgetByte => Kind::Byte,
		Opcode::AgetChar => Kind::Char,
		Opcode::AgetShort => Kind::Short,
		_ => unreachable!(),
	}
}

fn primitive_aput_kind(opcode: Opcode) -> Kind {
	match opcode {
		Opcode::AputBoolean => Kind::Boolean,
		Opcode::AputByte => Kind::Byte,
		Opcode::AputChar => Kind::Char,
		Opcode::AputShort => Kind::Short,
		_ => unreachable!(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use dex_ir::ClassName;
	use pretty_assertions::assert_eq;
	use crate::resolver::fake::FakeResolver;

	fn raw_with(code_units: Vec<u16>) -> RawMethodBody {
		RawMethodBody {
			code_units,
			num_registers: 4,
			num_incoming_args: 1,
			is_static: false,
			return_type: Type::void(),
			parameter_types: Vec::new(),
			declaring_class: ClassName::from("com/example/Foo"),
			try_items: Vec::new(),
		}
	}

	#[test]
	fn decodes_nop_plus_sentinels() {
		let raw = raw_with(vec![0x0000]);
		let mut pool = ConstantPool::new();
		let resolver = FakeResolver::default();
		let out = decode_method(&raw, &resolver, &mut pool, None).unwrap();
		assert_eq!(out.body.len(), 3);
		assert!(out.translation_needed);
		assert_eq!(out.body.get(out.body.first_id()).opcode, Opcode::Nop);
		assert_eq!(out.body.get(out.body.last_id()).opcode, Opcode::Nop);
	}

	#[test]
	fn const4_seeds_ambiguous_destination_for_zero() {
		// const/4 v0, #0
		let raw = raw_with(vec![0x12]);
		let mut pool = ConstantPool::new();
		let resolver = FakeResolver::default();
		let out = decode_method(&raw, &resolver, &mut pool, None).unwrap();
		let insn = out.body.get(IrInsnId(1));
		assert_eq!(insn.destination.as_ref().unwrap().ty.kind, Kind::TrioUnknown);
		assert_eq!(out.seeds.ambiguous_destinations, vec![(IrInsnId(1), 0)]);
	}

	#[test]
	fn const4_nonzero_is_fi_unknown_not_seeded_as_trio() {
		// const/4 v0, #1
		let raw = raw_with(vec![0x12 | (1 << 12)]);
		let mut pool = ConstantPool::new();
		let resolver = FakeResolver::default();
		let out = decode_method(&raw, &resolver, &mut pool, None).unwrap();
		let insn = out.body.get(IrInsnId(1));
		assert_eq!(insn.destination.as_ref().unwrap().ty.kind, Kind::FiUnknown);
	}

	#[test]
	fn whole_method_failure_short_circuits() {
		let raw = raw_with(vec![0x0e]); // return-void
		let mut pool = ConstantPool::new();
		let resolver = FakeResolver::default();
		let out = decode_method(&raw, &resolver, &mut pool, Some(&MethodVerification::WholeMethodFails)).unwrap();
		assert!(!out.translation_needed);
		assert_eq!(out.body.len(), 3);
		assert_eq!(out.body.get(IrInsnId(1)).opcode, Opcode::VerifyError);
	}

	#[test]
	fn per_offset_verifier_error_forces_following_move_result_to_nop() {
		// offset 0: some opcode replaced by verify-error (2 code units wide: new-instance)
		// offset 2: move-result-object (forced to nop)
		let raw = raw_with(vec![0x22, 0x0000, 0x0c]);
		let mut pool = ConstantPool::new();
		let resolver = FakeResolver::default();
		let mut list = Vec::new();
		list.push((0u32, dex_verify::ErrorKind::NoClass));
		let verification = MethodVerification::Instructions(list);
		let out = decode_method(&raw, &resolver, &mut pool, Some(&verification)).unwrap();
		assert_eq!(out.body.get(IrInsnId(1)).opcode, Opcode::VerifyError);
		assert_eq!(out.body.get(IrInsnId(2)).opcode, Opcode::Nop);
	}

	#[test]
	fn invoke_followed_by_move_result_has_no_own_destination() {
		// invoke-static {}, foo()I ; move-result v0
		let raw = raw_with(vec![0x71, 0x0000, 0x0000, 0x0000, 0x0a]);
		let mut pool = ConstantPool::new();
		let mut resolver = FakeResolver::default();
		resolver.methods.insert(0, dex_ir::MethodRef {
			class: ClassName::from("com/example/Foo"),
			name: dex_ir::MethodName::from("foo"),
			parameters: Vec::new(),
			return_type: Type::scalar(Kind::Int),
		});
		let out = decode_method(&raw, &resolver, &mut pool, None).unwrap();
		let invoke = out.body.get(IrInsnId(1));
		assert!(invoke.destination.is_none());
		let move_result = out.body.get(IrInsnId(2));
		assert_eq!(move_result.destination.as_ref().unwrap().ty, Type::scalar(Kind::Int));
	}

	#[test]
	fn invoke_with_unused_result_gets_pop_destination() {
		// invoke-static {}, foo()I ; nop (no move-result follows)
		let raw = raw_with(vec![0x71, 0x0000, 0x0000, 0x0000, 0x0000]);
		let mut pool = ConstantPool::new();
		let mut resolver = FakeResolver::default();
		resolver.methods.insert(0, dex_ir::MethodRef {
			class: ClassName::from("com/example/Foo"),
			name: dex_ir::MethodName::from("foo"),
			parameters: Vec::new(),
			return_type: Type::scalar(Kind::Int),
		});
		let out = decode_method(&raw, &resolver, &mut pool, None).unwrap();
		let invoke = out.body.get(IrInsnId(1));
		assert_eq!(invoke.destination.as_ref().unwrap().ty.kind, Kind::Pop);
	}

	#[test]
	fn goto_records_shifted_branch_target() {
		// goto +2 at offset 0
		let raw = raw_with(vec![0x28 | (2 << 8), 0x0000]);
		let mut pool = ConstantPool::new();
		let resolver = FakeResolver::default();
		let out = decode_method(&raw, &resolver, &mut pool, None).unwrap();
		let insn = out.body.get(IrInsnId(1));
		assert_eq!(insn.data, InsnData::BranchTarget(3));
	}

	#[test]
	fn unknown_opcode_is_a_hard_error() {
		let raw = raw_with(vec![0x73]); // unused byte
		let mut pool = ConstantPool::new();
		let resolver = FakeResolver::default();
		let err = decode_method(&raw, &resolver, &mut pool, None).unwrap_err();
		assert!(matches!(err, DecodeError::UnknownOpcode { byte: 0x73, offset: 0 }));
	}
}
