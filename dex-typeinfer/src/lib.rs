//! C6: the type solver.
//!
//! Takes an already CFG-built ([`dex_cfg`]), still partially-ambiguous
//! method body plus the [`dex_decode::AmbiguitySeeds`] the decoder
//! collected, and resolves every seeded register to a concrete type:
//! [`graph`] is the constraint arena, [`constraints`] builds it from the
//! method's instructions and seeds, [`solve`] saturates and closes it,
//! [`writeback`] applies the result back onto the IR, [`args`] supplies
//! the declared type of an incoming argument register when a backward
//! search runs off the start of the method, and [`visit`] is the shared
//! visited-bitmap scratch space the seed traversals reuse.
//!
//! Grounded throughout on
//! `original_source/dare/decompiler/src/typing/type_solver.cpp`.

pub mod args;
pub mod constraints;
pub mod graph;
pub mod solve;
pub mod visit;
mod writeback;

pub use args::MethodArgInfo;

use dex_decode::AmbiguitySeeds;
use dex_ir::MethodBody;

use crate::constraints::generate_constraints;
use crate::graph::ConstraintGraph;
use crate::solve::{residual_closure, saturate, Worklist};
use crate::writeback::write_back;

/// Runs the whole C6 pass over one method body in place. Returns the
/// number of type conflicts observed during solving (each already logged
/// via `log::warn!`); a nonzero count does not stop the method from
/// proceeding to C7 — SPEC_FULL.md §7 treats a type conflict the same way
/// the original does, as something to emit best-effort around, not a
/// reason to drop the method.
pub fn infer_types(body: &mut MethodBody, seeds: &AmbiguitySeeds, args: &MethodArgInfo) -> usize {
	let mut graph = ConstraintGraph::new();
	generate_constraints(body, seeds, args, &mut graph);

	let mut worklist = Worklist::seeded_with_all(&graph);
	let mut conflicts = saturate(&mut graph, &mut worklist);
	conflicts += residual_closure(&mut graph, &mut worklist);

	write_back(body, seeds, &graph);
	conflicts
}

#[cfg(test)]
mod tests {
	use super::*;
	use dex_ir::{ClassName, IrInsn, IrInsnId, Kind, Opcode, Operand, Type};
	use pretty_assertions::assert_eq;

	fn arg_info() -> MethodArgInfo {
		MethodArgInfo { declaring_class: ClassName::from("com/example/Widget"), is_static: true, parameter_types: vec![] }
	}

	/// S1-style scenario: `const/4 v0, 0` then `return-object v0` — the
	/// ambiguous zero constant must resolve to a reference type because
	/// its only use is a reference-typed return.
	#[test]
	fn const_zero_used_as_return_object_resolves_to_object() {
		let mut body = MethodBody::new(1, 0);
		let mut const_insn = IrInsn::new(Opcode::Const32, 0);
		const_insn.destination = Some(Operand::new(0, Type::scalar(Kind::TrioUnknown)));
		body.push(const_insn);

		let mut ret_insn = IrInsn::new(Opcode::ReturnObject, 1);
		ret_insn.sources = vec![Operand::new(0, Type::scalar(Kind::NonArrayObject))];
		body.push(ret_insn);

		body.add_successor(IrInsnId(0), IrInsnId(1));

		let seeds = AmbiguitySeeds {
			ambiguous_sources: vec![],
			ambiguous_destinations: vec![(IrInsnId(0), 0)],
		};

		infer_types(&mut body, &seeds, &arg_info());
		assert_eq!(body.get(IrInsnId(0)).destination.as_ref().unwrap().ty, Type::scalar(Kind::NonArrayObject));
	}

	/// S2-style scenario: `if-eq v0, v1` where `v1` is a concrete `int` —
	/// the two `trio-unknown` operands must unify on `int`.
	#[test]
	fn if_eq_operands_unify_on_concrete_sibling() {
		let mut body = MethodBody::new(2, 0);
		let mut if_insn = IrInsn::new(Opcode::IfEqNe, 0);
		if_insn.sources = vec![
			Operand::new(0, Type::scalar(Kind::TrioUnknown)),
			Operand::new(1, Type::scalar(Kind::Int)),
		];
		body.push(if_insn);
		body.push(IrInsn::new(Opcode::Nop, 1));
		body.add_successor(IrInsnId(0), IrInsnId(1));

		let seeds = AmbiguitySeeds {
			ambiguous_sources: vec![(IrInsnId(0), 0)],
			ambiguous_destinations: vec![],
		};

		infer_types(&mut body, &seeds, &arg_info());
		assert_eq!(body.get(IrInsnId(0)).sources[0].ty, Type::scalar(Kind::Int));
	}

	/// S3-style scenario: `new-array v0, int` then `aput v1, v0, v2` — the
	/// `afi-unknown` value register must resolve to `int` from the
	/// array's own component type via the element/array `DimLink`.
	#[test]
	fn aput_value_resolves_from_array_component_type() {
		let mut body = MethodBody::new(3, 0);
		let mut new_array = IrInsn::new(Opcode::NewArray, 0);
		new_array.destination = Some(Operand::new(0, Type::new(Kind::Int, 1)));
		body.push(new_array);

		let mut aput = IrInsn::new(Opcode::Aput, 1);
		aput.sources = vec![
			Operand::new(1, Type::scalar(Kind::AfiUnknown)),
			Operand::new(0, Type::new(Kind::Int, 1)),
			Operand::new(2, Type::scalar(Kind::Int)),
		];
		body.push(aput);
		body.add_successor(IrInsnId(0), IrInsnId(1));

		let seeds = AmbiguitySeeds {
			ambiguous_sources: vec![(IrInsnId(1), 1)],
			ambiguous_destinations: vec![],
		};

		infer_types(&mut body, &seeds, &arg_info());
		assert_eq!(body.get(IrInsnId(1)).sources[0].ty, Type::scalar(Kind::Int));
	}

	/// S5-style scenario: `const-wide/16 v0, 0` then `return-wide v0` —
	/// the ambiguous wide zero constant must resolve to `long` from its
	/// sole concrete use.
	#[test]
	fn const_wide_zero_used_as_return_wide_resolves_to_long() {
		let mut body = MethodBody::new(2, 0);
		let mut const_insn = IrInsn::new(Opcode::Const64, 0);
		const_insn.destination = Some(Operand::new(0, Type::scalar(Kind::DlUnknown)));
		body.push(const_insn);

		let mut ret_insn = IrInsn::new(Opcode::ReturnWide, 1);
		ret_insn.sources = vec![Operand::new(0, Type::scalar(Kind::Long))];
		body.push(ret_insn);
		body.add_successor(IrInsnId(0), IrInsnId(1));

		let seeds = AmbiguitySeeds {
			ambiguous_sources: vec![],
			ambiguous_destinations: vec![(IrInsnId(0), 0)],
		};

		infer_types(&mut body, &seeds, &arg_info());
		assert_eq!(body.get(IrInsnId(0)).destination.as_ref().unwrap().ty, Type::scalar(Kind::Long));
	}

	/// S4-style scenario: `new-array v0, [Ljava/lang/String;` then
	/// `aget-object v2, v0, v3` — the ambiguous element register resolves
	/// to the array's own component class via the `DimLink` the array and
	/// the element share, the mirror image of the S3 aput case above.
	#[test]
	fn aget_object_element_resolves_from_array_component_type() {
		let mut body = MethodBody::new(4, 0);
		let string_array = Type::new(Kind::Object(ClassName::from("java/lang/String")), 1);

		let mut new_array = IrInsn::new(Opcode::NewArray, 0);
		new_array.destination = Some(Operand::new(0, string_array.clone()));
		body.push(new_array);

		let mut aget = IrInsn::new(Opcode::AgetObject, 1);
		aget.sources = vec![
			Operand::new(0, string_array),
			Operand::new(3, Type::scalar(Kind::Int)),
		];
		aget.destination = Some(Operand::new(2, Type::scalar(Kind::NonArrayObject)));
		body.push(aget);
		body.add_successor(IrInsnId(0), IrInsnId(1));

		let seeds = AmbiguitySeeds {
			ambiguous_sources: vec![],
			ambiguous_destinations: vec![(IrInsnId(1), 2)],
		};

		infer_types(&mut body, &seeds, &arg_info());
		assert_eq!(
			body.get(IrInsnId(1)).destination.as_ref().unwrap().ty,
			Type::scalar(Kind::Object(ClassName::from("java/lang/String"))),
		);
	}

	/// A register with no reaching definition at all falls back to its
	/// declared argument type rather than a residual-closure default.
	#[test]
	fn unreferenced_argument_register_falls_back_to_declared_type() {
		let mut body = MethodBody::new(1, 1);
		let mut move_insn = IrInsn::new(Opcode::Move, 0);
		move_insn.sources = vec![Operand::new(0, Type::scalar(Kind::FiUnknown))];
		move_insn.destination = Some(Operand::new(0, Type::scalar(Kind::FiUnknown)));
		body.push(move_insn);

		let seeds = AmbiguitySeeds {
			ambiguous_sources: vec![(IrInsnId(0), 0)],
			ambiguous_destinations: vec![(IrInsnId(0), 0)],
		};
		let args = MethodArgInfo { declaring_class: ClassName::from("com/example/Widget"), is_static: true, parameter_types: vec![Type::scalar(Kind::Short)] };

		infer_types(&mut body, &seeds, &args);
		assert_eq!(body.get(IrInsnId(0)).sources[0].ty, Type::scalar(Kind::Short));
	}
}
