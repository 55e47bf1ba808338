//! Writing the solved types back onto the real IR (SPEC_FULL.md §4.5
//! "Write-back"): every seeded operand gets the final type its node
//! settled on; everything else in the method was already concrete and is
//! left untouched.
//!
//! Grounded on `original_source/dare/decompiler/src/typing/type_solver.cpp`'s
//! `TypeVariable::Apply`.

use dex_decode::AmbiguitySeeds;
use dex_ir::MethodBody;

use crate::graph::ConstraintGraph;

pub fn write_back(body: &mut MethodBody, seeds: &AmbiguitySeeds, graph: &ConstraintGraph) {
	for &(insn, reg) in &seeds.ambiguous_sources {
		let ty = graph.existing_node_for_site(insn, reg, true).map(|id| graph.ty(id).clone());
		if let Some(ty) = ty {
			if let Some(src) = body.get_mut(insn).sources.iter_mut().find(|s| s.register == reg) {
				src.ty = ty;
			}
		}
	}
	for &(insn, reg) in &seeds.ambiguous_destinations {
		let ty = graph.existing_node_for_site(insn, reg, false).map(|id| graph.ty(id).clone());
		if let Some(ty) = ty {
			if let Some(dst) = body.get_mut(insn).destination.as_mut() {
				if dst.register == reg {
					dst.ty = ty;
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use dex_ir::{IrInsn, IrInsnId, Kind, Opcode, Operand, Type};
	use pretty_assertions::assert_eq;

	#[test]
	fn writes_solved_source_and_destination_types() {
		let mut body = MethodBody::new(2, 0);
		let mut insn = IrInsn::new(Opcode::Move, 0);
		insn.sources = vec![Operand::new(0, Type::scalar(Kind::FiUnknown))];
		insn.destination = Some(Operand::new(1, Type::scalar(Kind::FiUnknown)));
		body.push(insn);

		let seeds = AmbiguitySeeds {
			ambiguous_sources: vec![(IrInsnId(0), 0)],
			ambiguous_destinations: vec![(IrInsnId(0), 1)],
		};
		let mut graph = ConstraintGraph::new();
		graph.mark_seeded(IrInsnId(0), 0, true);
		graph.mark_seeded(IrInsnId(0), 1, false);
		let src_node = graph.node_for_site(IrInsnId(0), 0, true, Type::scalar(Kind::FiUnknown));
		let dst_node = graph.node_for_site(IrInsnId(0), 1, false, Type::scalar(Kind::FiUnknown));
		graph.force_type(src_node, Type::scalar(Kind::Int));
		graph.force_type(dst_node, Type::scalar(Kind::Int));

		write_back(&mut body, &seeds, &graph);
		assert_eq!(body.get(IrInsnId(0)).sources[0].ty, Type::scalar(Kind::Int));
		assert_eq!(body.get(IrInsnId(0)).destination.as_ref().unwrap().ty, Type::scalar(Kind::Int));
	}
}
