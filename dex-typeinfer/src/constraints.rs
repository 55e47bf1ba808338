//! Constraint generation (SPEC_FULL.md §4.5 "Constraint generation" and
//! "Initial constraints"): installs the per-instruction relations the
//! decoder couldn't express type-wise, then walks back/forward from every
//! ambiguity seed along the CFG to link each seed's type variable to the
//! definitions or uses that determine it.
//!
//! Grounded on `original_source/dare/decompiler/src/typing/type_solver.cpp`'s
//! `GenerateConstraints`/`BackwardDFS`/`ForwardDFS`. See `graph`'s module
//! docs for why `move-object`/`aget-object`/`aput-object`'s dimension
//! bookkeeping is installed here as a local constraint rather than as a
//! restart inside the traversal: both reach the same fixed point because
//! graph nodes are deduplicated by `(insn, reg, is_source)` identity, and
//! the local form keeps the traversal itself opcode-agnostic.

use dex_decode::AmbiguitySeeds;
use dex_ir::{IrInsnId, Kind, MethodBody, Opcode, Register, Type};

use crate::args::{argument_register_type, MethodArgInfo};
use crate::graph::{ConstraintGraph, NodeId};
use crate::visit::VisitScratch;

/// Runs the full constraint-generation pass over an already CFG-built,
/// still partially-ambiguous method body.
pub fn generate_constraints(body: &MethodBody, seeds: &AmbiguitySeeds, args: &MethodArgInfo, graph: &mut ConstraintGraph) {
	for &(insn, reg) in &seeds.ambiguous_sources {
		graph.mark_seeded(insn, reg, true);
	}
	for &(insn, reg) in &seeds.ambiguous_destinations {
		graph.mark_seeded(insn, reg, false);
	}

	install_initial_constraints(body, graph);

	let mut scratch = VisitScratch::new(body.len());
	for &(insn, reg) in &seeds.ambiguous_sources {
		let ty = source_type(body, insn, reg);
		let seed_node = graph.node_for_site(insn, reg, true, ty);
		back_dfs(body, insn, reg, seed_node, graph, &mut scratch, args);
		scratch.reset();
	}
	for &(insn, reg) in &seeds.ambiguous_destinations {
		let ty = destination_type(body, insn, reg);
		let seed_node = graph.node_for_site(insn, reg, false, ty);
		forward_dfs(body, insn, reg, seed_node, graph, &mut scratch);
		scratch.reset();
	}
}

fn source_type(body: &MethodBody, insn: IrInsnId, reg: Register) -> Type {
	body.get(insn).sources.iter()
		.find(|s| s.register == reg)
		.map(|s| s.ty.clone())
		.unwrap_or_else(Type::unknown)
}

fn destination_type(body: &MethodBody, insn: IrInsnId, reg: Register) -> Type {
	body.get(insn).destination.as_ref()
		.filter(|d| d.register == reg)
		.map(|d| d.ty.clone())
		.unwrap_or_else(Type::unknown)
}

/// Relations fixed by the instruction itself, independent of any seed:
/// primitive move equality, `if-eq`/`if-ne` operand equality, and the
/// element↔array dimension link for every `aget`/`aput` family member
/// (including the object flavors, whose component/array registers are
/// also individually seeded — see `dex-decode`'s `finish`).
fn install_initial_constraints(body: &MethodBody, graph: &mut ConstraintGraph) {
	for id in body.ids() {
		let insn = body.get(id);
		match insn.opcode {
			Opcode::Move | Opcode::MoveWide => {
				let src = &insn.sources[0];
				let dst = insn.destination.as_ref().expect("move always defines a destination");
				let src_node = graph.node_for_site(id, src.register, true, src.ty.clone());
				let dst_node = graph.node_for_site(id, dst.register, false, dst.ty.clone());
				graph.add_subtype(src_node, dst_node);
				graph.add_subtype(dst_node, src_node);
			},
			Opcode::MoveObject => {
				let src = &insn.sources[0];
				let dst = insn.destination.as_ref().expect("move-object always defines a destination");
				let src_node = graph.node_for_site(id, src.register, true, src.ty.clone());
				let dst_node = graph.node_for_site(id, dst.register, false, dst.ty.clone());
				// A neutral bottom-object intermediary, so a move never
				// widens an array type on one side just because the other
				// side happened to resolve first.
				let neutral = graph.fresh(Type::scalar(Kind::BottomObject));
				graph.add_subtype(src_node, neutral);
				graph.add_subtype(neutral, dst_node);
			},
			Opcode::IfEqNe => {
				let a = &insn.sources[0];
				let b = &insn.sources[1];
				let a_node = graph.node_for_site(id, a.register, true, a.ty.clone());
				let b_node = graph.node_for_site(id, b.register, true, b.ty.clone());
				graph.add_subtype(a_node, b_node);
				graph.add_subtype(b_node, a_node);
			},
			Opcode::Aget | Opcode::AgetWide | Opcode::AgetObject => {
				let array = &insn.sources[0];
				let dst = insn.destination.as_ref().expect("aget always defines a destination");
				let array_node = graph.node_for_site(id, array.register, true, array.ty.clone());
				let elem_node = graph.node_for_site(id, dst.register, false, dst.ty.clone());
				graph.add_dim_link(elem_node, array_node);
			},
			Opcode::Aput | Opcode::AputWide | Opcode::AputObject => {
				let value = &insn.sources[0];
				let array = &insn.sources[1];
				let value_node = graph.node_for_site(id, value.register, true, value.ty.clone());
				let array_node = graph.node_for_site(id, array.register, true, array.ty.clone());
				graph.add_dim_link(value_node, array_node);
			},
			_ => {},
		}
	}
}

fn push_predecessors(body: &MethodBody, id: IrInsnId, stack: &mut Vec<IrInsnId>) {
	stack.extend(body.get(id).predecessors.iter().copied());
	stack.extend(body.get(id).exception_predecessors.iter().copied());
}

fn push_successors(body: &MethodBody, id: IrInsnId, stack: &mut Vec<IrInsnId>) {
	stack.extend(body.get(id).successors.iter().copied());
	stack.extend(body.get(id).exception_successors.iter().copied());
}

/// Source-seed traversal (SPEC_FULL.md §4.5): walks predecessors looking
/// for the definition(s) of `reg`, adding `definition.type ≤ seed` at
/// each one found and not descending past it. If no backward path ever
/// defines `reg` before running off the method's entry, `reg` must be an
/// incoming argument register (a verified method guarantees every other
/// register is defined before use) — its declared parameter type is used
/// instead (see `args` module docs).
fn back_dfs(body: &MethodBody, start: IrInsnId, reg: Register, seed_node: NodeId, graph: &mut ConstraintGraph, scratch: &mut VisitScratch, args: &MethodArgInfo) {
	let mut stack = Vec::new();
	push_predecessors(body, start, &mut stack);
	let mut found_definition = false;
	while let Some(cur) = stack.pop() {
		if scratch.visit(cur.index()) {
			continue;
		}
		let insn = body.get(cur);
		if let Some(dst) = &insn.destination {
			if dst.register == reg {
				let def_node = graph.node_for_site(cur, reg, false, dst.ty.clone());
				graph.add_subtype(def_node, seed_node);
				found_definition = true;
				continue;
			}
		}
		push_predecessors(body, cur, &mut stack);
	}
	if !found_definition {
		if let Some(ty) = argument_register_type(body, args, reg) {
			let arg_node = graph.fresh(ty);
			graph.add_subtype(arg_node, seed_node);
		}
	}
}

/// Destination-seed traversal (SPEC_FULL.md §4.5): walks successors
/// looking for uses of `reg`, adding `seed ≤ use.type` at each one found,
/// and not descending past a redefinition of `reg`.
fn forward_dfs(body: &MethodBody, start: IrInsnId, reg: Register, seed_node: NodeId, graph: &mut ConstraintGraph, scratch: &mut VisitScratch) {
	let mut stack = Vec::new();
	push_successors(body, start, &mut stack);
	while let Some(cur) = stack.pop() {
		if scratch.visit(cur.index()) {
			continue;
		}
		let insn = body.get(cur);
		for src in &insn.sources {
			if src.register == reg {
				let use_node = graph.node_for_site(cur, reg, true, src.ty.clone());
				graph.add_subtype(seed_node, use_node);
			}
		}
		let redefines = insn.destination.as_ref().is_some_and(|d| d.register == reg);
		if !redefines {
			push_successors(body, cur, &mut stack);
		}
	}
}
