//! The iterative solver (SPEC_FULL.md §4.5 "Iterative solution"): Phase 1
//! saturates the constraint graph by repeated right-hand-side widening
//! until the worklist is empty; Phase 2 closes out any variable Phase 1
//! left unconstrained, first by a tentative guess validated against a
//! concrete neighbor, then by a fixed safe default.
//!
//! Grounded on `original_source/dare/decompiler/src/typing/type_solver.cpp`'s
//! `Solve`/`SolveConstraints`/`AssignDefaultTypes`.

use std::collections::VecDeque;

use dex_ir::{Kind, Type};

use crate::graph::{Constraint, ConstraintGraph, NodeId, RefineOutcome};

/// The dirty set `N` of SPEC_FULL.md §4.5: constraint indices not yet
/// known to be satisfied, with an `in_queue` bitmap so pushing an already
///-queued index is a no-op instead of a duplicate.
pub struct Worklist {
	in_queue: Vec<bool>,
	queue: VecDeque<usize>,
}

impl Worklist {
	/// Seeds the worklist with every constraint in the graph — the state
	/// at the start of Phase 1.
	pub fn seeded_with_all(graph: &ConstraintGraph) -> Worklist {
		let n = graph.constraints().len();
		Worklist { in_queue: vec![true; n], queue: (0..n).collect() }
	}

	pub fn push(&mut self, index: usize) {
		if !self.in_queue[index] {
			self.in_queue[index] = true;
			self.queue.push_back(index);
		}
	}

	fn push_many(&mut self, indices: &[usize]) {
		for &i in indices {
			self.push(i);
		}
	}

	fn pop(&mut self) -> Option<usize> {
		let index = self.queue.pop_front()?;
		self.in_queue[index] = false;
		Some(index)
	}
}

/// Phase 1: drains `worklist`, merging along every inequality until
/// nothing changes. Returns the number of conflicts observed (logged by
/// the caller, not fatal — SPEC_FULL.md §7: "logged once per offending
/// inequality; the method is still emitted").
pub fn saturate(graph: &mut ConstraintGraph, worklist: &mut Worklist) -> usize {
	let mut conflicts = 0;
	while let Some(index) = worklist.pop() {
		let constraint = graph.constraints()[index];
		match constraint {
			Constraint::Subtype { lo, hi } => {
				let candidate = graph.ty(lo).clone();
				apply_refine(graph, worklist, hi, &candidate, &mut conflicts);
			},
			Constraint::DimLink { lo, hi } => {
				// hi is the array one dimension above lo (component <=
				// array), refined in both directions by the lattice rule.
				let lo_ty = graph.ty(lo).clone();
				let candidate_hi = Type::new(lo_ty.kind.clone(), lo_ty.dim + 1);
				apply_refine(graph, worklist, hi, &candidate_hi, &mut conflicts);

				let hi_ty = graph.ty(hi).clone();
				if hi_ty.dim >= 1 {
					let candidate_lo = Type::new(hi_ty.kind.clone(), hi_ty.dim - 1);
					apply_refine(graph, worklist, lo, &candidate_lo, &mut conflicts);
				}
			},
		}
	}
	conflicts
}

fn apply_refine(graph: &mut ConstraintGraph, worklist: &mut Worklist, node: NodeId, candidate: &Type, conflicts: &mut usize) {
	match graph.refine(node, candidate) {
		RefineOutcome::Changed => {
			let deps = graph.driven(node).to_vec();
			worklist.push_many(&deps);
		},
		RefineOutcome::Conflict => {
			*conflicts += 1;
			log::warn!("type conflict merging {candidate} into an inferred type");
		},
		RefineOutcome::Unchanged => {},
	}
}

/// Phase 2 (SPEC_FULL.md §4.5 "residual closure for unconstrained
/// variables"): repeatedly either tentatively types one still-unknown
/// variable from a concrete neighbor and re-saturates, or — if no
/// neighbor offers a hint — assigns the first remaining variable its
/// fixed safe default. Terminates because each iteration resolves at
/// least one of a finite set of nodes.
pub fn residual_closure(graph: &mut ConstraintGraph, worklist: &mut Worklist) -> usize {
	let mut conflicts = 0;
	loop {
		let unresolved: Vec<NodeId> = graph.all_node_ids()
			.filter(|&id| !graph.is_constant(id) && graph.ty(id).is_unknown())
			.collect();
		let Some(&first) = unresolved.first() else { break };

		let mut progressed = false;
		for &node in &unresolved {
			if let Some(candidate) = tentative_candidate(graph, node) {
				force_and_requeue(graph, worklist, node, candidate);
				conflicts += saturate(graph, worklist);
				progressed = true;
				break;
			}
		}
		if !progressed {
			let default = default_residual_type(graph.ty(first));
			force_and_requeue(graph, worklist, first, default);
			conflicts += saturate(graph, worklist);
		}
	}
	conflicts
}

fn force_and_requeue(graph: &mut ConstraintGraph, worklist: &mut Worklist, node: NodeId, ty: Type) {
	graph.force_type(node, ty);
	let deps = graph.driven(node).to_vec();
	worklist.push_many(&deps);
}

/// Looks for a `Subtype { lo: node, hi }` constraint whose `hi` is
/// already concrete, and proposes the narrowest candidate that would
/// merge cleanly against it (SPEC_FULL.md's int-subtype/float/long/
/// double/object ladder). Returns `None` if no such neighbor exists yet,
/// or none of the candidates survive the trial merge.
fn tentative_candidate(graph: &ConstraintGraph, node: NodeId) -> Option<Type> {
	for &index in graph.driven(node) {
		let Constraint::Subtype { lo, hi } = graph.constraints()[index] else { continue };
		if lo != node {
			continue;
		}
		let hi_ty = graph.ty(hi);
		if hi_ty.is_unknown() {
			continue;
		}
		let candidate = if hi_ty.is_int_subtype() {
			Type::scalar(Kind::Boolean)
		} else if hi_ty == &Type::scalar(Kind::Float) {
			Type::scalar(Kind::Float)
		} else if hi_ty == &Type::scalar(Kind::Long) {
			Type::scalar(Kind::Long)
		} else if hi_ty == &Type::scalar(Kind::Double) {
			Type::scalar(Kind::Double)
		} else if hi_ty.is_reference_group() {
			Type::scalar(Kind::NonArrayObject)
		} else {
			continue;
		};
		if !candidate.merge(hi_ty).is_conflict() {
			return Some(candidate);
		}
	}
	None
}

/// The fixed safe defaults of SPEC_FULL.md §4.5: every `*-unknown` tag
/// has one listed default. `Kind::Unknown` and `Kind::AobjectUnknown`
/// aren't named there explicitly (they arise only when a register has no
/// reaching definition and no use at all survives to Phase 2); this
/// implementation's choice for those two — `int` and a same-dimension
/// untyped object array respectively — is recorded as an Open Question
/// resolution in `DESIGN.md`.
fn default_residual_type(ty: &Type) -> Type {
	match ty.kind {
		Kind::TrioUnknown | Kind::FiUnknown => Type::scalar(Kind::Boolean),
		Kind::DlUnknown => Type::scalar(Kind::Double),
		Kind::AfiUnknown => Type::new(Kind::Int, ty.dim),
		Kind::AdlUnknown => Type::new(Kind::Double, ty.dim),
		Kind::AcsUnknown => Type::new(Kind::Short, ty.dim),
		Kind::AobjectUnknown => Type::new(Kind::NonArrayObject, ty.dim),
		_ => Type::scalar(Kind::Int),
	}
}
