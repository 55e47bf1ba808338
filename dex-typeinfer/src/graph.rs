//! The constraint graph (SPEC_FULL.md §4.5 "Constraint model"): nodes are
//! either immutable type constants or mutable type variables rooted at a
//! `(insn, reg, is_source)` site, edges are inequalities `L ≤ R`.
//!
//! Grounded on `original_source/dare/decompiler/src/typing/type_solver.cpp`'s
//! `TypeVariable`/`TypeConstraint` pair, re-cast from pointer-linked nodes
//! into an arena addressed by [`NodeId`] (SPEC_FULL.md §9's "cyclic
//! graphs" redesign note). The element↔array `component_type_element`/
//! `array_type_element` pointers described there become a second
//! [`Constraint::DimLink`] edge kind instead of extra fields on [`Type`]
//! itself, so that the lattice stays free of solver bookkeeping.
//!
//! Object-move and array-element dimension translation (the DFS-restart
//! behaviour SPEC_FULL.md §4.5 describes for `move-object`/`aget-object`/
//! `aput-object`) is modeled here as a *local* constraint installed at the
//! instruction that needs it (a neutral bottom-object node for moves, a
//! `DimLink` for array element/array pairs) rather than as a special case
//! inside the seed traversal. Since graph nodes are deduplicated by
//! `(insn, reg, is_source)` identity, a local constraint and a DFS-time
//! restart reach the same fixed point — the local form is simpler to get
//! right and is the one implemented. See `DESIGN.md`.

use indexmap::IndexMap;

use dex_ir::{IrInsnId, Register, Type};

/// Identity of a type-variable node: one register use or def site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Site {
	pub insn: IrInsnId,
	pub register: Register,
	pub is_source: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone)]
struct Node {
	ty: Type,
	/// `true` for a type constant: its value is an immutable fact observed
	/// at a concrete use or def, never refined by saturation.
	constant: bool,
	site: Option<Site>,
}

/// One inequality edge. `Subtype` is the plain `L ≤ R` of SPEC_FULL.md
/// §4.5; `DimLink` is the element/array pairing described there, enforced
/// in both directions by the lattice rule (`hi.dim == lo.dim + 1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constraint {
	Subtype { lo: NodeId, hi: NodeId },
	DimLink { lo: NodeId, hi: NodeId },
}

/// The whole constraint graph for one method: nodes, deduplicated edges,
/// and the reverse index (`C` in SPEC_FULL.md §4.5) from a node to the
/// constraints it drives.
#[derive(Debug, Default)]
pub struct ConstraintGraph {
	nodes: Vec<Node>,
	constraints: Vec<Constraint>,
	constraint_set: IndexMap<Constraint, ()>,
	site_nodes: IndexMap<Site, NodeId>,
	driven_by: IndexMap<NodeId, Vec<usize>>,
	/// Sites named by an ambiguity seed (SPEC_FULL.md's "Ambiguity seeds"
	/// section), even if the [`Type`] that happened to be assigned there
	/// is not itself one of the `*-unknown` tags (e.g. `aget-object`'s
	/// component register: `NonArrayObject` is not an ambiguous [`Kind`],
	/// but it is still the target of a seed and must stay a mutable
	/// variable node, not get frozen as a type constant).
	seeded: IndexMap<Site, ()>,
}

impl ConstraintGraph {
	pub fn new() -> ConstraintGraph {
		ConstraintGraph::default()
	}

	pub fn mark_seeded(&mut self, insn: IrInsnId, register: Register, is_source: bool) {
		self.seeded.insert(Site { insn, register, is_source }, ());
	}

	fn push_node(&mut self, ty: Type, site: Option<Site>) -> NodeId {
		let constant = match site {
			Some(s) => !ty.is_unknown() && !self.seeded.contains_key(&s),
			None => !ty.is_unknown(),
		};
		let id = NodeId(self.nodes.len() as u32);
		self.nodes.push(Node { ty, constant, site });
		id
	}

	/// A fresh node with no site identity, for the neutral bottom-object
	/// intermediary an object-move installs, or a synthetic dummy
	/// element/array node a dimension translation needs.
	pub fn fresh(&mut self, ty: Type) -> NodeId {
		self.push_node(ty, None)
	}

	/// The node for `(insn, register, is_source)`, created on first use
	/// and deduplicated by identity thereafter (SPEC_FULL.md §4.5: "all
	/// nodes and edges are deduplicated by identity tuple").
	pub fn node_for_site(&mut self, insn: IrInsnId, register: Register, is_source: bool, current_type: Type) -> NodeId {
		let site = Site { insn, register, is_source };
		if let Some(&id) = self.site_nodes.get(&site) {
			return id;
		}
		let id = self.push_node(current_type, Some(site));
		self.site_nodes.insert(site, id);
		id
	}

	/// The node already created for `(insn, register, is_source)`, if any
	/// — used by write-back, which must never conjure a node for a site
	/// that never took part in constraint generation.
	pub fn existing_node_for_site(&self, insn: IrInsnId, register: Register, is_source: bool) -> Option<NodeId> {
		self.site_nodes.get(&Site { insn, register, is_source }).copied()
	}

	pub fn ty(&self, id: NodeId) -> &Type {
		&self.nodes[id.0 as usize].ty
	}

	pub fn is_constant(&self, id: NodeId) -> bool {
		self.nodes[id.0 as usize].constant
	}

	pub fn site(&self, id: NodeId) -> Option<Site> {
		self.nodes[id.0 as usize].site
	}

	fn record_driven(&mut self, node: NodeId, constraint_index: usize) {
		self.driven_by.entry(node).or_default().push(constraint_index);
	}

	fn add_constraint(&mut self, constraint: Constraint) {
		if self.constraint_set.contains_key(&constraint) {
			return;
		}
		let index = self.constraints.len();
		self.constraints.push(constraint);
		self.constraint_set.insert(constraint, ());
		match constraint {
			Constraint::Subtype { lo, .. } => self.record_driven(lo, index),
			Constraint::DimLink { lo, hi } => {
				self.record_driven(lo, index);
				self.record_driven(hi, index);
			},
		}
	}

	pub fn add_subtype(&mut self, lo: NodeId, hi: NodeId) {
		if lo == hi {
			return;
		}
		self.add_constraint(Constraint::Subtype { lo, hi });
	}

	pub fn add_dim_link(&mut self, lo: NodeId, hi: NodeId) {
		if lo == hi {
			return;
		}
		self.add_constraint(Constraint::DimLink { lo, hi });
	}

	pub fn constraints(&self) -> &[Constraint] {
		&self.constraints
	}

	pub fn driven(&self, node: NodeId) -> &[usize] {
		self.driven_by.get(&node).map_or(&[], |v| v.as_slice())
	}

	pub fn all_node_ids(&self) -> impl Iterator<Item = NodeId> {
		(0..self.nodes.len() as u32).map(NodeId)
	}

	/// Refines node `id`'s type towards `candidate` by the lattice merge.
	/// Returns `true` if the stored type changed (i.e. the node's
	/// dependents need to be re-examined).
	pub fn refine(&mut self, id: NodeId, candidate: &Type) -> RefineOutcome {
		if self.is_constant(id) {
			return RefineOutcome::Unchanged;
		}
		let current = self.ty(id).clone();
		let merged = candidate.merge(&current);
		if merged.is_conflict() {
			return RefineOutcome::Conflict;
		}
		if merged == current {
			RefineOutcome::Unchanged
		} else {
			self.nodes[id.0 as usize].ty = merged;
			RefineOutcome::Changed
		}
	}

	/// Unconditionally sets a variable node's type, used by the residual
	/// closure's tentative-typing and safe-default steps (SPEC_FULL.md
	/// §4.5 Phase 2), which assign rather than merge.
	pub fn force_type(&mut self, id: NodeId, ty: Type) {
		if !self.is_constant(id) {
			self.nodes[id.0 as usize].ty = ty;
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefineOutcome {
	Changed,
	Unchanged,
	Conflict,
}
