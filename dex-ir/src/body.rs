//! The method body (C3): an ordered arena of [`IrInsn`]s plus the
//! method's try-region table.
//!
//! Grounded on `duke/src/tree/method/code.rs`'s `Code` struct (an
//! instruction list alongside a parallel `exception_table`), generalized
//! to carry the source-side try semantics (multiple typed handlers plus
//! an optional catch-all per region, per
//! `original_source/dare/decompiler/include/tyde/body.h`) rather than
//! the target-side single-handler-per-entry JVM exception table shape.

use crate::insn::{IrInsn, IrInsnId};
use crate::name::ClassName;

/// One exception handler entry of a [`TryItem`]: `caught_type = None`
/// denotes a catch-all (`catch-all` in the raw try-table, or a Java
/// `finally` handler).
#[derive(Debug, Clone, PartialEq)]
pub struct Handler {
	pub caught_type: Option<ClassName>,
	pub target: IrInsnId,
}

/// A contiguous, half-open instruction range `[start, end_exclusive)`
/// with its handlers, in source try-table order (first match wins, as
/// in the JVM and Dalvik alike).
#[derive(Debug, Clone, PartialEq)]
pub struct TryItem {
	pub start: IrInsnId,
	pub end_exclusive: IrInsnId,
	pub handlers: Vec<Handler>,
}

impl TryItem {
	/// `true` once [`crate::body`]'s dead-region removal has dropped every
	/// handler (this try-item no longer has any effect and should itself
	/// be dropped).
	pub fn is_empty(&self) -> bool {
		self.handlers.is_empty()
	}
}

/// The decoded, CFG-annotated, (eventually) fully typed body of one
/// method. Owns every [`IrInsn`] in an arena addressed by [`IrInsnId`];
/// the first and last entries are always the synthetic sentinel `nop`s
/// C4 installs (SPEC_FULL.md §4.3's decoder contract), so a well-formed
/// body always has `insns.len() >= 2`.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodBody {
	pub insns: Vec<IrInsn>,
	pub try_items: Vec<TryItem>,
	pub num_registers: u16,
	pub num_incoming_args: u16,
	next_label: i32,
}

impl MethodBody {
	pub fn new(num_registers: u16, num_incoming_args: u16) -> MethodBody {
		MethodBody {
			insns: Vec::new(),
			try_items: Vec::new(),
			num_registers,
			num_incoming_args,
			next_label: 0,
		}
	}

	pub fn get(&self, id: IrInsnId) -> &IrInsn {
		&self.insns[id.index()]
	}

	pub fn get_mut(&mut self, id: IrInsnId) -> &mut IrInsn {
		&mut self.insns[id.index()]
	}

	pub fn len(&self) -> usize {
		self.insns.len()
	}

	pub fn is_empty(&self) -> bool {
		self.insns.is_empty()
	}

	pub fn first_id(&self) -> IrInsnId {
		IrInsnId(0)
	}

	pub fn last_id(&self) -> IrInsnId {
		IrInsnId(self.insns.len() as u32 - 1)
	}

	pub fn ids(&self) -> impl Iterator<Item = IrInsnId> {
		(0..self.insns.len() as u32).map(IrInsnId)
	}

	/// Appends an instruction at the end of the body, returning its id.
	/// Used by the decoder, which always appends in original-offset
	/// order, and never needs mid-body renumbering.
	pub fn push(&mut self, mut insn: IrInsn) -> IrInsnId {
		let id = IrInsnId(self.insns.len() as u32);
		insn.index = id.index();
		self.insns.push(insn);
		id
	}

	/// Splices `insn` in before `before`, shifting every later
	/// instruction's index and every `IrInsnId`-by-position reference —
	/// every successor/predecessor/exception edge on every instruction,
	/// and every `try_items` bound and handler target. Only the CFG
	/// builder's branch-range patching (SPEC_FULL.md §4.5) uses this;
	/// everywhere else builds the body by appending.
	///
	/// Returns the id of the newly inserted instruction; `before`'s own id
	/// shifts by one, and any `IrInsnId` a caller cached before this call
	/// must be re-read from the body afterwards rather than reused, since
	/// this only rewrites references stored *in* the body.
	pub fn insert_before(&mut self, before: IrInsnId, insn: IrInsn) -> IrInsnId {
		let at = before.index();
		self.shift_ids_from(at, 1);
		self.insns.insert(at, insn);
		self.refresh_indices_from(at);
		IrInsnId(at as u32)
	}

	/// Recomputes `index` for every instruction from `from` (inclusive)
	/// to the end of the body. Does not move any instruction; callers
	/// that insert or remove must call this immediately afterwards, as
	/// `IrInsnId` is a plain position index into `insns`.
	pub fn refresh_indices_from(&mut self, from: usize) {
		for i in from..self.insns.len() {
			self.insns[i].index = i;
		}
	}

	/// Adds `delta` to every stored `IrInsnId` at or past position `at` —
	/// every edge list on every instruction, and every `try_items` bound
	/// and handler target — so that a splice at `at` doesn't leave any
	/// cross-reference pointing at the wrong instruction.
	fn shift_ids_from(&mut self, at: usize, delta: u32) {
		let remap = |id: IrInsnId| if id.index() >= at { IrInsnId(id.0 + delta) } else { id };
		for insn in &mut self.insns {
			for s in &mut insn.successors { *s = remap(*s); }
			for p in &mut insn.predecessors { *p = remap(*p); }
			for s in &mut insn.exception_successors { *s = remap(*s); }
			for p in &mut insn.exception_predecessors { *p = remap(*p); }
		}
		for item in &mut self.try_items {
			item.start = remap(item.start);
			item.end_exclusive = remap(item.end_exclusive);
			for h in &mut item.handlers {
				h.target = remap(h.target);
			}
		}
	}

	pub fn fresh_label(&mut self) -> i32 {
		let label = self.next_label;
		self.next_label += 1;
		label
	}

	/// Installs a successor edge `from -> to` and the matching
	/// predecessor edge `to -> from` (SPEC_FULL.md §8 property 3: edge
	/// symmetry).
	pub fn add_successor(&mut self, from: IrInsnId, to: IrInsnId) {
		if !self.get(from).successors.contains(&to) {
			self.get_mut(from).successors.push(to);
		}
		if !self.get(to).predecessors.contains(&from) {
			self.get_mut(to).predecessors.push(from);
		}
	}

	/// Installs an exception edge `from -> handler` and its predecessor
	/// twin, mirroring [`Self::add_successor`] but on the exception-edge
	/// lists.
	pub fn add_exception_edge(&mut self, from: IrInsnId, handler: IrInsnId) {
		if !self.get(from).exception_successors.contains(&handler) {
			self.get_mut(from).exception_successors.push(handler);
		}
		if !self.get(handler).exception_predecessors.contains(&from) {
			self.get_mut(handler).exception_predecessors.push(from);
		}
	}

	/// Binary search by `original_offset`; every offset used for branch
	/// and try-region resolution must name an instruction that exists
	/// (either a real decoded instruction or one of the two sentinels).
	pub fn find_by_original_offset(&self, offset: u32) -> Option<IrInsnId> {
		self.insns.binary_search_by_key(&offset, |insn| insn.original_offset)
			.ok()
			.map(|i| IrInsnId(i as u32))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::insn::Opcode;
	use pretty_assertions::assert_eq;

	fn body_with(offsets: &[u32]) -> MethodBody {
		let mut body = MethodBody::new(4, 1);
		for &offset in offsets {
			body.push(IrInsn::new(Opcode::Nop, offset));
		}
		body
	}

	#[test]
	fn push_assigns_sequential_indices() {
		let body = body_with(&[0, 1, 2, 4]);
		for (i, insn) in body.insns.iter().enumerate() {
			assert_eq!(insn.index, i);
		}
	}

	#[test]
	fn edges_are_symmetric() {
		let mut body = body_with(&[0, 1, 2]);
		body.add_successor(IrInsnId(0), IrInsnId(2));
		assert_eq!(body.get(IrInsnId(0)).successors, vec![IrInsnId(2)]);
		assert_eq!(body.get(IrInsnId(2)).predecessors, vec![IrInsnId(0)]);
	}

	#[test]
	fn find_by_offset() {
		let body = body_with(&[0, 2, 4, 10]);
		assert_eq!(body.find_by_original_offset(4), Some(IrInsnId(2)));
		assert_eq!(body.find_by_original_offset(5), None);
	}

	#[test]
	fn insert_before_refreshes_indices() {
		let mut body = body_with(&[0, 1, 2]);
		body.insert_before(IrInsnId(1), IrInsn::new(Opcode::Nop, 100));
		assert_eq!(body.len(), 4);
		for (i, insn) in body.insns.iter().enumerate() {
			assert_eq!(insn.index, i);
		}
	}

	#[test]
	fn insert_before_shifts_edges_and_try_items() {
		let mut body = body_with(&[0, 1, 2, 3]);
		body.add_successor(IrInsnId(0), IrInsnId(3));
		body.add_exception_edge(IrInsnId(1), IrInsnId(3));
		body.try_items.push(TryItem {
			start: IrInsnId(1),
			end_exclusive: IrInsnId(3),
			handlers: vec![Handler { caught_type: None, target: IrInsnId(3) }],
		});

		body.insert_before(IrInsnId(2), IrInsn::new(Opcode::Nop, 100));

		assert_eq!(body.get(IrInsnId(0)).successors, vec![IrInsnId(4)]);
		assert_eq!(body.get(IrInsnId(4)).predecessors, vec![IrInsnId(0)]);
		assert_eq!(body.get(IrInsnId(1)).exception_successors, vec![IrInsnId(4)]);
		assert_eq!(body.get(IrInsnId(4)).exception_predecessors, vec![IrInsnId(1)]);

		let item = &body.try_items[0];
		assert_eq!(item.start, IrInsnId(1));
		assert_eq!(item.end_exclusive, IrInsnId(4));
		assert_eq!(item.handlers[0].target, IrInsnId(4));
	}
}
