//! C5: builds the control-flow graph over an already-decoded method body —
//! normal successor/predecessor edges, exception edges from the raw
//! try-table, reachability, dead try-region pruning, and (for
//! unusually large methods) splicing trampoline `goto`s so a narrow
//! conditional-branch offset stays representable.
//!
//! Grounded on `original_source/dare/decompiler/src/tyde/cfg_builder.cpp`'s
//! `CFGBuilder`, a set of static methods run in sequence
//! (`AddSuccessors`, `AddExceptionSuccessors`, `RemoveDeadTries`,
//! `CheckAndPatchOffsets`); here they become ordinary functions called in
//! the same order from [`build_cfg`].

use std::collections::VecDeque;

use dex_constpool::ConstantPool;
use dex_ir::body::{Handler, TryItem};
use dex_ir::{IrInsn, IrInsnId, InsnData, MethodBody, Opcode};
use dex_decode::raw::RawTryItem;

/// Tunables with no single canonical value in the Dalvik/JVM formats
/// themselves; left as constructor knobs for the driver (SPEC_FULL.md
/// §4.4 calls both "configured").
#[derive(Debug, Clone)]
pub struct CfgConfig {
	/// When `true` (the default), a try-region is split into the maximal
	/// subranges that actually begin with a throw-capable instruction,
	/// rather than kept as one region spanning every instruction between
	/// the raw start and end offsets.
	pub split_exception_tables: bool,
	/// Above this many IR-insns, conditional branches whose target is
	/// more than this many insn-indices away get trampoline `goto`s
	/// spliced in. `None` disables the pass entirely.
	pub branch_patch_threshold: Option<usize>,
}

impl Default for CfgConfig {
	fn default() -> CfgConfig {
		CfgConfig { split_exception_tables: true, branch_patch_threshold: Some(20_000) }
	}
}

/// Runs the full C5 pipeline over `body` in place. `try_items` is the raw
/// (code-unit-offset) try-table from the input method; offsets are
/// shifted by one to match the sentinel scheme C4 applies to
/// `original_offset` (see `dex_decode::decode` module docs).
pub fn build_cfg(body: &mut MethodBody, try_items: &[RawTryItem], pool: &mut ConstantPool, config: &CfgConfig) -> anyhow::Result<()> {
	add_successors(body);
	add_exception_successors(body, try_items, pool, config)?;
	compute_reachability(body);
	remove_dead_tries(body);
	if let Some(threshold) = config.branch_patch_threshold {
		patch_branch_offsets(body, threshold);
	}
	Ok(())
}

fn find_by_offset(body: &MethodBody, offset: u32) -> anyhow::Result<IrInsnId> {
	body.find_by_original_offset(offset)
		.ok_or_else(|| anyhow::anyhow!("no instruction at original offset {offset}"))
}

fn ensure_label(body: &mut MethodBody, id: IrInsnId) {
	if body.get(id).label < 0 {
		let label = body.fresh_label();
		body.get_mut(id).label = label;
	}
}

fn add_successors(body: &mut MethodBody) {
	for i in 0..body.len() {
		let id = IrInsnId(i as u32);
		let opcode = body.get(id).opcode;

		if opcode.falls_through() && i + 1 < body.len() {
			body.add_successor(id, IrInsnId((i + 1) as u32));
		}

		match body.get(id).data.clone() {
			InsnData::BranchTarget(target_offset) => {
				if let Some(target) = body.find_by_original_offset(target_offset) {
					body.add_successor(id, target);
					ensure_label(body, target);
				} else {
					log::warn!("branch at offset {} names unresolvable target {target_offset}", body.get(id).original_offset);
				}
			},
			InsnData::PackedSwitch { targets, .. } => {
				for target_offset in targets {
					if let Some(target) = body.find_by_original_offset(target_offset) {
						body.add_successor(id, target);
						ensure_label(body, target);
					}
				}
			},
			InsnData::SparseSwitch { entries } => {
				for (_, target_offset) in entries {
					if let Some(target) = body.find_by_original_offset(target_offset) {
						body.add_successor(id, target);
						ensure_label(body, target);
					}
				}
			},
			_ => {},
		}
	}
}

/// A maximal `[start, end)` instruction-index subrange whose members all
/// can throw, per `AnalyzeThrowable`.
fn throwable_subranges(body: &MethodBody, start: usize, end: usize) -> Vec<(usize, usize)> {
	let mut ranges = Vec::new();
	let mut current_start: Option<usize> = None;
	for i in start..end {
		if body.insns[i].opcode.can_throw() {
			current_start.get_or_insert(i);
		} else if let Some(s) = current_start.take() {
			ranges.push((s, i));
		}
	}
	if let Some(s) = current_start {
		ranges.push((s, end));
	}
	ranges
}

fn add_exception_successors(body: &mut MethodBody, try_items: &[RawTryItem], pool: &mut ConstantPool, config: &CfgConfig) -> anyhow::Result<()> {
	let mut resolved: Vec<TryItem> = Vec::new();

	for raw in try_items {
		let start = find_by_offset(body, raw.start_offset + 1)?;
		let end_exclusive = find_by_offset(body, raw.start_offset + raw.insn_count + 1)?;

		let mut handlers = Vec::with_capacity(raw.handlers.len());
		for raw_handler in &raw.handlers {
			let target = find_by_offset(body, raw_handler.handler_offset + 1)?;
			ensure_label(body, target);
			if let Some(caught_type) = &raw_handler.caught_type {
				pool.put_class(caught_type.clone());
			}
			handlers.push(Handler { caught_type: raw_handler.caught_type.clone(), target });
		}

		if config.split_exception_tables {
			for (sub_start, sub_end) in throwable_subranges(body, start.index(), end_exclusive.index()) {
				ensure_label(body, IrInsnId(sub_start as u32));
				ensure_label(body, IrInsnId(sub_end as u32));
				resolved.push(TryItem { start: IrInsnId(sub_start as u32), end_exclusive: IrInsnId(sub_end as u32), handlers: handlers.clone() });
			}
		} else {
			ensure_label(body, start);
			ensure_label(body, end_exclusive);
			resolved.push(TryItem { start, end_exclusive, handlers });
		}
	}

	for try_item in &resolved {
		let first = try_item.start.index();
		let last = try_item.end_exclusive.index();
		for handler in &try_item.handlers {
			for k in first..last {
				let covers = config.split_exception_tables || body.insns[k].opcode.can_throw();
				if !covers {
					continue;
				}
				let predecessors = body.get(IrInsnId(k as u32)).predecessors.clone();
				for pred in predecessors {
					body.add_exception_edge(pred, handler.target);
				}
			}
		}
	}

	body.try_items = resolved;
	Ok(())
}

fn compute_reachability(body: &mut MethodBody) {
	let mut visited = vec![false; body.len()];
	let mut queue = VecDeque::new();
	queue.push_back(body.first_id());

	while let Some(id) = queue.pop_front() {
		if visited[id.index()] {
			continue;
		}
		visited[id.index()] = true;
		body.get_mut(id).reachable = true;
		for next in body.get(id).successors.clone() {
			queue.push_back(next);
		}
		for next in body.get(id).exception_successors.clone() {
			queue.push_back(next);
		}
	}
}

fn remove_dead_tries(body: &mut MethodBody) {
	let mut kept = Vec::with_capacity(body.try_items.len());
	for mut try_item in std::mem::take(&mut body.try_items) {
		try_item.handlers.retain(|h| body.get(h.target).reachable);
		if !try_item.handlers.is_empty() {
			kept.push(try_item);
		} else {
			log::warn!("dropping try-region with no reachable handlers left");
		}
	}
	body.try_items = kept;
}

fn remove_successor_edge(body: &mut MethodBody, from: IrInsnId, to: IrInsnId) {
	body.get_mut(from).successors.retain(|&s| s != to);
	body.get_mut(to).predecessors.retain(|&p| p != from);
}

/// `original_source/.../cfg_builder.cpp`'s `CheckAndPatchOffsets` /
/// `CheckOffsetAtInstruction`: for a method long enough that a narrow
/// branch offset might not reach, replace each overlong conditional
/// branch's two edges with trampoline `goto`s, so the conditional branch
/// itself only ever needs to reach an adjacent instruction.
fn patch_branch_offsets(body: &mut MethodBody, threshold: usize) {
	if body.len() < threshold {
		return;
	}

	let mut idx = body.len();
	while idx > 0 {
		idx -= 1;
		let id = IrInsnId(idx as u32);
		if !matches!(body.get(id).opcode, Opcode::IfEqNe | Opcode::IfOrdered | Opcode::IfZero) {
			continue;
		}
		if body.get(id).successors.len() < 2 {
			continue;
		}

		let fallthrough = body.get(id).successors[0];
		let target = body.get(id).successors[1];
		let gap = (target.index() as isize - idx as isize).unsigned_abs();
		if gap <= threshold {
			continue;
		}

		let offset = body.get(id).original_offset;
		let fallthrough_offset = body.get(fallthrough).original_offset;
		let target_offset = body.get(target).original_offset;
		let insert_pos = idx + 1;

		let mut to_fallthrough = IrInsn::new(Opcode::Goto, offset);
		to_fallthrough.data = InsnData::BranchTarget(fallthrough_offset);
		let tramp_ft = body.insert_before(IrInsnId(insert_pos as u32), to_fallthrough);

		let mut to_target = IrInsn::new(Opcode::Goto, offset);
		to_target.data = InsnData::BranchTarget(target_offset);
		let tramp_target = body.insert_before(IrInsnId((insert_pos + 1) as u32), to_target);

		// Both splices have already shifted every stored `IrInsnId`,
		// including `id`'s own successors, so the live fallthrough/target
		// ids are read back from the graph instead of patched by hand.
		let fallthrough = body.get(id).successors[0];
		let target = body.get(id).successors[1];

		remove_successor_edge(body, id, fallthrough);
		remove_successor_edge(body, id, target);
		body.add_successor(id, tramp_ft);
		body.add_successor(id, tramp_target);
		body.add_successor(tramp_ft, fallthrough);
		body.add_successor(tramp_target, target);
		ensure_label(body, tramp_ft);
		ensure_label(body, tramp_target);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use dex_ir::{ClassName, Kind, Operand, Type};
	use dex_decode::raw::RawHandler;
	use pretty_assertions::assert_eq;

	fn body_nop_chain(offsets: &[u32]) -> MethodBody {
		let mut body = MethodBody::new(2, 1);
		for &offset in offsets {
			body.push(IrInsn::new(Opcode::Nop, offset));
		}
		body
	}

	#[test]
	fn fallthrough_chain_links_successors() {
		let mut body = body_nop_chain(&[0, 1, 2]);
		add_successors(&mut body);
		assert_eq!(body.get(IrInsnId(0)).successors, vec![IrInsnId(1)]);
		assert_eq!(body.get(IrInsnId(1)).successors, vec![IrInsnId(2)]);
		assert!(body.get(IrInsnId(2)).successors.is_empty());
	}

	#[test]
	fn goto_adds_branch_successor_and_label() {
		let mut body = body_nop_chain(&[0, 1, 2]);
		body.get_mut(IrInsnId(0)).opcode = Opcode::Goto;
		body.get_mut(IrInsnId(0)).data = InsnData::BranchTarget(2);
		add_successors(&mut body);
		assert_eq!(body.get(IrInsnId(0)).successors, vec![IrInsnId(2)]);
		assert!(body.get(IrInsnId(2)).label >= 0);
	}

	#[test]
	fn reachability_excludes_unreachable_handler() {
		let mut body = body_nop_chain(&[0, 1, 2, 3]);
		// 0 -> 1 (fallthrough), 2 is only reachable via a try handler we won't wire up.
		add_successors(&mut body);
		body.get_mut(IrInsnId(1)).opcode = Opcode::ReturnVoid;
		body.get_mut(IrInsnId(1)).successors.clear();
		compute_reachability(&mut body);
		assert!(body.get(IrInsnId(0)).reachable);
		assert!(body.get(IrInsnId(1)).reachable);
		assert!(!body.get(IrInsnId(2)).reachable);
		assert!(!body.get(IrInsnId(3)).reachable);
	}

	#[test]
	fn exception_edges_attach_from_predecessors_of_throwing_insn() {
		let mut body = body_nop_chain(&[0, 1, 2, 3, 4]);
		body.get_mut(IrInsnId(1)).opcode = Opcode::Throw;
		body.get_mut(IrInsnId(1)).sources = vec![Operand::new(0, Type::scalar(Kind::NonArrayObject))];
		add_successors(&mut body);

		let mut pool = ConstantPool::new();
		let try_items = vec![RawTryItem {
			start_offset: 1,
			insn_count: 1,
			handlers: vec![RawHandler { caught_type: Some(ClassName::from("java/lang/Exception")), handler_offset: 3 }],
		}];
		let config = CfgConfig { split_exception_tables: true, branch_patch_threshold: None };
		add_exception_successors(&mut body, &try_items, &mut pool, &config).unwrap();

		assert_eq!(body.try_items.len(), 1);
		let handler_target = body.try_items[0].handlers[0].target;
		assert_eq!(handler_target, IrInsnId(4));
		assert_eq!(body.get(IrInsnId(1)).exception_successors, vec![IrInsnId(4)]);
	}

	/// S6-style scenario: a conditional branch whose target is farther
	/// away than the configured threshold gets its two edges replaced by
	/// trampoline `goto`s, so the conditional itself only ever needs to
	/// reach an adjacent instruction.
	#[test]
	fn overlong_conditional_branch_gets_trampoline_gotos() {
		let offsets: Vec<u32> = (0..10).collect();
		let mut body = body_nop_chain(&offsets);
		body.get_mut(IrInsnId(0)).opcode = Opcode::IfEqNe;
		body.get_mut(IrInsnId(0)).sources = vec![
			Operand::new(0, Type::scalar(Kind::Int)),
			Operand::new(1, Type::scalar(Kind::Int)),
		];
		body.get_mut(IrInsnId(0)).data = InsnData::BranchTarget(9);
		add_successors(&mut body);
		assert_eq!(body.get(IrInsnId(0)).successors, vec![IrInsnId(1), IrInsnId(9)]);

		let original_len = body.len();
		patch_branch_offsets(&mut body, 3);

		assert_eq!(body.len(), original_len + 2, "two trampoline gotos should have been spliced in");
		let successors = body.get(IrInsnId(0)).successors.clone();
		assert_eq!(successors.len(), 2);
		for &succ in &successors {
			assert_eq!(body.get(succ).opcode, Opcode::Goto, "the conditional's edges must now point at trampoline gotos");
		}

		let fallthrough_tramp = successors[0];
		let target_tramp = successors[1];
		assert_eq!(body.get(fallthrough_tramp).successors, vec![IrInsnId(3)]);
		assert_eq!(body.get(target_tramp).successors, vec![IrInsnId(11)]);
	}

	#[test]
	fn dead_try_region_with_unreachable_handler_is_dropped() {
		let mut body = body_nop_chain(&[0, 1, 2]);
		add_successors(&mut body);
		body.try_items = vec![TryItem {
			start: IrInsnId(0),
			end_exclusive: IrInsnId(1),
			handlers: vec![Handler { caught_type: None, target: IrInsnId(2) }],
		}];
		// IrInsnId(2) has no incoming edges at all, so it's unreachable.
		compute_reachability(&mut body);
		remove_dead_tries(&mut body);
		assert!(body.try_items.is_empty());
	}
}
