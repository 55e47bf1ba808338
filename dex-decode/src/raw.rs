//! The decoder's raw input types (SPEC_FULL.md §4.3.1), mirroring the
//! wire shape named in §6: a length-prefixed stream of 16-bit code
//! units, a register/argument count, a declared signature, and a
//! try-table of raw (not yet instruction-resolved) ranges.

use dex_ir::{ClassName, Type};

/// One `(caught_type, handler_offset)` entry of a [`RawTryItem`], plus an
/// optional catch-all handler offset.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHandler {
	pub caught_type: Option<ClassName>,
	pub handler_offset: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawTryItem {
	pub start_offset: u32,
	/// Instruction count covered, in Dalvik's own accounting (code units
	/// of the *covered instructions*, not a raw code-unit count) per
	/// SPEC_FULL.md §6.
	pub insn_count: u32,
	pub handlers: Vec<RawHandler>,
}

/// The raw, not-yet-decoded body of one method: exactly what a DEX
/// container parser hands to this crate.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMethodBody {
	pub code_units: Vec<u16>,
	pub num_registers: u16,
	pub num_incoming_args: u16,
	pub is_static: bool,
	pub return_type: Type,
	pub parameter_types: Vec<Type>,
	pub declaring_class: ClassName,
	pub try_items: Vec<RawTryItem>,
}
