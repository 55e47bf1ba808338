//! The IR-insn model (C2): one decoded instruction with typed operands
//! and CFG edges.
//!
//! Shaped after `duke/src/tree/method/code.rs`'s `Instruction`/`Label`/
//! `Exception` trio (a target-language instruction list with labels and
//! a parallel exception table), generalized from "one target-language
//! instruction" to "one source-language instruction carrying its own
//! provisional and later fully-solved operand types", and fleshed out
//! with the exact field set named in
//! `original_source/dare/decompiler/include/tyde/tyde_instruction.h`:
//! `original_offset`, `index`, `label`, `reference`, `reachable`, plus
//! predecessor/successor edges (both normal and exception) installed by
//! the CFG builder.

use crate::types::Type;

/// Index of an [`IrInsn`] within its owning [`crate::body::MethodBody`].
/// An arena handle, not a pointer: see SPEC_FULL.md §9 on cyclic graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IrInsnId(pub u32);

impl IrInsnId {
	pub fn index(self) -> usize {
		self.0 as usize
	}
}

/// A register id as it appears on the wire: `vN`.
pub type Register = u16;

/// A typed operand: the register it reads or writes, and its (possibly
/// still ambiguous) type.
#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
	pub register: Register,
	pub ty: Type,
}

impl Operand {
	pub fn new(register: Register, ty: Type) -> Operand {
		Operand { register, ty }
	}
}

/// An opaque handle into a class's constant pool. Defined here (not in
/// `dex-constpool`) so that `IrInsn` can carry a `reference` without
/// `dex-ir` depending on `dex-constpool` (which itself depends on
/// `dex-ir` for [`Type`] and [`crate::name`]); `dex-constpool`'s
/// `ConstantPool::put_*` methods return and consume this same type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolRef(pub u32);

/// The Dalvik opcode families the decoder distinguishes. Grouped the way
/// SPEC_FULL.md §4.3 lists the decode schema rules, not by raw opcode
/// byte value (that table lives in `dex-decode::opcodes`); several
/// historical Dalvik opcodes that share identical typing behavior (e.g.
/// the various `const-wide/*` encodings) collapse onto one variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
	Nop,

	Move,
	MoveWide,
	MoveObject,
	MoveResult,
	MoveResultWide,
	MoveResultObject,
	MoveException,

	ReturnVoid,
	Return,
	ReturnWide,
	ReturnObject,

	/// 32-bit numeric constant; ambiguity depends on the literal value
	/// (zero vs non-zero), decided by `dex-decode`.
	Const32,
	/// 64-bit numeric constant (`dl-unknown` until solved).
	Const64,
	ConstString,
	ConstClass,

	MonitorEnter,
	MonitorExit,

	CheckCast,
	InstanceOf,
	ArrayLength,

	NewInstance,
	NewArray,
	FilledNewArray,
	FillArrayData,

	Throw,
	Goto,
	PackedSwitch,
	SparseSwitch,

	/// `cmpl-float`/`cmpg-float`/`cmpl-double`/`cmpg-double`/`cmp-long`:
	/// result is always `int`, operand types fixed by the opcode.
	Cmp,
	/// `if-eq`/`if-ne`: both operands `trio-unknown` until solved.
	IfEqNe,
	/// `if-lt`/`if-ge`/`if-gt`/`if-le`: both operands `int`.
	IfOrdered,
	/// `if-eqz`/`if-nez`: the original treats these like `if-eq v, 0`,
	/// but against a synthetic zero they resolve immediately to the
	/// single operand's own declared-or-inferred type; modeled as a
	/// single-source instruction rather than forcing a phantom register.
	IfZero,

	AgetBoolean, AgetByte, AgetChar, AgetShort,
	/// generic 32-bit `aget`/`aget-float`: ambiguous (`afi-unknown`).
	Aget,
	AgetWide,
	AgetObject,

	AputBoolean, AputByte, AputChar, AputShort,
	Aput,
	AputWide,
	AputObject,

	IgetBoolean, IgetByte, IgetChar, IgetShort, Iget, IgetWide, IgetObject,
	IputBoolean, IputByte, IputChar, IputShort, Iput, IputWide, IputObject,
	SgetBoolean, SgetByte, SgetChar, SgetShort, Sget, SgetWide, SgetObject,
	SputBoolean, SputByte, SputChar, SputShort, Sput, SputWide, SputObject,

	InvokeVirtual,
	InvokeSuper,
	InvokeDirect,
	InvokeStatic,
	InvokeInterface,

	UnaryOp,
	BinaryOp,
	BinaryOpLit,

	/// Synthesized replacement for a verifier-flagged instruction or
	/// whole method; see SPEC_FULL.md §4.3 and §7.
	VerifyError,
}

impl Opcode {
	pub fn can_throw(self) -> bool {
		!matches!(self,
			Opcode::Nop | Opcode::Move | Opcode::MoveWide | Opcode::MoveObject |
			Opcode::MoveResult | Opcode::MoveResultWide | Opcode::MoveResultObject |
			Opcode::Goto | Opcode::IfEqNe | Opcode::IfOrdered | Opcode::IfZero |
			Opcode::Const32 | Opcode::Const64 | Opcode::UnaryOp | Opcode::BinaryOp | Opcode::BinaryOpLit |
			Opcode::Cmp | Opcode::ReturnVoid | Opcode::Return | Opcode::ReturnWide | Opcode::ReturnObject)
	}

	pub fn can_branch(self) -> bool {
		matches!(self, Opcode::Goto | Opcode::IfEqNe | Opcode::IfOrdered | Opcode::IfZero |
			Opcode::PackedSwitch | Opcode::SparseSwitch)
	}

	pub fn falls_through(self) -> bool {
		!matches!(self, Opcode::Goto | Opcode::ReturnVoid | Opcode::Return | Opcode::ReturnWide |
			Opcode::ReturnObject | Opcode::Throw)
	}

	pub fn is_return(self) -> bool {
		matches!(self, Opcode::ReturnVoid | Opcode::Return | Opcode::ReturnWide | Opcode::ReturnObject)
	}

	pub fn is_move_result(self) -> bool {
		matches!(self, Opcode::MoveResult | Opcode::MoveResultWide | Opcode::MoveResultObject)
	}

	pub fn is_invoke(self) -> bool {
		matches!(self, Opcode::InvokeVirtual | Opcode::InvokeSuper | Opcode::InvokeDirect |
			Opcode::InvokeStatic | Opcode::InvokeInterface)
	}
}

/// Opcode-specific side data that doesn't fit the uniform
/// sources/destination/reference shape. Grounded on
/// `original_source/.../tyde_instruction.cpp`'s per-opcode payload
/// fields (switch tables, fill-array words, filled-new-array's element
/// type, the injected verifier-error descriptor).
#[derive(Debug, Clone, PartialEq)]
pub enum InsnData {
	None,
	/// Raw bits of a 32-bit numeric constant, before C7 has decided
	/// whether it denotes an `int` or a `float` constant-pool entry.
	Const32(i32),
	/// Raw bits of a 64-bit numeric constant, before C7 has decided
	/// `long` vs `double`.
	Const64(i64),
	/// Packed-switch payload: consecutive keys starting at `first_key`,
	/// `targets[i]` is the original offset of the i-th case.
	PackedSwitch { first_key: i32, targets: Vec<u32> },
	/// Sparse-switch payload: explicit (key, original-offset-target) pairs.
	SparseSwitch { entries: Vec<(i32, u32)> },
	/// fill-array-data payload: raw words at the source element width.
	/// `refs` parallels `words` one-for-one; the decoder (C4) leaves it
	/// empty, and C7 (`dex_constpool::promote_constants`) fills it in
	/// with each element's constant-pool reference once the array's
	/// component type is known.
	FillArrayData { element_width: u32, words: Vec<i64>, refs: Vec<PoolRef> },
	/// The resolved element type of a `new-array`/`filled-new-array`.
	ArrayComponent(Type),
	/// Shifted `original_offset` of a `goto`/`if-*` branch's taken target,
	/// resolved to an [`crate::body::MethodBody`] position by the CFG
	/// builder (`packed-switch`/`sparse-switch` targets live in
	/// [`InsnData::PackedSwitch`]/[`InsnData::SparseSwitch`] instead, since
	/// there can be more than one).
	BranchTarget(u32),
	/// A synthesized verification error: the exception class to throw,
	/// and whether this replaces the whole method body.
	VerifyError { descriptor: crate::name::ClassName, whole_method: bool },
}

/// One decoded (and, over the pipeline's lifetime, progressively refined)
/// instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct IrInsn {
	pub opcode: Opcode,
	/// Position in the *original* Dalvik code-unit stream; stable across
	/// insertions, used to resolve branch/try-region offsets.
	pub original_offset: u32,
	/// Position in the containing [`crate::body::MethodBody`]; recomputed
	/// by `refresh_indices_from` after insertion.
	pub index: usize,
	/// `-1` if nothing branches here yet; assigned the first time some
	/// branch or try-region needs to target this instruction.
	pub label: i32,
	pub sources: Vec<Operand>,
	pub destination: Option<Operand>,
	pub reference: Option<PoolRef>,
	pub data: InsnData,

	pub successors: Vec<IrInsnId>,
	pub predecessors: Vec<IrInsnId>,
	pub exception_successors: Vec<IrInsnId>,
	pub exception_predecessors: Vec<IrInsnId>,

	pub reachable: bool,
}

impl IrInsn {
	pub fn new(opcode: Opcode, original_offset: u32) -> IrInsn {
		IrInsn {
			opcode,
			original_offset,
			index: 0,
			label: -1,
			sources: Vec::new(),
			destination: None,
			reference: None,
			data: InsnData::None,
			successors: Vec::new(),
			predecessors: Vec::new(),
			exception_successors: Vec::new(),
			exception_predecessors: Vec::new(),
			reachable: false,
		}
	}

	pub fn with_sources(mut self, sources: Vec<Operand>) -> IrInsn {
		self.sources = sources;
		self
	}

	pub fn with_destination(mut self, destination: Operand) -> IrInsn {
		self.destination = Some(destination);
		self
	}

	pub fn with_data(mut self, data: InsnData) -> IrInsn {
		self.data = data;
		self
	}

	pub fn ensure_label(&mut self, next_label: &mut i32) -> i32 {
		if self.label < 0 {
			self.label = *next_label;
			*next_label += 1;
		}
		self.label
	}
}
