//! Core data model shared by every stage of the Dalvik-to-classfile
//! retargeting pipeline: the [`types`] lattice (C1), the [`insn`] model
//! (C2) and the [`body`] container (C3).
//!
//! Everything here is pure data plus the operations that only need the
//! data itself (merging types, walking/renumbering a method body). The
//! actual decoding, CFG construction, type solving and constant promotion
//! live in their own crates and operate on the types defined here.

pub mod name;
pub mod types;
pub mod insn;
pub mod body;

pub use name::{ClassName, FieldName, MethodName, FieldRef, MethodRef};
pub use types::{Kind, Type};
pub use insn::{IrInsn, IrInsnId, InsnData, Opcode, Operand, PoolRef, Register};
pub use body::{MethodBody, TryItem, Handler};
