//! C4: decodes a raw Dalvik method body into the [`dex_ir`] model.
//!
//! This crate owns exactly the part of the pipeline that reads Dalvik
//! bytecode: the opcode table ([`opcodes`]), the raw input shape
//! ([`raw`]), payload (switch/fill-array-data) parsing ([`payload`]), the
//! by-index reference resolver seam ([`resolver`]) and the decode loop
//! itself ([`decode`]). CFG construction (C5) and type solving (C6) are
//! separate crates that consume a [`decode::DecodeOutput`].

pub mod opcodes;
pub mod payload;
pub mod raw;
pub mod resolver;
pub mod decode;

pub use decode::{decode_method, AmbiguitySeeds, DecodeError, DecodeOutput};
pub use raw::{RawHandler, RawMethodBody, RawTryItem};
pub use resolver::ReferenceResolver;
