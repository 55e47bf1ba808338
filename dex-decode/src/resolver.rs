//! The decoder's view onto the raw DEX container's own constant pool.
//!
//! SPEC_FULL.md §1 names "the raw container parser (DEX reader)" as an
//! external collaborator that "provides ... strings, type/field/method
//! references"; this crate does not parse the `.dex` binary constant-pool
//! format itself. Instead it depends on this trait, grounded on
//! `duke/src/class_reader.rs`'s `PoolRead` (`pool.get_class(index)`,
//! `pool.get_optional(...)`) — a by-index resolver the reader hands to
//! decode logic so the decode *schema* (SPEC_FULL.md §4.3) stays testable
//! against a fake resolver instead of a real `.dex` file.
//!
//! A reference-resolution miss (index absent from the input) is not
//! fatal (SPEC_FULL.md §7): implementations are expected to consult
//! `dex_constpool::StubRegistry` and return a synthesized stand-in rather
//! than erroring, which is why every method here returns the resolved
//! value directly rather than a `Result`.

use dex_ir::{ClassName, FieldRef, MethodRef};

#[cfg(test)]
use dex_ir::{FieldName, MethodName};

/// Resolves the by-index references a Dalvik instruction's operands name
/// into the fully-typed [`dex_ir`] equivalents.
pub trait ReferenceResolver {
	fn resolve_string(&self, index: u32) -> String;
	fn resolve_type(&self, index: u32) -> dex_ir::Type;
	fn resolve_class(&self, index: u32) -> ClassName;
	fn resolve_field(&self, index: u32) -> FieldRef;
	/// `is_interface` is `true` for an `invoke-interface`/`invoke-interface/range`
	/// reference, which resolves through the interface-method-ref constant
	/// rather than the method-ref constant (SPEC_FULL.md §4.3's
	/// move-result lookback needs to tell these apart).
	fn resolve_method(&self, index: u32, is_interface: bool) -> MethodRef;
}

#[cfg(test)]
pub(crate) mod fake {
	use super::*;
	use std::collections::HashMap;

	/// A fixed lookup table, for unit tests that need one or two
	/// resolvable references without standing up a real DEX reader.
	#[derive(Default)]
	pub struct FakeResolver {
		pub strings: HashMap<u32, String>,
		pub types: HashMap<u32, dex_ir::Type>,
		pub classes: HashMap<u32, ClassName>,
		pub fields: HashMap<u32, FieldRef>,
		pub methods: HashMap<u32, MethodRef>,
		pub interface_methods: HashMap<u32, MethodRef>,
	}

	impl ReferenceResolver for FakeResolver {
		fn resolve_string(&self, index: u32) -> String {
			self.strings.get(&index).cloned().unwrap_or_default()
		}
		fn resolve_type(&self, index: u32) -> dex_ir::Type {
			self.types.get(&index).cloned().unwrap_or_else(dex_ir::Type::unknown)
		}
		fn resolve_class(&self, index: u32) -> ClassName {
			self.classes.get(&index).cloned().unwrap_or_else(|| ClassName::from("unresolved/Stub"))
		}
		fn resolve_field(&self, index: u32) -> FieldRef {
			self.fields.get(&index).cloned().unwrap_or(FieldRef {
				class: ClassName::from("unresolved/Stub"),
				name: FieldName::from("unresolved"),
				descriptor: dex_ir::Type::unknown(),
			})
		}
		fn resolve_method(&self, index: u32, is_interface: bool) -> MethodRef {
			let table = if is_interface { &self.interface_methods } else { &self.methods };
			table.get(&index).cloned().unwrap_or(MethodRef {
				class: ClassName::from("unresolved/Stub"),
				name: MethodName::from("unresolved"),
				parameters: Vec::new(),
				return_type: dex_ir::Type::void(),
			})
		}
	}
}
