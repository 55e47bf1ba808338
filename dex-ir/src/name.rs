//! Name and descriptor newtypes.
//!
//! `duke` generates these from a `make_string_str_like!` macro that isn't
//! part of this crate's lineage (its definition lives in `duke`'s own
//! `lib.rs`, not retrieved alongside the rest of the crate); these are
//! hand-written equivalents, narrower than `duke`'s since we only need
//! equality, hashing, cloning and `Display`, not the owned/borrowed slice
//! split `duke` uses for zero-copy class-file writing.

use std::fmt::{Display, Formatter};
use java_string::JavaString;

macro_rules! string_newtype {
	($(#[$meta:meta])* $name:ident) => {
		$(#[$meta])*
		#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
		pub struct $name(JavaString);

		impl $name {
			pub fn new(s: impl Into<JavaString>) -> $name {
				$name(s.into())
			}

			pub fn as_str(&self) -> &JavaString {
				&self.0
			}
		}

		impl From<&str> for $name {
			fn from(s: &str) -> $name {
				$name(JavaString::from(s))
			}
		}

		impl From<JavaString> for $name {
			fn from(s: JavaString) -> $name {
				$name(s)
			}
		}

		impl Display for $name {
			fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
				Display::fmt(&self.0, f)
			}
		}
	};
}

string_newtype!(
	/// A class name in internal binary form (`java/lang/Object`), Dalvik
	/// type descriptor already stripped of its leading `L` and trailing
	/// `;` for non-array reference types.
	ClassName
);
string_newtype!(
	/// A field name, unqualified.
	FieldName
);
string_newtype!(
	/// A method name, unqualified, or one of `<init>`/`<clinit>`.
	MethodName
);

impl ClassName {
	/// `java.lang.Object`, used as the implicit supertype fallback and as
	/// the receiver type of synthesized argument-defining instructions on
	/// instance methods whose declaring class is otherwise unknown.
	pub fn java_lang_object() -> ClassName {
		ClassName::from("java/lang/Object")
	}

	pub fn java_lang_string() -> ClassName {
		ClassName::from("java/lang/String")
	}

	pub fn java_lang_class() -> ClassName {
		ClassName::from("java/lang/Class")
	}
}

/// A fully resolved field reference: the declaring class, the field's
/// name and its descriptor type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
	pub class: ClassName,
	pub name: FieldName,
	pub descriptor: crate::types::Type,
}

/// A fully resolved method reference: declaring class, name, parameter
/// types in declaration order and the return type (`Kind::Void` for a
/// `void`-returning method).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
	pub class: ClassName,
	pub name: MethodName,
	pub parameters: Vec<crate::types::Type>,
	pub return_type: crate::types::Type,
}

impl MethodRef {
	pub fn is_constructor(&self) -> bool {
		self.name.as_str() == "<init>"
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn class_name_display() {
		let name = ClassName::from("java/lang/Thread");
		assert_eq!(name.to_string(), "java/lang/Thread");
	}

	#[test]
	fn class_name_constants() {
		assert_eq!(ClassName::java_lang_object(), ClassName::from("java/lang/Object"));
	}
}
