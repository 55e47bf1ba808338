//! A2: the optional verifier-annotation file (SPEC_FULL.md §6).
//!
//! Parses a whitespace-delimited text format, one record per line:
//! `class_descriptor method_name method_sig ('y' | hex-offset decimal-kind)`.
//! `y` marks the entire method as failing; otherwise the record names one
//! code offset the decoder should replace with a synthesized
//! verification-error instruction, along with which error kind to throw.
//!
//! Grounded on `quill/src/tiny_v2.rs`'s line-based parser idiom
//! (`BufReader::new(reader).lines().enumerate()`, `bail!` on a malformed
//! header/record) adapted to this format's much simpler per-line grammar
//! (no header line, no indentation-based nesting).

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use anyhow::{bail, Context, Result};
use dex_ir::{ClassName, MethodName};

/// The eight exception kinds a verifier record can name (SPEC_FULL.md
/// §6's table), each mapping to one injected exception descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	Generic,
	NoClass,
	NoField,
	NoMethod,
	AccessError,
	ClassChange,
	Instantiation,
	NullPointer,
}

impl ErrorKind {
	fn from_decimal(code: u32) -> Option<ErrorKind> {
		Some(match code {
			0 => ErrorKind::Generic,
			1 => ErrorKind::NoClass,
			2 => ErrorKind::NoField,
			3 => ErrorKind::NoMethod,
			4 => ErrorKind::AccessError,
			5 => ErrorKind::ClassChange,
			6 => ErrorKind::Instantiation,
			7 => ErrorKind::NullPointer,
			_ => return None,
		})
	}

	/// The exception class to synthesize a `throw` of.
	pub fn descriptor(self) -> ClassName {
		ClassName::from(match self {
			ErrorKind::Generic => "java/lang/VerifyError",
			ErrorKind::NoClass => "java/lang/NoClassDefFoundError",
			ErrorKind::NoField => "java/lang/NoSuchFieldError",
			ErrorKind::NoMethod => "java/lang/NoSuchMethodError",
			ErrorKind::AccessError => "java/lang/IllegalAccessError",
			ErrorKind::ClassChange => "java/lang/IncompatibleClassChangeError",
			ErrorKind::Instantiation => "java/lang/InstantiationError",
			ErrorKind::NullPointer => "java/lang/NullPointerException",
		})
	}
}

/// What the annotation file says about one method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodVerification {
	/// The whole method body is replaced by a single throw of the given
	/// kind (the `y` marker never names a kind in the original format;
	/// `Generic` is the substitute, matching `VerifyError`'s role as the
	/// catch-all).
	WholeMethodFails,
	/// Individual offsets to replace, each with its own error kind.
	Instructions(Vec<(u32, ErrorKind)>),
}

/// A parsed verifier-annotation file: per-(class, method name, method
/// signature) verification outcomes.
#[derive(Debug, Clone, Default)]
pub struct VerifierMap {
	entries: HashMap<(ClassName, MethodName, String), MethodVerification>,
}

impl VerifierMap {
	pub fn empty() -> VerifierMap {
		VerifierMap::default()
	}

	pub fn lookup(&self, class: &ClassName, method: &MethodName, signature: &str) -> Option<&MethodVerification> {
		self.entries.get(&(class.clone(), method.clone(), signature.to_string()))
	}

	/// Parses the file contents from any [`Read`]er. Malformed individual
	/// lines are logged and skipped (SPEC_FULL.md §7: an annotation-file
	/// malformation is not fatal to the run); a record that *can* be
	/// parsed enough to find its header but whose payload is garbage
	/// still counts as "skip this line, keep going".
	pub fn read(reader: impl Read) -> Result<VerifierMap> {
		let mut map = VerifierMap::default();
		for (line_no, line) in BufReader::new(reader).lines().enumerate() {
			let line = line.with_context(|| format!("reading verifier annotation line {}", line_no + 1))?;
			let line = line.trim();
			if line.is_empty() {
				continue;
			}
			match parse_record(line) {
				Ok((key, offset_or_whole)) => map.insert(key, offset_or_whole),
				Err(e) => {
					log::warn!("skipping malformed verifier annotation at line {}: {e}", line_no + 1);
				},
			}
		}
		Ok(map)
	}

	fn insert(&mut self, key: (ClassName, MethodName, String), verification: RecordPayload) {
		let entry = self.entries.entry(key).or_insert_with(|| MethodVerification::Instructions(Vec::new()));
		match (entry, verification) {
			(slot @ MethodVerification::Instructions(_), RecordPayload::WholeMethod) => {
				*slot = MethodVerification::WholeMethodFails;
			},
			(MethodVerification::Instructions(v), RecordPayload::Instruction(offset, kind)) => {
				v.push((offset, kind));
			},
			// already marked whole-method-fails: further per-offset
			// records for the same method are redundant, ignore them.
			(MethodVerification::WholeMethodFails, _) => {},
		}
	}
}

enum RecordPayload {
	WholeMethod,
	Instruction(u32, ErrorKind),
}

fn parse_record(line: &str) -> Result<((ClassName, MethodName, String), RecordPayload)> {
	let mut fields = line.split_whitespace();
	let class = fields.next().context("missing class descriptor field")?;
	let method = fields.next().context("missing method name field")?;
	let signature = fields.next().context("missing method signature field")?;
	let marker = fields.next().context("missing 'y' or offset/kind field")?;

	let payload = if marker == "y" {
		RecordPayload::WholeMethod
	} else {
		let offset = u32::from_str_radix(marker.trim_start_matches("0x"), 16)
			.with_context(|| format!("invalid hex offset {marker:?}"))?;
		let kind_field = fields.next().context("missing decimal error kind field")?;
		let kind_code: u32 = kind_field.parse().with_context(|| format!("invalid decimal error kind {kind_field:?}"))?;
		let kind = ErrorKind::from_decimal(kind_code).with_context(|| format!("unknown error kind code {kind_code}"))?;
		RecordPayload::Instruction(offset, kind)
	};

	if fields.next().is_some() {
		bail!("unexpected trailing fields in verifier annotation record");
	}

	Ok(((ClassName::from(class), MethodName::from(method), signature.to_string()), payload))
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn parses_whole_method_marker() {
		let text = "com/example/Foo bar ()V y\n";
		let map = VerifierMap::read(text.as_bytes()).unwrap();
		let result = map.lookup(&ClassName::from("com/example/Foo"), &MethodName::from("bar"), "()V");
		assert_eq!(result, Some(&MethodVerification::WholeMethodFails));
	}

	#[test]
	fn parses_offset_and_kind() {
		let text = "com/example/Foo bar ()V 1a 1\n";
		let map = VerifierMap::read(text.as_bytes()).unwrap();
		let result = map.lookup(&ClassName::from("com/example/Foo"), &MethodName::from("bar"), "()V");
		assert_eq!(result, Some(&MethodVerification::Instructions(vec![(0x1a, ErrorKind::NoClass)])));
	}

	#[test]
	fn accumulates_multiple_offsets_for_one_method() {
		let text = "com/example/Foo bar ()V 0 0\ncom/example/Foo bar ()V 4 3\n";
		let map = VerifierMap::read(text.as_bytes()).unwrap();
		let result = map.lookup(&ClassName::from("com/example/Foo"), &MethodName::from("bar"), "()V");
		assert_eq!(result, Some(&MethodVerification::Instructions(vec![(0, ErrorKind::Generic), (4, ErrorKind::NoMethod)])));
	}

	#[test]
	fn malformed_line_is_skipped_not_fatal() {
		let text = "this line is garbage\ncom/example/Foo bar ()V y\n";
		let map = VerifierMap::read(text.as_bytes()).unwrap();
		assert!(map.lookup(&ClassName::from("com/example/Foo"), &MethodName::from("bar"), "()V").is_some());
	}

	#[test]
	fn error_kind_descriptors_match_table() {
		assert_eq!(ErrorKind::NoClass.descriptor(), ClassName::from("java/lang/NoClassDefFoundError"));
		assert_eq!(ErrorKind::NullPointer.descriptor(), ClassName::from("java/lang/NullPointerException"));
	}
}
