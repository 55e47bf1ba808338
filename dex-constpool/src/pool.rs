//! A1: the per-class constant pool aggregator.
//!
//! Grounded on `duke/src/simple_class_writer/pool.rs`'s `PoolWrite`:
//! a `HashMap<PoolEntry, u16>` next to a growable `Vec<PoolEntry>`, where
//! `put` either returns the existing index for an equal entry or appends
//! and inserts. We swap the `HashMap` for an `indexmap::IndexMap` so that
//! iteration (at emission time) walks entries in first-insertion order,
//! which keeps output byte-identical across runs on the same input
//! (SPEC_FULL.md §1.1).

use dex_ir::{ClassName, FieldRef, MethodRef, PoolRef};
use indexmap::IndexMap;

/// A deduplicated class-level constant. Dedup key is the entry's own
/// value (numeric constants, by value; class/field/method references,
/// structurally by their resolved identity) — see SPEC_FULL.md §4.6.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstantPoolEntry {
	Utf8(String),
	Integer(i32),
	/// IEEE-754 bit pattern, so that `NaN`/`-0.0` dedup exactly instead of
	/// by (non-reflexive) float equality.
	Float(u32),
	Long(i64),
	Double(u64),
	StringConst(String),
	Class(ClassName),
	FieldRef(FieldRef),
	MethodRef(MethodRef),
	InterfaceMethodRef(MethodRef),
}

/// One class's constant pool. Not thread-shared: a single worker thread
/// owns a class's translation and therefore its pool (SPEC_FULL.md §5);
/// only the [`crate::stubs::StubRegistry`] is process-wide.
#[derive(Debug, Default)]
pub struct ConstantPool {
	entries: IndexMap<ConstantPoolEntry, ()>,
}

impl ConstantPool {
	pub fn new() -> ConstantPool {
		ConstantPool { entries: IndexMap::new() }
	}

	fn put(&mut self, entry: ConstantPoolEntry) -> PoolRef {
		let (index, _) = self.entries.insert_full(entry, ());
		PoolRef(index as u32)
	}

	pub fn put_utf8(&mut self, s: impl Into<String>) -> PoolRef {
		self.put(ConstantPoolEntry::Utf8(s.into()))
	}

	pub fn put_integer(&mut self, v: i32) -> PoolRef {
		self.put(ConstantPoolEntry::Integer(v))
	}

	pub fn put_float(&mut self, v: f32) -> PoolRef {
		self.put(ConstantPoolEntry::Float(v.to_bits()))
	}

	pub fn put_long(&mut self, v: i64) -> PoolRef {
		self.put(ConstantPoolEntry::Long(v))
	}

	pub fn put_double(&mut self, v: f64) -> PoolRef {
		self.put(ConstantPoolEntry::Double(v.to_bits()))
	}

	pub fn put_string(&mut self, s: impl Into<String>) -> PoolRef {
		self.put(ConstantPoolEntry::StringConst(s.into()))
	}

	pub fn put_class(&mut self, class: ClassName) -> PoolRef {
		self.put(ConstantPoolEntry::Class(class))
	}

	pub fn put_field_ref(&mut self, field: FieldRef) -> PoolRef {
		self.put(ConstantPoolEntry::FieldRef(field))
	}

	pub fn put_method_ref(&mut self, method: MethodRef) -> PoolRef {
		self.put(ConstantPoolEntry::MethodRef(method))
	}

	pub fn put_interface_method_ref(&mut self, method: MethodRef) -> PoolRef {
		self.put(ConstantPoolEntry::InterfaceMethodRef(method))
	}

	pub fn get(&self, r: PoolRef) -> Option<&ConstantPoolEntry> {
		self.entries.get_index(r.0 as usize).map(|(entry, ())| entry)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Iterates entries in insertion order, the order they'll be written
	/// to the emitted class file.
	pub fn iter(&self) -> impl Iterator<Item = (PoolRef, &ConstantPoolEntry)> {
		self.entries.keys().enumerate().map(|(i, entry)| (PoolRef(i as u32), entry))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn numeric_constants_dedup_by_value() {
		let mut pool = ConstantPool::new();
		let a = pool.put_integer(42);
		let b = pool.put_integer(42);
		let c = pool.put_integer(43);
		assert_eq!(a, b);
		assert_ne!(a, c);
		assert_eq!(pool.len(), 2);
	}

	#[test]
	fn float_dedup_is_by_bit_pattern_not_value_equality() {
		let mut pool = ConstantPool::new();
		let nan1 = pool.put_float(f32::NAN);
		let nan2 = pool.put_float(f32::NAN);
		assert_eq!(nan1, nan2);
		assert_eq!(pool.len(), 1);
	}

	#[test]
	fn class_refs_dedup_structurally() {
		let mut pool = ConstantPool::new();
		let a = pool.put_class(ClassName::from("java/lang/String"));
		let b = pool.put_class(ClassName::from("java/lang/String"));
		assert_eq!(a, b);
	}

	#[test]
	fn insertion_order_is_preserved_for_emission() {
		let mut pool = ConstantPool::new();
		pool.put_integer(1);
		pool.put_integer(2);
		pool.put_integer(3);
		let values: Vec<_> = pool.iter().map(|(_, e)| e.clone()).collect();
		assert_eq!(values, vec![
			ConstantPoolEntry::Integer(1),
			ConstantPoolEntry::Integer(2),
			ConstantPoolEntry::Integer(3),
		]);
	}
}
