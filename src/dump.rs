//! A minimal, non-authoritative text dumper of one translated class.
//!
//! spec.md §1 names "the textual class-file emitter" as an external
//! collaborator, out of scope for this repository's core; the real
//! assembler-dialect text this tool ships to downstream JVM-ecosystem
//! consumers is produced by that emitter walking the object model
//! [`crate::pipeline::TranslatedClass`] exposes, not by this module. This
//! dumper exists only so the driver has *something* to write per `-d`
//! (spec.md §6) and so a reader can inspect what the core actually
//! produced — useful for this crate's own CLI-level tests and manual
//! inspection, not a stand-in for the emitter's dialect.

use std::fmt::Write as _;

use dex_constpool::ConstantPoolEntry;
use dex_ir::{IrInsnId, MethodBody};

use crate::dex::container::StaticValue;
use crate::pipeline::TranslatedClass;

pub fn dump_class(class: &TranslatedClass) -> String {
	let mut out = String::new();

	let _ = writeln!(out, "class {} access={:#06x}", class.name, class.access_flags);
	if let Some(super_name) = &class.superclass {
		let _ = writeln!(out, "  extends {super_name}");
	}
	for iface in &class.interfaces {
		let _ = writeln!(out, "  implements {iface}");
	}
	if let Some(source_file) = &class.source_file {
		let _ = writeln!(out, "  source_file {source_file:?}");
	}

	let _ = writeln!(out, "  constant_pool ({} entries):", class.pool.len());
	for (r, entry) in class.pool.iter() {
		let _ = writeln!(out, "    #{} = {}", r.0, format_pool_entry(entry));
	}

	for field in &class.fields {
		let _ = write!(out, "  field access={:#06x} {} {}", field.access_flags, field.descriptor, field.name);
		if let Some(value) = &field.initial_value {
			let _ = write!(out, " = {}", format_static_value(value));
		}
		let _ = writeln!(out);
	}

	for method in &class.methods {
		let _ = writeln!(out, "  method access={:#06x} {}{}", method.access_flags, method.name, method.descriptor);
		match &method.body {
			None => {
				let _ = writeln!(out, "    <no code: abstract or native>");
			},
			Some(body) => {
				if method.type_conflicts > 0 {
					let _ = writeln!(out, "    ({} type conflict(s) during inference)", method.type_conflicts);
				}
				dump_body(&mut out, body);
			},
		}
	}

	out
}

fn format_pool_entry(entry: &ConstantPoolEntry) -> String {
	match entry {
		ConstantPoolEntry::Utf8(s) => format!("Utf8 {s:?}"),
		ConstantPoolEntry::Integer(v) => format!("Integer {v}"),
		ConstantPoolEntry::Float(bits) => format!("Float {}", f32::from_bits(*bits)),
		ConstantPoolEntry::Long(v) => format!("Long {v}"),
		ConstantPoolEntry::Double(bits) => format!("Double {}", f64::from_bits(*bits)),
		ConstantPoolEntry::StringConst(s) => format!("String {s:?}"),
		ConstantPoolEntry::Class(c) => format!("Class {c}"),
		ConstantPoolEntry::FieldRef(f) => format!("Fieldref {}.{}:{}", f.class, f.name, f.descriptor),
		ConstantPoolEntry::MethodRef(m) => format!("Methodref {}.{}", m.class, m.name),
		ConstantPoolEntry::InterfaceMethodRef(m) => format!("InterfaceMethodref {}.{}", m.class, m.name),
	}
}

fn format_static_value(value: &StaticValue) -> String {
	match value {
		StaticValue::Byte(v) => format!("{v}"),
		StaticValue::Short(v) => format!("{v}"),
		StaticValue::Char(v) => format!("{v}"),
		StaticValue::Int(v) => format!("{v}"),
		StaticValue::Long(v) => format!("{v}L"),
		StaticValue::Float(v) => format!("{v}f"),
		StaticValue::Double(v) => format!("{v}"),
		StaticValue::StringRef(s) => format!("{s:?}"),
		StaticValue::TypeRef(t) => format!("{t}.class"),
		StaticValue::FieldRef(idx) => format!("field#{idx}"),
		StaticValue::MethodRef(idx) => format!("method#{idx}"),
		StaticValue::EnumRef(idx) => format!("enum#{idx}"),
		StaticValue::Array(items) => format!("[{}]", items.iter().map(format_static_value).collect::<Vec<_>>().join(", ")),
		StaticValue::Boolean(b) => format!("{b}"),
		StaticValue::Null => "null".to_string(),
		StaticValue::Unsupported => "<annotation>".to_string(),
	}
}

fn dump_body(out: &mut String, body: &MethodBody) {
	let _ = writeln!(out, "    registers={} incoming_args={}", body.num_registers, body.num_incoming_args);
	for id in body.ids() {
		let insn = body.get(id);
		if !insn.reachable && id != body.first_id() && id != body.last_id() {
			let _ = write!(out, "    [{}] (unreachable) ", id.0);
		} else {
			let _ = write!(out, "    [{}] ", id.0);
		}
		if insn.label >= 0 {
			let _ = write!(out, "L{}: ", insn.label);
		}
		let _ = write!(out, "{:?}", insn.opcode);
		if let Some(dest) = &insn.destination {
			let _ = write!(out, " -> v{}:{:?}", dest.register, dest.ty);
		}
		for src in &insn.sources {
			let _ = write!(out, " v{}:{:?}", src.register, src.ty);
		}
		if !insn.successors.is_empty() {
			let _ = write!(out, " succ={:?}", ids(&insn.successors));
		}
		if !insn.exception_successors.is_empty() {
			let _ = write!(out, " exc_succ={:?}", ids(&insn.exception_successors));
		}
		let _ = writeln!(out);
	}

	for (i, try_item) in body.try_items.iter().enumerate() {
		let _ = write!(out, "    try[{i}] [{}, {})", try_item.start.0, try_item.end_exclusive.0);
		for handler in &try_item.handlers {
			match &handler.caught_type {
				Some(ty) => {
					let _ = write!(out, " catch {ty} -> {}", handler.target.0);
				},
				None => {
					let _ = write!(out, " catch-all -> {}", handler.target.0);
				},
			}
		}
		let _ = writeln!(out);
	}
}

fn ids(list: &[IrInsnId]) -> Vec<u32> {
	list.iter().map(|id| id.0).collect()
}
