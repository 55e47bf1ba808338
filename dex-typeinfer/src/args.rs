//! Incoming-argument typing (SPEC_FULL.md §4.5): reaching-definition
//! analysis alone can't type an argument register, since no decoded
//! instruction ever "defines" it — it's live from the method's entry.
//!
//! Grounded on `original_source/dare/decompiler/src/typing/type_solver.cpp`,
//! which prepends synthetic `arg` pseudo-instructions to the instruction
//! list before its DFS passes run. This reimplementation skips mutating
//! the instruction stream for that (SPEC_FULL.md §9's arena/no-renumbering
//! redesign note; see `DESIGN.md`): a backward seed search that runs off
//! the start of the method without finding a definition falls back
//! directly to the declared type of the argument register it landed on,
//! computed here.

use dex_ir::{ClassName, MethodBody, Register, Type};

/// Everything C6 needs to reconstruct the type of each incoming argument
/// register. `parameter_types` excludes `this`; `is_static` decides
/// whether the first register of the incoming window is `this` or the
/// method's first declared parameter.
#[derive(Debug, Clone)]
pub struct MethodArgInfo {
	pub declaring_class: ClassName,
	pub is_static: bool,
	pub parameter_types: Vec<Type>,
}

/// If `reg` is the addressable (low) register of one of the method's
/// incoming arguments, its declared type; `None` for every other
/// register — locals, and the unaddressed high half of a wide argument.
pub fn argument_register_type(body: &MethodBody, args: &MethodArgInfo, reg: Register) -> Option<Type> {
	let window_start = body.num_registers.checked_sub(body.num_incoming_args)?;
	if reg < window_start {
		return None;
	}

	let mut cursor = window_start;
	if !args.is_static {
		if reg == cursor {
			return Some(Type::object(args.declaring_class.clone()));
		}
		cursor += 1;
	}
	for param in &args.parameter_types {
		if reg == cursor {
			return Some(param.clone());
		}
		cursor += param.width() as u16;
	}
	None
}

#[cfg(test)]
mod tests {
	use super::*;
	use dex_ir::Kind;
	use pretty_assertions::assert_eq;

	fn body(num_registers: u16, num_incoming_args: u16) -> MethodBody {
		MethodBody::new(num_registers, num_incoming_args)
	}

	#[test]
	fn instance_method_this_is_first_incoming_register() {
		let args = MethodArgInfo {
			declaring_class: ClassName::from("com/example/Widget"),
			is_static: false,
			parameter_types: vec![Type::scalar(Kind::Int)],
		};
		let b = body(4, 2);
		assert_eq!(argument_register_type(&b, &args, 2), Some(Type::object(ClassName::from("com/example/Widget"))));
		assert_eq!(argument_register_type(&b, &args, 3), Some(Type::scalar(Kind::Int)));
	}

	#[test]
	fn static_method_has_no_implicit_this() {
		let args = MethodArgInfo {
			declaring_class: ClassName::from("com/example/Widget"),
			is_static: true,
			parameter_types: vec![Type::scalar(Kind::Long), Type::scalar(Kind::Int)],
		};
		let b = body(5, 3);
		// long takes two registers; the high half (3) is never addressable.
		assert_eq!(argument_register_type(&b, &args, 2), Some(Type::scalar(Kind::Long)));
		assert_eq!(argument_register_type(&b, &args, 3), None);
		assert_eq!(argument_register_type(&b, &args, 4), Some(Type::scalar(Kind::Int)));
	}

	#[test]
	fn local_register_is_not_an_argument() {
		let args = MethodArgInfo { declaring_class: ClassName::from("com/example/Widget"), is_static: true, parameter_types: vec![] };
		let b = body(4, 1);
		assert_eq!(argument_register_type(&b, &args, 0), None);
	}
}
