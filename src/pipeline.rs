//! A3: per-class orchestration of the C4→C5→C6→C7 pipeline (spec.md §2's
//! data-flow line). One [`translate_class`] call corresponds to one
//! worker in SPEC_FULL.md §5's "each class carries its own ... body, with
//! no shared mutable state other than the class's constant pool"
//! concurrency model; [`crate::main`] is free to call it from multiple
//! threads, each with its own [`dex_constpool::ConstantPool`] and sharing
//! only the process-wide [`dex_constpool::StubRegistry`].

use std::collections::HashSet;

use anyhow::{Context, Result};

use dex_cfg::{build_cfg, CfgConfig};
use dex_constpool::{ConstantPool, StubRegistry};
use dex_decode::raw::{RawHandler, RawMethodBody, RawTryItem};
use dex_decode::decode_method;
use dex_ir::{ClassName, FieldName, MethodBody, MethodName, Type};
use dex_typeinfer::{infer_types, MethodArgInfo};
use dex_verify::VerifierMap;

use crate::dex::container::{ClassDefItem, DexFile, EncodedMethod, StaticValue, ACC_STATIC};
use crate::dex::resolver::DexResolver;
use crate::timer::{Phase, Timer};

pub struct TranslatedField {
	pub access_flags: u32,
	pub name: FieldName,
	pub descriptor: Type,
	pub initial_value: Option<StaticValue>,
}

pub struct TranslatedMethod {
	pub access_flags: u32,
	pub name: MethodName,
	pub descriptor: String,
	pub body: Option<MethodBody>,
	pub type_conflicts: usize,
}

pub struct TranslatedClass {
	pub name: ClassName,
	pub access_flags: u32,
	pub superclass: Option<ClassName>,
	pub interfaces: Vec<ClassName>,
	pub source_file: Option<String>,
	pub fields: Vec<TranslatedField>,
	pub methods: Vec<TranslatedMethod>,
	pub pool: ConstantPool,
}

fn descriptor_string(dex: &DexFile, parameter_type_idxs: &[u16], return_type_idx: u32) -> Result<String> {
	let mut s = String::from("(");
	for &idx in parameter_type_idxs {
		s.push_str(dex.type_descriptor(idx as u32)?);
	}
	s.push(')');
	s.push_str(dex.type_descriptor(return_type_idx)?);
	Ok(s)
}

fn translate_method(
	dex: &DexFile,
	class_name: &ClassName,
	encoded: &EncodedMethod,
	cfg_config: &CfgConfig,
	verifier_map: &VerifierMap,
	pool: &mut ConstantPool,
	timer: &mut Timer,
) -> Result<TranslatedMethod> {
	let method_id = dex.method(encoded.method_idx)?;
	let proto = dex.proto(method_id.proto_idx)?;
	let name = MethodName::from(dex.string(method_id.name_idx)?);
	let descriptor = descriptor_string(dex, &proto.parameter_type_idxs, proto.return_type_idx)?;
	let is_static = encoded.access_flags & ACC_STATIC != 0;

	if encoded.code_off == 0 {
		// abstract or native: no code_item, nothing for C4-C7 to do.
		return Ok(TranslatedMethod { access_flags: encoded.access_flags, name, descriptor, body: None, type_conflicts: 0 });
	}

	let code = dex.code_item(encoded.code_off)?;
	let return_type = dex.type_of(proto.return_type_idx)?;
	let parameter_types = proto.parameter_type_idxs.iter().map(|&t| dex.type_of(t as u32)).collect::<Result<Vec<_>>>()?;

	let try_items = code.tries.iter().map(|t| -> Result<RawTryItem> {
		let handlers = t.handlers.iter().map(|h| -> Result<RawHandler> {
			Ok(RawHandler {
				caught_type: h.type_idx.map(|ti| dex.class_name(ti)).transpose()?,
				handler_offset: h.addr,
			})
		}).collect::<Result<Vec<_>>>()?;
		Ok(RawTryItem { start_offset: t.start_addr, insn_count: t.insn_count as u32, handlers })
	}).collect::<Result<Vec<_>>>()?;

	let raw = RawMethodBody {
		code_units: code.insns,
		num_registers: code.registers_size,
		num_incoming_args: code.ins_size,
		is_static,
		return_type,
		parameter_types: parameter_types.clone(),
		declaring_class: class_name.clone(),
		try_items,
	};

	let verification = verifier_map.lookup(class_name, &name, &descriptor).cloned();
	let resolver = DexResolver { dex };

	let decoded = timer.time(Phase::Parsing, || decode_method(&raw, &resolver, pool, verification.as_ref()))
		.with_context(|| format!("decoding {class_name}.{name}{descriptor}"))?;

	let mut body = decoded.body;
	let mut type_conflicts = 0;
	if decoded.translation_needed {
		timer.time(Phase::Cfg, || build_cfg(&mut body, &raw.try_items, pool, cfg_config))
			.with_context(|| format!("building cfg for {class_name}.{name}{descriptor}"))?;

		let args = MethodArgInfo { declaring_class: class_name.clone(), is_static, parameter_types };
		type_conflicts = timer.time(Phase::ConstraintSolution, || infer_types(&mut body, &decoded.seeds, &args));

		timer.time(Phase::ConstantPromotion, || dex_constpool::promote_constants(&mut body, pool));
	}

	Ok(TranslatedMethod { access_flags: encoded.access_flags, name, descriptor, body: Some(body), type_conflicts })
}

pub fn translate_class(
	dex: &DexFile,
	class_def: &ClassDefItem,
	defined_class_idxs: &HashSet<u32>,
	cfg_config: &CfgConfig,
	verifier_map: &VerifierMap,
	stubs: &StubRegistry,
	timer: &mut Timer,
) -> Result<TranslatedClass> {
	let name = dex.class_name(class_def.class_idx)?;

	let superclass = match class_def.superclass_idx {
		Some(idx) => {
			let super_name = dex.class_name(idx)?;
			if !defined_class_idxs.contains(&idx) {
				stubs.stub_for(&super_name);
			}
			Some(super_name)
		},
		None => None,
	};

	let mut interfaces = Vec::with_capacity(class_def.interface_idxs.len());
	for &idx in &class_def.interface_idxs {
		let iface = dex.class_name(idx as u32)?;
		if !defined_class_idxs.contains(&(idx as u32)) {
			stubs.stub_for(&iface);
		}
		interfaces.push(iface);
	}

	let source_file = class_def.source_file_idx.map(|idx| dex.string(idx).map(str::to_owned)).transpose()?;

	let class_data = dex.class_data(class_def.class_data_off)?;
	let mut pool = ConstantPool::new();

	// static_values covers a prefix of static_fields, in declaration order;
	// the DEX format omits a trailing run of all-default values.
	let mut static_values = dex.static_values(class_def.static_values_off)?.into_iter();

	let mut fields = Vec::with_capacity(class_data.static_fields.len() + class_data.instance_fields.len());
	for encoded in &class_data.static_fields {
		let field_id = dex.field(encoded.field_idx)?;
		fields.push(TranslatedField {
			access_flags: encoded.access_flags,
			name: FieldName::from(dex.string(field_id.name_idx)?),
			descriptor: dex.type_of(field_id.type_idx as u32)?,
			initial_value: static_values.next(),
		});
	}
	for encoded in &class_data.instance_fields {
		let field_id = dex.field(encoded.field_idx)?;
		fields.push(TranslatedField {
			access_flags: encoded.access_flags,
			name: FieldName::from(dex.string(field_id.name_idx)?),
			descriptor: dex.type_of(field_id.type_idx as u32)?,
			initial_value: None,
		});
	}

	let mut methods = Vec::with_capacity(class_data.direct_methods.len() + class_data.virtual_methods.len());
	for encoded in class_data.direct_methods.iter().chain(&class_data.virtual_methods) {
		let translated = translate_method(dex, &name, encoded, cfg_config, verifier_map, &mut pool, timer)
			.with_context(|| format!("translating method index {} of class {name}", encoded.method_idx))?;
		methods.push(translated);
	}

	Ok(TranslatedClass { name, access_flags: class_def.access_flags, superclass, interfaces, source_file, fields, methods, pool })
}
