//! A3: the process-level driver — CLI parsing, logging, per-class
//! orchestration and timer instrumentation (spec.md §1's fourth external
//! collaborator). Everything this binary does beyond wiring up
//! [`dex_decode`]/[`dex_cfg`]/[`dex_typeinfer`]/[`dex_constpool`] sits
//! outside the specified core: reading the `.dex` container itself
//! ([`dex`]), orchestrating one class's methods through the pipeline
//! ([`pipeline`]), and dumping the result as text ([`dump`]).
//!
//! Grounded on `dukemakemc/src/main.rs` for the `Cli` derive shape and on
//! teacher root `src/main.rs` for the "modules declared at the binary
//! crate root, `fern` initialized first thing in `main`" convention.

mod cli;
mod dex;
mod dump;
mod pipeline;
mod timer;

use std::collections::HashSet;
use std::fs;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use dex_cfg::CfgConfig;
use dex_constpool::{ConflictTracker, StubRegistry};
use dex_verify::VerifierMap;

use crate::cli::Cli;
use crate::dex::container::DexFile;
use crate::pipeline::translate_class;
use crate::timer::Timer;

fn setup_logging(level: log::LevelFilter) -> Result<()> {
	fern::Dispatch::new()
		.format(|out, message, record| {
			out.finish(format_args!("[{} {}] {}", record.level(), record.target(), message))
		})
		.level(level)
		.chain(std::io::stderr())
		.apply()
		.context("failed to install logger")
}

fn run(cli: &Cli) -> Result<()> {
	let input_path = if let Some(tmp) = &cli.tmp_file {
		fs::copy(&cli.input, tmp).with_context(|| format!("copying {:?} to tmp file {tmp:?}", cli.input))?;
		tmp.clone()
	} else {
		cli.input.clone()
	};

	let data = fs::read(&input_path).with_context(|| format!("reading dex input {input_path:?}"))?;
	let dex = DexFile::parse(data, cli.ignore_checksum).with_context(|| format!("parsing dex container {input_path:?}"))?;

	let verifier_map = match &cli.verifier_file {
		Some(path) => {
			let file = fs::File::open(path).with_context(|| format!("opening verifier annotation file {path:?}"))?;
			VerifierMap::read(file).with_context(|| format!("parsing verifier annotation file {path:?}"))?
		},
		None => VerifierMap::empty(),
	};

	let cfg_config = CfgConfig {
		split_exception_tables: !cli.disable_try_split,
		branch_patch_threshold: Some(cli.branch_limit),
	};

	fs::create_dir_all(&cli.out_dir).with_context(|| format!("creating output directory {:?}", cli.out_dir))?;
	if let Some(stubs_dir) = &cli.stubs_dir {
		fs::create_dir_all(stubs_dir).with_context(|| format!("creating stubs directory {stubs_dir:?}"))?;
	}

	let defined_class_idxs: HashSet<u32> = dex.class_defs.iter().map(|c| c.class_idx).collect();
	let class_filter = cli.class_filter_set();
	let stubs = StubRegistry::new();
	let conflicts = ConflictTracker::new();
	let mut timer = Timer::new();

	let mut translated_count = 0usize;
	for class_def in &dex.class_defs {
		let name = dex.class_name(class_def.class_idx).context("resolving class name")?;
		if let Some(filter) = &class_filter {
			if !filter.contains(name.as_str().as_str()) {
				continue;
			}
		}

		let class = match translate_class(&dex, class_def, &defined_class_idxs, &cfg_config, &verifier_map, &stubs, &mut timer) {
			Ok(class) => class,
			Err(e) => {
				log::error!("failed to translate class {name}: {e:#}");
				continue;
			},
		};

		if class.methods.iter().any(|m| m.type_conflicts > 0) {
			conflicts.mark(&class.name);
			log::warn!("class {} has unresolved type conflicts; see per-method counts in the dump", class.name);
		}

		let file_name = class.name.as_str().to_string().replace('/', "_") + ".dasm";
		let out_path = cli.out_dir.join(file_name);
		timer.time(crate::timer::Phase::Emit, || -> Result<()> {
			fs::write(&out_path, dump::dump_class(&class)).with_context(|| format!("writing {out_path:?}"))
		})?;
		translated_count += 1;
	}

	if let Some(stubs_dir) = &cli.stubs_dir {
		for stub in stubs.all() {
			let file_name = stub.class.as_str().to_string().replace('/', "_") + ".stub";
			let out_path = stubs_dir.join(file_name);
			fs::write(&out_path, format!("stub class {}\n", stub.class)).with_context(|| format!("writing stub {out_path:?}"))?;
		}
	}

	timer.log_summary();
	log::debug!("{}", timer.summary_line(&cli.input.to_string_lossy()));
	log::info!(
		"translated {translated_count} class(es) from {:?}; {} stub(s) synthesized, {} class(es) with type conflicts",
		cli.input, stubs.len(), conflicts.iter_classes().len(),
	);

	// SPEC_FULL.md §5: the stub registry's lifetime spans the process; this
	// is its terminal shutdown call, made once the whole run has finished
	// writing output and has no further use for the accumulated stubs.
	stubs.clear_static_refs();

	Ok(())
}

fn main() -> ExitCode {
	let cli = Cli::parse();

	if let Err(e) = setup_logging(cli.log_level()) {
		eprintln!("failed to set up logging: {e:#}");
		return ExitCode::from(1);
	}

	match run(&cli) {
		Ok(()) => ExitCode::from(0),
		Err(e) => {
			log::error!("{e:#}");
			ExitCode::from(1)
		},
	}
}
