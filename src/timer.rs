//! A3: per-phase wall-clock instrumentation.
//!
//! Grounded on `original_source/dare/decompiler/src/timer.cpp`'s `Timer`:
//! a fixed set of named phases, one running phase at a time
//! (`Start`/`End` bracket a phase, accumulating into a running total per
//! phase across the whole process), plus a per-input-file summary line.
//! The original is a process-wide singleton guarded by nothing (it only
//! ever runs on one thread); here it's an ordinary value the driver owns
//! and passes to whichever phase is running.

use std::time::Instant;

/// One pipeline phase worth separately accounting for. Mirrors
/// `Timer::Phase` from `timer.h`, with `kTranslationToJasmin`/
/// `kCodeTranslationToJasmin` collapsed into a single `Emit` phase since
/// this repository doesn't split "per-class" from "per-method" emission
/// bookkeeping the way the original's two-pass Jasmin writer did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
	Parsing,
	Cfg,
	TypeInferenceInit,
	ConstraintGeneration,
	ConstraintSolution,
	ConstantPromotion,
	Emit,
	Other,
}

impl Phase {
	const ALL: [Phase; 8] = [
		Phase::Parsing,
		Phase::Cfg,
		Phase::TypeInferenceInit,
		Phase::ConstraintGeneration,
		Phase::ConstraintSolution,
		Phase::ConstantPromotion,
		Phase::Emit,
		Phase::Other,
	];

	fn label(self) -> &'static str {
		match self {
			Phase::Parsing => "parsing",
			Phase::Cfg => "cfg",
			Phase::TypeInferenceInit => "type-inference-init",
			Phase::ConstraintGeneration => "constraint-generation",
			Phase::ConstraintSolution => "constraint-solution",
			Phase::ConstantPromotion => "constant-promotion",
			Phase::Emit => "emit",
			Phase::Other => "other",
		}
	}
}

/// Accumulated microsecond totals per [`Phase`], for the whole run.
/// `start`/`end` bracket one phase at a time, same as the original's
/// `Start(Phase)`/`End()` pair; there is no stack, so a nested `start`
/// while already timing a phase would lose the outer phase's clock the
/// same way the original does (not guarded against, mirroring the
/// single-threaded, single-phase-at-a-time assumption of SPEC_FULL.md
/// §5).
#[derive(Debug)]
pub struct Timer {
	totals: [u128; Phase::ALL.len()],
	running: Option<(Phase, Instant)>,
}

impl Default for Timer {
	fn default() -> Timer {
		Timer { totals: [0; Phase::ALL.len()], running: None }
	}
}

impl Timer {
	pub fn new() -> Timer {
		Timer::default()
	}

	pub fn start(&mut self, phase: Phase) {
		self.running = Some((phase, Instant::now()));
	}

	pub fn end(&mut self) {
		if let Some((phase, start)) = self.running.take() {
			self.totals[phase as usize] += start.elapsed().as_micros();
		}
	}

	/// Runs `f` under `phase`'s clock, ending it (even on an `Err`
	/// return) before returning `f`'s result.
	pub fn time<T>(&mut self, phase: Phase, f: impl FnOnce() -> T) -> T {
		self.start(phase);
		let result = f();
		self.end();
		result
	}

	fn micros(&self, phase: Phase) -> u128 {
		self.totals[phase as usize]
	}

	/// One summary line per the original's `WriteToFile`: the input file's
	/// name (basename only, matching the original's
	/// `substr(rfind('/') + 1)`), followed by one microsecond total per
	/// phase in declaration order.
	pub fn summary_line(&self, input_file_name: &str) -> String {
		let basename = input_file_name.rsplit('/').next().unwrap_or(input_file_name);
		let mut line = basename.to_string();
		for phase in Phase::ALL {
			line.push(' ');
			line.push_str(&self.micros(phase).to_string());
		}
		line
	}

	pub fn log_summary(&self) {
		for phase in Phase::ALL {
			log::debug!("phase {} took {}us", phase.label(), self.micros(phase));
		}
	}
}
