//! Structured lifecycle events for deployment runs.
//!
//! Events are emitted at `info!` level and carry the run id so log
//! aggregation can stitch one run back together. `DeploySpan` scopes
//! everything under a run-tagged tracing span.

use tracing::info;

/// RAII guard entering a run-scoped tracing span.
pub struct DeploySpan {
    _span: tracing::span::EnteredSpan,
}

impl DeploySpan {
    pub fn enter(run_id: &str) -> Self {
        let span = tracing::info_span!("berth.run", run_id = %run_id);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_run_started(run_id: &str, env: &str, phases: usize) {
    info!(event = "run.started", run_id = %run_id, env = %env, phases = phases);
}

pub fn emit_run_finished(run_id: &str, duration_ms: u64, phases_recorded: usize, success: bool) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        phases_recorded = phases_recorded,
        success = success,
    );
}

pub fn emit_validation_completed(run_id: &str, passed: bool, failures: usize, warnings: usize) {
    info!(
        event = "validation.completed",
        run_id = %run_id,
        passed = passed,
        failures = failures,
        warnings = warnings,
    );
}

pub fn emit_phase_started(run_id: &str, phase: &str, services: usize) {
    info!(event = "phase.started", run_id = %run_id, phase = %phase, services = services);
}

pub fn emit_phase_finished(run_id: &str, phase: &str, success: bool, duration_ms: u64) {
    info!(
        event = "phase.finished",
        run_id = %run_id,
        phase = %phase,
        success = success,
        duration_ms = duration_ms,
    );
}

pub fn emit_gate_evaluated(run_id: &str, phase: &str, healthy: usize, degraded: usize, down: usize) {
    info!(
        event = "gate.evaluated",
        run_id = %run_id,
        phase = %phase,
        healthy = healthy,
        degraded = degraded,
        down = down,
    );
}
