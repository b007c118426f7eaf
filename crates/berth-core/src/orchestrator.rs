//! Deployment run loop.
//!
//! A single control thread drives phases strictly sequentially: phase
//! N+1 never starts before phase N's gate resolves. Per-service probe
//! concurrency lives entirely inside the health gate.

use std::collections::BTreeMap;
use std::time::Instant;

use tokio::sync::watch;
use tracing::warn;
use uuid::Uuid;

use crate::compose::ComposeClient;
use crate::config::OrchestratorConfig;
use crate::error::{BerthError, Result};
use crate::executor::{ExecutorOptions, PhaseExecutor};
use crate::health::{down_services, gate_passed, HealthGate, HealthStatus};
use crate::obs::{
    emit_gate_evaluated, emit_phase_finished, emit_phase_started, emit_run_finished,
    emit_run_started, emit_validation_completed, DeploySpan,
};
use crate::registry::{PhaseRegistry, PhaseSelector};
use crate::report::{FailureCause, PhaseResult, RunRecorder, RunSummary};
use crate::secrets::generate_secrets;
use crate::validate::EnvironmentValidator;

/// Run-level switches, straight from the CLI surface.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub selector: PhaseSelector,
    pub generate_secrets: bool,
    pub skip_validation: bool,
    pub continue_on_failure: bool,
    pub dry_run: bool,
    pub skip_build: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            selector: PhaseSelector::All,
            generate_secrets: false,
            skip_validation: false,
            continue_on_failure: false,
            dry_run: false,
            skip_build: false,
        }
    }
}

/// Sequences validation, phase execution, and health gating into one
/// deployment run.
pub struct Orchestrator {
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self { config }
    }

    /// Execute one run and return its summary.
    ///
    /// An abort signal on `cancel` stops in-flight health polling
    /// promptly; phases already recorded keep their results.
    pub async fn run(
        &self,
        compose: &dyn ComposeClient,
        registry: &PhaseRegistry,
        options: &RunOptions,
        cancel: watch::Receiver<bool>,
    ) -> Result<RunSummary> {
        let run_id = Uuid::new_v4().to_string();
        let _span = DeploySpan::enter(&run_id);
        let started = Instant::now();

        let phases = registry.select(options.selector);
        emit_run_started(&run_id, self.config.env.as_str(), phases.len());

        if options.generate_secrets {
            generate_secrets(&self.config).await?;
        }

        // Validation runs before any phase; an unoverridden failure
        // aborts with zero phase results.
        let mut validation = None;
        if !options.skip_validation {
            let report = EnvironmentValidator::validate(&self.config, compose).await;
            emit_validation_completed(
                &run_id,
                report.passed(),
                report.failures().len(),
                report.warnings().len(),
            );

            if !report.passed() {
                if options.selector == PhaseSelector::Validate {
                    return Ok(self.finish(RunSummary::from_validation(run_id, report), started));
                }
                if !options.continue_on_failure {
                    let err = BerthError::ValidationFailed {
                        failed: report.failures().len(),
                    };
                    warn!(error = %err, "aborting before any phase");
                    let recorder = RunRecorder::new(run_id.as_str(), phases.len());
                    return Ok(self.finish(recorder.summarize(Some(report)), started));
                }
                warn!("continuing despite validation failures");
            } else if options.selector == PhaseSelector::Validate {
                return Ok(self.finish(RunSummary::from_validation(run_id, report), started));
            }
            validation = Some(report);
        } else if options.selector == PhaseSelector::Validate {
            // Validate-only with validation skipped is vacuously clean.
            let report = crate::validate::ValidationReport::new(Vec::new());
            return Ok(self.finish(RunSummary::from_validation(run_id, report), started));
        }

        let executor_options = ExecutorOptions {
            dry_run: options.dry_run,
            skip_build: options.skip_build,
        };
        let mut recorder = RunRecorder::new(run_id.as_str(), phases.len());

        let mut completed: Vec<String> = Vec::new();
        for phase in &phases {
            // Prerequisites are satisfied either by an earlier phase in
            // this run or by a previous deployment; a single-phase run
            // trusts the latter.
            let unmet: Vec<&str> = phase
                .prerequisites
                .iter()
                .filter(|p| !completed.contains(p))
                .map(|p| p.as_str())
                .collect();
            if !unmet.is_empty() {
                warn!(
                    phase = %phase.name,
                    prerequisites = ?unmet,
                    "prerequisites not part of this run; assuming already deployed"
                );
            }

            emit_phase_started(&run_id, &phase.name, phase.services.len());
            let phase_started = Instant::now();

            let outcome = PhaseExecutor::run(compose, phase, &executor_options).await;

            if !outcome.build_ok {
                let duration_ms = phase_started.elapsed().as_millis() as u64;
                emit_phase_finished(&run_id, &phase.name, false, duration_ms);
                recorder.record(PhaseResult {
                    phase: phase.name.clone(),
                    success: false,
                    duration_ms,
                    services_attempted: phase.service_names(),
                    health: BTreeMap::new(),
                    failure: Some(FailureCause::BuildFailed),
                });
                // A failed build has no override path: the run stops
                // even with continue-on-failure set.
                break;
            }

            let health = if options.dry_run {
                BTreeMap::new()
            } else {
                HealthGate::wait(
                    &phase.services,
                    self.config.poll,
                    self.config.probe_call_timeout,
                    cancel.clone(),
                )
                .await
            };

            let healthy = health
                .values()
                .filter(|h| h.status == HealthStatus::Healthy)
                .count();
            let degraded = health
                .values()
                .filter(|h| h.status == HealthStatus::Degraded)
                .count();
            let down = down_services(&health);
            emit_gate_evaluated(&run_id, &phase.name, healthy, degraded, down.len());

            let success = options.dry_run || gate_passed(&health);
            let duration_ms = phase_started.elapsed().as_millis() as u64;
            emit_phase_finished(&run_id, &phase.name, success, duration_ms);

            recorder.record(PhaseResult {
                phase: phase.name.clone(),
                success,
                duration_ms,
                services_attempted: phase.service_names(),
                health,
                failure: if success {
                    None
                } else {
                    Some(FailureCause::ServicesDown {
                        services: down.clone(),
                    })
                },
            });

            if success {
                completed.push(phase.name.clone());
            } else {
                // Surface the tail of each failed service's logs; the
                // summary names them, this shows why.
                for service in &down {
                    match compose.logs(service, 20).await {
                        Ok(tail) if !tail.is_empty() => {
                            warn!(service = %service, "last log lines:\n{}", tail);
                        }
                        Ok(_) => {}
                        Err(e) => warn!(service = %service, error = %e, "could not fetch logs"),
                    }
                }

                let err = BerthError::HealthTimeout {
                    phase: phase.name.clone(),
                    services: down,
                };
                if options.continue_on_failure {
                    warn!(error = %err, "continuing past failed phase");
                } else {
                    warn!(error = %err, "aborting run");
                    break;
                }
            }
        }

        Ok(self.finish(recorder.summarize(validation), started))
    }

    fn finish(&self, summary: RunSummary, started: Instant) -> RunSummary {
        emit_run_finished(
            &summary.run_id,
            started.elapsed().as_millis() as u64,
            summary.results.len(),
            summary.overall_success,
        );

        // The summary artifact is best-effort; a write failure never
        // changes the run outcome.
        if let Some(path) = &self.config.summary_path {
            if let Err(e) = summary.write_json(path) {
                warn!(path = %path.display(), error = %e, "could not write summary artifact");
            }
        }

        summary
    }
}
