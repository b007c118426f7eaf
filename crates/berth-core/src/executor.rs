//! Single-phase execution: teardown, build, bring-up.
//!
//! The three steps are a hard sequence; none may be reordered. The
//! bring-up call's own exit status is not authoritative about service
//! state, so control always returns to the health gate afterwards.

use tracing::{error, info, warn};

use crate::compose::ComposeClient;
use crate::error::BerthError;
use crate::registry::Phase;

/// Execution switches for a phase run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutorOptions {
    /// Log the plan, mutate nothing, report started.
    pub dry_run: bool,
    /// Skip the artifact build step.
    pub skip_build: bool,
}

/// What the executor managed to do for one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseOutcome {
    /// The bring-up step was reached (or simulated, in a dry run).
    pub started: bool,
    /// The build step succeeded or was skipped. A failed build is
    /// fatal for the phase and the whole run.
    pub build_ok: bool,
}

/// Runs one phase's teardown/build/bring-up sequence.
pub struct PhaseExecutor;

impl PhaseExecutor {
    pub async fn run(
        compose: &dyn ComposeClient,
        phase: &Phase,
        options: &ExecutorOptions,
    ) -> PhaseOutcome {
        let services = phase.service_names();

        if options.dry_run {
            info!(
                phase = %phase.name,
                services = ?services,
                skip_build = options.skip_build,
                nominal_secs = phase.nominal_duration.as_secs(),
                "dry run: would tear down, build, and bring up"
            );
            return PhaseOutcome {
                started: true,
                build_ok: true,
            };
        }

        // 1. Stale-instance teardown: best-effort, never fatal.
        if let Err(e) = compose.down(&services).await {
            let err = BerthError::TeardownFailed {
                phase: phase.name.clone(),
                detail: e.to_string(),
            };
            warn!(error = %err, "continuing to bring-up");
        }

        // 2. Build. Failure here stops the run; no health polling for a
        //    phase whose artifacts do not exist.
        if !options.skip_build {
            if let Err(e) = compose.build(&services).await {
                let err = BerthError::BuildFailed {
                    phase: phase.name.clone(),
                    detail: e.to_string(),
                };
                error!(error = %err, "phase cannot start");
                return PhaseOutcome {
                    started: false,
                    build_ok: false,
                };
            }
        }

        // 3. One atomic bring-up for the whole service set. An error is
        //    recorded, not trusted: the gate decides readiness.
        if let Err(e) = compose.up(&services).await {
            let err = BerthError::BringUpFailed {
                phase: phase.name.clone(),
                detail: e.to_string(),
            };
            warn!(error = %err, "gating anyway");
        }

        PhaseOutcome {
            started: true,
            build_ok: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::RecordingCompose;
    use crate::probe::ProbeSpec;
    use crate::registry::{PriorityTier, ServiceRef};
    use std::time::Duration;

    fn test_phase() -> Phase {
        Phase {
            name: "backend".to_string(),
            services: vec![
                ServiceRef::new("api", ProbeSpec::command("true", &[])),
                ServiceRef::new("worker", ProbeSpec::command("true", &[])),
            ],
            priority: PriorityTier::High,
            prerequisites: vec![],
            nominal_duration: Duration::from_secs(30),
        }
    }

    #[tokio::test]
    async fn test_happy_path_sequence() {
        let compose = RecordingCompose::new();
        let outcome =
            PhaseExecutor::run(&compose, &test_phase(), &ExecutorOptions::default()).await;

        assert!(outcome.started);
        assert!(outcome.build_ok);
        assert_eq!(
            compose.calls(),
            vec!["down api worker", "build api worker", "up api worker"]
        );
    }

    #[tokio::test]
    async fn test_teardown_failure_is_not_fatal() {
        let compose = RecordingCompose::new().failing_down();
        let outcome =
            PhaseExecutor::run(&compose, &test_phase(), &ExecutorOptions::default()).await;

        assert!(outcome.started);
        // Bring-up is still attempted after a failed teardown.
        assert!(compose.calls().iter().any(|c| c.starts_with("up ")));
    }

    #[tokio::test]
    async fn test_build_failure_stops_before_bring_up() {
        let compose = RecordingCompose::new().failing_build();
        let outcome =
            PhaseExecutor::run(&compose, &test_phase(), &ExecutorOptions::default()).await;

        assert!(!outcome.started);
        assert!(!outcome.build_ok);
        assert!(!compose.calls().iter().any(|c| c.starts_with("up ")));
    }

    #[tokio::test]
    async fn test_skip_build_omits_build_call() {
        let compose = RecordingCompose::new();
        let options = ExecutorOptions {
            skip_build: true,
            ..Default::default()
        };
        let outcome = PhaseExecutor::run(&compose, &test_phase(), &options).await;

        assert!(outcome.started);
        assert_eq!(compose.calls(), vec!["down api worker", "up api worker"]);
    }

    #[tokio::test]
    async fn test_bring_up_failure_still_hands_off_to_gate() {
        let compose = RecordingCompose::new().failing_up();
        let outcome =
            PhaseExecutor::run(&compose, &test_phase(), &ExecutorOptions::default()).await;

        // The reported error is not authoritative; gating proceeds.
        assert!(outcome.started);
        assert!(outcome.build_ok);
    }

    #[tokio::test]
    async fn test_dry_run_mutates_nothing() {
        let compose = RecordingCompose::new();
        let options = ExecutorOptions {
            dry_run: true,
            ..Default::default()
        };
        let outcome = PhaseExecutor::run(&compose, &test_phase(), &options).await;

        assert!(outcome.started);
        assert!(outcome.build_ok);
        assert_eq!(compose.mutating_calls(), 0);
        assert!(compose.calls().is_empty());
    }
}
