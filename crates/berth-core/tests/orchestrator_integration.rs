//! Integration tests for the deployment run loop with RecordingCompose.

use std::time::Duration;

use berth_core::fakes::RecordingCompose;
use berth_core::{
    FailureCause, HealthStatus, OrchestratorConfig, Orchestrator, Phase, PhaseRegistry,
    PhaseSelector, PollPolicy, PriorityTier, ProbeSpec, RunOptions, ServiceRef,
};
use tokio::sync::watch;

fn quick_config() -> OrchestratorConfig {
    OrchestratorConfig {
        poll: PollPolicy {
            interval: Duration::from_millis(30),
            timeout: Duration::from_millis(250),
        },
        probe_call_timeout: Duration::from_secs(5),
        min_available_memory_bytes: 0,
        min_available_disk_bytes: 0,
        ..OrchestratorConfig::default()
    }
}

fn phase(name: &str, services: Vec<ServiceRef>) -> Phase {
    Phase {
        name: name.to_string(),
        services,
        priority: PriorityTier::Critical,
        prerequisites: vec![],
        nominal_duration: Duration::from_secs(1),
    }
}

fn no_cancel() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    // Keep the sender alive for the whole test process.
    std::mem::forget(tx);
    rx
}

/// Test: two healthy phases, full compose sequence, exit code 0.
#[tokio::test]
async fn test_successful_deployment() {
    let registry = PhaseRegistry::from_phases(vec![
        phase(
            "infrastructure",
            vec![
                ServiceRef::new("db", ProbeSpec::command("true", &[])),
                ServiceRef::new("cache", ProbeSpec::command("true", &[])),
            ],
        ),
        phase(
            "backend",
            vec![ServiceRef::new("api", ProbeSpec::command("true", &[]))],
        ),
    ]);
    let compose = RecordingCompose::new();
    let options = RunOptions {
        skip_validation: true,
        ..Default::default()
    };

    let summary = Orchestrator::new(quick_config())
        .run(&compose, &registry, &options, no_cancel())
        .await
        .expect("run failed");

    assert!(summary.overall_success);
    assert_eq!(summary.exit_code, 0);
    assert_eq!(summary.results.len(), 2);
    assert!(summary.results.iter().all(|r| r.success));

    // Each phase issued exactly its teardown/build/bring-up triple, in
    // phase order.
    assert_eq!(
        compose.calls(),
        vec![
            "down db cache",
            "build db cache",
            "up db cache",
            "down api",
            "build api",
            "up api",
        ]
    );
}

/// Test: the spec's canonical scenario. `db` becomes ready on the 2nd
/// probe attempt, `cache` on the 1st, `api` never. Phase 1 succeeds,
/// phase 2 fails with `api` down, overall failure, exit code 1.
#[tokio::test]
async fn test_db_ready_on_second_attempt_api_never() {
    let dir = tempfile::tempdir().expect("tempdir");
    let marker = dir.path().join("db-came-up");
    // Fails once, then passes: readiness on the second attempt.
    let db_script = format!(
        "test -f {m} || {{ touch {m}; exit 1; }}",
        m = marker.display()
    );

    let registry = PhaseRegistry::from_phases(vec![
        phase(
            "infrastructure",
            vec![
                ServiceRef::new("db", ProbeSpec::command("sh", &["-c", &db_script])),
                ServiceRef::new("cache", ProbeSpec::command("true", &[])),
            ],
        ),
        phase(
            "backend",
            vec![ServiceRef::new("api", ProbeSpec::command("false", &[]))],
        ),
    ]);
    let compose = RecordingCompose::new();
    let options = RunOptions {
        skip_validation: true,
        ..Default::default()
    };

    let summary = Orchestrator::new(quick_config())
        .run(&compose, &registry, &options, no_cancel())
        .await
        .expect("run failed");

    assert_eq!(summary.results.len(), 2);

    let infra = &summary.results[0];
    assert_eq!(infra.phase, "infrastructure");
    assert!(infra.success);
    assert_eq!(infra.health["db"].status, HealthStatus::Healthy);
    assert_eq!(infra.health["cache"].status, HealthStatus::Healthy);

    let backend = &summary.results[1];
    assert_eq!(backend.phase, "backend");
    assert!(!backend.success);
    assert_eq!(backend.health["api"].status, HealthStatus::Down);
    assert_eq!(
        backend.failure,
        Some(FailureCause::ServicesDown {
            services: vec!["api".to_string()],
        })
    );

    assert!(!summary.overall_success);
    assert_eq!(summary.exit_code, 1);
}

/// Test: missing required secret aborts before any phase and names
/// the variable.
#[tokio::test]
async fn test_missing_secret_aborts_with_zero_phase_results() {
    for var in berth_core::REQUIRED_SECRET_VARS {
        std::env::remove_var(var);
    }

    let registry = PhaseRegistry::from_phases(vec![phase(
        "infrastructure",
        vec![ServiceRef::new("db", ProbeSpec::command("true", &[]))],
    )]);
    let compose = RecordingCompose::new();
    let options = RunOptions::default();

    let summary = Orchestrator::new(quick_config())
        .run(&compose, &registry, &options, no_cancel())
        .await
        .expect("run failed");

    assert!(summary.results.is_empty());
    assert!(!summary.overall_success);
    assert_eq!(summary.exit_code, 1);

    let report = summary.validation.expect("validation report");
    assert!(!report.passed());
    let secrets = report
        .checks
        .iter()
        .find(|c| c.name == "required_secrets")
        .expect("secrets check");
    assert!(secrets.detail.contains("POSTGRES_PASSWORD"));

    // Nothing mutated before the abort.
    assert_eq!(compose.mutating_calls(), 0);
}

/// Test: validate-only invocation never touches a phase.
#[tokio::test]
async fn test_validate_only_executes_no_phase() {
    let registry = PhaseRegistry::from_phases(vec![phase(
        "infrastructure",
        vec![ServiceRef::new("db", ProbeSpec::command("true", &[]))],
    )]);
    let compose = RecordingCompose::new();
    let options = RunOptions {
        selector: PhaseSelector::Validate,
        ..Default::default()
    };

    let summary = Orchestrator::new(quick_config())
        .run(&compose, &registry, &options, no_cancel())
        .await
        .expect("run failed");

    assert!(summary.results.is_empty());
    assert!(summary.validation.is_some());
    assert_eq!(compose.mutating_calls(), 0);
}

/// Test: dry run selects everything, mutates nothing, succeeds.
#[tokio::test]
async fn test_dry_run_purity() {
    let registry = PhaseRegistry::from_phases(vec![
        phase(
            "infrastructure",
            // Probes that would fail if they ever ran.
            vec![ServiceRef::new("db", ProbeSpec::command("false", &[]))],
        ),
        phase(
            "backend",
            vec![ServiceRef::new("api", ProbeSpec::command("false", &[]))],
        ),
    ]);
    let compose = RecordingCompose::new();
    let options = RunOptions {
        skip_validation: true,
        dry_run: true,
        ..Default::default()
    };

    let summary = Orchestrator::new(quick_config())
        .run(&compose, &registry, &options, no_cancel())
        .await
        .expect("run failed");

    assert_eq!(compose.mutating_calls(), 0);
    assert!(compose.calls().is_empty());
    assert_eq!(summary.results.len(), 2);
    assert!(summary.results.iter().all(|r| r.success));
    assert!(summary.overall_success);
    assert_eq!(summary.exit_code, 0);
}

/// Test: degraded services pass the gate but are reported distinctly.
#[tokio::test]
async fn test_degraded_service_passes_phase() {
    // An HTTP probe against a listener that answers with the wrong
    // status: running, no explicit health info.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                use tokio::io::{AsyncReadExt, AsyncWriteExt};
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\n\r\n")
                    .await;
            });
        }
    });

    let registry = PhaseRegistry::from_phases(vec![phase(
        "backend",
        vec![ServiceRef::new(
            "api",
            ProbeSpec::http(format!("http://{}/health", addr), 200),
        )],
    )]);
    let compose = RecordingCompose::new();
    let options = RunOptions {
        skip_validation: true,
        ..Default::default()
    };

    let summary = Orchestrator::new(quick_config())
        .run(&compose, &registry, &options, no_cancel())
        .await
        .expect("run failed");

    assert_eq!(summary.results.len(), 1);
    let backend = &summary.results[0];
    assert!(backend.success, "degraded must not block phase success");
    assert_eq!(backend.health["api"].status, HealthStatus::Degraded);
    assert!(summary.overall_success);
}
