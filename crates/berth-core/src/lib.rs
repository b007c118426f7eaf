//! Berth Core Library
//!
//! Phase-gated deployment orchestration: environment validation, an
//! embedded phase registry, per-phase execution against a compose
//! client, health gating over readiness probes, and run reporting.

pub mod compose;
pub mod config;
pub mod error;
pub mod executor;
pub mod fakes;
pub mod health;
pub mod obs;
pub mod orchestrator;
pub mod probe;
pub mod registry;
pub mod report;
pub mod secrets;
pub mod telemetry;
pub mod validate;

pub use compose::{ComposeClient, DockerCompose, PsEntry};
pub use config::{EnvTag, OrchestratorConfig};
pub use error::{BerthError, Result};
pub use executor::{ExecutorOptions, PhaseExecutor, PhaseOutcome};
pub use health::{
    down_services, gate_passed, HealthGate, HealthStatus, PollPolicy, ServiceHealth,
};
pub use orchestrator::{Orchestrator, RunOptions};
pub use probe::{ProbeOutcome, ProbeSpec};
pub use registry::{
    Phase, PhaseRegistry, PhaseSelector, PriorityTier, ServiceRef, PROJECT_PREFIX,
    REQUIRED_SECRET_VARS,
};
pub use report::{FailureCause, PhaseResult, RunRecorder, RunSummary};
pub use secrets::generate_secrets;
pub use telemetry::init_tracing;
pub use validate::{CheckStatus, EnvironmentValidator, ValidationCheck, ValidationReport};

/// Berth version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
