//! Phase definitions and the compiled-in deployment registry.
//!
//! The registry is embedded policy, not external configuration: the
//! phase table is constructed once at process start and passed around
//! as an immutable value. Selecting a named phase or `All` is a pure
//! filter that preserves registry order.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::probe::ProbeSpec;

/// Environment variables that must be non-empty before deployment.
/// Checked for presence, never for content.
pub const REQUIRED_SECRET_VARS: &[&str] = &[
    "POSTGRES_PASSWORD",
    "REDIS_PASSWORD",
    "JWT_SECRET",
    "API_ENCRYPTION_KEY",
];

/// Compose project prefix; existing services under this prefix are
/// flagged (and replaced) by a deployment run.
pub const PROJECT_PREFIX: &str = "berth";

/// Priority tier of a phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    Critical,
    High,
    Medium,
}

/// A deployable service and its readiness probe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceRef {
    pub name: String,
    pub probe: ProbeSpec,
}

impl ServiceRef {
    pub fn new(name: impl Into<String>, probe: ProbeSpec) -> Self {
        Self {
            name: name.into(),
            probe,
        }
    }
}

/// A named, ordered group of services deployed and gated together.
///
/// Immutable once constructed; never mutated at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    pub services: Vec<ServiceRef>,
    pub priority: PriorityTier,
    pub prerequisites: Vec<String>,
    pub nominal_duration: Duration,
}

impl Phase {
    /// Service names in declaration order.
    pub fn service_names(&self) -> Vec<String> {
        self.services.iter().map(|s| s.name.clone()).collect()
    }
}

/// Which phases a run targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseSelector {
    Phase1,
    Phase2,
    Phase3,
    All,
    /// Run the environment validator alone; no phase executes.
    Validate,
}

impl PhaseSelector {
    fn matches(&self, index: usize) -> bool {
        match self {
            PhaseSelector::Phase1 => index == 0,
            PhaseSelector::Phase2 => index == 1,
            PhaseSelector::Phase3 => index == 2,
            PhaseSelector::All => true,
            PhaseSelector::Validate => false,
        }
    }
}

/// Ordered, immutable table of deployment phases.
pub struct PhaseRegistry {
    phases: Vec<Phase>,
}

impl PhaseRegistry {
    /// The embedded three-tier deployment table.
    pub fn builtin() -> Self {
        Self {
            phases: vec![
                Phase {
                    name: "infrastructure".to_string(),
                    services: vec![
                        ServiceRef::new(
                            "postgres",
                            ProbeSpec::command(
                                "pg_isready",
                                &["-h", "127.0.0.1", "-p", "5432", "-q"],
                            ),
                        ),
                        ServiceRef::new("redis", ProbeSpec::tcp("127.0.0.1", 6379)),
                    ],
                    priority: PriorityTier::Critical,
                    prerequisites: vec![],
                    nominal_duration: Duration::from_secs(30),
                },
                Phase {
                    name: "backend".to_string(),
                    services: vec![
                        ServiceRef::new(
                            "api",
                            ProbeSpec::http("http://127.0.0.1:8080/health", 200),
                        ),
                        ServiceRef::new("worker", ProbeSpec::tcp("127.0.0.1", 9090)),
                    ],
                    priority: PriorityTier::High,
                    prerequisites: vec!["infrastructure".to_string()],
                    nominal_duration: Duration::from_secs(60),
                },
                Phase {
                    name: "edge".to_string(),
                    services: vec![
                        ServiceRef::new(
                            "web",
                            ProbeSpec::http("http://127.0.0.1:3000/", 200),
                        ),
                        ServiceRef::new("proxy", ProbeSpec::tcp("127.0.0.1", 443)),
                    ],
                    priority: PriorityTier::Medium,
                    prerequisites: vec!["backend".to_string()],
                    nominal_duration: Duration::from_secs(45),
                },
            ],
        }
    }

    /// Build a registry from an explicit phase list (tests, embedding).
    pub fn from_phases(phases: Vec<Phase>) -> Self {
        Self { phases }
    }

    /// All phases in registry order.
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Phases targeted by `selector`, in registry order.
    ///
    /// Order is positional over the table, never dependent on any map
    /// iteration order. `Validate` selects nothing.
    pub fn select(&self, selector: PhaseSelector) -> Vec<Phase> {
        self.phases
            .iter()
            .enumerate()
            .filter(|(i, _)| selector.matches(*i))
            .map(|(_, p)| p.clone())
            .collect()
    }
}
