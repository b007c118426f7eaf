//! Orchestrator configuration.
//!
//! Defaults are embedded; `from_env` lets deployments override the
//! compose file, polling cadence, and summary artifact path without a
//! config file. The environment tag only affects labels and thresholds
//! passed to collaborators, never orchestrator logic.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::health::PollPolicy;
use crate::registry::PROJECT_PREFIX;

const GIB: u64 = 1024 * 1024 * 1024;

/// Deployment environment tag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnvTag {
    #[default]
    Development,
    Staging,
    Production,
}

impl EnvTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvTag::Development => "development",
            EnvTag::Staging => "staging",
            EnvTag::Production => "production",
        }
    }
}

impl std::fmt::Display for EnvTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for one orchestrator run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrchestratorConfig {
    /// Compose manifest driving every phase.
    pub compose_file: PathBuf,

    /// Compose project name (prefix + environment tag).
    pub project: String,

    /// Environment tag, passed to collaborators as a label.
    pub env: EnvTag,

    /// Retry policy shared by all readiness probes.
    pub poll: PollPolicy,

    /// Per-invocation probe timeout (one HTTP GET, one connect, one
    /// command run).
    pub probe_call_timeout: Duration,

    /// Below this available memory the validator warns.
    pub min_available_memory_bytes: u64,

    /// Below this available disk the validator fails (blocks image
    /// storage).
    pub min_available_disk_bytes: u64,

    /// External secret-generator command, invoked once when requested.
    pub secrets_command: Vec<String>,

    /// Optional path for the human-readable run summary artifact.
    pub summary_path: Option<PathBuf>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::for_env(EnvTag::Development)
    }
}

impl OrchestratorConfig {
    /// Defaults for the given environment tag.
    pub fn for_env(env: EnvTag) -> Self {
        Self {
            compose_file: PathBuf::from("docker-compose.yml"),
            project: format!("{}-{}", PROJECT_PREFIX, env.as_str()),
            env,
            poll: PollPolicy::default(),
            probe_call_timeout: Duration::from_secs(5),
            min_available_memory_bytes: 8 * GIB,
            min_available_disk_bytes: 20 * GIB,
            secrets_command: vec![
                "sh".to_string(),
                "./scripts/generate-secrets.sh".to_string(),
            ],
            summary_path: None,
        }
    }

    /// Defaults for `env`, overridden from `BERTH_*` environment
    /// variables where set.
    pub fn from_env(env: EnvTag) -> Self {
        let mut config = Self::for_env(env);

        if let Ok(file) = std::env::var("BERTH_COMPOSE_FILE") {
            config.compose_file = PathBuf::from(file);
        }
        if let Ok(project) = std::env::var("BERTH_PROJECT") {
            config.project = project;
        }
        if let Some(secs) = read_secs("BERTH_POLL_INTERVAL_SECS") {
            config.poll.interval = Duration::from_secs(secs);
        }
        if let Some(secs) = read_secs("BERTH_SERVICE_TIMEOUT_SECS") {
            config.poll.timeout = Duration::from_secs(secs);
        }
        if let Ok(path) = std::env::var("BERTH_SUMMARY_PATH") {
            config.summary_path = Some(PathBuf::from(path));
        }

        config
    }
}

fn read_secs(var: &str) -> Option<u64> {
    std::env::var(var).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.env, EnvTag::Development);
        assert_eq!(config.project, "berth-development");
        assert_eq!(config.min_available_memory_bytes, 8 * GIB);
        assert_eq!(config.min_available_disk_bytes, 20 * GIB);
        assert!(config.summary_path.is_none());
    }

    #[test]
    fn test_env_tag_shapes_project_name() {
        let config = OrchestratorConfig::for_env(EnvTag::Production);
        assert_eq!(config.project, "berth-production");
        assert_eq!(config.env.to_string(), "production");
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = OrchestratorConfig::for_env(EnvTag::Staging);
        let json = serde_json::to_string(&config).expect("serialize");
        let deserialized: OrchestratorConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(config, deserialized);
    }
}
