//! Pre-deployment environment validation.
//!
//! Each check is independent and side-effect-free apart from probing:
//! runtime availability, system resources, required secret variables,
//! and pre-existing services under this deployment's project prefix.
//! The report passes iff no check failed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sysinfo::{Disks, System};
use tracing::debug;

use crate::compose::ComposeClient;
use crate::config::OrchestratorConfig;
use crate::registry::REQUIRED_SECRET_VARS;

/// Status of one validation check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// One validation check result. Created fresh on every run; never
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationCheck {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

impl ValidationCheck {
    fn new(name: &str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            detail: detail.into(),
        }
    }
}

/// Aggregated validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub checks: Vec<ValidationCheck>,
    pub computed_at: DateTime<Utc>,
}

impl ValidationReport {
    pub fn new(checks: Vec<ValidationCheck>) -> Self {
        Self {
            checks,
            computed_at: Utc::now(),
        }
    }

    /// Passed iff no check is `Fail`. Warnings do not block.
    pub fn passed(&self) -> bool {
        !self.checks.iter().any(|c| c.status == CheckStatus::Fail)
    }

    pub fn failures(&self) -> Vec<&ValidationCheck> {
        self.checks
            .iter()
            .filter(|c| c.status == CheckStatus::Fail)
            .collect()
    }

    pub fn warnings(&self) -> Vec<&ValidationCheck> {
        self.checks
            .iter()
            .filter(|c| c.status == CheckStatus::Warn)
            .collect()
    }
}

/// Runtime and environment validator.
pub struct EnvironmentValidator;

impl EnvironmentValidator {
    /// Run every check and aggregate the report.
    pub async fn validate(
        config: &OrchestratorConfig,
        compose: &dyn ComposeClient,
    ) -> ValidationReport {
        let mut checks = Vec::new();

        checks.push(check_engine(compose).await);
        checks.push(check_compose_cli(compose).await);
        checks.extend(check_resources(
            config.min_available_memory_bytes,
            config.min_available_disk_bytes,
        ));
        checks.push(check_secrets(REQUIRED_SECRET_VARS));
        checks.push(check_existing_services(compose).await);

        ValidationReport::new(checks)
    }
}

async fn check_engine(compose: &dyn ComposeClient) -> ValidationCheck {
    match compose.engine_version().await {
        Ok(version) => ValidationCheck::new("container_engine", CheckStatus::Pass, version),
        Err(e) => ValidationCheck::new(
            "container_engine",
            CheckStatus::Fail,
            format!("engine did not answer version query: {}", e),
        ),
    }
}

async fn check_compose_cli(compose: &dyn ComposeClient) -> ValidationCheck {
    match compose.version().await {
        Ok(version) => ValidationCheck::new("compose_cli", CheckStatus::Pass, version),
        Err(e) => ValidationCheck::new(
            "compose_cli",
            CheckStatus::Fail,
            format!("compose CLI did not answer version query: {}", e),
        ),
    }
}

/// Memory below threshold warns; disk below threshold fails, since it
/// blocks image storage.
fn check_resources(min_memory: u64, min_disk: u64) -> Vec<ValidationCheck> {
    let mut sys = System::new();
    sys.refresh_memory();
    let available_memory = sys.available_memory();

    let memory_status = if available_memory >= min_memory {
        CheckStatus::Pass
    } else {
        CheckStatus::Warn
    };
    let memory = ValidationCheck::new(
        "available_memory",
        memory_status,
        format!(
            "{} GiB available, {} GiB required",
            available_memory / (1024 * 1024 * 1024),
            min_memory / (1024 * 1024 * 1024)
        ),
    );

    let disks = Disks::new_with_refreshed_list();
    let available_disk = disks
        .iter()
        .map(|d| d.available_space())
        .max()
        .unwrap_or(0);

    let disk_status = if available_disk >= min_disk {
        CheckStatus::Pass
    } else {
        CheckStatus::Fail
    };
    let disk = ValidationCheck::new(
        "available_disk",
        disk_status,
        format!(
            "{} GiB available, {} GiB required",
            available_disk / (1024 * 1024 * 1024),
            min_disk / (1024 * 1024 * 1024)
        ),
    );

    vec![memory, disk]
}

/// Every named variable must be present and non-empty. The detail
/// lists exactly which are missing.
fn check_secrets(required: &[&str]) -> ValidationCheck {
    let missing: Vec<&str> = required
        .iter()
        .filter(|var| std::env::var(**var).map(|v| v.is_empty()).unwrap_or(true))
        .copied()
        .collect();

    if missing.is_empty() {
        ValidationCheck::new(
            "required_secrets",
            CheckStatus::Pass,
            format!("{} variables present", required.len()),
        )
    } else {
        ValidationCheck::new(
            "required_secrets",
            CheckStatus::Fail,
            format!("missing: {}", missing.join(", ")),
        )
    }
}

/// Pre-existing services warn (they will be replaced), never fail.
async fn check_existing_services(compose: &dyn ComposeClient) -> ValidationCheck {
    match compose.ps().await {
        Ok(entries) if entries.is_empty() => {
            ValidationCheck::new("existing_services", CheckStatus::Pass, "none running")
        }
        Ok(entries) => {
            let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
            ValidationCheck::new(
                "existing_services",
                CheckStatus::Warn,
                format!("will be replaced: {}", names.join(", ")),
            )
        }
        Err(e) => {
            debug!(error = %e, "could not query existing services");
            ValidationCheck::new(
                "existing_services",
                CheckStatus::Warn,
                format!("could not query: {}", e),
            )
        }
    }
}
