//! External secret-generator collaborator.
//!
//! Invoked at most once per run, before validation. The generator
//! populates the named variables the validator then checks for
//! presence; their content is never inspected here.

use std::process::Stdio;

use tokio::process::Command;
use tracing::info;

use crate::config::OrchestratorConfig;
use crate::error::{BerthError, Result};

/// Run the configured secret-generation command.
pub async fn generate_secrets(config: &OrchestratorConfig) -> Result<()> {
    let command = &config.secrets_command;
    if command.is_empty() {
        return Err(BerthError::SecretsFailed(
            "no generator command configured".to_string(),
        ));
    }

    info!(command = ?command, "invoking secret generator");

    let output = Command::new(&command[0])
        .args(&command[1..])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| BerthError::SecretsFailed(format!("{}: {}", command[0], e)))?;

    if output.status.success() {
        Ok(())
    } else {
        Err(BerthError::SecretsFailed(format!(
            "generator exited with {}: {}",
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}
