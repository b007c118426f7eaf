//! Container-orchestration client seam.
//!
//! `ComposeClient` is the only surface through which the orchestrator
//! touches the container control plane. The production implementation
//! shells out to `docker compose`; tests use the in-memory fake from
//! [`crate::fakes`].

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::error::{BerthError, Result};

/// One row of `ps` output: a running service and its reported state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PsEntry {
    pub name: String,
    pub status: String,
}

/// Operations the orchestrator needs from the compose tool.
///
/// `up`, `down`, and `build` are the mutating operations; a dry run
/// must never reach them.
#[async_trait]
pub trait ComposeClient: Send + Sync {
    /// Compose CLI version string.
    async fn version(&self) -> Result<String>;

    /// Container engine version string.
    async fn engine_version(&self) -> Result<String>;

    /// Bring up the given services with one atomic call. Ordering
    /// between them is the manifest's responsibility, not ours.
    async fn up(&self, services: &[String]) -> Result<()>;

    /// Stop and remove the given services (stale-instance teardown).
    async fn down(&self, services: &[String]) -> Result<()>;

    /// Build artifacts for the given services.
    async fn build(&self, services: &[String]) -> Result<()>;

    /// Currently running services in this project.
    async fn ps(&self) -> Result<Vec<PsEntry>>;

    /// Tail of one service's logs.
    async fn logs(&self, service: &str, tail: usize) -> Result<String>;
}

/// `docker compose` subprocess client.
#[derive(Debug, Clone)]
pub struct DockerCompose {
    compose_file: PathBuf,
    project: String,
}

impl DockerCompose {
    pub fn new(compose_file: impl Into<PathBuf>, project: impl Into<String>) -> Self {
        Self {
            compose_file: compose_file.into(),
            project: project.into(),
        }
    }

    /// Run `docker compose -f <file> -p <project> <args>` and capture output.
    async fn compose_exec(&self, args: &[&str]) -> Result<String> {
        let mut full: Vec<&str> = vec!["compose", "-f"];
        let file = self.compose_file.to_string_lossy();
        full.push(file.as_ref());
        full.push("-p");
        full.push(&self.project);
        full.extend_from_slice(args);
        raw_exec("docker", &full).await
    }
}

/// Run a command, capture stdout, and map a non-zero exit to an error
/// carrying stderr.
async fn raw_exec(program: &str, args: &[&str]) -> Result<String> {
    debug!(program = %program, args = ?args, "exec");

    let output = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        Err(BerthError::Compose(format!(
            "{} {} exited with {}: {}",
            program,
            args.join(" "),
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

/// One line of `docker compose ps --format json` output.
#[derive(Debug, Deserialize)]
struct PsLine {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "State")]
    state: String,
}

#[async_trait]
impl ComposeClient for DockerCompose {
    async fn version(&self) -> Result<String> {
        raw_exec("docker", &["compose", "version", "--short"]).await
    }

    async fn engine_version(&self) -> Result<String> {
        raw_exec("docker", &["--version"]).await
    }

    async fn up(&self, services: &[String]) -> Result<()> {
        let mut args = vec!["up", "-d", "--no-build"];
        let names: Vec<&str> = services.iter().map(|s| s.as_str()).collect();
        args.extend_from_slice(&names);
        self.compose_exec(&args).await?;
        Ok(())
    }

    async fn down(&self, services: &[String]) -> Result<()> {
        // `rm --stop --force <svc>` is one call per phase, leaving the
        // rest of the project untouched.
        let mut args = vec!["rm", "--stop", "--force"];
        let names: Vec<&str> = services.iter().map(|s| s.as_str()).collect();
        args.extend_from_slice(&names);
        self.compose_exec(&args).await?;
        Ok(())
    }

    async fn build(&self, services: &[String]) -> Result<()> {
        let mut args = vec!["build"];
        let names: Vec<&str> = services.iter().map(|s| s.as_str()).collect();
        args.extend_from_slice(&names);
        self.compose_exec(&args).await?;
        Ok(())
    }

    async fn ps(&self) -> Result<Vec<PsEntry>> {
        let stdout = self.compose_exec(&["ps", "--format", "json"]).await?;

        // Newline-delimited JSON objects; tolerate lines we can't parse.
        let mut entries = Vec::new();
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<PsLine>(line) {
                Ok(ps) => entries.push(PsEntry {
                    name: ps.name,
                    status: ps.state,
                }),
                Err(e) => debug!(error = %e, "skipping unparseable ps line"),
            }
        }
        Ok(entries)
    }

    async fn logs(&self, service: &str, tail: usize) -> Result<String> {
        let tail = tail.to_string();
        self.compose_exec(&["logs", "--no-color", "--tail", &tail, service])
            .await
    }
}
