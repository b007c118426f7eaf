//! In-memory fake for the compose client trait (testing only)
//!
//! `RecordingCompose` satisfies the [`ComposeClient`] contract without a
//! container runtime, records every call it receives, and can be
//! scripted to fail individual operations.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::compose::{ComposeClient, PsEntry};
use crate::error::{BerthError, Result};

/// Compose fake that records calls and optionally fails operations.
#[derive(Debug, Default)]
pub struct RecordingCompose {
    calls: Mutex<Vec<String>>,
    ps_entries: Mutex<Vec<PsEntry>>,
    fail_version: bool,
    fail_up: bool,
    fail_down: bool,
    fail_build: bool,
}

impl RecordingCompose {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail version queries (simulates a missing engine).
    pub fn failing_version(mut self) -> Self {
        self.fail_version = true;
        self
    }

    /// Fail bring-up calls.
    pub fn failing_up(mut self) -> Self {
        self.fail_up = true;
        self
    }

    /// Fail teardown calls.
    pub fn failing_down(mut self) -> Self {
        self.fail_down = true;
        self
    }

    /// Fail build calls.
    pub fn failing_build(mut self) -> Self {
        self.fail_build = true;
        self
    }

    /// Pre-seed the `ps` response (simulates pre-existing services).
    pub fn with_running(self, names: &[&str]) -> Self {
        {
            let mut entries = self.ps_entries.lock().unwrap();
            *entries = names
                .iter()
                .map(|n| PsEntry {
                    name: n.to_string(),
                    status: "running".to_string(),
                })
                .collect();
        }
        self
    }

    /// Every call received so far, e.g. `"up api worker"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of mutating calls (`up`/`down`/`build`) received.
    pub fn mutating_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| {
                c.starts_with("up ") || c.starts_with("down ") || c.starts_with("build ")
            })
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ComposeClient for RecordingCompose {
    async fn version(&self) -> Result<String> {
        self.record("version".to_string());
        if self.fail_version {
            return Err(BerthError::Compose("compose CLI not found".to_string()));
        }
        Ok("2.24.0-fake".to_string())
    }

    async fn engine_version(&self) -> Result<String> {
        self.record("engine_version".to_string());
        if self.fail_version {
            return Err(BerthError::Compose("engine not found".to_string()));
        }
        Ok("Docker version 25.0.0-fake".to_string())
    }

    async fn up(&self, services: &[String]) -> Result<()> {
        self.record(format!("up {}", services.join(" ")));
        if self.fail_up {
            return Err(BerthError::Compose("up failed".to_string()));
        }
        Ok(())
    }

    async fn down(&self, services: &[String]) -> Result<()> {
        self.record(format!("down {}", services.join(" ")));
        if self.fail_down {
            return Err(BerthError::Compose("down failed".to_string()));
        }
        Ok(())
    }

    async fn build(&self, services: &[String]) -> Result<()> {
        self.record(format!("build {}", services.join(" ")));
        if self.fail_build {
            return Err(BerthError::Compose("build failed".to_string()));
        }
        Ok(())
    }

    async fn ps(&self) -> Result<Vec<PsEntry>> {
        self.record("ps".to_string());
        Ok(self.ps_entries.lock().unwrap().clone())
    }

    async fn logs(&self, service: &str, tail: usize) -> Result<String> {
        self.record(format!("logs {} {}", service, tail));
        Ok(String::new())
    }
}
