//! Service readiness probes.
//!
//! A probe is one of three mechanisms: a command whose exit code signals
//! readiness, a TCP connect, or an HTTP GET expecting a status code.
//! Every mechanism runs under a short per-call timeout so a wedged
//! collaborator cannot stall the polling loop.

use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::process::Command;
use tracing::debug;

/// Readiness probe specification for a single service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ProbeSpec {
    /// Run a command; exit code 0 means ready (e.g. `pg_isready`).
    Command { program: String, args: Vec<String> },

    /// Connect to a TCP endpoint; a successful connect means ready.
    Tcp { host: String, port: u16 },

    /// HTTP GET; the expected status means ready. Any other response
    /// proves the service is running but carries no health assertion.
    Http { url: String, expect_status: u16 },
}

/// Outcome of a single probe invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The service answered its readiness check.
    Ready,

    /// The service responded, but without explicit health information.
    Running,

    /// No usable answer within the call timeout.
    NotReady,
}

impl ProbeSpec {
    /// Command probe constructor.
    pub fn command(program: impl Into<String>, args: &[&str]) -> Self {
        Self::Command {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// TCP connect probe constructor.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// HTTP GET probe constructor.
    pub fn http(url: impl Into<String>, expect_status: u16) -> Self {
        Self::Http {
            url: url.into(),
            expect_status,
        }
    }

    /// Invoke the probe once.
    ///
    /// Never returns an error: any transport or spawn failure is a
    /// `NotReady` outcome, because "probe broken" and "service not up"
    /// are indistinguishable to the caller and handled identically.
    pub async fn execute(&self, http: &reqwest::Client, call_timeout: Duration) -> ProbeOutcome {
        match self {
            ProbeSpec::Command { program, args } => {
                let child = Command::new(program)
                    .args(args)
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .kill_on_drop(true)
                    .status();

                match tokio::time::timeout(call_timeout, child).await {
                    Ok(Ok(status)) if status.success() => ProbeOutcome::Ready,
                    Ok(Ok(status)) => {
                        debug!(probe = %program, code = ?status.code(), "command probe not ready");
                        ProbeOutcome::NotReady
                    }
                    Ok(Err(e)) => {
                        debug!(probe = %program, error = %e, "command probe failed to spawn");
                        ProbeOutcome::NotReady
                    }
                    Err(_) => {
                        debug!(probe = %program, "command probe timed out");
                        ProbeOutcome::NotReady
                    }
                }
            }

            ProbeSpec::Tcp { host, port } => {
                let connect = TcpStream::connect((host.as_str(), *port));
                match tokio::time::timeout(call_timeout, connect).await {
                    Ok(Ok(_)) => ProbeOutcome::Ready,
                    Ok(Err(e)) => {
                        debug!(probe = %host, port = port, error = %e, "tcp probe refused");
                        ProbeOutcome::NotReady
                    }
                    Err(_) => ProbeOutcome::NotReady,
                }
            }

            ProbeSpec::Http { url, expect_status } => {
                match http.get(url.as_str()).timeout(call_timeout).send().await {
                    Ok(resp) if resp.status().as_u16() == *expect_status => ProbeOutcome::Ready,
                    Ok(resp) => {
                        // Responding at all proves the process is up; the
                        // wrong status is "running, no explicit health info".
                        debug!(probe = %url, status = resp.status().as_u16(), "http probe running without health");
                        ProbeOutcome::Running
                    }
                    Err(e) => {
                        debug!(probe = %url, error = %e, "http probe unreachable");
                        ProbeOutcome::NotReady
                    }
                }
            }
        }
    }
}
