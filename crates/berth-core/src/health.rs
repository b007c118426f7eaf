//! Health gate: the polling barrier between bring-up and phase success.
//!
//! Each service gets its own bounded polling loop running as a tokio
//! task; loops touch disjoint services and write disjoint map keys, so
//! the only synchronization is the join barrier at the end. The
//! per-service deadline means a phase's wall-clock cost is its slowest
//! service, not the sum of all timeouts.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::probe::ProbeOutcome;
use crate::registry::ServiceRef;

/// Bounded-retry policy shared by all probes in a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollPolicy {
    /// Sleep between probe attempts.
    pub interval: Duration,
    /// Hard per-service deadline.
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(180),
        }
    }
}

/// Health classification of one service after gating.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// The readiness probe succeeded.
    Healthy,
    /// Running without explicit health information. Reported
    /// distinctly but does not block phase success.
    Degraded,
    /// Never reached `Healthy`/`Degraded` within the deadline.
    Down,
}

/// Latest health observation for one service. Recomputed on every
/// poll tick; superseded, not merged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceHealth {
    pub service: String,
    pub status: HealthStatus,
    pub last_checked_at: DateTime<Utc>,
}

/// True when no service is `Down` (`Degraded` passes the gate).
pub fn gate_passed(health: &BTreeMap<String, ServiceHealth>) -> bool {
    health.values().all(|h| h.status != HealthStatus::Down)
}

/// Services classified `Down`, in name order.
pub fn down_services(health: &BTreeMap<String, ServiceHealth>) -> Vec<String> {
    health
        .values()
        .filter(|h| h.status == HealthStatus::Down)
        .map(|h| h.service.clone())
        .collect()
}

/// Polling barrier over a phase's services.
pub struct HealthGate;

impl HealthGate {
    /// Poll every service until it is ready or its deadline elapses.
    ///
    /// Probes for distinct services run concurrently; each service gets
    /// its own full deadline, never a shared one. An abort signal
    /// on `cancel` stops in-flight loops promptly instead of letting
    /// them wait out their timeouts.
    pub async fn wait(
        services: &[ServiceRef],
        policy: PollPolicy,
        probe_timeout: Duration,
        cancel: watch::Receiver<bool>,
    ) -> BTreeMap<String, ServiceHealth> {
        let http = reqwest::Client::new();

        let mut tasks: Vec<JoinHandle<ServiceHealth>> = Vec::with_capacity(services.len());
        for service in services {
            let service = service.clone();
            let http = http.clone();
            let cancel = cancel.clone();
            tasks.push(tokio::spawn(async move {
                poll_service(service, policy, probe_timeout, http, cancel).await
            }));
        }

        let mut health = BTreeMap::new();
        for (task, service) in tasks.into_iter().zip(services) {
            match task.await {
                Ok(result) => {
                    health.insert(result.service.clone(), result);
                }
                Err(e) => {
                    // A panicked poll loop counts as an unanswered probe.
                    warn!(service = %service.name, error = %e, "poll task aborted");
                    health.insert(
                        service.name.clone(),
                        ServiceHealth {
                            service: service.name.clone(),
                            status: HealthStatus::Down,
                            last_checked_at: Utc::now(),
                        },
                    );
                }
            }
        }
        health
    }
}

/// One service's bounded polling loop.
///
/// Returns within `policy.timeout + policy.interval` even when the
/// probe never answers. A service whose only signal was "running, no
/// health info" finishes `Degraded` rather than `Down`.
async fn poll_service(
    service: ServiceRef,
    policy: PollPolicy,
    probe_timeout: Duration,
    http: reqwest::Client,
    mut cancel: watch::Receiver<bool>,
) -> ServiceHealth {
    let deadline = Instant::now() + policy.timeout;
    let mut saw_running = false;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let checked_at = Utc::now();

        match service.probe.execute(&http, probe_timeout).await {
            ProbeOutcome::Ready => {
                debug!(service = %service.name, attempt = attempt, "service healthy");
                return ServiceHealth {
                    service: service.name,
                    status: HealthStatus::Healthy,
                    last_checked_at: checked_at,
                };
            }
            ProbeOutcome::Running => {
                saw_running = true;
            }
            ProbeOutcome::NotReady => {}
        }

        if Instant::now() >= deadline {
            let status = if saw_running {
                HealthStatus::Degraded
            } else {
                HealthStatus::Down
            };
            debug!(service = %service.name, attempts = attempt, status = ?status, "deadline elapsed");
            return ServiceHealth {
                service: service.name,
                status,
                last_checked_at: checked_at,
            };
        }

        // The sleep between attempts is the single blocking point, so
        // it is also where the abort signal is honored.
        let tick = tokio::time::sleep(policy.interval);
        tokio::pin!(tick);
        loop {
            tokio::select! {
                _ = &mut tick => break,
                changed = cancel.changed() => {
                    match changed {
                        Ok(()) if *cancel.borrow() => {
                            warn!(service = %service.name, "polling cancelled");
                            return ServiceHealth {
                                service: service.name,
                                status: HealthStatus::Down,
                                last_checked_at: Utc::now(),
                            };
                        }
                        Ok(()) => continue,
                        Err(_) => {
                            // Sender gone; no abort can arrive anymore.
                            (&mut tick).await;
                            break;
                        }
                    }
                }
            }
        }
    }
}
