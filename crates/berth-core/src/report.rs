//! Run result aggregation and summary artifacts.
//!
//! The recorder is an append-only log of phase results; the summary is
//! purely a fold over that log and never re-derives success from
//! external state. The same recorded log always yields the same
//! summary.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::health::{HealthStatus, ServiceHealth};
use crate::validate::ValidationReport;

/// Why a phase failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "cause")]
pub enum FailureCause {
    /// Artifact build failed; no health polling was attempted.
    BuildFailed,
    /// One or more services never left `Down`.
    ServicesDown { services: Vec<String> },
}

/// Outcome of one attempted phase. Created when the phase completes,
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseResult {
    pub phase: String,
    pub success: bool,
    pub duration_ms: u64,
    pub services_attempted: Vec<String>,
    pub health: BTreeMap<String, ServiceHealth>,
    pub failure: Option<FailureCause>,
}

/// Append-only log of phase results for one run.
pub struct RunRecorder {
    run_id: String,
    requested: usize,
    results: Vec<PhaseResult>,
}

impl RunRecorder {
    /// `requested` is the number of phases this run targets; a summary
    /// only counts as an overall success when every one of them
    /// produced a successful result.
    pub fn new(run_id: impl Into<String>, requested: usize) -> Self {
        Self {
            run_id: run_id.into(),
            requested,
            results: Vec::new(),
        }
    }

    pub fn record(&mut self, result: PhaseResult) {
        self.results.push(result);
    }

    pub fn results(&self) -> &[PhaseResult] {
        &self.results
    }

    /// Fold the log into the final summary.
    pub fn summarize(self, validation: Option<ValidationReport>) -> RunSummary {
        let overall_success = self.results.iter().all(|r| r.success)
            && self.results.len() == self.requested;
        RunSummary {
            run_id: self.run_id,
            overall_success,
            exit_code: if overall_success { 0 } else { 1 },
            results: self.results,
            validation,
            computed_at: Utc::now(),
        }
    }
}

/// Final run summary: the sole user-facing artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub overall_success: bool,
    pub exit_code: i32,
    pub results: Vec<PhaseResult>,
    pub validation: Option<ValidationReport>,
    pub computed_at: DateTime<Utc>,
}

impl RunSummary {
    /// Summary for a validate-only invocation: success tracks the
    /// report, no phase results exist.
    pub fn from_validation(run_id: impl Into<String>, report: ValidationReport) -> Self {
        let passed = report.passed();
        Self {
            run_id: run_id.into(),
            overall_success: passed,
            exit_code: if passed { 0 } else { 1 },
            results: Vec::new(),
            validation: Some(report),
            computed_at: Utc::now(),
        }
    }

    /// Render the human-readable summary text.
    pub fn render_text(&self) -> String {
        let mut out = format!("deployment summary (run {})\n", self.run_id);

        if let Some(report) = &self.validation {
            out.push_str(&format!(
                "validation: {}\n",
                if report.passed() { "passed" } else { "FAILED" }
            ));
            for check in &report.checks {
                out.push_str(&format!(
                    "  [{:4?}] {}: {}\n",
                    check.status, check.name, check.detail
                ));
            }
        }

        for result in &self.results {
            let verdict = if result.success { "ok" } else { "FAILED" };
            out.push_str(&format!(
                "  {:16} {:6} {:>8.1}s  [{}]\n",
                result.phase,
                verdict,
                result.duration_ms as f64 / 1000.0,
                result.services_attempted.join(", ")
            ));
            for health in result.health.values() {
                if health.status != HealthStatus::Healthy {
                    out.push_str(&format!(
                        "      {}: {:?}\n",
                        health.service, health.status
                    ));
                }
            }
            if let Some(FailureCause::BuildFailed) = &result.failure {
                out.push_str("      build failed\n");
            }
        }

        out.push_str(&format!(
            "overall: {} (exit {})\n",
            if self.overall_success { "ok" } else { "FAILED" },
            self.exit_code
        ));
        out
    }

    /// Write the summary as a JSON artifact. Not load-bearing for
    /// subsequent runs.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase_result(phase: &str, success: bool) -> PhaseResult {
        PhaseResult {
            phase: phase.to_string(),
            success,
            duration_ms: 1500,
            services_attempted: vec!["svc".to_string()],
            health: BTreeMap::new(),
            failure: if success {
                None
            } else {
                Some(FailureCause::ServicesDown {
                    services: vec!["svc".to_string()],
                })
            },
        }
    }

    #[test]
    fn test_all_success_exit_zero() {
        let mut recorder = RunRecorder::new("run-1", 2);
        recorder.record(phase_result("infrastructure", true));
        recorder.record(phase_result("backend", true));

        let summary = recorder.summarize(None);
        assert!(summary.overall_success);
        assert_eq!(summary.exit_code, 0);
        assert_eq!(summary.results.len(), 2);
    }

    #[test]
    fn test_any_failure_exit_one() {
        let mut recorder = RunRecorder::new("run-1", 2);
        recorder.record(phase_result("infrastructure", true));
        recorder.record(phase_result("backend", false));

        let summary = recorder.summarize(None);
        assert!(!summary.overall_success);
        assert_eq!(summary.exit_code, 1);
    }

    #[test]
    fn test_missing_phases_fail_overall() {
        // Aborted after the first of three requested phases.
        let mut recorder = RunRecorder::new("run-1", 3);
        recorder.record(phase_result("infrastructure", true));

        let summary = recorder.summarize(None);
        assert!(!summary.overall_success);
        assert_eq!(summary.exit_code, 1);
    }

    #[test]
    fn test_summary_is_deterministic_fold() {
        let build = || {
            let mut recorder = RunRecorder::new("run-1", 2);
            recorder.record(phase_result("infrastructure", true));
            recorder.record(phase_result("backend", false));
            recorder.summarize(None)
        };
        let a = build();
        let b = build();
        assert_eq!(a.overall_success, b.overall_success);
        assert_eq!(a.exit_code, b.exit_code);
        assert_eq!(a.results.len(), b.results.len());
    }

    #[test]
    fn test_validate_only_summary() {
        use crate::validate::{CheckStatus, ValidationCheck, ValidationReport};

        let failing = ValidationReport::new(vec![ValidationCheck {
            name: "required_secrets".to_string(),
            status: CheckStatus::Fail,
            detail: "missing: JWT_SECRET".to_string(),
        }]);
        let summary = RunSummary::from_validation("run-1", failing);
        assert!(!summary.overall_success);
        assert_eq!(summary.exit_code, 1);
        assert!(summary.results.is_empty());

        let passing = ValidationReport::new(vec![]);
        let summary = RunSummary::from_validation("run-1", passing);
        assert_eq!(summary.exit_code, 0);
    }

    #[test]
    fn test_render_text_names_failed_services() {
        let mut recorder = RunRecorder::new("run-1", 1);
        let mut health = BTreeMap::new();
        health.insert(
            "api".to_string(),
            ServiceHealth {
                service: "api".to_string(),
                status: HealthStatus::Down,
                last_checked_at: Utc::now(),
            },
        );
        recorder.record(PhaseResult {
            phase: "backend".to_string(),
            success: false,
            duration_ms: 180_000,
            services_attempted: vec!["api".to_string()],
            health,
            failure: Some(FailureCause::ServicesDown {
                services: vec!["api".to_string()],
            }),
        });

        let text = recorder.summarize(None).render_text();
        assert!(text.contains("backend"));
        assert!(text.contains("FAILED"));
        assert!(text.contains("api: Down"));
    }

    #[test]
    fn test_write_json_artifact() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("summary.json");

        let recorder = RunRecorder::new("run-1", 0);
        let summary = recorder.summarize(None);
        summary.write_json(&path).expect("write");

        let raw = std::fs::read_to_string(&path).expect("read");
        let parsed: RunSummary = serde_json::from_str(&raw).expect("parse");
        assert_eq!(parsed.run_id, "run-1");
        assert!(parsed.overall_success);
    }
}
