//! Domain-level error taxonomy for berth.

/// Berth domain errors.
///
/// Only `ValidationFailed` (pre-phase) and `HealthTimeout` (post-gate)
/// affect run continuation; `BringUpFailed` and `TeardownFailed` are
/// recorded but never short-circuit a run on their own.
#[derive(Debug, thiserror::Error)]
pub enum BerthError {
    #[error("validation failed: {failed} critical check(s) did not pass")]
    ValidationFailed { failed: usize },

    #[error("build failed for phase '{phase}': {detail}")]
    BuildFailed { phase: String, detail: String },

    #[error("bring-up failed for phase '{phase}': {detail}")]
    BringUpFailed { phase: String, detail: String },

    #[error("health gate timed out in phase '{phase}': services never became ready: {services:?}")]
    HealthTimeout { phase: String, services: Vec<String> },

    #[error("teardown failed for phase '{phase}': {detail}")]
    TeardownFailed { phase: String, detail: String },

    #[error("compose invocation failed: {0}")]
    Compose(String),

    #[error("secret generation failed: {0}")]
    SecretsFailed(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for berth domain operations.
pub type Result<T> = std::result::Result<T, BerthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BerthError::BuildFailed {
            phase: "backend".to_string(),
            detail: "image pull denied".to_string(),
        };
        assert!(err.to_string().contains("backend"));
        assert!(err.to_string().contains("image pull denied"));

        let err = BerthError::ValidationFailed { failed: 2 };
        assert!(err.to_string().contains("2 critical check(s)"));
    }

    #[test]
    fn test_health_timeout_lists_services() {
        let err = BerthError::HealthTimeout {
            phase: "infrastructure".to_string(),
            services: vec!["postgres".to_string(), "redis".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("postgres"));
        assert!(msg.contains("redis"));
    }
}
