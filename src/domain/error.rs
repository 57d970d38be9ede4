//! Error taxonomy for the node health-check runtime.
//!
//! Each enum represents one of spec.md §7's error kinds. Most are surfaced
//! to the user as `CheckerResult`s rather than propagated as hard failures —
//! see the `Policy` column in §7's table and the doc comment on each variant
//! below for where that conversion happens.

use thiserror::Error;

/// Spec/user config YAML parse or validation failure. Fatal at startup for
/// the affected component only; other components continue (spec.md §7).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid query_interval for component {component}: {reason}")]
    InvalidQueryInterval { component: String, reason: String },

    #[error("invalid cache_size for component {component}: must be > 0")]
    InvalidCacheSize { component: String },

    #[error("component {0} has no declarative spec entry")]
    MissingSpec(String),

    #[error("invalid event rule {rule} in component {component}: {reason}")]
    InvalidEventRule {
        component: String,
        rule: String,
        reason: String,
    },
}

/// A Collector could not produce an `Info` snapshot (I/O, subprocess,
/// device missing). The cycle is aborted and the previous cache entry is
/// retained; the monitor loop continues (spec.md §7).
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("I/O error collecting {domain}: {source}")]
    Io {
        domain: String,
        #[source]
        source: std::io::Error,
    },

    #[error("subprocess {command} failed: {reason}")]
    Subprocess { command: String, reason: String },

    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("collector panicked: {0}")]
    Panicked(String),
}

/// A single Checker failed. Per spec.md §7 this is never propagated as a
/// hard error outside a component's cycle — it is converted to an abnormal
/// `CheckerResult` with `error_name=<checker>Error` via
/// `CheckerResult::checker_error` and the cycle completes normally. This
/// type exists for the internal `Checker::check` signature.
#[derive(Debug, Error)]
#[error("checker {checker} failed: {reason}")]
pub struct CheckerError {
    pub checker: String,
    pub reason: String,
}

impl CheckerError {
    pub fn new(checker: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self {
            checker: checker.into(),
            reason: reason.to_string(),
        }
    }
}

/// A cycle exceeded its deadline. Converted to a synthetic
/// `HealthCheckTimeout` `CheckerResult` (spec.md §7); the notifier then uses
/// `append` mode for it rather than `set`.
#[derive(Debug, Error)]
#[error("cycle for {component} exceeded its {deadline:?} deadline")]
pub struct TimeoutError {
    pub component: String,
    pub deadline: std::time::Duration,
}

/// The orchestrator or device-to-pod mapper was unavailable. Best-effort:
/// logged, the calling cycle's result is still cached (spec.md §7).
#[derive(Debug, Error)]
pub enum ExternalError {
    #[error("orchestrator unavailable: {0}")]
    OrchestratorUnavailable(String),

    #[error("pod resource mapper unavailable: {0}")]
    PodMapperUnavailable(String),

    #[error("compare-update of node object failed: {0}")]
    UpdateConflict(String),
}

/// Top-level error a `Component::health_check` cycle can fail with. Per
/// spec.md §4.1: `CollectError` when the collector errors; `CheckerError`
/// only when *all* checkers error (partial checker failures are instead
/// folded into the result as abnormal `CheckerResult`s).
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Collect(#[from] CollectError),

    #[error("all checkers failed for component")]
    AllCheckersFailed,

    #[error(transparent)]
    Timeout(#[from] TimeoutError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_error_wraps_collect_error() {
        let err: CycleError = CollectError::DeviceUnavailable("gpu0".into()).into();
        assert!(matches!(err, CycleError::Collect(CollectError::DeviceUnavailable(_))));
    }
}
