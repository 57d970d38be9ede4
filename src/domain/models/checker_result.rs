use serde::{Deserialize, Serialize};

use super::status::{Level, Status};

/// One finding produced by a single `Checker` over one `Info` snapshot.
///
/// `name` must be stable across cycles of the same component so the
/// notifier can diff successive annotations by `error_name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerResult {
    pub name: String,
    pub description: String,
    /// Comma-joined resource identifier (e.g. GPU UUID), empty when not applicable.
    #[serde(default)]
    pub device: String,
    /// The threshold or expected value, as text.
    #[serde(default)]
    pub spec: String,
    /// The observed value or match count, as text.
    #[serde(default)]
    pub curr: String,
    pub status: Status,
    pub level: Level,
    #[serde(default)]
    pub error_name: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub suggestion: String,
}

impl CheckerResult {
    /// A normal finding. `level` is fixed at `Info` — spec.md's invariant
    /// `status=normal ⇒ level≤info` is enforced at construction rather than
    /// checked after the fact.
    pub fn normal(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            device: String::new(),
            spec: String::new(),
            curr: String::new(),
            status: Status::Normal,
            level: Level::Info,
            error_name: String::new(),
            detail: String::new(),
            suggestion: String::new(),
        }
    }

    /// An abnormal finding at the given level.
    pub fn abnormal(name: impl Into<String>, description: impl Into<String>, level: Level) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            device: String::new(),
            spec: String::new(),
            curr: String::new(),
            status: Status::Abnormal,
            level,
            error_name: String::new(),
            detail: String::new(),
            suggestion: String::new(),
        }
    }

    #[must_use]
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }

    #[must_use]
    pub fn with_spec(mut self, spec: impl Into<String>) -> Self {
        self.spec = spec.into();
        self
    }

    #[must_use]
    pub fn with_curr(mut self, curr: impl Into<String>) -> Self {
        self.curr = curr.into();
        self
    }

    #[must_use]
    pub fn with_error_name(mut self, error_name: impl Into<String>) -> Self {
        self.error_name = error_name.into();
        self
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = suggestion.into();
        self
    }

    /// A synthetic finding representing a single checker's failure, per spec.md §7:
    /// `CheckerError` is represented as an abnormal `CheckerResult` with
    /// `error_name=<checker>Error`, never surfaced as a hard crate error.
    pub fn checker_error(checker_name: &str, err: impl std::fmt::Display) -> Self {
        Self::abnormal(
            checker_name,
            format!("checker {checker_name} failed: {err}"),
            Level::Critical,
        )
        .with_error_name(format!("{checker_name}Error"))
    }

    /// A synthetic `HealthCheckTimeout` finding, per spec.md §7.
    pub fn timeout(component: &str, deadline: std::time::Duration) -> Self {
        Self::abnormal(
            "HealthCheckTimeout",
            format!("{component} cycle exceeded its {deadline:?} deadline"),
            Level::Critical,
        )
        .with_error_name("HealthCheckTimeout")
    }
}
