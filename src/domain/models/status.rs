use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Binary outcome of a single check or an aggregated cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Normal,
    Abnormal,
}

impl Status {
    pub const fn is_abnormal(self) -> bool {
        matches!(self, Self::Abnormal)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Abnormal => write!(f, "abnormal"),
        }
    }
}

/// Severity, totally ordered `Info < Warning < Critical < Fatal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[default]
    Info,
    Warning,
    Critical,
    Fatal,
}

impl Level {
    /// Whether results at this level are forwarded on a component's result channel.
    pub const fn is_forwarded(self) -> bool {
        matches!(self, Self::Critical | Self::Fatal)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

/// Folds a sequence of levels down to their maximum, defaulting to `Info` when empty.
/// Mirrors spec.md's rule that `Result.level` is the max over abnormal children, never
/// the last-write-wins behavior one of the original source paths exhibited (§9, Open
/// Question: resolved in favor of max — see DESIGN.md).
pub fn max_level(levels: impl IntoIterator<Item = Level>) -> Level {
    levels.into_iter().max().unwrap_or_default()
}

#[allow(clippy::derivable_impls)]
impl PartialOrd for Status {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Status {
    fn cmp(&self, other: &Self) -> Ordering {
        use Status::{Abnormal, Normal};
        match (self, other) {
            (Normal, Normal) | (Abnormal, Abnormal) => Ordering::Equal,
            (Normal, Abnormal) => Ordering::Less,
            (Abnormal, Normal) => Ordering::Greater,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_ordering() {
        assert!(Level::Info < Level::Warning);
        assert!(Level::Warning < Level::Critical);
        assert!(Level::Critical < Level::Fatal);
    }

    #[test]
    fn max_level_empty_is_info() {
        assert_eq!(max_level(std::iter::empty()), Level::Info);
    }

    #[test]
    fn max_level_picks_highest() {
        let levels = [Level::Info, Level::Critical, Level::Warning];
        assert_eq!(max_level(levels), Level::Critical);
    }

    #[test]
    fn only_critical_and_fatal_are_forwarded() {
        assert!(!Level::Info.is_forwarded());
        assert!(!Level::Warning.is_forwarded());
        assert!(Level::Critical.is_forwarded());
        assert!(Level::Fatal.is_forwarded());
    }
}
