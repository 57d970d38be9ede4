use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::checker_result::CheckerResult;
use super::status::{max_level, Level, Status};

/// One component's cycle output: a component name, a node, a timestamp, and
/// the ordered checker findings that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleResult {
    pub item: String,
    pub node: String,
    pub time: DateTime<Utc>,
    pub status: Status,
    pub level: Level,
    pub checkers: Vec<CheckerResult>,
    /// Opaque snapshot of the `Info` that produced this result, when the
    /// component chooses to carry it (§3: "optional opaque JSON").
    #[serde(default)]
    pub raw_data: Option<serde_json::Value>,
}

impl CycleResult {
    /// Aggregates `checkers` into a `CycleResult`: `status` is abnormal iff any
    /// child is abnormal, `level` is the max level among abnormal children.
    ///
    /// This is the single place the spec.md §8 universal invariant
    /// `result.status = normal ⇔ ∀c, c.status = normal` is enforced — every
    /// Component builds its result through this constructor rather than
    /// setting `status`/`level` by hand.
    pub fn aggregate(item: impl Into<String>, node: impl Into<String>, checkers: Vec<CheckerResult>) -> Self {
        let any_abnormal = checkers.iter().any(|c| c.status.is_abnormal());
        let level = max_level(
            checkers
                .iter()
                .filter(|c| c.status.is_abnormal())
                .map(|c| c.level),
        );
        Self {
            item: item.into(),
            node: node.into(),
            time: Utc::now(),
            status: if any_abnormal { Status::Abnormal } else { Status::Normal },
            level,
            checkers,
            raw_data: None,
        }
    }

    #[must_use]
    pub fn with_raw_data(mut self, raw: serde_json::Value) -> Self {
        self.raw_data = Some(raw);
        self
    }

    pub fn abnormal_checkers(&self) -> impl Iterator<Item = &CheckerResult> {
        self.checkers.iter().filter(|c| c.status.is_abnormal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::status::Level;

    #[test]
    fn all_normal_children_yield_normal_result() {
        let checkers = vec![
            CheckerResult::normal("a", "ok"),
            CheckerResult::normal("b", "ok"),
        ];
        let r = CycleResult::aggregate("cpu", "node-1", checkers);
        assert_eq!(r.status, Status::Normal);
        assert_eq!(r.level, Level::Info);
    }

    #[test]
    fn any_abnormal_child_yields_abnormal_result_with_max_level() {
        let checkers = vec![
            CheckerResult::normal("a", "ok"),
            CheckerResult::abnormal("b", "bad", Level::Warning),
            CheckerResult::abnormal("c", "worse", Level::Critical),
        ];
        let r = CycleResult::aggregate("cpu", "node-1", checkers);
        assert_eq!(r.status, Status::Abnormal);
        assert_eq!(r.level, Level::Critical);
    }
}
