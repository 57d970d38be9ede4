//! Stubbed metrics exporter (spec.md §1, §2: "Translates results into a
//! label-indexed gauge registry"; internals are a replaceable concern — no
//! real Prometheus HTTP endpoint is implemented here, only the registry a
//! real exporter would read from).

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::domain::models::{CycleResult, Level, Status};

/// One gauge reading, labeled the way a Prometheus exporter would label it:
/// by component and checker name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaugeValue {
    pub status: f64,
    pub level: f64,
}

fn status_value(status: Status) -> f64 {
    if status == Status::Abnormal {
        1.0
    } else {
        0.0
    }
}

fn level_value(level: Level) -> f64 {
    match level {
        Level::Info => 0.0,
        Level::Warning => 1.0,
        Level::Critical => 2.0,
        Level::Fatal => 3.0,
    }
}

/// A label-indexed gauge registry, updated once per component cycle. Keyed
/// by `(component, checker_name)` so a Prometheus-shaped exporter can expose
/// `nodewatch_checker_status{component="dmesg",checker="SysOOM"}` style
/// series without this crate depending on a metrics crate directly — that
/// wiring is the replaceable concern named in spec.md §1.
#[derive(Default)]
pub struct MetricsRegistry {
    gauges: RwLock<HashMap<(String, String), GaugeValue>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one component's cycle result: one gauge pair per checker,
    /// plus a synthetic `_component` entry for the aggregate status/level.
    pub fn record(&self, result: &CycleResult) {
        let mut gauges = self.gauges.write();
        gauges.insert(
            (result.item.clone(), "_component".to_string()),
            GaugeValue {
                status: status_value(result.status),
                level: level_value(result.level),
            },
        );
        for checker in &result.checkers {
            gauges.insert(
                (result.item.clone(), checker.name.clone()),
                GaugeValue {
                    status: status_value(checker.status),
                    level: level_value(checker.level),
                },
            );
        }
    }

    pub fn snapshot(&self) -> HashMap<(String, String), GaugeValue> {
        self.gauges.read().clone()
    }

    pub fn get(&self, component: &str, checker: &str) -> Option<GaugeValue> {
        self.gauges.read().get(&(component.to_string(), checker.to_string())).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::CheckerResult;

    #[test]
    fn records_aggregate_and_per_checker_gauges() {
        let registry = MetricsRegistry::new();
        let result = CycleResult::aggregate(
            "dmesg",
            "node-1",
            vec![CheckerResult::abnormal("SysOOM", "oom", Level::Critical)],
        );
        registry.record(&result);

        let component_gauge = registry.get("dmesg", "_component").unwrap();
        assert_eq!(component_gauge.status, 1.0);
        assert_eq!(component_gauge.level, 2.0);

        let checker_gauge = registry.get("dmesg", "SysOOM").unwrap();
        assert_eq!(checker_gauge.status, 1.0);
    }

    #[test]
    fn normal_result_yields_zero_gauges() {
        let registry = MetricsRegistry::new();
        let result = CycleResult::aggregate("cpu", "node-1", vec![CheckerResult::normal("Load", "ok")]);
        registry.record(&result);
        assert_eq!(registry.get("cpu", "_component").unwrap().status, 0.0);
    }
}
