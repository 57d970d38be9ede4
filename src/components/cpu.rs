//! CPU utilization component (spec.md §4.9 supplement): a representative
//! indicator-style Component built on `sysinfo`, using a
//! periodic-refresh-plus-cached-status shape reshaped into the generic
//! Collector/Checker contract instead of a bespoke monitor struct.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sysinfo::{CpuRefreshKind, RefreshKind, System};

use crate::domain::error::{CheckerError, CollectError};
use crate::domain::models::config::{CompareMode, ComponentSpecConfig, ComponentUserConfig, IndicatorRule};
use crate::domain::models::{CheckerResult, Info, Level};
use crate::runtime::checker::Checker;
use crate::runtime::collector::Collector;
use crate::runtime::component::Component;
use crate::runtime::frequency_controller::FrequencyController;

/// `Info` payload for CPU checks: the host's instantaneous global usage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub time: DateTime<Utc>,
    pub usage_percent: f32,
}

/// Real collector, refreshing a shared `sysinfo::System` on each cycle.
/// Behind a `parking_lot::Mutex` because `System::refresh_cpu_usage` needs
/// `&mut self`, while `Collector::collect` takes `&self` (spec.md §4's
/// Collector contract is a one-shot snapshot call, not an owned loop).
pub struct CpuCollector {
    system: Mutex<System>,
}

impl CpuCollector {
    pub fn new() -> Self {
        let refresh = RefreshKind::new().with_cpu(CpuRefreshKind::everything());
        Self {
            system: Mutex::new(System::new_with_specifics(refresh)),
        }
    }
}

impl Default for CpuCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collector for CpuCollector {
    async fn collect(&self) -> Result<Info, CollectError> {
        let mut system = self.system.lock();
        system.refresh_cpu_all();
        let usage_percent = system.global_cpu_usage();
        Ok(Info::now(CpuSnapshot { time: Utc::now(), usage_percent }))
    }
}

/// Mock twin selected by `ComponentUserConfig::mock`, returning a
/// config-fixed usage value rather than touching the host (spec.md §9
/// "Mock collectors").
pub struct MockCpuCollector {
    pub usage_percent: f32,
}

#[async_trait]
impl Collector for MockCpuCollector {
    async fn collect(&self) -> Result<Info, CollectError> {
        Ok(Info::now(CpuSnapshot { time: Utc::now(), usage_percent: self.usage_percent }))
    }
}

/// Checks global CPU usage against a single `check_items` indicator rule
/// (spec.md §6's indicator-style `check_items` + implicit single-device
/// reading — CPU has no per-device dimension the way GPUs do).
pub struct CpuUsageChecker {
    rule: IndicatorRule,
    level: Level,
}

impl CpuUsageChecker {
    pub fn new(rule: IndicatorRule, level: Level) -> Self {
        Self { rule, level }
    }
}

impl Checker for CpuUsageChecker {
    fn name(&self) -> &str {
        "CpuUsage"
    }

    fn check(&self, info: &Info) -> Result<CheckerResult, CheckerError> {
        let snapshot = info
            .downcast_ref::<CpuSnapshot>()
            .ok_or_else(|| CheckerError::new(self.name(), "unexpected Info type for CpuUsageChecker"))?;

        let value = snapshot.usage_percent.round() as i64;
        let bad = match self.rule.compare {
            CompareMode::High => value >= self.rule.threshold,
            CompareMode::Low => value <= self.rule.threshold,
        };

        if bad {
            Ok(CheckerResult::abnormal(self.name(), "CPU usage outside configured bound", self.level)
                .with_spec(self.rule.threshold.to_string())
                .with_curr(value.to_string()))
        } else {
            Ok(CheckerResult::normal(self.name(), "CPU usage within bounds")
                .with_spec(self.rule.threshold.to_string())
                .with_curr(value.to_string()))
        }
    }
}

/// Assembles the `cpu` Component: real or mock collector selected by
/// `user_config.mock`, one `CpuUsageChecker` built from the spec config's
/// `check_items["usage"]` (default: abnormal at 90% if unconfigured).
pub fn build_cpu_component(
    node: impl Into<String>,
    user_config: ComponentUserConfig,
    spec_config: &ComponentSpecConfig,
    frequency: FrequencyController,
) -> Arc<Component> {
    let collector: Arc<dyn Collector> = if user_config.mock {
        Arc::new(MockCpuCollector { usage_percent: 10.0 })
    } else {
        Arc::new(CpuCollector::new())
    };

    let rule = spec_config
        .check_items
        .get("usage")
        .cloned()
        .unwrap_or(IndicatorRule { threshold: 90, compare: CompareMode::High });
    let level = spec_config.level.unwrap_or(Level::Warning);

    Component::new(
        "cpu",
        node,
        collector,
        vec![Arc::new(CpuUsageChecker::new(rule, level))],
        user_config,
        frequency,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Status;

    #[tokio::test]
    async fn high_usage_beyond_threshold_is_abnormal() {
        let checker = CpuUsageChecker::new(IndicatorRule { threshold: 90, compare: CompareMode::High }, Level::Warning);
        let info = Info::now(CpuSnapshot { time: Utc::now(), usage_percent: 95.0 });
        let result = checker.check(&info).unwrap();
        assert_eq!(result.status, Status::Abnormal);
    }

    #[tokio::test]
    async fn usage_below_threshold_is_normal() {
        let checker = CpuUsageChecker::new(IndicatorRule { threshold: 90, compare: CompareMode::High }, Level::Warning);
        let info = Info::now(CpuSnapshot { time: Utc::now(), usage_percent: 12.0 });
        let result = checker.check(&info).unwrap();
        assert_eq!(result.status, Status::Normal);
    }

    #[tokio::test]
    async fn mock_collector_returns_fixed_usage() {
        let collector = MockCpuCollector { usage_percent: 42.0 };
        let info = collector.collect().await.unwrap();
        assert_eq!(info.downcast_ref::<CpuSnapshot>().unwrap().usage_percent, 42.0);
    }
}
