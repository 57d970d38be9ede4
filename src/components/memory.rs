//! Memory utilization component (spec.md §4.9 supplement), the `sysinfo`
//! sibling of [`crate::components::cpu`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sysinfo::{MemoryRefreshKind, RefreshKind, System};

use crate::domain::error::{CheckerError, CollectError};
use crate::domain::models::config::{CompareMode, ComponentSpecConfig, ComponentUserConfig, IndicatorRule};
use crate::domain::models::{CheckerResult, Info, Level};
use crate::runtime::checker::Checker;
use crate::runtime::collector::Collector;
use crate::runtime::component::Component;
use crate::runtime::frequency_controller::FrequencyController;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub time: DateTime<Utc>,
    pub used_mb: u64,
    pub total_mb: u64,
}

impl MemorySnapshot {
    pub fn usage_percent(&self) -> f64 {
        if self.total_mb == 0 {
            0.0
        } else {
            (self.used_mb as f64 / self.total_mb as f64) * 100.0
        }
    }
}

pub struct MemoryCollector {
    system: Mutex<System>,
}

impl MemoryCollector {
    pub fn new() -> Self {
        let refresh = RefreshKind::new().with_memory(MemoryRefreshKind::everything());
        Self {
            system: Mutex::new(System::new_with_specifics(refresh)),
        }
    }
}

impl Default for MemoryCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collector for MemoryCollector {
    async fn collect(&self) -> Result<Info, CollectError> {
        let mut system = self.system.lock();
        system.refresh_memory();
        let used_mb = system.used_memory() / 1024 / 1024;
        let total_mb = system.total_memory() / 1024 / 1024;
        Ok(Info::now(MemorySnapshot { time: Utc::now(), used_mb, total_mb }))
    }
}

/// Mock twin selected by `ComponentUserConfig::mock` (spec.md §9).
pub struct MockMemoryCollector {
    pub used_mb: u64,
    pub total_mb: u64,
}

#[async_trait]
impl Collector for MockMemoryCollector {
    async fn collect(&self) -> Result<Info, CollectError> {
        Ok(Info::now(MemorySnapshot { time: Utc::now(), used_mb: self.used_mb, total_mb: self.total_mb }))
    }
}

/// Checks memory usage percentage against a `check_items["usage"]` rule.
pub struct MemoryUsageChecker {
    rule: IndicatorRule,
    level: Level,
}

impl MemoryUsageChecker {
    pub fn new(rule: IndicatorRule, level: Level) -> Self {
        Self { rule, level }
    }
}

impl Checker for MemoryUsageChecker {
    fn name(&self) -> &str {
        "MemoryUsage"
    }

    fn check(&self, info: &Info) -> Result<CheckerResult, CheckerError> {
        let snapshot = info
            .downcast_ref::<MemorySnapshot>()
            .ok_or_else(|| CheckerError::new(self.name(), "unexpected Info type for MemoryUsageChecker"))?;

        let value = snapshot.usage_percent().round() as i64;
        let bad = match self.rule.compare {
            CompareMode::High => value >= self.rule.threshold,
            CompareMode::Low => value <= self.rule.threshold,
        };

        let curr = format!("{value}% ({}/{} MB)", snapshot.used_mb, snapshot.total_mb);
        if bad {
            Ok(CheckerResult::abnormal(self.name(), "memory usage outside configured bound", self.level)
                .with_spec(self.rule.threshold.to_string())
                .with_curr(curr))
        } else {
            Ok(CheckerResult::normal(self.name(), "memory usage within bounds")
                .with_spec(self.rule.threshold.to_string())
                .with_curr(curr))
        }
    }
}

/// Assembles the `memory` Component analogously to `build_cpu_component`.
pub fn build_memory_component(
    node: impl Into<String>,
    user_config: ComponentUserConfig,
    spec_config: &ComponentSpecConfig,
    frequency: FrequencyController,
) -> Arc<Component> {
    let collector: Arc<dyn Collector> = if user_config.mock {
        Arc::new(MockMemoryCollector { used_mb: 1024, total_mb: 65536 })
    } else {
        Arc::new(MemoryCollector::new())
    };

    let rule = spec_config
        .check_items
        .get("usage")
        .cloned()
        .unwrap_or(IndicatorRule { threshold: 90, compare: CompareMode::High });
    let level = spec_config.level.unwrap_or(Level::Warning);

    Component::new(
        "memory",
        node,
        collector,
        vec![Arc::new(MemoryUsageChecker::new(rule, level))],
        user_config,
        frequency,
    )
}
