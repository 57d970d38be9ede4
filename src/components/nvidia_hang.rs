//! Nvidia GPU indicator component (spec.md §4.9 supplement): a mock
//! `nvidia-smi`/DCGM-shaped Collector producing per-device indicator
//! readings, feeding both the declarative `check_items` rules (via
//! [`IndicatorChecker`]) and the stateful [`HangDetector`] (spec.md §4.4).
//!
//! No real NVML/DCGM binding ships here — spec.md's Non-goals exclude the
//! vendor driver surface — but the shape (one `Collector` producing
//! `DeviceIndicatorValues`, multiple `Checker`s consuming it) is the real
//! one a production `nvidia` component would use.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::domain::error::{CheckerError, CollectError};
use crate::domain::models::config::{CompareMode, ComponentSpecConfig, ComponentUserConfig, IndicatorRule};
use crate::domain::models::{CheckerResult, Info, Level};
use crate::hangdetector::{DeviceIndicatorValues, HangDetector};
use crate::runtime::checker::Checker;
use crate::runtime::collector::Collector;
use crate::runtime::component::Component;
use crate::runtime::frequency_controller::FrequencyController;

/// Deterministic mock collector: one fixed set of device UUIDs, each with a
/// starting indicator reading that a test or operator can perturb through
/// `set_reading` to simulate a stuck GPU without real hardware.
pub struct MockNvidiaCollector {
    readings: Mutex<HashMap<String, HashMap<String, i64>>>,
}

impl MockNvidiaCollector {
    pub fn new(devices: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut readings = HashMap::new();
        for device in devices {
            let mut values = HashMap::new();
            values.insert("sm".to_string(), 10);
            values.insert("pwr".to_string(), 200);
            values.insert("rxpci".to_string(), 0);
            values.insert("txpci".to_string(), 0);
            readings.insert(device.into(), values);
        }
        Self {
            readings: Mutex::new(readings),
        }
    }

    /// Overwrites one device's indicator reading, simulating a driver poll
    /// result for tests or a `mock: true` operator dry run.
    pub fn set_reading(&self, device: &str, indicator: &str, value: i64) {
        self.readings
            .lock()
            .entry(device.to_string())
            .or_default()
            .insert(indicator.to_string(), value);
    }
}

#[async_trait]
impl Collector for MockNvidiaCollector {
    async fn collect(&self) -> Result<Info, CollectError> {
        let devices = self.readings.lock().clone();
        Ok(Info::now(DeviceIndicatorValues { time: Utc::now(), devices }))
    }
}

/// Checks every device's latest reading against one named indicator rule
/// (e.g. `check_items["sm"]`), independent of the stateful hang logic.
pub struct IndicatorChecker {
    name: String,
    indicator: String,
    rule: IndicatorRule,
    level: Level,
}

impl IndicatorChecker {
    pub fn new(name: impl Into<String>, indicator: impl Into<String>, rule: IndicatorRule, level: Level) -> Self {
        Self {
            name: name.into(),
            indicator: indicator.into(),
            rule,
            level,
        }
    }

    fn is_bad(&self, value: i64) -> bool {
        match self.rule.compare {
            CompareMode::High => value >= self.rule.threshold,
            CompareMode::Low => value <= self.rule.threshold,
        }
    }
}

impl Checker for IndicatorChecker {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, info: &Info) -> Result<CheckerResult, CheckerError> {
        let snapshot = info
            .downcast_ref::<DeviceIndicatorValues>()
            .ok_or_else(|| CheckerError::new(self.name(), "unexpected Info type for IndicatorChecker"))?;

        let mut bad_devices = Vec::new();
        for (device, values) in &snapshot.devices {
            if let Some(&value) = values.get(&self.indicator) {
                if self.is_bad(value) {
                    bad_devices.push(device.clone());
                }
            }
        }
        bad_devices.sort();

        if bad_devices.is_empty() {
            Ok(CheckerResult::normal(self.name(), format!("{} within bounds on all devices", self.indicator))
                .with_spec(self.rule.threshold.to_string()))
        } else {
            Ok(
                CheckerResult::abnormal(self.name(), format!("{} out of bounds", self.indicator), self.level)
                    .with_device(bad_devices.join(","))
                    .with_spec(self.rule.threshold.to_string()),
            )
        }
    }
}

/// Default dwell-time and boost parameters used when `spec.yaml` omits
/// `duration_threshold` / an explicit confirm count (spec.md §4.4).
const DEFAULT_DURATION_THRESHOLD: Duration = Duration::from_secs(150);
const DEFAULT_CONFIRM_K: u32 = 3;
const DEFAULT_BOOSTED_INTERVAL: Duration = Duration::from_secs(1);

/// Assembles the `nvidia` Component: a mock indicator collector, one
/// `IndicatorChecker` per `check_items` entry, and a `HangDetector` sharing
/// the same `Info` snapshot. The `HangDetector`'s own adaptive interval
/// lives in the shared `frequency` registry under the name `"HangDetector"`
/// (spec.md §9, also see [`crate::hangdetector::detector`]).
///
/// Returns the `HangDetector` handle alongside the `Component` so the
/// caller (the daemon) can register it for periodic `PodResourceMapper`
/// polling — `HangDetector::check` is synchronous and cannot refresh its
/// own pod map (spec.md §4.4 point 4).
pub fn build_nvidia_component(
    node: impl Into<String>,
    device_uuids: &[String],
    user_config: ComponentUserConfig,
    spec_config: &ComponentSpecConfig,
    frequency: FrequencyController,
) -> (Arc<Component>, Arc<HangDetector>) {
    let collector: Arc<dyn Collector> = Arc::new(MockNvidiaCollector::new(device_uuids.to_vec()));

    let level = spec_config.level.unwrap_or(Level::Warning);
    let mut checkers: Vec<Arc<dyn Checker>> = spec_config
        .check_items
        .iter()
        .map(|(indicator, rule)| -> Arc<dyn Checker> {
            Arc::new(IndicatorChecker::new(format!("Nvidia{indicator}"), indicator.clone(), rule.clone(), level))
        })
        .collect();

    let duration_threshold = spec_config
        .duration_threshold
        .map(Duration::from)
        .unwrap_or(DEFAULT_DURATION_THRESHOLD);
    let confirm_k = spec_config.abnormal_detected_times.unwrap_or(DEFAULT_CONFIRM_K);
    let fallback_interval = user_config.query_interval.0;

    let hang_detector = Arc::new(HangDetector::new(
        "nvidia",
        frequency.clone(),
        spec_config.check_items.clone(),
        duration_threshold,
        level,
        confirm_k,
        DEFAULT_BOOSTED_INTERVAL,
        fallback_interval,
        user_config.ignore_namespaces.clone(),
    ));
    checkers.push(Arc::clone(&hang_detector) as Arc<dyn Checker>);

    let component = Component::new("nvidia", node, collector, checkers, user_config, frequency);
    (component, hang_detector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Status;

    #[tokio::test]
    async fn mock_collector_reports_configured_devices() {
        let collector = MockNvidiaCollector::new(["gpu-0", "gpu-1"]);
        let info = collector.collect().await.unwrap();
        let snapshot = info.downcast_ref::<DeviceIndicatorValues>().unwrap();
        assert_eq!(snapshot.devices.len(), 2);
    }

    #[tokio::test]
    async fn indicator_checker_flags_device_above_threshold() {
        let collector = MockNvidiaCollector::new(["gpu-0"]);
        collector.set_reading("gpu-0", "sm", 99);
        let info = collector.collect().await.unwrap();

        let checker = IndicatorChecker::new("NvidiaSm", "sm", IndicatorRule { threshold: 95, compare: CompareMode::High }, Level::Warning);
        let result = checker.check(&info).unwrap();
        assert_eq!(result.status, Status::Abnormal);
        assert_eq!(result.device, "gpu-0");
    }

    #[tokio::test]
    async fn indicator_checker_is_normal_when_all_devices_in_bounds() {
        let collector = MockNvidiaCollector::new(["gpu-0", "gpu-1"]);
        let info = collector.collect().await.unwrap();

        let checker = IndicatorChecker::new("NvidiaSm", "sm", IndicatorRule { threshold: 95, compare: CompareMode::High }, Level::Warning);
        let result = checker.check(&info).unwrap();
        assert_eq!(result.status, Status::Normal);
    }
}
