use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::error::CheckerError;
use crate::domain::models::config::{CompareMode, IndicatorRule};
use crate::domain::models::{CheckerResult, Info, Level};
use crate::notifier::pod_mapper::{PodRef, PodResourceMapper};
use crate::runtime::checker::Checker;
use crate::runtime::frequency_controller::FrequencyController;

/// Indicators whose raw value is a cumulative counter rather than an
/// instantaneous reading; the detector tracks the delta since the previous
/// sample instead of the raw value (spec.md §4.4 point 1).
const DELTA_INDICATORS: [&str; 2] = ["rxpci", "txpci"];

/// The `Info` payload a Collector feeding `HangDetector` must produce: one
/// observation per `(device uuid, indicator name)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceIndicatorValues {
    pub time: DateTime<Utc>,
    pub devices: HashMap<String, HashMap<String, i64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Normal,
    Boost,
}

#[derive(Debug, Clone)]
struct IndicatorState {
    active: bool,
    value: i64,
    duration: Duration,
    last_update: DateTime<Utc>,
}

struct DetectorState {
    indicators: HashMap<(String, String), IndicatorState>,
    phase: Phase,
    confirm_count: u32,
    saved_self_interval: Option<Duration>,
    saved_nvidia_interval: Option<Duration>,
}

impl Default for DetectorState {
    fn default() -> Self {
        Self {
            indicators: HashMap::new(),
            phase: Phase::Normal,
            confirm_count: 0,
            saved_self_interval: None,
            saved_nvidia_interval: None,
        }
    }
}

/// Specialized stateful `Checker` tracking sustained "stuck" GPU behavior via
/// per-device per-indicator dwell time, with sampling-rate boost during
/// suspicion (spec.md §4.4).
///
/// Holds its state behind `&self` interior mutability (a `parking_lot::Mutex`
/// over `DetectorState`) rather than `&mut self`, since a `Component` runs
/// its checkers without exclusive access to any one of them (spec.md §9).
pub struct HangDetector {
    name: String,
    nvidia_component_name: String,
    frequency: FrequencyController,
    indicators: HashMap<String, IndicatorRule>,
    duration_threshold: Duration,
    level: Level,
    confirm_k: u32,
    boosted_interval: Duration,
    fallback_interval: Duration,
    ignore_namespaces: Vec<String>,
    pod_map: RwLock<HashMap<String, PodRef>>,
    state: Mutex<DetectorState>,
}

impl HangDetector {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        nvidia_component_name: impl Into<String>,
        frequency: FrequencyController,
        indicators: HashMap<String, IndicatorRule>,
        duration_threshold: Duration,
        level: Level,
        confirm_k: u32,
        boosted_interval: Duration,
        fallback_interval: Duration,
        ignore_namespaces: Vec<String>,
    ) -> Self {
        Self {
            name: "HangDetector".to_string(),
            nvidia_component_name: nvidia_component_name.into(),
            frequency,
            indicators,
            duration_threshold,
            level,
            confirm_k: confirm_k.max(1),
            boosted_interval,
            fallback_interval,
            ignore_namespaces,
            pod_map: RwLock::new(HashMap::new()),
            state: Mutex::new(DetectorState::default()),
        }
    }

    /// Refreshes the device→pod cache used to enrich abnormal results.
    /// `check` is synchronous (a pure function per spec.md's glossary), so it
    /// cannot call an async `PodResourceMapper` itself; a caller (typically
    /// `DaemonService`) polls this on its own schedule instead.
    pub async fn refresh_pod_map(&self, mapper: &dyn PodResourceMapper) {
        match mapper.get_device_to_pod_map().await {
            Ok(map) => *self.pod_map.write() = map,
            Err(err) => warn!(error = %err, "pod resource mapper unavailable, keeping previous mapping"),
        }
    }

    fn is_bad(info_value: i64, rule: &IndicatorRule) -> bool {
        match rule.compare {
            CompareMode::High => info_value >= rule.threshold,
            CompareMode::Low => info_value <= rule.threshold,
        }
    }

    fn update_indicator(
        state: &mut DetectorState,
        device: &str,
        indicator: &str,
        raw: i64,
        now: DateTime<Utc>,
        rule: &IndicatorRule,
        duration_threshold: Duration,
    ) -> bool {
        let key = (device.to_string(), indicator.to_string());
        let entry = state.indicators.entry(key).or_insert_with(|| IndicatorState {
            active: false,
            value: raw,
            duration: Duration::ZERO,
            last_update: now,
        });

        let info_value = if DELTA_INDICATORS.contains(&indicator) {
            (raw - entry.value).abs()
        } else {
            raw
        };

        if Self::is_bad(info_value, rule) {
            let elapsed = (now - entry.last_update).to_std().unwrap_or(Duration::ZERO);
            entry.duration += elapsed;
            entry.active = true;
        } else {
            entry.active = false;
            entry.duration = Duration::ZERO;
        }
        entry.value = raw;
        entry.last_update = now;

        entry.duration >= duration_threshold
    }

    fn build_abnormal(&self, suspects: &[String]) -> CheckerResult {
        let pod_map = self.pod_map.read();
        let mut devices = Vec::with_capacity(suspects.len());
        let mut all_ignored = !suspects.is_empty();

        for uuid in suspects {
            if let Some(pod) = pod_map.get(uuid) {
                devices.push(format!("{uuid}:{}/{}", pod.namespace, pod.pod_name));
                if !self.ignore_namespaces.iter().any(|ns| ns == &pod.namespace) {
                    all_ignored = false;
                }
            } else {
                devices.push(uuid.clone());
                all_ignored = false;
            }
        }

        let level = if all_ignored { Level::Info } else { self.level };

        CheckerResult::abnormal(&self.name, "sustained GPU hang detected", level)
            .with_device(devices.join(","))
            .with_spec(format!("{:?}", self.duration_threshold))
            .with_curr(format!("confirm_count>={}", self.confirm_k))
    }

    fn transition(&self, state: &mut DetectorState, suspects: &[String]) -> CheckerResult {
        match (state.phase, suspects.is_empty()) {
            (Phase::Normal, true) => CheckerResult::normal(&self.name, "no hang suspected"),
            (Phase::Normal, false) => {
                state.saved_self_interval = Some(self.frequency.get(&self.name, self.fallback_interval));
                state.saved_nvidia_interval =
                    Some(self.frequency.get(&self.nvidia_component_name, self.fallback_interval));
                self.frequency.set(&self.name, self.boosted_interval);
                self.frequency.set(&self.nvidia_component_name, self.boosted_interval);
                state.phase = Phase::Boost;
                state.confirm_count = 1;
                warn!(devices = ?suspects, "hang suspected, boosting sample rate");
                CheckerResult::normal(&self.name, "hang suspected, boosting sample rate")
            }
            (Phase::Boost, false) => {
                state.confirm_count += 1;
                if state.confirm_count >= self.confirm_k {
                    self.build_abnormal(suspects)
                } else {
                    CheckerResult::normal(&self.name, "hang suspected, awaiting confirmation")
                }
            }
            (Phase::Boost, true) => {
                if let Some(prev) = state.saved_self_interval.take() {
                    self.frequency.set(&self.name, prev);
                }
                if let Some(prev) = state.saved_nvidia_interval.take() {
                    self.frequency.set(&self.nvidia_component_name, prev);
                }
                state.confirm_count = 0;
                state.phase = Phase::Normal;
                info!("hang resolved, intervals restored");
                CheckerResult::normal(&self.name, "hang resolved")
            }
        }
    }
}

impl Checker for HangDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, info: &Info) -> Result<CheckerResult, CheckerError> {
        let snapshot = info
            .downcast_ref::<DeviceIndicatorValues>()
            .ok_or_else(|| CheckerError::new(self.name(), "unexpected Info type for HangDetector"))?;

        let mut state = self.state.lock();
        let mut suspects = Vec::new();

        for (device, values) in &snapshot.devices {
            let mut confirmed = 0usize;
            for (indicator, rule) in &self.indicators {
                let raw = values.get(indicator).copied().unwrap_or(0);
                if Self::update_indicator(&mut state, device, indicator, raw, snapshot.time, rule, self.duration_threshold) {
                    confirmed += 1;
                }
            }
            if confirmed == self.indicators.len() && !self.indicators.is_empty() {
                suspects.push(device.clone());
            }
        }
        suspects.sort();

        Ok(self.transition(&mut state, &suspects))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Status;

    fn indicators() -> HashMap<String, IndicatorRule> {
        let mut map = HashMap::new();
        map.insert("sm".to_string(), IndicatorRule { threshold: 95, compare: CompareMode::High });
        map.insert("pwr".to_string(), IndicatorRule { threshold: 150, compare: CompareMode::Low });
        map
    }

    fn detector(confirm_k: u32) -> HangDetector {
        HangDetector::new(
            "nvidia",
            FrequencyController::new(),
            indicators(),
            Duration::from_secs(150),
            Level::Warning,
            confirm_k,
            Duration::from_secs(1),
            Duration::from_secs(10),
            vec![],
        )
    }

    fn snapshot(time: DateTime<Utc>, sm: i64, pwr: i64) -> Info {
        let mut devices = HashMap::new();
        let mut values = HashMap::new();
        values.insert("sm".to_string(), sm);
        values.insert("pwr".to_string(), pwr);
        devices.insert("gpu-0".to_string(), values);
        Info::new(time, DeviceIndicatorValues { time, devices })
    }

    #[test]
    fn all_indicators_good_stays_normal() {
        let detector = detector(3);
        let t0 = Utc::now();
        for i in 0..3 {
            let t = t0 + chrono::Duration::seconds(i * 10);
            let result = detector.check(&snapshot(t, 10, 200)).unwrap();
            assert_eq!(result.status, Status::Normal);
        }
    }

    #[test]
    fn sustained_bad_values_confirm_abnormal_after_k_boost_cycles() {
        let detector = detector(3);
        let t0 = Utc::now();

        // 16 samples 10s apart of "bad" values accumulate to 150s+ dwell time.
        let mut last = None;
        for i in 0..16 {
            let t = t0 + chrono::Duration::seconds(i * 10);
            last = Some(detector.check(&snapshot(t, 100, 75)).unwrap());
        }
        assert_eq!(last.unwrap().status, Status::Normal); // just entered BOOST

        let fc = &detector.frequency;
        assert_eq!(fc.get("HangDetector", Duration::from_secs(999)), Duration::from_secs(1));
        assert_eq!(fc.get("nvidia", Duration::from_secs(999)), Duration::from_secs(1));

        // Two further 1s-spaced confirmation cycles with unchanged values.
        let t1 = t0 + chrono::Duration::seconds(160);
        detector.check(&snapshot(t1, 100, 75)).unwrap();
        let t2 = t0 + chrono::Duration::seconds(161);
        let confirmed = detector.check(&snapshot(t2, 100, 75)).unwrap();
        assert_eq!(confirmed.status, Status::Abnormal);
    }

    #[test]
    fn resolving_restores_saved_intervals() {
        let detector = detector(1);
        let t0 = Utc::now();
        for i in 0..16 {
            let t = t0 + chrono::Duration::seconds(i * 10);
            detector.check(&snapshot(t, 100, 75)).unwrap();
        }
        let t_good = t0 + chrono::Duration::seconds(170);
        let resolved = detector.check(&snapshot(t_good, 10, 200)).unwrap();
        assert_eq!(resolved.status, Status::Normal);
        assert_eq!(detector.frequency.get("HangDetector", Duration::from_secs(999)), Duration::from_secs(10));
        assert_eq!(detector.frequency.get("nvidia", Duration::from_secs(999)), Duration::from_secs(10));
    }
}
