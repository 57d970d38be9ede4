use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::event_rule::EventRuleConfig;
use super::status::Level;

/// Reserved top-level keys in the user config that are not component names,
/// per spec.md §4.6's component auto-detection rule.
pub const RESERVED_USER_CONFIG_KEYS: [&str; 1] = ["metrics"];

/// `query_interval`/`query_interval_after_abnormal` accept either a bare
/// number of seconds or a `<n>s|m|h` suffixed string (spec.md §6 shows both
/// `10s` and `30`). Wrapped in its own type so `serde(with = ...)` stays
/// localized to the one field that needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DurationSecs(pub Duration);

impl From<DurationSecs> for Duration {
    fn from(value: DurationSecs) -> Self {
        value.0
    }
}

impl<'de> Deserialize<'de> for DurationSecs {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Seconds(u64),
            Text(String),
        }
        let repr = Repr::deserialize(deserializer)?;
        let duration = match repr {
            Repr::Seconds(secs) => Duration::from_secs(secs),
            Repr::Text(text) => parse_duration_text(&text).map_err(serde::de::Error::custom)?,
        };
        Ok(Self(duration))
    }
}

/// Parses `"10s"`, `"500ms"`, `"5m"`, `"1h"`, or a bare `"30"` (seconds).
pub fn parse_duration_text(text: &str) -> Result<Duration, String> {
    let text = text.trim();
    if let Ok(secs) = text.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    let (number, unit) = text.split_at(
        text.find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("invalid duration: {text}"))?,
    );
    let number: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration: {text}"))?;
    match unit {
        "ms" => Ok(Duration::from_millis(number)),
        "s" => Ok(Duration::from_secs(number)),
        "m" => Ok(Duration::from_secs(number * 60)),
        "h" => Ok(Duration::from_secs(number * 3600)),
        other => Err(format!("unknown duration unit {other:?} in {text:?}")),
    }
}

fn default_query_interval() -> DurationSecs {
    DurationSecs(Duration::from_secs(10))
}

const fn default_cache_size() -> usize {
    5
}

const fn default_true() -> bool {
    true
}

/// Per-component operational knobs from the user config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ComponentUserConfig {
    #[serde(default = "default_query_interval")]
    pub query_interval: DurationSecs,
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
    #[serde(default = "default_true")]
    pub enable_metrics: bool,
    #[serde(default)]
    pub ignored_checkers: Vec<String>,
    /// Selects the component's Mock collector twin instead of the real one.
    #[serde(default)]
    pub mock: bool,
    /// Namespaces whose findings are demoted to `info` (hang detector pod
    /// resolution, spec.md §4.4 point 4).
    #[serde(default)]
    pub ignore_namespaces: Vec<String>,
}

impl Default for ComponentUserConfig {
    fn default() -> Self {
        Self {
            query_interval: default_query_interval(),
            cache_size: default_cache_size(),
            enable_metrics: true,
            ignored_checkers: Vec::new(),
            mock: false,
            ignore_namespaces: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

const fn default_metrics_port() -> u16 {
    9400
}

/// The user config file: per-component operational knobs plus the reserved
/// `metrics` block. Component names are whatever top-level keys appear,
/// which is exactly what `DaemonService` auto-detection reads (spec.md
/// §4.6).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(flatten)]
    pub components: HashMap<String, ComponentUserConfig>,
}

impl UserConfig {
    pub fn component(&self, name: &str) -> ComponentUserConfig {
        self.components.get(name).cloned().unwrap_or_default()
    }

    /// Every configured component name, i.e. the auto-detected set before
    /// enable/ignore-list adjustment (spec.md §4.6).
    pub fn discovered_components(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }
}

/// `compare` direction for an indicator-style check (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareMode {
    High,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorRule {
    pub threshold: i64,
    pub compare: CompareMode,
}

/// Per-device-model override, applied at load time when the node's primary
/// device id matches (spec.md §4.4, `indicators_by_model`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelOverride {
    pub device_id: String,
    #[serde(rename = "override")]
    pub override_items: HashMap<String, IndicatorRule>,
}

/// One component's declarative rule set, as loaded from the spec config
/// file: either event-style (`event_checkers`) or indicator-style
/// (`check_items` + `duration_threshold`), per spec.md §6. Both sets of
/// fields exist on one struct (rather than a tagged enum) because
/// `serde_yaml`'s untagged-enum support is unreliable across nested maps;
/// callers branch on `event_checkers.is_empty()`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ComponentSpecConfig {
    #[serde(default)]
    pub event_checkers: HashMap<String, EventRuleConfig>,

    #[serde(default)]
    pub check_items: HashMap<String, IndicatorRule>,
    pub duration_threshold: Option<DurationSecs>,
    #[serde(default)]
    pub check_items_by_model: Vec<ModelOverride>,
    pub level: Option<Level>,
    pub abnormal_detected_times: Option<u32>,
    pub query_interval_after_abnormal: Option<DurationSecs>,
}

impl ComponentSpecConfig {
    pub fn is_indicator_style(&self) -> bool {
        !self.check_items.is_empty()
    }

    /// Applies `check_items_by_model[*].override` for the matching device id,
    /// per spec.md §6: "the loader applies `check_items_by_model[*].override`
    /// when the node's primary device-id matches."
    pub fn resolved_check_items(&self, device_id: &str) -> HashMap<String, IndicatorRule> {
        let mut items = self.check_items.clone();
        for model in &self.check_items_by_model {
            if model.device_id == device_id {
                for (name, rule) in &model.override_items {
                    items.insert(name.clone(), rule.clone());
                }
            }
        }
        items
    }
}

/// The full declarative spec config: `component -> rule set`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SpecConfig {
    #[serde(flatten)]
    pub components: HashMap<String, ComponentSpecConfig>,
}

impl SpecConfig {
    pub fn component(&self, name: &str) -> ComponentSpecConfig {
        self.components.get(name).cloned().unwrap_or_default()
    }
}
