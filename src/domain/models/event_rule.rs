use regex::Regex;
use serde::{Deserialize, Serialize};

use super::status::Level;

/// A single declarative event pattern, as loaded from the spec config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRuleConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub regexp: String,
    pub level: Level,
    #[serde(default)]
    pub suggestion: String,
    /// Comma-joined file list, present only in file-scan mode.
    #[serde(default)]
    pub log_file: Option<String>,
}

impl EventRuleConfig {
    pub fn log_files(&self) -> Vec<String> {
        self.log_file
            .as_deref()
            .map(|s| s.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// The compiled form of an `EventRuleConfig`: name, precompiled matcher, and
/// the original config for suggestion/level lookups. Compiled once at
/// `EventFilter` construction and never recompiled per line (spec.md §4.2,
/// §9 "Regex pre-compilation").
#[derive(Debug, Clone)]
pub struct RuntimeEventRule {
    pub name: String,
    pub matcher: Regex,
    pub config: EventRuleConfig,
}

impl RuntimeEventRule {
    /// Compiles `config.regexp`. Returns `None` (rather than an error) on an
    /// invalid pattern — per spec.md, invalid regexes are logged and omitted,
    /// never fatal to filter construction.
    pub fn compile(config: EventRuleConfig) -> Option<Self> {
        match Regex::new(&config.regexp) {
            Ok(matcher) => Some(Self {
                name: config.name.clone(),
                matcher,
                config,
            }),
            Err(err) => {
                tracing::warn!(rule = %config.name, regexp = %config.regexp, error = %err, "skipping event rule: invalid regexp");
                None
            }
        }
    }

    pub fn is_match(&self, line: &str) -> bool {
        self.matcher.is_match(line)
    }
}
