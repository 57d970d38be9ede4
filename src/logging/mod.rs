//! Structured logging setup: a typed `LogConfig` plus a `tracing-subscriber`
//! registry built from it. File-rotation and secret-scrubbing layers are
//! dropped here — a node agent logs to stdout for the host's own log
//! collector to pick up — but the `EnvFilter` + `json`/`pretty` format
//! choice is kept.

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

/// Parses `level`, defaulting to `INFO` on an unrecognized value rather than
/// failing startup over a logging misconfiguration.
fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initializes the global `tracing` subscriber. Must be called at most once
/// per process, before any component starts — `tracing_subscriber::registry().init()`
/// panics on reentry, so a second call is a programmer error.
pub fn init(config: &LogConfig) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(parse_level(&config.level).into())
        .from_env_lossy();

    match config.format {
        LogFormat::Json => {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_target(true)
                .with_file(true)
                .with_line_number(true);
            tracing_subscriber::registry().with(env_filter).with(layer).init();
        }
        LogFormat::Pretty => {
            let layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::CLOSE);
            tracing_subscriber::registry().with(env_filter).with(layer).init();
        }
    }

    tracing::info!(level = %config.level, format = ?config.format, "logging initialized");
}
