//! Kernel-log event component (spec.md §4.8): tails `/dev/kmsg` through a
//! [`KmsgReader`], matches decoded lines against a compiled rule set via an
//! [`EventFilter`], and wires the pair into an event-driven `Component`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::AsyncRead;

use crate::domain::error::CollectError;
use crate::domain::models::config::ComponentUserConfig;
use crate::domain::models::{EventRuleConfig, Level};
use crate::eventfilter::{EventFilter, KmsgReader};
use crate::runtime::component::Component;
use crate::runtime::frequency_controller::FrequencyController;

/// The five default rules shipped with the agent (spec.md §4.8), used
/// whenever `spec.yaml`'s `dmesg.event_checkers` is empty. Operators
/// extend or override these by name in their own spec config.
pub fn default_rules() -> HashMap<String, EventRuleConfig> {
    let mut rules = HashMap::new();
    rules.insert(
        "SysOOM".to_string(),
        EventRuleConfig {
            name: "SysOOM".to_string(),
            description: "kernel invoked the OOM killer".to_string(),
            regexp: r"Out of memory: Kill(ed)? process".to_string(),
            level: Level::Critical,
            suggestion: "reduce workload memory footprint or raise node memory limits".to_string(),
            log_file: None,
        },
    );
    rules.insert(
        "CgroupOOM".to_string(),
        EventRuleConfig {
            name: "CgroupOOM".to_string(),
            description: "a cgroup memory limit triggered the OOM killer".to_string(),
            regexp: r"memory cgroup out of memory".to_string(),
            level: Level::Warning,
            suggestion: "raise the pod's memory limit or reduce its working set".to_string(),
            log_file: None,
        },
    );
    rules.insert(
        "NVSXID".to_string(),
        EventRuleConfig {
            name: "NVSXID".to_string(),
            description: "NVIDIA Xid error reported by the kernel driver".to_string(),
            regexp: r"NVRM: Xid.*: \d+".to_string(),
            level: Level::Critical,
            suggestion: "check nvidia-smi for the affected GPU; may require a node drain".to_string(),
            log_file: None,
        },
    );
    rules.insert(
        "NCCLSegFault".to_string(),
        EventRuleConfig {
            name: "NCCLSegFault".to_string(),
            description: "a process using NCCL segfaulted".to_string(),
            regexp: r"segfault.*\[nccl".to_string(),
            level: Level::Warning,
            suggestion: "inspect the training job's logs for the crashing rank".to_string(),
            log_file: None,
        },
    );
    rules.insert(
        "NvErrResetRequired".to_string(),
        EventRuleConfig {
            name: "NvErrResetRequired".to_string(),
            description: "the NVIDIA driver reports the GPU requires a reset".to_string(),
            regexp: r"NVRM:.*GPU.*reset required".to_string(),
            level: Level::Critical,
            suggestion: "drain the node and power-cycle or reset the affected GPU".to_string(),
            log_file: None,
        },
    );
    rules
}

/// Assembles the `dmesg` Component: compiles `rules` (falling back to
/// [`default_rules`] when empty), opens `kmsg_path` (`/dev/kmsg` in
/// production, a regular file or named pipe in tests), and starts a
/// [`KmsgReader`] feeding the filter. Returns the built component and the
/// reader so the caller can `stop()` it on shutdown (spec.md §5 "graceful
/// shutdown").
pub async fn build_dmesg_component(
    node: impl Into<String>,
    kmsg_path: impl AsRef<Path>,
    rules: HashMap<String, EventRuleConfig>,
    tail_only: bool,
    user_config: ComponentUserConfig,
    frequency: FrequencyController,
) -> Result<(Arc<Component>, Arc<KmsgReader>), CollectError> {
    let file = File::open(kmsg_path.as_ref())
        .await
        .map_err(|source| CollectError::Io { domain: "dmesg".to_string(), source })?;

    Ok(build_dmesg_component_from_reader(node, file, rules, tail_only, user_config, frequency))
}

/// Like [`build_dmesg_component`], but takes an already-open `AsyncRead`
/// rather than a filesystem path — used for `mock: true` operation
/// (`tokio::io::empty()`, producing no findings) and for tests that drive
/// the reader through an in-memory pipe.
pub fn build_dmesg_component_from_reader<R>(
    node: impl Into<String>,
    reader: R,
    rules: HashMap<String, EventRuleConfig>,
    tail_only: bool,
    user_config: ComponentUserConfig,
    frequency: FrequencyController,
) -> (Arc<Component>, Arc<KmsgReader>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let rules = if rules.is_empty() { default_rules() } else { rules };
    let filter = Arc::new(EventFilter::new(rules));

    let kmsg_reader = Arc::new(KmsgReader::new(tail_only));
    let filter_for_lines = Arc::clone(&filter);
    kmsg_reader.start(reader, Arc::new(move |line: &str| filter_for_lines.match_line(line)));

    let component = Component::new_event_driven("dmesg", node, filter, user_config, frequency);
    (component, kmsg_reader)
}
