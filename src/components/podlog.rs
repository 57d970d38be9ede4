//! Pod log event component (spec.md §4.7), implemented as a minimal
//! illustrative `EventFilter` consumer rather than a full `/var/log/pods`
//! walker — the filesystem-walking internals are a replaceable concern
//! this crate only needs to demonstrate, not build out.
//!
//! A [`PodLogSource`] supplies the `(file path, pod name)` pairs to scan on
//! each tick; a real implementation would walk `/var/log/pods` filtering to
//! running pods' `.log` files, a [`MockPodLogSource`] returns a fixed list
//! for tests and `mock: true` operation.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::domain::models::config::ComponentUserConfig;
use crate::domain::models::EventRuleConfig;
use crate::eventfilter::EventFilter;
use crate::runtime::component::Component;
use crate::runtime::frequency_controller::FrequencyController;

/// Supplies the set of `(path, pod name)` pairs to scan on each tick.
pub trait PodLogSource: Send + Sync {
    fn running_pod_log_files(&self) -> Vec<(String, String)>;
}

/// Fixed-list mock, selected by `ComponentUserConfig::mock` or used directly
/// in tests. Real deployments would walk `/var/log/pods/<ns>_<pod>_<uid>/
/// <container>/*.log`, excluding rotated `.gz` files and log files for pods
/// no longer running — that directory layout is the replaceable concern
/// named above.
pub struct MockPodLogSource {
    files: parking_lot::RwLock<Vec<(String, String)>>,
}

impl MockPodLogSource {
    pub fn new(files: Vec<(String, String)>) -> Self {
        Self {
            files: parking_lot::RwLock::new(files),
        }
    }

    pub fn set_files(&self, files: Vec<(String, String)>) {
        *self.files.write() = files;
    }
}

impl PodLogSource for MockPodLogSource {
    fn running_pod_log_files(&self) -> Vec<(String, String)> {
        self.files.read().clone()
    }
}

/// Filters a raw directory listing down to running pods' plain `.log`
/// files, per spec.md §8's pod-log scenario: exclude rotated (`.gz`)
/// files, exclude files outside `running_pods`, dedupe by absolute path.
/// Exposed standalone so it's testable without a real filesystem walk.
pub fn filter_running_pod_logs(
    candidates: &[(String, String)],
    running_pods: &[String],
) -> Vec<(String, String)> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for (path, pod) in candidates {
        if !path.ends_with(".log") {
            continue;
        }
        if !running_pods.iter().any(|p| p == pod) {
            continue;
        }
        if seen.insert(path.clone()) {
            out.push((path.clone(), pod.clone()));
        }
    }
    out
}

/// Background task, analogous to `KmsgReader` but polling rather than
/// streaming: on every `interval` tick, asks `source` for the current file
/// list and scans each through `filter`, tagging matches with the owning
/// pod name (spec.md §4.7: "post-processes abnormal CheckerResult device
/// from file paths to comma-joined pod names").
pub struct PodLogScanner {
    cancel: CancellationToken,
    task: parking_lot::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl PodLogScanner {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            task: parking_lot::Mutex::new(None),
        }
    }

    pub fn start(&self, filter: Arc<EventFilter>, source: Arc<dyn PodLogSource>, interval: Duration) {
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = tokio::time::sleep(interval) => {}
                    () = cancel.cancelled() => break,
                }
                let files = source.running_pod_log_files();
                filter.scan_files_with_device(&files);
            }
        });
        *self.task.lock() = Some(handle);
    }

    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if tokio::time::timeout(Duration::from_secs(2), handle).await.is_err() {
                tracing::warn!("timed out waiting for pod log scanner task to stop");
            }
        }
    }
}

impl Default for PodLogScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Assembles the `podlog` Component plus its background scanner. `rules`
/// comes from `spec.yaml`'s `podlog.event_checkers`; an empty set yields a
/// filter that never matches, which is a valid (if useless) configuration
/// rather than an error — operators who don't care about pod logs simply
/// omit the rules.
pub fn build_podlog_component(
    node: impl Into<String>,
    rules: std::collections::HashMap<String, EventRuleConfig>,
    source: Arc<dyn PodLogSource>,
    scan_interval: Duration,
    user_config: ComponentUserConfig,
    frequency: FrequencyController,
) -> (Arc<Component>, Arc<PodLogScanner>) {
    let filter = Arc::new(EventFilter::new(rules));
    let scanner = Arc::new(PodLogScanner::new());
    scanner.start(Arc::clone(&filter), source, scan_interval);

    let component = Component::new_event_driven("podlog", node, filter, user_config, frequency);
    (component, scanner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Level;

    #[test]
    fn filter_excludes_gzipped_and_non_running_pod_files() {
        let candidates = vec![
            ("/var/log/pods/ns_a_1/c/0.log".to_string(), "pod-a".to_string()),
            ("/var/log/pods/ns_a_1/c/0.log.gz".to_string(), "pod-a".to_string()),
            ("/var/log/pods/ns_b_1/c/0.log".to_string(), "pod-b".to_string()),
        ];
        let running = vec!["pod-a".to_string()];
        let filtered = filter_running_pod_logs(&candidates, &running);
        assert_eq!(filtered, vec![("/var/log/pods/ns_a_1/c/0.log".to_string(), "pod-a".to_string())]);
    }

    #[test]
    fn filter_dedupes_repeated_paths() {
        let candidates = vec![
            ("/var/log/pods/ns_a_1/c/0.log".to_string(), "pod-a".to_string()),
            ("/var/log/pods/ns_a_1/c/0.log".to_string(), "pod-a".to_string()),
        ];
        let running = vec!["pod-a".to_string()];
        assert_eq!(filter_running_pod_logs(&candidates, &running).len(), 1);
    }

    #[tokio::test]
    async fn scanner_tags_matches_with_the_owning_pod_across_files() {
        let dir = tempfile::tempdir().unwrap();
        let path_a = dir.path().join("a.log");
        let path_b = dir.path().join("b.log");
        std::fs::write(&path_a, "Out of memory: killed pid 1\n").unwrap();
        std::fs::write(&path_b, "Out of memory: killed pid 2\n").unwrap();

        let mut rules = std::collections::HashMap::new();
        rules.insert(
            "SysOOM".to_string(),
            EventRuleConfig {
                name: "SysOOM".to_string(),
                description: "oom".to_string(),
                regexp: "Out of memory:".to_string(),
                level: Level::Critical,
                suggestion: String::new(),
                log_file: None,
            },
        );

        let source = Arc::new(MockPodLogSource::new(vec![
            (path_a.to_string_lossy().to_string(), "pod-a".to_string()),
            (path_b.to_string_lossy().to_string(), "pod-b".to_string()),
        ]));

        let (component, scanner) = build_podlog_component(
            "node-1",
            rules,
            source,
            Duration::from_millis(10),
            ComponentUserConfig::default(),
            FrequencyController::new(),
        );

        use crate::runtime::component::ComponentRuntime;
        let mut result = component.health_check().await.unwrap();
        for _ in 0..50 {
            if !result.checkers.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            result = component.health_check().await.unwrap();
        }

        assert_eq!(result.checkers.len(), 1);
        assert_eq!(result.checkers[0].device, "pod-a,pod-b");

        scanner.stop().await;
    }
}
