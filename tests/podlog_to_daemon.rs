//! End-to-end: the `podlog` Component, assembled via its builder and
//! registered with a `DaemonService`, picks up matches from two pod log
//! files and attributes them to the comma-joined set of owning pods
//! (spec.md §4.7, §8's pod-log scenario) — exercised through
//! `DaemonService` rather than the component in isolation, since
//! `components::podlog`'s own unit test doesn't touch the daemon.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use nodewatch::components::podlog::{build_podlog_component, MockPodLogSource};
use nodewatch::domain::models::config::ComponentUserConfig;
use nodewatch::domain::models::{EventRuleConfig, Level, DEFAULT_ANNOTATION_KEY};
use nodewatch::notifier::{InMemoryOrchestratorClient, MockPodResourceMapper, Notifier, OrchestratorClient, PodResourceMapper};
use nodewatch::runtime::{DaemonService, FrequencyController};

#[tokio::test]
async fn daemon_registered_podlog_component_attributes_matches_to_pods() {
    let dir = tempfile::tempdir().unwrap();
    let path_a = dir.path().join("pod-a.log");
    let path_b = dir.path().join("pod-b.log");
    std::fs::write(&path_a, "Out of memory: killed pid 11\n").unwrap();
    std::fs::write(&path_b, "Out of memory: killed pid 22\n").unwrap();

    let mut rules = HashMap::new();
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

    let orchestrator: Arc<dyn OrchestratorClient> = Arc::new(InMemoryOrchestratorClient::new());
    let notifier = Arc::new(Notifier::new(orchestrator, "node-1", DEFAULT_ANNOTATION_KEY));
    let pod_mapper: Arc<dyn PodResourceMapper> = Arc::new(MockPodResourceMapper::new());
    let mut daemon = DaemonService::new("node-1", notifier, pod_mapper);
    daemon.register(component);
    daemon.start_all();

    tokio::time::sleep(Duration::from_millis(100)).await;

    let component = daemon.component("podlog").unwrap();
    let mut found = None;
    for _ in 0..50 {
        if let Some(result) = component.last_result() {
            if !result.checkers.is_empty() {
                found = Some(result);
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let result = found.expect("expected the podlog component to have produced a finding");
    assert_eq!(result.checkers[0].device, "pod-a,pod-b");

    daemon.shutdown().await;
    scanner.stop().await;
}
