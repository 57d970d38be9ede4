//! End-to-end: a kernel-log line flows through the real `dmesg` Component
//! into the Notifier's node annotation (spec.md §8's OOM scenario, carried
//! one step further than the unit tests — through `Notifier::notify`
//! rather than stopping at the raw `CheckerResult`).

use std::collections::HashMap;
use std::sync::Arc;

use nodewatch::components::dmesg::build_dmesg_component_from_reader;
use nodewatch::domain::models::config::ComponentUserConfig;
use nodewatch::domain::models::NodeAnnotation;
use nodewatch::notifier::{InMemoryOrchestratorClient, Notifier, OrchestratorClient};
use nodewatch::runtime::{ComponentRuntime, FrequencyController};

#[tokio::test]
async fn oom_kmsg_line_surfaces_in_the_node_annotation() {
    let (mut writer, reader) = tokio::io::duplex(4096);

    let (component, kmsg_reader) = build_dmesg_component_from_reader(
        "node-1",
        reader,
        HashMap::new(),
        false,
        ComponentUserConfig::default(),
        FrequencyController::new(),
    );

    use tokio::io::AsyncWriteExt;
    writer
        .write_all(b"6,100,0,-;Out of memory: Kill process 4242 (worker)\n")
        .await
        .unwrap();
    writer.flush().await.unwrap();

    let mut result = component.health_check().await.unwrap();
    for _ in 0..50 {
        if !result.checkers.is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        result = component.health_check().await.unwrap();
    }
    assert!(!result.checkers.is_empty(), "expected the OOM line to produce a finding");

    let orchestrator = Arc::new(InMemoryOrchestratorClient::new());
    let notifier = Notifier::new(Arc::clone(&orchestrator) as Arc<dyn OrchestratorClient>, "node-1", "scitix.ai/sichek");
    notifier.notify("dmesg", &result).await.unwrap();

    let node = orchestrator.get_node("node-1").await.unwrap();
    let annotation: NodeAnnotation = serde_json::from_value(node.annotations["scitix.ai/sichek"].clone()).unwrap();
    assert_eq!(annotation.components["dmesg"]["critical"][0].error_name, "SysOOM");

    kmsg_reader.stop().await;
}
