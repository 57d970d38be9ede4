use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::error::ExternalError;

/// Minimal view of the cluster orchestrator's node object this crate needs:
/// just enough to read and compare-update one annotation key (spec.md §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeObject {
    pub hostname: String,
    #[serde(default)]
    pub annotations: HashMap<String, serde_json::Value>,
}

/// External collaborator: the cluster orchestrator client (spec.md §6 "two
/// operations: get node by hostname and update node annotations"). Real
/// implementations are a replaceable concern per §1; this crate ships only
/// the trait and an in-memory mock.
#[async_trait]
pub trait OrchestratorClient: Send + Sync {
    async fn get_node(&self, hostname: &str) -> Result<NodeObject, ExternalError>;

    async fn update_node_annotation(
        &self,
        hostname: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), ExternalError>;
}

/// In-memory mock orchestrator, keyed by hostname. Used by tests and by
/// `nodewatchd run --mock` to exercise the Notifier without a real cluster.
#[derive(Default)]
pub struct InMemoryOrchestratorClient {
    nodes: parking_lot::Mutex<HashMap<String, NodeObject>>,
}

impl InMemoryOrchestratorClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrchestratorClient for InMemoryOrchestratorClient {
    async fn get_node(&self, hostname: &str) -> Result<NodeObject, ExternalError> {
        let nodes = self.nodes.lock();
        Ok(nodes.get(hostname).cloned().unwrap_or_else(|| NodeObject {
            hostname: hostname.to_string(),
            annotations: HashMap::new(),
        }))
    }

    async fn update_node_annotation(
        &self,
        hostname: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), ExternalError> {
        let mut nodes = self.nodes.lock();
        let node = nodes.entry(hostname.to_string()).or_insert_with(|| NodeObject {
            hostname: hostname.to_string(),
            annotations: HashMap::new(),
        });
        node.annotations.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_node_defaults_to_empty_annotations_for_unknown_host() {
        let client = InMemoryOrchestratorClient::new();
        let node = client.get_node("node-1").await.unwrap();
        assert!(node.annotations.is_empty());
    }

    #[tokio::test]
    async fn update_then_get_round_trips() {
        let client = InMemoryOrchestratorClient::new();
        client
            .update_node_annotation("node-1", "scitix.ai/sichek", serde_json::json!({"dmesg": {}}))
            .await
            .unwrap();
        let node = client.get_node("node-1").await.unwrap();
        assert_eq!(node.annotations["scitix.ai/sichek"], serde_json::json!({"dmesg": {}}));
    }
}
