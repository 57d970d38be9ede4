use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::warn;

use crate::domain::error::ExternalError;
use crate::domain::models::{AnnotationEntry, CycleResult, NodeAnnotation};

use super::orchestrator::OrchestratorClient;

/// Projects `CycleResult`s into the node annotation JSON and writes them to
/// the orchestrator (spec.md §4.5).
///
/// A single `tokio::sync::Mutex` serialises the whole read-modify-write
/// cycle (load the current annotation, mutate one component's slot, write
/// it back) across every component calling in concurrently — chosen over
/// `parking_lot::Mutex` because the critical section spans two `.await`
/// points against the orchestrator client.
pub struct Notifier {
    orchestrator: Arc<dyn OrchestratorClient>,
    hostname: String,
    annotation_key: String,
    lock: Mutex<()>,
}

impl Notifier {
    pub fn new(
        orchestrator: Arc<dyn OrchestratorClient>,
        hostname: impl Into<String>,
        annotation_key: impl Into<String>,
    ) -> Self {
        Self {
            orchestrator,
            hostname: hostname.into(),
            annotation_key: annotation_key.into(),
            lock: Mutex::new(()),
        }
    }

    /// Replaces `component`'s slot with exactly the abnormal findings in
    /// `result`. A normal result clears the slot to an empty map.
    pub async fn set_node_annotation(&self, component: &str, result: &CycleResult) -> Result<(), ExternalError> {
        let _guard = self.lock.lock().await;
        let mut annotation = self.load_annotation().await?;
        let slot = annotation.slot_mut(component);
        slot.clear();
        for checker in result.abnormal_checkers() {
            slot.entry(checker.level.to_string()).or_default().push(AnnotationEntry {
                error_name: checker.error_name.clone(),
                device: checker.device.clone(),
            });
        }
        self.store_annotation(&annotation).await
    }

    /// Merges `result`'s abnormal findings into `component`'s slot: entries
    /// sharing an `error_name` are updated in place, new ones are appended.
    pub async fn append_node_annotation(&self, component: &str, result: &CycleResult) -> Result<(), ExternalError> {
        let _guard = self.lock.lock().await;
        let mut annotation = self.load_annotation().await?;
        let slot = annotation.slot_mut(component);
        for checker in result.abnormal_checkers() {
            let entries = slot.entry(checker.level.to_string()).or_default();
            if let Some(existing) = entries.iter_mut().find(|e| e.error_name == checker.error_name) {
                existing.device.clone_from(&checker.device);
            } else {
                entries.push(AnnotationEntry {
                    error_name: checker.error_name.clone(),
                    device: checker.device.clone(),
                });
            }
        }
        self.store_annotation(&annotation).await
    }

    /// Dispatch policy (spec.md §4.5): `HealthCheckTimeout` findings use
    /// `append` since transient timeouts should accumulate; every other
    /// result uses `set`, replacing the component's prior snapshot.
    pub async fn notify(&self, component: &str, result: &CycleResult) -> Result<(), ExternalError> {
        let outcome = if result.checkers.iter().any(|c| c.name.contains("HealthCheckTimeout")) {
            self.append_node_annotation(component, result).await
        } else {
            self.set_node_annotation(component, result).await
        };

        if let Err(ref err) = outcome {
            warn!(component, error = %err, "notifier write failed, caches remain source of truth");
        }
        outcome
    }

    async fn load_annotation(&self) -> Result<NodeAnnotation, ExternalError> {
        let node = self.orchestrator.get_node(&self.hostname).await?;
        match node.annotations.get(&self.annotation_key) {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|err| ExternalError::UpdateConflict(err.to_string())),
            None => Ok(NodeAnnotation::empty()),
        }
    }

    async fn store_annotation(&self, annotation: &NodeAnnotation) -> Result<(), ExternalError> {
        let value = serde_json::to_value(annotation).map_err(|err| ExternalError::UpdateConflict(err.to_string()))?;
        self.orchestrator
            .update_node_annotation(&self.hostname, &self.annotation_key, value)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{CheckerResult, Level};
    use crate::notifier::orchestrator::InMemoryOrchestratorClient;

    fn abnormal_result(error_name: &str, device: &str, level: Level) -> CycleResult {
        let checker = CheckerResult::abnormal("SysOOM", "oom", level).with_error_name(error_name).with_device(device);
        CycleResult::aggregate("dmesg", "node-1", vec![checker])
    }

    #[tokio::test]
    async fn set_then_get_round_trips_abnormal_entry() {
        let orchestrator = Arc::new(InMemoryOrchestratorClient::new());
        let notifier = Notifier::new(orchestrator, "node-1", "scitix.ai/sichek");

        let result = abnormal_result("SysOOM", "", Level::Critical);
        notifier.set_node_annotation("dmesg", &result).await.unwrap();

        let loaded = notifier.load_annotation().await.unwrap();
        let slot = &loaded.components["dmesg"];
        assert_eq!(slot["critical"][0].error_name, "SysOOM");
    }

    #[tokio::test]
    async fn append_updates_existing_entry_device_without_duplicating() {
        let orchestrator = Arc::new(InMemoryOrchestratorClient::new());
        let notifier = Notifier::new(orchestrator, "node-1", "scitix.ai/sichek");

        let first = abnormal_result("SysOOM", "", Level::Critical);
        notifier.set_node_annotation("dmesg", &first).await.unwrap();

        let second = abnormal_result("SysOOM", "node-1", Level::Critical);
        notifier.append_node_annotation("dmesg", &second).await.unwrap();

        let loaded = notifier.load_annotation().await.unwrap();
        let entries = &loaded.components["dmesg"]["critical"];
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].device, "node-1");
    }

    #[tokio::test]
    async fn set_with_no_abnormal_checkers_clears_the_slot() {
        let orchestrator = Arc::new(InMemoryOrchestratorClient::new());
        let notifier = Notifier::new(orchestrator, "node-1", "scitix.ai/sichek");

        let abnormal = abnormal_result("SysOOM", "", Level::Critical);
        notifier.set_node_annotation("dmesg", &abnormal).await.unwrap();

        let normal = CycleResult::aggregate("dmesg", "node-1", vec![CheckerResult::normal("SysOOM", "clean")]);
        notifier.set_node_annotation("dmesg", &normal).await.unwrap();

        let loaded = notifier.load_annotation().await.unwrap();
        assert!(loaded.components["dmesg"].is_empty());
    }
}
