use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::error::ExternalError;

/// One pod owning a GPU device, as reported by the cluster orchestrator's
/// device-to-pod index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodRef {
    pub namespace: String,
    pub pod_name: String,
    pub container_name: String,
}

/// External collaborator exposing the device-uuid → pod index (spec.md §6).
/// The core calls it only from Checker error/enrichment paths; availability
/// is optional, so callers treat an `Err` as best-effort and keep the
/// previous cached mapping.
#[async_trait]
pub trait PodResourceMapper: Send + Sync {
    async fn get_device_to_pod_map(&self) -> Result<HashMap<String, PodRef>, ExternalError>;
}

/// In-memory mock: returns whatever map was last installed via `set_map`.
/// Selected by a component's `mock: true` config field (spec.md §9 "Mock
/// collectors"); this is the `PodResourceMapper`-side equivalent.
#[derive(Default)]
pub struct MockPodResourceMapper {
    map: parking_lot::RwLock<HashMap<String, PodRef>>,
}

impl MockPodResourceMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_map(&self, map: HashMap<String, PodRef>) {
        *self.map.write() = map;
    }
}

#[async_trait]
impl PodResourceMapper for MockPodResourceMapper {
    async fn get_device_to_pod_map(&self) -> Result<HashMap<String, PodRef>, ExternalError> {
        Ok(self.map.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_mapper_returns_installed_map() {
        let mapper = MockPodResourceMapper::new();
        let mut map = HashMap::new();
        map.insert(
            "uuid-0".to_string(),
            PodRef {
                namespace: "default".to_string(),
                pod_name: "train-0".to_string(),
                container_name: "worker".to_string(),
            },
        );
        mapper.set_map(map.clone());
        assert_eq!(mapper.get_device_to_pod_map().await.unwrap(), map);
    }
}
