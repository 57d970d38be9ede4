pub mod notifier;
pub mod orchestrator;
pub mod pod_mapper;

pub use notifier::Notifier;
pub use orchestrator::{InMemoryOrchestratorClient, NodeObject, OrchestratorClient};
pub use pod_mapper::{MockPodResourceMapper, PodRef, PodResourceMapper};
