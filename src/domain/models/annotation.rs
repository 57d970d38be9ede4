use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One abnormal entry in the node annotation: a stable checker identifier
/// plus the device(s) it was raised against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationEntry {
    pub error_name: String,
    #[serde(default)]
    pub device: String,
}

/// `level -> entries` for one component slot.
pub type LevelEntries = BTreeMap<String, Vec<AnnotationEntry>>;

/// The nine named per-component slots persisted as a single JSON blob under
/// the configured annotation key (spec.md §6).
pub const ANNOTATION_COMPONENTS: [&str; 9] = [
    "nccl", "hang", "nvidia", "infiniband", "ethernet", "gpfs", "cpu", "memory", "dmesg",
];

/// Default node-object annotation key (spec.md §6), overridable per
/// deployment.
pub const DEFAULT_ANNOTATION_KEY: &str = "scitix.ai/sichek";

/// `component -> level -> entries`, the full annotation document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeAnnotation {
    #[serde(flatten)]
    pub components: BTreeMap<String, LevelEntries>,
}

impl NodeAnnotation {
    pub fn empty() -> Self {
        let mut components = BTreeMap::new();
        for name in ANNOTATION_COMPONENTS {
            components.insert(name.to_string(), LevelEntries::new());
        }
        Self { components }
    }

    pub fn slot_mut(&mut self, component: &str) -> &mut LevelEntries {
        self.components.entry(component.to_string()).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_annotation_has_all_nine_slots() {
        let ann = NodeAnnotation::empty();
        assert_eq!(ann.components.len(), ANNOTATION_COMPONENTS.len());
        for name in ANNOTATION_COMPONENTS {
            assert!(ann.components.contains_key(name));
        }
    }
}
