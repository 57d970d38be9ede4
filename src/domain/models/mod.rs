pub mod annotation;
pub mod checker_result;
pub mod config;
pub mod event_rule;
pub mod info;
pub mod result;
pub mod status;

pub use annotation::{AnnotationEntry, NodeAnnotation, ANNOTATION_COMPONENTS, DEFAULT_ANNOTATION_KEY};
pub use checker_result::CheckerResult;
pub use config::{ComponentSpecConfig, ComponentUserConfig, SpecConfig, UserConfig};
pub use event_rule::{EventRuleConfig, RuntimeEventRule};
pub use info::Info;
pub use result::CycleResult;
pub use status::{max_level, Level, Status};
