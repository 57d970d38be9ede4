pub mod checker;
pub mod collector;
pub mod component;
pub mod daemon;
pub mod frequency_controller;
pub mod ring_cache;

pub use checker::Checker;
pub use collector::Collector;
pub use component::{Component, ComponentRuntime};
pub use daemon::{select_components, DaemonService};
pub use frequency_controller::FrequencyController;
pub use ring_cache::RingCache;
