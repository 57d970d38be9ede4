pub mod loader;

pub use loader::{ConfigLoader, DEFAULT_SPEC_CONFIG_PATH, DEFAULT_USER_CONFIG_PATH};
