pub mod commands;
pub mod types;

pub use types::{Cli, Commands};
