//! Concrete Collector/Checker implementations assembled into `Component`s
//! (spec.md §4.7-§4.9). `dmesg` is the crate's fully-implemented
//! demonstration component; `cpu`/`memory`/`nvidia`/`podlog` are the
//! representative supplements named in spec.md §4.9.

pub mod cpu;
pub mod dmesg;
pub mod memory;
pub mod nvidia_hang;
pub mod podlog;

pub use cpu::build_cpu_component;
pub use dmesg::{build_dmesg_component, build_dmesg_component_from_reader};
pub use memory::build_memory_component;
pub use nvidia_hang::build_nvidia_component;
pub use podlog::build_podlog_component;
