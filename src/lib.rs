//! nodewatch — a node-resident GPU/HPC cluster health-check agent runtime.
//!
//! The hard core lives in [`runtime`] (the Collector/Checker contract, the
//! per-component scheduler, the ring cache), [`eventfilter`] (kernel-log and
//! pod-log pattern matching), [`hangdetector`] (sustained GPU-hang
//! detection), and [`notifier`] (node annotation projection). [`components`]
//! assembles concrete Collector/Checker pairs into runnable `Component`s;
//! [`config`], [`logging`], [`metrics`], and [`cli`] are the ambient
//! operator-facing stack around that core.

pub mod cli;
pub mod components;
pub mod config;
pub mod domain;
pub mod eventfilter;
pub mod hangdetector;
pub mod logging;
pub mod metrics;
pub mod notifier;
pub mod runtime;

pub use domain::models::{CheckerResult, CycleResult, Info, Level, Status};
pub use runtime::{Component, ComponentRuntime, DaemonService};
