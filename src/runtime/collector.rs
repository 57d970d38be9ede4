use async_trait::async_trait;

use crate::domain::error::CollectError;
use crate::domain::models::Info;

/// Produces a single `Info` snapshot of one domain (hardware, kernel,
/// network, filesystem, workload telemetry). May shell out, read sysfs, or
/// query a device API; those concerns are the replaceable collectors named
/// in spec.md §1 — this trait is their common contract.
#[async_trait]
pub trait Collector: Send + Sync {
    /// One-shot snapshot. Errors map to `CollectError`, which aborts the
    /// current cycle and leaves the previous cache entry in place
    /// (spec.md §4.1).
    async fn collect(&self) -> Result<Info, CollectError>;
}
