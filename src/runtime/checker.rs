use crate::domain::error::CheckerError;
use crate::domain::models::{CheckerResult, Info};

/// A pure function mapping one `Info` snapshot to one `CheckerResult`.
///
/// Stateless unless otherwise specified — `HangDetector` (spec.md §4.4) is
/// the one stateful Checker here, holding its dwell-time state behind
/// `&self` interior mutability rather than taking `&mut self`, since a
/// Component runs all of its checkers without exclusive access to any one
/// of them.
pub trait Checker: Send + Sync {
    /// Stable identifier for this checker, used as `CheckerResult::name`'s
    /// namespace and in `ignored_checkers` config matching.
    fn name(&self) -> &str;

    /// Runs the check against `info`. Implementations that need a concrete
    /// `Info` payload type call `info.downcast_ref::<T>()` and return a
    /// `CheckerError` on mismatch — the type-erasure contract from
    /// spec.md §9.
    fn check(&self, info: &Info) -> Result<CheckerResult, CheckerError>;
}
