use chrono::{DateTime, Utc};
use std::any::Any;
use std::sync::Arc;

/// A type-erased per-domain snapshot carrying a timestamp.
///
/// `Collector`s produce an `Info`; `Checker`s downcast it back to their
/// concrete snapshot type. This is the Rust shape of spec.md §9's "`Info` is
/// a type-erased value exchanged between Collector and Checker; each
/// concrete Component knows its concrete Info type and performs a checked
/// downcast, signalling a CheckerError on mismatch" — `Any` plays the role
/// the source language's empty interface plays, and `downcast_ref` is the
/// checked assertion.
#[derive(Clone)]
pub struct Info {
    pub time: DateTime<Utc>,
    data: Arc<dyn Any + Send + Sync>,
}

impl Info {
    pub fn new<T: Any + Send + Sync>(time: DateTime<Utc>, data: T) -> Self {
        Self {
            time,
            data: Arc::new(data),
        }
    }

    /// Wraps `data` with the current time as its snapshot timestamp.
    pub fn now<T: Any + Send + Sync>(data: T) -> Self {
        Self::new(Utc::now(), data)
    }

    /// Attempts to recover the concrete snapshot type a Checker expects.
    /// Returns `None` on type mismatch instead of panicking — the caller
    /// turns that into a `CheckerError`.
    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for Info {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Info").field("time", &self.time).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Sample {
        value: u32,
    }

    #[test]
    fn downcast_succeeds_for_matching_type() {
        let info = Info::now(Sample { value: 42 });
        assert_eq!(info.downcast_ref::<Sample>(), Some(&Sample { value: 42 }));
    }

    #[test]
    fn downcast_fails_for_mismatched_type() {
        let info = Info::now(Sample { value: 42 });
        assert_eq!(info.downcast_ref::<u64>(), None);
    }
}
