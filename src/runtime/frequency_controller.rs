use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

/// Shared registry of per-component query intervals.
///
/// Lives outside any single `Component` to break the circular dependency
/// the `HangDetector` would otherwise have on the Nvidia component
/// (spec.md §9: "it sits outside the Component to break the circular
/// dependency"). Reads are lock-free-capable in the source's Go
/// implementation (`sync.Map`); here a `parking_lot::RwLock` over a plain
/// `HashMap` gives the same "many cheap reads, rare writes from the hang
/// detector" shape without pulling in a lock-free map crate for a registry
/// this small.
#[derive(Clone)]
pub struct FrequencyController {
    inner: Arc<RwLock<HashMap<String, Duration>>>,
}

impl FrequencyController {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registers `component`'s interval if it has none yet. Called once at
    /// Component construction so every registered name has an entry before
    /// any adaptive detector tries to read or boost it.
    pub fn register(&self, component: &str, interval: Duration) {
        self.inner.write().entry(component.to_string()).or_insert(interval);
    }

    /// The interval a component's scheduler should use on its next tick.
    /// Falls back to `default` if the component was never registered.
    pub fn get(&self, component: &str, default: Duration) -> Duration {
        self.inner.read().get(component).copied().unwrap_or(default)
    }

    /// Overwrites `component`'s interval immediately; visible to the next
    /// ticker read (spec.md §5).
    pub fn set(&self, component: &str, interval: Duration) {
        self.inner.write().insert(component.to_string(), interval);
    }
}

impl Default for FrequencyController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_falls_back_to_default_when_unregistered() {
        let fc = FrequencyController::new();
        assert_eq!(fc.get("nvidia", Duration::from_secs(10)), Duration::from_secs(10));
    }

    #[test]
    fn set_is_visible_immediately() {
        let fc = FrequencyController::new();
        fc.register("hang", Duration::from_secs(10));
        fc.set("hang", Duration::from_secs(1));
        assert_eq!(fc.get("hang", Duration::from_secs(10)), Duration::from_secs(1));
    }

    #[test]
    fn register_does_not_overwrite_existing_entry() {
        let fc = FrequencyController::new();
        fc.set("hang", Duration::from_secs(1));
        fc.register("hang", Duration::from_secs(10));
        assert_eq!(fc.get("hang", Duration::from_secs(99)), Duration::from_secs(1));
    }
}
