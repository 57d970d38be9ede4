use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::error::{CollectError, CycleError};
use crate::domain::models::{CheckerResult, ComponentUserConfig, CycleResult, Info};
use crate::eventfilter::EventFilter;
use crate::runtime::checker::Checker;
use crate::runtime::collector::Collector;
use crate::runtime::frequency_controller::FrequencyController;
use crate::runtime::ring_cache::RingCache;

/// Default broadcast buffer for forwarded (critical/fatal) results. Slow
/// consumers fall behind and see `RecvError::Lagged` rather than stalling
/// the producer — the tokio-native shape of spec.md §5's "non-blocking send
/// with drop-and-log on full channel."
const RESULT_CHANNEL_CAPACITY: usize = 64;

/// The small, stable method surface every concrete component exposes
/// (spec.md §4.1, §9 "Interface polymorphism"). `Component` is the single
/// concrete implementation — every domain-specific behavior lives in its
/// `Collector`/`Checker`s, not in a second impl of this trait.
#[async_trait]
pub trait ComponentRuntime: Send + Sync {
    fn name(&self) -> &str;

    /// One synchronous cycle: collect, check, aggregate, cache, return.
    async fn health_check(&self) -> Result<CycleResult, CycleError>;

    /// Starts the background scheduler loop if not already running and
    /// returns a receiver for forwarded (critical/fatal) results. Idempotent:
    /// repeated calls do not spawn a second loop, and because the underlying
    /// channel is a broadcast channel, every caller's receiver observes every
    /// result forwarded after it subscribes. Takes `self: Arc<Self>` because
    /// the loop is a detached `tokio::spawn` task that must own a handle to
    /// the component for its full lifetime.
    fn start(self: Arc<Self>) -> broadcast::Receiver<CycleResult>;

    /// Cancels the loop and waits (bounded) for it to exit.
    async fn stop(&self);

    fn last_result(&self) -> Option<CycleResult>;
    fn last_info(&self) -> Option<Info>;
    fn cache_results(&self) -> Vec<CycleResult>;
    fn cache_infos(&self) -> Vec<Info>;

    fn update(&self, cfg: ComponentUserConfig);
    fn status(&self) -> bool;
    fn get_timeout(&self) -> Duration;
}

struct Cache {
    results: RingCache<CycleResult>,
    infos: RingCache<Info>,
}

/// What a cycle actually runs. Most components poll one `Collector` and feed
/// its `Info` to N `Checker`s (spec.md §4.1); `Dmesg` and `PodLog` are
/// event-driven instead — their findings accumulate asynchronously in an
/// `EventFilter` fed by a background line source, and a cycle is just a
/// `drain()` (spec.md §4.2, §4.8: "HealthCheck calls EventCache.drain() and
/// returns the Result"). Both shapes share one `Component` so the ring
/// cache, scheduler loop, and `ComponentRuntime` surface aren't duplicated.
enum Source {
    Polling {
        collector: Arc<dyn Collector>,
        checkers: Vec<Arc<dyn Checker>>,
    },
    EventDriven {
        filter: Arc<EventFilter>,
    },
}

/// Wraps one check source (polling or event-driven) with a ring cache and a
/// per-component scheduler loop (spec.md §4.1).
pub struct Component {
    name: String,
    node: String,
    source: Source,
    cache: RwLock<Cache>,
    config: Mutex<ComponentUserConfig>,
    frequency: FrequencyController,
    result_tx: broadcast::Sender<CycleResult>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    running: AtomicBool,
}

impl Component {
    fn build(name: String, node: String, source: Source, config: ComponentUserConfig, frequency: FrequencyController) -> Arc<Self> {
        frequency.register(&name, config.query_interval.into());
        let cache_size = config.cache_size.max(1);
        let (result_tx, _) = broadcast::channel(RESULT_CHANNEL_CAPACITY);
        Arc::new(Self {
            name,
            node,
            source,
            cache: RwLock::new(Cache {
                results: RingCache::new(cache_size),
                infos: RingCache::new(cache_size),
            }),
            config: Mutex::new(config),
            frequency,
            result_tx,
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
            running: AtomicBool::new(false),
        })
    }

    /// A polling component: one `Collector` feeding N `Checker`s over a
    /// shared `Info` type.
    pub fn new(
        name: impl Into<String>,
        node: impl Into<String>,
        collector: Arc<dyn Collector>,
        checkers: Vec<Arc<dyn Checker>>,
        config: ComponentUserConfig,
        frequency: FrequencyController,
    ) -> Arc<Self> {
        Self::build(name.into(), node.into(), Source::Polling { collector, checkers }, config, frequency)
    }

    /// An event-driven component backed by an `EventFilter` (spec.md §4.8).
    pub fn new_event_driven(
        name: impl Into<String>,
        node: impl Into<String>,
        filter: Arc<EventFilter>,
        config: ComponentUserConfig,
        frequency: FrequencyController,
    ) -> Arc<Self> {
        Self::build(name.into(), node.into(), Source::EventDriven { filter }, config, frequency)
    }

    fn ignored(&self, checker_name: &str) -> bool {
        self.config
            .lock()
            .ignored_checkers
            .iter()
            .any(|n| n == checker_name)
    }

    async fn run_checkers(&self, checkers: &[Arc<dyn Checker>], info: &Info) -> Result<Vec<CheckerResult>, CycleError> {
        let mut results = Vec::with_capacity(checkers.len());
        let mut failures = 0usize;

        for checker in checkers {
            if self.ignored(checker.name()) {
                continue;
            }
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| checker.check(info)));
            match outcome {
                Ok(Ok(result)) => results.push(result),
                Ok(Err(err)) => {
                    failures += 1;
                    warn!(component = %self.name, checker = checker.name(), error = %err, "checker failed");
                    results.push(CheckerResult::checker_error(checker.name(), err));
                }
                Err(panic) => {
                    failures += 1;
                    let msg = panic_message(&panic);
                    error!(component = %self.name, checker = checker.name(), panic = %msg, "checker panicked");
                    results.push(CheckerResult::checker_error(checker.name(), msg));
                }
            }
        }

        if !results.is_empty() && failures == results.len() {
            return Err(CycleError::AllCheckersFailed);
        }
        Ok(results)
    }

    async fn run_cycle(&self) -> Result<CycleResult, CycleError> {
        match &self.source {
            Source::Polling { collector, checkers } => {
                let collected = AssertUnwindSafe(collector.collect()).catch_unwind().await;
                let info = match collected {
                    Ok(Ok(info)) => info,
                    Ok(Err(err)) => return Err(CycleError::Collect(err)),
                    Err(panic) => {
                        let msg = panic_message(&panic);
                        return Err(CycleError::Collect(CollectError::Panicked(msg)));
                    }
                };

                let checker_results = self.run_checkers(checkers, &info).await?;
                let result = CycleResult::aggregate(&self.name, &self.node, checker_results);

                let mut cache = self.cache.write();
                cache.results.push(result.clone());
                cache.infos.push(info);
                Ok(result)
            }
            Source::EventDriven { filter } => {
                let checker_results = filter.drain();
                let result = CycleResult::aggregate(&self.name, &self.node, checker_results);
                let mut cache = self.cache.write();
                cache.results.push(result.clone());
                cache.infos.push(Info::now(()));
                Ok(result)
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[async_trait]
impl ComponentRuntime for Component {
    fn name(&self) -> &str {
        &self.name
    }

    async fn health_check(&self) -> Result<CycleResult, CycleError> {
        let deadline = self.get_timeout();
        match tokio::time::timeout(deadline, self.run_cycle()).await {
            Ok(outcome) => outcome,
            Err(_elapsed) => {
                // Synthetic HealthCheckTimeout result per spec.md §7: this is
                // not a hard error, the cycle "completes" with one finding.
                let timeout_checker = CheckerResult::timeout(&self.name, deadline);
                let result = CycleResult::aggregate(&self.name, &self.node, vec![timeout_checker]);
                self.cache.write().results.push(result.clone());
                Ok(result)
            }
        }
    }

    fn start(self: Arc<Self>) -> broadcast::Receiver<CycleResult> {
        let receiver = self.result_tx.subscribe();
        if self.running.swap(true, Ordering::SeqCst) {
            return receiver;
        }

        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            info!(component = %self.name, "scheduler loop started");
            loop {
                let interval = self.get_timeout();
                tokio::select! {
                    () = tokio::time::sleep(interval) => {}
                    () = cancel.cancelled() => break,
                }

                match self.health_check().await {
                    Ok(result) => {
                        debug!(component = %self.name, status = %result.status, level = %result.level, "cycle complete");
                        if result.level.is_forwarded() && self.result_tx.send(result).is_err() {
                            debug!(component = %self.name, "no subscribers for forwarded result");
                        }
                    }
                    Err(err) => {
                        warn!(component = %self.name, error = %err, "cycle aborted, previous cache retained");
                    }
                }
            }
            info!(component = %self.name, "scheduler loop stopped");
        });

        *self.task.lock() = Some(handle);
        receiver
    }

    async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if tokio::time::timeout(Duration::from_secs(2), handle).await.is_err() {
                warn!(component = %self.name, "timed out waiting for scheduler loop to stop");
            }
        }
        self.running.store(false, Ordering::SeqCst);
    }

    fn last_result(&self) -> Option<CycleResult> {
        self.cache.read().results.last()
    }

    fn last_info(&self) -> Option<Info> {
        self.cache.read().infos.last()
    }

    fn cache_results(&self) -> Vec<CycleResult> {
        self.cache.read().results.snapshot()
    }

    fn cache_infos(&self) -> Vec<Info> {
        self.cache.read().infos.snapshot()
    }

    fn update(&self, cfg: ComponentUserConfig) {
        self.frequency.set(&self.name, cfg.query_interval.into());
        *self.config.lock() = cfg;
    }

    fn status(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn get_timeout(&self) -> Duration {
        self.frequency.get(&self.name, self.config.lock().query_interval.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Status;
    use std::sync::atomic::AtomicU32;

    struct CountingCollector {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Collector for CountingCollector {
        async fn collect(&self) -> Result<Info, CollectError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Info::now(42u32))
        }
    }

    struct AlwaysNormalChecker;

    impl Checker for AlwaysNormalChecker {
        fn name(&self) -> &str {
            "AlwaysNormal"
        }

        fn check(&self, info: &Info) -> Result<CheckerResult, crate::domain::error::CheckerError> {
            let value = info.downcast_ref::<u32>().copied().unwrap_or_default();
            Ok(CheckerResult::normal("AlwaysNormal", format!("value={value}")))
        }
    }

    struct AlwaysFailingChecker;

    impl Checker for AlwaysFailingChecker {
        fn name(&self) -> &str {
            "AlwaysFailing"
        }

        fn check(&self, _info: &Info) -> Result<CheckerResult, crate::domain::error::CheckerError> {
            Err(crate::domain::error::CheckerError::new("AlwaysFailing", "boom"))
        }
    }

    fn test_component(checkers: Vec<Arc<dyn Checker>>, cache_size: usize) -> Arc<Component> {
        let collector = Arc::new(CountingCollector { calls: AtomicU32::new(0) });
        let mut cfg = ComponentUserConfig::default();
        cfg.cache_size = cache_size;
        Component::new("test", "node-1", collector, checkers, cfg, FrequencyController::new())
    }

    #[tokio::test]
    async fn health_check_aggregates_normal_result() {
        let component = test_component(vec![Arc::new(AlwaysNormalChecker)], 5);
        let result = component.health_check().await.unwrap();
        assert_eq!(result.status, Status::Normal);
        assert_eq!(component.last_result().unwrap().item, "test");
    }

    #[tokio::test]
    async fn single_checker_failure_becomes_abnormal_result_not_hard_error() {
        let component = test_component(
            vec![Arc::new(AlwaysNormalChecker), Arc::new(AlwaysFailingChecker)],
            5,
        );
        let result = component.health_check().await.unwrap();
        assert_eq!(result.status, Status::Abnormal);
        assert_eq!(result.checkers.len(), 2);
    }

    #[tokio::test]
    async fn all_checkers_failing_is_a_hard_cycle_error() {
        let component = test_component(vec![Arc::new(AlwaysFailingChecker)], 5);
        let err = component.health_check().await.unwrap_err();
        assert!(matches!(err, CycleError::AllCheckersFailed));
    }

    #[tokio::test]
    async fn ring_cache_wraps_after_more_cycles_than_capacity() {
        let component = test_component(vec![Arc::new(AlwaysNormalChecker)], 5);
        for _ in 0..7 {
            component.health_check().await.unwrap();
        }
        assert_eq!(component.cache_results().len(), 5);
    }

    #[tokio::test]
    async fn last_result_matches_most_recent_health_check() {
        let component = test_component(vec![Arc::new(AlwaysNormalChecker)], 5);
        let mut last = None;
        for _ in 0..4 {
            last = Some(component.health_check().await.unwrap());
        }
        assert_eq!(component.last_result().unwrap().time, last.unwrap().time);
    }

    #[tokio::test]
    async fn concurrent_readers_never_observe_a_torn_cache() {
        let component = test_component(vec![Arc::new(AlwaysNormalChecker)], 5);
        component.health_check().await.unwrap();

        let mut set = tokio::task::JoinSet::new();
        for _ in 0..200 {
            let component = Arc::clone(&component);
            set.spawn(async move { component.last_info().is_some() });
        }
        while let Some(res) = set.join_next().await {
            assert!(res.unwrap());
        }
    }

    #[tokio::test]
    async fn event_driven_component_aggregates_whatever_the_filter_has_drained() {
        use crate::domain::models::EventRuleConfig;
        use std::collections::HashMap;

        let mut rules = HashMap::new();
        rules.insert(
            "SysOOM".to_string(),
            EventRuleConfig {
                name: "SysOOM".to_string(),
                description: "oom-kill".to_string(),
                regexp: "Out of memory".to_string(),
                level: crate::domain::models::Level::Critical,
                suggestion: String::new(),
                log_file: None,
            },
        );
        let filter = Arc::new(EventFilter::new(rules));
        filter.match_line("Out of memory: Kill process 1");

        let cfg = ComponentUserConfig::default();
        let component = Component::new_event_driven("Dmesg", "node-1", Arc::clone(&filter), cfg, FrequencyController::new());

        let result = component.health_check().await.unwrap();
        assert_eq!(result.checkers.len(), 1);
        assert_eq!(result.checkers[0].name, "SysOOM");
        assert_eq!(result.status, Status::Abnormal);

        // A second cycle with nothing new drained is empty/normal.
        let second = component.health_check().await.unwrap();
        assert_eq!(second.checkers.len(), 0);
        assert_eq!(second.status, Status::Normal);
    }
}
