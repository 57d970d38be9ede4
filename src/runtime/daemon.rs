use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::models::config::RESERVED_USER_CONFIG_KEYS;
use crate::domain::models::{CycleResult, UserConfig};
use crate::hangdetector::HangDetector;
use crate::metrics::MetricsRegistry;
use crate::notifier::pod_mapper::PodResourceMapper;
use crate::notifier::Notifier;
use crate::runtime::component::ComponentRuntime;

/// How often the daemon polls the external `PodResourceMapper` to refresh
/// every registered `HangDetector`'s device→pod cache (spec.md §4.4 point 4,
/// §6 "availability is optional").
const POD_MAP_REFRESH_INTERVAL: Duration = Duration::from_secs(15);

/// Bounded wait for a dispatch/poll task to exit on shutdown, matching the
/// 2-second cancellation budget spec.md §5 gives every other long operation.
const DISPATCH_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// One registered component plus the handle needed to stop it.
struct Registered {
    component: Arc<dyn ComponentRuntime>,
}

/// Owns the process's set of running components: instantiates the enabled
/// subset from config, starts each one's scheduler loop, routes its
/// forwarded results into the `Notifier` and `MetricsRegistry` (spec.md
/// §4.6 "spawn one monitor task per component, route its result channel
/// into the Notifier"; §2 "Scheduler → Notifier + Metrics"), keeps every
/// registered `HangDetector`'s pod map fresh, and fans shutdown out to all
/// of them concurrently.
///
/// Platform-unavailable filtering (e.g. skipping Nvidia-derived components
/// when no GPU is present) is the caller's job at registration time — the
/// component list passed to `DaemonService::new` is assumed already filtered
/// to what this host can run; `select_components` below implements only the
/// enable/auto-detect/ignore set arithmetic, which is platform-independent.
pub struct DaemonService {
    node: String,
    registered: Vec<Registered>,
    notifier: Arc<Notifier>,
    metrics: Arc<MetricsRegistry>,
    pod_mapper: Arc<dyn PodResourceMapper>,
    hang_detectors: Mutex<Vec<Arc<HangDetector>>>,
    dispatch_tasks: Mutex<Vec<JoinHandle<()>>>,
    pod_map_task: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl DaemonService {
    pub fn new(node: impl Into<String>, notifier: Arc<Notifier>, pod_mapper: Arc<dyn PodResourceMapper>) -> Self {
        Self {
            node: node.into(),
            registered: Vec::new(),
            notifier,
            metrics: Arc::new(MetricsRegistry::new()),
            pod_mapper,
            hang_detectors: Mutex::new(Vec::new()),
            dispatch_tasks: Mutex::new(Vec::new()),
            pod_map_task: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    /// Registers a component without starting it. Idempotent call order
    /// doesn't matter; `start_all` starts every registered component.
    pub fn register(&mut self, component: Arc<dyn ComponentRuntime>) {
        self.registered.push(Registered { component });
    }

    /// Registers a `HangDetector` whose device→pod cache this daemon keeps
    /// fresh by polling `pod_mapper` on a schedule, so its abnormal results
    /// carry resolved pod identity and respect `ignore_namespaces` (spec.md
    /// §4.4 point 4) even outside of tests that drive `refresh_pod_map`
    /// directly. Must be called before `start_all`.
    pub fn register_hang_detector(&self, detector: Arc<HangDetector>) {
        self.hang_detectors.lock().push(detector);
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Starts every registered component's scheduler loop, spawns one
    /// dispatch task per component that drains its forwarded (critical/
    /// fatal) results into the `Notifier` and the metrics registry, and —
    /// if any `HangDetector`s were registered — one shared task that polls
    /// the `PodResourceMapper` on `POD_MAP_REFRESH_INTERVAL`.
    pub fn start_all(&self) {
        let mut dispatch_tasks = self.dispatch_tasks.lock();
        for entry in &self.registered {
            let receiver = Arc::clone(&entry.component).start();
            info!(component = entry.component.name(), node = %self.node, "component started");
            dispatch_tasks.push(self.spawn_dispatch_task(entry.component.name().to_string(), receiver));
        }
        drop(dispatch_tasks);

        if !self.hang_detectors.lock().is_empty() {
            *self.pod_map_task.lock() = Some(self.spawn_pod_map_poll_task());
        }
    }

    /// Drains `receiver` until cancelled: every forwarded result is recorded
    /// in the metrics registry and handed to `Notifier::notify`, which
    /// applies the §4.5 set/append dispatch policy. A lagged receiver logs
    /// and keeps draining rather than stalling the component's producer
    /// side, matching spec.md §5's non-blocking-producer requirement.
    fn spawn_dispatch_task(&self, component: String, mut receiver: broadcast::Receiver<CycleResult>) -> JoinHandle<()> {
        let notifier = Arc::clone(&self.notifier);
        let metrics = Arc::clone(&self.metrics);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    received = receiver.recv() => match received {
                        Ok(result) => {
                            metrics.record(&result);
                            if let Err(err) = notifier.notify(&component, &result).await {
                                warn!(component = %component, error = %err, "failed to notify orchestrator");
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(component = %component, skipped, "dispatch task fell behind, results dropped");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        })
    }

    /// Snapshots the currently-registered hang detectors and refreshes each
    /// one's pod map on every tick until cancelled.
    fn spawn_pod_map_poll_task(&self) -> JoinHandle<()> {
        let pod_mapper = Arc::clone(&self.pod_mapper);
        let detectors: Vec<Arc<HangDetector>> = self.hang_detectors.lock().clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(POD_MAP_REFRESH_INTERVAL);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        for detector in &detectors {
                            detector.refresh_pod_map(pod_mapper.as_ref()).await;
                        }
                    }
                }
            }
        })
    }

    pub fn component(&self, name: &str) -> Option<Arc<dyn ComponentRuntime>> {
        self.registered
            .iter()
            .find(|r| r.component.name() == name)
            .map(|r| Arc::clone(&r.component))
    }

    pub fn components(&self) -> impl Iterator<Item = &Arc<dyn ComponentRuntime>> {
        self.registered.iter().map(|r| &r.component)
    }

    /// Aggregate status: `true` only if every component's scheduler loop is
    /// currently running.
    pub fn status(&self) -> bool {
        self.registered.iter().all(|r| r.component.status())
    }

    /// A forwarded-result receiver for `name`, if that component has been
    /// started. Each call subscribes freshly (broadcast channel semantics).
    pub fn subscribe(&self, name: &str) -> Option<broadcast::Receiver<CycleResult>> {
        self.registered
            .iter()
            .find(|r| r.component.name() == name)
            .map(|r| Arc::clone(&r.component).start())
    }

    /// Cancels every component's loop and every dispatch/poll task
    /// concurrently, and waits (bounded) for all of them to exit.
    pub async fn shutdown(&self) {
        info!(node = %self.node, "shutdown requested, stopping all components");
        self.cancel.cancel();

        let stops = self.registered.iter().map(|r| r.component.stop());
        futures::future::join_all(stops).await;

        let tasks = std::mem::take(&mut *self.dispatch_tasks.lock());
        for task in tasks {
            if tokio::time::timeout(DISPATCH_SHUTDOWN_TIMEOUT, task).await.is_err() {
                warn!(node = %self.node, "timed out waiting for a dispatch task to stop");
            }
        }
        if let Some(task) = self.pod_map_task.lock().take() {
            if tokio::time::timeout(DISPATCH_SHUTDOWN_TIMEOUT, task).await.is_err() {
                warn!(node = %self.node, "timed out waiting for the pod map poll task to stop");
            }
        }
        info!(node = %self.node, "all components stopped");
    }

    /// A `SIGUSR1`-style diagnostic dump: active component names and their
    /// current cache occupancy, in place of a goroutine-stack dump (spec.md
    /// §6 "USR1 dumps goroutine stacks").
    pub fn diagnostic_dump(&self) -> String {
        let mut out = format!("node={}\n", self.node);
        for entry in &self.registered {
            out.push_str(&format!(
                "component={} running={} cached_results={}\n",
                entry.component.name(),
                entry.component.status(),
                entry.component.cache_results().len(),
            ));
        }
        out
    }
}

/// Implements spec.md §4.6's component selection arithmetic:
/// `(enable_list ∪ auto_detected_keys) − ignore_list`, where
/// `auto_detected_keys` is every top-level key in the user config except
/// `RESERVED_USER_CONFIG_KEYS`. Platform-unavailable filtering happens
/// separately, by the caller, after this set is computed.
pub fn select_components(
    user_config: &UserConfig,
    enable_list: &[String],
    ignore_list: &[String],
) -> Vec<String> {
    let mut selected: HashSet<String> = enable_list.iter().cloned().collect();
    selected.extend(user_config.discovered_components());

    let ignored: HashSet<&str> = ignore_list.iter().map(String::as_str).collect();
    let mut result: Vec<String> = selected
        .into_iter()
        .filter(|name| !ignored.contains(name.as_str()) && !RESERVED_USER_CONFIG_KEYS.contains(&name.as_str()))
        .collect();
    result.sort();
    result
}
