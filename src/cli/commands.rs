//! Command handlers, one function per subcommand, operating on the service
//! layer instead of printing inline.

use std::sync::Arc;

use anyhow::{Context, Result};
use comfy_table::Table;
use tracing::info;

use crate::components::{
    build_cpu_component, build_dmesg_component_from_reader, build_memory_component, build_nvidia_component,
    build_podlog_component,
};
use crate::domain::models::config::{ComponentSpecConfig, SpecConfig};
use crate::domain::models::{CycleResult, UserConfig, DEFAULT_ANNOTATION_KEY};
use crate::hangdetector::HangDetector;
use crate::notifier::{InMemoryOrchestratorClient, MockPodResourceMapper, Notifier, OrchestratorClient, PodResourceMapper};
use crate::runtime::component::ComponentRuntime;
use crate::runtime::{select_components, DaemonService, FrequencyController};

/// Fixed mock device list the `nvidia` component reports against. A real
/// deployment would enumerate this from NVML; spec.md's Non-goals exclude
/// that binding (§1), so this crate's `nvidia` component is permanently
/// mock-backed.
const MOCK_GPU_DEVICES: &[&str] = &["GPU-0", "GPU-1"];

fn spec_for(spec_config: &SpecConfig, name: &str) -> ComponentSpecConfig {
    spec_config.components.get(name).cloned().unwrap_or_default()
}

/// The components built from a selection, plus the `HangDetector` handles
/// among them — the daemon needs the latter separately to keep their pod
/// maps fresh (spec.md §4.4 point 4), since a `HangDetector` is just one
/// more `Checker` inside its `Component` otherwise.
#[derive(Default)]
pub struct BuiltComponents {
    pub components: Vec<Arc<dyn ComponentRuntime>>,
    pub hang_detectors: Vec<Arc<HangDetector>>,
}

/// Builds every component in `selected`, skipping (with a warning) any name
/// this crate has no builder for — an operator who enables an unsupported
/// component name gets a log line, not a crash.
pub async fn build_selected_components(
    selected: &[String],
    node: &str,
    user_config: &UserConfig,
    spec_config: &SpecConfig,
    frequency: &FrequencyController,
) -> BuiltComponents {
    let mut built = BuiltComponents::default();

    for name in selected {
        let component_config = user_config.component(name);
        match name.as_str() {
            "cpu" => {
                built.components.push(build_cpu_component(node, component_config, &spec_for(spec_config, name), frequency.clone()));
            }
            "memory" => {
                built
                    .components
                    .push(build_memory_component(node, component_config, &spec_for(spec_config, name), frequency.clone()));
            }
            "nvidia" => {
                let devices: Vec<String> = MOCK_GPU_DEVICES.iter().map(|d| (*d).to_string()).collect();
                let (component, hang_detector) =
                    build_nvidia_component(node, &devices, component_config, &spec_for(spec_config, name), frequency.clone());
                built.components.push(component);
                built.hang_detectors.push(hang_detector);
            }
            "dmesg" => {
                let rules = spec_for(spec_config, name).event_checkers;
                let (component, _reader) = if component_config.mock {
                    build_dmesg_component_from_reader(node, tokio::io::empty(), rules, false, component_config, frequency.clone())
                } else {
                    match crate::components::build_dmesg_component(node, "/dev/kmsg", rules, false, component_config, frequency.clone()).await {
                        Ok(built) => built,
                        Err(err) => {
                            tracing::warn!(component = "dmesg", error = %err, "failed to open /dev/kmsg, skipping component");
                            continue;
                        }
                    }
                };
                built.components.push(component);
            }
            "podlog" => {
                let rules = spec_for(spec_config, name).event_checkers;
                let source = Arc::new(crate::components::podlog::MockPodLogSource::new(Vec::new()));
                let (component, _scanner) =
                    build_podlog_component(node, rules, source, component_config.query_interval.into(), component_config, frequency.clone());
                built.components.push(component);
            }
            other => {
                tracing::warn!(component = other, "selected component has no builder in this crate, skipping");
            }
        }
    }

    built
}

/// `nodewatch run`: starts every selected component and blocks until a
/// shutdown signal arrives.
pub async fn handle_run(
    node: &str,
    user_config: UserConfig,
    spec_config: SpecConfig,
    enable: Vec<String>,
    ignore: Vec<String>,
) -> Result<()> {
    let frequency = FrequencyController::new();
    let selected = select_components(&user_config, &enable, &ignore);
    info!(?selected, "selected components for this run");

    let built = build_selected_components(&selected, node, &user_config, &spec_config, &frequency).await;

    // No real orchestrator/device-map client ships in this crate (spec.md
    // §1's "out of scope" collaborators); `run` talks to in-memory mocks of
    // both so the Notifier's set/append policy and the hang detector's pod
    // resolution are actually exercised end-to-end rather than unwired.
    let orchestrator: Arc<dyn OrchestratorClient> = Arc::new(InMemoryOrchestratorClient::new());
    let notifier = Arc::new(Notifier::new(orchestrator, node, DEFAULT_ANNOTATION_KEY));
    let pod_mapper: Arc<dyn PodResourceMapper> = Arc::new(MockPodResourceMapper::new());

    let mut daemon = DaemonService::new(node, notifier, pod_mapper);
    for component in built.components {
        daemon.register(component);
    }
    for hang_detector in built.hang_detectors {
        daemon.register_hang_detector(hang_detector);
    }
    daemon.start_all();
    let daemon = Arc::new(daemon);

    let dump_task = spawn_diagnostic_dump_listener(Arc::clone(&daemon));

    wait_for_shutdown_signal().await?;
    dump_task.abort();
    daemon.shutdown().await;
    Ok(())
}

/// Spawns the `SIGUSR1` listener that writes `DaemonService::diagnostic_dump`
/// to a tempfile in place of a goroutine-stack dump (spec.md §6). A no-op
/// task on non-Unix targets, since there is no `SIGUSR1` there.
#[cfg(unix)]
fn spawn_diagnostic_dump_listener(daemon: Arc<DaemonService>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        let Ok(mut usr1) = signal(SignalKind::user_defined1()) else {
            tracing::warn!("failed to install SIGUSR1 handler, diagnostic dump on signal disabled");
            return;
        };
        loop {
            usr1.recv().await;
            let dump = daemon.diagnostic_dump();
            match tempfile_write(&dump) {
                Ok(path) => info!(path = %path.display(), "wrote diagnostic dump on SIGUSR1"),
                Err(err) => tracing::warn!(error = %err, "failed to write diagnostic dump"),
            }
        }
    })
}

#[cfg(not(unix))]
fn spawn_diagnostic_dump_listener(_daemon: Arc<DaemonService>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async {})
}

#[cfg(unix)]
fn tempfile_write(contents: &str) -> std::io::Result<std::path::PathBuf> {
    use std::io::Write;
    let path = std::env::temp_dir().join(format!("nodewatch-diagnostic-{}.txt", std::process::id()));
    let mut file = std::fs::File::create(&path)?;
    file.write_all(contents.as_bytes())?;
    Ok(path)
}

/// `nodewatch check <component>`: runs one component's health check once.
pub async fn handle_check(
    node: &str,
    user_config: UserConfig,
    spec_config: SpecConfig,
    component_name: &str,
) -> Result<()> {
    let frequency = FrequencyController::new();
    let built = build_selected_components(&[component_name.to_string()], node, &user_config, &spec_config, &frequency).await;
    let component = built
        .components
        .into_iter()
        .next()
        .with_context(|| format!("no such component: {component_name}"))?;

    let result = component.health_check().await.context("health check failed")?;
    print_result_table(&[result]);
    Ok(())
}

/// `nodewatch all`: runs every selected component's health check once.
pub async fn handle_all(
    node: &str,
    user_config: UserConfig,
    spec_config: SpecConfig,
    enable: Vec<String>,
    ignore: Vec<String>,
) -> Result<()> {
    let frequency = FrequencyController::new();
    let selected = select_components(&user_config, &enable, &ignore);
    let built = build_selected_components(&selected, node, &user_config, &spec_config, &frequency).await;

    let mut results = Vec::with_capacity(built.components.len());
    for component in &built.components {
        results.push(component.health_check().await.context("health check failed")?);
    }
    print_result_table(&results);
    Ok(())
}

pub fn handle_version() {
    println!("nodewatch {}", env!("CARGO_PKG_VERSION"));
}

fn print_result_table(results: &[CycleResult]) {
    let mut table = Table::new();
    table.set_header(vec!["component", "status", "level", "checkers", "abnormal"]);
    for result in results {
        let abnormal: Vec<&str> = result.abnormal_checkers().map(|c| c.name.as_str()).collect();
        table.add_row(vec![
            result.item.clone(),
            result.status.to_string(),
            result.level.to_string(),
            result.checkers.len().to_string(),
            if abnormal.is_empty() { "-".to_string() } else { abnormal.join(",") },
        ]);
    }
    println!("{table}");
}

/// Waits for `SIGINT` or `SIGTERM` (spec.md §6 "process-wide signals").
/// `SIGPIPE` is installed and drained for the life of the process so a
/// closed stdout pipe (e.g. `nodewatchd run | head`) logs rather than kills
/// the daemon.
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;
        let mut sigterm = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
        let mut sigpipe = signal(SignalKind::pipe()).context("failed to install SIGPIPE handler")?;
        tokio::spawn(async move {
            loop {
                sigpipe.recv().await;
            }
        });
        tokio::select! {
            _ = sigint.recv() => info!("received SIGINT"),
            _ = sigterm.recv() => info!("received SIGTERM"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.context("failed to install ctrl-c handler")?;
        info!("received ctrl-c");
    }
    Ok(())
}
