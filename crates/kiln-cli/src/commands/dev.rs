//! `kiln dev`: build, serve and rebuild on change.
//!
//! 1. Resolve the configuration and bind the server address
//! 2. Initial build (a failure is shown in the browser, not fatal)
//! 3. Watch the project and serve the output directory
//! 4. Rebuild on changes, one build at a time; changes that arrive during a
//!    build queue exactly one follow-up build
//! 5. Ctrl+C aborts any running build (killing the compiler) and exits

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use kiln_config::BuildConfig;
use kiln_pipeline::native::NativeCompiler;
use kiln_pipeline::{NativeOutcome, Pipeline};
use path_clean::PathClean;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::cli::DevArgs;
use crate::config::{self, Overrides};
use crate::dev::{
    DevEvent, DevServer, DevServerState, FileChange, FileWatcher, SharedState, compose,
    default_chain,
};
use crate::error::{CliError, Result};
use crate::ui;

/// Same-path events closer than this are collapsed by the watcher.
const DEBOUNCE: Duration = Duration::from_millis(100);
/// Quiet period after a change before a rebuild starts.
const SETTLE: Duration = Duration::from_millis(150);

pub async fn execute(args: DevArgs) -> Result<()> {
    let overrides = Overrides {
        host: args.host,
        port: args.port,
        open: args.open,
        ..Default::default()
    };
    let config = config::load(&args.project, &overrides)?;

    ui::info("Starting development server...");
    ui::info(&format!("Project root: {}", config.root.display()));

    let state: SharedState = Arc::new(DevServerState::new(config.output_dir.clone()));
    let chain = compose(&default_chain(&state), &config.dev_server.custom_routes);
    if !config.dev_server.custom_routes.is_empty() {
        ui::info(&format!(
            "{} custom route(s) registered",
            config.dev_server.custom_routes.len()
        ));
    }

    let server = DevServer::new(config.dev_server.addr(), chain);
    let listener = server.bind().await?;
    let url = config.dev_server.url();
    let auto_open = config.dev_server.auto_open;
    let (roots, ignored) = watch_scope(&config);
    let pipeline = Arc::new(Pipeline::new(config));

    ui::info("Performing initial build...");
    tokio::select! {
        _ = rebuild(&pipeline, &state) => {}
        _ = signal::ctrl_c() => {
            ui::info("Interrupted during initial build");
            return Ok(());
        }
    }

    let (watcher, mut changes) = FileWatcher::new(roots, ignored, DEBOUNCE)?;
    for root in watcher.roots() {
        ui::info(&format!("Watching for changes in: {}", root.display()));
    }

    let mut server_handle = tokio::spawn(server.serve(listener));
    ui::success(&format!("Development server running at {url}"));
    if auto_open {
        open_browser(&url);
    }
    ui::info("Press Ctrl+C to stop");

    let mut running: Option<JoinHandle<()>> = None;
    let mut pending = false;

    let outcome = loop {
        tokio::select! {
            Some(change) = changes.recv() => {
                ui::info(&format!("File changed: {}", change.path().display()));
                settle(&mut changes).await;
                if running.as_ref().is_some_and(|task| !task.is_finished()) {
                    pending = true;
                } else {
                    running = Some(spawn_rebuild(&pipeline, &state));
                }
            }

            _ = finished(&mut running), if running.is_some() => {
                running = None;
                if std::mem::take(&mut pending) {
                    running = Some(spawn_rebuild(&pipeline, &state));
                }
            }

            _ = signal::ctrl_c() => {
                ui::info("Shutting down development server...");
                break Ok(());
            }

            result = &mut server_handle => {
                break match result {
                    Ok(Ok(())) => Err(CliError::Server("server stopped unexpectedly".to_string())),
                    Ok(Err(e)) => Err(e),
                    Err(e) => Err(CliError::Server(e.to_string())),
                };
            }
        }
    };

    if let Some(task) = running.take() {
        // Dropping the build future kills the compiler process
        task.abort();
        let _ = task.await;
    }
    server_handle.abort();
    drop(watcher);

    if outcome.is_ok() {
        ui::success("Development server stopped");
    }
    outcome
}

/// Run one pass and publish the outcome to the server state and browsers.
///
/// Returns whether the pass succeeded. A failure leaves the last good output
/// in place.
pub async fn rebuild(pipeline: &Pipeline, state: &DevServerState) -> bool {
    state.start_build();
    state.broadcast(&DevEvent::BuildStarted).await;

    match pipeline.run().await {
        Ok(report) => {
            let duration_ms = report.duration.as_millis() as u64;
            state.complete_build(duration_ms);

            let native = match report.native {
                NativeOutcome::Cached => "native module cached".to_string(),
                NativeOutcome::Built { duration } => {
                    format!("native module built in {}", ui::format_duration(duration))
                }
            };
            ui::success(&format!(
                "Build completed in {} ({native})",
                ui::format_duration(report.duration)
            ));

            state
                .broadcast(&DevEvent::BuildCompleted { duration_ms })
                .await;
            true
        }
        Err(e) => {
            let error = e.to_string();
            state.fail_build(error.clone());
            ui::error(&format!("Build failed: {error}"));
            state.broadcast(&DevEvent::BuildFailed { error }).await;
            false
        }
    }
}

fn spawn_rebuild(pipeline: &Arc<Pipeline>, state: &SharedState) -> JoinHandle<()> {
    let pipeline = Arc::clone(pipeline);
    let state = Arc::clone(state);
    tokio::spawn(async move {
        rebuild(&pipeline, &state).await;
    })
}

async fn finished(task: &mut Option<JoinHandle<()>>) {
    if let Some(task) = task {
        if let Err(e) = task.await {
            if e.is_panic() {
                ui::error("Rebuild task panicked");
            }
        }
    }
}

/// Swallow the burst of events that usually follows a save.
async fn settle(changes: &mut mpsc::Receiver<FileChange>) {
    while let Ok(Some(change)) = tokio::time::timeout(SETTLE, changes.recv()).await {
        tracing::trace!(path = %change.path().display(), "coalesced change");
    }
}

/// Directories to watch and build outputs to ignore.
pub fn watch_scope(config: &BuildConfig) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut roots = vec![config.root.clone()];
    for dir in std::iter::once(&config.native_crate_dir).chain(&config.native_watch_dirs) {
        if !roots.iter().any(|root| dir.starts_with(root)) && dir.is_dir() {
            roots.push(dir.clone());
        }
    }

    let native_out = NativeCompiler::new(config.native_tool.clone())
        .out_dir(&config.native_crate_dir)
        .clean();
    let ignored = vec![
        config.output_dir.clone(),
        config.native_crate_dir.join("target"),
        native_out,
    ];

    (roots, ignored)
}

/// Open the server URL in the default browser.
fn open_browser(url: &str) {
    use std::process::Command;

    let result = if cfg!(target_os = "macos") {
        Command::new("open").arg(url).spawn()
    } else if cfg!(target_os = "windows") {
        Command::new("cmd").args(["/C", "start", url]).spawn()
    } else {
        Command::new("xdg-open").arg(url).spawn()
    };

    match result {
        Ok(_) => ui::info(&format!("Opened browser at {url}")),
        Err(e) => ui::warning(&format!("Failed to open browser: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_config::{ConfigResolver, RawConfig};
    use tempfile::TempDir;

    #[test]
    fn scope_ignores_every_build_output() {
        let dir = TempDir::new().unwrap();
        let shared = TempDir::new().unwrap();
        let raw = RawConfig {
            entry_point: Some("js/index.js".into()),
            native_watch_dirs: vec![shared.path().to_path_buf(), "proto".into()],
            ..Default::default()
        };
        let config = ConfigResolver::new(dir.path())
            .with_env_lookup(|_| None)
            .resolve(raw)
            .unwrap();

        let (roots, ignored) = watch_scope(&config);
        assert_eq!(roots, vec![dir.path().to_path_buf(), shared.path().to_path_buf()]);
        assert!(ignored.contains(&config.output_dir));
        assert!(ignored.contains(&dir.path().join("target")));
        assert!(ignored.contains(&dir.path().join("pkg")));
    }
}
