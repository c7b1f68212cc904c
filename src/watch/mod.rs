//! Watch mode.
//!
//! ```text
//! notify watcher ──▶ classify ──▶ Receiver<ChangeEvent> ──▶ dispatcher ──▶ Pipeline::run_task
//!  (base dirs)     (category,        (crossbeam)          (drain queue,
//!                   filters)                               dedupe by category)
//! ```
//!
//! Only the changed category's task is re-run. The output root is assumed to
//! exist (initial build) and is never re-materialized here.

use std::collections::BTreeMap;
use std::iter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use crossbeam::channel::{self, Receiver};
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::{AssetCategory, PipelineConfig};
use crate::logger::{is_verbose, status_detach, status_error, status_success};
use crate::pipeline::Pipeline;
use crate::{debug, log};

/// A source file of a watched category changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub category: AssetCategory,
    pub path: PathBuf,
}

/// Live watcher plus the stream of change events it produces.
///
/// Dropping the registration stops watching and closes the stream.
pub struct WatchRegistration {
    _watcher: RecommendedWatcher,
    events: Receiver<ChangeEvent>,
}

impl WatchRegistration {
    /// Start watching the base directory of every watched category.
    ///
    /// Events buffer in the channel until the dispatcher reads them, so the
    /// registration can be made before the initial build.
    pub fn register(config: Arc<PipelineConfig>) -> Result<Self> {
        let (tx, rx) = channel::unbounded();
        let handler_config = Arc::clone(&config);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for change in classify(&handler_config, &event) {
                    let _ = tx.send(change);
                }
            }
            Err(err) => log!("watch"; "notify error: {}", err),
        })
        .context("failed to create file watcher")?;

        for (dir, mode) in watch_targets(&config) {
            if !dir.is_dir() {
                log!("warning"; "not watching {}: directory missing", config.display_path(&dir));
                continue;
            }
            watcher
                .watch(&dir, mode)
                .with_context(|| format!("failed to watch {}", dir.display()))?;
            debug!("watch"; "watching {} ({:?})", dir.display(), mode);
        }

        Ok(Self {
            _watcher: watcher,
            events: rx,
        })
    }

    pub fn events(&self) -> &Receiver<ChangeEvent> {
        &self.events
    }
}

/// Directories to watch: one per distinct base directory, recursive if any
/// pattern rooted there uses `**`.
fn watch_targets(config: &PipelineConfig) -> Vec<(PathBuf, RecursiveMode)> {
    let mut dirs: BTreeMap<PathBuf, bool> = BTreeMap::new();
    for &category in config.watch_categories() {
        let pattern = &config.category(category).pattern;
        *dirs.entry(config.root().join(pattern.base())).or_default() |= pattern.is_recursive();
    }
    dirs.into_iter()
        .map(|(dir, recursive)| {
            let mode = if recursive {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };
            (dir, mode)
        })
        .collect()
}

/// Check if path is a temp/backup file (editor artifacts)
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// Turn a raw notify event into change events for watched categories.
///
/// Access and metadata-only events are ignored, as are editor temp files and
/// anything under the output root.
fn classify(config: &PipelineConfig, event: &Event) -> Vec<ChangeEvent> {
    match event.kind {
        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Any => {}
        EventKind::Modify(ModifyKind::Metadata(_)) => return Vec::new(),
        EventKind::Modify(_) => {}
        EventKind::Access(_) | EventKind::Other => return Vec::new(),
    }

    event
        .paths
        .iter()
        .filter(|path| !is_temp_file(path))
        .filter_map(|path| {
            let category = config
                .paths()
                .categorize(config.root(), config.output(), path)?;
            config
                .watch_categories()
                .contains(&category)
                .then(|| ChangeEvent {
                    category,
                    path: path.clone(),
                })
        })
        .collect()
}

/// Group events by category, dropping duplicates.
///
/// HTML runs last so a batch that also touched CSS or JS rewrites against
/// fresh outputs.
fn coalesce(events: impl IntoIterator<Item = ChangeEvent>) -> Vec<(AssetCategory, Vec<PathBuf>)> {
    let mut grouped: BTreeMap<AssetCategory, Vec<PathBuf>> = BTreeMap::new();
    for event in events {
        let paths = grouped.entry(event.category).or_default();
        if !paths.contains(&event.path) {
            paths.push(event.path);
        }
    }
    let mut batch: Vec<_> = grouped.into_iter().collect();
    batch.sort_by_key(|(category, _)| *category == AssetCategory::Html);
    batch
}

// ============================================================================
// dispatcher
// ============================================================================

/// Install the Ctrl+C handler. The returned channel fires once on interrupt.
pub fn setup_shutdown_handler() -> Result<Receiver<()>> {
    let (tx, rx) = channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    })
    .map_err(|e| anyhow!("failed to set Ctrl+C handler: {}", e))?;
    Ok(rx)
}

/// Re-run single tasks as change events arrive, until Ctrl+C.
pub fn run_dispatcher(pipeline: &Pipeline, registration: &WatchRegistration, shutdown: &Receiver<()>) {
    let events = registration.events();
    log!("watch"; "watching for changes, press Ctrl+C to stop");

    loop {
        crossbeam::select! {
            recv(events) -> msg => match msg {
                Ok(first) => {
                    let batch = coalesce(iter::once(first).chain(events.try_iter()));
                    for (category, paths) in batch {
                        dispatch(pipeline, category, &paths);
                    }
                }
                Err(_) => break,
            },
            recv(shutdown) -> _ => {
                status_detach();
                log!("watch"; "stopped");
                break;
            }
        }
    }
}

fn dispatch(pipeline: &Pipeline, category: AssetCategory, paths: &[PathBuf]) {
    for path in paths {
        debug!("watch"; "{}: {}", category, pipeline.config().display_path(path));
    }

    let result = pipeline.run_task(category);
    // log lines printed above must survive the status overwrite
    if is_verbose() || result.as_ref().map_or(true, |report| !report.is_clean()) {
        status_detach();
    }

    match result {
        Ok(report) if report.is_clean() => status_success(&report.summary()),
        Ok(report) => status_error(&report.summary(), ""),
        Err(err) => status_error(&format!("{:#}", anyhow::Error::new(err)), ""),
    }
}
