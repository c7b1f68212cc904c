//! Build orchestration.
//!
//! A full build is a three-stage DAG:
//!
//! ```text
//! ┌──────────────────────┐
//! │ MaterializingOutput  │  ensure_output_root (create_dir, not recursive)
//! └──────────┬───────────┘
//!            ▼
//! ┌──────────────────────┐
//! │ RunningParallelTasks │  css · js · images · vendor · forms · scss (rayon)
//! └──────────┬───────────┘  all six settle before the next stage
//!            ▼
//! ┌──────────────────────┐
//! │ RewritingHtml        │  entry documents, .min references
//! └──────────┬───────────┘
//!            ▼
//!          Done
//! ```
//!
//! Isolated per-file failures are folded into [`TaskReport`]s and never move
//! the build to `Failed`; only fatal errors do.

#[cfg(test)]
mod tests;

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::Sender;
use rayon::prelude::*;
use thiserror::Error;

use crate::asset::{TaskReport, run_copy, run_transform};
use crate::config::{AssetCategory, PipelineConfig, TaskKind};
use crate::html::run_html;
use crate::utils::plural_count;
use crate::{debug, log};

// ============================================================================
// state
// ============================================================================

/// A stage of the full build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    MaterializingOutput,
    RunningParallelTasks,
    RewritingHtml,
}

/// Full build state machine.
///
/// `NotStarted → MaterializingOutput → RunningParallelTasks → RewritingHtml → Done`,
/// with `Failed` reachable from every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    NotStarted,
    MaterializingOutput,
    RunningParallelTasks,
    RewritingHtml,
    Done,
    /// Fatal error during the given stage
    Failed(BuildStage),
}

impl BuildState {
    /// The stage this state runs, if any.
    pub const fn stage(self) -> Option<BuildStage> {
        match self {
            Self::MaterializingOutput => Some(BuildStage::MaterializingOutput),
            Self::RunningParallelTasks => Some(BuildStage::RunningParallelTasks),
            Self::RewritingHtml => Some(BuildStage::RewritingHtml),
            Self::NotStarted | Self::Done | Self::Failed(_) => None,
        }
    }

    /// Whether `next` is a legal transition.
    pub fn can_advance_to(self, next: Self) -> bool {
        match (self, next) {
            (current, Self::Failed(stage)) => current.stage() == Some(stage),
            (Self::NotStarted | Self::Done | Self::Failed(_), Self::MaterializingOutput) => true,
            (Self::MaterializingOutput, Self::RunningParallelTasks)
            | (Self::RunningParallelTasks, Self::RewritingHtml)
            | (Self::RewritingHtml, Self::Done) => true,
            _ => false,
        }
    }
}

/// Progress notifications, in the order they happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    StateChanged(BuildState),
    TaskFinished {
        category: AssetCategory,
        written: usize,
        failed: usize,
    },
    DocumentWritten(PathBuf),
}

/// Fatal errors: the build stops and no later stage runs.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot create output root {}", .path.display())]
    OutputRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("output root {} exists but is not a directory", .0.display())]
    OutputNotDirectory(PathBuf),

    #[error("{category} task failed")]
    Task {
        category: AssetCategory,
        #[source]
        source: anyhow::Error,
    },
}

// ============================================================================
// summary
// ============================================================================

/// Reports of every task a full build ran.
#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub reports: Vec<TaskReport>,
    pub elapsed: Duration,
}

impl BuildSummary {
    #[cfg(test)]
    pub fn report(&self, category: AssetCategory) -> Option<&TaskReport> {
        self.reports.iter().find(|r| r.category == category)
    }

    pub fn written_count(&self) -> usize {
        self.reports.iter().map(|r| r.written.len()).sum()
    }

    pub fn failure_count(&self) -> usize {
        self.reports.iter().map(|r| r.failures.len()).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failure_count() == 0
    }
}

// ============================================================================
// pipeline
// ============================================================================

/// Runs single tasks and full builds against one immutable configuration.
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    events: Option<Sender<BuildEvent>>,
    state: BuildState,
}

impl Pipeline {
    pub fn new(config: Arc<PipelineConfig>) -> Self {
        Self {
            config,
            events: None,
            state: BuildState::NotStarted,
        }
    }

    /// Send [`BuildEvent`]s to `sender` as the build progresses.
    pub fn with_events(mut self, sender: Sender<BuildEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[cfg(test)]
    pub fn state(&self) -> BuildState {
        self.state
    }

    /// Create the output root if missing.
    ///
    /// Not recursive: the parent must already exist. An existing directory
    /// is not an error.
    pub fn ensure_output_root(&self) -> Result<(), PipelineError> {
        let output = self.config.output();
        match fs::create_dir(output) {
            Ok(()) => {
                debug!("build"; "created {}", self.config.display_path(output));
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                if output.is_dir() {
                    Ok(())
                } else {
                    Err(PipelineError::OutputNotDirectory(output.to_path_buf()))
                }
            }
            Err(source) => Err(PipelineError::OutputRoot {
                path: output.to_path_buf(),
                source,
            }),
        }
    }

    /// Run one category's task.
    ///
    /// Per-file failures are logged and returned in the report; the error
    /// case is reserved for failures that stop the whole task.
    pub fn run_task(&self, category: AssetCategory) -> Result<TaskReport, PipelineError> {
        let config = self.config.as_ref();
        let result = match category.task_kind() {
            TaskKind::Minify(kind) => run_transform(config, category, kind),
            TaskKind::Copy => run_copy(config, category),
            TaskKind::Html => run_html(config, |path| {
                self.emit(BuildEvent::DocumentWritten(path.to_path_buf()));
            }),
        };
        let report = result.map_err(|source| PipelineError::Task { category, source })?;

        for failure in &report.failures {
            log!("error"; "{}: {}: {}", category, self.config.display_path(&failure.path), failure.message);
        }
        debug!("build"; "{}", report.summary());
        self.emit(BuildEvent::TaskFinished {
            category,
            written: report.written.len(),
            failed: report.failures.len(),
        });
        Ok(report)
    }

    /// Run the six asset tasks concurrently and wait for all of them.
    ///
    /// Every task runs to completion even if a sibling hits a fatal error;
    /// the first fatal error in category order is returned.
    pub fn run_parallel_stage(&self) -> Result<Vec<TaskReport>, PipelineError> {
        let results: Vec<_> = AssetCategory::PARALLEL
            .par_iter()
            .map(|&category| self.run_task(category))
            .collect();
        results.into_iter().collect()
    }

    /// Rewrite and minify the entry documents.
    pub fn run_html(&self) -> Result<TaskReport, PipelineError> {
        self.run_task(AssetCategory::Html)
    }

    /// Materialize the output root, run all asset tasks, then the HTML rewrite.
    pub fn run_full_build(&mut self) -> Result<BuildSummary, PipelineError> {
        let started = Instant::now();
        match self.run_stages() {
            Ok(reports) => {
                self.set_state(BuildState::Done);
                let summary = BuildSummary {
                    reports,
                    elapsed: started.elapsed(),
                };
                log_summary(&summary);
                Ok(summary)
            }
            Err(err) => {
                if let Some(stage) = self.state.stage() {
                    self.set_state(BuildState::Failed(stage));
                }
                Err(err)
            }
        }
    }

    fn run_stages(&mut self) -> Result<Vec<TaskReport>, PipelineError> {
        self.set_state(BuildState::MaterializingOutput);
        self.ensure_output_root()?;

        self.set_state(BuildState::RunningParallelTasks);
        let mut reports = self.run_parallel_stage()?;

        self.set_state(BuildState::RewritingHtml);
        reports.push(self.run_html()?);
        Ok(reports)
    }

    fn set_state(&mut self, next: BuildState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal build transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!("build"; "{:?}", next);
        self.state = next;
        self.emit(BuildEvent::StateChanged(next));
    }

    fn emit(&self, event: BuildEvent) {
        if let Some(sender) = &self.events {
            // receiver gone: nobody is listening
            let _ = sender.send(event);
        }
    }
}

fn log_summary(summary: &BuildSummary) {
    let written = plural_count(summary.written_count(), "file");
    if summary.is_clean() {
        log!("build"; "done in {:.2?}, {} written", summary.elapsed, written);
    } else {
        log!(
            "build";
            "done in {:.2?}, {} written, {}",
            summary.elapsed,
            written,
            plural_count(summary.failure_count(), "failure")
        );
    }
}
