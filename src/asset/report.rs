//! Per-task results with isolated failures.

use std::path::PathBuf;

use crate::config::AssetCategory;
use crate::utils::plural_count;

/// One file or document that could not be produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    /// Source path (absolute)
    pub path: PathBuf,
    /// Error chain, `: `-joined
    pub message: String,
}

/// Outcome of one task invocation.
///
/// A task with failures still completed: failures are isolated per file and
/// never abort sibling files or sibling tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub category: AssetCategory,
    /// Output files written, in source order
    pub written: Vec<PathBuf>,
    pub failures: Vec<FileFailure>,
}

impl TaskReport {
    pub fn new(category: AssetCategory) -> Self {
        Self {
            category,
            written: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Fold per-file results in order.
    pub fn collect<I>(category: AssetCategory, results: I) -> Self
    where
        I: IntoIterator<Item = (PathBuf, anyhow::Result<PathBuf>)>,
    {
        let mut report = Self::new(category);
        for (source, result) in results {
            match result {
                Ok(output) => report.written.push(output),
                Err(err) => report.failures.push(FileFailure {
                    path: source,
                    message: format!("{err:#}"),
                }),
            }
        }
        report
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// `css: 3 files written, 1 failed`
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{}: {} written",
            self.category,
            plural_count(self.written.len(), "file")
        );
        if !self.failures.is_empty() {
            line.push_str(&format!(", {} failed", self.failures.len()));
        }
        line
    }
}
