//! Transform tasks: minify every matching source and write it under its
//! `.min` name.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::config::{AssetCategory, PipelineConfig};
use crate::debug;

use super::minify::MinifyKind;
use super::report::TaskReport;
use super::route::{AssetRoute, scan_category};

/// Transformed bytes of one file plus where they go.
///
/// Lives only between minification and the write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformResult {
    pub output: PathBuf,
    pub bytes: Vec<u8>,
}

/// Run a transform task over every source of `category`.
///
/// Enumeration errors are fatal for the task; per-file errors are folded into
/// the report.
pub fn run_transform(
    config: &PipelineConfig,
    category: AssetCategory,
    kind: MinifyKind,
) -> Result<TaskReport> {
    let routes = scan_category(config, category)?;
    debug!(category.name(); "{} sources matching {}", routes.len(), config.category(category).pattern.as_str());
    if !routes.is_empty() {
        prepare_dest_dir(&config.category(category).dest)?;
    }

    let results: Vec<_> = routes
        .par_iter()
        .map(|route| (route.source.clone(), transform_file(route, kind)))
        .collect();

    Ok(TaskReport::collect(category, results))
}

/// Minify one file and write it. Returns the output path.
pub fn transform_file(route: &AssetRoute, kind: MinifyKind) -> Result<PathBuf> {
    let result = transform(route, kind)?;
    write_output(&result.output, &result.bytes)?;
    Ok(result.output)
}

/// Produce the transformed bytes without touching the output tree.
pub fn transform(route: &AssetRoute, kind: MinifyKind) -> Result<TransformResult> {
    let source = fs::read_to_string(&route.source)
        .with_context(|| format!("failed to read {}", route.source.display()))?;
    let minified = kind.minify(&source)?;
    Ok(TransformResult {
        output: route.output.clone(),
        bytes: minified.into_bytes(),
    })
}

/// Create a category's destination directory.
///
/// Failing here stops the whole task: no file of the category could be written.
pub(crate) fn prepare_dest_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("destination {} is not a usable directory", dir.display()))
}

/// Write bytes, creating parent directories below the output root.
pub(crate) fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}
