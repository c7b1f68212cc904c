//! Asset route: source → output mapping.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::config::{AssetCategory, PipelineConfig, TaskKind};

/// Minification marker inserted before the final extension.
const MIN_MARKER: &str = ".min";

/// Route information for one source file of a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRoute {
    /// Source file path (absolute)
    pub source: PathBuf,
    /// Output file path (absolute, below the output root)
    pub output: PathBuf,
}

/// Insert the `.min` marker before the final extension.
///
/// - `main.css` → `main.min.css`
/// - `app.bundle.js` → `app.bundle.min.js`
/// - `jquery.min.js` → `jquery.min.min.js`
/// - `LICENSE` → `LICENSE.min`
///
/// Always inserting the marker keeps outputs distinct: `main.js` and a stale
/// `main.min.js` next to it never land on the same file.
pub fn min_file_name(path: &Path) -> PathBuf {
    let Some(stem) = path.file_stem() else {
        return path.to_path_buf();
    };

    let mut name = OsString::from(stem);
    name.push(MIN_MARKER);
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }
    path.with_file_name(name)
}

/// Enumerate a category's sources and compute their output paths.
///
/// The HTML category uses the configured document list instead of its glob.
pub fn scan_category(config: &PipelineConfig, category: AssetCategory) -> Result<Vec<AssetRoute>> {
    let paths = config.category(category);
    let root = config.root();

    if category.task_kind() == TaskKind::Html {
        return Ok(config
            .documents()
            .iter()
            .map(|doc| AssetRoute {
                source: root.join(doc),
                output: paths.dest.join(doc),
            })
            .collect());
    }

    let rename = matches!(category.task_kind(), TaskKind::Minify(_));
    let routes = paths
        .pattern
        .enumerate(root)?
        .into_iter()
        .filter(|source| !source.starts_with(config.output()))
        .filter_map(|source| {
            let output = paths.output_for(root, &source)?;
            let output = if rename { min_file_name(&output) } else { output };
            Some(AssetRoute { source, output })
        })
        .collect();
    Ok(routes)
}
