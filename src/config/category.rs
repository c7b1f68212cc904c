//! Asset categories and the category → paths table.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::asset::SourcePattern;
use crate::asset::minify::MinifyKind;

/// One class of source file with its own glob and destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    Html,
    Css,
    Js,
    Images,
    Vendor,
    Forms,
    Scss,
}

/// What a category's task does with each matched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Minify and insert the `.min` marker.
    Minify(MinifyKind),
    /// Copy bytes unchanged.
    Copy,
    /// Rewrite references, then minify the document.
    Html,
}

impl AssetCategory {
    /// All categories, in table order.
    pub const ALL: [Self; 7] = [
        Self::Html,
        Self::Css,
        Self::Js,
        Self::Images,
        Self::Vendor,
        Self::Forms,
        Self::Scss,
    ];

    /// Categories run concurrently in the second build stage.
    pub const PARALLEL: [Self; 6] = [
        Self::Css,
        Self::Js,
        Self::Images,
        Self::Vendor,
        Self::Forms,
        Self::Scss,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Css => "css",
            Self::Js => "js",
            Self::Images => "images",
            Self::Vendor => "vendor",
            Self::Forms => "forms",
            Self::Scss => "scss",
        }
    }

    pub const fn task_kind(self) -> TaskKind {
        match self {
            Self::Html => TaskKind::Html,
            Self::Css => TaskKind::Minify(MinifyKind::Css),
            Self::Js => TaskKind::Minify(MinifyKind::Js),
            Self::Images | Self::Vendor | Self::Forms | Self::Scss => TaskKind::Copy,
        }
    }

    /// Built-in `(source glob, destination)` used when the config file
    /// does not override the category. The destination is relative to the
    /// output root.
    pub const fn default_paths(self) -> (&'static str, &'static str) {
        match self {
            Self::Html => ("*.html", ""),
            Self::Css => ("assets/css/**/*.css", "assets/css"),
            Self::Js => ("assets/js/**/*.js", "assets/js"),
            Self::Images => ("assets/img/**/*", "assets/img"),
            Self::Vendor => ("assets/vendor/**/*", "assets/vendor"),
            Self::Forms => ("forms/**/*", "forms"),
            Self::Scss => ("assets/scss/**/*", "assets/scss"),
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolved source pattern and destination of one category.
#[derive(Debug, Clone)]
pub struct CategoryPaths {
    pub category: AssetCategory,
    pub pattern: SourcePattern,
    /// Absolute destination directory (always below the output root).
    pub dest: PathBuf,
}

impl CategoryPaths {
    /// Output location for a source file, keeping its structure below the
    /// pattern's base directory. `None` if the file does not match.
    pub fn output_for(&self, root: &Path, source: &Path) -> Option<PathBuf> {
        self.pattern
            .match_path(root, source)
            .map(|relative| self.dest.join(relative))
    }
}

/// Immutable category → paths table.
///
/// Holds exactly one entry per [`AssetCategory`], so lookups cannot miss.
#[derive(Debug, Clone)]
pub struct PathMap {
    entries: Vec<CategoryPaths>,
}

impl PathMap {
    /// Build the table from one entry per category, in any order.
    pub(super) fn new(mut entries: Vec<CategoryPaths>) -> Self {
        entries.sort_by_key(|e| e.category);
        debug_assert!(
            entries
                .iter()
                .map(|e| e.category)
                .eq(AssetCategory::ALL.into_iter()),
            "path map must hold every category exactly once"
        );
        Self { entries }
    }

    pub fn get(&self, category: AssetCategory) -> &CategoryPaths {
        &self.entries[category.index()]
    }

    /// Find the category whose pattern matches `path`.
    ///
    /// Paths under the output root never match. First match in table order wins.
    pub fn categorize(&self, root: &Path, output: &Path, path: &Path) -> Option<AssetCategory> {
        if path.starts_with(output) {
            return None;
        }
        self.entries
            .iter()
            .find(|e| e.pattern.match_path(root, path).is_some())
            .map(|e| e.category)
    }
}
