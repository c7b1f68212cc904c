//! Pipeline configuration management for `sitedist.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── category   # AssetCategory, PathMap (category → source glob + destination)
//! ├── error      # ConfigError, ConfigDiagnostics
//! ├── util       # config discovery and path helpers
//! └── mod.rs     # ConfigFile (raw TOML) and PipelineConfig (this file)
//! ```
//!
//! # Example
//!
//! ```toml
//! output = "dist"                       # Output root (relative to project root)
//!
//! [paths.css]                           # Override one category
//! src = "styles/**/*.css"
//! dest = "dist/css"
//!
//! [html]
//! documents = ["index.html", "about.html"]
//! rewrite = [
//!     { from = "assets/css/main.css", to = "assets/css/main.min.css" },
//! ]
//!
//! [watch]
//! categories = ["css", "js", "html", "images"]
//! ```
//!
//! Every key is optional; a missing file means the built-in defaults.

mod category;
mod error;
mod util;

pub use category::{AssetCategory, CategoryPaths, PathMap, TaskKind};
pub use error::{ConfigDiagnostics, ConfigError};

use crate::{cli::Cli, debug, log};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use util::{clean_path, find_config_file, has_parent_dir};

use crate::asset::SourcePattern;

const DEFAULT_OUTPUT: &str = "dist";

// ============================================================================
// raw configuration file
// ============================================================================

/// Root structure of `sitedist.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Output root directory (relative to project root)
    pub output: Option<PathBuf>,

    /// Per-category overrides
    pub paths: PathsSection,

    /// HTML entry documents and reference rewrites
    pub html: HtmlSection,

    /// Watch mode settings
    pub watch: WatchSection,
}

/// `[paths.<category>]` overrides. Unset categories keep their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub html: Option<CategoryEntry>,
    pub css: Option<CategoryEntry>,
    pub js: Option<CategoryEntry>,
    pub images: Option<CategoryEntry>,
    pub vendor: Option<CategoryEntry>,
    pub forms: Option<CategoryEntry>,
    pub scss: Option<CategoryEntry>,
}

impl PathsSection {
    fn entry(&self, category: AssetCategory) -> Option<&CategoryEntry> {
        match category {
            AssetCategory::Html => self.html.as_ref(),
            AssetCategory::Css => self.css.as_ref(),
            AssetCategory::Js => self.js.as_ref(),
            AssetCategory::Images => self.images.as_ref(),
            AssetCategory::Vendor => self.vendor.as_ref(),
            AssetCategory::Forms => self.forms.as_ref(),
            AssetCategory::Scss => self.scss.as_ref(),
        }
    }
}

/// Source glob and destination directory, both relative to the project root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub src: String,
    pub dest: PathBuf,
}

/// `[html]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HtmlSection {
    /// Entry documents, relative to the project root. Not discovered by glob:
    /// a new page must be added here.
    pub documents: Vec<PathBuf>,

    /// Literal substring replacements applied before minification.
    pub rewrite: Vec<RewriteRule>,
}

impl Default for HtmlSection {
    fn default() -> Self {
        Self {
            documents: vec![
                "index.html".into(),
                "portfolio-details.html".into(),
                "service-details.html".into(),
                "starter-page.html".into(),
            ],
            rewrite: vec![
                RewriteRule::new("assets/css/main.css", "assets/css/main.min.css"),
                RewriteRule::new("assets/js/main.js", "assets/js/main.min.js"),
            ],
        }
    }
}

/// Replace every occurrence of `from` with `to`.
///
/// Plain substring replacement: it also hits comments, inline scripts and any
/// attribute that happens to contain `from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRule {
    pub from: String,
    pub to: String,
}

impl RewriteRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// `[watch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSection {
    /// Categories whose changes re-run their task.
    pub categories: Vec<AssetCategory>,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            categories: vec![
                AssetCategory::Css,
                AssetCategory::Js,
                AssetCategory::Html,
                AssetCategory::Images,
            ],
        }
    }
}

// ============================================================================
// resolved configuration
// ============================================================================

/// Validated, immutable pipeline configuration.
///
/// Built once at startup and shared by every task (`Arc<PipelineConfig>`).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    root: PathBuf,
    output: PathBuf,
    paths: PathMap,
    documents: Vec<PathBuf>,
    rewrites: Vec<RewriteRule>,
    watch: Vec<AssetCategory>,
}

impl PipelineConfig {
    /// Load configuration from CLI arguments.
    ///
    /// With `--root`, the config file is looked up relative to it. Otherwise
    /// it is searched upward from cwd and its directory becomes the root.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;

        let (root, config_path) = match &cli.root {
            Some(root) => {
                let root = cwd.join(root);
                let path = root.join(&cli.config);
                let path = path.is_file().then_some(path);
                (root, path)
            }
            None => match find_config_file(&cwd, &cli.config) {
                Some(path) => {
                    let root = path.parent().map(Path::to_path_buf).unwrap_or(cwd);
                    (root, Some(path))
                }
                None => (cwd, None),
            },
        };

        let mut file = match &config_path {
            Some(path) => Self::read_file(path)?,
            None => {
                debug!("config"; "no {} found, using defaults", cli.config.display());
                ConfigFile::default()
            }
        };

        if let Some(output) = &cli.output {
            file.output = Some(output.clone());
        }

        Ok(Self::resolve(file, &root)?)
    }

    /// Read a config file, warning about unknown fields.
    fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(&content);
        let file: ConfigFile =
            serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
                ignored.push(path.to_string());
            })?;

        if !ignored.is_empty() {
            log!("warning"; "unknown fields in {}, ignoring: {}", path.display(), ignored.join(", "));
        }

        Ok(file)
    }

    /// Validate a raw config and resolve every path against `root`.
    ///
    /// All problems are collected before returning, so one run reports
    /// every malformed glob and misplaced destination.
    pub fn resolve(file: ConfigFile, root: &Path) -> Result<Self, ConfigError> {
        let mut diag = ConfigDiagnostics::new();
        let root = root.to_path_buf();

        let output_rel = clean_path(
            file.output
                .as_deref()
                .unwrap_or_else(|| Path::new(DEFAULT_OUTPUT)),
        );
        if output_rel.as_os_str().is_empty() {
            diag.error("output", "output root must not be the project root");
        }
        if has_parent_dir(&output_rel) {
            diag.error("output", "output root must not contain `..`");
        }
        let output = root.join(&output_rel);

        let mut entries = Vec::with_capacity(AssetCategory::ALL.len());
        for category in AssetCategory::ALL {
            let (src, dest) = match file.paths.entry(category) {
                Some(entry) => {
                    let dest = clean_path(&entry.dest);
                    if dest.is_absolute() || has_parent_dir(&dest) {
                        diag.error(
                            format!("paths.{category}.dest"),
                            format!("`{}` must be a plain path relative to the project root", entry.dest.display()),
                        );
                        continue;
                    }
                    (entry.src.as_str(), root.join(dest))
                }
                None => {
                    let (src, dest) = category.default_paths();
                    (src, output.join(dest))
                }
            };

            if !dest.starts_with(&output) {
                diag.error_with_hint(
                    format!("paths.{category}.dest"),
                    format!("`{}` is outside the output root", dest.display()),
                    format!("use a directory under `{}`", output_rel.display()),
                );
                continue;
            }

            match SourcePattern::parse(src) {
                Ok(pattern) => entries.push(CategoryPaths {
                    category,
                    pattern,
                    dest,
                }),
                Err(err) => diag.error(format!("paths.{category}.src"), err.to_string()),
            }
        }

        for (i, doc) in file.html.documents.iter().enumerate() {
            let doc_str = doc.to_string_lossy();
            if doc_str.trim().is_empty() || doc.is_absolute() || has_parent_dir(doc) {
                diag.error(
                    format!("html.documents[{i}]"),
                    format!("`{doc_str}` must be a relative path inside the project"),
                );
            }
        }

        for (i, rule) in file.html.rewrite.iter().enumerate() {
            if rule.from.is_empty() {
                diag.error(format!("html.rewrite[{i}].from"), "must not be empty");
            }
        }

        diag.into_result()?;

        let mut watch = file.watch.categories;
        watch.sort();
        watch.dedup();

        Ok(Self {
            root,
            output,
            paths: PathMap::new(entries),
            documents: file.html.documents.into_iter().map(|d| clean_path(&d)).collect(),
            rewrites: file.html.rewrite,
            watch,
        })
    }

    /// Default configuration anchored at `root`.
    pub fn with_root(root: &Path) -> Result<Self, ConfigError> {
        Self::resolve(ConfigFile::default(), root)
    }

    /// Project root (source tree).
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Output root; every destination lies below it.
    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn paths(&self) -> &PathMap {
        &self.paths
    }

    pub fn category(&self, category: AssetCategory) -> &CategoryPaths {
        self.paths.get(category)
    }

    /// HTML entry documents, relative to the root, in processing order.
    pub fn documents(&self) -> &[PathBuf] {
        &self.documents
    }

    pub fn rewrites(&self) -> &[RewriteRule] {
        &self.rewrites
    }

    /// Watched categories, deduplicated.
    pub fn watch_categories(&self) -> &[AssetCategory] {
        &self.watch
    }

    /// Path relative to the root, for log lines.
    pub fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

// ============================================================================
// tests
// ============================================================================
