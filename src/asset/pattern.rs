//! Source glob patterns.
//!
//! A pattern such as `assets/css/**/*.css` is split into a literal base
//! directory (`assets/css`) and a matcher for the remainder (`**/*.css`).
//! Output paths keep the structure below the base directory:
//!
//! ```text
//! assets/css/**/*.css   base = assets/css
//! assets/css/a/b.css    -> <dest>/a/b.css
//! *.html                base = (root)
//! index.html            -> <dest>/index.html
//! ```
//!
//! Supported syntax: `**` (any number of directories), `*`, `?`,
//! `{a,b}` alternation and `[...]` character classes. Dot-files never match.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use jwalk::{Parallelism, WalkDir};
use regex::Regex;
use thiserror::Error;

/// Glob syntax errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("pattern is empty")]
    Empty,
    #[error("pattern `{0}` must be relative to the project root")]
    Absolute(String),
    #[error("pattern `{0}` must not contain `..`")]
    ParentDir(String),
    #[error("pattern `{0}` has an unbalanced `{1}`")]
    Unbalanced(String, char),
    #[error("pattern `{0}` nests `{{` alternations")]
    NestedAlternation(String),
}

/// A compiled source glob.
#[derive(Debug, Clone)]
pub struct SourcePattern {
    raw: String,
    /// Literal directory prefix, relative to the project root.
    base: PathBuf,
    /// Matches paths relative to `base`, `/`-separated.
    matcher: Regex,
    /// Remainder contains `**`.
    recursive: bool,
    /// Segment count of the remainder (walk depth when not recursive).
    depth: usize,
}

impl SourcePattern {
    /// Compile a glob pattern.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let raw = pattern.trim();
        if raw.is_empty() {
            return Err(PatternError::Empty);
        }
        if raw.starts_with('/') || Path::new(raw).is_absolute() {
            return Err(PatternError::Absolute(raw.to_string()));
        }

        let segments: Vec<&str> = raw
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .collect();
        if segments.is_empty() {
            return Err(PatternError::Empty);
        }
        if segments.contains(&"..") {
            return Err(PatternError::ParentDir(raw.to_string()));
        }

        // Base = literal segments before the first wildcard, but always leave
        // at least one segment for the matcher.
        let literal = segments
            .iter()
            .take_while(|s| !has_wildcard(s))
            .count()
            .min(segments.len() - 1);
        let (base_segments, rest) = segments.split_at(literal);

        let mut expr = String::from("^");
        for (i, segment) in rest.iter().enumerate() {
            let last = i + 1 == rest.len();
            if *segment == "**" {
                expr.push_str(if last { ".*" } else { "(?:[^/]+/)*" });
                continue;
            }
            translate_segment(raw, segment, &mut expr)?;
            if !last {
                expr.push('/');
            }
        }
        expr.push('$');

        // Translated expressions only use escaped literals and fixed classes.
        let matcher =
            Regex::new(&expr).map_err(|_| PatternError::Unbalanced(raw.to_string(), '['))?;

        Ok(Self {
            raw: raw.to_string(),
            base: base_segments.iter().collect(),
            matcher,
            recursive: rest.contains(&"**"),
            depth: rest.len(),
        })
    }

    /// The pattern as written in the config.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Literal base directory, relative to the project root.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Whether matching descends into subdirectories.
    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    /// Check a path relative to the base directory.
    pub fn matches_relative(&self, relative: &Path) -> bool {
        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    let part = part.to_string_lossy();
                    if part.starts_with('.') {
                        return false;
                    }
                    parts.push(part);
                }
                _ => return false,
            }
        }
        !parts.is_empty() && self.matcher.is_match(&parts.join("/"))
    }

    /// Check an absolute path against this pattern anchored at `root`.
    ///
    /// Returns the path relative to the base directory on match.
    pub fn match_path(&self, root: &Path, path: &Path) -> Option<PathBuf> {
        let relative = path.strip_prefix(root.join(&self.base)).ok()?;
        self.matches_relative(relative)
            .then(|| relative.to_path_buf())
    }

    /// List all files under `root` matching this pattern, sorted.
    ///
    /// A missing base directory yields no files.
    pub fn enumerate(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let base_dir = root.join(&self.base);
        if !base_dir.is_dir() {
            return Ok(Vec::new());
        }

        // Tasks already run on the rayon pool; a nested parallel walk aborts.
        let mut walker = WalkDir::new(&base_dir)
            .parallelism(Parallelism::Serial)
            .skip_hidden(true)
            .sort(true);
        if !self.recursive {
            walker = walker.max_depth(self.depth);
        }

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.with_context(|| format!("failed to walk {}", base_dir.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Ok(relative) = path.strip_prefix(&base_dir) else {
                continue;
            };
            if self.matches_relative(relative) {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }
}

fn has_wildcard(segment: &str) -> bool {
    segment.contains(['*', '?', '[', '{'])
}

/// Translate one path segment into regex syntax.
fn translate_segment(raw: &str, segment: &str, expr: &mut String) -> Result<(), PatternError> {
    let mut chars = segment.chars().peekable();
    let mut in_alternation = false;

    while let Some(c) = chars.next() {
        match c {
            '*' => {
                // `**` inside a segment behaves like `*`
                while chars.peek() == Some(&'*') {
                    chars.next();
                }
                expr.push_str("[^/]*");
            }
            '?' => expr.push_str("[^/]"),
            '{' => {
                if in_alternation {
                    return Err(PatternError::NestedAlternation(raw.to_string()));
                }
                in_alternation = true;
                expr.push_str("(?:");
            }
            ',' if in_alternation => expr.push('|'),
            '}' if in_alternation => {
                in_alternation = false;
                expr.push(')');
            }
            '}' => return Err(PatternError::Unbalanced(raw.to_string(), '}')),
            '[' => {
                let mut class = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    class.push(c);
                }
                if !closed || class.is_empty() {
                    return Err(PatternError::Unbalanced(raw.to_string(), '['));
                }
                expr.push('[');
                let body = match class.strip_prefix('!') {
                    Some(negated) => {
                        expr.push('^');
                        negated
                    }
                    None => class.as_str(),
                };
                for c in body.chars() {
                    if matches!(c, '\\' | '[' | ']' | '^' | '&' | '~') {
                        expr.push('\\');
                    }
                    expr.push(c);
                }
                expr.push(']');
            }
            _ => expr.push_str(&regex::escape(&c.to_string())),
        }
    }

    if in_alternation {
        return Err(PatternError::Unbalanced(raw.to_string(), '{'));
    }
    Ok(())
}
