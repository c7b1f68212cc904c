//! HTML rewrite task.
//!
//! For every configured entry document: read, rewrite asset references,
//! minify, write to the same relative path under the output root.
//!
//! Reference rewriting is plain substring replacement. A rule for
//! `assets/css/main.css` also matches that text inside comments, inline
//! scripts, unrelated attributes and longer paths such as
//! `assets/css/main.css.map`.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::asset::{AssetRoute, TaskReport, prepare_dest_dir, scan_category, write_output};
use crate::config::{AssetCategory, PipelineConfig, RewriteRule};

use super::minify::minify_html;

/// Apply every rule in order, replacing all literal occurrences.
pub fn apply_rewrites<'a>(text: &'a str, rules: &[RewriteRule]) -> Cow<'a, str> {
    let mut out = Cow::Borrowed(text);
    for rule in rules {
        if rule.from.is_empty() || !out.contains(rule.from.as_str()) {
            continue;
        }
        out = Cow::Owned(out.replace(rule.from.as_str(), &rule.to));
    }
    out
}

/// Rewrite every entry document.
///
/// Documents are processed in parallel; the report lists them in
/// configured order. `on_written` runs right after each successful write.
pub fn run_html<F>(config: &PipelineConfig, on_written: F) -> Result<TaskReport>
where
    F: Fn(&Path) + Sync,
{
    let routes = scan_category(config, AssetCategory::Html)?;
    let rules = config.rewrites();
    if !routes.is_empty() {
        prepare_dest_dir(&config.category(AssetCategory::Html).dest)?;
    }

    let results: Vec<_> = routes
        .par_iter()
        .map(|route| {
            let result = process_document(route, rules);
            if let Ok(output) = &result {
                on_written(output);
            }
            (route.source.clone(), result)
        })
        .collect();

    Ok(TaskReport::collect(AssetCategory::Html, results))
}

/// Read, rewrite, minify and write one document.
pub fn process_document(route: &AssetRoute, rules: &[RewriteRule]) -> Result<PathBuf> {
    let source = fs::read_to_string(&route.source)
        .with_context(|| format!("failed to read {}", route.source.display()))?;
    let rewritten = apply_rewrites(&source, rules);
    let minified = minify_html(&rewritten)?;
    write_output(&route.output, minified.as_bytes())?;
    Ok(route.output.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigFile, HtmlSection};
    use parking_lot::Mutex;
    use tempfile::TempDir;

    fn default_rules() -> Vec<RewriteRule> {
        HtmlSection::default().rewrite
    }

    #[test]
    fn test_apply_rewrites_replaces_every_occurrence() {
        let text = r#"<link href="assets/css/main.css"><!-- assets/css/main.css --><script src="assets/js/main.js"></script>"#;
        let out = apply_rewrites(text, &default_rules());
        assert_eq!(
            out,
            r#"<link href="assets/css/main.min.css"><!-- assets/css/main.min.css --><script src="assets/js/main.min.js"></script>"#
        );
    }

    #[test]
    fn test_apply_rewrites_leaves_other_references() {
        let text = r#"<link href="assets/vendor/aos/aos.css"><link href="assets/css/main.css">"#;
        let out = apply_rewrites(text, &default_rules());
        assert!(out.contains(r#"href="assets/vendor/aos/aos.css""#));
        assert!(out.contains(r#"href="assets/css/main.min.css""#));
    }

    #[test]
    fn test_apply_rewrites_borrows_when_nothing_matches() {
        let out = apply_rewrites("<p>plain</p>", &default_rules());
        assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn test_apply_rewrites_is_substring_based() {
        // known limitation: longer paths sharing the prefix are rewritten too
        let out = apply_rewrites("assets/css/main.css.map", &default_rules());
        assert_eq!(out, "assets/css/main.min.css.map");
    }

    fn site(documents: &[&str]) -> (TempDir, PipelineConfig) {
        let dir = TempDir::new().unwrap();
        let mut file = ConfigFile::default();
        file.html.documents = documents.iter().map(PathBuf::from).collect();
        let config = PipelineConfig::resolve(file, dir.path()).unwrap();
        fs::create_dir(config.output()).unwrap();
        (dir, config)
    }

    #[test]
    fn test_missing_document_does_not_stop_others() {
        let (dir, config) = site(&["a.html", "missing.html", "c.html"]);
        fs::write(dir.path().join("a.html"), "<p>a</p>").unwrap();
        fs::write(dir.path().join("c.html"), "<p>c</p>").unwrap();

        let report = run_html(&config, |_| {}).unwrap();
        assert_eq!(
            report.written,
            vec![config.output().join("a.html"), config.output().join("c.html")]
        );
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, dir.path().join("missing.html"));
        assert!(report.failures[0].message.starts_with("failed to read"));
    }

    #[test]
    fn test_malformed_document_fails_alone() {
        let (dir, config) = site(&["good.html", "bad.html"]);
        fs::write(dir.path().join("good.html"), "<div>\n  <p>ok</p>\n</div>").unwrap();
        fs::write(dir.path().join("bad.html"), "<p>x</p><!-- open").unwrap();

        let report = run_html(&config, |_| {}).unwrap();
        assert_eq!(report.written, vec![config.output().join("good.html")]);
        assert_eq!(report.failures[0].path, dir.path().join("bad.html"));
        assert!(report.failures[0].message.starts_with("html: unterminated comment"));
        assert!(!config.output().join("bad.html").exists());
        assert_eq!(
            fs::read_to_string(config.output().join("good.html")).unwrap(),
            "<div><p>ok</p></div>"
        );
    }

    #[test]
    fn test_parallel_result_matches_list_order() {
        let names: Vec<String> = (0..16).map(|i| format!("page-{i:02}.html")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let (dir, config) = site(&refs);
        for name in &names {
            fs::write(dir.path().join(name), format!("<p>{name}</p>")).unwrap();
        }

        let seen = Mutex::new(Vec::new());
        let report = run_html(&config, |path| seen.lock().push(path.to_path_buf())).unwrap();

        let expected: Vec<_> = names.iter().map(|n| config.output().join(n)).collect();
        assert_eq!(report.written, expected);
        assert_eq!(seen.lock().len(), names.len());
    }

    #[test]
    fn test_nested_document_keeps_relative_path() {
        let (dir, config) = site(&["blog/post.html"]);
        fs::create_dir_all(dir.path().join("blog")).unwrap();
        fs::write(
            dir.path().join("blog/post.html"),
            "<link href=\"assets/css/main.css\">",
        )
        .unwrap();

        let report = run_html(&config, |_| {}).unwrap();
        assert!(report.is_clean());
        let out = fs::read_to_string(config.output().join("blog/post.html")).unwrap();
        assert_eq!(out, "<link href=\"assets/css/main.min.css\">");
    }
}
