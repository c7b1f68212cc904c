use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam::channel::{Receiver, unbounded};
use jwalk::WalkDir;
use tempfile::TempDir;

use super::*;
use crate::config::ConfigFile;

const INDEX: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <!-- Main CSS File -->
  <link href="assets/css/main.css" rel="stylesheet">
  <link href="assets/vendor/aos/aos.css" rel="stylesheet">
</head>
<body>
  <h1>Welcome</h1>
  <p>Small   business,
     big ideas.</p>

  <!-- Main JS File -->
  <script src="assets/js/main.js"></script>
</body>
</html>
"#;

/// Source tree with one file per category.
fn site(documents: &[&str]) -> (TempDir, Arc<PipelineConfig>) {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let write = |rel: &str, content: &[u8]| {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    };

    write("index.html", INDEX.as_bytes());
    write(
        "assets/css/main.css",
        b"/* theme */\nbody {\n  color: #333333;\n  margin: 0px;\n}\n",
    );
    write(
        "assets/js/main.js",
        b"(function () {\n  'use strict';\n  console.log('ready');\n})();\n",
    );
    write("assets/img/logo.png", &[0x89, b'P', b'N', b'G', 0, 0, 7]);
    write("assets/vendor/aos/aos.css", b"[data-aos]{opacity:0}");
    write("forms/contact.php", b"<?php echo 'ok'; ?>");
    write("assets/scss/_variables.scss", b"$accent: #e84545;");

    let mut file = ConfigFile::default();
    file.html.documents = documents.iter().map(PathBuf::from).collect();
    let config = PipelineConfig::resolve(file, root).unwrap();
    (dir, Arc::new(config))
}

fn observed(config: &Arc<PipelineConfig>) -> (Pipeline, Receiver<BuildEvent>) {
    let (tx, rx) = unbounded();
    (Pipeline::new(Arc::clone(config)).with_events(tx), rx)
}

/// Every file below `dir`, relative path → bytes.
fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let path = e.path();
            let rel = path.strip_prefix(dir).unwrap().to_path_buf();
            (rel, fs::read(&path).unwrap())
        })
        .collect()
}

#[test]
fn test_end_to_end_index() {
    let (_dir, config) = site(&["index.html"]);
    let mut pipeline = Pipeline::new(Arc::clone(&config));

    let summary = pipeline.run_full_build().unwrap();
    assert!(summary.is_clean());
    assert_eq!(pipeline.state(), BuildState::Done);

    let out = config.output();
    let html = fs::read_to_string(out.join("index.html")).unwrap();
    assert_eq!(
        html,
        concat!(
            r#"<!DOCTYPE html><html lang="en"><head><meta charset="utf-8">"#,
            r#"<link href="assets/css/main.min.css" rel="stylesheet">"#,
            r#"<link href="assets/vendor/aos/aos.css" rel="stylesheet">"#,
            r#"</head><body><h1>Welcome</h1><p>Small business, big ideas.</p>"#,
            r#"<script src="assets/js/main.min.js"></script></body></html>"#,
        )
    );
    assert!(!html.contains("<!--"));

    let css = fs::read_to_string(out.join("assets/css/main.min.css")).unwrap();
    assert!(!css.is_empty());
    assert!(!css.contains("theme"));
    let js = fs::read_to_string(out.join("assets/js/main.min.js")).unwrap();
    assert!(!js.is_empty());
    assert!(js.contains("console.log"));
}

#[test]
fn test_output_layout() {
    let (_dir, config) = site(&["index.html"]);
    Pipeline::new(Arc::clone(&config)).run_full_build().unwrap();

    let files: Vec<PathBuf> = snapshot(config.output()).into_keys().collect();
    let expected: Vec<PathBuf> = [
        "assets/css/main.min.css",
        "assets/img/logo.png",
        "assets/js/main.min.js",
        "assets/scss/_variables.scss",
        "assets/vendor/aos/aos.css",
        "forms/contact.php",
        "index.html",
    ]
    .iter()
    .map(PathBuf::from)
    .collect();
    assert_eq!(files, expected);
}

#[test]
fn test_rebuild_is_byte_identical() {
    let (_dir, config) = site(&["index.html"]);
    let mut pipeline = Pipeline::new(Arc::clone(&config));

    pipeline.run_full_build().unwrap();
    let first = snapshot(config.output());
    pipeline.run_full_build().unwrap();
    let second = snapshot(config.output());

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn test_malformed_css_is_isolated() {
    let (dir, config) = site(&["index.html"]);
    let css = dir.path().join("assets/css");
    fs::write(css.join("broken.css"), "..nope { color: red }").unwrap();
    fs::write(css.join("theme.css"), "a { color: blue; }").unwrap();

    let summary = Pipeline::new(Arc::clone(&config)).run_full_build().unwrap();

    assert_eq!(summary.failure_count(), 1);
    let failures = &summary.report(AssetCategory::Css).unwrap().failures;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].path, css.join("broken.css"));

    let out = config.output();
    assert!(out.join("assets/css/main.min.css").exists());
    let theme = fs::read_to_string(out.join("assets/css/theme.min.css")).unwrap();
    assert!(theme.starts_with("a{color:"));
    assert!(!out.join("assets/css/broken.min.css").exists());
    // sibling tasks unaffected
    for category in [
        AssetCategory::Js,
        AssetCategory::Images,
        AssetCategory::Vendor,
        AssetCategory::Forms,
        AssetCategory::Scss,
        AssetCategory::Html,
    ] {
        let report = summary.report(category).unwrap();
        assert!(report.is_clean(), "{category}");
        assert_eq!(report.written.len(), 1, "{category}");
    }
}

#[test]
fn test_missing_document_is_isolated() {
    let (_dir, config) = site(&["index.html", "portfolio-details.html"]);
    let mut pipeline = Pipeline::new(Arc::clone(&config));

    let summary = pipeline.run_full_build().unwrap();
    assert_eq!(pipeline.state(), BuildState::Done);

    let html = summary.report(AssetCategory::Html).unwrap();
    assert_eq!(html.written, vec![config.output().join("index.html")]);
    assert_eq!(html.failures.len(), 1);
    assert_eq!(summary.failure_count(), 1);
}

#[test]
fn test_stage_ordering() {
    let (_dir, config) = site(&["index.html"]);
    let (mut pipeline, rx) = observed(&config);
    pipeline.run_full_build().unwrap();
    drop(pipeline);

    let events: Vec<BuildEvent> = rx.iter().collect();
    let position = |wanted: &BuildEvent| events.iter().position(|e| e == wanted).unwrap();

    let materialize = position(&BuildEvent::StateChanged(BuildState::MaterializingOutput));
    let parallel = position(&BuildEvent::StateChanged(BuildState::RunningParallelTasks));
    let rewrite = position(&BuildEvent::StateChanged(BuildState::RewritingHtml));
    let done = position(&BuildEvent::StateChanged(BuildState::Done));
    assert_eq!(materialize, 0);
    assert!(materialize < parallel && parallel < rewrite && rewrite < done);
    assert_eq!(done, events.len() - 1);

    // all six asset tasks finish inside the parallel stage
    let finished: Vec<(usize, AssetCategory)> = events
        .iter()
        .enumerate()
        .filter_map(|(i, e)| match e {
            BuildEvent::TaskFinished { category, .. } => Some((i, *category)),
            _ => None,
        })
        .collect();
    let mut stage_two: Vec<AssetCategory> = finished
        .iter()
        .filter(|(i, _)| *i > parallel && *i < rewrite)
        .map(|(_, c)| *c)
        .collect();
    stage_two.sort();
    assert_eq!(stage_two, AssetCategory::PARALLEL.to_vec());

    // no document is written before the rewrite stage
    let documents: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, BuildEvent::DocumentWritten(_)))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(documents.len(), 1);
    assert!(documents.iter().all(|&i| i > rewrite && i < done));
}

#[test]
fn test_fatal_task_lets_siblings_finish() {
    let (_dir, config) = site(&["index.html"]);
    fs::create_dir(config.output()).unwrap();
    // forms destination blocked by a plain file
    fs::write(config.output().join("forms"), "not a directory").unwrap();
    let (mut pipeline, rx) = observed(&config);

    let err = pipeline.run_full_build().unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Task {
            category: AssetCategory::Forms,
            ..
        }
    ));
    assert_eq!(
        pipeline.state(),
        BuildState::Failed(BuildStage::RunningParallelTasks)
    );
    drop(pipeline);

    let events: Vec<BuildEvent> = rx.iter().collect();
    let mut finished: Vec<AssetCategory> = events
        .iter()
        .filter_map(|e| match e {
            BuildEvent::TaskFinished { category, .. } => Some(*category),
            _ => None,
        })
        .collect();
    finished.sort();
    assert_eq!(
        finished,
        vec![
            AssetCategory::Css,
            AssetCategory::Js,
            AssetCategory::Images,
            AssetCategory::Vendor,
            AssetCategory::Scss,
        ]
    );
    assert!(!events.contains(&BuildEvent::StateChanged(BuildState::RewritingHtml)));
    assert_eq!(
        events.last(),
        Some(&BuildEvent::StateChanged(BuildState::Failed(
            BuildStage::RunningParallelTasks
        )))
    );

    let out = config.output();
    assert!(out.join("assets/css/main.min.css").exists());
    assert!(out.join("assets/img/logo.png").exists());
    assert!(!out.join("index.html").exists());
}

#[test]
fn test_output_root_created_before_tasks() {
    let (_dir, config) = site(&[]);
    let pipeline = Pipeline::new(Arc::clone(&config));
    assert!(!config.output().exists());

    pipeline.ensure_output_root().unwrap();
    assert!(config.output().is_dir());
    // idempotent
    pipeline.ensure_output_root().unwrap();
}

#[test]
fn test_output_root_is_not_recursive() {
    let (dir, _) = site(&[]);
    let mut file = ConfigFile::default();
    file.output = Some(PathBuf::from("build/dist"));
    let config = Arc::new(PipelineConfig::resolve(file, dir.path()).unwrap());
    let (mut pipeline, rx) = observed(&config);

    let err = pipeline.run_full_build().unwrap_err();
    assert!(matches!(err, PipelineError::OutputRoot { .. }));
    assert_eq!(
        pipeline.state(),
        BuildState::Failed(BuildStage::MaterializingOutput)
    );
    drop(pipeline);

    // nothing ran after the failed stage
    let events: Vec<BuildEvent> = rx.iter().collect();
    assert_eq!(
        events,
        vec![
            BuildEvent::StateChanged(BuildState::MaterializingOutput),
            BuildEvent::StateChanged(BuildState::Failed(BuildStage::MaterializingOutput)),
        ]
    );
    assert!(!dir.path().join("build").exists());
}

#[test]
fn test_output_root_file_is_fatal() {
    let (_dir, config) = site(&[]);
    fs::write(config.output(), "not a directory").unwrap();
    let err = Pipeline::new(Arc::clone(&config))
        .ensure_output_root()
        .unwrap_err();
    assert!(matches!(err, PipelineError::OutputNotDirectory(_)));
}

#[test]
fn test_single_task_touches_only_its_category() {
    let (_dir, config) = site(&["index.html"]);
    let pipeline = Pipeline::new(Arc::clone(&config));
    pipeline.ensure_output_root().unwrap();

    let report = pipeline.run_task(AssetCategory::Js).unwrap();
    assert_eq!(
        report.written,
        vec![config.output().join("assets/js/main.min.js")]
    );

    let files: Vec<PathBuf> = snapshot(config.output()).into_keys().collect();
    assert_eq!(files, vec![PathBuf::from("assets/js/main.min.js")]);
}

#[test]
fn test_html_task_alone() {
    let (_dir, config) = site(&["index.html"]);
    let pipeline = Pipeline::new(Arc::clone(&config));
    pipeline.ensure_output_root().unwrap();

    let report = pipeline.run_html().unwrap();
    assert!(report.is_clean());
    let html = fs::read_to_string(config.output().join("index.html")).unwrap();
    assert!(html.contains("assets/css/main.min.css"));
    assert!(html.contains("assets/js/main.min.js"));
}

#[test]
fn test_state_transitions() {
    use BuildState::*;
    assert!(NotStarted.can_advance_to(MaterializingOutput));
    assert!(MaterializingOutput.can_advance_to(RunningParallelTasks));
    assert!(RunningParallelTasks.can_advance_to(RewritingHtml));
    assert!(RewritingHtml.can_advance_to(Done));
    assert!(Done.can_advance_to(MaterializingOutput));
    assert!(RunningParallelTasks.can_advance_to(Failed(BuildStage::RunningParallelTasks)));

    assert!(!NotStarted.can_advance_to(RewritingHtml));
    assert!(!MaterializingOutput.can_advance_to(RewritingHtml));
    assert!(!Done.can_advance_to(Failed(BuildStage::RewritingHtml)));
    assert!(!RewritingHtml.can_advance_to(Failed(BuildStage::MaterializingOutput)));
}
