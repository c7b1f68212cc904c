//! Passthrough tasks: copy matching files unchanged.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::config::{AssetCategory, PipelineConfig};
use crate::debug;

use super::report::TaskReport;
use super::route::{AssetRoute, scan_category};
use super::transform::prepare_dest_dir;

/// Copy every source of `category` to its destination.
pub fn run_copy(config: &PipelineConfig, category: AssetCategory) -> Result<TaskReport> {
    let routes = scan_category(config, category)?;
    debug!(category.name(); "{} sources matching {}", routes.len(), config.category(category).pattern.as_str());
    if !routes.is_empty() {
        prepare_dest_dir(&config.category(category).dest)?;
    }

    let results: Vec<_> = routes
        .par_iter()
        .map(|route| (route.source.clone(), copy_file(route)))
        .collect();

    Ok(TaskReport::collect(category, results))
}

fn copy_file(route: &AssetRoute) -> Result<PathBuf> {
    if let Some(parent) = route.output.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::copy(&route.source, &route.output).with_context(|| {
        format!(
            "failed to copy {} to {}",
            route.source.display(),
            route.output.display()
        )
    })?;
    Ok(route.output.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_preserves_bytes_and_structure() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let img = root.join("assets/img/team");
        fs::create_dir_all(&img).unwrap();
        let bytes = [0x89, b'P', b'N', b'G', 0, 1, 2, 255];
        fs::write(img.join("alice.png"), bytes).unwrap();
        fs::write(root.join("assets/img/logo.svg"), "<svg/>").unwrap();

        let config = PipelineConfig::with_root(root).unwrap();
        fs::create_dir(config.output()).unwrap();
        let report = run_copy(&config, AssetCategory::Images).unwrap();

        assert!(report.is_clean());
        assert_eq!(report.written.len(), 2);
        let out = config.output().join("assets/img");
        assert_eq!(fs::read(out.join("team/alice.png")).unwrap(), bytes);
        assert_eq!(fs::read_to_string(out.join("logo.svg")).unwrap(), "<svg/>");
    }

    #[test]
    fn test_copy_keeps_css_and_js_names() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let vendor = root.join("assets/vendor/bootstrap/css");
        fs::create_dir_all(&vendor).unwrap();
        fs::write(vendor.join("bootstrap.css"), "a { color: red; }").unwrap();

        let config = PipelineConfig::with_root(root).unwrap();
        fs::create_dir(config.output()).unwrap();
        run_copy(&config, AssetCategory::Vendor).unwrap();

        let out = config
            .output()
            .join("assets/vendor/bootstrap/css/bootstrap.css");
        assert_eq!(fs::read_to_string(out).unwrap(), "a { color: red; }");
    }

    #[test]
    fn test_unusable_destination_fails_the_task() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("forms")).unwrap();
        fs::write(root.join("forms/contact.php"), "<?php ?>").unwrap();

        let config = PipelineConfig::with_root(root).unwrap();
        fs::create_dir(config.output()).unwrap();
        fs::write(config.output().join("forms"), "not a directory").unwrap();

        let err = run_copy(&config, AssetCategory::Forms).unwrap_err();
        assert!(format!("{err:#}").contains("not a usable directory"));
    }

    #[test]
    fn test_missing_source_directory_is_empty_report() {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig::with_root(dir.path()).unwrap();
        let report = run_copy(&config, AssetCategory::Forms).unwrap();
        assert!(report.written.is_empty());
        assert!(report.is_clean());
    }
}
