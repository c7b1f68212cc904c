//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AssetCategory;

/// Static site asset build pipeline
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, disable_version_flag = true)]
pub struct Cli {
    /// Print version
    #[arg(long, action = clap::ArgAction::Version)]
    version: Option<bool>,

    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: sitedist.toml, searched upward from cwd)
    #[arg(short = 'C', long, global = true, default_value = "sitedist.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Project root directory (default: directory of the config file, or cwd)
    #[arg(short, long, global = true, value_hint = clap::ValueHint::DirPath)]
    pub root: Option<PathBuf>,

    /// Output directory path (relative to project root)
    #[arg(short, long, global = true, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long, global = true)]
    pub verbose: bool,

    /// subcommands (default: build)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Full build: output root, all asset tasks, then HTML
    #[command(visible_alias = "b")]
    Build,

    /// Minify stylesheets
    Css,

    /// Minify scripts
    Js,

    /// Copy images
    Images,

    /// Copy vendor libraries
    Vendor,

    /// Copy form handlers
    Forms,

    /// Copy SCSS sources
    Scss,

    /// Rewrite and minify the HTML entry documents
    Html,

    /// Watch sources and re-run the affected task on change
    #[command(visible_alias = "w")]
    Watch {
        /// Skip the initial full build
        #[arg(long)]
        no_build: bool,
    },
}

impl Commands {
    /// The single category this command runs, if it is a task command.
    pub fn category(&self) -> Option<AssetCategory> {
        match self {
            Self::Css => Some(AssetCategory::Css),
            Self::Js => Some(AssetCategory::Js),
            Self::Images => Some(AssetCategory::Images),
            Self::Vendor => Some(AssetCategory::Vendor),
            Self::Forms => Some(AssetCategory::Forms),
            Self::Scss => Some(AssetCategory::Scss),
            Self::Html => Some(AssetCategory::Html),
            Self::Build | Self::Watch { .. } => None,
        }
    }
}
