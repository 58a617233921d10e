//! quiver - a multi-version binary package manager
#![allow(missing_docs)]
//!
//! Installs release artifacts side by side under `~/.quiver/pkg` and exposes
//! one active version of each package through links in `~/.quiver/bin`.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.quiver/
//! ├── bin/       # Links to active binaries
//! ├── pkg/       # <name>/<name>-<version>/ per installed version
//! ├── recipes/   # Recipe checkout (pkgs/<name>.toml)
//! ├── test/      # Isolated homes for `dev bintest`
//! └── tmp/       # Scratch space, removed at exit
//! ```

pub mod cmd;
pub mod ui;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use quiver_core::recipes::DEFAULT_RECIPES_URL;
use quiver_core::resolve::version::DEFAULT_GITHUB_API;

#[derive(Debug, Parser)]
#[command(name = "quiver")]
#[command(author, version, about = "quiver - a multi-version binary package manager")]
pub struct Cli {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where recipes and versions come from.
#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Read recipes from this directory instead of the managed checkout
    #[arg(short = 'l', long, global = true, value_name = "DIR")]
    pub local_recipes: Option<PathBuf>,

    /// Snapshot (.tar.gz) the recipe checkout is refreshed from
    #[arg(long, global = true, env = "QUIVER_RECIPES_URL", default_value = DEFAULT_RECIPES_URL, hide_default_value = true)]
    pub recipes_url: String,

    /// GitHub REST API base URL used for release lookups
    #[arg(long, global = true, env = "QUIVER_GITHUB_API", default_value = DEFAULT_GITHUB_API, hide_default_value = true)]
    pub github_api: String,

    /// Token for GitHub API requests
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Install packages
    Add {
        /// Package name(s), optionally with version: pkg or pkg@1.0.0
        #[arg(required = true)]
        packages: Vec<String>,
        /// Refresh recipes before installing
        #[arg(long)]
        refresh: bool,
        /// Make the installed version active even if another one is
        #[arg(long)]
        switch: bool,
    },
    /// Recipe authoring tools
    Dev {
        #[command(subcommand)]
        command: DevCommands,
    },
}

#[derive(Debug, Subcommand)]
pub enum DevCommands {
    /// Load and validate a recipe
    Check {
        /// Package name
        name: String,
    },
    /// Install the latest version for every supported OS and architecture
    Bintest {
        /// Package name
        name: String,
    },
}
