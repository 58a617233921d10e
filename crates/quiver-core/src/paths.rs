//! On-disk layout of a quiver home.
//!
//! ```text
//! <home>/
//!   pkg/<name>/<name>-<version>/   one directory per installed version
//!   pkg/<name>/.using              active extract stem
//!   bin/                           shared links
//!   tmp/                           scratch space, removed at exit
//!   recipes/pkgs/<name>.toml       recipe checkout
//!   test/<os>/<arch>/              isolated homes for `dev bintest`
//! ```

use std::path::{Path, PathBuf};

use dirs::home_dir;
use quiver_schema::{PackageName, Platform, Version, extract_stem};

use crate::ops::FatalError;

/// Name of the ActiveUse marker inside a package directory.
pub const USING_MARKER: &str = ".using";

/// Returns the quiver home (`QUIVER_HOME`, else `~/.quiver`), or None if the
/// user's home cannot be resolved.
pub fn try_quiver_home() -> Option<PathBuf> {
    if let Some(val) = std::env::var_os("QUIVER_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".quiver"))
}

/// Immutable directory environment threaded through every operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    /// Home root.
    pub root: PathBuf,
    /// Installed packages.
    pub pkg_dir: PathBuf,
    /// Shared links.
    pub bin_dir: PathBuf,
    /// Scratch space for downloads and staging.
    pub tmp_dir: PathBuf,
    /// Recipe checkout.
    pub recipe_dir: PathBuf,
    /// Root of isolated test homes.
    pub test_dir: PathBuf,
}

impl Paths {
    /// Standard layout below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            pkg_dir: root.join("pkg"),
            bin_dir: root.join("bin"),
            tmp_dir: root.join("tmp"),
            recipe_dir: root.join("recipes"),
            test_dir: root.join("test"),
            root,
        }
    }

    /// Layout of the user's home, see [`try_quiver_home`].
    pub fn from_env() -> Option<Self> {
        try_quiver_home().map(Self::new)
    }

    /// Use a different recipe directory (e.g. `--local-recipes`).
    pub fn with_recipe_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.recipe_dir = dir.into();
        self
    }

    /// Isolated home for simulating `platform`, sharing this home's recipes.
    pub fn for_test(&self, platform: Platform) -> Self {
        let root = self
            .test_dir
            .join(platform.os.as_str())
            .join(platform.arch.as_str());
        Self::new(root).with_recipe_dir(self.recipe_dir.clone())
    }

    /// Create the package, bin and scratch directories.
    ///
    /// # Errors
    ///
    /// An uncreatable base directory is an environment fault.
    pub fn ensure(&self) -> Result<(), FatalError> {
        for dir in [&self.pkg_dir, &self.bin_dir, &self.tmp_dir] {
            std::fs::create_dir_all(dir).map_err(|source| FatalError::Environment {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// `pkg/<name>`
    pub fn package_dir(&self, name: &PackageName) -> PathBuf {
        self.pkg_dir.join(name)
    }

    /// `pkg/<name>/<name>-<version>`
    pub fn version_dir(&self, name: &PackageName, version: &Version) -> PathBuf {
        self.package_dir(name).join(extract_stem(name, version))
    }

    /// `pkg/<name>/.using`
    pub fn using_marker(&self, name: &PackageName) -> PathBuf {
        self.package_dir(name).join(USING_MARKER)
    }

    /// Scratch path for a downloaded artifact.
    pub fn download_path(&self, file_name: &str) -> PathBuf {
        self.tmp_dir.join(file_name)
    }

    /// Whether `path` is inside this home's bin directory.
    pub fn is_bin_path(&self, path: &Path) -> bool {
        path.starts_with(&self.bin_dir)
    }
}
