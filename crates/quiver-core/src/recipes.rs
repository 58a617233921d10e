//! Recipe sources and recipe refresh.
//!
//! Recipes live in a directory tree (`<dir>/pkgs/<name>.toml`). The default
//! tree is `<home>/recipes`, kept up to date from a `.tar.gz` snapshot of the
//! recipe repository; `--local-recipes` points at any other tree.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use quiver_schema::{ArchiveFormat, PackageName, PackageRecipe, RecipeError};
use reqwest::Client;
use thiserror::Error;

use crate::io::download::{DownloadError, download_file};
use crate::io::extract::{ExtractError, extract_archive};

/// Default snapshot of the public recipe repository.
pub const DEFAULT_RECIPES_URL: &str =
    "https://github.com/quiver-pm/recipes/archive/refs/heads/main.tar.gz";

/// Timestamp file written after each successful refresh.
pub const REFRESH_MARKER: &str = ".refreshed";

/// Recipes older than this are refreshed before an install.
pub const REFRESH_INTERVAL_HOURS: i64 = 24;

/// Loads recipes by package name.
pub trait RecipeSource: Send + Sync + fmt::Debug {
    /// Load and validate the recipe for `name`.
    ///
    /// # Errors
    ///
    /// `RecipeError::NotFound` when no recipe exists, other variants when it
    /// cannot be read or is invalid.
    fn load(&self, name: &PackageName) -> Result<PackageRecipe, RecipeError>;
}

/// Recipes stored as `<root>/pkgs/<name>.toml`.
#[derive(Debug, Clone)]
pub struct DirRecipeSource {
    root: PathBuf,
}

impl DirRecipeSource {
    /// Source reading from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Recipe file for `name`.
    pub fn recipe_path(&self, name: &PackageName) -> PathBuf {
        self.root.join("pkgs").join(format!("{name}.toml"))
    }
}

impl RecipeSource for DirRecipeSource {
    fn load(&self, name: &PackageName) -> Result<PackageRecipe, RecipeError> {
        let path = self.recipe_path(name);
        tracing::debug!("loading recipe {}", path.display());
        PackageRecipe::from_file(name, &path)
    }
}

/// Why the recipe snapshot could not be refreshed.
#[derive(Error, Debug)]
pub enum RefreshError {
    /// Fetching the snapshot failed.
    #[error("failed to download recipes: {0}")]
    Download(#[from] DownloadError),

    /// The snapshot is not a readable tarball.
    #[error("failed to unpack recipes: {0}")]
    Extract(#[from] ExtractError),

    /// The snapshot holds no recipes.
    #[error("recipe snapshot has no pkgs/ directory")]
    MissingPkgs,

    /// Swapping the snapshot in failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Whether the recipe tree at `dir` is missing or older than a day.
pub fn should_refresh(dir: &Path) -> bool {
    if !dir.join("pkgs").is_dir() {
        return true;
    }
    match last_refresh(dir) {
        Some(at) => Utc::now() - at > Duration::hours(REFRESH_INTERVAL_HOURS),
        None => true,
    }
}

/// Time of the last successful refresh of `dir`, if recorded.
pub fn last_refresh(dir: &Path) -> Option<DateTime<Utc>> {
    let content = std::fs::read_to_string(dir.join(REFRESH_MARKER)).ok()?;
    DateTime::parse_from_rfc3339(content.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Replace the recipe tree at `dir` with the snapshot at `url`.
///
/// The snapshot is downloaded and unpacked below `tmp`; `dir` is only
/// swapped once the new tree is complete.
///
/// # Errors
///
/// Download, extraction or filesystem failures. `dir` is unchanged then.
pub async fn refresh_recipes(
    client: &Client,
    url: &str,
    dir: &Path,
    tmp: &Path,
) -> Result<(), RefreshError> {
    tokio::fs::create_dir_all(tmp).await?;
    let staging = tempfile::Builder::new()
        .prefix(".recipes-")
        .tempdir_in(tmp)?;
    let archive = staging.path().join("recipes.tar.gz");

    tracing::debug!("refreshing recipes from {url}");
    download_file(client, url, &archive, |_, _| {}).await?;

    let tree = staging.path().join("tree");
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<(), RefreshError> {
        extract_archive(ArchiveFormat::TarGz, &archive, &tree)?;
        let root = snapshot_root(&tree).ok_or(RefreshError::MissingPkgs)?;
        std::fs::write(root.join(REFRESH_MARKER), Utc::now().to_rfc3339())?;
        swap_dir(&root, &dir)?;
        Ok(())
    })
    .await
    .map_err(|e| std::io::Error::other(e.to_string()))??;

    drop(staging);
    Ok(())
}

/// The directory of the snapshot holding `pkgs/`: the tree itself, or its
/// single top-level directory (repository archives wrap everything in one).
fn snapshot_root(tree: &Path) -> Option<PathBuf> {
    if tree.join("pkgs").is_dir() {
        return Some(tree.to_path_buf());
    }
    let mut dirs = std::fs::read_dir(tree)
        .ok()?
        .filter_map(Result::ok)
        .filter(|e| e.path().join("pkgs").is_dir());
    let first = dirs.next()?;
    dirs.next().is_none().then(|| first.path())
}

fn swap_dir(new: &Path, dest: &Path) -> std::io::Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let backup = dest.with_extension("old");
    if backup.exists() {
        std::fs::remove_dir_all(&backup)?;
    }
    if dest.exists() {
        std::fs::rename(dest, &backup)?;
    }
    if let Err(e) = std::fs::rename(new, dest) {
        if backup.exists() {
            std::fs::rename(&backup, dest).ok();
        }
        return Err(e);
    }
    if backup.exists() {
        if let Err(e) = std::fs::remove_dir_all(&backup) {
            tracing::warn!("failed to remove {}: {e}", backup.display());
        }
    }
    Ok(())
}
