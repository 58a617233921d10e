//! Installation Flow Typestate Pattern
//!
//! Models the single-package pipeline as explicit state transitions:
//!
//! ```text
//! UnresolvedPackage --[resolve()]--> ResolvedPackage --[download()]--> DownloadedPackage
//!                                                      --[materialize()]--> InstalledPackage
//! ```
//!
//! Nothing is written to disk before `download()`, so every failure up to
//! that point is free of side effects. A `materialize()` failure removes the
//! partial version directory before returning.

use std::path::{Path, PathBuf};

use quiver_schema::{PackageName, PackageRecipe, Version, extract_stem};

use crate::io::download::download_file;
use crate::io::extract::{ExtractError, UnpackRequest, make_executable};
use crate::ops::install::{calculate_dir_size, cleanup_partial};
use crate::ops::{InstallContext, InstallError};
use crate::reporter::{Level, Reporter, Slot, Working};
use crate::resolve::{
    BinLink, ResolvedAsset, check_platform, resolve_asset, resolve_bins, resolve_version,
};

/// State 1: a recipe is loaded but no version has been chosen.
///
/// # Transitions
///
/// - [`resolve()`](Self::resolve) -> [`ResolvedPackage`]
#[derive(Debug)]
pub struct UnresolvedPackage {
    /// Requested package.
    pub name: PackageName,
    /// Pinned version, if any.
    pub requested: Option<Version>,
    /// Validated recipe.
    pub recipe: PackageRecipe,
}

/// State 2: version and artifact are known.
///
/// # Transitions
///
/// - [`download()`](Self::download) -> [`DownloadedPackage`]
#[derive(Debug)]
pub struct ResolvedPackage {
    /// Requested package.
    pub name: PackageName,
    /// Chosen version.
    pub version: Version,
    /// Validated recipe.
    pub recipe: PackageRecipe,
    /// Artifact to download.
    pub asset: ResolvedAsset,
    /// Links to create once installed.
    pub bins: Vec<BinLink>,
    /// `<name>-<version>`
    pub extract_stem: String,
    /// `pkg/<name>/<extract_stem>`
    pub version_dir: PathBuf,
}

/// State 3: the artifact sits in the scratch directory.
#[derive(Debug)]
pub struct DownloadedPackage {
    /// Where it came from.
    pub resolved: ResolvedPackage,
    /// Downloaded file.
    pub artifact: PathBuf,
}

/// State 4: the version directory is complete.
#[derive(Debug)]
pub struct InstalledPackage {
    /// What was installed.
    pub resolved: ResolvedPackage,
    /// Bytes on disk below the version directory.
    pub size_bytes: u64,
}

impl UnresolvedPackage {
    /// Start the flow for one parsed argument.
    pub fn new(name: PackageName, requested: Option<Version>, recipe: PackageRecipe) -> Self {
        Self {
            name,
            requested,
            recipe,
        }
    }

    /// Pick the version and compute the artifact for the context platform.
    ///
    /// Checks platform support first, so an unsupported package never
    /// reaches the version source.
    ///
    /// # Errors
    ///
    /// Platform, version or asset resolution failures. No side effects.
    pub async fn resolve(
        self,
        ctx: &InstallContext,
        slot: Slot,
    ) -> Result<ResolvedPackage, InstallError> {
        check_platform(&self.recipe, ctx.platform)?;

        let version = {
            let _working = Working::start(
                &*ctx.reporter,
                slot,
                &format!("Finding latest {} version tag", self.name),
            );
            resolve_version(&*ctx.versions, &self.recipe, self.requested.as_ref()).await?
        };
        ctx.reporter.status(
            slot,
            Level::Info,
            &format!("Found {} version tag: {version}", self.name),
        );

        let asset = resolve_asset(&self.recipe, &version, ctx.platform)?;
        let bins = resolve_bins(&self.recipe, &version, ctx.platform, &asset)?;
        tracing::debug!("{}@{version} resolved to {}", self.name, asset.url);

        Ok(ResolvedPackage {
            extract_stem: extract_stem(&self.name, &version),
            version_dir: ctx.paths.version_dir(&self.name, &version),
            name: self.name,
            version,
            recipe: self.recipe,
            asset,
            bins,
        })
    }
}

impl ResolvedPackage {
    /// Whether this version already has a directory.
    pub fn is_installed(&self) -> bool {
        self.version_dir.is_dir()
    }

    /// Stream the artifact into the scratch directory.
    ///
    /// # Errors
    ///
    /// Network failures and non-2xx responses. Only the scratch file is
    /// discarded.
    pub async fn download(
        self,
        ctx: &InstallContext,
        slot: Slot,
    ) -> Result<DownloadedPackage, InstallError> {
        tokio::fs::create_dir_all(&ctx.paths.tmp_dir)
            .await
            .map_err(|e| InstallError::context("Failed to create scratch directory", e))?;
        let artifact = ctx.paths.download_path(&self.asset.file_name());

        let working = Working::start(
            &*ctx.reporter,
            slot,
            &format!("Downloading {}", self.asset.file_name()),
        );
        let reporter = &ctx.reporter;
        let bytes = download_file(&ctx.client, self.asset.url.as_str(), &artifact, |cur, total| {
            reporter.downloading(slot, cur, total);
        })
        .await?;
        working.finish();
        tracing::debug!("downloaded {bytes} bytes to {}", artifact.display());

        Ok(DownloadedPackage {
            resolved: self,
            artifact,
        })
    }
}

impl DownloadedPackage {
    /// Turn the artifact into the version directory.
    ///
    /// # Errors
    ///
    /// Extraction, permission or move failures. The partial version directory
    /// (and the package directory, if it held nothing else) is removed.
    pub async fn materialize(
        self,
        ctx: &InstallContext,
        slot: Slot,
    ) -> Result<InstalledPackage, InstallError> {
        let working = Working::start(
            &*ctx.reporter,
            slot,
            &format!("Installing {}", self.resolved.extract_stem),
        );

        let req = UnpackRequest {
            archive: self.artifact.clone(),
            name: self.resolved.name.clone(),
            extract_stem: self.resolved.extract_stem.clone(),
            ext: self.resolved.asset.ext.clone(),
            has_root: self.resolved.recipe.extract_has_root,
            dest: self.resolved.version_dir.clone(),
            staging_root: ctx.paths.tmp_dir.clone(),
        };
        let raw_name = raw_binary_name(&self.resolved.recipe, &self.resolved.asset);
        let unpacker = ctx.unpacker.clone();

        let result = tokio::task::spawn_blocking(move || -> Result<u64, ExtractError> {
            match raw_name {
                Some(file_name) => place_raw_binary(&req.archive, &req.dest, &file_name)?,
                None => unpacker.unpack(&req)?,
            }
            Ok(calculate_dir_size(&req.dest))
        })
        .await
        .map_err(|e| InstallError::context("Task panic", e))?;
        working.finish();

        if let Err(e) = tokio::fs::remove_file(&self.artifact).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("failed to remove {}: {e}", self.artifact.display());
            }
        }

        match result {
            Ok(size_bytes) => Ok(InstalledPackage {
                resolved: self.resolved,
                size_bytes,
            }),
            Err(e) => {
                cleanup_partial(&ctx.paths, &self.resolved.name, &self.resolved.version_dir);
                Err(InstallError::Materialize(e))
            }
        }
    }
}

/// File name of a raw binary inside its version directory: the title, plus
/// the extension when there is one.
fn raw_binary_name(recipe: &PackageRecipe, asset: &ResolvedAsset) -> Option<String> {
    if !recipe.raw_binary {
        return None;
    }
    Some(if asset.ext.is_empty() {
        recipe.title.to_string()
    } else {
        format!("{}.{}", recipe.title, asset.ext)
    })
}

fn place_raw_binary(artifact: &Path, dest: &Path, file_name: &str) -> Result<(), ExtractError> {
    if dest.exists() {
        return Err(ExtractError::Exists(dest.to_path_buf()));
    }
    make_executable(artifact)?;
    std::fs::create_dir_all(dest)?;
    std::fs::rename(artifact, dest.join(file_name))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(download: &str) -> PackageRecipe {
        let content = format!(
            r#"
[package]
title = "jq"

[versions]
manual = ["1.7.1"]

[download]
url = "https://example.com/{{{{version}}}}/{{{{stem}}}}"
stem = "jq-{{{{os}}}}-{{{{arch}}}}"
{download}

[platforms.linux]

[arch]
amd64 = "amd64"
"#
        );
        PackageRecipe::parse(&PackageName::new("jq"), &content).unwrap()
    }

    fn asset(ext: &str) -> ResolvedAsset {
        ResolvedAsset {
            stem: "jq-linux-amd64".to_string(),
            ext: ext.to_string(),
            url: reqwest::Url::parse("https://example.com/jq").unwrap(),
        }
    }

    #[test]
    fn test_raw_binary_name() {
        let raw = recipe("raw_binary = true\next = \"\"");
        assert_eq!(raw_binary_name(&raw, &asset("")).as_deref(), Some("jq"));
        assert_eq!(
            raw_binary_name(&raw, &asset("exe")).as_deref(),
            Some("jq.exe")
        );

        let archive = recipe("ext = \"tar.gz\"");
        assert_eq!(raw_binary_name(&archive, &asset("tar.gz")), None);
    }

    #[test]
    fn test_place_raw_binary() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("jq-linux-amd64");
        std::fs::write(&artifact, b"#!/bin/sh\n").unwrap();
        let dest = dir.path().join("pkg/jq/jq-1.7.1");

        place_raw_binary(&artifact, &dest, "jq").unwrap();
        assert!(dest.join("jq").is_file());
        assert!(!artifact.exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(dest.join("jq")).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }

    #[test]
    fn test_place_raw_binary_refuses_existing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("jq");
        std::fs::write(&artifact, b"bin").unwrap();
        let dest = dir.path().join("jq-1.7.1");
        std::fs::create_dir_all(&dest).unwrap();

        assert!(matches!(
            place_raw_binary(&artifact, &dest, "jq"),
            Err(ExtractError::Exists(_))
        ));
        assert!(artifact.exists());
    }
}
