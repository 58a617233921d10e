//! Artifact location: stem, extension and URL for one platform.

use std::path::PathBuf;

use quiver_schema::{AssetTemplate, BinSpec, PackageRecipe, Platform, Version, template};
use reqwest::Url;
use thiserror::Error;

/// Why no artifact location could be computed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    /// The recipe has no asset for the platform's OS.
    #[error("no download template for {0}")]
    NoTemplate(Platform),

    /// A placeholder survived expansion.
    #[error("template left '{value}' unresolved in {field}")]
    Unresolved {
        /// Recipe field being expanded.
        field: &'static str,
        /// Expanded value.
        value: String,
    },

    /// The expanded URL is empty or does not parse.
    #[error("invalid download URL '{url}': {reason}")]
    BadUrl {
        /// Expanded URL.
        url: String,
        /// Parser message.
        reason: String,
    },
}

/// The concrete artifact for one (package, version, platform).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    /// File name without extension.
    pub stem: String,
    /// Extension without dot; may be empty.
    pub ext: String,
    /// Download location.
    pub url: Url,
}

impl ResolvedAsset {
    /// `stem.ext`, or just `stem` without an extension.
    pub fn file_name(&self) -> String {
        if self.ext.is_empty() {
            self.stem.clone()
        } else {
            format!("{}.{}", self.stem, self.ext)
        }
    }
}

/// One link to create: a path inside the version directory and its link name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinLink {
    /// Relative path inside the version directory.
    pub target: PathBuf,
    /// Entry name in the bin directory.
    pub link_name: String,
}

fn template_for(
    recipe: &PackageRecipe,
    platform: Platform,
) -> Result<(&AssetTemplate, &str), AssetError> {
    let asset = recipe
        .assets
        .get(&platform.os)
        .ok_or(AssetError::NoTemplate(platform))?;
    let arch = recipe
        .arch_tokens
        .get(&platform.arch)
        .ok_or(AssetError::NoTemplate(platform))?;
    Ok((asset, arch))
}

fn ensure_resolved(field: &'static str, value: String) -> Result<String, AssetError> {
    if value.trim().is_empty() || value.contains("{{") || value.contains("}}") {
        return Err(AssetError::Unresolved { field, value });
    }
    Ok(value)
}

/// Substitute package, version, OS and architecture into the recipe template.
///
/// Pure and side-effect free.
///
/// # Errors
///
/// Missing template, leftover placeholders, or a URL that is not http(s).
pub fn resolve_asset(
    recipe: &PackageRecipe,
    version: &Version,
    platform: Platform,
) -> Result<ResolvedAsset, AssetError> {
    let (asset, arch) = template_for(recipe, platform)?;
    let base = [
        ("title", recipe.title.as_str()),
        ("version", version.as_str()),
        ("os", asset.os_token.as_str()),
        ("arch", arch),
    ];

    let stem = ensure_resolved("stem", template::render(&asset.stem, &base))?;
    let ext = asset.ext.clone();

    let mut vars = base.to_vec();
    vars.extend([("stem", stem.as_str()), ("ext", ext.as_str())]);
    let raw_url = ensure_resolved("url", template::render(&asset.url, &vars))?;

    let url = Url::parse(&raw_url).map_err(|e| AssetError::BadUrl {
        url: raw_url.clone(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AssetError::BadUrl {
            url: raw_url,
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }

    Ok(ResolvedAsset { stem, ext, url })
}

/// Expand the recipe's bin entries for `platform` against `asset`.
///
/// # Errors
///
/// Leftover placeholders or an expanded path without a file name.
pub fn resolve_bins(
    recipe: &PackageRecipe,
    version: &Version,
    platform: Platform,
    asset: &ResolvedAsset,
) -> Result<Vec<BinLink>, AssetError> {
    let (spec, arch) = template_for(recipe, platform)?;
    let vars = [
        ("title", recipe.title.as_str()),
        ("version", version.as_str()),
        ("os", spec.os_token.as_str()),
        ("arch", arch),
        ("stem", asset.stem.as_str()),
        ("ext", asset.ext.as_str()),
    ];

    spec.bin
        .iter()
        .map(|BinSpec { path, alias }| -> Result<BinLink, AssetError> {
            let target = PathBuf::from(ensure_resolved("bin", template::render(path, &vars))?);
            let link_name = match alias {
                Some(alias) => alias.clone(),
                None => target
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| AssetError::Unresolved {
                        field: "bin",
                        value: target.display().to_string(),
                    })?,
            };
            Ok(BinLink { target, link_name })
        })
        .collect()
}
