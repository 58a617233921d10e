//! Recipe model: how to locate and install one package.
//!
//! Recipes are TOML documents. They are parsed into loosely-typed `Raw*`
//! structs first and then validated into [`PackageRecipe`], so that code
//! downstream of [`PackageRecipe::parse`] never sees a malformed shape:
//! platform keys come from a closed set, every template only uses the
//! placeholders it is allowed to, and archive extensions are known formats.
//!
//! ```toml
//! [package]
//! title = "ripgrep"
//!
//! [versions]
//! github = "BurntSushi/ripgrep"
//!
//! [download]
//! url = "https://github.com/BurntSushi/ripgrep/releases/download/{{version}}/{{stem}}.{{ext}}"
//! stem = "ripgrep-{{version}}-{{arch}}-{{os}}"
//! ext = "tar.gz"
//! extract_has_root = true
//!
//! [platforms.linux]
//! os = "unknown-linux-musl"
//!
//! [arch]
//! amd64 = "x86_64"
//!
//! [install]
//! bin = ["rg"]
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::format::ArchiveFormat;
use crate::platform::{Arch, Os, Platform};
use crate::template;
use crate::types::{PackageName, Version};

/// Placeholders available in `stem`.
const STEM_KEYS: &[&str] = &["title", "version", "os", "arch"];
/// Placeholders available in `url` and bin paths.
const URL_KEYS: &[&str] = &["title", "version", "os", "arch", "stem", "ext"];

/// Errors raised while loading a recipe.
#[derive(Error, Debug)]
pub enum RecipeError {
    /// No recipe exists under that name.
    #[error("no recipe found for '{0}'")]
    NotFound(PackageName),

    /// The recipe file could not be read.
    #[error("failed to read recipe {}: {source}", path.display())]
    Io {
        /// Recipe file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The recipe is not valid TOML or has unexpected fields.
    #[error("failed to parse recipe for '{name}': {source}")]
    Parse {
        /// Requested package.
        name: PackageName,
        /// Parser error.
        #[source]
        source: toml::de::Error,
    },

    /// The recipe parsed but violates a validation rule.
    #[error("invalid recipe for '{name}': {reason}")]
    Invalid {
        /// Requested package.
        name: PackageName,
        /// What is wrong.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// On-disk shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRecipe {
    package: RawPackage,
    versions: RawVersions,
    download: RawDownload,
    #[serde(default)]
    platforms: BTreeMap<String, RawPlatform>,
    #[serde(default)]
    arch: BTreeMap<String, String>,
    #[serde(default)]
    install: RawInstall,
    #[serde(default)]
    ignore: Vec<RawIgnore>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPackage {
    title: String,
    tagline: Option<String>,
    homepage: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawVersions {
    github: Option<String>,
    manual: Option<Vec<String>>,
    tag_pattern: Option<String>,
    #[serde(default)]
    include_prereleases: bool,
    #[serde(default)]
    force_latest: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDownload {
    url: String,
    stem: String,
    #[serde(default)]
    ext: String,
    #[serde(default)]
    extract_has_root: bool,
    #[serde(default)]
    raw_binary: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPlatform {
    os: Option<String>,
    url: Option<String>,
    stem: Option<String>,
    ext: Option<String>,
    bin: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawInstall {
    #[serde(default)]
    bin: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawIgnore {
    os: String,
    arch: String,
}

// ---------------------------------------------------------------------------
// Validated model
// ---------------------------------------------------------------------------

/// Literal text around `{{version}}` in a release tag (e.g. `v{{version}}`).
///
/// The default pattern matches bare version tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagPattern {
    prefix: String,
    suffix: String,
}

impl TagPattern {
    /// Parse a pattern containing exactly one `{{version}}`.
    pub fn parse(pattern: &str) -> Option<Self> {
        let (prefix, suffix) = pattern.split_once("{{version}}")?;
        if suffix.contains("{{version}}") {
            return None;
        }
        Some(Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        })
    }

    /// Extract the version from a tag, if the tag matches and the version
    /// is usable as part of a directory name.
    pub fn extract(&self, tag: &str) -> Option<Version> {
        let version = tag.strip_prefix(&self.prefix)?.strip_suffix(&self.suffix)?;
        Some(Version::from(version)).filter(Version::is_path_safe)
    }

    /// The tag name for a given version.
    pub fn tag_for(&self, version: &Version) -> String {
        format!("{}{version}{}", self.prefix, self.suffix)
    }
}

/// Where "latest" is discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSource {
    /// GitHub releases of `owner/repo`.
    GitHub {
        /// `owner/repo`
        repo: String,
        /// Tag shape.
        tag_pattern: TagPattern,
        /// Consider releases marked as prereleases.
        include_prereleases: bool,
    },
    /// A fixed list maintained in the recipe.
    Manual(Vec<Version>),
}

/// One exposed binary: a path template inside the version directory, and an
/// optional link name overriding the file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinSpec {
    /// Relative path template (may use url placeholders).
    pub path: String,
    /// Name of the link in the bin directory, if not the file name.
    pub alias: Option<String>,
}

impl BinSpec {
    /// Parse `path` or `path:alias`.
    pub fn parse(entry: &str) -> Option<Self> {
        let (path, alias) = match entry.split_once(':') {
            Some((path, alias)) => (path.trim(), Some(alias.trim())),
            None => (entry.trim(), None),
        };
        if path.is_empty() || alias.is_some_and(|a| a.is_empty() || a.contains(['/', '\\'])) {
            return None;
        }
        Some(Self {
            path: path.to_string(),
            alias: alias.map(str::to_string),
        })
    }
}

/// Per-OS artifact template, with recipe defaults already merged in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetTemplate {
    /// Token substituted for `{{os}}`.
    pub os_token: String,
    /// URL template.
    pub url: String,
    /// Artifact stem template.
    pub stem: String,
    /// Artifact extension, without leading dot. May be empty.
    pub ext: String,
    /// Ordered binaries exposed on this OS.
    pub bin: Vec<BinSpec>,
}

impl AssetTemplate {
    /// Archive format of the artifact, or `None` for a raw file.
    pub fn format(&self) -> Option<ArchiveFormat> {
        ArchiveFormat::from_ext(&self.ext)
    }
}

/// A validated, immutable recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecipe {
    /// Canonical package and default binary name.
    pub title: PackageName,
    /// One-line description.
    pub tagline: Option<String>,
    /// Project homepage.
    pub homepage: Option<String>,
    /// Where to find the latest version.
    pub version_source: VersionSource,
    /// Only the current latest version may be installed.
    pub force_latest: bool,
    /// Templates by OS; the keys are the supported OS set.
    pub assets: BTreeMap<Os, AssetTemplate>,
    /// Tokens by architecture; the keys are the supported arch set.
    pub arch_tokens: BTreeMap<Arch, String>,
    /// Explicitly unsupported pairs.
    pub ignore: BTreeSet<(Os, Arch)>,
    /// Archives wrap their contents in one redundant top-level directory.
    pub extract_has_root: bool,
    /// The artifact is the executable itself.
    pub raw_binary: bool,
}

impl PackageRecipe {
    /// Parse and validate a recipe requested as `name`.
    ///
    /// # Errors
    ///
    /// `Parse` for TOML or shape errors, `Invalid` for any rule violation.
    pub fn parse(name: &PackageName, content: &str) -> Result<Self, RecipeError> {
        let raw: RawRecipe = toml::from_str(content).map_err(|source| RecipeError::Parse {
            name: name.clone(),
            source,
        })?;
        validate(name, raw).map_err(|reason| RecipeError::Invalid {
            name: name.clone(),
            reason,
        })
    }

    /// Read and validate the recipe file at `path`.
    ///
    /// # Errors
    ///
    /// `NotFound` when the file is absent, otherwise as [`PackageRecipe::parse`].
    pub fn from_file(name: &PackageName, path: &Path) -> Result<Self, RecipeError> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                RecipeError::NotFound(name.clone())
            } else {
                RecipeError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::parse(name, &content)
    }

    /// Supported operating systems.
    pub fn supported_os(&self) -> impl Iterator<Item = Os> + '_ {
        self.assets.keys().copied()
    }

    /// Supported architectures.
    pub fn supported_arch(&self) -> impl Iterator<Item = Arch> + '_ {
        self.arch_tokens.keys().copied()
    }

    /// Whether the pair is listed under `[[ignore]]`.
    pub fn is_ignored(&self, platform: Platform) -> bool {
        self.ignore.contains(&(platform.os, platform.arch))
    }
}

fn validate(name: &PackageName, raw: RawRecipe) -> Result<PackageRecipe, String> {
    let title = raw.package.title.trim();
    if title.is_empty() {
        return Err("package.title is empty".into());
    }
    if title.contains(['/', '\\', '@']) || title.chars().any(char::is_whitespace) {
        return Err(format!("package.title '{title}' is not a valid package name"));
    }
    let title = PackageName::new(title);
    if title != *name {
        return Err(format!("package.title '{title}' does not match '{name}'"));
    }

    let version_source = validate_versions(&raw.versions)?;
    let download = &raw.download;

    if raw.platforms.is_empty() {
        return Err("at least one [platforms.<os>] table is required".into());
    }
    if raw.arch.is_empty() {
        return Err("at least one [arch] entry is required".into());
    }

    let default_bin = if raw.install.bin.is_empty() {
        vec![title.to_string()]
    } else {
        raw.install.bin.clone()
    };

    let mut assets = BTreeMap::new();
    for (key, platform) in raw.platforms {
        let os: Os = key.parse()?;
        let asset = AssetTemplate {
            os_token: platform.os.unwrap_or_else(|| os.as_str().to_string()),
            url: platform.url.unwrap_or_else(|| download.url.clone()),
            stem: platform.stem.unwrap_or_else(|| download.stem.clone()),
            ext: platform
                .ext
                .unwrap_or_else(|| download.ext.clone())
                .trim_start_matches('.')
                .to_string(),
            bin: parse_bins(os, platform.bin.as_deref().unwrap_or(&default_bin[..]))?,
        };
        validate_asset(os, &asset, download.raw_binary)?;
        assets.insert(os, asset);
    }

    let mut arch_tokens = BTreeMap::new();
    for (key, token) in raw.arch {
        let arch: Arch = key.parse()?;
        if token.trim().is_empty() {
            return Err(format!("arch.{key} token is empty"));
        }
        arch_tokens.insert(arch, token);
    }

    let mut ignore = BTreeSet::new();
    for pair in raw.ignore {
        let os: Os = pair.os.parse()?;
        let arch: Arch = pair.arch.parse()?;
        ignore.insert((os, arch));
    }

    Ok(PackageRecipe {
        title,
        tagline: raw.package.tagline,
        homepage: raw.package.homepage,
        version_source,
        force_latest: raw.versions.force_latest,
        assets,
        arch_tokens,
        ignore,
        extract_has_root: download.extract_has_root,
        raw_binary: download.raw_binary,
    })
}

fn validate_versions(raw: &RawVersions) -> Result<VersionSource, String> {
    match (&raw.github, &raw.manual) {
        (Some(repo), None) => {
            let valid = repo.split_once('/').is_some_and(|(owner, name)| {
                !owner.is_empty() && !name.is_empty() && !name.contains('/')
            });
            if !valid {
                return Err(format!("versions.github '{repo}' must be 'owner/repo'"));
            }
            let tag_pattern = match &raw.tag_pattern {
                Some(p) => TagPattern::parse(p).ok_or_else(|| {
                    format!("versions.tag_pattern '{p}' must contain '{{{{version}}}}' exactly once")
                })?,
                None => TagPattern::default(),
            };
            Ok(VersionSource::GitHub {
                repo: repo.clone(),
                tag_pattern,
                include_prereleases: raw.include_prereleases,
            })
        }
        (None, Some(list)) => {
            if list.is_empty() || list.iter().any(|v| v.trim().is_empty()) {
                return Err("versions.manual must list at least one non-empty version".into());
            }
            let versions: Vec<Version> = list.iter().map(|v| Version::from(v.trim())).collect();
            if let Some(bad) = versions.iter().find(|v| !v.is_path_safe()) {
                return Err(format!("versions.manual entry '{bad}' is not a plain version"));
            }
            Ok(VersionSource::Manual(versions))
        }
        (Some(_), Some(_)) => Err("versions.github and versions.manual are exclusive".into()),
        (None, None) => Err("versions needs either 'github' or 'manual'".into()),
    }
}

fn parse_bins(os: Os, entries: &[String]) -> Result<Vec<BinSpec>, String> {
    entries
        .iter()
        .map(|entry| {
            BinSpec::parse(entry)
                .ok_or_else(|| format!("platforms.{os}: bin entry '{entry}' is malformed"))
        })
        .collect()
}

fn validate_asset(os: Os, asset: &AssetTemplate, raw_binary: bool) -> Result<(), String> {
    if asset.url.trim().is_empty() {
        return Err(format!("platforms.{os}: url is empty"));
    }
    if asset.stem.trim().is_empty() {
        return Err(format!("platforms.{os}: stem is empty"));
    }
    if asset.os_token.trim().is_empty() {
        return Err(format!("platforms.{os}: os token is empty"));
    }
    if asset.bin.is_empty() {
        return Err(format!("platforms.{os}: bin list is empty"));
    }
    if !template::placeholders(&asset.ext).is_empty() {
        return Err(format!("platforms.{os}: ext cannot use placeholders"));
    }
    if !raw_binary && asset.format().is_none() {
        return Err(format!(
            "platforms.{os}: '{}' is not a supported archive extension",
            asset.ext
        ));
    }

    check_keys(os, "stem", &asset.stem, STEM_KEYS)?;
    check_keys(os, "url", &asset.url, URL_KEYS)?;
    for bin in &asset.bin {
        let escapes = Path::new(&bin.path)
            .components()
            .any(|c| !matches!(c, std::path::Component::Normal(_) | std::path::Component::CurDir));
        if escapes {
            return Err(format!(
                "platforms.{os}: bin path '{}' must stay inside the install directory",
                bin.path
            ));
        }
        check_keys(os, "bin", &bin.path, URL_KEYS)?;
    }
    Ok(())
}

fn check_keys(os: Os, field: &str, value: &str, allowed: &[&str]) -> Result<(), String> {
    match template::placeholders(value)
        .into_iter()
        .find(|key| !allowed.contains(key))
    {
        Some(key) => Err(format!(
            "platforms.{os}: {field} uses unknown placeholder '{{{{{key}}}}}'"
        )),
        None => Ok(()),
    }
}
