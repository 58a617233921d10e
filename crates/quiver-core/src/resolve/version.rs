//! Version selection.
//!
//! A pinned version is used as-is unless the recipe is force-latest; in every
//! other case the upstream source is asked for the newest matching release.

use async_trait::async_trait;
use quiver_schema::{PackageName, PackageRecipe, TagPattern, Version, VersionSource};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

/// Public GitHub REST endpoint.
pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";

/// Why no version could be chosen.
#[derive(Error, Debug)]
pub enum VersionError {
    /// Transport or decoding failure talking to the version source.
    #[error("unable to reach the version source for {name}: {source}")]
    Unreachable {
        /// Package being resolved.
        name: PackageName,
        /// Underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },

    /// The version source answered with a non-2xx status.
    #[error("version source for {name} answered {status}")]
    Status {
        /// Package being resolved.
        name: PackageName,
        /// HTTP status received.
        status: StatusCode,
    },

    /// No release matched the recipe's tag pattern.
    #[error("unable to find latest version tag for {name}")]
    NoMatchingTag {
        /// Package being resolved.
        name: PackageName,
    },

    /// A force-latest recipe was pinned to something other than the latest.
    #[error("{name} can only be installed at its latest version {latest} (requested {requested})")]
    Mismatch {
        /// Package being resolved.
        name: PackageName,
        /// Pinned version.
        requested: Version,
        /// Version the source reports as latest.
        latest: Version,
    },

    /// The chosen version cannot be used as part of a directory name.
    #[error("version '{version}' of {name} is not a plain version")]
    Unusable {
        /// Package being resolved.
        name: PackageName,
        /// Offending version.
        version: Version,
    },
}

/// Discovers the latest version of a recipe.
#[async_trait]
pub trait VersionFinder: Send + Sync {
    /// Newest version matching the recipe's versioning rule.
    ///
    /// # Errors
    ///
    /// The source is unreachable or nothing matches.
    async fn latest(&self, recipe: &PackageRecipe) -> Result<Version, VersionError>;
}

/// Choose the version to install.
///
/// # Errors
///
/// Lookup failures, and a pinned version differing from the latest one on a
/// force-latest recipe.
pub async fn resolve_version(
    finder: &dyn VersionFinder,
    recipe: &PackageRecipe,
    requested: Option<&Version>,
) -> Result<Version, VersionError> {
    let usable = |version: Version| {
        if version.is_path_safe() {
            Ok(version)
        } else {
            Err(VersionError::Unusable {
                name: recipe.title.clone(),
                version,
            })
        }
    };

    if let Some(v) = requested {
        if !recipe.force_latest {
            return usable(v.clone());
        }
    }

    let latest = usable(finder.latest(recipe).await?)?;
    match requested {
        Some(v) if *v != latest => Err(VersionError::Mismatch {
            name: recipe.title.clone(),
            requested: v.clone(),
            latest,
        }),
        _ => Ok(latest),
    }
}

/// The real version source: GitHub releases, or the recipe's manual list.
#[derive(Debug, Clone)]
pub struct UpstreamVersions {
    client: Client,
    api_base: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
}

impl UpstreamVersions {
    /// Query `api_base` (e.g. [`DEFAULT_GITHUB_API`]) with optional bearer `token`.
    pub fn new(client: Client, api_base: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    async fn github_latest(
        &self,
        name: &PackageName,
        repo: &str,
        pattern: &TagPattern,
        include_prereleases: bool,
    ) -> Result<Version, VersionError> {
        let url = format!("{}/repos/{repo}/releases?per_page=100", self.api_base);
        tracing::debug!("GET {url}");

        let unreachable = |source| VersionError::Unreachable {
            name: name.clone(),
            source,
        };

        let mut request = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(unreachable)?;
        let status = response.status();
        if !status.is_success() {
            return Err(VersionError::Status {
                name: name.clone(),
                status,
            });
        }
        let releases: Vec<Release> = response.json().await.map_err(unreachable)?;

        releases
            .iter()
            .filter(|r| !r.draft && (include_prereleases || !r.prerelease))
            .filter_map(|r| pattern.extract(&r.tag_name))
            .max()
            .ok_or_else(|| VersionError::NoMatchingTag { name: name.clone() })
    }
}

#[async_trait]
impl VersionFinder for UpstreamVersions {
    async fn latest(&self, recipe: &PackageRecipe) -> Result<Version, VersionError> {
        match &recipe.version_source {
            VersionSource::Manual(list) => {
                list.iter()
                    .max()
                    .cloned()
                    .ok_or_else(|| VersionError::NoMatchingTag {
                        name: recipe.title.clone(),
                    })
            }
            VersionSource::GitHub {
                repo,
                tag_pattern,
                include_prereleases,
            } => {
                self.github_latest(&recipe.title, repo, tag_pattern, *include_prereleases)
                    .await
            }
        }
    }
}
