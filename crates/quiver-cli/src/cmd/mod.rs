//! Command implementations.

pub mod add;
pub mod dev;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use quiver_core::{DirRecipeSource, InstallContext, Paths, Reporter, UpstreamVersions};
use quiver_schema::Platform;

use crate::SourceArgs;
use crate::ui::Output;

/// Everything a command needs: home layout, HTTP client and output.
#[derive(Debug, Clone)]
pub struct Session {
    pub paths: Paths,
    pub client: reqwest::Client,
    pub output: Output,
    source: SourceArgs,
}

impl Session {
    /// Resolve the home directory and apply `--local-recipes`.
    pub fn new(source: &SourceArgs) -> Result<Self> {
        let mut paths = Paths::from_env().context("could not determine the quiver home directory")?;
        if let Some(dir) = &source.local_recipes {
            if !dir.is_dir() {
                bail!("local recipe directory {} does not exist", dir.display());
            }
            paths = paths.with_recipe_dir(dir.clone());
        }

        let client = reqwest::Client::builder()
            .user_agent(quiver_core::USER_AGENT)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            paths,
            client,
            output: Output::new(),
            source: source.clone(),
        })
    }

    /// Whether recipes come from `--local-recipes`.
    pub fn uses_local_recipes(&self) -> bool {
        self.source.local_recipes.is_some()
    }

    pub fn recipes_url(&self) -> &str {
        &self.source.recipes_url
    }

    pub fn recipes(&self) -> DirRecipeSource {
        DirRecipeSource::new(&self.paths.recipe_dir)
    }

    /// Install context targeting `platform` within `paths`.
    pub fn context(&self, paths: Paths, platform: Platform) -> InstallContext {
        InstallContext::new(
            paths,
            platform,
            self.client.clone(),
            Arc::new(self.recipes()),
            Arc::new(UpstreamVersions::new(
                self.client.clone(),
                self.source.github_api.as_str(),
                self.source.github_token.clone(),
            )),
            Arc::new(self.output.clone()) as Arc<dyn Reporter>,
        )
    }
}

/// Removes a scratch directory when dropped.
#[derive(Debug)]
pub struct ScratchGuard(PathBuf);

impl ScratchGuard {
    pub fn new(dir: PathBuf) -> Self {
        Self(dir)
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.0) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("failed to remove {}: {e}", self.0.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_guard_removes_dir() {
        let home = tempfile::tempdir().unwrap();
        let tmp = home.path().join("tmp");
        std::fs::create_dir_all(tmp.join("nested")).unwrap();
        std::fs::write(tmp.join("nested/file"), b"x").unwrap();

        drop(ScratchGuard::new(tmp.clone()));
        assert!(!tmp.exists());
        assert!(home.path().exists());
    }

    #[test]
    fn test_scratch_guard_tolerates_missing_dir() {
        let home = tempfile::tempdir().unwrap();
        drop(ScratchGuard::new(home.path().join("never-created")));
    }
}
