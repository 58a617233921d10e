//! Shared installation context.
//!
//! Groups the immutable environment every install worker needs: where
//! things live, which platform is targeted, and the collaborators used to
//! load recipes, find versions, unpack archives and report progress.

use std::fmt;
use std::sync::Arc;

use quiver_schema::Platform;

use crate::io::extract::{ArchiveUnpacker, Unpacker};
use crate::paths::Paths;
use crate::recipes::RecipeSource;
use crate::reporter::Reporter;
use crate::resolve::VersionFinder;

/// Immutable environment shared by every install worker of one run.
#[derive(Clone)]
pub struct InstallContext {
    /// Home layout.
    pub paths: Paths,
    /// Target platform; the host, or a simulated one under `dev bintest`.
    pub platform: Platform,
    /// Client for artifact downloads.
    pub client: reqwest::Client,
    /// Where recipes are loaded from.
    pub recipes: Arc<dyn RecipeSource>,
    /// Latest-version lookup.
    pub versions: Arc<dyn VersionFinder>,
    /// Archive materialization.
    pub unpacker: Arc<dyn Unpacker>,
    /// Progress sink.
    pub reporter: Arc<dyn Reporter>,
}

impl fmt::Debug for InstallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallContext")
            .field("paths", &self.paths)
            .field("platform", &self.platform)
            .field("recipes", &self.recipes)
            .finish_non_exhaustive()
    }
}

impl InstallContext {
    /// Context using the built-in archive unpacker.
    pub fn new(
        paths: Paths,
        platform: Platform,
        client: reqwest::Client,
        recipes: Arc<dyn RecipeSource>,
        versions: Arc<dyn VersionFinder>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            paths,
            platform,
            client,
            recipes,
            versions,
            unpacker: Arc::new(ArchiveUnpacker),
            reporter,
        }
    }

    /// Replace the unpacker.
    pub fn with_unpacker(mut self, unpacker: Arc<dyn Unpacker>) -> Self {
        self.unpacker = unpacker;
        self
    }
}
