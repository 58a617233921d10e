//! Domain-specific errors for package operations

use std::path::PathBuf;

use quiver_schema::{ArgumentFormatError, PackageName, RecipeError};
use thiserror::Error;

use crate::io::download::DownloadError;
use crate::io::extract::ExtractError;
use crate::link::LinkError;
use crate::resolve::{AssetError, PlatformError, VersionError};

/// A broken environment. Continuing would operate on inconsistent state.
#[derive(Error, Debug)]
pub enum FatalError {
    /// A base directory could not be created.
    #[error("cannot create {}: {source}", path.display())]
    Environment {
        /// Directory that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Links were switched but the ActiveUse marker could not be written.
    #[error("links for {name} were created but its active version could not be recorded: {source}")]
    MarkerWrite {
        /// Package being switched.
        name: PackageName,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Why one package argument failed.
#[derive(Error, Debug)]
pub enum InstallError {
    /// Malformed `name[@version]`.
    #[error(transparent)]
    Argument(#[from] ArgumentFormatError),

    /// Recipe missing or invalid.
    #[error(transparent)]
    Recipe(#[from] RecipeError),

    /// Not installable on the target platform.
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// No usable version.
    #[error(transparent)]
    Version(#[from] VersionError),

    /// No usable artifact location.
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// Fetching the artifact failed; only the scratch file was touched.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Extraction, permissions or move failed; the version was cleaned up.
    #[error("failed to install files: {0}")]
    Materialize(#[from] ExtractError),

    /// Linking failed; the version was cleaned up.
    #[error("failed to link binaries: {0}")]
    Link(#[from] LinkError),

    /// The whole run must stop.
    #[error(transparent)]
    Fatal(#[from] FatalError),

    /// Runtime plumbing failures (scratch directory, worker panics).
    #[error("{context}: {message}")]
    Context {
        /// What was being done.
        context: &'static str,
        /// Underlying error text.
        message: String,
    },
}

impl InstallError {
    /// Create an error with context for better debugging.
    pub fn context(ctx: &'static str, msg: impl std::fmt::Display) -> Self {
        Self::Context {
            context: ctx,
            message: msg.to_string(),
        }
    }

    /// Whether this failure must abort the whole process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}
