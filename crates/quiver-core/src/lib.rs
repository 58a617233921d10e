//! quiver core: resolution, download, unpacking, linking and the install
//! orchestration engine.

pub mod io;
pub mod link;
pub mod ops;
pub mod paths;
pub mod recipes;
pub mod reporter;
pub mod resolve;

pub use link::{LinkError, LinkManager};
pub use ops::{FatalError, InstallContext, InstallError, InstallOutcome, InstallSummary};
pub use paths::Paths;
pub use recipes::{DirRecipeSource, RecipeSource};
pub use reporter::{Level, NullReporter, Reporter, Slot, Working};
pub use resolve::{UpstreamVersions, VersionFinder};

/// User agent sent with every HTTP request.
pub const USER_AGENT: &str = concat!("quiver/", env!("CARGO_PKG_VERSION"));
