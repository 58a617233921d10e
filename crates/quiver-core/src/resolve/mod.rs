//! Resolution steps that run before any side effect: platform support,
//! version selection and artifact location.

pub mod asset;
pub mod platform;
pub mod version;

pub use asset::{AssetError, BinLink, ResolvedAsset, resolve_asset, resolve_bins};
pub use platform::{PlatformError, check_platform};
pub use version::{UpstreamVersions, VersionError, VersionFinder, resolve_version};
