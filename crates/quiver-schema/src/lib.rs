//! Shared types for quiver: package names and versions, the platform
//! vocabulary, and the validated recipe model.

pub mod format;
pub mod platform;
pub mod recipe;
pub mod template;
pub mod types;
pub mod version;

// Re-exports
pub use format::ArchiveFormat;
pub use platform::{Arch, Os, Platform};
pub use recipe::{
    AssetTemplate, BinSpec, PackageRecipe, RecipeError, TagPattern, VersionSource,
};
pub use types::*;
pub use version::{ArgumentFormatError, PackageSpec};
