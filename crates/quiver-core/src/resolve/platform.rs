//! Platform support checks.

use quiver_schema::{PackageName, PackageRecipe, Platform};
use thiserror::Error;

/// The package cannot be installed on the target platform.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The recipe declares no asset for the OS.
    #[error("{name} does not support the OS '{}'", .platform.os)]
    Os {
        /// Package checked.
        name: PackageName,
        /// Target platform.
        platform: Platform,
    },

    /// The recipe declares no token for the architecture.
    #[error("{name} does not support the architecture '{}'", .platform.arch)]
    Arch {
        /// Package checked.
        name: PackageName,
        /// Target platform.
        platform: Platform,
    },

    /// The OS and architecture pair is on the recipe's ignore list.
    #[error("unsupported OS + Arch for this package ({platform})")]
    Ignored {
        /// Package checked.
        name: PackageName,
        /// Target platform.
        platform: Platform,
    },

    /// The host OS or architecture has no name in the platform vocabulary.
    #[error("{0}")]
    Host(String),
}

/// Fail unless `recipe` can be installed on `platform`.
///
/// Pure: no network or filesystem access.
///
/// # Errors
///
/// The OS or architecture is undeclared, or the pair is ignored.
pub fn check_platform(recipe: &PackageRecipe, platform: Platform) -> Result<(), PlatformError> {
    let name = || recipe.title.clone();
    if !recipe.assets.contains_key(&platform.os) {
        return Err(PlatformError::Os {
            name: name(),
            platform,
        });
    }
    if !recipe.arch_tokens.contains_key(&platform.arch) {
        return Err(PlatformError::Arch {
            name: name(),
            platform,
        });
    }
    if recipe.is_ignored(platform) {
        return Err(PlatformError::Ignored {
            name: name(),
            platform,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_schema::{Arch, Os};

    const RECIPE: &str = r#"
[package]
title = "foo"

[versions]
manual = ["1.0.0"]

[download]
url = "https://example.com/{{version}}/{{stem}}.{{ext}}"
stem = "foo-{{os}}-{{arch}}"
ext = "zip"

[platforms.linux]
[platforms.mac]

[arch]
amd64 = "x86_64"
arm64 = "aarch64"

[[ignore]]
os = "mac"
arch = "amd64"
"#;

    fn recipe() -> PackageRecipe {
        PackageRecipe::parse(&PackageName::new("foo"), RECIPE).unwrap()
    }

    #[test]
    fn test_supported_pair() {
        assert!(check_platform(&recipe(), Platform::new(Os::Linux, Arch::Amd64)).is_ok());
        assert!(check_platform(&recipe(), Platform::new(Os::Mac, Arch::Arm64)).is_ok());
    }

    #[test]
    fn test_unsupported_os_and_arch() {
        assert!(matches!(
            check_platform(&recipe(), Platform::new(Os::Win, Arch::Amd64)),
            Err(PlatformError::Os { .. })
        ));
        assert!(matches!(
            check_platform(&recipe(), Platform::new(Os::Linux, Arch::X86)),
            Err(PlatformError::Arch { .. })
        ));
    }

    #[test]
    fn test_ignored_pair() {
        assert!(matches!(
            check_platform(&recipe(), Platform::new(Os::Mac, Arch::Amd64)),
            Err(PlatformError::Ignored { .. })
        ));
    }
}
