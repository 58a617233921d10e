//! Command-line package requests (`name` or `name@version`).

use crate::types::{PackageName, Version};
use thiserror::Error;

/// A malformed `name[@version]` argument.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid package argument '{0}': expected 'name' or 'name@version'")]
pub struct ArgumentFormatError(pub String);

/// A package requested on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageSpec {
    /// Requested package.
    pub name: PackageName,
    /// Pinned version; `None` means "latest".
    pub version: Option<Version>,
}

impl PackageSpec {
    /// Parse `name` or `name@version`. `name@latest` is the same as `name`.
    ///
    /// # Errors
    ///
    /// Fails on more than one `@`, an empty name or version, or a name or
    /// version that is not usable as a directory name (separators, `..`,
    /// control characters).
    pub fn parse(input: &str) -> Result<Self, ArgumentFormatError> {
        let bad = || ArgumentFormatError(input.to_string());
        let mut parts = input.split('@');
        let name = parts.next().unwrap_or_default().trim();
        let version = parts.next().map(str::trim);
        if parts.next().is_some() || name.is_empty() {
            return Err(bad());
        }

        let version = match version {
            None | Some("latest") => None,
            Some(v) => Some(Version::from(v)),
        };
        let name = PackageName::new(name);
        if !name.is_path_safe() || version.as_ref().is_some_and(|v| !v.is_path_safe()) {
            return Err(bad());
        }

        Ok(Self { name, version })
    }
}

impl std::fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}@{v}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

impl std::str::FromStr for PackageSpec {
    type Err = ArgumentFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
