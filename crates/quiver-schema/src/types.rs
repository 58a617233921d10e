//! Package names, versions and the extract stem that ties them to a directory.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

/// A normalized package name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageName(String);

impl PackageName {
    /// Create a new package name, normalizing the input to lowercase.
    pub fn new(name: &str) -> Self {
        Self(name.to_lowercase())
    }

    /// Return the normalized name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the name can be used as a single directory name.
    pub fn is_path_safe(&self) -> bool {
        is_path_component(&self.0)
    }
}

impl AsRef<std::ffi::OsStr> for PackageName {
    fn as_ref(&self) -> &std::ffi::OsStr {
        self.0.as_ref()
    }
}

impl AsRef<std::path::Path> for PackageName {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }
}

impl std::fmt::Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for PackageName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for PackageName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.to_lowercase()
    }
}

impl PartialEq<&str> for PackageName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.to_lowercase()
    }
}

impl Borrow<str> for PackageName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PackageName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PackageName {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

/// A version string as published upstream (tag prefix already removed).
///
/// Ordering follows semver when both sides parse (a leading `v` is tolerated),
/// parseable versions sort above unparseable ones, and two unparseable
/// versions fall back to string comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version(String);

impl Version {
    /// Create a new version from the given string (stored as-is).
    pub fn new(v: &str) -> Self {
        Self(v.to_string())
    }

    /// Return the version string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the version can be embedded in a directory name without
    /// leaving that directory.
    pub fn is_path_safe(&self) -> bool {
        is_path_component(&self.0)
    }

    fn semver(&self) -> Option<semver::Version> {
        semver::Version::parse(self.0.trim_start_matches('v')).ok()
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self.semver(), other.semver()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => std::cmp::Ordering::Greater,
            (None, Some(_)) => std::cmp::Ordering::Less,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for Version {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for Version {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Version {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<str> for Version {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Version {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A non-empty string with no separators, no control characters, and not
/// `.` or `..`.
fn is_path_component(s: &str) -> bool {
    !s.is_empty()
        && s != "."
        && s != ".."
        && !s.contains(['/', '\\'])
        && !s.chars().any(char::is_control)
}

/// Directory name of one installed version: `<name>-<version>`.
///
/// Pure function of its inputs, so every install attempt for the same pair
/// lands in the same directory.
pub fn extract_stem(name: &PackageName, version: &Version) -> String {
    format!("{name}-{version}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_name_is_lowercased() {
        let name = PackageName::new("RipGrep");
        assert_eq!(name.as_str(), "ripgrep");
        assert_eq!(name, "RIPGREP");
    }

    #[test]
    fn test_version_ordering_prefers_semver() {
        let mut versions: Vec<Version> = ["1.10.0", "1.2.0", "nightly", "v1.9.3"]
            .into_iter()
            .map(Version::from)
            .collect();
        versions.sort();
        let sorted: Vec<&str> = versions.iter().map(Version::as_str).collect();
        assert_eq!(sorted, vec!["nightly", "1.2.0", "v1.9.3", "1.10.0"]);
    }

    #[test]
    fn test_prerelease_sorts_below_release() {
        assert!(Version::from("2.0.0-rc.1") < Version::from("2.0.0"));
    }

    #[test]
    fn test_path_safety() {
        for ok in ["1.2.3", "v2.0.0-rc.1", "2024.01.05", "1..2"] {
            assert!(Version::from(ok).is_path_safe(), "{ok}");
        }
        for bad in ["", ".", "..", "x/../../escaped", "release/1.0", "1.0\\..", "1.0\n"] {
            assert!(!Version::from(bad).is_path_safe(), "{bad:?}");
        }
        assert!(PackageName::new("ripgrep").is_path_safe());
        assert!(!PackageName::new("../ripgrep").is_path_safe());
    }

    #[test]
    fn test_extract_stem_is_deterministic() {
        let name = PackageName::new("foo");
        let version = Version::from("2.3.0");
        assert_eq!(extract_stem(&name, &version), "foo-2.3.0");
        assert_eq!(extract_stem(&name, &version), extract_stem(&name, &version));
    }
}
