//! Platform vocabulary shared by recipes and the resolver.
//!
//! Recipes name operating systems with short keys (`win`, `mac`, `linux`)
//! and architectures with Go-style keys (`amd64`, `arm64`, `386`, `arm`).
//! Host identifiers (`std::env::consts::{OS, ARCH}`) are translated into
//! that vocabulary here, through a fixed table.
//!
//! # Example
//!
//! ```
//! use quiver_schema::{Arch, Os};
//!
//! assert_eq!(Os::from_host("darwin"), Some(Os::Mac));
//! assert_eq!(Arch::from_host("x86_64"), Some(Arch::Amd64));
//! ```

use serde::{Deserialize, Serialize};

/// Operating system key as used in recipes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    /// Microsoft Windows.
    Win,
    /// macOS.
    Mac,
    /// Linux-based operating systems.
    Linux,
}

impl Os {
    /// Every OS key a recipe may declare.
    pub const ALL: [Os; 3] = [Os::Win, Os::Mac, Os::Linux];

    /// Translate a host OS identifier (Go or Rust naming) into a recipe key.
    pub fn from_host(host: &str) -> Option<Self> {
        match host {
            "windows" => Some(Self::Win),
            "darwin" | "macos" => Some(Self::Mac),
            "linux" => Some(Self::Linux),
            _ => None,
        }
    }

    /// Recipe key for this OS.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Win => "win",
            Self::Mac => "mac",
            Self::Linux => "linux",
        }
    }

    /// Host-side name, used when displaying simulated platforms.
    pub fn host_name(&self) -> &'static str {
        match self {
            Self::Win => "windows",
            Self::Mac => "darwin",
            Self::Linux => "linux",
        }
    }
}

impl std::fmt::Display for Os {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Os {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "win" => Ok(Self::Win),
            "mac" => Ok(Self::Mac),
            "linux" => Ok(Self::Linux),
            _ => Err(format!("Unknown OS key: {s} (expected win, mac or linux)")),
        }
    }
}

/// CPU architecture key as used in recipes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Arch {
    /// Intel/AMD 64-bit.
    #[serde(rename = "amd64")]
    Amd64,
    /// ARM 64-bit.
    #[serde(rename = "arm64")]
    Arm64,
    /// Intel 32-bit.
    #[serde(rename = "386")]
    X86,
    /// ARM 32-bit.
    #[serde(rename = "arm")]
    Arm,
}

impl Arch {
    /// Translate a host architecture identifier into a recipe key.
    pub fn from_host(host: &str) -> Option<Self> {
        match host {
            "x86_64" | "amd64" => Some(Self::Amd64),
            "aarch64" | "arm64" => Some(Self::Arm64),
            "x86" | "386" => Some(Self::X86),
            "arm" => Some(Self::Arm),
            _ => None,
        }
    }

    /// Recipe key for this architecture.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amd64 => "amd64",
            Self::Arm64 => "arm64",
            Self::X86 => "386",
            Self::Arm => "arm",
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "amd64" => Ok(Self::Amd64),
            "arm64" => Ok(Self::Arm64),
            "386" => Ok(Self::X86),
            "arm" => Ok(Self::Arm),
            _ => Err(format!(
                "Unknown architecture key: {s} (expected amd64, arm64, 386 or arm)"
            )),
        }
    }
}

/// An (OS, architecture) pair in recipe vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
    /// Normalized operating system.
    pub os: Os,
    /// Normalized architecture.
    pub arch: Arch,
}

impl Platform {
    /// Create a platform from already-normalized keys.
    pub fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Normalize raw host identifiers.
    ///
    /// # Errors
    ///
    /// Returns the offending identifier when either side has no recipe key.
    pub fn from_host(os: &str, arch: &str) -> Result<Self, String> {
        let os = Os::from_host(os).ok_or_else(|| format!("Unsupported host OS: {os}"))?;
        let arch =
            Arch::from_host(arch).ok_or_else(|| format!("Unsupported host architecture: {arch}"))?;
        Ok(Self { os, arch })
    }

    /// The platform this binary is running on.
    ///
    /// # Errors
    ///
    /// Fails on hosts outside the recipe vocabulary (e.g. FreeBSD).
    pub fn current() -> Result<Self, String> {
        Self::from_host(std::env::consts::OS, std::env::consts::ARCH)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}
