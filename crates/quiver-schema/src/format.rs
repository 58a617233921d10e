//! Archive format detection from a recipe extension.

use std::fmt;

/// Container format of a downloaded artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    /// `.zip`
    Zip,
    /// Plain `.tar`
    Tar,
    /// `.tar.gz` / `.tgz`
    TarGz,
    /// `.tar.xz` / `.txz`
    TarXz,
    /// `.tar.zst` / `.tzst`
    TarZst,
    /// A single gzip-compressed file.
    Gz,
}

impl ArchiveFormat {
    /// Detect the format from an extension such as `tar.gz` (leading dot optional).
    ///
    /// Returns `None` for extensions that are not archives (`exe`, empty, ...).
    pub fn from_ext(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_lowercase();
        match ext.as_str() {
            "zip" => Some(Self::Zip),
            "tar" => Some(Self::Tar),
            "tar.gz" | "tgz" => Some(Self::TarGz),
            "tar.xz" | "txz" => Some(Self::TarXz),
            "tar.zst" | "tzst" => Some(Self::TarZst),
            "gz" => Some(Self::Gz),
            _ => None,
        }
    }

    /// Whether the format holds a directory tree rather than one file.
    pub fn is_tree(&self) -> bool {
        !matches!(self, Self::Gz)
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Zip => "zip",
            Self::Tar => "tar",
            Self::TarGz => "tar.gz",
            Self::TarXz => "tar.xz",
            Self::TarZst => "tar.zst",
            Self::Gz => "gz",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_aliases() {
        assert_eq!(ArchiveFormat::from_ext("tgz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_ext(".tar.gz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_ext("TXZ"), Some(ArchiveFormat::TarXz));
        assert_eq!(ArchiveFormat::from_ext("tzst"), Some(ArchiveFormat::TarZst));
    }

    #[test]
    fn test_non_archives() {
        assert_eq!(ArchiveFormat::from_ext(""), None);
        assert_eq!(ArchiveFormat::from_ext("exe"), None);
        assert_eq!(ArchiveFormat::from_ext("dmg"), None);
    }

    #[test]
    fn test_single_file_gzip() {
        let gz = ArchiveFormat::from_ext("gz").unwrap();
        assert!(!gz.is_tree());
        assert!(ArchiveFormat::Zip.is_tree());
    }
}
