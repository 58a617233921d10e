//! Shared bin links and the active-version marker.
//!
//! A package is *active* at one extract stem, recorded in
//! `pkg/<name>/.using`. Switching creates one bin entry per exposed binary
//! and only then rewrites the marker.
//!
//! Links are staged under temporary names next to their final location and
//! renamed over it, so every entry flips atomically. If anything fails, the
//! entries already flipped are restored and the bin directory is left as it
//! was.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use quiver_schema::PackageName;
use thiserror::Error;

use crate::ops::FatalError;
use crate::paths::Paths;
use crate::resolve::BinLink;

/// Why the bin links or the active-version marker could not be handled.
#[derive(Error, Debug)]
pub enum LinkError {
    /// A bin entry names a file the version directory does not contain.
    #[error("binary not found in package: {}", .0.display())]
    MissingTarget(PathBuf),

    /// Two bin entries resolve to the same link name.
    #[error("two binaries would be linked as '{0}'")]
    Duplicate(String),

    /// Creating or renaming a bin entry failed.
    #[error("failed to link {}: {source}", path.display())]
    Io {
        /// Entry being written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The active-version marker exists but cannot be read.
    #[error("failed to read the active version of {name}: {source}")]
    Marker {
        /// Package whose marker was read.
        name: PackageName,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl LinkError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Creates bin links and reads/writes ActiveUse markers within one [`Paths`].
#[derive(Debug, Clone, Copy)]
pub struct LinkManager<'a> {
    paths: &'a Paths,
}

impl<'a> LinkManager<'a> {
    /// Manage links and markers below `paths`.
    pub fn new(paths: &'a Paths) -> Self {
        Self { paths }
    }

    /// Extract stem currently active for `name`.
    ///
    /// A marker naming a version that no longer exists on disk counts as
    /// no active version.
    ///
    /// # Errors
    ///
    /// [`LinkError::Marker`] when the marker exists but cannot be read.
    pub fn check_using(&self, name: &PackageName) -> Result<Option<String>, LinkError> {
        let marker = self.paths.using_marker(name);
        let stem = match fs::read_to_string(&marker) {
            Ok(content) => content.trim().to_string(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(LinkError::Marker {
                    name: name.clone(),
                    source,
                });
            }
        };
        if stem.is_empty() {
            return Ok(None);
        }
        if !self.paths.package_dir(name).join(&stem).is_dir() {
            tracing::warn!("{} points at missing version {stem}", marker.display());
            return Ok(None);
        }
        Ok(Some(stem))
    }

    /// Record `extract_stem` as the active version of `name`.
    ///
    /// # Errors
    ///
    /// Any failure is fatal: links already point at the new version.
    pub fn write_using(&self, name: &PackageName, extract_stem: &str) -> Result<(), FatalError> {
        let marker = self.paths.using_marker(name);
        let tmp = marker.with_extension("tmp");
        let write = || -> io::Result<()> {
            fs::write(&tmp, extract_stem)?;
            fs::rename(&tmp, &marker)
        };
        write().map_err(|source| {
            fs::remove_file(&tmp).ok();
            FatalError::MarkerWrite {
                name: name.clone(),
                source,
            }
        })
    }

    /// Installed versions of `name` (non-hidden subdirectories), sorted.
    ///
    /// # Errors
    ///
    /// The package directory exists but cannot be listed.
    pub fn installed_versions(&self, name: &PackageName) -> io::Result<Vec<String>> {
        let dir = self.paths.package_dir(name);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut versions: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| !n.starts_with('.'))
            .collect();
        versions.sort();
        Ok(versions)
    }

    /// Point one bin entry per `bins` item at the version `extract_stem`.
    ///
    /// Returns the absolute targets, in order.
    ///
    /// # Errors
    ///
    /// A missing target or a filesystem failure; the bin directory is
    /// unchanged in that case.
    pub fn create_links(
        &self,
        name: &PackageName,
        extract_stem: &str,
        bins: &[BinLink],
    ) -> Result<Vec<PathBuf>, LinkError> {
        let version_dir = self.paths.package_dir(name).join(extract_stem);
        let bin_dir = &self.paths.bin_dir;

        let mut seen = HashSet::new();
        let mut plan = Vec::with_capacity(bins.len());
        for bin in bins {
            if !seen.insert(bin.link_name.as_str()) {
                return Err(LinkError::Duplicate(bin.link_name.clone()));
            }
            let target = version_dir.join(&bin.target);
            if !target.exists() {
                return Err(LinkError::MissingTarget(target));
            }
            plan.push((target, bin_dir.join(&bin.link_name)));
        }

        fs::create_dir_all(bin_dir).map_err(LinkError::io(bin_dir))?;

        let mut staged: Vec<(PathBuf, &Path)> = Vec::with_capacity(plan.len());
        for (target, link) in &plan {
            let stage = staging_path(link, extract_stem);
            let result = remove_if_present(&stage).and_then(|()| symlink(target, &stage));
            if let Err(source) = result {
                discard(staged.iter().map(|(s, _)| s.as_path()));
                return Err(LinkError::Io {
                    path: stage,
                    source,
                });
            }
            staged.push((stage, link.as_path()));
        }

        let mut committed: Vec<(&Path, Option<PathBuf>)> = Vec::with_capacity(staged.len());
        for (i, (stage, link)) in staged.iter().enumerate() {
            let previous = fs::read_link(link).ok();
            if let Err(source) = fs::rename(stage, link) {
                restore(&committed, extract_stem);
                discard(staged[i..].iter().map(|(s, _)| s.as_path()));
                return Err(LinkError::Io {
                    path: link.to_path_buf(),
                    source,
                });
            }
            committed.push((*link, previous));
        }

        tracing::debug!("linked {} binaries for {name} -> {extract_stem}", plan.len());
        Ok(plan.into_iter().map(|(target, _)| target).collect())
    }
}

fn staging_path(link: &Path, extract_stem: &str) -> PathBuf {
    let file = link
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    link.with_file_name(format!(".{file}.{extract_stem}.tmp"))
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn discard<'p>(stages: impl Iterator<Item = &'p Path>) {
    for stage in stages {
        if let Err(e) = remove_if_present(stage) {
            tracing::warn!("failed to remove staged link {}: {e}", stage.display());
        }
    }
}

/// Put back what the already-renamed links pointed at before.
fn restore(committed: &[(&Path, Option<PathBuf>)], extract_stem: &str) {
    for (link, previous) in committed.iter().rev() {
        let result = match previous {
            Some(old) => {
                let stage = staging_path(link, extract_stem);
                remove_if_present(&stage)
                    .and_then(|()| symlink(old, &stage))
                    .and_then(|()| fs::rename(&stage, link))
            }
            None => remove_if_present(link),
        };
        if let Err(e) = result {
            tracing::warn!("failed to restore {}: {e}", link.display());
        }
    }
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use quiver_schema::Version;

    fn setup() -> (tempfile::TempDir, Paths, PackageName) {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path());
        paths.ensure().unwrap();
        (dir, paths, PackageName::new("foo"))
    }

    fn install_version(paths: &Paths, name: &PackageName, version: &str, files: &[&str]) -> String {
        let version_dir = paths.version_dir(name, &Version::from(version));
        for file in files {
            let path = version_dir.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, version).unwrap();
        }
        version_dir.file_name().unwrap().to_string_lossy().into_owned()
    }

    fn bin(target: &str, link: &str) -> BinLink {
        BinLink {
            target: PathBuf::from(target),
            link_name: link.to_string(),
        }
    }

    #[test]
    fn test_links_point_into_version_dir() {
        let (_dir, paths, name) = setup();
        let stem = install_version(&paths, &name, "1.0.0", &["bin/foo", "foo-helper"]);
        let manager = LinkManager::new(&paths);

        let targets = manager
            .create_links(
                &name,
                &stem,
                &[bin("bin/foo", "foo"), bin("foo-helper", "fh")],
            )
            .unwrap();

        let version_dir = paths.package_dir(&name).join(&stem);
        assert_eq!(targets[0], version_dir.join("bin/foo"));
        assert_eq!(
            fs::read_link(paths.bin_dir.join("foo")).unwrap(),
            version_dir.join("bin/foo")
        );
        assert_eq!(fs::read_to_string(paths.bin_dir.join("fh")).unwrap(), "1.0.0");
        // no staging leftovers
        assert_eq!(fs::read_dir(&paths.bin_dir).unwrap().count(), 2);
    }

    #[test]
    fn test_switch_overwrites_existing_link() {
        let (_dir, paths, name) = setup();
        let old = install_version(&paths, &name, "1.0.0", &["foo"]);
        let new = install_version(&paths, &name, "2.0.0", &["foo"]);
        let manager = LinkManager::new(&paths);

        manager.create_links(&name, &old, &[bin("foo", "foo")]).unwrap();
        manager.create_links(&name, &new, &[bin("foo", "foo")]).unwrap();

        assert_eq!(fs::read_to_string(paths.bin_dir.join("foo")).unwrap(), "2.0.0");
    }

    #[test]
    fn test_missing_target_touches_nothing() {
        let (_dir, paths, name) = setup();
        let old = install_version(&paths, &name, "1.0.0", &["foo"]);
        let new = install_version(&paths, &name, "2.0.0", &["foo"]);
        let manager = LinkManager::new(&paths);
        manager.create_links(&name, &old, &[bin("foo", "foo")]).unwrap();

        let err = manager
            .create_links(&name, &new, &[bin("foo", "foo"), bin("missing", "missing")])
            .unwrap_err();

        assert!(matches!(err, LinkError::MissingTarget(_)));
        assert_eq!(fs::read_to_string(paths.bin_dir.join("foo")).unwrap(), "1.0.0");
        assert!(!paths.bin_dir.join("missing").exists());
    }

    #[test]
    fn test_duplicate_link_names_rejected() {
        let (_dir, paths, name) = setup();
        let stem = install_version(&paths, &name, "1.0.0", &["a", "b"]);
        let err = LinkManager::new(&paths)
            .create_links(&name, &stem, &[bin("a", "x"), bin("b", "x")])
            .unwrap_err();
        assert!(matches!(err, LinkError::Duplicate(_)));
    }

    #[test]
    fn test_using_marker_round_trip() {
        let (_dir, paths, name) = setup();
        let manager = LinkManager::new(&paths);
        assert_eq!(manager.check_using(&name).unwrap(), None);

        let stem = install_version(&paths, &name, "1.0.0", &["foo"]);
        manager.write_using(&name, &stem).unwrap();
        assert_eq!(manager.check_using(&name).unwrap(), Some(stem.clone()));

        fs::remove_dir_all(paths.package_dir(&name).join(&stem)).unwrap();
        assert_eq!(manager.check_using(&name).unwrap(), None);
    }

    #[test]
    fn test_unreadable_marker_is_a_link_error() {
        let (_dir, paths, name) = setup();
        fs::create_dir_all(paths.using_marker(&name)).unwrap();

        let err = LinkManager::new(&paths).check_using(&name).unwrap_err();
        assert!(matches!(err, LinkError::Marker { .. }), "{err:?}");
    }

    #[test]
    fn test_installed_versions_skip_hidden() {
        let (_dir, paths, name) = setup();
        let manager = LinkManager::new(&paths);
        assert!(manager.installed_versions(&name).unwrap().is_empty());

        install_version(&paths, &name, "2.0.0", &["foo"]);
        install_version(&paths, &name, "1.0.0", &["foo"]);
        fs::create_dir_all(paths.package_dir(&name).join(".staging")).unwrap();
        fs::write(paths.using_marker(&name), "foo-1.0.0").unwrap();

        assert_eq!(
            manager.installed_versions(&name).unwrap(),
            vec!["foo-1.0.0", "foo-2.0.0"]
        );
    }
}
