//! Single-package installation.
//!
//! [`install_package`] drives one `name[@version]` argument through the
//! flow in [`super::flow`]: parse, load recipe, resolve, skip when already
//! installed, download, materialize, and link when appropriate. Every
//! transition is reported on the argument's slot.

use std::path::{Path, PathBuf};

use quiver_schema::{PackageName, PackageSpec, Version};

use crate::link::LinkManager;
use crate::ops::flow::UnresolvedPackage;
use crate::ops::{InstallContext, InstallError};
use crate::paths::Paths;
use crate::reporter::{Level, Reporter, Slot, Working};

/// How one argument ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The version directory already existed; nothing was changed.
    AlreadyInstalled {
        /// Requested package.
        name: PackageName,
        /// Resolved version.
        version: Version,
        /// Absolute paths of the exposed binaries.
        binaries: Vec<PathBuf>,
    },
    /// A new version directory was created.
    Installed {
        /// Requested package.
        name: PackageName,
        /// Resolved version.
        version: Version,
        /// Absolute paths of the exposed binaries.
        binaries: Vec<PathBuf>,
        /// Link names created in the bin directory (empty when not switched).
        linked: Vec<String>,
        /// Bytes on disk below the version directory.
        size_bytes: u64,
    },
}

impl InstallOutcome {
    /// Package this outcome belongs to.
    pub fn name(&self) -> &PackageName {
        match self {
            Self::AlreadyInstalled { name, .. } | Self::Installed { name, .. } => name,
        }
    }

    /// Absolute paths of the exposed binaries inside the version directory.
    pub fn binaries(&self) -> &[PathBuf] {
        match self {
            Self::AlreadyInstalled { binaries, .. } | Self::Installed { binaries, .. } => binaries,
        }
    }

    /// Link names that now point at this installation.
    pub fn linked(&self) -> &[String] {
        match self {
            Self::Installed { linked, .. } => linked,
            Self::AlreadyInstalled { .. } => &[],
        }
    }
}

/// Install one argument.
///
/// With `switch`, the new version becomes active even if another version
/// already is; otherwise it only becomes active when nothing is.
///
/// # Errors
///
/// The first failing step. Steps before the download leave no trace;
/// materialize and link failures clean up the version directory.
pub async fn install_package(
    ctx: &InstallContext,
    slot: Slot,
    arg: &str,
    switch: bool,
) -> Result<InstallOutcome, InstallError> {
    ctx.reporter.set_prefix(slot, arg);
    let spec = PackageSpec::parse(arg)?;
    tracing::debug!("installing {spec}");

    let recipe = {
        let _working = Working::start(
            &*ctx.reporter,
            slot,
            &format!("Finding package recipe for {}", spec.name),
        );
        ctx.recipes.load(&spec.name)?
    };

    let resolved = UnresolvedPackage::new(spec.name, spec.version, recipe)
        .resolve(ctx, slot)
        .await?;

    let binaries: Vec<PathBuf> = resolved
        .bins
        .iter()
        .map(|b| resolved.version_dir.join(&b.target))
        .collect();

    if resolved.is_installed() {
        ctx.reporter.status(slot, Level::Muted, "Already installed!");
        return Ok(InstallOutcome::AlreadyInstalled {
            name: resolved.name,
            version: resolved.version,
            binaries,
        });
    }

    let installed = resolved
        .download(ctx, slot)
        .await?
        .materialize(ctx, slot)
        .await?;
    let resolved = installed.resolved;

    let links = LinkManager::new(&ctx.paths);
    let active = match links.check_using(&resolved.name) {
        Ok(active) => active,
        Err(e) => {
            cleanup_partial(&ctx.paths, &resolved.name, &resolved.version_dir);
            return Err(e.into());
        }
    };

    let mut linked = Vec::new();
    if switch || active.is_none() {
        if let Err(e) = links.create_links(&resolved.name, &resolved.extract_stem, &resolved.bins)
        {
            cleanup_partial(&ctx.paths, &resolved.name, &resolved.version_dir);
            return Err(e.into());
        }
        links.write_using(&resolved.name, &resolved.extract_stem)?;
        ctx.reporter.status(
            slot,
            Level::Info,
            &format!("Now using {}@{}", resolved.name, resolved.version),
        );
        linked = resolved.bins.iter().map(|b| b.link_name.clone()).collect();
    }

    ctx.reporter.status(
        slot,
        Level::Success,
        &format!(
            "Successfully installed! ({})",
            format_size(installed.size_bytes)
        ),
    );

    Ok(InstallOutcome::Installed {
        name: resolved.name,
        version: resolved.version,
        binaries,
        linked,
        size_bytes: installed.size_bytes,
    })
}

/// Remove a failed version directory, then the package directory if no
/// other version is left in it.
///
/// Never touches the bin directory or the ActiveUse marker, and never
/// removes anything that is not a direct child of the package directory.
pub fn cleanup_partial(paths: &Paths, name: &PackageName, version_dir: &Path) {
    let package_dir = paths.package_dir(name);
    let is_child = version_dir.parent() == Some(package_dir.as_path())
        && version_dir
            .file_name()
            .is_some_and(|n| n != "." && n != "..");
    if !is_child {
        tracing::warn!(
            "not removing {}: outside {}",
            version_dir.display(),
            package_dir.display()
        );
        return;
    }

    if version_dir.exists() {
        if let Err(e) = std::fs::remove_dir_all(version_dir) {
            tracing::warn!("failed to remove {}: {e}", version_dir.display());
            return;
        }
    }

    let remaining = match LinkManager::new(paths).installed_versions(name) {
        Ok(versions) => versions,
        Err(e) => {
            tracing::warn!("failed to list versions of {name}: {e}");
            return;
        }
    };
    if remaining.is_empty() {
        if let Err(e) = std::fs::remove_dir_all(&package_dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("failed to remove {}: {e}", package_dir.display());
            }
        }
    }
}

/// Warn when the bin directory is not on `PATH` or a linked binary is
/// shadowed by an earlier `PATH` entry.
pub fn perform_ux_checks(paths: &Paths, link_names: &[String], reporter: &dyn Reporter) {
    let path_env = std::env::var_os("PATH").unwrap_or_default();
    let is_in_path = std::env::split_paths(&path_env).any(|p| p == paths.bin_dir);

    if !is_in_path {
        reporter.warning(&format!("{} is not in your PATH.", paths.bin_dir.display()));
        reporter.info(&format!(
            "Add this to your shell profile: export PATH=\"{}:$PATH\"",
            paths.bin_dir.display()
        ));
        return;
    }

    for name in link_names {
        if let Ok(path) = which::which(name) {
            if !paths.is_bin_path(&path) {
                reporter.warning(&format!(
                    "'{}' is shadowed by {}",
                    name,
                    path.display()
                ));
            }
        }
    }
}

pub(crate) fn calculate_dir_size(path: &Path) -> u64 {
    walkdir::WalkDir::new(path)
        .into_iter()
        .flatten()
        .filter_map(|e| e.metadata().ok())
        .filter(std::fs::Metadata::is_file)
        .map(|m| m.len())
        .sum()
}

/// Human-readable byte count (`1.5 MB`).
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_calculate_dir_size() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/one"), [0u8; 10]).unwrap();
        fs::write(dir.path().join("a/b/two"), [0u8; 32]).unwrap();
        assert_eq!(calculate_dir_size(dir.path()), 42);
    }

    #[test]
    fn test_cleanup_removes_empty_package_dir() {
        let home = tempfile::tempdir().unwrap();
        let paths = Paths::new(home.path());
        let name = PackageName::new("foo");
        let version_dir = paths.version_dir(&name, &Version::from("1.0.0"));
        fs::create_dir_all(version_dir.join("bin")).unwrap();

        cleanup_partial(&paths, &name, &version_dir);
        assert!(!version_dir.exists());
        assert!(!paths.package_dir(&name).exists());
    }

    #[test]
    fn test_cleanup_keeps_other_versions_and_marker() {
        let home = tempfile::tempdir().unwrap();
        let paths = Paths::new(home.path());
        let name = PackageName::new("foo");
        let old = paths.version_dir(&name, &Version::from("1.0.0"));
        let new = paths.version_dir(&name, &Version::from("2.0.0"));
        fs::create_dir_all(&old).unwrap();
        fs::create_dir_all(&new).unwrap();
        fs::write(paths.using_marker(&name), "foo-1.0.0").unwrap();

        cleanup_partial(&paths, &name, &new);
        assert!(!new.exists());
        assert!(old.is_dir());
        assert_eq!(
            fs::read_to_string(paths.using_marker(&name)).unwrap(),
            "foo-1.0.0"
        );
    }

    #[test]
    fn test_cleanup_refuses_paths_outside_package_dir() {
        let home = tempfile::tempdir().unwrap();
        let paths = Paths::new(home.path().join(".quiver"));
        let name = PackageName::new("foo");
        let outside = home.path().join("escaped");
        fs::create_dir_all(&outside).unwrap();
        fs::create_dir_all(paths.package_dir(&name).join("foo-x")).unwrap();

        let sneaky = paths.package_dir(&name).join("foo-x/../../../../escaped");
        cleanup_partial(&paths, &name, &sneaky);
        cleanup_partial(&paths, &name, &outside);
        assert!(outside.is_dir());
        assert!(paths.package_dir(&name).join("foo-x").is_dir());
    }

    #[test]
    fn test_cleanup_ignores_missing_dir() {
        let home = tempfile::tempdir().unwrap();
        let paths = Paths::new(home.path());
        let name = PackageName::new("foo");
        let version_dir = paths.version_dir(&name, &Version::from("1.0.0"));
        cleanup_partial(&paths, &name, &version_dir);
        assert!(!paths.package_dir(&name).exists());
    }
}
