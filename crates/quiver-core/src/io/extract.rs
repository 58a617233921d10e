//! Archive extraction module
//!
//! Handles zip, tar, tar.gz, tar.xz, tar.zst and single-file gzip artifacts.
//! Everything is extracted into a staging directory under the scratch root
//! first and only renamed into the package tree once it is complete, so a
//! failed extraction never leaves a half-populated version directory.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use quiver_schema::{ArchiveFormat, PackageName};
use thiserror::Error;
use zip::ZipArchive;
use zstd::stream::Decoder as ZstdDecoder;

/// Why an artifact could not be materialized.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The recipe extension is not a known archive format.
    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(String),

    /// Corrupt or unreadable archive.
    #[error("Archive error: {0}")]
    Archive(String),

    /// An entry, or the target of a link entry, leaves the destination.
    #[error("Archive entry escapes the destination: {}", .0.display())]
    UnsafePath(PathBuf),

    /// `extract_has_root` was set but the archive is not a single directory.
    #[error("Expected a single top-level directory in the archive, found {found} entries")]
    MissingRoot {
        /// Top-level entries found.
        found: usize,
    },

    /// The version directory is already there.
    #[error("Destination already exists: {}", .0.display())]
    Exists(PathBuf),
}

/// Everything an [`Unpacker`] needs to materialize one version.
#[derive(Debug, Clone)]
pub struct UnpackRequest {
    /// Downloaded artifact.
    pub archive: PathBuf,
    /// Package being installed.
    pub name: PackageName,
    /// Directory name of the version (`<name>-<version>`).
    pub extract_stem: String,
    /// Recipe extension of the artifact.
    pub ext: String,
    /// Strip exactly one enclosing directory.
    pub has_root: bool,
    /// Final version directory; must not exist yet.
    pub dest: PathBuf,
    /// Where staging directories may be created.
    pub staging_root: PathBuf,
}

/// Turns a downloaded archive into a version directory.
pub trait Unpacker: Send + Sync {
    /// Unpack `req.archive` so that its contents end up at `req.dest`.
    ///
    /// # Errors
    ///
    /// On any failure `req.dest` is left absent.
    fn unpack(&self, req: &UnpackRequest) -> Result<(), ExtractError>;
}

/// The built-in [`Unpacker`] for every [`ArchiveFormat`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveUnpacker;

impl Unpacker for ArchiveUnpacker {
    fn unpack(&self, req: &UnpackRequest) -> Result<(), ExtractError> {
        if req.dest.exists() {
            return Err(ExtractError::Exists(req.dest.clone()));
        }
        let format = ArchiveFormat::from_ext(&req.ext)
            .ok_or_else(|| ExtractError::UnsupportedFormat(req.ext.clone()))?;

        fs::create_dir_all(&req.staging_root)?;
        let staging = tempfile::Builder::new()
            .prefix(&format!(".{}-", req.extract_stem))
            .tempdir_in(&req.staging_root)?;
        let tree = staging.path().join("tree");

        tracing::debug!(
            "unpacking {} ({format}) for {} into {}",
            req.archive.display(),
            req.name,
            tree.display()
        );
        extract_archive(format, &req.archive, &tree)?;

        let source = if req.has_root && format.is_tree() {
            single_root(&tree)?
        } else {
            tree
        };

        if let Some(parent) = req.dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&source, &req.dest)?;
        Ok(())
    }
}

/// Extract `archive` of the given format into `dest_dir`.
///
/// # Errors
///
/// Corrupt archives, entries escaping `dest_dir`, and IO failures.
pub fn extract_archive(
    format: ArchiveFormat,
    archive: &Path,
    dest_dir: &Path,
) -> Result<(), ExtractError> {
    let reader = BufReader::new(File::open(archive)?);
    match format {
        ArchiveFormat::Zip => extract_zip(archive, dest_dir),
        ArchiveFormat::Tar => extract_tar(reader, dest_dir),
        ArchiveFormat::TarGz => extract_tar(flate2::read::GzDecoder::new(reader), dest_dir),
        ArchiveFormat::TarXz => extract_tar(xz2::read::XzDecoder::new(reader), dest_dir),
        ArchiveFormat::TarZst => extract_tar(ZstdDecoder::new(reader)?, dest_dir),
        ArchiveFormat::Gz => extract_gz(reader, archive, dest_dir),
    }
}

/// Reject absolute paths and `..` components.
fn safe_relative(path: &Path) -> Result<PathBuf, ExtractError> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ExtractError::UnsafePath(path.to_path_buf()));
            }
        }
    }
    Ok(out)
}

fn extract_tar<R: Read>(reader: R, dest_dir: &Path) -> Result<(), ExtractError> {
    fs::create_dir_all(dest_dir)?;

    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let relative_path = safe_relative(&entry.path()?)?;
        if relative_path.as_os_str().is_empty() {
            continue;
        }
        check_link_target(&entry, &relative_path)?;

        // unpack_in refuses to write through symlinks that leave dest_dir
        if !entry.unpack_in(dest_dir)? {
            return Err(ExtractError::UnsafePath(relative_path));
        }
    }

    Ok(())
}

/// Symlinks and hard links must point inside the extracted tree.
fn check_link_target<R: Read>(entry: &tar::Entry<'_, R>, path: &Path) -> Result<(), ExtractError> {
    let entry_type = entry.header().entry_type();
    if !entry_type.is_symlink() && !entry_type.is_hard_link() {
        return Ok(());
    }
    let Some(target) = entry.link_name()? else {
        return Ok(());
    };
    let escapes = || ExtractError::UnsafePath(path.join(&target));

    // hard link targets are archive paths; symlink targets are relative to the link
    let base = if entry_type.is_hard_link() {
        PathBuf::new()
    } else {
        path.parent().map(Path::to_path_buf).unwrap_or_default()
    };

    let mut depth = base.components().count();
    for component in target.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => depth = depth.checked_sub(1).ok_or_else(escapes)?,
            Component::RootDir | Component::Prefix(_) => return Err(escapes()),
        }
    }
    Ok(())
}

fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<(), ExtractError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| ExtractError::Archive(e.to_string()))?;

    fs::create_dir_all(dest_dir)?;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| ExtractError::Archive(e.to_string()))?;
        let relative_path = match file.enclosed_name() {
            Some(path) => path,
            None => return Err(ExtractError::UnsafePath(PathBuf::from(file.name()))),
        };

        let absolute_path = dest_dir.join(&relative_path);
        if file.is_dir() {
            fs::create_dir_all(&absolute_path)?;
            continue;
        }
        if let Some(p) = absolute_path.parent() {
            fs::create_dir_all(p)?;
        }

        let mut outfile = File::create(&absolute_path)?;
        io::copy(&mut file, &mut outfile)?;

        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&absolute_path, fs::Permissions::from_mode(mode))?;
        }
    }

    Ok(())
}

/// A lone gzip file decompresses to its own name without `.gz`.
fn extract_gz<R: Read>(reader: R, archive: &Path, dest_dir: &Path) -> Result<(), ExtractError> {
    let name = archive
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.strip_suffix(".gz").unwrap_or(n))
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ExtractError::Archive("Invalid filename".to_string()))?;

    fs::create_dir_all(dest_dir)?;
    let out_path = dest_dir.join(name);
    let mut decoder = flate2::read::GzDecoder::new(reader);
    let mut out = File::create(&out_path)?;
    io::copy(&mut decoder, &mut out)?;
    make_executable(&out_path)?;
    Ok(())
}

/// The single top-level directory of an extracted tree.
///
/// Hidden entries and `__MACOSX` metadata are not counted.
fn single_root(tree: &Path) -> Result<PathBuf, ExtractError> {
    let entries: Vec<_> = fs::read_dir(tree)?
        .filter_map(Result::ok)
        .filter(|e| {
            let name = e.file_name();
            let name = name.to_string_lossy();
            !name.starts_with('.') && name != "__MACOSX"
        })
        .collect();

    match entries.as_slice() {
        [only] if only.file_type()?.is_dir() => Ok(only.path()),
        _ => Err(ExtractError::MissingRoot {
            found: entries.len(),
        }),
    }
}

/// Set the executable bits on `path` (no-op outside Unix).
///
/// # Errors
///
/// Propagates metadata and permission failures.
pub fn make_executable(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(perms.mode() | 0o755);
        fs::set_permissions(path, perms)?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
