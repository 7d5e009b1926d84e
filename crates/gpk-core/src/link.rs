//! Executable linking into `.bin` directories.
//!
//! Each entry of a package's `bin` map becomes a relative symlink in
//! the bin directory (the root's `node_modules/.bin`, or the global
//! bin root). Windows additionally gets a `.cmd` shim that invokes the
//! runtime with the target file.

use crate::error::{Error, Result};
use crate::manifest::Manifest;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Link every executable of `manifest` from `bin_dir` into
/// `install_dir`.
///
/// A symlink already pointing at the right target is left intact; a
/// symlink pointing elsewhere, or a regular file in the way, is a
/// `LinkConflict`.
pub fn link_bins(bin_dir: &Path, install_dir: &Path, manifest: &Manifest) -> Result<Vec<PathBuf>> {
    let Some(bins) = &manifest.bin else {
        return Ok(Vec::new());
    };
    if bins.is_empty() {
        return Ok(Vec::new());
    }

    fs::create_dir_all(bin_dir)?;
    let mut linked = Vec::new();

    for (name, rel_path) in bins {
        let link = bin_dir.join(name);
        let target_abs = install_dir.join(rel_path);
        let target = relative_from(&target_abs, bin_dir);

        debug!(name, target = %target.display(), "linking executable");
        place_link(&link, &target)?;
        make_executable(&target_abs);

        #[cfg(windows)]
        write_cmd_shim(&link, &target_abs)?;

        linked.push(link);
    }

    Ok(linked)
}

/// Remove the executables of `manifest` from `bin_dir`.
///
/// Missing links are fine; only symlinks (and Windows shims) are
/// touched.
pub fn unlink_bins(bin_dir: &Path, manifest: &Manifest) -> Result<()> {
    let Some(bins) = &manifest.bin else {
        return Ok(());
    };

    for name in bins.keys() {
        let link = bin_dir.join(name);
        if let Ok(meta) = fs::symlink_metadata(&link) {
            if meta.file_type().is_symlink() {
                fs::remove_file(&link)?;
            }
        }

        #[cfg(windows)]
        {
            let shim = link.with_extension("cmd");
            if shim.exists() {
                fs::remove_file(&shim)?;
            }
        }
    }

    Ok(())
}

/// Create the symlink at `link` pointing at `target`, tolerating an
/// identical pre-existing link.
fn place_link(link: &Path, target: &Path) -> Result<()> {
    match fs::symlink_metadata(link) {
        Ok(meta) if meta.file_type().is_symlink() => {
            let existing = fs::read_link(link)?;
            if existing == target {
                return Ok(());
            }
            return Err(Error::LinkConflict {
                path: link.to_path_buf(),
            });
        }
        Ok(_) => {
            return Err(Error::LinkConflict {
                path: link.to_path_buf(),
            });
        }
        Err(_) => {}
    }

    symlink(target, link)
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link)?;
    Ok(())
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::windows::fs::symlink_file(target, link)?;
    Ok(())
}

#[cfg(not(any(unix, windows)))]
fn symlink(_target: &Path, _link: &Path) -> Result<()> {
    Err(Error::Io(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "symlinks unsupported on this platform",
    )))
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(meta) = fs::metadata(path) {
        let mut perms = meta.permissions();
        perms.set_mode(perms.mode() | 0o111);
        let _ = fs::set_permissions(path, perms);
    }
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}

#[cfg(windows)]
fn write_cmd_shim(link: &Path, target: &Path) -> Result<()> {
    let shim = link.with_extension("cmd");
    let content = format!("@ECHO off\r\nnode \"{}\" %*\r\n", target.display());
    fs::write(shim, content)?;
    Ok(())
}

/// Relative path from `base` to `target`, both absolute.
fn relative_from(target: &Path, base: &Path) -> PathBuf {
    let target_parts: Vec<Component<'_>> = target.components().collect();
    let base_parts: Vec<Component<'_>> = base.components().collect();

    let common = target_parts
        .iter()
        .zip(base_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..base_parts.len() {
        out.push("..");
    }
    for part in &target_parts[common..] {
        out.push(part);
    }
    out
}
