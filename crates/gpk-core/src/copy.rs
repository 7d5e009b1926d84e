//! Recursive package copy from a verified cache entry into an install
//! site, honoring the keep and ignore layers.

use crate::error::Result;
use crate::filter::{DirIgnore, KeepSet};
use crate::manifest::Manifest;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Copy a package tree from `src` into `dst`.
///
/// The keep layer comes from the source manifest's `files` and bundled
/// dependency declarations and applies to top-level entries; the
/// ignore layer is re-read in every directory. `node_modules` is
/// copied only for bundled dependencies.
pub fn copy_package(src: &Path, dst: &Path, manifest: &Manifest) -> Result<()> {
    let bundled = manifest.bundled();
    let keep = KeepSet::new(manifest.files.as_deref(), &bundled);

    debug!(src = %src.display(), dst = %dst.display(), "copying package");
    fs::create_dir_all(dst)?;

    let ignore = DirIgnore::load(src)?;
    for name in read_sorted(src)? {
        if !keep.keeps(&name) {
            continue;
        }
        if ignore.ignores(&name, &name) {
            continue;
        }

        let from = src.join(&name);
        let to = dst.join(&name);
        if name == "node_modules" {
            copy_bundled(&from, &to, &bundled)?;
        } else if from.is_dir() {
            copy_dir(&from, &to, &name)?;
        } else {
            fs::copy(&from, &to)?;
        }
    }

    Ok(())
}

/// Copy a directory subtree, re-evaluating the ignore layer per
/// directory. `rel` is the forward-slash path from the copy root.
fn copy_dir(src: &Path, dst: &Path, rel: &str) -> Result<()> {
    fs::create_dir_all(dst)?;
    let ignore = DirIgnore::load(src)?;

    for name in read_sorted(src)? {
        let child_rel = format!("{rel}/{name}");
        if ignore.ignores(&child_rel, &name) {
            continue;
        }

        let from = src.join(&name);
        let to = dst.join(&name);
        if from.is_dir() {
            copy_dir(&from, &to, &child_rel)?;
        } else {
            fs::copy(&from, &to)?;
        }
    }

    Ok(())
}

/// Copy only bundled dependencies out of a `node_modules` directory.
fn copy_bundled(src: &Path, dst: &Path, bundled: &BTreeSet<String>) -> Result<()> {
    fs::create_dir_all(dst)?;

    for name in read_sorted(src)? {
        if !bundled.contains(&name) {
            continue;
        }
        let from = src.join(&name);
        if from.is_dir() {
            copy_dir(&from, &dst.join(&name), &format!("node_modules/{name}"))?;
        }
    }

    Ok(())
}

/// Directory entry names, sorted for deterministic copy order.
fn read_sorted(dir: &Path) -> Result<Vec<String>> {
    let mut names: Vec<String> = fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    Ok(names)
}
