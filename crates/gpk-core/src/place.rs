//! Install-site placement.
//!
//! A dependency is hoisted as shallowly as its ancestors permit. The
//! current frame's own `node_modules/<name>` — the bundle path — is
//! consulted first so a bundled copy satisfies the request outright;
//! the ancestor chain is then scanned from the shallowest root toward
//! the frame. An existing compatible installation anywhere on the
//! chain satisfies the request, the shallowest free slot receives a
//! fresh install, and a conflicting version pushes the search one
//! level deeper. Sharing stays maximal while every conflicting
//! version remains scoped to its own subtree.

use crate::error::{Error, Result};
use crate::manifest;
use crate::version;
use std::path::{Path, PathBuf};
use tracing::debug;

/// What an install frame wants at a site: a range or an exact commit.
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    pub range: Option<&'a str>,
    pub commit: Option<&'a str>,
}

/// Planner outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// A compatible installation already exists; nothing to do.
    Satisfied { path: PathBuf },
    /// Install into this container's `node_modules`.
    Install { container: PathBuf, dst: PathBuf },
}

/// Classification of one candidate site.
enum Site {
    Absent,
    Compatible,
    Conflict,
}

fn classify(site: &Path, target: &Target<'_>) -> Result<Site> {
    let Some(existing) = manifest::read(site)? else {
        return Ok(Site::Absent);
    };

    let compatible = match target.commit {
        Some(commit) => existing.commit.as_deref() == Some(commit),
        None => match target.range {
            Some(range) => version::parse(&existing.version)
                .is_some_and(|v| version::satisfies(&v, range)),
            None => false,
        },
    };

    Ok(if compatible {
        Site::Compatible
    } else {
        Site::Conflict
    })
}

/// Choose where `name` must live given the ancestor chain (current
/// frame first, root last).
///
/// # Errors
/// `PlacementConflict` when every level of the chain already holds an
/// incompatible installation.
pub fn plan(name: &str, target: &Target<'_>, chain: &[PathBuf]) -> Result<Placement> {
    // Bundle path of the current frame: a compatible bundled copy
    // wins before any hoisting.
    if let Some(frame) = chain.first() {
        let bundle = frame.join("node_modules").join(name);
        if matches!(classify(&bundle, target)?, Site::Compatible) {
            debug!(name, site = %bundle.display(), "bundled copy satisfies");
            return Ok(Placement::Satisfied { path: bundle });
        }
    }

    let mut first_conflict: Option<PathBuf> = None;

    // Shallowest ancestor first.
    for ancestor in chain.iter().rev() {
        let site = ancestor.join("node_modules").join(name);
        match classify(&site, target)? {
            Site::Compatible => {
                debug!(name, site = %site.display(), "already satisfied");
                return Ok(Placement::Satisfied { path: site });
            }
            Site::Absent => {
                return Ok(Placement::Install {
                    container: ancestor.clone(),
                    dst: site,
                });
            }
            Site::Conflict => {
                first_conflict.get_or_insert(site);
            }
        }
    }

    Err(Error::PlacementConflict {
        name: name.to_string(),
        path: first_conflict.unwrap_or_default(),
    })
}

/// Global-mode placement: the single global library root, where any
/// conflict is fatal.
pub fn plan_global(name: &str, target: &Target<'_>, lib_root: &Path) -> Result<Placement> {
    plan(name, target, std::slice::from_ref(&lib_root.to_path_buf()))
}
