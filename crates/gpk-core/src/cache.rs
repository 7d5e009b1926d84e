//! Content-addressed verified cache.
//!
//! Each entry is a working tree under `<home>/cache/<oid>`, cloned at
//! a single ref and renamed into place only after its signature
//! verified. The OID is the annotated-tag object when one exists,
//! otherwise the commit the ref resolves to, so identical revisions
//! are shared across install sites.

use crate::error::{Error, Result};
use crate::git::{self, TagRefs};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Everything needed to populate one cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    /// Remote to clone from.
    pub url: String,
    /// Ref passed to `clone --branch`: a tag name, branch name or
    /// commit SHA.
    pub clone_ref: String,
    /// Cache key; the OID addressing the entry.
    pub key: String,
    /// Tag name to `verify-tag`, for annotated tags.
    pub verify_tag: Option<String>,
    /// Commit to `verify-commit`, for lightweight tags and branches.
    pub verify_commit: Option<String>,
}

impl FetchPlan {
    /// Plan a fetch for a tag.
    ///
    /// Annotated tags are addressed by the tag object's OID and
    /// verified with `verify-tag`; lightweight tags fall back to the
    /// commit OID and `verify-commit`.
    #[must_use]
    pub fn for_tag(url: &str, tag: &str, refs: &TagRefs) -> Self {
        match &refs.annotated {
            Some(annotated) => Self {
                url: url.to_string(),
                clone_ref: tag.to_string(),
                key: annotated.clone(),
                verify_tag: Some(tag.to_string()),
                verify_commit: None,
            },
            None => Self {
                url: url.to_string(),
                clone_ref: tag.to_string(),
                key: refs.commit.clone(),
                verify_tag: None,
                verify_commit: Some(refs.commit.clone()),
            },
        }
    }

    /// Plan a fetch for a branch tip or explicit commit SHA.
    #[must_use]
    pub fn for_commit(url: &str, clone_ref: &str, commit: &str) -> Self {
        Self {
            url: url.to_string(),
            clone_ref: clone_ref.to_string(),
            key: commit.to_string(),
            verify_tag: None,
            verify_commit: Some(commit.to_string()),
        }
    }
}

/// Path of the cache entry a plan addresses.
#[must_use]
pub fn entry_path(cache_root: &Path, plan: &FetchPlan) -> PathBuf {
    cache_root.join(&plan.key)
}

/// Fetch and verify the revision a plan describes, returning the
/// populated cache entry.
///
/// An existing entry is returned as-is with no git invocation. A fresh
/// revision is cloned into `<entry>-unverified-<pid>`, verified, and
/// renamed into place; verification failure leaves no entry behind, so
/// a later run re-clones cleanly.
pub fn fetch_verified(cache_root: &Path, plan: &FetchPlan) -> Result<PathBuf> {
    let dst = entry_path(cache_root, plan);
    if dst.exists() {
        debug!(key = %plan.key, "cache hit");
        return Ok(dst);
    }

    fs::create_dir_all(cache_root)?;

    // Distinct temporary names let racing processes lose gracefully:
    // the first rename wins, later ones find dst populated.
    let unverified = cache_root.join(format!(
        "{}-unverified-{}",
        plan.key,
        std::process::id()
    ));
    if unverified.exists() {
        fs::remove_dir_all(&unverified)?;
    }

    info!(url = %plan.url, reference = %plan.clone_ref, key = %plan.key, "fetching");
    git::clone_ref(&plan.clone_ref, &plan.url, &unverified)?;

    git::verify(
        plan.verify_tag.as_deref(),
        plan.verify_commit.as_deref(),
        &unverified,
    )?;

    match fs::rename(&unverified, &dst) {
        Ok(()) => Ok(dst),
        Err(_) if dst.exists() => {
            // Lost the populate race; the winner's entry is verified.
            let _ = fs::remove_dir_all(&unverified);
            Ok(dst)
        }
        Err(e) => Err(Error::Io(e)),
    }
}
