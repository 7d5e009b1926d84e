//! Git adapter.
//!
//! All remote interaction goes through the `git` binary: ls-remote for
//! tag and branch views, shallow clones pinned to a single ref, and
//! `verify-tag`/`verify-commit` for signature checks. Subprocess
//! failures surface as `Error::Git { stage, stderr }`.
//!
//! Tree listing and hashing walk the filesystem rather than the object
//! store, so the same operations apply to a clone and to the filtered
//! install site copied from it.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256, Sha512};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// Object IDs recorded for one remote tag.
///
/// Annotated tags carry the tag object's own OID plus the peeled commit
/// OID; lightweight tags carry only the commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRefs {
    pub annotated: Option<String>,
    pub commit: String,
}

/// Remote branch view: branch tips plus the HEAD branch name.
#[derive(Debug, Clone, Default)]
pub struct BranchView {
    pub branches: BTreeMap<String, String>,
    pub head: Option<String>,
}

/// Digest used by [`tree_hash`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgo {
    Sha256,
    Sha512,
}

/// Run git with `args`, returning captured stdout.
fn git(stage: &'static str, args: &[&str], cwd: Option<&Path>) -> Result<String> {
    let mut cmd = Command::new("git");
    cmd.args(args).stdin(Stdio::null());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    debug!(stage, ?args, "git");

    let output = cmd
        .output()
        .map_err(|e| Error::git(stage, format!("failed to spawn git: {e}")))?;

    if !output.status.success() {
        return Err(Error::git(
            stage,
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// List remote tags with their annotated and commit OIDs.
pub fn list_tags(url: &str) -> Result<BTreeMap<String, TagRefs>> {
    let out = git("ls-remote", &["ls-remote", "--tags", url], None)?;
    Ok(parse_tag_listing(&out))
}

/// Parse `ls-remote --tags` output.
///
/// Lines are `<oid>\trefs/tags/<name>`; a `<name>^{}` suffix marks the
/// peeled commit of an annotated tag.
#[must_use]
pub fn parse_tag_listing(listing: &str) -> BTreeMap<String, TagRefs> {
    let mut plain: BTreeMap<String, String> = BTreeMap::new();
    let mut peeled: BTreeMap<String, String> = BTreeMap::new();

    for line in listing.lines() {
        let Some((oid, reference)) = line.split_once('\t') else {
            continue;
        };
        let Some(name) = reference.strip_prefix("refs/tags/") else {
            continue;
        };
        if let Some(base) = name.strip_suffix("^{}") {
            peeled.insert(base.to_string(), oid.to_string());
        } else {
            plain.insert(name.to_string(), oid.to_string());
        }
    }

    plain
        .into_iter()
        .map(|(name, oid)| {
            let refs = match peeled.get(&name) {
                Some(commit) => TagRefs {
                    annotated: Some(oid),
                    commit: commit.clone(),
                },
                None => TagRefs {
                    annotated: None,
                    commit: oid,
                },
            };
            (name, refs)
        })
        .collect()
}

/// List remote branches and resolve the HEAD branch.
pub fn list_branches(url: &str) -> Result<BranchView> {
    let out = git("ls-remote", &["ls-remote", "--symref", url], None)?;
    Ok(parse_branch_listing(&out))
}

/// Parse `ls-remote --symref` output into a branch view.
#[must_use]
pub fn parse_branch_listing(listing: &str) -> BranchView {
    let mut view = BranchView::default();

    for line in listing.lines() {
        if let Some(rest) = line.strip_prefix("ref: refs/heads/") {
            if let Some((name, target)) = rest.split_once('\t') {
                if target == "HEAD" {
                    view.head = Some(name.to_string());
                }
            }
            continue;
        }

        let Some((oid, reference)) = line.split_once('\t') else {
            continue;
        };
        if let Some(name) = reference.strip_prefix("refs/heads/") {
            view.branches.insert(name.to_string(), oid.to_string());
        }
    }

    view
}

/// Shallow-clone a single ref into `dst`.
pub fn clone_ref(reference: &str, url: &str, dst: &Path) -> Result<()> {
    let dst = dst.to_string_lossy();
    git(
        "clone",
        &[
            "clone",
            "--depth",
            "1",
            "--branch",
            reference,
            url,
            dst.as_ref(),
        ],
        None,
    )?;
    Ok(())
}

/// Verify a signature inside the clone at `dir`.
///
/// Runs `verify-tag` when `tag` is given, `verify-commit` otherwise.
///
/// # Errors
/// `VerificationFailure` on a non-zero exit; this is never recovered.
pub fn verify(tag: Option<&str>, commit: Option<&str>, dir: &Path) -> Result<()> {
    let (args, reference) = match (tag, commit) {
        (Some(t), _) => (["verify-tag", t], t),
        (None, Some(c)) => (["verify-commit", c], c),
        (None, None) => {
            return Err(Error::git("verify", "no ref to verify"));
        }
    };

    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| Error::git("verify", format!("failed to spawn git: {e}")))?;

    if status.success() {
        Ok(())
    } else {
        Err(Error::VerificationFailure {
            reference: reference.to_string(),
        })
    }
}

/// Read the HEAD commit OID of a local clone.
pub fn head_commit(dir: &Path) -> Result<String> {
    let out = git("rev-parse", &["rev-parse", "HEAD"], Some(dir))?;
    Ok(out.trim().to_string())
}

/// List every file beneath `dir` as sorted forward-slash relative
/// paths.
///
/// `.git` is excluded, so a fresh clone and the filtered install site
/// copied from it can be listed with the same operation.
pub fn list_tree(dir: &Path) -> Result<Vec<String>> {
    let mut paths = Vec::new();
    collect_files(dir, "", &mut paths)?;
    paths.sort();
    Ok(paths)
}

fn collect_files(dir: &Path, prefix: &str, out: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let rel = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}/{name}")
        };

        if entry.path().is_dir() {
            if name == ".git" {
                continue;
            }
            collect_files(&entry.path(), &rel, out)?;
        } else {
            out.push(rel);
        }
    }
    Ok(())
}

/// Digest the tree rooted at `dir`.
///
/// For each path `p` in the sorted tree listing, the line
/// `hex(digest(file)) + "  " + p + "\n"` feeds a rolling digest whose
/// hex form is returned. Two trees with identical contents hash
/// identically regardless of copy order or timestamps, so a clone and
/// the install site filtered from it can be compared directly.
pub fn tree_hash(dir: &Path, algo: HashAlgo) -> Result<String> {
    let paths = list_tree(dir)?;

    match algo {
        HashAlgo::Sha256 => digest_tree::<Sha256>(dir, &paths),
        HashAlgo::Sha512 => digest_tree::<Sha512>(dir, &paths),
    }
}

fn digest_tree<D: Digest>(dir: &Path, paths: &[String]) -> Result<String> {
    let mut rolling = D::new();

    for path in paths {
        let bytes = fs::read(dir.join(path))?;
        let file_hex = hex_digest::<D>(&bytes);
        rolling.update(file_hex.as_bytes());
        rolling.update(b"  ");
        rolling.update(path.as_bytes());
        rolling.update(b"\n");
    }

    Ok(to_hex(&rolling.finalize()))
}

fn hex_digest<D: Digest>(bytes: &[u8]) -> String {
    let mut hasher = D::new();
    hasher.update(bytes);
    to_hex(&hasher.finalize())
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const OID_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const OID_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    const OID_C: &str = "cccccccccccccccccccccccccccccccccccccccc";

    #[test]
    fn test_parse_tags_annotated_and_lightweight() {
        let listing = format!(
            "{OID_A}\trefs/tags/v1.0.0\n{OID_B}\trefs/tags/v1.0.0^{{}}\n{OID_C}\trefs/tags/v1.1.0\n"
        );
        let tags = parse_tag_listing(&listing);

        let annotated = &tags["v1.0.0"];
        assert_eq!(annotated.annotated.as_deref(), Some(OID_A));
        assert_eq!(annotated.commit, OID_B);

        let lightweight = &tags["v1.1.0"];
        assert_eq!(lightweight.annotated, None);
        assert_eq!(lightweight.commit, OID_C);
    }

    #[test]
    fn test_parse_tags_ignores_foreign_refs() {
        let listing = format!("{OID_A}\trefs/heads/master\nnot a listing line\n");
        assert!(parse_tag_listing(&listing).is_empty());
    }

    #[test]
    fn test_parse_branches_with_symref_head() {
        let listing = format!(
            "ref: refs/heads/main\tHEAD\n{OID_A}\tHEAD\n{OID_A}\trefs/heads/main\n{OID_B}\trefs/heads/dev\n"
        );
        let view = parse_branch_listing(&listing);

        assert_eq!(view.head.as_deref(), Some("main"));
        assert_eq!(view.branches["main"], OID_A);
        assert_eq!(view.branches["dev"], OID_B);
        assert_eq!(view.branches.len(), 2);
    }

    #[test]
    fn test_parse_branches_ignores_tags() {
        let listing = format!("{OID_A}\trefs/tags/v1.0.0\n");
        let view = parse_branch_listing(&listing);
        assert!(view.branches.is_empty());
        assert_eq!(view.head, None);
    }

    #[test]
    fn test_list_tree_sorted_and_skips_git_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("lib/util")).unwrap();
        fs::create_dir_all(dir.path().join(".git/objects")).unwrap();
        fs::write(dir.path().join("lib/util/z.js"), b"").unwrap();
        fs::write(dir.path().join("lib/a.js"), b"").unwrap();
        fs::write(dir.path().join("package.json"), b"{}").unwrap();
        fs::write(dir.path().join(".git/HEAD"), b"ref: refs/heads/main").unwrap();

        let paths = list_tree(dir.path()).unwrap();
        assert_eq!(
            paths,
            vec![
                "lib/a.js".to_string(),
                "lib/util/z.js".to_string(),
                "package.json".to_string(),
            ]
        );
    }

    #[test]
    fn test_tree_hash_reproducible_across_copies() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        for dir in [a.path(), b.path()] {
            fs::create_dir(dir.join("lib")).unwrap();
            fs::write(dir.join("lib/index.js"), b"module.exports = 1;\n").unwrap();
            fs::write(dir.join("package.json"), b"{}\n").unwrap();
        }
        // VCS metadata in one copy must not perturb the hash.
        fs::create_dir(a.path().join(".git")).unwrap();
        fs::write(a.path().join(".git/HEAD"), b"ref: refs/heads/main").unwrap();

        let ha = tree_hash(a.path(), HashAlgo::Sha256).unwrap();
        let hb = tree_hash(b.path(), HashAlgo::Sha256).unwrap();
        assert_eq!(ha, hb);
        assert_eq!(ha.len(), 64);
    }

    #[test]
    fn test_tree_hash_sensitive_to_content() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"one").unwrap();

        let before = tree_hash(dir.path(), HashAlgo::Sha256).unwrap();
        fs::write(dir.path().join("a.txt"), b"two").unwrap();
        let after = tree_hash(dir.path(), HashAlgo::Sha256).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn test_tree_hash_sensitive_to_paths() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        fs::write(a.path().join("one.js"), b"same").unwrap();
        fs::write(b.path().join("two.js"), b"same").unwrap();

        let ha = tree_hash(a.path(), HashAlgo::Sha256).unwrap();
        let hb = tree_hash(b.path(), HashAlgo::Sha256).unwrap();
        assert_ne!(ha, hb);
    }

    #[test]
    fn test_tree_hash_algo_selects_digest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"content").unwrap();

        let h256 = tree_hash(dir.path(), HashAlgo::Sha256).unwrap();
        let h512 = tree_hash(dir.path(), HashAlgo::Sha512).unwrap();
        assert_eq!(h256.len(), 64);
        assert_eq!(h512.len(), 128);
    }

    #[test]
    fn test_hex_encoding() {
        assert_eq!(to_hex(&[0x00, 0xff, 0x10]), "00ff10");
    }
}
