//! Dependency source string resolution.
//!
//! A dependency's source string names a git repository plus either a
//! semver range or a branch/commit ref:
//!
//! - `onion:bcoin#semver:~1.1.7` — remote alias, repo, range
//! - `local:#semver:^2.0.0` — alias with repo defaulting to the
//!   dependency name
//! - `git+https://host/org/repo.git#v2.0.0` — direct URL with ref
//! - `~1.1.7` — bare legacy range with no remote
//!
//! Aliases are looked up in the enclosing manifest's `remotes` table.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// URL prefixes that bypass alias expansion.
const DIRECT_PREFIXES: &[&str] = &[
    "git+https://",
    "git+ssh://",
    "git+http://",
    "git+file://",
    "git://",
];

/// A resolved dependency source.
///
/// `version` and `branch` are mutually exclusive; `git` is `None` only
/// for bare legacy version sources, which cannot be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub git: Option<String>,
    pub version: Option<String>,
    pub branch: Option<String>,
}

impl ResolvedSource {
    fn versioned(git: Option<String>, version: impl Into<String>) -> Self {
        Self {
            git,
            version: Some(version.into()),
            branch: None,
        }
    }

    fn branched(git: String, branch: impl Into<String>) -> Self {
        Self {
            git: Some(git),
            version: None,
            branch: Some(branch.into()),
        }
    }
}

/// Resolve a dependency source string against the enclosing package's
/// `remotes` table.
///
/// `base` resolves relative `git+file://` templates; `name` fills in
/// the repository when the alias form omits it. Global installs carry
/// no enclosing manifest, so callers pass `remotes = None` and alias
/// forms fail with `UnknownRemote`.
///
/// # Errors
/// `UnknownRemote` for an alias absent from `remotes`, `UnknownBase`
/// for a relative `file://` template with no base directory.
pub fn resolve(
    remotes: Option<&BTreeMap<String, String>>,
    name: &str,
    source: &str,
    base: Option<&Path>,
) -> Result<ResolvedSource> {
    // Direct git URLs skip the alias table entirely.
    if DIRECT_PREFIXES.iter().any(|p| source.starts_with(p)) {
        return resolve_direct(source);
    }

    let Some((alias, tail)) = source.split_once(':') else {
        // Bare legacy version, e.g. "~1.1.7". Unfetchable.
        return Ok(ResolvedSource::versioned(None, source));
    };

    let template = remotes
        .and_then(|r| r.get(alias))
        .ok_or_else(|| Error::UnknownRemote {
            alias: alias.to_string(),
        })?;

    let (repo, fragment) = split_fragment(tail);
    let repo = if repo.is_empty() { name } else { repo };
    let url = compose_url(template, repo, base)?;

    Ok(apply_fragment(url, fragment))
}

/// Resolve a direct `git+…` or `git://` source.
fn resolve_direct(source: &str) -> Result<ResolvedSource> {
    let (url_part, fragment) = split_fragment(source);
    let url = url_part.strip_prefix("git+").unwrap_or(url_part).to_string();
    Ok(apply_fragment(url, fragment))
}

/// Split `s` at the first `#` into `(head, fragment)`.
fn split_fragment(s: &str) -> (&str, Option<&str>) {
    match s.split_once('#') {
        Some((head, frag)) => (head, Some(frag)),
        None => (s, None),
    }
}

/// Interpret the fragment: `semver:<range>` selects by version, any
/// other ref is a branch name or commit SHA. A missing fragment means
/// any version.
fn apply_fragment(url: String, fragment: Option<&str>) -> ResolvedSource {
    match fragment {
        Some(frag) => match frag.strip_prefix("semver:") {
            Some(range) => ResolvedSource::versioned(Some(url), range),
            None => ResolvedSource::branched(url, frag),
        },
        None => ResolvedSource::versioned(Some(url), "*"),
    }
}

/// Compose the final git URL from a remote template and repo name.
///
/// `git+file://` templates address local repositories and append
/// `<repo>/.git`; URL templates append `<repo>.git`.
fn compose_url(template: &str, repo: &str, base: Option<&Path>) -> Result<String> {
    if let Some(rest) = template.strip_prefix("git+file://") {
        let path = rest.trim_end_matches('/');
        let root = if Path::new(path).is_absolute() {
            path.to_string()
        } else {
            let base = base.ok_or(Error::UnknownBase)?;
            normalize_path(&base.join(path))
        };
        return Ok(format!("file://{root}/{repo}/.git"));
    }

    let prefix = template.trim_end_matches('/');
    Ok(format!("{prefix}/{repo}.git"))
}

/// Forward-slash canonical form of a path.
fn normalize_path(path: &Path) -> String {
    let s = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        s.into_owned()
    } else {
        s.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

/// Whether a ref looks like a full commit SHA.
///
/// Such refs are verified as commits and never looked up as branches.
#[must_use]
pub fn is_commit_sha(reference: &str) -> bool {
    reference.len() == 40 && reference.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remotes(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_alias_with_repo_and_range() {
        let r = remotes(&[("onion", "ssh://git@fmvuuoyfu54hcqpm.onion:22")]);
        let src = resolve(Some(&r), "bcoin", "onion:bcoin/bcoin#semver:~1.1.7", None).unwrap();
        assert_eq!(
            src.git.as_deref(),
            Some("ssh://git@fmvuuoyfu54hcqpm.onion:22/bcoin/bcoin.git")
        );
        assert_eq!(src.version.as_deref(), Some("~1.1.7"));
        assert_eq!(src.branch, None);
    }

    #[test]
    fn test_alias_with_empty_repo_defaults_to_name() {
        let r = remotes(&[("gh", "https://github.com/bcoin-org")]);
        let src = resolve(Some(&r), "bcfg", "gh:#semver:^2.0.0", None).unwrap();
        assert_eq!(
            src.git.as_deref(),
            Some("https://github.com/bcoin-org/bcfg.git")
        );
        assert_eq!(src.version.as_deref(), Some("^2.0.0"));
    }

    #[test]
    fn test_alias_with_branch() {
        let r = remotes(&[("gh", "https://github.com/bcoin-org")]);
        let src = resolve(Some(&r), "bcoin", "gh:bcoin#master", None).unwrap();
        assert_eq!(src.version, None);
        assert_eq!(src.branch.as_deref(), Some("master"));
    }

    #[test]
    fn test_alias_without_fragment_means_any_version() {
        let r = remotes(&[("gh", "https://github.com/bcoin-org")]);
        let src = resolve(Some(&r), "bcoin", "gh:bcoin", None).unwrap();
        assert_eq!(src.version.as_deref(), Some("*"));
        assert_eq!(src.branch, None);
    }

    #[test]
    fn test_unknown_alias() {
        let r = remotes(&[("gh", "https://github.com/org")]);
        let err = resolve(Some(&r), "x", "nope:x#semver:^1.0.0", None).unwrap_err();
        assert!(matches!(err, Error::UnknownRemote { alias } if alias == "nope"));
    }

    #[test]
    fn test_alias_without_remotes_table() {
        let err = resolve(None, "x", "gh:x#semver:^1.0.0", None).unwrap_err();
        assert!(matches!(err, Error::UnknownRemote { .. }));
    }

    #[test]
    fn test_local_file_template_absolute() {
        let r = remotes(&[("local", "git+file:///data/repos")]);
        let src = resolve(Some(&r), "repo", "local:#semver:~1.1.7", None).unwrap();
        assert_eq!(src.git.as_deref(), Some("file:///data/repos/repo/.git"));
        assert_eq!(src.version.as_deref(), Some("~1.1.7"));
    }

    #[test]
    fn test_local_file_template_relative_resolves_against_base() {
        let r = remotes(&[("local", "git+file://repos")]);
        let base = Path::new("/home/alice/src");
        let src = resolve(Some(&r), "repo", "local:#semver:^1.0.0", Some(base)).unwrap();
        assert_eq!(
            src.git.as_deref(),
            Some("file:///home/alice/src/repos/repo/.git")
        );
    }

    #[test]
    fn test_local_file_template_relative_without_base() {
        let r = remotes(&[("local", "git+file://repos")]);
        let err = resolve(Some(&r), "repo", "local:#semver:^1.0.0", None).unwrap_err();
        assert!(matches!(err, Error::UnknownBase));
    }

    #[test]
    fn test_direct_https_with_ref() {
        let src = resolve(
            None,
            "bcfg",
            "git+https://github.com/bcoin-org/bcfg.git#v2.0.0",
            None,
        )
        .unwrap();
        assert_eq!(
            src.git.as_deref(),
            Some("https://github.com/bcoin-org/bcfg.git")
        );
        assert_eq!(src.version, None);
        assert_eq!(src.branch.as_deref(), Some("v2.0.0"));
    }

    #[test]
    fn test_direct_ssh_with_semver_fragment() {
        let src = resolve(
            None,
            "bcoin",
            "git+ssh://git@github.com/bcoin-org/bcoin.git#semver:^2.0.0",
            None,
        )
        .unwrap();
        assert_eq!(
            src.git.as_deref(),
            Some("ssh://git@github.com/bcoin-org/bcoin.git")
        );
        assert_eq!(src.version.as_deref(), Some("^2.0.0"));
    }

    #[test]
    fn test_direct_git_scheme_untouched() {
        let src = resolve(None, "x", "git://host/org/x.git#dev", None).unwrap();
        assert_eq!(src.git.as_deref(), Some("git://host/org/x.git"));
        assert_eq!(src.branch.as_deref(), Some("dev"));
    }

    #[test]
    fn test_direct_with_commit_sha_fragment() {
        let sha = "a".repeat(40);
        let src = resolve(
            None,
            "x",
            &format!("git+https://host/org/x.git#{sha}"),
            None,
        )
        .unwrap();
        assert_eq!(src.branch.as_deref(), Some(sha.as_str()));
        assert!(is_commit_sha(src.branch.as_deref().unwrap()));
    }

    #[test]
    fn test_bare_version_has_no_remote() {
        let src = resolve(None, "legacy", "~1.1.7", None).unwrap();
        assert_eq!(src.git, None);
        assert_eq!(src.version.as_deref(), Some("~1.1.7"));
        assert_eq!(src.branch, None);
    }

    #[test]
    fn test_template_trailing_slash_trimmed() {
        let r = remotes(&[("gh", "https://github.com/org/")]);
        let src = resolve(Some(&r), "x", "gh:x#semver:*", None).unwrap();
        assert_eq!(src.git.as_deref(), Some("https://github.com/org/x.git"));
    }

    #[test]
    fn test_is_commit_sha() {
        assert!(is_commit_sha("0123456789abcdef0123456789abcdef01234567"));
        assert!(!is_commit_sha("master"));
        assert!(!is_commit_sha("deadbeef"));
        assert!(!is_commit_sha(&"g".repeat(40)));
    }
}
