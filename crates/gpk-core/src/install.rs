//! Recursive dependency installation.
//!
//! Installation is a depth-first traversal over the root manifest's
//! declared dependencies. Each dependency is resolved to a remote,
//! placed on the ancestor chain, fetched through the verified cache,
//! copied into its install site and injected with resolution metadata;
//! fresh sites then recurse over their own production dependencies.
//! Placement runs before any remote listing, so a tree that is already
//! satisfied performs no git operations at all.

use crate::cache::{self, FetchPlan};
use crate::copy;
use crate::env::Env;
use crate::error::{Error, Result};
use crate::git;
use crate::link;
use crate::manifest::{self, InjectedMeta, Manifest};
use crate::place::{self, Placement, Target};
use crate::rebuild;
use crate::source::{self, ResolvedSource};
use crate::version;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, info_span};

/// Install behavior flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    pub global: bool,
    pub production: bool,
}

/// A freshly created install site, pending recursion.
struct FreshSite {
    dir: PathBuf,
    container: PathBuf,
    manifest: Manifest,
}

/// A fetched-and-verified revision with its manifest.
struct Discovery {
    entry: PathBuf,
    manifest: Manifest,
    commit: String,
    branch_commit: Option<String>,
}

/// Install dependencies for the package at `cwd`, optionally adding
/// `sources` to the root manifest first.
///
/// In global mode each source installs standalone into the global
/// library root; locally, sources are discovered, merged into the
/// manifest, and the whole dependency map is installed.
pub fn install(env: &Env, cwd: &Path, sources: &[String], opts: &InstallOptions) -> Result<()> {
    if opts.global {
        for source in sources {
            install_global(env, source)?;
        }
        return Ok(());
    }

    let (root, mut root_manifest) = manifest::locate(cwd, true)?;
    let span = info_span!("install", root = %root.display());
    let _guard = span.enter();

    if !sources.is_empty() {
        let mut added = BTreeMap::new();
        for source in sources {
            let name = discover_name(env, &root, root_manifest.remotes.as_ref(), source)?;
            added.insert(name, source.clone());
        }
        manifest::add_deps(&mut root_manifest, &added);
        manifest::write(&root, &root_manifest)?;
    }

    let deps = root_manifest.merged_deps(opts.production)?;
    let root_bin = root.join("node_modules").join(".bin");
    let chain = vec![root.clone()];

    install_deps(
        env,
        &root,
        root_manifest.remotes.as_ref(),
        &deps,
        &chain,
        true,
        &root_bin,
    )?;

    link::link_bins(&root_bin, &root, &root_manifest)?;
    Ok(())
}

/// Install one level of dependencies, then recurse into the sites that
/// were freshly created.
///
/// `at_root` marks the top-level frame: a site placed directly under
/// the root roots its own chain, so transitive dependencies hoist no
/// higher than the top-level dependency that pulled them in.
fn install_deps(
    env: &Env,
    frame_dir: &Path,
    remotes: Option<&BTreeMap<String, String>>,
    deps: &BTreeMap<String, String>,
    chain: &[PathBuf],
    at_root: bool,
    root_bin: &Path,
) -> Result<()> {
    let mut fresh = Vec::new();

    for (name, source) in deps {
        if let Some(site) = install_module(env, frame_dir, remotes, name, source, chain)? {
            fresh.push(site);
        }
    }

    for site in fresh {
        let child_chain = child_chain(chain, &site, at_root);
        let child_deps = site.manifest.merged_deps(true)?;

        install_deps(
            env,
            &site.dir,
            site.manifest.remotes.as_ref(),
            &child_deps,
            &child_chain,
            false,
            root_bin,
        )?;

        rebuild::rebuild_package(env, &site.dir)?;
        link::link_bins(root_bin, &site.dir, &site.manifest)?;
    }

    Ok(())
}

/// Ancestor chain for recursion into a fresh site.
fn child_chain(chain: &[PathBuf], site: &FreshSite, at_root: bool) -> Vec<PathBuf> {
    let mut child = vec![site.dir.clone()];
    if !at_root {
        if let Some(pos) = chain.iter().position(|p| *p == site.container) {
            child.extend(chain[pos..].iter().cloned());
        }
    }
    child
}

/// Resolve, place, fetch and copy a single dependency.
///
/// Returns the fresh site, or `None` when an existing installation
/// already satisfies the request.
fn install_module(
    env: &Env,
    frame_dir: &Path,
    remotes: Option<&BTreeMap<String, String>>,
    name: &str,
    src: &str,
    chain: &[PathBuf],
) -> Result<Option<FreshSite>> {
    let span = info_span!("module", name, src);
    let _guard = span.enter();

    let base = env.base_dir.clone().unwrap_or_else(|| frame_dir.to_path_buf());
    let resolved = source::resolve(remotes, name, src, Some(&base))?;
    let Some(url) = resolved.git.clone() else {
        return Err(Error::RemoteMissing {
            name: name.to_string(),
        });
    };

    // Branch refs resolve to a commit before placement; ranges are
    // compared against installed versions, so tag listing can wait
    // until a fetch is actually needed.
    let branch_commit = resolve_branch_commit(&url, resolved.branch.as_deref())?;
    let target = Target {
        range: resolved.version.as_deref(),
        commit: branch_commit.as_deref(),
    };

    let placement = place::plan(name, &target, chain)?;
    let (container, dst) = match placement {
        Placement::Satisfied { .. } => return Ok(None),
        Placement::Install { container, dst } => (container, dst),
    };

    let plan = fetch_plan(&url, &resolved, branch_commit.as_deref())?;
    let entry = cache::fetch_verified(&env.cache_dir(), &plan)?;
    let commit = git::head_commit(&entry)?;
    let pkg_manifest = manifest::read(&entry)?.unwrap_or_default();

    copy::copy_package(&entry, &dst, &pkg_manifest)?;
    manifest::inject_meta(
        &dst,
        &InjectedMeta {
            from: src.to_string(),
            url,
            commit: commit.clone(),
            branch: resolved.branch.clone(),
        },
    )?;

    info!(version = %pkg_manifest.version, commit = %commit, dst = %dst.display(), "installed");

    Ok(Some(FreshSite {
        dir: dst,
        container,
        manifest: pkg_manifest,
    }))
}

/// Resolve a branch ref to the commit it denotes.
///
/// A 40-hex ref is already a commit SHA and is never looked up as a
/// branch.
fn resolve_branch_commit(url: &str, branch: Option<&str>) -> Result<Option<String>> {
    match branch {
        None => Ok(None),
        Some(b) if source::is_commit_sha(b) => Ok(Some(b.to_string())),
        Some(b) => {
            let view = git::list_branches(url)?;
            let commit = view.branches.get(b).cloned().ok_or_else(|| Error::UnknownRef {
                reference: b.to_string(),
            })?;
            Ok(Some(commit))
        }
    }
}

/// Build the fetch plan for a resolved source.
fn fetch_plan(
    url: &str,
    resolved: &ResolvedSource,
    branch_commit: Option<&str>,
) -> Result<FetchPlan> {
    if let (Some(branch), Some(commit)) = (resolved.branch.as_deref(), branch_commit) {
        return Ok(FetchPlan::for_commit(url, branch, commit));
    }

    let range = resolved.version.as_deref().unwrap_or("*");
    let tags = git::list_tags(url)?;
    let names: Vec<String> = tags.keys().cloned().collect();
    let tag = version::match_tag(&names, range).ok_or_else(|| Error::UnknownRef {
        reference: range.to_string(),
    })?;

    Ok(FetchPlan::for_tag(url, tag, &tags[tag]))
}

/// Fetch, verify and inspect the revision a resolved source denotes.
///
/// With no branch, the highest non-prerelease tag satisfying the range
/// is selected.
fn discover(env: &Env, resolved: &ResolvedSource) -> Result<Discovery> {
    let url = resolved.git.as_deref().ok_or_else(|| Error::RemoteMissing {
        name: resolved.version.clone().unwrap_or_default(),
    })?;

    let branch_commit = resolve_branch_commit(url, resolved.branch.as_deref())?;
    let plan = match (resolved.branch.as_deref(), branch_commit.as_deref()) {
        (Some(branch), Some(commit)) => FetchPlan::for_commit(url, branch, commit),
        _ => {
            let tags = git::list_tags(url)?;
            let names: Vec<String> = tags.keys().cloned().collect();
            let tag = version::match_tag_stable(&names, resolved.version.as_deref())
                .ok_or_else(|| Error::UnknownRef {
                    reference: resolved.version.clone().unwrap_or_else(|| "*".into()),
                })?;
            FetchPlan::for_tag(url, tag, &tags[tag])
        }
    };

    let entry = cache::fetch_verified(&env.cache_dir(), &plan)?;
    let commit = git::head_commit(&entry)?;
    let pkg_manifest = manifest::read(&entry)?.ok_or_else(|| Error::ManifestMissing {
        start: entry.clone(),
    })?;

    Ok(Discovery {
        entry,
        manifest: pkg_manifest,
        commit,
        branch_commit,
    })
}

/// Discover the canonical package name behind a CLI source string.
fn discover_name(
    env: &Env,
    root: &Path,
    remotes: Option<&BTreeMap<String, String>>,
    src: &str,
) -> Result<String> {
    let base = env.base_dir.clone().unwrap_or_else(|| root.to_path_buf());
    let resolved = source::resolve(remotes, "", src, Some(&base))?;
    if resolved.git.is_none() {
        return Err(Error::RemoteMissing {
            name: src.to_string(),
        });
    }

    let discovery = discover(env, &resolved)?;
    Ok(discovery.manifest.name.clone())
}

/// Install one source standalone into the global library root.
fn install_global(env: &Env, src: &str) -> Result<()> {
    let span = info_span!("install-global", src);
    let _guard = span.enter();

    let resolved = source::resolve(None, "", src, env.base_dir.as_deref())?;
    if resolved.git.is_none() {
        return Err(Error::RemoteMissing {
            name: src.to_string(),
        });
    }

    let discovery = discover(env, &resolved)?;
    let name = discovery.manifest.name.clone();
    let target = Target {
        range: resolved.version.as_deref(),
        commit: discovery.branch_commit.as_deref(),
    };

    let lib = env.global_lib();
    let placement = place::plan_global(&name, &target, &lib)?;
    let dst = match placement {
        Placement::Satisfied { path } => {
            info!(name = %name, path = %path.display(), "already installed");
            return Ok(());
        }
        Placement::Install { dst, .. } => dst,
    };

    copy::copy_package(&discovery.entry, &dst, &discovery.manifest)?;
    manifest::inject_meta(
        &dst,
        &InjectedMeta {
            from: src.to_string(),
            url: resolved.git.clone().unwrap_or_default(),
            commit: discovery.commit.clone(),
            branch: resolved.branch.clone(),
        },
    )?;

    // The global site is self-contained: its dependencies flatten into
    // its own node_modules and its executables land in the global bin.
    let site_bin = dst.join("node_modules").join(".bin");
    let child_deps = discovery.manifest.merged_deps(true)?;
    let chain = vec![dst.clone()];
    install_deps(
        env,
        &dst,
        discovery.manifest.remotes.as_ref(),
        &child_deps,
        &chain,
        false,
        &site_bin,
    )?;

    rebuild::rebuild_package(env, &dst)?;
    link::link_bins(&env.global_bin(), &dst, &discovery.manifest)?;

    info!(name = %name, version = %discovery.manifest.version, "installed globally");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn env_for(home: &Path) -> Env {
        Env::new().with_home(home.to_path_buf())
    }

    fn write_root(dir: &Path, manifest: &Manifest) {
        manifest::write(dir, manifest).unwrap();
    }

    #[test]
    fn test_missing_manifest_errors() {
        let dir = tempdir().unwrap();
        let home = tempdir().unwrap();
        let err = install(
            &env_for(home.path()),
            dir.path(),
            &[],
            &InstallOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::ManifestMissing { .. }));
    }

    #[test]
    fn test_bare_version_source_is_remote_missing() {
        let dir = tempdir().unwrap();
        let home = tempdir().unwrap();
        write_root(
            dir.path(),
            &Manifest {
                name: "root".into(),
                version: "1.0.0".into(),
                dependencies: Some(BTreeMap::from([("legacy".into(), "~1.1.7".into())])),
                ..Default::default()
            },
        );

        let err = install(
            &env_for(home.path()),
            dir.path(),
            &[],
            &InstallOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::RemoteMissing { name } if name == "legacy"));
    }

    #[test]
    fn test_unknown_alias_aborts_install() {
        let dir = tempdir().unwrap();
        let home = tempdir().unwrap();
        write_root(
            dir.path(),
            &Manifest {
                name: "root".into(),
                version: "1.0.0".into(),
                dependencies: Some(BTreeMap::from([(
                    "bdb".into(),
                    "nowhere:bdb#semver:^1.0.0".into(),
                )])),
                ..Default::default()
            },
        );

        let err = install(
            &env_for(home.path()),
            dir.path(),
            &[],
            &InstallOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnknownRemote { alias } if alias == "nowhere"));
    }

    #[test]
    fn test_duplicate_dependency_rejected() {
        let dir = tempdir().unwrap();
        let home = tempdir().unwrap();
        write_root(
            dir.path(),
            &Manifest {
                name: "root".into(),
                version: "1.0.0".into(),
                dependencies: Some(BTreeMap::from([(
                    "bdb".into(),
                    "gh:bdb#semver:^1.0.0".into(),
                )])),
                dev_dependencies: Some(BTreeMap::from([(
                    "bdb".into(),
                    "gh:bdb#semver:^2.0.0".into(),
                )])),
                remotes: Some(BTreeMap::from([(
                    "gh".into(),
                    "https://github.com/bcoin-org".into(),
                )])),
                ..Default::default()
            },
        );

        let err = install(
            &env_for(home.path()),
            dir.path(),
            &[],
            &InstallOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateDependency { name } if name == "bdb"));
    }

    #[test]
    fn test_satisfied_dependency_performs_no_git_operations() {
        // An already-installed compatible copy short-circuits before
        // any remote listing; the unreachable URL proves no network
        // was touched.
        let dir = tempdir().unwrap();
        let home = tempdir().unwrap();
        write_root(
            dir.path(),
            &Manifest {
                name: "root".into(),
                version: "1.0.0".into(),
                dependencies: Some(BTreeMap::from([(
                    "bdb".into(),
                    "gh:bdb#semver:^1.0.0".into(),
                )])),
                remotes: Some(BTreeMap::from([(
                    "gh".into(),
                    "https://unreachable.invalid/org".into(),
                )])),
                ..Default::default()
            },
        );

        let site = dir.path().join("node_modules/bdb");
        fs::create_dir_all(&site).unwrap();
        write_root(
            &site,
            &Manifest {
                name: "bdb".into(),
                version: "1.2.0".into(),
                ..Default::default()
            },
        );

        install(
            &env_for(home.path()),
            dir.path(),
            &[],
            &InstallOptions::default(),
        )
        .unwrap();
    }

    #[test]
    fn test_production_skips_dev_dependencies() {
        // The dev dependency would fail with UnknownRemote; production
        // mode never resolves it.
        let dir = tempdir().unwrap();
        let home = tempdir().unwrap();
        write_root(
            dir.path(),
            &Manifest {
                name: "root".into(),
                version: "1.0.0".into(),
                dev_dependencies: Some(BTreeMap::from([(
                    "lint".into(),
                    "nowhere:lint#semver:^1.0.0".into(),
                )])),
                ..Default::default()
            },
        );

        install(
            &env_for(home.path()),
            dir.path(),
            &[],
            &InstallOptions {
                global: false,
                production: true,
            },
        )
        .unwrap();
    }

    #[test]
    fn test_child_chain_roots_at_top_level_site() {
        let site = FreshSite {
            dir: PathBuf::from("/r/node_modules/c"),
            container: PathBuf::from("/r"),
            manifest: Manifest::default(),
        };
        let chain = vec![PathBuf::from("/r")];
        assert_eq!(
            child_chain(&chain, &site, true),
            vec![PathBuf::from("/r/node_modules/c")]
        );
    }

    #[test]
    fn test_child_chain_keeps_container_suffix() {
        // f placed under c while installing d's deps: d's own frame
        // drops out of f's chain, c stays.
        let c = PathBuf::from("/r/node_modules/c");
        let d = c.join("node_modules/d");
        let f = c.join("node_modules/f");
        let site = FreshSite {
            dir: f.clone(),
            container: c.clone(),
            manifest: Manifest::default(),
        };
        let chain = vec![d, c.clone()];
        assert_eq!(child_chain(&chain, &site, false), vec![f, c]);
    }
}
