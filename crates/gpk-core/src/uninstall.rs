//! Dependency removal and unreachable-module pruning.
//!
//! Uninstalling removes names from the root manifest, then walks the
//! installed tree from the root: every package that some reachable
//! package still requires (by branch identity or range satisfaction)
//! stays; top-level modules nobody requires are pruned along with
//! their executables.

use crate::env::Env;
use crate::error::{Error, Result};
use crate::link;
use crate::manifest::{self, Manifest};
use crate::source;
use crate::version;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, info_span};

/// Uninstall behavior flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct UninstallOptions {
    pub global: bool,
    pub production: bool,
}

/// Remove `names` and prune modules no longer transitively required.
pub fn uninstall(env: &Env, cwd: &Path, names: &[String], opts: &UninstallOptions) -> Result<()> {
    if opts.global {
        for name in names {
            uninstall_global(env, name)?;
        }
        return Ok(());
    }

    let (root, mut root_manifest) = manifest::locate(cwd, true)?;
    let span = info_span!("uninstall", root = %root.display());
    let _guard = span.enter();

    manifest::remove_deps(&mut root_manifest, names);
    manifest::write(&root, &root_manifest)?;

    let reachable = reachable_sites(env, &root, &root_manifest, opts.production)?;
    prune_unreachable(&root, &reachable)?;

    Ok(())
}

/// Remove one globally installed package and its executables.
fn uninstall_global(env: &Env, name: &str) -> Result<()> {
    let dir = env.global_lib().join(name);
    let Some(installed) = manifest::read(&dir)? else {
        info!(name, "not installed globally");
        return Ok(());
    };

    link::unlink_bins(&env.global_bin(), &installed)?;
    fs::remove_dir_all(&dir)?;
    info!(name, "uninstalled globally");
    Ok(())
}

/// Collect every install site reachable from the root through the
/// dependencies relation.
///
/// A dependency edge is followed when an installed copy visible from
/// the declaring package matches the declared source: same `_branch`,
/// or a version satisfying the declared range.
fn reachable_sites(
    env: &Env,
    root: &Path,
    root_manifest: &Manifest,
    production: bool,
) -> Result<BTreeSet<PathBuf>> {
    let mut reachable = BTreeSet::new();
    let mut stack: Vec<(PathBuf, Manifest, Vec<PathBuf>, bool)> = vec![(
        root.to_path_buf(),
        root_manifest.clone(),
        vec![root.to_path_buf()],
        production,
    )];

    while let Some((dir, pkg, chain, prod)) = stack.pop() {
        let deps = pkg.merged_deps(prod)?;

        for (dep_name, src) in &deps {
            let base = env.base_dir.clone().unwrap_or_else(|| dir.clone());
            let Ok(resolved) = source::resolve(pkg.remotes.as_ref(), dep_name, src, Some(&base))
            else {
                continue;
            };

            let Some((site, installed)) = find_installed(&chain, dep_name)? else {
                continue;
            };

            if !matches_source(&installed, &resolved) {
                continue;
            }

            if reachable.insert(site.clone()) {
                let mut child_chain = vec![site.clone()];
                child_chain.extend(chain.iter().cloned());
                stack.push((site, installed, child_chain, true));
            }
        }
    }

    Ok(reachable)
}

/// Find the installed copy of `name` visible from a chain of package
/// roots, nearest frame first.
fn find_installed(chain: &[PathBuf], name: &str) -> Result<Option<(PathBuf, Manifest)>> {
    for ancestor in chain {
        let site = ancestor.join("node_modules").join(name);
        if let Some(installed) = manifest::read(&site)? {
            return Ok(Some((site, installed)));
        }
    }
    Ok(None)
}

/// Whether an installed copy matches a declared source.
fn matches_source(installed: &Manifest, resolved: &source::ResolvedSource) -> bool {
    if let Some(branch) = &resolved.branch {
        return installed.branch.as_deref() == Some(branch);
    }
    match &resolved.version {
        Some(range) => version::parse(&installed.version)
            .is_some_and(|v| version::satisfies(&v, range)),
        None => false,
    }
}

/// Remove top-level modules that are not in the reachable set, along
/// with their executables.
fn prune_unreachable(root: &Path, reachable: &BTreeSet<PathBuf>) -> Result<()> {
    let modules = root.join("node_modules");
    if !modules.is_dir() {
        return Ok(());
    }
    let bin_dir = modules.join(".bin");

    let mut entries: Vec<_> = fs::read_dir(&modules)?
        .filter_map(std::result::Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| !name.starts_with('.'))
        .collect();
    entries.sort();

    for name in entries {
        let site = modules.join(&name);
        if reachable.contains(&site) {
            continue;
        }

        if let Some(installed) = manifest::read(&site)? {
            link::unlink_bins(&bin_dir, &installed)?;
        }
        fs::remove_dir_all(&site)?;
        info!(name = %name, "pruned");
    }

    Ok(())
}

/// Whether `name` is still required somewhere in the installed tree.
///
/// Exposed for diagnostics; `uninstall` uses the same reachability
/// walk to decide pruning.
pub fn is_required(env: &Env, root: &Path, name: &str) -> Result<bool> {
    let Some(root_manifest) = manifest::read(root)? else {
        return Err(Error::ManifestMissing {
            start: root.to_path_buf(),
        });
    };
    let reachable = reachable_sites(env, root, &root_manifest, false)?;
    Ok(reachable.contains(&root.join("node_modules").join(name)))
}
