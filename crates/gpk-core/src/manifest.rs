//! Package manifest reading, writing and metadata injection.
//!
//! Manifests are `package.json` documents. The root manifest is the
//! only one gpk mutates structurally; installed copies are only ever
//! injected with resolution metadata (`_from`, `_resolved`, `_commit`,
//! `_branch`), preserving whatever else the package shipped.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const MANIFEST_NAME: &str = "package.json";

/// A parsed package manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub version: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bin: Option<BTreeMap<String, String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scripts: Option<BTreeMap<String, String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<BTreeMap<String, String>>,

    #[serde(rename = "devDependencies", skip_serializing_if = "Option::is_none")]
    pub dev_dependencies: Option<BTreeMap<String, String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub remotes: Option<BTreeMap<String, String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,

    #[serde(
        rename = "bundleDependencies",
        skip_serializing_if = "Option::is_none"
    )]
    pub bundle_dependencies: Option<Vec<String>>,

    #[serde(
        rename = "bundledDependencies",
        skip_serializing_if = "Option::is_none"
    )]
    pub bundled_dependencies: Option<Vec<String>>,

    #[serde(rename = "_from", skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    #[serde(rename = "_resolved", skip_serializing_if = "Option::is_none")]
    pub resolved: Option<String>,

    #[serde(rename = "_commit", skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,

    #[serde(rename = "_branch", skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl Manifest {
    /// All bundled dependency names, merging both field spellings.
    #[must_use]
    pub fn bundled(&self) -> BTreeSet<String> {
        self.bundle_dependencies
            .iter()
            .chain(self.bundled_dependencies.iter())
            .flatten()
            .cloned()
            .collect()
    }

    /// Merge `dependencies` with `devDependencies` unless `production`.
    ///
    /// # Errors
    /// `DuplicateDependency` when a name appears in both maps.
    pub fn merged_deps(&self, production: bool) -> Result<BTreeMap<String, String>> {
        let mut merged = self.dependencies.clone().unwrap_or_default();

        if !production {
            if let Some(dev) = &self.dev_dependencies {
                for (name, source) in dev {
                    if merged.contains_key(name) {
                        return Err(Error::DuplicateDependency { name: name.clone() });
                    }
                    merged.insert(name.clone(), source.clone());
                }
            }
        }

        Ok(merged)
    }
}

/// Resolution metadata injected into installed manifests.
#[derive(Debug, Clone)]
pub struct InjectedMeta {
    pub from: String,
    pub url: String,
    pub commit: String,
    pub branch: Option<String>,
}

/// Read the manifest in `dir`, or `None` when absent.
///
/// # Errors
/// `ManifestParse` for malformed JSON; IO errors other than not-found.
pub fn read(dir: &Path) -> Result<Option<Manifest>> {
    let path = dir.join(MANIFEST_NAME);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let manifest =
        serde_json::from_str(&content).map_err(|source| Error::ManifestParse { path, source })?;
    Ok(Some(manifest))
}

/// Locate the package root starting at `start`.
///
/// With `walk`, climbs parent directories until a manifest is found.
///
/// # Errors
/// `ManifestMissing` when the filesystem root is reached.
pub fn locate(start: &Path, walk: bool) -> Result<(PathBuf, Manifest)> {
    let mut current = start.to_path_buf();

    loop {
        if let Some(manifest) = read(&current)? {
            return Ok((current, manifest));
        }
        if !walk || !current.pop() {
            return Err(Error::ManifestMissing {
                start: start.to_path_buf(),
            });
        }
    }
}

/// Write `manifest` to `dir` as pretty JSON with a trailing newline.
pub fn write(dir: &Path, manifest: &Manifest) -> Result<()> {
    let path = dir.join(MANIFEST_NAME);
    let json = serde_json::to_string_pretty(manifest).map_err(|source| Error::ManifestParse {
        path: path.clone(),
        source,
    })?;
    fs::write(&path, format!("{json}\n"))?;
    Ok(())
}

/// Inject resolution metadata into the manifest at `dir`.
///
/// Operates on the raw JSON document so fields gpk does not model are
/// preserved in the installed copy.
pub fn inject_meta(dir: &Path, meta: &InjectedMeta) -> Result<()> {
    let path = dir.join(MANIFEST_NAME);
    let content = fs::read_to_string(&path)?;
    let mut doc: serde_json::Value =
        serde_json::from_str(&content).map_err(|source| Error::ManifestParse {
            path: path.clone(),
            source,
        })?;

    let obj = doc.as_object_mut().ok_or_else(|| Error::ManifestParse {
        path: path.clone(),
        source: serde::de::Error::custom("manifest root is not an object"),
    })?;

    obj.insert("_from".into(), meta.from.clone().into());
    obj.insert(
        "_resolved".into(),
        format!("git+{}#{}", meta.url, meta.commit).into(),
    );
    obj.insert("_commit".into(), meta.commit.clone().into());
    if let Some(branch) = &meta.branch {
        obj.insert("_branch".into(), branch.clone().into());
    }

    let json = serde_json::to_string_pretty(&doc).map_err(|source| Error::ManifestParse {
        path: path.clone(),
        source,
    })?;
    fs::write(&path, format!("{json}\n"))?;
    Ok(())
}

/// Add dependencies to the manifest's dependency map.
pub fn add_deps(manifest: &mut Manifest, deps: &BTreeMap<String, String>) {
    let map = manifest.dependencies.get_or_insert_with(BTreeMap::new);
    for (name, source) in deps {
        map.insert(name.clone(), source.clone());
    }
}

/// Remove dependencies by name from both dependency maps.
pub fn remove_deps(manifest: &mut Manifest, names: &[String]) {
    for map in [&mut manifest.dependencies, &mut manifest.dev_dependencies]
        .into_iter()
        .flatten()
    {
        for name in names {
            map.remove(name);
        }
    }
}
