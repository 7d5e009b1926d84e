//! Native addon rebuilds.
//!
//! Packages shipping a top-level `binding.gyp` get their native code
//! rebuilt by the configured helper (`<runtime> <addon-build-script>
//! rebuild`), leaves first so dependents build against fresh addons.

use crate::env::Env;
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, info};

const GYP_FILE: &str = "binding.gyp";

/// Rebuild `dir` and every installed package beneath it, depth first.
pub fn rebuild_tree(env: &Env, dir: &Path) -> Result<()> {
    let modules = dir.join("node_modules");
    if modules.is_dir() {
        let mut names: Vec<_> = fs::read_dir(&modules)?
            .filter_map(std::result::Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| !name.starts_with('.'))
            .collect();
        names.sort();

        for name in names {
            let child = modules.join(name);
            if child.is_dir() {
                rebuild_tree(env, &child)?;
            }
        }
    }

    rebuild_package(env, dir)
}

/// Invoke the rebuild helper in `dir` when it carries a `binding.gyp`.
pub fn rebuild_package(env: &Env, dir: &Path) -> Result<()> {
    if !dir.join(GYP_FILE).exists() {
        debug!(dir = %dir.display(), "no binding.gyp, skipping rebuild");
        return Ok(());
    }

    info!(dir = %dir.display(), "rebuilding native addon");

    let status = Command::new(&env.runtime)
        .arg(&env.gyp_script)
        .arg("rebuild")
        .current_dir(dir)
        .stdin(Stdio::null())
        .status()
        .map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to spawn rebuild helper: {e}"),
            ))
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(Error::Io(std::io::Error::other(format!(
            "rebuild helper exited with {status} in {}",
            dir.display()
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_env() -> Env {
        Env::new().with_home(std::env::temp_dir().join("gpk-test-home"))
    }

    #[test]
    fn test_rebuild_skips_without_gyp_file() {
        let dir = tempdir().unwrap();
        rebuild_package(&test_env(), dir.path()).unwrap();
    }

    #[test]
    fn test_rebuild_tree_walks_without_gyp_files() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("node_modules/a/node_modules/b");
        fs::create_dir_all(&nested).unwrap();
        fs::create_dir_all(dir.path().join("node_modules/.bin")).unwrap();
        rebuild_tree(&test_env(), dir.path()).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_rebuild_invokes_helper_on_gyp_package() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("binding.gyp"), "{}").unwrap();

        let mut env = test_env();
        env.runtime = "true".into();
        env.gyp_script = "ignored".into();

        rebuild_package(&env, dir.path()).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_rebuild_failure_surfaces() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("binding.gyp"), "{}").unwrap();

        let mut env = test_env();
        env.runtime = "false".into();
        env.gyp_script = "ignored".into();

        let err = rebuild_package(&env, dir.path()).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
