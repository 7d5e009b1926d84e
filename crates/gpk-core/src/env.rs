//! Process-wide environment: home and cache directories, global
//! prefix resolution and the rebuild helper command.

use std::env;
use std::path::{Path, PathBuf};

/// Environment variable naming the base directory for relative
/// `git+file://` remote templates.
pub const BASE_DIR_ENV: &str = "GPK_BASE_DIR";

/// Environment variable overriding the gpk home directory.
pub const HOME_ENV: &str = "GPK_HOME";

/// Runtime configuration shared by every operation.
#[derive(Debug, Clone)]
pub struct Env {
    /// gpk home, `~/.gpk` by default.
    pub home: PathBuf,
    /// Base directory for relative `git+file://` templates.
    pub base_dir: Option<PathBuf>,
    /// Explicit global prefix, overriding `PREFIX` and the runtime
    /// installation prefix.
    pub prefix: Option<PathBuf>,
    /// Staging root prepended to the global prefix.
    pub destdir: Option<PathBuf>,
    /// Runtime executable used for shims and the rebuild helper.
    pub runtime: String,
    /// Addon build script passed to the runtime as `<script> rebuild`.
    pub gyp_script: String,
}

impl Default for Env {
    fn default() -> Self {
        let home = env::var_os(HOME_ENV).map_or_else(
            || {
                dirs_next::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".gpk")
            },
            PathBuf::from,
        );

        Self {
            home,
            base_dir: env::var_os(BASE_DIR_ENV).map(PathBuf::from),
            prefix: None,
            destdir: env::var_os("DESTDIR").map(PathBuf::from),
            runtime: "node".to_string(),
            gyp_script: "node-gyp".to_string(),
        }
    }
}

impl Env {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the gpk home directory.
    #[must_use]
    pub fn with_home(mut self, home: PathBuf) -> Self {
        self.home = home;
        self
    }

    /// Override the base directory for relative file templates.
    #[must_use]
    pub fn with_base_dir(mut self, base: PathBuf) -> Self {
        self.base_dir = Some(base);
        self
    }

    /// Set an explicit global prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: PathBuf) -> Self {
        self.prefix = Some(prefix);
        self
    }

    /// Root of the verified cache.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.home.join("cache")
    }

    /// Global prefix: explicit configuration, then `PREFIX`, then the
    /// runtime installation prefix, with `DESTDIR` prepended when set.
    #[must_use]
    pub fn global_prefix(&self) -> PathBuf {
        let prefix = self
            .prefix
            .clone()
            .or_else(|| env::var_os("PREFIX").map(PathBuf::from))
            .unwrap_or_else(|| runtime_prefix(&self.runtime));

        match &self.destdir {
            Some(destdir) => prepend_root(destdir, &prefix),
            None => prefix,
        }
    }

    /// Global library root holding globally installed packages.
    #[must_use]
    pub fn global_lib(&self) -> PathBuf {
        if cfg!(windows) {
            self.global_prefix().join("node_modules")
        } else {
            self.global_prefix().join("lib").join("node_modules")
        }
    }

    /// Global executable directory.
    #[must_use]
    pub fn global_bin(&self) -> PathBuf {
        if cfg!(windows) {
            self.global_prefix()
        } else {
            self.global_prefix().join("bin")
        }
    }
}

/// Installation prefix of the runtime found on `PATH`.
///
/// On Unix the runtime lives in `<prefix>/bin`, so the prefix is the
/// binary's grandparent; on Windows it is the binary's directory.
/// Falls back to `/usr/local` when the runtime cannot be found.
fn runtime_prefix(runtime: &str) -> PathBuf {
    let Some(bin) = find_on_path(runtime) else {
        return PathBuf::from("/usr/local");
    };

    if cfg!(windows) {
        bin.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf)
    } else {
        bin.parent()
            .and_then(Path::parent)
            .map_or_else(|| PathBuf::from("/usr/local"), Path::to_path_buf)
    }
}

/// Locate an executable on `PATH`.
fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    for dir in env::split_paths(&path) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        #[cfg(windows)]
        {
            let exe = dir.join(format!("{name}.exe"));
            if exe.is_file() {
                return Some(exe);
            }
        }
    }
    None
}

/// Join `root` and an absolute `path` without dropping `root`.
fn prepend_root(root: &Path, path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = root.to_path_buf();
    for component in path.components() {
        match component {
            Component::RootDir | Component::Prefix(_) => {}
            other => out.push(other),
        }
    }
    out
}
