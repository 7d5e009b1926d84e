//! Manifest script execution.

use crate::error::{Error, Result};
use crate::manifest::Manifest;
use std::env;
use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, ExitStatus};
use tracing::info;

/// Run `scripts.<name>` from the root manifest through the shell,
/// with the root's `node_modules/.bin` prepended to `PATH`.
///
/// # Errors
/// `UnknownScript` when the manifest declares no such script.
pub fn run_script(root: &Path, manifest: &Manifest, name: &str) -> Result<ExitStatus> {
    let command = manifest
        .scripts
        .as_ref()
        .and_then(|s| s.get(name))
        .ok_or_else(|| Error::UnknownScript {
            name: name.to_string(),
        })?;

    info!(script = name, command = %command, "running script");

    let path = prepend_bin_path(root);

    let status = shell_command(command)
        .current_dir(root)
        .env("PATH", path)
        .status()?;

    Ok(status)
}

fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/c").arg(command);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

fn prepend_bin_path(root: &Path) -> OsString {
    let bin = root.join("node_modules").join(".bin");
    let current = env::var_os("PATH").unwrap_or_default();

    let mut paths = vec![bin];
    paths.extend(env::split_paths(&current));
    env::join_paths(paths).unwrap_or(current)
}
