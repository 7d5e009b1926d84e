use gpk_core::{manifest, scripts, Result};
use std::path::Path;

pub fn run(cwd: &Path, script: &str) -> Result<()> {
    let (root, root_manifest) = manifest::locate(cwd, true)?;
    let status = scripts::run_script(&root, &root_manifest, script)?;

    if !status.success() {
        std::process::exit(status.code().unwrap_or(1));
    }
    Ok(())
}
