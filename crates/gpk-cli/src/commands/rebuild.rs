use gpk_core::{manifest, rebuild, Env, Result};
use std::path::Path;

pub fn run(env: &Env, cwd: &Path) -> Result<()> {
    let (root, _) = manifest::locate(cwd, true)?;
    rebuild::rebuild_tree(env, &root)
}
