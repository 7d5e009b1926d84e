use gpk_core::{Env, Result, UninstallOptions};
use std::path::Path;
use tracing::info;

pub fn run(env: &Env, cwd: &Path, names: &[String], global: bool, production: bool) -> Result<()> {
    gpk_core::uninstall(env, cwd, names, &UninstallOptions { global, production })?;
    info!("uninstall complete");
    Ok(())
}
