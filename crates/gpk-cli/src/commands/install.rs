use gpk_core::{Env, InstallOptions, Result};
use std::path::Path;
use tracing::info;

pub fn run(env: &Env, cwd: &Path, sources: &[String], global: bool, production: bool) -> Result<()> {
    gpk_core::install(env, cwd, sources, &InstallOptions { global, production })?;
    info!("install complete");
    Ok(())
}
