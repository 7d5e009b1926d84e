use gpk_core::{manifest, Error, Manifest, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// Scaffold a minimal package.json named after the directory.
pub fn run(cwd: &Path) -> Result<()> {
    if manifest::read(cwd)?.is_some() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("package.json already exists in {}", cwd.display()),
        )));
    }

    let name = cwd
        .file_name()
        .map_or_else(|| "package".to_string(), |n| n.to_string_lossy().into_owned());

    let scaffold = Manifest {
        name,
        version: "1.0.0".into(),
        main: Some("index.js".into()),
        scripts: Some(BTreeMap::from([(
            "test".to_string(),
            "echo \"Error: no test specified\" && exit 1".to_string(),
        )])),
        ..Default::default()
    };

    manifest::write(cwd, &scaffold)?;
    println!("Wrote {}", cwd.join("package.json").display());
    Ok(())
}
