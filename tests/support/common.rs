#![allow(dead_code)]

use anyhow::{Context, Result};
use jailforge::{Catalog, Forge, ForgeConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::support::gadget_root;

/// A forge over the catalog shipped in `gadgets/`.
pub fn bundled_forge(config: ForgeConfig) -> Result<Forge> {
    let mut forge = Forge::from_root(&gadget_root())?;
    forge.configure(config);
    Ok(forge)
}

/// A forge over units registered from `source` only.
pub fn forge_from_source(source: &str, config: ForgeConfig) -> Result<Forge> {
    let mut catalog = Catalog::new();
    catalog.register_source(source)?;
    let mut forge = Forge::new(catalog);
    forge.configure(config);
    Ok(forge)
}

/// An on-disk gadget root under a temp directory, removed on drop.
pub struct TempCatalog {
    dir: TempDir,
}

impl TempCatalog {
    pub fn new() -> Result<Self> {
        let dir = TempDir::new().context("creating temp gadget root")?;
        fs::create_dir_all(dir.path().join("python"))?;
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `contents` to `python/<relative>`, creating parent directories.
    pub fn write(&self, relative: &str, contents: &str) -> Result<PathBuf> {
        let path = self.root().join("python").join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)
            .with_context(|| format!("writing fixture {}", path.display()))?;
        Ok(path)
    }
}
