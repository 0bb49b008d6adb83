//! On-disk gadget tree loading.
//!
//! Files are visited in sorted path order so the catalog, and with it every
//! resolution, is deterministic across platforms and directory listings.

use crate::catalog::{CatalogEntry, Origin};
use crate::family::Family;
use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Parse every `<root>/<F::NAME>/**.<F::EXTENSION>` file into catalog
/// entries, in file then declaration order.
pub fn load_family_units<F: Family>(root: &Path) -> Result<Vec<CatalogEntry<F>>> {
    let dir = root.join(F::NAME);
    if !dir.is_dir() {
        bail!(
            "gadget directory {} does not exist (expected <root>/{}/)",
            dir.display(),
            F::NAME
        );
    }
    let files = collect_files(&dir, F::EXTENSION)?;

    let mut entries = Vec::new();
    for path in files {
        let source = fs::read_to_string(&path)
            .with_context(|| format!("reading gadget file {}", path.display()))?;
        let units = F::parse_units(&source)
            .with_context(|| format!("parsing gadget file {}", path.display()))?;
        debug!(path = %path.display(), units = units.len(), "loaded gadget file");
        for code in units {
            let name = F::unit_name(&code)
                .with_context(|| format!("naming unit in {}", path.display()))?;
            entries.push(CatalogEntry {
                name,
                code: Rc::new(code),
                origin: Origin::File(path.clone()),
            });
        }
    }
    Ok(entries)
}

fn collect_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("listing {}", dir.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        if path.extension().is_some_and(|ext| ext == extension) {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

/// Unit names must be identifiers; the family is the part before `__`.
pub fn validate_unit_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("unit name must not be empty");
    }
    let mut chars = name.chars();
    let starts_well = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_');
    if !starts_well || !chars.all(|c| c.is_alphanumeric() || c == '_') {
        bail!("unit name must be an identifier, got '{}'", name);
    }
    match name.find("__") {
        Some(0) => bail!("unit name '{}' has an empty family prefix", name),
        Some(_) => {}
        None => warn!(unit = name, "unit name has no '__'; it forms its own family"),
    }
    Ok(())
}
