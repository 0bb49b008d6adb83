//! Gadget-chain resolution for restricted Python sandboxes.
//!
//! A catalog of small gadget functions, each named `capability__variant`, is
//! searched for a chain that obtains a requested capability under a
//! restriction policy. Violating units are rewritten by converters; the
//! resolved tree is rendered back into a single program.
//!
//! The engine is generic over a code [`Family`]; [`Python`] is the one
//! shipped family.

pub mod catalog;
pub mod clean;
pub mod config;
pub mod converters;
pub mod error;
pub mod evaluate;
pub mod family;
pub mod forge;
pub mod python;
pub mod resolve;
pub mod telemetry;
pub mod unit;

pub use catalog::Catalog;
pub use config::{ForgeConfig, Policy};
pub use converters::{ConverterRegistry, ConverterSpec};
pub use error::ForgeError;
pub use family::Family;
pub use forge::Forge;
pub use python::Python;
pub use resolve::Resolution;
pub use unit::{Chain, Converter, Gadget};

use anyhow::{Result, bail};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

pub const GADGETS_ENV: &str = "JAILFORGE_GADGETS";

fn is_gadget_root(candidate: &Path) -> bool {
    candidate.join(Python::NAME).is_dir()
}

fn gadget_root_from_hint(hint: &Path) -> Option<PathBuf> {
    if hint.as_os_str().is_empty() || !is_gadget_root(hint) {
        return None;
    }
    fs::canonicalize(hint).ok()
}

/// Nearest ancestor of `start` (itself included) holding a usable
/// `gadgets/` directory.
fn search_upwards(start: &Path) -> Option<PathBuf> {
    let mut dir = fs::canonicalize(start).ok()?;
    loop {
        let candidate = dir.join(catalog::DEFAULT_GADGET_DIR);
        if is_gadget_root(&candidate) {
            return Some(candidate);
        }
        if !dir.pop() {
            break;
        }
    }
    None
}

/// Locates the gadget root: `explicit`, then `JAILFORGE_GADGETS`, then the
/// nearest `gadgets/` above the working directory or the executable, then
/// the catalog bundled with the crate.
pub fn find_gadget_root(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if let Some(root) = gadget_root_from_hint(path) {
            return Ok(root);
        }
        bail!(
            "{} is not a gadget root (expected a '{}' subdirectory)",
            path.display(),
            Python::NAME
        );
    }

    if let Some(env_root) = env::var_os(GADGETS_ENV) {
        if let Some(root) = gadget_root_from_hint(Path::new(&env_root)) {
            return Ok(root);
        }
    }

    if let Ok(cwd) = env::current_dir() {
        if let Some(root) = search_upwards(&cwd) {
            return Ok(root);
        }
    }

    if let Ok(exe_path) = env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            if let Some(root) = search_upwards(exe_dir) {
                return Ok(root);
            }
        }
    }

    let bundled = Path::new(env!("CARGO_MANIFEST_DIR")).join(catalog::DEFAULT_GADGET_DIR);
    if let Some(root) = gadget_root_from_hint(&bundled) {
        return Ok(root);
    }

    bail!("Unable to locate a gadget catalog. Pass --gadgets or set {GADGETS_ENV}.");
}

pub fn split_list(value: &str) -> Vec<String> {
    value
        .replace(',', " ")
        .split_whitespace()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
