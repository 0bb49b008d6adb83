//! Gadget catalog wiring.
//!
//! A catalog is an ordered list of unit declarations for one code family,
//! loaded from `<root>/<family>/**.<ext>` and optionally extended with
//! user-registered units. Order is stable: files in sorted path order, units
//! in file order, user registrations last. The resolver snapshots the
//! catalog per request, so registering units never disturbs a running
//! resolution.

pub mod index;

use crate::family::Family;
use crate::python::Python;
use anyhow::{Result, bail};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub use index::{load_family_units, validate_unit_name};

/// Directory name of the bundled gadget tree.
pub const DEFAULT_GADGET_DIR: &str = "gadgets";

/// Where a catalog unit came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Origin {
    File(PathBuf),
    User,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::File(path) => write!(f, "{}", path.display()),
            Origin::User => f.write_str("<user>"),
        }
    }
}

pub struct CatalogEntry<F: Family> {
    pub name: String,
    pub code: Rc<F::Code>,
    pub origin: Origin,
}

impl<F: Family> Clone for CatalogEntry<F> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            code: Rc::clone(&self.code),
            origin: self.origin.clone(),
        }
    }
}

impl<F: Family> fmt::Debug for CatalogEntry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("name", &self.name)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

pub struct Catalog<F: Family = Python> {
    entries: Vec<CatalogEntry<F>>,
}

impl<F: Family> Default for Catalog<F> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<F: Family> Clone for Catalog<F> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<F: Family> fmt::Debug for Catalog<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|entry| &entry.name))
            .finish()
    }
}

impl<F: Family> Catalog<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every unit under `<root>/<F::NAME>/`.
    pub fn load(root: &Path) -> Result<Self> {
        let mut catalog = Self::new();
        for entry in load_family_units::<F>(root)? {
            catalog.insert(entry)?;
        }
        Ok(catalog)
    }

    /// Adds every unit declared in `source`, in declaration order. Returns
    /// the names that were registered.
    pub fn register_source(&mut self, source: &str) -> Result<Vec<String>> {
        let units = F::parse_units(source)?;
        if units.is_empty() {
            bail!("source declares no units");
        }
        let mut names = Vec::with_capacity(units.len());
        for code in units {
            let name = F::unit_name(&code)?;
            self.insert(CatalogEntry {
                name: name.clone(),
                code: Rc::new(code),
                origin: Origin::User,
            })?;
            names.push(name);
        }
        Ok(names)
    }

    pub(crate) fn insert(&mut self, entry: CatalogEntry<F>) -> Result<()> {
        validate_unit_name(&entry.name)?;
        if let Some(existing) = self.get(&entry.name) {
            bail!(
                "duplicate unit name '{}' in {} (first declared in {})",
                entry.name,
                entry.origin,
                existing.origin
            );
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry<F>> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// Whether any unit name starts with `prefix`.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.entries.iter().any(|entry| entry.name.starts_with(prefix))
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry<F>> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_source_keeps_declaration_order() {
        let mut catalog = Catalog::<Python>::new();
        let names = catalog
            .register_source("def b__x():\n    return 1\ndef a__y():\n    return 2\n")
            .unwrap();
        assert_eq!(names, vec!["b__x", "a__y"]);
        assert_eq!(catalog.names().collect::<Vec<_>>(), vec!["b__x", "a__y"]);
        assert!(catalog.has_prefix("a"));
        assert!(!catalog.has_prefix("c"));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut catalog = Catalog::<Python>::new();
        catalog.register_source("def a__x():\n    pass\n").unwrap();
        let err = catalog
            .register_source("def a__x():\n    return 1\n")
            .unwrap_err();
        assert!(err.to_string().contains("duplicate unit name 'a__x'"));
        assert_eq!(catalog.len(), 1);
    }
}
