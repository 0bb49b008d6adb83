//! Request facade: catalog, converters and configuration in one place.

use crate::catalog::Catalog;
use crate::config::ForgeConfig;
use crate::converters::{ConverterRegistry, ConverterSpec};
use crate::error::ForgeError;
use crate::family::Family;
use crate::python::Python;
use crate::resolve::Resolution;
use crate::unit::Chain;
use anyhow::Result;
use std::path::Path;

#[derive(Debug)]
pub struct Forge<F: Family = Python> {
    catalog: Catalog<F>,
    converters: ConverterRegistry<F>,
    config: ForgeConfig,
}

impl<F: Family> Forge<F> {
    /// A forge over `catalog` with the family's bundled converters and an
    /// empty configuration.
    pub fn new(catalog: Catalog<F>) -> Self {
        Self {
            catalog,
            converters: F::builtin_converters(),
            config: ForgeConfig::default(),
        }
    }

    /// Loads the catalog from `<root>/<family>/`.
    pub fn from_root(root: &Path) -> Result<Self> {
        Ok(Self::new(Catalog::load(root)?))
    }

    /// Replaces the whole configuration; nothing carries over.
    pub fn configure(&mut self, config: ForgeConfig) {
        self.config = config;
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog<F> {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut Catalog<F> {
        &mut self.catalog
    }

    pub fn converters(&self) -> &ConverterRegistry<F> {
        &self.converters
    }

    pub fn register_converter(&mut self, spec: ConverterSpec<F>) -> Result<(), ForgeError> {
        self.converters.register(spec)
    }

    /// A resolution session against the current configuration. Units
    /// resolved through one session are shared between its requests.
    pub fn session(&self) -> Resolution<'_, F> {
        Resolution::new(&self.catalog, &self.config, &self.converters)
    }

    pub fn request(&self, name: &str) -> Result<Chain<F>, ForgeError> {
        self.session().resolve(name)
    }
}
