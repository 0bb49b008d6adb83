//! Converter registry.
//!
//! A [`ConverterSpec`] describes a converter before any of its requirements
//! are resolved: the node kinds it rewrites, the `(field, value)` violations
//! it removes and the capability names it needs at runtime. The selector
//! instantiates a spec into a [`Converter`] once those names resolve.

use crate::config::Policy;
use crate::error::ForgeError;
use crate::family::Family;
use crate::unit::Converter;
use std::fmt;
use std::rc::Rc;

pub struct ConverterSpec<F: Family> {
    pub name: String,
    pub applies: Vec<String>,
    pub resolves: Policy,
    pub requires: Vec<String>,
    pub rewrite: Rc<F::Rewrite>,
}

impl<F: Family> fmt::Debug for ConverterSpec<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterSpec")
            .field("name", &self.name)
            .field("applies", &self.applies)
            .field("resolves", &self.resolves)
            .field("requires", &self.requires)
            .finish_non_exhaustive()
    }
}

impl<F: Family> ConverterSpec<F> {
    pub fn new(name: impl Into<String>, rewrite: Rc<F::Rewrite>) -> Self {
        Self {
            name: name.into(),
            applies: Vec::new(),
            resolves: Policy::new(),
            requires: Vec::new(),
            rewrite,
        }
    }

    pub fn applies_to<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.applies.extend(kinds.into_iter().map(Into::into));
        self
    }

    pub fn resolves<I, S>(mut self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resolves.insert(field, values);
        self
    }

    pub fn requires<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn handles(&self, field: &str, value: &str) -> bool {
        self.resolves
            .get(field)
            .is_some_and(|values| values.contains(value))
    }

    /// A fresh converter with no dependencies attached yet.
    pub fn instantiate(&self) -> Converter<F> {
        Converter::new(
            self.name.clone(),
            self.applies.iter().cloned(),
            Rc::clone(&self.rewrite),
        )
    }
}

/// Registered converters in priority order.
pub struct ConverterRegistry<F: Family> {
    specs: Vec<Rc<ConverterSpec<F>>>,
}

impl<F: Family> Default for ConverterRegistry<F> {
    fn default() -> Self {
        Self { specs: Vec::new() }
    }
}

impl<F: Family> Clone for ConverterRegistry<F> {
    fn clone(&self) -> Self {
        Self {
            specs: self.specs.clone(),
        }
    }
}

impl<F: Family> fmt::Debug for ConverterRegistry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.specs.iter()).finish()
    }
}

impl<F: Family> ConverterRegistry<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `spec`; earlier registrations win when several apply.
    pub fn register(&mut self, spec: ConverterSpec<F>) -> Result<(), ForgeError> {
        if spec.applies.is_empty() {
            return Err(ForgeError::MalformedUnit(format!(
                "converter '{}' rewrites no node kinds",
                spec.name
            )));
        }
        if self.specs.iter().any(|existing| existing.name == spec.name) {
            return Err(ForgeError::MalformedUnit(format!(
                "converter '{}' is already registered",
                spec.name
            )));
        }
        self.specs.push(Rc::new(spec));
        Ok(())
    }

    /// Appends a spec known to be well formed.
    pub(crate) fn push(&mut self, spec: ConverterSpec<F>) {
        self.specs.push(Rc::new(spec));
    }

    /// Specs that remove `value` under `field`, in registration order.
    pub fn applicable<'s>(
        &'s self,
        field: &'s str,
        value: &'s str,
    ) -> impl Iterator<Item = &'s Rc<ConverterSpec<F>>> + 's {
        self.specs.iter().filter(move |spec| spec.handles(field, value))
    }

    /// Whether any converter is registered for `field` at all.
    pub fn covers_field(&self, field: &str) -> bool {
        self.specs
            .iter()
            .any(|spec| spec.resolves.get(field).is_some_and(|values| !values.is_empty()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(|spec| spec.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
