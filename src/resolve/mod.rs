//! Depth-first, backtracking search for a gadget tree.
//!
//! A [`Resolution`] is one request-scoped session: it snapshots the catalog
//! into a working list of entries, and every unit that resolves replaces its
//! pending source with the shared result. A memoized unit is returned as is
//! the next time its name is tried, even from a different parent.
//!
//! Candidates are tried in catalog order. Names already on the path (`seen`)
//! and banned names are skipped, which is the only cycle guard. Backtracking
//! errors make the search move on to the next candidate; fatal errors end
//! the whole request.

mod select;

use crate::catalog::Catalog;
use crate::config::ForgeConfig;
use crate::converters::ConverterRegistry;
use crate::error::ForgeError;
use crate::evaluate::{RestrictionField, evaluate};
use crate::family::Family;
use crate::python::Python;
use crate::unit::{Chain, Gadget};
use std::rc::Rc;
use tracing::{debug, trace};

pub use select::next_permutation;

enum Slot<F: Family> {
    Pending(Rc<F::Code>),
    Resolved(Rc<Gadget<F>>),
}

pub struct Resolution<'a, F: Family = Python> {
    config: &'a ForgeConfig,
    converters: &'a ConverterRegistry<F>,
    entries: Vec<(String, Slot<F>)>,
}

impl<'a, F: Family> Resolution<'a, F> {
    pub fn new(
        catalog: &Catalog<F>,
        config: &'a ForgeConfig,
        converters: &'a ConverterRegistry<F>,
    ) -> Self {
        let entries = catalog
            .entries()
            .map(|entry| (entry.name.clone(), Slot::Pending(Rc::clone(&entry.code))))
            .collect();
        Self {
            config,
            converters,
            entries,
        }
    }

    /// Resolve `name`, a unit name or any prefix of one, into a chain.
    pub fn resolve(&mut self, name: &str) -> Result<Chain<F>, ForgeError> {
        debug!(request = name, inline = self.config.inline, "resolving");
        for (field, _) in self.config.restrictions.iter() {
            field.parse::<RestrictionField>()?;
        }
        let root = self.try_gadget(name, &[])?;
        debug!(request = name, unit = root.name(), "resolved");
        Ok(Chain::new(root))
    }

    /// The memoized unit stored under the exact name `name`, if resolved.
    pub fn memoized(&self, name: &str) -> Option<Rc<Gadget<F>>> {
        self.entries.iter().find_map(|(entry, slot)| match slot {
            Slot::Resolved(gadget) if entry == name => Some(Rc::clone(gadget)),
            _ => None,
        })
    }

    pub(crate) fn try_gadget(
        &mut self,
        name: &str,
        seen: &[String],
    ) -> Result<Rc<Gadget<F>>, ForgeError> {
        if self.config.provided.contains(name) {
            trace!(name, "provided by the target environment");
            return Ok(Rc::new(Gadget::provided(name, self.config.inline)));
        }

        let mut last_failure = None;
        for idx in 0..self.entries.len() {
            let (entry, slot) = &self.entries[idx];
            if !entry.starts_with(name)
                || seen.iter().any(|visited| visited == entry)
                || self.config.banned.contains(entry)
            {
                continue;
            }
            let code = match slot {
                Slot::Resolved(gadget) => {
                    trace!(unit = %entry, "memoized");
                    return Ok(Rc::clone(gadget));
                }
                Slot::Pending(code) => Rc::clone(code),
            };
            let candidate = entry.clone();
            trace!(unit = %candidate, "trying candidate");
            match self.try_candidate(&candidate, code, seen) {
                Ok(gadget) => {
                    self.entries[idx].1 = Slot::Resolved(Rc::clone(&gadget));
                    return Ok(gadget);
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    debug!(unit = %candidate, error = %err, "candidate rejected");
                    last_failure = Some(err);
                }
            }
        }
        Err(last_failure.unwrap_or_else(|| ForgeError::UnknownCapability(name.to_string())))
    }

    fn try_candidate(
        &mut self,
        name: &str,
        code: Rc<F::Code>,
        seen: &[String],
    ) -> Result<Rc<Gadget<F>>, ForgeError> {
        let mut gadget = Gadget::from_shared(code, self.config.inline)?;
        let dependencies = gadget.dependency_names();
        let observation = F::observe(gadget.code(), &dependencies)?;
        let violations = evaluate(&self.config.restrictions, &observation)?;
        if !violations.is_empty() {
            debug!(unit = name, ?violations, "violations found");
            select::convert(self, &mut gadget, &dependencies, &violations, seen)?;
        }

        let mut path = seen.to_vec();
        path.push(name.to_string());
        for dependency in &dependencies {
            let resolved = self.try_gadget(dependency, &path).map_err(|source| {
                ForgeError::UnsatisfiableDependency {
                    unit: name.to_string(),
                    dependency: dependency.clone(),
                    source: Box::new(source),
                }
            })?;
            gadget.add_dependency(resolved);
        }
        Ok(Rc::new(gadget))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Policy;

    fn catalog(src: &str) -> Catalog<Python> {
        let mut catalog = Catalog::new();
        catalog.register_source(src).unwrap();
        catalog
    }

    fn resolve(catalog: &Catalog<Python>, config: &ForgeConfig, name: &str) -> Result<Chain, ForgeError> {
        let converters = Python::builtin_converters();
        Resolution::new(catalog, config, &converters).resolve(name)
    }

    #[test]
    fn prefix_matches_the_first_clean_candidate() {
        let catalog = catalog("def x__a():\n    return 'a'\ndef x__b():\n    return 1\n");
        let config = ForgeConfig::new().with_restrictions(Policy::new().restrict("ast", ["Constant"]));
        let err = resolve(&catalog, &config, "x").unwrap_err();
        assert!(matches!(err, ForgeError::UnresolvableViolation { .. } | ForgeError::ConversionExhausted { .. }));

        let chain = resolve(&catalog, &ForgeConfig::new(), "x").unwrap();
        assert_eq!(chain.root().name(), "x__a");
    }

    #[test]
    fn banned_units_fall_through_to_the_next_candidate() {
        let catalog = catalog("def x__a():\n    return 1\ndef x__b():\n    return 2\n");
        let chain = resolve(&catalog, &ForgeConfig::new().ban("x__a"), "x").unwrap();
        assert_eq!(chain.root().name(), "x__b");
    }

    #[test]
    fn unknown_names_report_unknown_capability() {
        let catalog = catalog("def x__a():\n    return 1\n");
        let err = resolve(&catalog, &ForgeConfig::new(), "y").unwrap_err();
        assert_eq!(err, ForgeError::UnknownCapability("y".into()));
    }

    #[test]
    fn cycles_terminate_with_a_failure() {
        let catalog = catalog("def a__x(*, b):\n    return b\ndef b__x(*, a):\n    return a\n");
        let err = resolve(&catalog, &ForgeConfig::new(), "a").unwrap_err();
        assert!(matches!(err, ForgeError::UnsatisfiableDependency { .. }));
    }

    #[test]
    fn resolved_units_are_memoized_within_a_session() {
        let catalog = catalog("def a__x(*, c):\n    return c\ndef b__x(*, c):\n    return c\ndef c__x():\n    return 1\n");
        let config = ForgeConfig::new();
        let converters = Python::builtin_converters();
        let mut session = Resolution::new(&catalog, &config, &converters);
        let a = session.resolve("a").unwrap();
        let b = session.resolve("b").unwrap();
        assert!(Rc::ptr_eq(&a.root().dependencies()[0], &b.root().dependencies()[0]));
        assert!(session.memoized("c__x").is_some());
        assert!(session.memoized("c").is_none());
    }

    #[test]
    fn unsupported_fields_abort_the_request() {
        let catalog = catalog("def a__x(*, b):\n    return b\ndef b__x():\n    return 1\n");
        let config = ForgeConfig::new().with_restrictions(Policy::new().restrict("colour", ["red"]));
        let err = resolve(&catalog, &config, "a").unwrap_err();
        assert_eq!(err, ForgeError::UnsupportedRestrictionField("colour".into()));
    }
}
