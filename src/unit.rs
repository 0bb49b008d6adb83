//! Capability units (gadgets), transformation units (converters) and chains.
//!
//! A gadget keeps its original code untouched; conversions replace only the
//! working copy. Resolved gadgets are shared through `Rc` so a memoized unit
//! can sit under several parents of one chain.

use crate::error::ForgeError;
use crate::family::Family;
use crate::python::Python;
use serde::Serialize;
use std::fmt;
use std::rc::Rc;

#[derive(Debug)]
pub struct Gadget<F: Family> {
    pub(crate) name: String,
    pub(crate) original: Rc<F::Code>,
    /// Working copy; the only code conversions touch.
    pub(crate) code: F::Code,
    /// Emitted dependency code, placed in front of the body when rendered.
    pub(crate) chain: F::Code,
    pub(crate) dependencies: Vec<Rc<Gadget<F>>>,
    pub(crate) converters: Vec<Rc<Converter<F>>>,
    pub(crate) dummy: bool,
    pub(crate) inline: bool,
}

impl<F: Family> Gadget<F> {
    pub fn new(code: F::Code, inline: bool) -> Result<Self, ForgeError> {
        Self::from_shared(Rc::new(code), inline)
    }

    pub(crate) fn from_shared(original: Rc<F::Code>, inline: bool) -> Result<Self, ForgeError> {
        let name = F::unit_name(&original)?;
        Ok(Self {
            name,
            code: (*original).clone(),
            original,
            chain: F::empty(),
            dependencies: Vec::new(),
            converters: Vec::new(),
            dummy: false,
            inline,
        })
    }

    /// Builds a gadget from source holding exactly one unit declaration.
    pub fn from_source(source: &str, inline: bool) -> Result<Self, ForgeError> {
        let mut units = F::parse_units(source)?;
        if units.len() != 1 {
            return Err(ForgeError::MalformedUnit(format!(
                "expected one declaration, found {}",
                units.len()
            )));
        }
        match units.pop() {
            Some(code) => Self::new(code, inline),
            None => Err(ForgeError::MalformedUnit("empty source".to_string())),
        }
    }

    /// Stand-in for a capability the target environment already exposes.
    pub fn provided(name: &str, inline: bool) -> Self {
        let code = F::placeholder(name);
        Self {
            name: name.to_string(),
            original: Rc::new(code.clone()),
            code,
            chain: F::empty(),
            dependencies: Vec::new(),
            converters: Vec::new(),
            dummy: true,
            inline,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Capability family: the part of the name before the first `__`.
    pub fn family(&self) -> &str {
        family_of(&self.name)
    }

    pub fn is_provided(&self) -> bool {
        self.dummy
    }

    pub fn is_inline(&self) -> bool {
        self.inline
    }

    pub fn dependency_names(&self) -> Vec<String> {
        if self.dummy {
            return Vec::new();
        }
        F::dependency_names(&self.original)
    }

    pub fn params(&self) -> Vec<String> {
        if self.dummy {
            return Vec::new();
        }
        F::params(&self.original)
    }

    pub fn dependencies(&self) -> &[Rc<Gadget<F>>] {
        &self.dependencies
    }

    pub fn converters(&self) -> &[Rc<Converter<F>>] {
        &self.converters
    }

    pub fn original(&self) -> &F::Code {
        &self.original
    }

    pub fn code(&self) -> &F::Code {
        &self.code
    }

    /// A copy of the working code for trial rewrites.
    pub fn extract(&self) -> F::Code {
        self.code.clone()
    }

    pub fn add_dependency(&mut self, dependency: Rc<Gadget<F>>) {
        F::merge_dependency(self, &dependency);
        self.dependencies.push(dependency);
    }

    /// Adopts `code` produced by `converters` and merges their dependencies
    /// into the chain like the gadget's own.
    pub fn apply_converters(&mut self, converters: Vec<Rc<Converter<F>>>, code: F::Code) {
        self.code = code;
        for converter in &converters {
            for dependency in &converter.dependencies {
                F::merge_dependency(self, dependency);
            }
        }
        self.converters.extend(converters);
    }

    pub fn render(&self, args: &[&str]) -> Result<F::Output, ForgeError> {
        F::render(self, args)
    }

    pub fn summary(&self) -> UnitSummary {
        UnitSummary {
            name: self.name.clone(),
            provided: self.dummy,
            converters: self
                .converters
                .iter()
                .map(|converter| ConverterSummary {
                    name: converter.name.clone(),
                    dependencies: converter
                        .dependencies
                        .iter()
                        .map(|dep| dep.summary())
                        .collect(),
                })
                .collect(),
            dependencies: self.dependencies.iter().map(|dep| dep.summary()).collect(),
        }
    }
}

pub fn family_of(name: &str) -> &str {
    name.split("__").next().unwrap_or(name)
}

pub struct Converter<F: Family> {
    name: String,
    applies: Vec<String>,
    rewrite: Rc<F::Rewrite>,
    dependencies: Vec<Rc<Gadget<F>>>,
}

impl<F: Family> fmt::Debug for Converter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("name", &self.name)
            .field("applies", &self.applies)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

impl<F: Family> Converter<F> {
    pub fn new<I, S>(name: impl Into<String>, applies: I, rewrite: Rc<F::Rewrite>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            applies: applies.into_iter().map(Into::into).collect(),
            rewrite,
            dependencies: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Node kinds the rewrite is invoked on.
    pub fn applies(&self) -> &[String] {
        &self.applies
    }

    pub fn rewrite(&self) -> &F::Rewrite {
        &self.rewrite
    }

    pub fn dependencies(&self) -> &[Rc<Gadget<F>>] {
        &self.dependencies
    }

    pub fn add_dependency(&mut self, dependency: Rc<Gadget<F>>) {
        self.dependencies.push(dependency);
    }

    pub fn convert(&self, code: F::Code) -> F::Code {
        F::convert(code, self)
    }
}

/// A resolved request, ready to render.
pub struct Chain<F: Family = Python> {
    root: Rc<Gadget<F>>,
}

impl<F: Family> Clone for Chain<F> {
    fn clone(&self) -> Self {
        Self {
            root: Rc::clone(&self.root),
        }
    }
}

impl<F: Family> fmt::Debug for Chain<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain").field("root", &self.root).finish()
    }
}

impl<F: Family> Chain<F> {
    pub fn new(root: Rc<Gadget<F>>) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Rc<Gadget<F>> {
        &self.root
    }

    pub fn render(&self, args: &[&str]) -> Result<F::Output, ForgeError> {
        self.root.render(args)
    }

    pub fn summary(&self) -> UnitSummary {
        self.root.summary()
    }

    /// Names of every unit in the chain, depth first, each listed once.
    pub fn unit_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        collect_names(&self.root, &mut names);
        names
    }
}

fn collect_names<F: Family>(gadget: &Gadget<F>, names: &mut Vec<String>) {
    if names.iter().any(|name| name == &gadget.name) {
        return;
    }
    names.push(gadget.name.clone());
    for converter in &gadget.converters {
        for dep in &converter.dependencies {
            collect_names(dep, names);
        }
    }
    for dep in &gadget.dependencies {
        collect_names(dep, names);
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UnitSummary {
    pub name: String,
    pub provided: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub converters: Vec<ConverterSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<UnitSummary>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConverterSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<UnitSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_is_the_prefix_before_the_double_underscore() {
        assert_eq!(family_of("os__sys"), "os");
        assert_eq!(family_of("get_shell__fork_exec_3_10"), "get_shell");
        assert_eq!(family_of("standalone"), "standalone");
    }

    #[test]
    fn from_source_requires_a_single_declaration() {
        let err = Gadget::<Python>::from_source("def a__x():\n    pass\ndef a__y():\n    pass\n", false)
            .unwrap_err();
        assert!(matches!(err, ForgeError::MalformedUnit(_)));
        let gadget = Gadget::<Python>::from_source("def hex__fmt(n):\n    return f'{n:#x}'\n", false)
            .unwrap();
        assert_eq!(gadget.name(), "hex__fmt");
        assert_eq!(gadget.params(), vec!["n".to_string()]);
        assert!(gadget.dependency_names().is_empty());
    }

    #[test]
    fn provided_units_have_no_dependencies() {
        let gadget = Gadget::<Python>::provided("sys", false);
        assert!(gadget.is_provided());
        assert!(gadget.dependency_names().is_empty());
        assert_eq!(gadget.family(), "sys");
    }
}
