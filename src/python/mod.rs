//! The Python source code family.
//!
//! Units are top-level `def` statements. Positional parameters are runtime
//! arguments; keyword-only parameters name the capability families the unit
//! depends on.

pub mod assemble;
pub mod converters;
pub mod kinds;
pub mod literal;
pub mod observe;
pub mod source;

pub use source::Source;

use crate::converters::ConverterRegistry;
use crate::error::ForgeError;
use crate::evaluate::Observation;
use crate::family::Family;
use crate::unit::{Converter, Gadget};
use source::{Function, SyntaxTree, normalized, statements, string_statement_value};
use tracing::warn;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Python;

fn malformed() -> ForgeError {
    ForgeError::MalformedUnit("unit is not a single function declaration".into())
}

impl Family for Python {
    type Code = Source;
    type Rewrite = dyn converters::NodeRewrite;
    type Output = String;

    const NAME: &'static str = "python";
    const EXTENSION: &'static str = "py";

    fn parse_units(source: &str) -> Result<Vec<Source>, ForgeError> {
        let tree = SyntaxTree::parse(source)?;
        let mut units = Vec::new();
        for (pos, stmt) in statements(tree.root()).into_iter().enumerate() {
            if Function::from_node(stmt, source).is_some() {
                units.push(Source::new(normalized(tree.text(stmt))));
            } else if pos == 0 && string_statement_value(stmt, source).is_some() {
                continue;
            } else {
                warn!(kind = stmt.kind(), "ignoring top-level statement outside of a unit");
            }
        }
        Ok(units)
    }

    fn unit_name(code: &Source) -> Result<String, ForgeError> {
        let tree = SyntaxTree::parse(code.as_str())?;
        let def = tree.sole_function().ok_or_else(malformed)?;
        Ok(def.name)
    }

    fn params(code: &Source) -> Vec<String> {
        SyntaxTree::parse(code.as_str())
            .ok()
            .and_then(|tree| tree.sole_function().map(|def| def.positional()))
            .unwrap_or_default()
    }

    fn dependency_names(code: &Source) -> Vec<String> {
        SyntaxTree::parse(code.as_str())
            .ok()
            .and_then(|tree| tree.sole_function().map(|def| def.keyword_only()))
            .unwrap_or_default()
    }

    fn empty() -> Source {
        Source::default()
    }

    fn placeholder(name: &str) -> Source {
        Source::new(format!("# {name} is provided by the target environment\n"))
    }

    fn observe(code: &Source, dependencies: &[String]) -> Result<Observation, ForgeError> {
        let tree = SyntaxTree::parse(code.as_str())?;
        if tree.sole_function().is_none() {
            return Err(ForgeError::MalformedUnit(
                "only single function units can be evaluated".into(),
            ));
        }
        observe::observe(code, dependencies)
    }

    fn convert(code: Source, converter: &Converter<Self>) -> Source {
        converters::apply(code, converter.rewrite(), converter.applies())
    }

    fn merge_dependency(target: &mut Gadget<Self>, dependency: &Gadget<Self>) {
        assemble::merge(target, dependency);
    }

    fn render(gadget: &Gadget<Self>, args: &[&str]) -> Result<String, ForgeError> {
        assemble::render(gadget, args)
    }

    fn builtin_converters() -> ConverterRegistry<Self> {
        converters::builtin()
    }
}
