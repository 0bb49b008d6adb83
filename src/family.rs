//! Code families: the pluggable representation a catalog is written in.
//!
//! The resolver, selector and unit model are generic over [`Family`]. A
//! family knows how to parse catalog files into units, reduce a unit to an
//! [`Observation`], apply a converter's rewrite, merge a dependency into a
//! dependant and render the final payload. Adding a family means adding an
//! implementation, not branches in the resolver.

use crate::converters::ConverterRegistry;
use crate::error::ForgeError;
use crate::evaluate::Observation;
use crate::unit::{Converter, Gadget};
use std::fmt;

pub trait Family: fmt::Debug + Sized + 'static {
    /// Owned code of one unit. Cloned before every trial rewrite.
    type Code: Clone + fmt::Debug;
    /// Rewrite hook carried by converters of this family.
    type Rewrite: ?Sized + fmt::Debug;
    /// Terminal representation of a rendered chain.
    type Output;

    /// Directory name of the family under the gadget root.
    const NAME: &'static str;
    /// File extension of catalog files.
    const EXTENSION: &'static str;

    /// Splits a catalog file into unit declarations, in file order.
    fn parse_units(source: &str) -> Result<Vec<Self::Code>, ForgeError>;

    fn unit_name(code: &Self::Code) -> Result<String, ForgeError>;

    /// Runtime parameters supplied at call time.
    fn params(code: &Self::Code) -> Vec<String>;

    /// Capability names the unit depends on, in declaration order.
    fn dependency_names(code: &Self::Code) -> Vec<String>;

    /// Code with no statements; the starting point of a chain.
    fn empty() -> Self::Code;

    /// Stand-in code for a capability the target already provides.
    fn placeholder(name: &str) -> Self::Code;

    fn observe(code: &Self::Code, dependencies: &[String]) -> Result<Observation, ForgeError>;

    fn convert(code: Self::Code, converter: &Converter<Self>) -> Self::Code;

    /// Stitches `dependency`'s emitted code into `target`'s chain.
    fn merge_dependency(target: &mut Gadget<Self>, dependency: &Gadget<Self>);

    fn render(gadget: &Gadget<Self>, args: &[&str]) -> Result<Self::Output, ForgeError>;

    /// Converters shipped with the family, in priority order.
    fn builtin_converters() -> ConverterRegistry<Self>;
}
