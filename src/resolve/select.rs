//! Converter selection and ordering.
//!
//! One converter is chosen per violated value: the first registered for the
//! `(field, value)` pair whose requirements resolve. The chosen set is then
//! applied in every order, lexicographically by selection order, until one
//! order leaves the unit clean. A converter that introduces a violation
//! outside the chosen set is never corrected.

use super::Resolution;
use crate::error::ForgeError;
use crate::evaluate::{Violations, evaluate};
use crate::family::Family;
use crate::unit::{Converter, Gadget};
use std::rc::Rc;
use tracing::{debug, trace};

pub(super) fn convert<F: Family>(
    resolution: &mut Resolution<'_, F>,
    gadget: &mut Gadget<F>,
    dependencies: &[String],
    violations: &Violations,
    seen: &[String],
) -> Result<(), ForgeError> {
    let unit = gadget.name().to_string();
    let registry = resolution.converters;
    let mut chosen: Vec<Rc<Converter<F>>> = Vec::new();
    for (field, values) in violations {
        if !registry.covers_field(field) {
            return Err(unresolvable(&unit, field, values.iter().next().map(String::as_str)));
        }
        for value in values {
            let converter = choose_converter(resolution, &unit, field, value, seen)?;
            if chosen.iter().all(|existing| existing.name() != converter.name()) {
                chosen.push(Rc::new(converter));
            }
        }
    }

    let mut order: Vec<usize> = (0..chosen.len()).collect();
    loop {
        let mut code = gadget.extract();
        for &idx in &order {
            code = chosen[idx].convert(code);
        }
        let residual = evaluate(
            &resolution.config.restrictions,
            &F::observe(&code, dependencies)?,
        )?;
        if residual.is_empty() {
            let applied: Vec<_> = order.iter().map(|&idx| Rc::clone(&chosen[idx])).collect();
            let names: Vec<&str> = applied.iter().map(|c| c.name()).collect();
            debug!(unit = %unit, converters = ?names, "conversion succeeded");
            gadget.apply_converters(applied, code);
            return Ok(());
        }
        trace!(unit = %unit, ?order, ?residual, "ordering left violations");
        if !next_permutation(&mut order) {
            break;
        }
    }
    Err(ForgeError::ConversionExhausted {
        unit,
        converters: chosen.iter().map(|c| c.name().to_string()).collect(),
    })
}

fn choose_converter<F: Family>(
    resolution: &mut Resolution<'_, F>,
    unit: &str,
    field: &str,
    value: &str,
    seen: &[String],
) -> Result<Converter<F>, ForgeError> {
    let registry = resolution.converters;
    let mut path = seen.to_vec();
    path.push(unit.to_string());
    'specs: for spec in registry.applicable(field, value) {
        let mut converter = spec.instantiate();
        for required in &spec.requires {
            match resolution.try_gadget(required, &path) {
                Ok(dependency) => converter.add_dependency(dependency),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    trace!(converter = %spec.name, required = %required, error = %err, "converter requirement unresolved");
                    continue 'specs;
                }
            }
        }
        return Ok(converter);
    }
    Err(unresolvable(unit, field, Some(value)))
}

fn unresolvable(unit: &str, field: &str, value: Option<&str>) -> ForgeError {
    ForgeError::UnresolvableViolation {
        unit: unit.to_string(),
        field: field.to_string(),
        value: value.unwrap_or_default().to_string(),
    }
}

/// Advances `items` to the next lexicographic permutation. Returns `false`
/// once the last permutation has been passed.
pub fn next_permutation<T: Ord>(items: &mut [T]) -> bool {
    if items.len() < 2 {
        return false;
    }
    let mut pivot = items.len() - 1;
    while pivot > 0 && items[pivot - 1] >= items[pivot] {
        pivot -= 1;
    }
    if pivot == 0 {
        return false;
    }
    let mut swap = items.len() - 1;
    while items[swap] <= items[pivot - 1] {
        swap -= 1;
    }
    items.swap(pivot - 1, swap);
    items[pivot..].reverse();
    true
}
