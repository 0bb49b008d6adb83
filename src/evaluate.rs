//! Policy evaluation: what a unit's code shows versus what the policy bans.
//!
//! Code families reduce a unit to an [`Observation`]; this module compares
//! it against each restriction field. Blacklist fields deny everything when
//! nothing was observed. Whitelist fields accept everything when the unit
//! declares nothing.

use crate::config::Policy;
use crate::error::ForgeError;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

/// Restriction field name to the offending values.
pub type Violations = BTreeMap<String, BTreeSet<String>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestrictionField {
    Ast,
    Char,
    Substr,
    Platforms,
    Versions,
}

impl RestrictionField {
    pub fn name(self) -> &'static str {
        match self {
            RestrictionField::Ast => "ast",
            RestrictionField::Char => "char",
            RestrictionField::Substr => "substr",
            RestrictionField::Platforms => "platforms",
            RestrictionField::Versions => "versions",
        }
    }
}

impl FromStr for RestrictionField {
    type Err = ForgeError;

    fn from_str(field: &str) -> Result<Self, Self::Err> {
        match field {
            "ast" => Ok(RestrictionField::Ast),
            "char" => Ok(RestrictionField::Char),
            "substr" => Ok(RestrictionField::Substr),
            "platforms" => Ok(RestrictionField::Platforms),
            "versions" => Ok(RestrictionField::Versions),
            other => Err(ForgeError::UnsupportedRestrictionField(other.to_string())),
        }
    }
}

/// Everything the evaluator needs to know about one unit's code.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Observation {
    /// Syntax node kinds.
    pub kinds: BTreeSet<String>,
    /// Single characters of the observed tokens.
    pub chars: BTreeSet<String>,
    /// Concatenated token text of each observed node.
    pub fragments: BTreeSet<String>,
    /// Values the unit declares support for, per whitelist field.
    pub declared: BTreeMap<String, BTreeSet<String>>,
}

pub fn evaluate(policy: &Policy, observation: &Observation) -> Result<Violations, ForgeError> {
    let mut violations = Violations::new();
    for (name, restricted) in policy.iter() {
        let field = name.parse::<RestrictionField>()?;
        let found = match field {
            RestrictionField::Ast => blacklist(restricted, &observation.kinds),
            RestrictionField::Char => blacklist(restricted, &observation.chars),
            RestrictionField::Substr => containment(restricted, &observation.fragments),
            RestrictionField::Platforms | RestrictionField::Versions => {
                whitelist(restricted, observation.declared.get(field.name()))
            }
        };
        if !found.is_empty() {
            violations.insert(name.to_string(), found);
        }
    }
    Ok(violations)
}

fn blacklist(restricted: &BTreeSet<String>, seen: &BTreeSet<String>) -> BTreeSet<String> {
    if seen.is_empty() {
        return restricted.clone();
    }
    restricted.intersection(seen).cloned().collect()
}

fn containment(restricted: &BTreeSet<String>, fragments: &BTreeSet<String>) -> BTreeSet<String> {
    if fragments.is_empty() {
        return restricted.clone();
    }
    restricted
        .iter()
        .filter(|needle| fragments.iter().any(|fragment| fragment.contains(needle.as_str())))
        .cloned()
        .collect()
}

fn whitelist(restricted: &BTreeSet<String>, declared: Option<&BTreeSet<String>>) -> BTreeSet<String> {
    match declared {
        Some(supported) if !supported.is_empty() => {
            restricted.difference(supported).cloned().collect()
        }
        _ => BTreeSet::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    fn observed() -> Observation {
        Observation {
            kinds: set(&["Return", "Call", "Name", "Constant"]),
            chars: set(&["o", "s", "'", "(", ")"]),
            fragments: set(&["returnimport('os')", "import('os')"]),
            declared: BTreeMap::from([("platforms".to_string(), set(&["linux"]))]),
        }
    }

    #[test]
    fn blacklist_reports_the_intersection() {
        let policy = Policy::new()
            .restrict("ast", ["Call", "Lambda"])
            .restrict_chars("'\"");
        let violations = evaluate(&policy, &observed()).unwrap();
        assert_eq!(violations["ast"], set(&["Call"]));
        assert_eq!(violations["char"], set(&["'"]));
    }

    #[test]
    fn blacklist_without_observations_denies_everything() {
        let policy = Policy::new().restrict("ast", ["Call", "Lambda"]);
        let violations = evaluate(&policy, &Observation::default()).unwrap();
        assert_eq!(violations["ast"], set(&["Call", "Lambda"]));
    }

    #[test]
    fn substrings_match_by_containment() {
        let policy = Policy::new().restrict("substr", ["('", "import", "exec"]);
        let violations = evaluate(&policy, &observed()).unwrap();
        assert_eq!(violations["substr"], set(&["('", "import"]));
    }

    #[test]
    fn whitelist_only_fails_declared_mismatches() {
        let policy = Policy::new()
            .restrict("platforms", ["win32"])
            .restrict("versions", ["12"]);
        let violations = evaluate(&policy, &observed()).unwrap();
        assert_eq!(violations["platforms"], set(&["win32"]));
        assert!(!violations.contains_key("versions"));
    }

    #[test]
    fn unknown_field_is_fatal() {
        let policy = Policy::new().restrict("colour", ["red"]);
        let err = evaluate(&policy, &observed()).unwrap_err();
        assert_eq!(err, ForgeError::UnsupportedRestrictionField("colour".into()));
        assert!(err.is_fatal());
    }

    #[test]
    fn empty_policy_never_violates() {
        assert!(evaluate(&Policy::new(), &Observation::default()).unwrap().is_empty());
    }
}
