//! Restriction policy and per-session configuration.
//!
//! A [`ForgeConfig`] is replaced wholesale by `Forge::configure`; nothing is
//! merged across calls. Config files are JSON, validated against
//! `schema/forge_config.schema.json` before they are deserialized.

use anyhow::{Context, Result, anyhow, bail};
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

const CONFIG_SCHEMA: &str = include_str!("../schema/forge_config.schema.json");

/// Restriction field name to the set of restricted values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Policy(BTreeMap<String, BTreeSet<String>>);

impl Policy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `values` to the restricted set of `field`.
    pub fn restrict<I, S>(mut self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(field, values);
        self
    }

    /// Bans every character of `chars`.
    pub fn restrict_chars(self, chars: &str) -> Self {
        self.restrict("char", chars.chars().map(String::from))
    }

    pub fn insert<I, S>(&mut self, field: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .entry(field.to_string())
            .or_default()
            .extend(values.into_iter().map(Into::into));
    }

    pub fn get(&self, field: &str) -> Option<&BTreeSet<String>> {
        self.0.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.0.iter().map(|(field, values)| (field.as_str(), values))
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeSet::is_empty)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForgeConfig {
    pub restrictions: Policy,
    /// Names the target environment already exposes.
    pub provided: BTreeSet<String>,
    /// Unit names the resolver skips.
    pub banned: BTreeSet<String>,
    /// Splice dependencies into call sites instead of nesting definitions.
    pub inline: bool,
}

impl ForgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_restrictions(mut self, restrictions: Policy) -> Self {
        self.restrictions = restrictions;
        self
    }

    pub fn provide(mut self, name: impl Into<String>) -> Self {
        self.provided.insert(name.into());
        self
    }

    pub fn ban(mut self, name: impl Into<String>) -> Self {
        self.banned.insert(name.into());
        self
    }

    pub fn inline(mut self, inline: bool) -> Self {
        self.inline = inline;
        self
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("loading config {}", path.display()))
    }

    /// Parses and schema-validates a JSON config document.
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw).context("parsing config JSON")?;
        validate_config_value(&value)?;
        serde_json::from_value(value).context("decoding config")
    }
}

fn validate_config_value(value: &Value) -> Result<()> {
    let schema: Value =
        serde_json::from_str(CONFIG_SCHEMA).context("parsing bundled config schema")?;
    let compiled = JSONSchema::compile(&schema)
        .map_err(|err| anyhow!("compiling bundled config schema: {err}"))?;
    if let Err(errors) = compiled.validate(value) {
        let details = errors
            .map(|err| err.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        bail!("config failed schema validation:\n{details}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restrict_chars_splits_into_single_characters() {
        let policy = Policy::new().restrict_chars("'\"");
        let chars = policy.get("char").unwrap();
        assert_eq!(chars.len(), 2);
        assert!(chars.contains("'") && chars.contains("\""));
    }

    #[test]
    fn empty_value_sets_count_as_an_empty_policy() {
        let policy = Policy::new().restrict("ast", Vec::<String>::new());
        assert!(policy.is_empty());
    }

    #[test]
    fn from_json_accepts_partial_documents() {
        let config = ForgeConfig::from_json(r#"{"provided": ["sys"]}"#).unwrap();
        assert!(config.provided.contains("sys"));
        assert!(!config.inline);
        assert!(config.restrictions.is_empty());
    }

    #[test]
    fn from_json_rejects_unknown_fields() {
        let err = ForgeConfig::from_json(r#"{"restrictions": {"colour": ["red"]}}"#).unwrap_err();
        assert!(format!("{err:#}").contains("schema validation"));
        assert!(ForgeConfig::from_json(r#"{"inlined": true}"#).is_err());
    }
}
