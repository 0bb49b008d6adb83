// Config files: schema validation and wholesale replacement.
mod support;
#[path = "support/common.rs"]
mod common;

use anyhow::Result;
use jailforge::{ForgeConfig, Policy};
use std::fs;
use tempfile::TempDir;

use common::forge_from_source;

#[test]
fn config_file_round_trips_into_a_policy() -> Result<()> {
    let temp = TempDir::new()?;
    let path = temp.path().join("policy.json");
    fs::write(
        &path,
        r#"{"restrictions": {"char": ["'", "\""], "versions": ["12"]}, "provided": ["sys"], "inline": true}"#,
    )?;

    let config = ForgeConfig::load(&path)?;
    let expected = ForgeConfig::new()
        .with_restrictions(
            Policy::new()
                .restrict_chars("'\"")
                .restrict("versions", ["12"]),
        )
        .provide("sys")
        .inline(true);
    assert_eq!(config, expected);
    Ok(())
}

#[test]
fn unknown_keys_and_fields_fail_validation() {
    let err = ForgeConfig::from_json(r#"{"restrict": {}}"#).unwrap_err();
    assert!(format!("{err:#}").contains("schema validation"), "{err:#}");

    let err = ForgeConfig::from_json(r#"{"restrictions": {"colour": ["red"]}}"#).unwrap_err();
    assert!(format!("{err:#}").contains("schema validation"), "{err:#}");
}

#[test]
fn load_reports_the_path() -> Result<()> {
    let temp = TempDir::new()?;
    let path = temp.path().join("missing.json");
    let err = ForgeConfig::load(&path).unwrap_err();
    assert!(format!("{err:#}").contains("missing.json"));
    Ok(())
}

#[test]
fn configure_replaces_rather_than_merges() -> Result<()> {
    let source = "def s__lit():\n    return 'hi'\n";
    let mut forge = forge_from_source(
        source,
        ForgeConfig::new().with_restrictions(Policy::new().restrict("ast", ["Constant"])),
    )?;
    assert!(forge.request("s").is_err());

    forge.configure(ForgeConfig::new().provide("chr"));
    assert!(forge.config().restrictions.is_empty());
    let chain = forge.request("s")?;
    assert!(chain.root().converters().is_empty());
    Ok(())
}
