// End-to-end resolution: request, convert, render, and (when python3 is
// around) execute the payload.
mod support;
#[path = "support/common.rs"]
mod common;

use anyhow::Result;
use jailforge::evaluate::evaluate;
use jailforge::python::converters::{CharCodes, NodeRewrite};
use jailforge::python::observe::observe_program;
use jailforge::{Chain, Converter, ForgeConfig, ForgeError, Gadget, Policy, Python};
use std::rc::Rc;
use support::{python_available, repo_root, run_python};

use common::{bundled_forge, forge_from_source};

/// Runs `payload` through `exec` with no builtins, only `globals`, then
/// runs `after` in the namespace `g` the payload ran in.
fn exec_without_builtins(preamble: &str, globals: &str, payload: &str, after: &str) -> Result<String> {
    let literal = serde_json::to_string(payload)?;
    let program = format!(
        "{preamble}\ng = {{'__builtins__': {{}}, {globals}}}\nexec({literal}, g)\n{after}\n"
    );
    run_python(&program, &repo_root())
}

fn no_quotes() -> ForgeConfig {
    ForgeConfig::new().with_restrictions(Policy::new().restrict_chars("'\""))
}

// A unit without dependencies renders as its own definition plus a binding
// of the family name, callable with no arguments.
#[test]
fn unrestricted_request_renders_the_first_unit() -> Result<()> {
    let forge = forge_from_source(
        "def x__a():\n    return 40 + 2\ndef x__b():\n    return 0\n",
        ForgeConfig::new(),
    )?;
    let payload = forge.request("x")?.render(&[])?;
    assert_eq!(payload, "def x__a():\n    return 40 + 2\nx = x__a()\n");

    if python_available() {
        let out = run_python(&format!("{payload}print(x)\n"), &repo_root())?;
        assert_eq!(out, "42");
    }
    Ok(())
}

#[test]
fn quotes_are_removed_with_char_codes_when_chr_is_provided() -> Result<()> {
    let source = "def s__lit():\n    return 'hi'\n";
    let forge = forge_from_source(source, no_quotes().provide("chr"))?;
    let chain = forge.request("s")?;
    let payload = chain.render(&[])?;
    assert!(!payload.contains('\'') && !payload.contains('"'), "{payload}");
    assert!(payload.contains("return chr(104) + chr(105)"), "{payload}");
    assert_eq!(chain.root().converters()[0].name(), "strless__chr");

    if python_available() {
        let out = run_python(&format!("{payload}print(s)\n"), &repo_root())?;
        assert_eq!(out, "hi");
    }
    Ok(())
}

#[test]
fn quotes_fall_back_to_keyword_names_without_chr() -> Result<()> {
    let forge = forge_from_source("def s__lit():\n    return 'hi'\n", no_quotes())?;
    let chain = forge.request("s")?;
    let payload = chain.render(&[])?;
    assert!(!payload.contains('\'') && !payload.contains('"'), "{payload}");
    assert!(payload.contains("(lambda **k: k)(hi=1)"), "{payload}");
    assert_eq!(chain.root().converters()[0].name(), "strless__kwargs");

    if python_available() {
        let out = run_python(&format!("{payload}print(s)\n"), &repo_root())?;
        assert_eq!(out, "hi");
    }
    Ok(())
}

#[test]
fn banning_the_first_unit_falls_through_to_the_second() -> Result<()> {
    let source = "def x__first():\n    return 1\ndef x__second():\n    return 2\n";
    let forge = forge_from_source(source, ForgeConfig::new().ban("x__first"))?;
    let chain = forge.request("x")?;
    assert_eq!(chain.root().name(), "x__second");
    Ok(())
}

// Only the char-code converter handles a string that is not an identifier,
// and it needs `chr`.
#[test]
fn converter_requirements_must_be_provided() -> Result<()> {
    let source = "def s__lit():\n    return 'a b'\n";
    let forge = forge_from_source(source, no_quotes())?;
    let err = forge.request("s").unwrap_err();
    assert!(
        matches!(err, ForgeError::ConversionExhausted { ref unit, .. } if unit == "s__lit"),
        "{err:?}"
    );

    let forge = forge_from_source(source, no_quotes().provide("chr"))?;
    let payload = forge.request("s")?.render(&[])?;
    assert!(payload.contains("chr(97) + chr(32) + chr(98)"), "{payload}");
    Ok(())
}

#[test]
fn dependency_failures_name_the_missing_capability() -> Result<()> {
    let forge = forge_from_source("def a__x(*, nothing):\n    return nothing\n", ForgeConfig::new())?;
    let err = forge.request("a").unwrap_err();
    match err {
        ForgeError::UnsatisfiableDependency {
            unit,
            dependency,
            source,
        } => {
            assert_eq!(unit, "a__x");
            assert_eq!(dependency, "nothing");
            assert_eq!(*source, ForgeError::UnknownCapability("nothing".into()));
        }
        other => panic!("unexpected error {other:?}"),
    }
    Ok(())
}

#[test]
fn unsupported_restriction_fields_are_fatal() -> Result<()> {
    let config =
        ForgeConfig::new().with_restrictions(Policy::new().restrict("charset", ["ascii"]));
    let forge = forge_from_source("def a__x():\n    return 1\ndef a__y():\n    return 2\n", config)?;
    let err = forge.request("a").unwrap_err();
    assert_eq!(err, ForgeError::UnsupportedRestrictionField("charset".into()));
    assert!(err.is_fatal());
    Ok(())
}

// The field check happens before any candidate is looked at, so provided
// names and names with no candidates fail the same way.
#[test]
fn unsupported_fields_fail_requests_that_evaluate_nothing() -> Result<()> {
    let config = ForgeConfig::new()
        .with_restrictions(Policy::new().restrict("colour", ["red"]))
        .provide("sys");
    let forge = forge_from_source("def a__x():\n    return 1\n", config)?;
    let colour = ForgeError::UnsupportedRestrictionField("colour".into());
    assert_eq!(forge.request("sys").unwrap_err(), colour);
    assert_eq!(forge.request("zzz").unwrap_err(), colour);
    Ok(())
}

#[test]
fn independent_requests_render_identically() -> Result<()> {
    let config = no_quotes().provide("sys").provide("chr");
    let first = bundled_forge(config.clone())?.request("os")?.render(&[])?;
    let second = bundled_forge(config)?.request("os")?.render(&[])?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn bundled_os_via_sys_without_quotes() -> Result<()> {
    let forge = bundled_forge(no_quotes().provide("sys").provide("chr"))?;
    let chain = forge.request("os")?;
    assert_eq!(chain.root().name(), "os__sys");
    let payload = chain.render(&[])?;
    assert!(!payload.contains('\'') && !payload.contains('"'), "{payload}");
    assert!(payload.contains("sys.modules[chr(111) + chr(115)]"), "{payload}");
    assert_eq!(chain.unit_names(), vec!["os__sys", "chr", "sys"]);

    if python_available() {
        let program = format!("import sys\n{payload}print(os.sep)\n");
        let out = run_python(&program, &repo_root())?;
        assert_eq!(out, std::path::MAIN_SEPARATOR.to_string());

        let out = exec_without_builtins(
            "import sys",
            "'sys': sys, 'chr': chr",
            &payload,
            "print(g['os'].sep)",
        )?;
        assert_eq!(out, std::path::MAIN_SEPARATOR.to_string());
    }
    Ok(())
}

// The rendered program, observed as a whole, is clean under the same policy
// the units were checked against.
#[test]
fn rendered_payload_has_no_residual_violations() -> Result<()> {
    let policy = Policy::new()
        .restrict_chars("'\"")
        .restrict("ast", ["Import", "ImportFrom"])
        .restrict("substr", ["import"]);
    let config = ForgeConfig::new()
        .with_restrictions(policy.clone())
        .provide("sys")
        .provide("chr");
    let payload = bundled_forge(config)?.request("os")?.render(&[])?;

    let observation = observe_program(&payload)?;
    assert!(observation.kinds.contains("Subscript"), "{observation:?}");
    let violations = evaluate(&policy, &observation)?;
    assert!(violations.is_empty(), "{violations:?} in\n{payload}");
    Ok(())
}

#[test]
fn residual_check_catches_what_conversion_did_not_touch() -> Result<()> {
    let policy = Policy::new().restrict("ast", ["Import"]).restrict("substr", ["system"]);
    let observation = observe_program("import os\nos.system(cmd)\n")?;
    let violations = evaluate(&policy, &observation)?;
    assert_eq!(violations["ast"].len(), 1);
    assert_eq!(violations["substr"].len(), 1);
    Ok(())
}

#[test]
fn bundled_os_is_unreachable_without_a_root_capability() -> Result<()> {
    let forge = bundled_forge(ForgeConfig::new())?;
    assert!(forge.request("os").is_err());
    Ok(())
}

#[test]
fn version_requirements_pick_the_matching_variant() -> Result<()> {
    let config = ForgeConfig::new()
        .with_restrictions(
            Policy::new()
                .restrict("platforms", ["linux"])
                .restrict("versions", ["12"]),
        )
        .provide("import_builtin_module")
        .ban("get_shell__os_system")
        .ban("get_shell__subprocess");
    let forge = bundled_forge(config)?;
    let chain = forge.request("get_shell")?;
    assert_eq!(chain.root().name(), "get_shell__fork_exec_3_12");
    Ok(())
}

#[test]
fn inline_shell_payload_runs_the_command() -> Result<()> {
    let forge = bundled_forge(ForgeConfig::new().provide("os").inline(true))?;
    let payload = forge.request("get_shell")?.render(&["'echo forged'"])?;
    assert!(
        payload.starts_with("get_shell__os_system_0_cmd = 'echo forged'\n"),
        "{payload}"
    );
    assert!(payload.contains("os.system(get_shell__os_system_0_cmd)"), "{payload}");
    assert!(!payload.contains("def "), "{payload}");

    if python_available() {
        let out = run_python(&format!("import os\n{payload}"), &repo_root())?;
        assert_eq!(out, "forged");

        let out = exec_without_builtins("import os", "'os': os", &payload, "")?;
        assert_eq!(out, "forged");
    }
    Ok(())
}

// Building the same chain by hand renders exactly what the search renders.
#[test]
fn manual_chains_render_like_searched_ones() -> Result<()> {
    let source = "def s__lit():\n    return 'hi'\n";
    let searched = forge_from_source(source, no_quotes().provide("chr"))?
        .request("s")?
        .render(&[])?;

    let mut unit = Gadget::<Python>::from_source(source, false)?;
    let rewrite: Rc<dyn NodeRewrite> = Rc::new(CharCodes);
    let mut converter = Converter::<Python>::new("strless__chr", ["Constant"], rewrite);
    converter.add_dependency(Rc::new(Gadget::provided("chr", false)));
    let code = converter.convert(unit.extract());
    unit.apply_converters(vec![Rc::new(converter)], code);
    let manual = Chain::new(Rc::new(unit)).render(&[])?;

    assert_eq!(manual, searched);
    Ok(())
}
