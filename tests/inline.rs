// Definition and inline rendering of multi-unit chains.
mod support;
#[path = "support/common.rs"]
mod common;

use anyhow::Result;
use jailforge::ForgeConfig;
use support::{python_available, repo_root, run_python};

use common::forge_from_source;

const INC: &str = "def inc__add(n):\n    return n + 1\n";

fn check_output(payload: &str, print: &str, expected: &str) -> Result<()> {
    if python_available() {
        let out = run_python(&format!("{payload}print({print})\n"), &repo_root())?;
        assert_eq!(out, expected, "payload:\n{payload}");
    }
    Ok(())
}

#[test]
fn definition_mode_nests_parameterised_dependencies() -> Result<()> {
    let source = format!("def top__t(*, inc):\n    return inc(41)\n{INC}");
    let forge = forge_from_source(&source, ForgeConfig::new())?;
    let payload = forge.request("top")?.render(&[])?;
    assert_eq!(
        payload,
        "def top__t():\n    def inc__add(n):\n        return n + 1\n    inc = inc__add\n    return inc(41)\ntop = top__t()\n"
    );
    check_output(&payload, "top", "42")
}

#[test]
fn inline_mode_expands_every_call_site() -> Result<()> {
    let source = format!("def top__t(*, inc):\n    return inc(inc(1))\n{INC}");
    let forge = forge_from_source(&source, ForgeConfig::new().inline(true))?;
    let payload = forge.request("top")?.render(&[])?;
    assert_eq!(
        payload,
        "inc__add_0_n = 1\ninc__add_0 = inc__add_0_n + 1\ninc__add_1_n = inc__add_0\ninc__add_1 = inc__add_1_n + 1\ntop = inc__add_1\n"
    );
    check_output(&payload, "top", "3")
}

#[test]
fn inline_mode_flattens_parameterless_chains() -> Result<()> {
    let source = "def a__x(*, b):\n    return b * 2\ndef b__x(*, c):\n    y = c + 1\n    return y\ndef c__x():\n    return 20\n";
    let forge = forge_from_source(source, ForgeConfig::new().inline(true))?;
    let payload = forge.request("a")?.render(&[])?;
    assert_eq!(payload, "c = 20\ny = c + 1\nb = y\na = b * 2\n");
    check_output(&payload, "a", "42")
}

#[test]
fn inline_nonlocals_at_module_scope_become_global() -> Result<()> {
    let source = "def counter__c():\n    n = 0\n    def bump():\n        nonlocal n\n        n += 1\n    bump()\n    return n\n";
    let forge = forge_from_source(source, ForgeConfig::new().inline(true))?;
    let payload = forge.request("counter")?.render(&[])?;
    assert!(payload.contains("    global n\n"), "{payload}");
    assert!(!payload.contains("nonlocal"), "{payload}");
    check_output(&payload, "counter", "1")
}

#[test]
fn inline_top_unit_takes_call_arguments() -> Result<()> {
    let forge = forge_from_source(INC, ForgeConfig::new().inline(true))?;
    let payload = forge.request("inc")?.render(&["41"])?;
    assert_eq!(
        payload,
        "inc__add_0_n = 41\ninc__add_0 = inc__add_0_n + 1\ninc__add_0\n"
    );
    check_output(&payload, "inc__add_0", "42")
}
