#![allow(dead_code)]

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::io::Write;

pub fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn gadget_root() -> PathBuf {
    repo_root().join("gadgets")
}

pub fn jailforge_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_jailforge"))
}

pub fn run_command(mut cmd: Command) -> Result<Output> {
    let output = cmd
        .output()
        .with_context(|| format!("failed to spawn {:?}", cmd.get_program()))?;
    Ok(output)
}

/// Whether a `python3` interpreter is on PATH. Execution checks are skipped
/// without one.
pub fn python_available() -> bool {
    Command::new("python3")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Feeds `program` to `python3 -` and returns its trimmed stdout.
pub fn run_python(program: &str, cwd: &Path) -> Result<String> {
    let mut child = Command::new("python3")
        .arg("-")
        .current_dir(cwd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("failed to spawn python3")?;
    child
        .stdin
        .take()
        .context("python3 stdin unavailable")?
        .write_all(program.as_bytes())
        .context("writing program to python3")?;
    let output = child.wait_with_output().context("waiting for python3")?;
    anyhow::ensure!(
        output.status.success(),
        "python3 failed on:\n{program}\nstderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
