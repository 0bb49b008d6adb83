//! Resolve a capability into a payload under a restriction policy.
//!
//! Usage:
//!   jailforge os --char "'\"" --provided sys
//!   jailforge get_shell "'sh'" --platform linux --version 11 --inline --clean
//!   jailforge os --config policy.json --json

use anyhow::{Context, Result};
use clap::Parser;
use jailforge::clean::{DEFAULT_ALPHABET, shorten_identifiers};
use jailforge::telemetry::init_tracing;
use jailforge::unit::UnitSummary;
use jailforge::{Forge, ForgeConfig, find_gadget_root, split_list};
use serde::Serialize;
use std::path::PathBuf;
use tracing::Level;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

#[derive(Parser, Debug)]
#[command(name = "jailforge")]
#[command(about = "Build a gadget chain that obtains a capability under sandbox restrictions")]
#[command(disable_version_flag = true)]
struct Cli {
    /// Capability to obtain: a unit name or any prefix of one (e.g. `os`).
    capability: String,
    /// Python expressions passed to the capability at call time.
    args: Vec<String>,
    /// Gadget root containing a `python/` directory.
    #[arg(long)]
    gadgets: Option<PathBuf>,
    /// JSON config file; command-line restrictions are added on top.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Names the target already exposes (comma or space separated, repeatable).
    #[arg(long)]
    provided: Vec<String>,
    /// Unit names the resolver must skip (comma or space separated, repeatable).
    #[arg(long)]
    banned: Vec<String>,
    /// Characters the target rejects, given as one string.
    #[arg(long = "char")]
    chars: Option<String>,
    /// Substrings the target rejects (repeatable).
    #[arg(long)]
    substr: Vec<String>,
    /// Syntax node kinds the target rejects (comma or space separated, repeatable).
    #[arg(long)]
    ast: Vec<String>,
    /// Platforms the payload must run on.
    #[arg(long)]
    platform: Vec<String>,
    /// Python 3 minor versions the payload must run on.
    #[arg(long = "version")]
    versions: Vec<String>,
    /// Splice dependencies into their call sites instead of emitting definitions.
    #[arg(long)]
    inline: bool,
    /// Shorten identifiers in the rendered payload.
    #[arg(long)]
    clean: bool,
    /// Extra names the cleaner must leave alone (comma or space separated).
    #[arg(long)]
    keep: Vec<String>,
    /// Print the payload and the resolved chain as JSON.
    #[arg(long)]
    json: bool,
    /// Log resolution progress to stderr.
    #[arg(long, short)]
    verbose: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    capability: &'a str,
    payload: &'a str,
    chain: UnitSummary,
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(if cli.verbose { Level::DEBUG } else { Level::WARN });

    let config = build_config(&cli)?;
    let root = find_gadget_root(cli.gadgets.as_deref())?;
    let mut forge: Forge = Forge::from_root(&root)
        .with_context(|| format!("loading gadget catalog from {}", root.display()))?;
    let keep: Vec<String> = config
        .provided
        .iter()
        .cloned()
        .chain(cli.keep.iter().flat_map(|value| split_list(value)))
        .collect();
    forge.configure(config);

    let chain = forge
        .request(&cli.capability)
        .with_context(|| format!("resolving '{}'", cli.capability))?;
    let args: Vec<&str> = cli.args.iter().map(String::as_str).collect();
    let mut payload = chain.render(&args).context("rendering payload")?;
    if cli.clean {
        payload = shorten_identifiers(&payload, DEFAULT_ALPHABET, &keep)
            .context("shortening identifiers")?;
    }

    if cli.json {
        let report = Report {
            capability: &cli.capability,
            payload: &payload,
            chain: chain.summary(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{payload}");
    }
    Ok(())
}

fn build_config(cli: &Cli) -> Result<ForgeConfig> {
    let mut config = match &cli.config {
        Some(path) => ForgeConfig::load(path)?,
        None => ForgeConfig::new(),
    };
    config
        .provided
        .extend(cli.provided.iter().flat_map(|value| split_list(value)));
    config
        .banned
        .extend(cli.banned.iter().flat_map(|value| split_list(value)));
    if cli.inline {
        config.inline = true;
    }

    let restrictions = &mut config.restrictions;
    if let Some(chars) = &cli.chars {
        restrictions.insert("char", chars.chars().map(String::from));
    }
    if !cli.substr.is_empty() {
        restrictions.insert("substr", cli.substr.iter().cloned());
    }
    let lists = [
        ("ast", &cli.ast),
        ("platforms", &cli.platform),
        ("versions", &cli.versions),
    ];
    for (field, values) in lists {
        let values: Vec<String> = values.iter().flat_map(|value| split_list(value)).collect();
        if !values.is_empty() {
            restrictions.insert(field, values);
        }
    }
    Ok(config)
}
