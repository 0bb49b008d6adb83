//! Cosmetic identifier shortening for rendered payloads.
//!
//! Every variable, parameter, function, class, exception and import alias
//! name is replaced by the shortest unused name drawn from an alphabet.
//! Names cannot be told apart from builtins by looking at the source alone,
//! so builtins are renamed too unless listed in `keep`. Attribute names and
//! call keywords are left alone, and so are modules imported without an
//! alias.

use crate::python::literal::is_identifier;
use crate::python::source::{Edits, Source, SyntaxTree, is_binding_name, is_field, preorder};
use anyhow::{Result, bail};
use std::collections::{BTreeMap, BTreeSet};
use tree_sitter::Node;

pub const DEFAULT_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz";

pub fn shorten_identifiers(source: &str, alphabet: &str, keep: &[String]) -> Result<String> {
    let alphabet = validate_alphabet(alphabet)?;
    let tree = SyntaxTree::parse(source)?;

    let mut kept: BTreeSet<String> = keep.iter().cloned().collect();
    for node in preorder(tree.root()) {
        if let Some(name) = imported_name(node, tree.source()) {
            kept.insert(name);
        }
    }

    let mut mapping: BTreeMap<String, String> = BTreeMap::new();
    let mut names = NameGenerator::new(alphabet);
    let mut edits = Edits::default();
    for node in preorder(tree.root()) {
        if !is_binding_name(node) {
            continue;
        }
        let name = tree.text(node);
        if kept.contains(name) {
            continue;
        }
        let short = mapping.entry(name.to_string()).or_insert_with(|| {
            names
                .by_ref()
                .find(|candidate| is_identifier(candidate) && !kept.contains(candidate))
                .unwrap_or_default()
        });
        edits.replace(node.byte_range(), short.clone());
    }
    Ok(Source::new(edits.apply(tree.source())).into_string())
}

fn validate_alphabet(alphabet: &str) -> Result<Vec<char>> {
    let mut chars: Vec<char> = Vec::new();
    for c in alphabet.chars() {
        if !(c == '_' || c.is_alphanumeric()) {
            bail!("alphabet may only contain identifier characters, got {:?}", c);
        }
        if !chars.contains(&c) {
            chars.push(c);
        }
    }
    if !chars.iter().any(|c| *c == '_' || c.is_alphabetic()) {
        bail!("alphabet must contain at least one letter or underscore");
    }
    Ok(chars)
}

/// Name bound by `import x.y` or `from m import x`, neither aliased.
fn imported_name(node: Node<'_>, source: &str) -> Option<String> {
    if node.kind() != "dotted_name" {
        return None;
    }
    let text = &source[node.byte_range()];
    match node.parent()?.kind() {
        "import_statement" => text.split('.').next().map(str::to_string),
        "import_from_statement" if !is_field(node, "module_name") => Some(text.to_string()),
        _ => None,
    }
}

/// `a, b, …, z, aa, ab, …` over the given alphabet, without end.
struct NameGenerator {
    alphabet: Vec<char>,
    digits: Vec<usize>,
}

impl NameGenerator {
    fn new(alphabet: Vec<char>) -> Self {
        Self {
            alphabet,
            digits: vec![0],
        }
    }
}

impl Iterator for NameGenerator {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let name = self.digits.iter().map(|&d| self.alphabet[d]).collect();
        let mut pos = self.digits.len();
        loop {
            if pos == 0 {
                self.digits.insert(0, 0);
                break;
            }
            pos -= 1;
            self.digits[pos] += 1;
            if self.digits[pos] < self.alphabet.len() {
                break;
            }
            self.digits[pos] = 0;
        }
        Some(name)
    }
}
