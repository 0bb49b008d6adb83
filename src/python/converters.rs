//! Node rewrites applied by converters, plus the bundled converters.
//!
//! Both bundled converters remove string literals, which is what jails that
//! ban quote characters require. String pieces of f-strings are offered as
//! well and become formatted fields when rewritten; format specs are left
//! alone.

use crate::converters::{ConverterRegistry, ConverterSpec};
use crate::python::Python;
use crate::python::kinds::{is_fstring, primary_kind};
use crate::python::literal;
use crate::python::source::{Edits, Source, SyntaxTree, children, is_field, named_children};
use std::fmt;
use std::rc::Rc;
use tracing::warn;
use tree_sitter::Node;

/// A node offered to a rewrite.
#[derive(Clone, Copy, Debug)]
pub struct Site<'a> {
    /// `ast` class of the node, e.g. `Constant`.
    pub kind: &'a str,
    /// The node as written.
    pub text: &'a str,
    /// Decoded value when the node is a `str` literal.
    pub value: Option<&'a str>,
}

/// A rewrite invoked on every node whose kind a converter applies to.
pub trait NodeRewrite: fmt::Debug {
    /// Replacement source for `site`, or `None` to keep it.
    fn rewrite(&self, site: &Site<'_>) -> Option<String>;
}

/// `'os'` becomes `chr(111) + chr(115)`.
#[derive(Debug, Default)]
pub struct CharCodes;

impl NodeRewrite for CharCodes {
    fn rewrite(&self, site: &Site<'_>) -> Option<String> {
        let value = site.value.filter(|value| !value.is_empty())?;
        let codes: Vec<String> = value
            .chars()
            .map(|c| format!("chr({})", u32::from(c)))
            .collect();
        Some(codes.join(" + "))
    }
}

/// `'os'` becomes `[*(lambda **k: k)(os=1)][0]`; only identifiers qualify.
#[derive(Debug, Default)]
pub struct KeywordNames;

impl NodeRewrite for KeywordNames {
    fn rewrite(&self, site: &Site<'_>) -> Option<String> {
        let name = site.value.filter(|value| literal::is_identifier(value))?;
        Some(format!("[*(lambda **k: k)({name}=1)][0]"))
    }
}

pub(crate) fn builtin() -> ConverterRegistry<Python> {
    let quotes = ["'", "\""];
    let mut registry = ConverterRegistry::new();
    let chr: Rc<dyn NodeRewrite> = Rc::new(CharCodes);
    registry.push(
        ConverterSpec::new("strless__chr", chr)
            .applies_to(["Constant"])
            .resolves("char", quotes)
            .resolves("ast", ["Constant"])
            .requires(["chr"]),
    );
    let kwargs: Rc<dyn NodeRewrite> = Rc::new(KeywordNames);
    registry.push(
        ConverterSpec::new("strless__kwargs", kwargs)
            .applies_to(["Constant"])
            .resolves("char", quotes)
            .resolves("ast", ["Constant"]),
    );
    registry
}

/// Runs `rewrite` over the unit body, pre-order, skipping the docstring.
/// A rewritten node is not descended into.
pub(crate) fn apply(code: Source, rewrite: &dyn NodeRewrite, applies: &[String]) -> Source {
    let tree = match SyntaxTree::parse(code.as_str()) {
        Ok(tree) => tree,
        Err(err) => {
            warn!(error = %err, "converter skipped code it cannot parse");
            return code;
        }
    };
    let mut pass = ApplyRewrite {
        tree: &tree,
        rewrite,
        applies,
        edits: Edits::default(),
    };
    for root in tree.unit_roots() {
        pass.visit(root);
    }
    if pass.edits.is_empty() {
        return code;
    }
    Source::new(pass.edits.apply(tree.source()))
}

struct ApplyRewrite<'a> {
    tree: &'a SyntaxTree,
    rewrite: &'a dyn NodeRewrite,
    applies: &'a [String],
    edits: Edits,
}

impl ApplyRewrite<'_> {
    fn wants(&self, kind: &str) -> bool {
        self.applies.iter().any(|applied| applied == kind)
    }

    fn visit(&mut self, node: Node<'_>) {
        let source = self.tree.source();
        if is_fstring(node, source) {
            if !(self.wants("JoinedStr") && self.offer(node, "JoinedStr", None)) {
                self.visit_fstring(node);
            }
            return;
        }
        if let Some(kind) = primary_kind(node, source) {
            if self.wants(kind) && self.offer(node, kind, self.string_value(node)) {
                return;
            }
        }
        for child in children(node) {
            self.visit(child);
        }
    }

    fn visit_fstring(&mut self, node: Node<'_>) {
        let raw = literal::prefix(self.tree.text(node)).contains('r');
        for child in children(node) {
            match child.kind() {
                "string_content" if self.wants("Constant") => {
                    let text = self.tree.text(child);
                    let Some(value) = literal::fstring_piece(text, raw) else {
                        continue;
                    };
                    let site = Site {
                        kind: "Constant",
                        text,
                        value: Some(&value),
                    };
                    if let Some(replacement) = self.rewrite.rewrite(&site) {
                        self.edits
                            .replace(child.byte_range(), format!("{{{replacement}}}"));
                    }
                }
                "interpolation" => {
                    if self.wants("FormattedValue") && self.offer(child, "FormattedValue", None) {
                        continue;
                    }
                    for inner in named_children(child) {
                        if !matches!(inner.kind(), "format_specifier" | "type_conversion") {
                            self.visit(inner);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn string_value(&self, node: Node<'_>) -> Option<String> {
        match node.kind() {
            "string" => literal::string_value(self.tree.text(node)),
            "concatenated_string" => named_children(node)
                .into_iter()
                .map(|part| literal::string_value(self.tree.text(part)))
                .collect(),
            _ => None,
        }
    }

    fn offer(&mut self, node: Node<'_>, kind: &str, value: Option<String>) -> bool {
        let site = Site {
            kind,
            text: self.tree.text(node),
            value: value.as_deref(),
        };
        let Some(replacement) = self.rewrite.rewrite(&site) else {
            return false;
        };
        let replacement = if binds_tighter(node) {
            format!("({replacement})")
        } else {
            replacement
        };
        self.edits.replace(node.byte_range(), replacement);
        true
    }
}

/// Whether the surrounding expression would split a replacement that is
/// not an atom.
fn binds_tighter(node: Node<'_>) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    match parent.kind() {
        "attribute" | "call" | "await" | "unary_operator" | "binary_operator"
        | "comparison_operator" | "list_splat" | "dictionary_splat" => true,
        "subscript" => is_field(node, "value"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn converted(src: &str, rewrite: &dyn NodeRewrite) -> String {
        apply(Source::new(src), rewrite, &["Constant".to_string()]).into_string()
    }

    #[test]
    fn char_codes_replace_every_string_literal() {
        let out = converted("def os__import(*, __import__):\n    return __import__('os')\n", &CharCodes);
        assert_eq!(
            out,
            "def os__import(*, __import__):\n    return __import__(chr(111) + chr(115))\n"
        );
    }

    #[test]
    fn empty_strings_and_docstrings_are_kept() {
        let src = "def str__type(*, type):\n    \"\"\"versions: [12]\"\"\"\n    return type('')\n";
        let out = converted(src, &CharCodes);
        assert_eq!(out, src);
    }

    #[test]
    fn keyword_names_only_take_identifiers() {
        let out = converted("def f():\n    return g('os', 'a b', 'if')\n", &KeywordNames);
        assert_eq!(
            out,
            "def f():\n    return g([*(lambda **k: k)(os=1)][0], 'a b', 'if')\n"
        );
    }

    #[test]
    fn operands_are_parenthesized() {
        let out = converted("def f():\n    return 'ab'.upper() * 2\n", &CharCodes);
        assert_eq!(out, "def f():\n    return (chr(97) + chr(98)).upper() * 2\n");
    }

    #[test]
    fn fstring_literals_become_fields() {
        let out = converted("def f(n):\n    return f'0x{n:>4}!'\n", &CharCodes);
        assert_eq!(
            out,
            "def f(n):\n    return f'{chr(48) + chr(120)}{n:>4}{chr(33)}'\n"
        );
    }

    #[test]
    fn self_documenting_fields_survive_conversion() {
        let out = converted("def f(x):\n    return f'{x=}'\n", &CharCodes);
        assert_eq!(out, "def f(x):\n    return f'{x=}'\n");
    }
}
