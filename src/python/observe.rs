//! Reduces Python code to the [`Observation`] the evaluator checks.
//!
//! Only the body of the unit's own function is observed; its header and
//! docstring are not part of the payload. References to declared
//! dependencies are exempt from the `char` and `substr` fields because
//! assembly binds them to other units.

use crate::error::ForgeError;
use crate::evaluate::Observation;
use crate::python::kinds::{ast_kinds, primary_kind};
use crate::python::literal;
use crate::python::source::{Source, SyntaxTree, children, named_children, preorder, statements};
use std::collections::{BTreeMap, BTreeSet};
use tree_sitter::Node;

pub(crate) fn observe(code: &Source, dependencies: &[String]) -> Result<Observation, ForgeError> {
    let tree = SyntaxTree::parse(code.as_str())?;
    let declared = tree
        .sole_function()
        .and_then(|def| def.docstring(&tree))
        .map(|(_, doc)| declarations(&doc))
        .unwrap_or_default();
    let roots = tree.unit_roots();
    Ok(collect(&tree, &roots, dependencies, declared))
}

/// Observes every statement of a whole program, function headers included.
pub fn observe_program(source: &str) -> Result<Observation, ForgeError> {
    let tree = SyntaxTree::parse(source)?;
    let roots = statements(tree.root());
    Ok(collect(&tree, &roots, &[], BTreeMap::new()))
}

fn collect(
    tree: &SyntaxTree,
    roots: &[Node<'_>],
    dependencies: &[String],
    declared: BTreeMap<String, BTreeSet<String>>,
) -> Observation {
    let source = tree.source();
    let exempt = |token: &Node<'_>| {
        token.kind() == "identifier"
            && primary_kind(*token, source) == Some("Name")
            && dependencies.iter().any(|dep| dep == tree.text(*token))
    };

    let mut observation = Observation {
        declared,
        ..Observation::default()
    };
    let mut found = Vec::new();
    for root in roots {
        for node in preorder(*root) {
            found.clear();
            ast_kinds(node, source, &mut found);
            if found.is_empty() {
                continue;
            }
            observation
                .kinds
                .extend(found.iter().map(|kind| kind.to_string()));
            let fragment: String = tokens(node)
                .into_iter()
                .filter(|token| !exempt(token))
                .map(|token| tree.text(token))
                .collect();
            if !fragment.is_empty() {
                observation.fragments.insert(fragment);
            }
        }
        for token in tokens(*root).into_iter().filter(|token| !exempt(token)) {
            observation
                .chars
                .extend(tree.text(token).chars().map(String::from));
        }
    }
    observation
}

/// Leaf tokens of `node`, comments left out. The text of a string literal
/// between its quotes and fields is one token.
fn tokens(node: Node<'_>) -> Vec<Node<'_>> {
    let mut out = Vec::new();
    push_tokens(node, &mut out);
    out
}

fn push_tokens<'t>(node: Node<'t>, out: &mut Vec<Node<'t>>) {
    if node.kind() == "comment" {
        return;
    }
    if node.child_count() == 0 || node.kind() == "string_content" {
        if node.end_byte() > node.start_byte() {
            out.push(node);
        }
        return;
    }
    for child in children(node) {
        push_tokens(child, out);
    }
}

/// Parses `field: literal` docstring lines. Lines that do not hold a
/// literal are ignored.
fn declarations(doc: &str) -> BTreeMap<String, BTreeSet<String>> {
    let mut declared = BTreeMap::new();
    for line in doc.trim().lines() {
        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        let Ok(tree) = SyntaxTree::parse(value.trim()) else {
            continue;
        };
        let stmts = statements(tree.root());
        let [stmt] = stmts.as_slice() else {
            continue;
        };
        let expr = match named_children(*stmt).as_slice() {
            [expr] if stmt.kind() == "expression_statement" => *expr,
            _ => continue,
        };
        if let Some(values) = literal_values(&tree, expr) {
            declared
                .entry(field.trim().to_string())
                .or_insert_with(BTreeSet::new)
                .extend(values);
        }
    }
    declared
}

fn literal_values(tree: &SyntaxTree, expr: Node<'_>) -> Option<Vec<String>> {
    match expr.kind() {
        "list" | "tuple" | "set" => named_children(expr)
            .into_iter()
            .map(|elt| literal_value(tree, elt))
            .collect(),
        "parenthesized_expression" => literal_values(tree, *named_children(expr).first()?),
        _ => literal_value(tree, expr).map(|value| vec![value]),
    }
}

fn literal_value(tree: &SyntaxTree, expr: Node<'_>) -> Option<String> {
    match expr.kind() {
        "string" => literal::string_value(tree.text(expr)),
        "concatenated_string" => named_children(expr)
            .into_iter()
            .map(|part| literal::string_value(tree.text(part)))
            .collect(),
        "integer" | "float" => Some(tree.text(expr).to_string()),
        "true" => Some("True".to_string()),
        "false" => Some("False".to_string()),
        "unary_operator" => {
            let operand = expr.child_by_field_name("argument")?;
            let negative = expr
                .child_by_field_name("operator")
                .is_some_and(|op| tree.text(op) == "-");
            if negative && matches!(operand.kind(), "integer" | "float") {
                Some(format!("-{}", tree.text(operand)))
            } else {
                None
            }
        }
        _ => None,
    }
}
