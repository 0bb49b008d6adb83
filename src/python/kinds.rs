//! Names of the Python `ast` classes tree-sitter nodes stand for.
//!
//! Policies name syntax the way Python's own `ast` module does (`Constant`,
//! `Call`, `Add`, ...), so every grammar node is mapped onto those classes.
//! Grammar nodes with no `ast` counterpart (`block`, `parenthesized_expression`,
//! punctuation) map to nothing. Expression contexts (`Load`, `Store`) are not
//! reported.

use crate::python::literal;
use crate::python::source::{children, is_field, named_children};
use tree_sitter::Node;

/// Appends the `ast` classes of `node`: its own class and, for operator
/// nodes, the operator classes.
pub fn ast_kinds(node: Node<'_>, source: &str, out: &mut Vec<&'static str>) {
    let Some(kind) = primary_kind(node, source) else {
        return;
    };
    out.push(kind);
    match node.kind() {
        "function_definition" | "lambda" => out.push("arguments"),
        "binary_operator" | "augmented_assignment" => {
            if let Some(op) = node.child_by_field_name("operator") {
                let text = source[op.byte_range()].trim_end_matches('=');
                out.extend(binary_operator(text));
            }
        }
        "boolean_operator" => {
            if let Some(op) = node.child_by_field_name("operator") {
                out.push(if op.kind() == "and" { "And" } else { "Or" });
            }
        }
        "unary_operator" => {
            if let Some(op) = node.child_by_field_name("operator") {
                out.push(match &source[op.byte_range()] {
                    "-" => "USub",
                    "+" => "UAdd",
                    _ => "Invert",
                });
            }
        }
        "not_operator" => out.push("Not"),
        "comparison_operator" => {
            for op in children(node).into_iter().filter(|child| !child.is_named()) {
                out.extend(comparison_operator(op.kind()));
            }
        }
        _ => {}
    }
}

/// The `ast` class of `node` itself.
pub fn primary_kind(node: Node<'_>, source: &str) -> Option<&'static str> {
    let kind = match node.kind() {
        "function_definition" => {
            if has_child(node, "async") {
                "AsyncFunctionDef"
            } else {
                "FunctionDef"
            }
        }
        "class_definition" => "ClassDef",
        "return_statement" => "Return",
        "delete_statement" => "Delete",
        "assignment" => {
            let chained = node.parent().is_some_and(|parent| parent.kind() == "assignment");
            if chained {
                return None;
            }
            if node.child_by_field_name("type").is_some() {
                "AnnAssign"
            } else {
                "Assign"
            }
        }
        "augmented_assignment" => "AugAssign",
        "expression_statement" => {
            let first = named_children(node).first().map(|child| child.kind());
            if matches!(first, Some("assignment" | "augmented_assignment")) {
                return None;
            }
            "Expr"
        }
        "pass_statement" => "Pass",
        "break_statement" => "Break",
        "continue_statement" => "Continue",
        "if_statement" | "elif_clause" => "If",
        "for_statement" => {
            if has_child(node, "async") {
                "AsyncFor"
            } else {
                "For"
            }
        }
        "while_statement" => "While",
        "try_statement" => {
            if has_child(node, "except_group_clause") {
                "TryStar"
            } else {
                "Try"
            }
        }
        "except_clause" | "except_group_clause" => "ExceptHandler",
        "with_statement" => {
            if has_child(node, "async") {
                "AsyncWith"
            } else {
                "With"
            }
        }
        "with_item" => "withitem",
        "raise_statement" => "Raise",
        "assert_statement" => "Assert",
        "global_statement" => "Global",
        "nonlocal_statement" => "Nonlocal",
        "import_statement" => "Import",
        "import_from_statement" | "future_import_statement" => "ImportFrom",
        "aliased_import" => "alias",
        "dotted_name" => {
            let parent = node.parent()?;
            let imported = match parent.kind() {
                "import_statement" => true,
                "import_from_statement" => !is_field(node, "module_name"),
                _ => false,
            };
            if !imported {
                return None;
            }
            "alias"
        }
        "match_statement" => "Match",
        "case_clause" => "match_case",
        "type_alias_statement" => "TypeAlias",
        "identifier" => return identifier_kind(node),
        "keyword_argument" => "keyword",
        "dictionary_splat" => {
            if node.parent()?.kind() != "argument_list" {
                return None;
            }
            "keyword"
        }
        "list_splat" => "Starred",
        "list_splat_pattern" => {
            if in_parameters(node) {
                return None;
            }
            "Starred"
        }
        "call" => "Call",
        "attribute" => "Attribute",
        "subscript" => "Subscript",
        "slice" => "Slice",
        "string" => {
            if node.parent()?.kind() == "concatenated_string" {
                return None;
            }
            if is_fstring(node, source) {
                "JoinedStr"
            } else {
                "Constant"
            }
        }
        "concatenated_string" => {
            if named_children(node)
                .into_iter()
                .any(|part| is_fstring(part, source))
            {
                "JoinedStr"
            } else {
                "Constant"
            }
        }
        "integer" | "float" | "true" | "false" | "none" | "ellipsis" => "Constant",
        "interpolation" => "FormattedValue",
        "binary_operator" => "BinOp",
        "boolean_operator" => "BoolOp",
        "comparison_operator" => "Compare",
        "not_operator" | "unary_operator" => "UnaryOp",
        "conditional_expression" => "IfExp",
        "lambda" => "Lambda",
        "named_expression" => "NamedExpr",
        "list" | "list_pattern" => "List",
        "tuple" | "tuple_pattern" | "pattern_list" | "expression_list" => "Tuple",
        "set" => "Set",
        "dictionary" => "Dict",
        "list_comprehension" => "ListComp",
        "set_comprehension" => "SetComp",
        "dictionary_comprehension" => "DictComp",
        "generator_expression" => "GeneratorExp",
        "for_in_clause" => "comprehension",
        "yield" => {
            if has_child(node, "from") {
                "YieldFrom"
            } else {
                "Yield"
            }
        }
        "await" => "Await",
        _ => return None,
    };
    Some(kind)
}

fn identifier_kind(node: Node<'_>) -> Option<&'static str> {
    let parent = node.parent()?;
    let kind = match parent.kind() {
        "function_definition" | "class_definition" if is_field(node, "name") => return None,
        "parameters" | "lambda_parameters" | "typed_parameter" => "arg",
        "default_parameter" | "typed_default_parameter" if is_field(node, "name") => "arg",
        "list_splat_pattern" | "dictionary_splat_pattern" if in_parameters(parent) => "arg",
        "keyword_argument" if is_field(node, "name") => return None,
        "attribute" if is_field(node, "attribute") => return None,
        "global_statement" | "nonlocal_statement" | "dotted_name" | "aliased_import" => {
            return None;
        }
        _ if is_handler_alias(node) => return None,
        _ => "Name",
    };
    Some(kind)
}

fn in_parameters(node: Node<'_>) -> bool {
    let mut parent = node.parent();
    if parent.is_some_and(|p| p.kind() == "typed_parameter") {
        parent = parent.and_then(|p| p.parent());
    }
    parent.is_some_and(|p| matches!(p.kind(), "parameters" | "lambda_parameters"))
}

/// `e` in `except E as e`, a plain name rather than a `Name` node.
fn is_handler_alias(node: Node<'_>) -> bool {
    let mut target = node;
    if let Some(parent) = node.parent() {
        if parent.kind() == "as_pattern_target" {
            target = parent;
        }
    }
    let after_as = target
        .prev_sibling()
        .is_some_and(|prev| prev.kind() == "as");
    let mut ancestor = target.parent();
    for _ in 0..2 {
        match ancestor {
            Some(node) if node.kind() == "except_clause" => return after_as,
            Some(node) => ancestor = node.parent(),
            None => return false,
        }
    }
    false
}

pub fn is_fstring(node: Node<'_>, source: &str) -> bool {
    node.kind() == "string" && literal::prefix(&source[node.byte_range()]).contains('f')
}

fn has_child(node: Node<'_>, kind: &str) -> bool {
    children(node).iter().any(|child| child.kind() == kind)
}

fn binary_operator(op: &str) -> Option<&'static str> {
    Some(match op {
        "+" => "Add",
        "-" => "Sub",
        "*" => "Mult",
        "/" => "Div",
        "//" => "FloorDiv",
        "%" => "Mod",
        "**" => "Pow",
        "<<" => "LShift",
        ">>" => "RShift",
        "|" => "BitOr",
        "^" => "BitXor",
        "&" => "BitAnd",
        "@" => "MatMult",
        _ => return None,
    })
}

fn comparison_operator(op: &str) -> Option<&'static str> {
    Some(match op {
        "==" => "Eq",
        "!=" | "<>" => "NotEq",
        "<" => "Lt",
        "<=" => "LtE",
        ">" => "Gt",
        ">=" => "GtE",
        "is" => "Is",
        "is not" => "IsNot",
        "in" => "In",
        "not in" => "NotIn",
        _ => return None,
    })
}
