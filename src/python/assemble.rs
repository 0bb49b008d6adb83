//! Stitches resolved Python units into one program.
//!
//! Definition mode keeps each dependency as a nested `def` followed by a
//! binding of its family name. Inline mode splices dependency statements
//! into the dependant: parameter-less dependencies at the top of its body,
//! dependencies with runtime parameters at each call site.

use crate::error::ForgeError;
use crate::python::Python;
use crate::python::source::{
    Edits, Function, Param, ParamKind, Source, SyntaxTree, children, indent_text, is_binding_name,
    line_end, line_start, named_children, normalized, preorder, statement_lines, statements,
};
use crate::unit::{Gadget, family_of};
use std::collections::BTreeMap;
use tracing::warn;
use tree_sitter::Node;

/// The unit's emittable code: keyword-only parameters and docstring
/// removed, its chain nested at the top of the body.
pub(crate) fn full_code(gadget: &Gadget<Python>) -> Source {
    if gadget.dummy {
        return gadget.code.clone();
    }
    let mut full = strip_header(&gadget.code);
    if !gadget.inline {
        put_code_into_body(&mut full, &gadget.chain, false);
    }
    full
}

fn strip_header(code: &Source) -> Source {
    let Ok(tree) = SyntaxTree::parse(code.as_str()) else {
        return code.clone();
    };
    let Some(def) = tree.sole_function() else {
        return code.clone();
    };
    let mut edits = Edits::default();
    let keyword_only = |param: &Param| {
        matches!(param.kind, ParamKind::KeywordMarker | ParamKind::KeywordOnly)
    };
    if def.params.iter().any(keyword_only) {
        let kept: Vec<&str> = def
            .params
            .iter()
            .filter(|param| !keyword_only(*param))
            .map(|param| param.text.as_str())
            .collect();
        edits.replace(def.parameters.byte_range(), format!("({})", kept.join(", ")));
    }
    if let Some((doc, _)) = def.docstring(&tree) {
        if def.statements().len() == 1 {
            edits.replace(doc.byte_range(), "pass");
        } else {
            edits.replace(statement_lines(tree.source(), doc), "");
        }
    }
    if edits.is_empty() {
        return code.clone();
    }
    Source::new(edits.apply(tree.source()))
}

pub(crate) fn merge(target: &mut Gadget<Python>, dependency: &Gadget<Python>) {
    let code = full_code(dependency);
    if target.inline {
        put_code_into_body(&mut target.code, &code, true);
    } else {
        put_code_into_body(&mut target.chain, &code, false);
    }
}

/// Places `code` at the front of `target`'s function body, or of the module
/// itself when `target` is not a single function.
pub(crate) fn put_code_into_body(target: &mut Source, code: &Source, inline: bool) {
    if code.is_blank() {
        return;
    }
    let Ok(tree) = SyntaxTree::parse(code.as_str()) else {
        insert_front(target, code.as_str());
        return;
    };
    let body = match tree.sole_function() {
        Some(def) if inline && def.takes_arguments() => {
            let mut inliner = Inliner::new(&tree, &def);
            *target = inliner.run(target);
            return;
        }
        Some(def) => ready_for_use(&tree, &def, inline),
        None => code.as_str().to_string(),
    };
    insert_front(target, &body);
}

fn insert_front(target: &mut Source, body: &str) {
    let text = normalized(target.as_str());
    let spliced = match SyntaxTree::parse(&text) {
        Ok(tree) => match tree
            .sole_function()
            .and_then(|def| def.statements().first().copied())
        {
            Some(first) => {
                let at = line_start(&text, first.start_byte());
                let mut edits = Edits::default();
                edits.insert(at, indent_text(body, &text[at..first.start_byte()]));
                edits.apply(&text)
            }
            None => format!("{body}{text}"),
        },
        Err(_) => format!("{body}{text}"),
    };
    *target = Source::new(spliced);
}

/// Statements that make a dependency available under its family name.
fn ready_for_use(tree: &SyntaxTree, def: &Function<'_>, inline: bool) -> String {
    let family = family_of(&def.name);
    if inline && !def.takes_arguments() {
        return assign_returns(&function_body(tree, def), family);
    }
    let binding = if def.takes_arguments() {
        format!("{family} = {}\n", def.name)
    } else {
        format!("{family} = {}()\n", def.name)
    };
    format!("{}{binding}", tree.source())
}

/// The statements of `def`, dedented to column zero.
fn function_body(tree: &SyntaxTree, def: &Function<'_>) -> String {
    let stmts = def.statements();
    let (Some(first), Some(last)) = (stmts.first(), stmts.last()) else {
        return String::new();
    };
    let source = tree.source();
    let start = line_start(source, first.start_byte());
    let end = line_end(source, last.end_byte());
    tree.reindent(start..end, first.start_position().column, "")
}

/// Rewrites the returns of `body` into assignments to `name`; a body that
/// never returns binds `None`.
fn assign_returns(body: &str, name: &str) -> String {
    let Ok(tree) = SyntaxTree::parse(body) else {
        return format!("{body}{name} = None\n");
    };
    let mut returns = Vec::new();
    own_returns(tree.root(), &mut returns);
    if returns.is_empty() {
        return format!("{body}{name} = None\n");
    }
    let mut edits = Edits::default();
    for ret in returns {
        match named_children(ret).first() {
            Some(value) => edits.replace(ret.start_byte()..value.start_byte(), format!("{name} = ")),
            None => edits.replace(ret.byte_range(), format!("{name} = None")),
        }
    }
    edits.apply(tree.source())
}

/// Return statements outside nested `def` and `class` bodies.
fn own_returns<'t>(node: Node<'t>, out: &mut Vec<Node<'t>>) {
    for child in children(node) {
        match child.kind() {
            "return_statement" => out.push(child),
            "function_definition" | "class_definition" | "decorated_definition" => {}
            _ => own_returns(child, out),
        }
    }
}

/// Expands calls to one dependency into straight-line code.
///
/// Calls in a statement's own expressions are hoisted in front of that
/// statement, innermost first, while calls inside its nested blocks are
/// handled in those blocks. Call sites are numbered so parameter and result
/// names never collide. Conditions of `elif` and `while` and the bodies of
/// lambdas and comprehensions are hoisted like any other expression.
pub(crate) struct Inliner {
    unit: String,
    family: String,
    params: Vec<Param>,
    body: String,
    sites: usize,
}

impl Inliner {
    pub(crate) fn new(tree: &SyntaxTree, def: &Function<'_>) -> Self {
        Self {
            unit: def.name.clone(),
            family: family_of(&def.name).to_string(),
            params: def.params.clone(),
            body: function_body(tree, def),
            sites: 0,
        }
    }

    pub(crate) fn run(&mut self, target: &Source) -> Source {
        let text = normalized(target.as_str());
        let tree = match SyntaxTree::parse(&text) {
            Ok(tree) => tree,
            Err(err) => {
                warn!(unit = %self.unit, error = %err, "cannot inline into unparsable code");
                return target.clone();
            }
        };
        let mut edits = Edits::default();
        self.block(&tree, tree.root(), &mut edits);
        Source::new(edits.apply(tree.source()))
    }

    fn block(&mut self, tree: &SyntaxTree, block: Node<'_>, edits: &mut Edits) {
        for stmt in statements(block) {
            self.statement(tree, stmt, edits);
        }
    }

    fn statement(&mut self, tree: &SyntaxTree, stmt: Node<'_>, edits: &mut Edits) {
        let source = tree.source();
        if Function::from_node(stmt, source).is_some_and(|def| def.name == self.unit) {
            edits.replace(statement_lines(source, stmt), "");
            return;
        }
        let mut prelude = String::new();
        if is_compound(stmt) {
            self.compound(tree, stmt, &mut prelude, edits);
        } else if self.contains_site(stmt, source) {
            let text = self.substitute(stmt, source, &mut prelude);
            edits.replace(stmt.byte_range(), text);
        }
        if !prelude.is_empty() {
            let at = line_start(source, stmt.start_byte());
            let indent: String = source[at..stmt.start_byte()]
                .chars()
                .take_while(|c| c.is_whitespace())
                .collect();
            edits.insert(at, indent_text(&prelude, &indent));
        }
    }

    fn compound(&mut self, tree: &SyntaxTree, node: Node<'_>, prelude: &mut String, edits: &mut Edits) {
        let source = tree.source();
        for child in named_children(node) {
            if child.kind() == "block" {
                self.block(tree, child, edits);
            } else if is_compound(child) {
                self.compound(tree, child, prelude, edits);
            } else if self.contains_site(child, source) {
                let text = self.substitute(child, source, prelude);
                edits.replace(child.byte_range(), text);
            }
        }
    }

    fn is_site(&self, node: Node<'_>, source: &str) -> bool {
        node.kind() == "call"
            && node
                .child_by_field_name("function")
                .filter(|func| func.kind() == "identifier")
                .is_some_and(|func| {
                    let name = &source[func.byte_range()];
                    name == self.family || name == self.unit
                })
    }

    fn contains_site(&self, node: Node<'_>, source: &str) -> bool {
        preorder(node)
            .into_iter()
            .any(|inner| self.is_site(inner, source))
    }

    /// Text of `node` with every call site replaced by its result name.
    fn substitute(&mut self, node: Node<'_>, source: &str, prelude: &mut String) -> String {
        if self.is_site(node, source) {
            return self.expand(node, source, prelude);
        }
        if node.child_count() == 0 {
            return source[node.byte_range()].to_string();
        }
        let mut out = String::new();
        let mut pos = node.start_byte();
        for child in children(node) {
            out.push_str(&source[pos..child.start_byte()]);
            out.push_str(&self.substitute(child, source, prelude));
            pos = child.end_byte();
        }
        out.push_str(&source[pos..node.end_byte()]);
        out
    }

    /// Emits the code of one call site into `prelude` and returns the name
    /// holding its result.
    fn expand(&mut self, call: Node<'_>, source: &str, prelude: &mut String) -> String {
        let mut positional = Vec::new();
        let mut keywords: Vec<(String, String)> = Vec::new();
        if let Some(arguments) = call.child_by_field_name("arguments") {
            if arguments.kind() == "generator_expression" {
                positional.push(self.substitute(arguments, source, prelude));
            } else {
                for arg in named_children(arguments) {
                    match arg.kind() {
                        "keyword_argument" => {
                            let (Some(name), Some(value)) = (
                                arg.child_by_field_name("name"),
                                arg.child_by_field_name("value"),
                            ) else {
                                continue;
                            };
                            let value = self.substitute(value, source, prelude);
                            keywords.push((source[name.byte_range()].to_string(), value));
                        }
                        "list_splat" | "dictionary_splat" => {
                            warn!(unit = %self.unit, "unpacked call arguments are not bound");
                        }
                        _ => positional.push(self.substitute(arg, source, prelude)),
                    }
                }
            }
        }

        let site = self.sites;
        self.sites += 1;
        let result = format!("{}_{site}", self.unit);
        let mut renames = BTreeMap::new();
        let mut positional = positional.into_iter();
        for param in &self.params {
            let value = match param.kind {
                ParamKind::Positional | ParamKind::KeywordOnly => {
                    let given = if param.kind == ParamKind::Positional {
                        positional.next()
                    } else {
                        None
                    };
                    given
                        .or_else(|| take_keyword(&mut keywords, &param.name))
                        .or_else(|| param.default.clone())
                        .unwrap_or_else(|| "None".to_string())
                }
                ParamKind::VarArgs => {
                    let rest: Vec<String> = positional.by_ref().collect();
                    match rest.len() {
                        1 => format!("({},)", rest[0]),
                        _ => format!("({})", rest.join(", ")),
                    }
                }
                ParamKind::VarKeywords => {
                    let entries: Vec<String> = keywords
                        .drain(..)
                        .map(|(name, value)| format!("'{name}': {value}"))
                        .collect();
                    format!("{{{}}}", entries.join(", "))
                }
                ParamKind::PositionalOnlyMarker | ParamKind::KeywordMarker => continue,
            };
            let local = format!("{result}_{}", param.name);
            prelude.push_str(&format!("{local} = {value}\n"));
            renames.insert(param.name.clone(), local);
        }

        let body = rename_identifiers(&self.body, &renames);
        prelude.push_str(&assign_returns(&body, &result));
        result
    }
}

fn take_keyword(keywords: &mut Vec<(String, String)>, name: &str) -> Option<String> {
    let pos = keywords.iter().position(|(keyword, _)| keyword == name)?;
    Some(keywords.remove(pos).1)
}

fn is_compound(node: Node<'_>) -> bool {
    matches!(node.kind(), "decorated_definition" | "function_definition" | "class_definition")
        || children(node).iter().any(|child| child.kind() == "block")
}

fn rename_identifiers(body: &str, renames: &BTreeMap<String, String>) -> String {
    let Ok(tree) = SyntaxTree::parse(body) else {
        return body.to_string();
    };
    let mut edits = Edits::default();
    for node in preorder(tree.root()) {
        if !is_binding_name(node) {
            continue;
        }
        if let Some(renamed) = renames.get(tree.text(node)) {
            edits.replace(node.byte_range(), renamed.clone());
        }
    }
    edits.apply(tree.source())
}

/// Turns `nonlocal` into `global` in functions defined at module scope,
/// where inlined variables end up.
fn globalize_nonlocals(code: Source) -> Source {
    let Ok(tree) = SyntaxTree::parse(code.as_str()) else {
        return code;
    };
    let mut edits = Edits::default();
    module_scope(tree.root(), &mut edits);
    if edits.is_empty() {
        return code;
    }
    Source::new(edits.apply(tree.source()))
}

fn module_scope(node: Node<'_>, edits: &mut Edits) {
    for child in named_children(node) {
        match child.kind() {
            "function_definition" => function_scope(child, edits),
            "decorated_definition" => {
                if let Some(def) = child.child_by_field_name("definition") {
                    if def.kind() == "function_definition" {
                        function_scope(def, edits);
                    }
                }
            }
            "class_definition" => {}
            _ => module_scope(child, edits),
        }
    }
}

fn function_scope(node: Node<'_>, edits: &mut Edits) {
    for child in named_children(node) {
        match child.kind() {
            "nonlocal_statement" => {
                let keyword = child.start_byte()..child.start_byte() + "nonlocal".len();
                edits.replace(keyword, "global");
            }
            "function_definition" | "class_definition" | "decorated_definition" => {}
            _ => function_scope(child, edits),
        }
    }
}

pub(crate) fn render(gadget: &Gadget<Python>, args: &[&str]) -> Result<String, ForgeError> {
    if gadget.dummy {
        return Ok(gadget.code.as_str().to_string());
    }
    let args = args
        .iter()
        .map(|arg| expression(arg))
        .collect::<Result<Vec<_>, _>>()?;
    let family = gadget.family().to_string();
    let takes_arguments = !gadget.params().is_empty();
    let full = full_code(gadget);

    if gadget.inline {
        let mut out = if takes_arguments {
            Source::new(format!("{family}({})", args.join(", ")))
        } else {
            Source::default()
        };
        put_code_into_body(&mut out, &full, true);
        return Ok(globalize_nonlocals(out).into_string());
    }

    let mut out = Source::default();
    put_code_into_body(&mut out, &full, false);
    let mut text = out.into_string();
    if takes_arguments {
        text.push_str(&format!("{family}({})\n", args.join(", ")));
    }
    Ok(text)
}

/// A runtime argument, checked to be a single expression.
fn expression(arg: &str) -> Result<String, ForgeError> {
    let text = arg.trim();
    let tree = SyntaxTree::parse(text)?;
    let stmts = statements(tree.root());
    let single = match stmts.as_slice() {
        [stmt] if stmt.kind() == "expression_statement" => {
            let parts = named_children(*stmt);
            parts.len() == 1
                && !matches!(parts[0].kind(), "assignment" | "augmented_assignment" | "yield")
        }
        _ => false,
    };
    if !single {
        return Err(ForgeError::syntax(text, 0, format!("expected one expression, got {text:?}")));
    }
    Ok(text.to_string())
}
