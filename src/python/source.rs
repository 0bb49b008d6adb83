//! Python source text and the tree-sitter syntax tree over it.
//!
//! Code is kept as text. A rewrite parses the text, records byte-range
//! [`Edits`] against the tree and applies them in one pass, so everything a
//! rewrite does not touch is emitted exactly as written.

use crate::error::ForgeError;
use crate::python::literal;
use std::ops::Range;
use tree_sitter::{Node, Parser, Tree};

/// Source text of a unit, a chain or a rendered program. Either empty or
/// terminated by a newline.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Source {
    text: String,
}

impl Source {
    pub fn new(text: impl Into<String>) -> Self {
        let mut text = text.into();
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        Self { text }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A successfully parsed piece of source.
pub struct SyntaxTree {
    source: String,
    tree: Tree,
}

impl SyntaxTree {
    /// Parses `source`; any error or missing node is a [`ForgeError::Syntax`].
    pub fn parse(source: &str) -> Result<Self, ForgeError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|err| ForgeError::Grammar(err.to_string()))?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| ForgeError::Grammar("parser returned no tree".to_string()))?;
        let parsed = Self {
            source: source.to_string(),
            tree,
        };
        if let Some(node) = parsed.first_error() {
            let message = if node.is_missing() {
                format!("expected {}", node.kind())
            } else {
                let snippet: String = parsed.text(node).chars().take(20).collect();
                format!("invalid syntax near {snippet:?}")
            };
            return Err(ForgeError::syntax(source, node.start_byte(), message));
        }
        Ok(parsed)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn text(&self, node: Node<'_>) -> &str {
        &self.source[node.byte_range()]
    }

    fn first_error(&self) -> Option<Node<'_>> {
        if !self.root().has_error() {
            return None;
        }
        preorder(self.root())
            .into_iter()
            .find(|node| node.is_error() || node.is_missing())
    }

    /// The function definition, when it is the only top-level statement.
    pub fn sole_function(&self) -> Option<Function<'_>> {
        match statements(self.root()).as_slice() {
            [only] => Function::from_node(*only, &self.source),
            _ => None,
        }
    }

    /// Statements a rewrite or an observation covers: the body of a leading
    /// function without its docstring, then every other top-level statement.
    pub fn unit_roots(&self) -> Vec<Node<'_>> {
        let mut roots = Vec::new();
        for (pos, stmt) in statements(self.root()).into_iter().enumerate() {
            match Function::from_node(stmt, &self.source) {
                Some(def) if pos == 0 => {
                    let skip = usize::from(def.docstring(self).is_some());
                    roots.extend(def.statements().into_iter().skip(skip));
                }
                _ => roots.push(stmt),
            }
        }
        roots
    }

    /// Text of the lines in `range`, with up to `remove` leading whitespace
    /// characters dropped and `prefix` added to each non-blank line. Lines
    /// that begin inside a string literal are copied untouched.
    pub fn reindent(&self, range: Range<usize>, remove: usize, prefix: &str) -> String {
        let strings: Vec<Range<usize>> = preorder(self.root())
            .into_iter()
            .filter(|node| node.kind() == "string")
            .map(|node| node.byte_range())
            .collect();
        let mut out = String::with_capacity(range.len());
        let mut offset = range.start;
        for line in self.source[range].split_inclusive('\n') {
            let start = offset;
            offset += line.len();
            if strings.iter().any(|s| s.start < start && start < s.end) {
                out.push_str(line);
                continue;
            }
            if line.trim().is_empty() {
                if line.ends_with('\n') {
                    out.push('\n');
                }
                continue;
            }
            let strip = line
                .bytes()
                .take(remove)
                .take_while(|b| *b == b' ' || *b == b'\t')
                .count();
            out.push_str(prefix);
            out.push_str(&line[strip..]);
        }
        out
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    Positional,
    /// The bare `/` closing positional-only parameters.
    PositionalOnlyMarker,
    VarArgs,
    /// The bare `*` opening keyword-only parameters.
    KeywordMarker,
    KeywordOnly,
    VarKeywords,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    pub kind: ParamKind,
    /// Bound name; empty for the markers.
    pub name: String,
    pub default: Option<String>,
    /// The parameter as written, annotation and default included.
    pub text: String,
}

/// A `def`, possibly decorated, viewed through its tree.
#[derive(Clone, Debug)]
pub struct Function<'t> {
    /// The statement: the decorated definition or the `def` itself.
    pub node: Node<'t>,
    pub name: String,
    pub parameters: Node<'t>,
    pub params: Vec<Param>,
    pub body: Node<'t>,
}

impl<'t> Function<'t> {
    pub fn from_node(node: Node<'t>, source: &str) -> Option<Self> {
        let def = match node.kind() {
            "function_definition" => node,
            "decorated_definition" => node
                .child_by_field_name("definition")
                .filter(|def| def.kind() == "function_definition")?,
            _ => return None,
        };
        let name = def.child_by_field_name("name")?;
        let parameters = def.child_by_field_name("parameters")?;
        Some(Self {
            node,
            name: source[name.byte_range()].to_string(),
            parameters,
            params: parse_params(parameters, source),
            body: def.child_by_field_name("body")?,
        })
    }

    pub fn statements(&self) -> Vec<Node<'t>> {
        statements(self.body)
    }

    pub fn positional(&self) -> Vec<String> {
        self.names_of(ParamKind::Positional)
    }

    pub fn keyword_only(&self) -> Vec<String> {
        self.names_of(ParamKind::KeywordOnly)
    }

    pub fn takes_arguments(&self) -> bool {
        self.params
            .iter()
            .any(|param| param.kind == ParamKind::Positional)
    }

    fn names_of(&self, kind: ParamKind) -> Vec<String> {
        self.params
            .iter()
            .filter(|param| param.kind == kind)
            .map(|param| param.name.clone())
            .collect()
    }

    /// The leading string statement and its value.
    pub fn docstring(&self, tree: &SyntaxTree) -> Option<(Node<'t>, String)> {
        let first = *self.statements().first()?;
        string_statement_value(first, tree.source()).map(|value| (first, value))
    }
}

fn parse_params(parameters: Node<'_>, source: &str) -> Vec<Param> {
    let mut params = Vec::new();
    let mut keyword_only = false;
    for child in named_children(parameters) {
        let text = source[child.byte_range()].to_string();
        let named = if keyword_only {
            ParamKind::KeywordOnly
        } else {
            ParamKind::Positional
        };
        let (kind, name, default) = match child.kind() {
            "positional_separator" => (ParamKind::PositionalOnlyMarker, String::new(), None),
            "keyword_separator" => {
                keyword_only = true;
                (ParamKind::KeywordMarker, String::new(), None)
            }
            "list_splat_pattern" => {
                keyword_only = true;
                (ParamKind::VarArgs, first_identifier(child, source), None)
            }
            "dictionary_splat_pattern" => {
                (ParamKind::VarKeywords, first_identifier(child, source), None)
            }
            "typed_parameter" => match named_children(child).first().map(|inner| inner.kind()) {
                Some("list_splat_pattern") => {
                    keyword_only = true;
                    (ParamKind::VarArgs, first_identifier(child, source), None)
                }
                Some("dictionary_splat_pattern") => {
                    (ParamKind::VarKeywords, first_identifier(child, source), None)
                }
                _ => (named, first_identifier(child, source), None),
            },
            "default_parameter" | "typed_default_parameter" => {
                let name = child
                    .child_by_field_name("name")
                    .map(|node| source[node.byte_range()].to_string())
                    .unwrap_or_default();
                let default = child
                    .child_by_field_name("value")
                    .map(|node| source[node.byte_range()].to_string());
                (named, name, default)
            }
            _ => (named, text.clone(), None),
        };
        params.push(Param {
            kind,
            name,
            default,
            text,
        });
    }
    params
}

fn first_identifier(node: Node<'_>, source: &str) -> String {
    preorder(node)
        .into_iter()
        .find(|inner| inner.kind() == "identifier")
        .map(|inner| source[inner.byte_range()].to_string())
        .unwrap_or_default()
}

/// Value of a statement made of a single plain string literal.
pub fn string_statement_value(stmt: Node<'_>, source: &str) -> Option<String> {
    if stmt.kind() != "expression_statement" || stmt.named_child_count() != 1 {
        return None;
    }
    let expr = stmt.named_child(0)?;
    (expr.kind() == "string")
        .then(|| literal::string_value(&source[expr.byte_range()]))
        .flatten()
}

/// Every node under `root`, `root` included, in source order.
pub fn preorder(root: Node<'_>) -> Vec<Node<'_>> {
    let mut nodes = Vec::new();
    let mut cursor = root.walk();
    loop {
        nodes.push(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return nodes;
            }
        }
    }
}

pub fn children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

/// Named children, comments left out.
pub fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

/// Statements of a module or a block.
pub fn statements(node: Node<'_>) -> Vec<Node<'_>> {
    named_children(node)
}

/// Whether `node` is the `field` child of its parent.
pub fn is_field(node: Node<'_>, field: &str) -> bool {
    node.parent()
        .and_then(|parent| parent.child_by_field_name(field))
        .is_some_and(|child| child.id() == node.id())
}

/// An identifier that names a variable, a parameter or a definition, as
/// opposed to an attribute, a call keyword or a module path.
pub fn is_binding_name(node: Node<'_>) -> bool {
    if node.kind() != "identifier" {
        return false;
    }
    match node.parent().map(|parent| parent.kind()) {
        Some("attribute") => !is_field(node, "attribute"),
        Some("keyword_argument") => !is_field(node, "name"),
        Some("dotted_name") => false,
        _ => true,
    }
}

/// Start of the line holding `offset`.
pub fn line_start(source: &str, offset: usize) -> usize {
    source[..offset].rfind('\n').map_or(0, |idx| idx + 1)
}

/// End of the line holding `offset`, past its newline.
pub fn line_end(source: &str, offset: usize) -> usize {
    if offset > 0 && source.as_bytes()[offset - 1] == b'\n' {
        return offset;
    }
    source[offset..]
        .find('\n')
        .map_or(source.len(), |idx| offset + idx + 1)
}

/// Range that deletes `stmt`: its whole lines when nothing else shares
/// them, the statement alone otherwise.
pub fn statement_lines(source: &str, stmt: Node<'_>) -> Range<usize> {
    let start = line_start(source, stmt.start_byte());
    let end = line_end(source, stmt.end_byte());
    let before = &source[start..stmt.start_byte()];
    let after = &source[stmt.end_byte()..end];
    if before.trim().is_empty() && after.trim().is_empty() {
        start..end
    } else {
        stmt.byte_range()
    }
}

/// `text` with `prefix` in front of every non-blank line; string literals
/// spanning lines are left alone when `text` parses.
pub fn indent_text(text: &str, prefix: &str) -> String {
    if prefix.is_empty() {
        return text.to_string();
    }
    match SyntaxTree::parse(text) {
        Ok(tree) => tree.reindent(0..text.len(), 0, prefix),
        Err(_) => text
            .split_inclusive('\n')
            .map(|line| {
                if line.trim().is_empty() {
                    line.to_string()
                } else {
                    format!("{prefix}{line}")
                }
            })
            .collect(),
    }
}

/// Moves a function body written on the `def` line onto lines of its own.
pub fn normalized(text: &str) -> String {
    let Ok(tree) = SyntaxTree::parse(text) else {
        return text.to_string();
    };
    let Some(def) = tree.sole_function() else {
        return text.to_string();
    };
    let Some(first) = def.statements().first().copied() else {
        return text.to_string();
    };
    let source = tree.source();
    let before = &source[line_start(source, first.start_byte())..first.start_byte()];
    if before.trim().is_empty() {
        return text.to_string();
    }
    let def_start = def.node.start_byte();
    let column = def_start - line_start(source, def_start);
    let mut edits = Edits::default();
    edits.insert(first.start_byte(), format!("\n{}", " ".repeat(column + 4)));
    edits.apply(source)
}

/// Byte-range replacements against one source text.
#[derive(Debug, Default)]
pub struct Edits {
    edits: Vec<(Range<usize>, String)>,
}

impl Edits {
    pub fn replace(&mut self, range: Range<usize>, text: impl Into<String>) {
        self.edits.push((range, text.into()));
    }

    pub fn insert(&mut self, at: usize, text: impl Into<String>) {
        self.replace(at..at, text);
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Applies the edits in offset order; insertions at one offset keep the
    /// order they were recorded in. An edit overlapping an earlier one is
    /// dropped.
    pub fn apply(mut self, source: &str) -> String {
        self.edits
            .sort_by_key(|(range, _)| (range.start, range.end));
        let mut out = String::with_capacity(source.len());
        let mut pos = 0;
        for (range, text) in self.edits {
            if range.start < pos {
                continue;
            }
            out.push_str(&source[pos..range.start]);
            out.push_str(&text);
            pos = range.end;
        }
        out.push_str(&source[pos..]);
        out
    }
}
