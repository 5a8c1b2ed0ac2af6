//! Go source parsing backed by tree-sitter.
//!
//! The syntax tree is lowered into [`SourceFile`], which keeps only what the
//! editing tools need: top-level declarations, their doc comments, and exact
//! byte positions.

use std::fs;
use std::path::Path;

use tree_sitter::{Node, Parser, Tree};

use crate::domain::errors::ToolError;
use crate::domain::model::{
    DeclGroup, Declaration, Doc, ImportEntry, ImportGroup, SourceFile, TypeEntry, ValueEntry,
};

/// How much of the file has to be well-formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Every declaration is lowered and any syntax error is fatal.
    Full,
    /// Only the package clause and the leading import declarations are
    /// lowered; syntax errors after them are ignored.
    ImportsOnly,
}

/// Read and parse the file at `path`.
pub fn parse_file(path: &Path, mode: ParseMode) -> Result<SourceFile, ToolError> {
    let content = fs::read(path).map_err(|err| ToolError::io(path, err))?;
    parse(path, content, mode)
}

/// Parse `content`; `path` is only used for diagnostics.
pub fn parse(path: &Path, content: Vec<u8>, mode: ParseMode) -> Result<SourceFile, ToolError> {
    let tree = syntax_tree(path, &content)?;
    let root = tree.root_node();

    let header = header_nodes(root, mode);
    if let Some(bad) = header.iter().find_map(|node| first_error(*node)) {
        return Err(syntax_error(path, bad));
    }

    let package_end = header
        .iter()
        .find(|node| node.kind() == "package_clause")
        .map(|clause| package_line_end(*clause))
        .ok_or_else(|| ToolError::Parse {
            path: path.to_path_buf(),
            line: 1,
            column: 1,
            message: "expected 'package'".into(),
        })?;

    let mut decls = Vec::new();
    for node in &header {
        if let Some(decl) = lower_declaration(*node, &content) {
            decls.push(decl);
        }
    }

    tracing::trace!(
        file = %path.display(),
        ?mode,
        decls = decls.len(),
        "parsed go source"
    );

    Ok(SourceFile {
        content,
        package_end,
        decls,
    })
}

fn syntax_tree(path: &Path, content: &[u8]) -> Result<Tree, ToolError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_go::LANGUAGE.into())
        .map_err(|err| ToolError::Parse {
            path: path.to_path_buf(),
            line: 0,
            column: 0,
            message: format!("go grammar unavailable: {err}"),
        })?;
    parser.parse(content, None).ok_or_else(|| ToolError::Parse {
        path: path.to_path_buf(),
        line: 0,
        column: 0,
        message: "parser produced no syntax tree".into(),
    })
}

/// Top-level nodes that are lowered and validated for `mode`.
fn header_nodes(root: Node<'_>, mode: ParseMode) -> Vec<Node<'_>> {
    let mut cursor = root.walk();
    let children = root.children(&mut cursor);
    match mode {
        ParseMode::Full => children.collect(),
        ParseMode::ImportsOnly => children.take_while(|node| is_header(*node)).collect(),
    }
}

/// Package clause, imports, and the comments and terminators between them.
fn is_header(node: Node<'_>) -> bool {
    matches!(
        node.kind(),
        "package_clause" | "import_declaration" | "comment" | "\n" | ";"
    )
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find_map(first_error);
    found
}

fn syntax_error(path: &Path, node: Node<'_>) -> ToolError {
    let start = node.start_position();
    let message = if node.is_missing() {
        format!("expected '{}'", node.kind())
    } else {
        match node.child(0) {
            Some(token) => format!("unexpected '{}'", token.kind()),
            None => "syntax error".to_owned(),
        }
    };
    ToolError::Parse {
        path: path.to_path_buf(),
        line: start.row + 1,
        column: start.column + 1,
        message,
    }
}

fn lower_declaration(node: Node<'_>, src: &[u8]) -> Option<Declaration> {
    match node.kind() {
        "function_declaration" | "method_declaration" => Some(Declaration::Function {
            name: text(node.child_by_field_name("name")?, src),
            doc: doc_before(node, src),
            position: node.start_byte(),
        }),
        "type_declaration" => {
            let members = specs(node, &["type_spec", "type_alias"])
                .into_iter()
                .filter_map(|spec| {
                    Some(TypeEntry {
                        name: text(spec.child_by_field_name("name")?, src),
                        doc: doc_before(spec, src),
                        position: spec.start_byte(),
                    })
                })
                .collect();
            Some(Declaration::Types(group(node, src, members)))
        }
        "var_declaration" | "const_declaration" => {
            let members = specs(node, &["var_spec", "const_spec"])
                .into_iter()
                .map(|spec| {
                    let mut cursor = spec.walk();
                    let names = spec
                        .children_by_field_name("name", &mut cursor)
                        .filter(|name| name.kind() == "identifier")
                        .map(|name| text(name, src))
                        .collect();
                    ValueEntry {
                        names,
                        doc: doc_before(spec, src),
                        position: spec.start_byte(),
                    }
                })
                .collect();
            Some(Declaration::Values(group(node, src, members)))
        }
        "import_declaration" => {
            let entries = specs(node, &["import_spec"])
                .into_iter()
                .filter_map(|spec| {
                    let path = spec.child_by_field_name("path")?;
                    Some(ImportEntry {
                        path: unquote(&text(path, src)),
                        alias: spec.child_by_field_name("name").map(|name| text(name, src)),
                        position: spec.start_byte(),
                        line: spec.start_position().row,
                    })
                })
                .collect();
            Some(Declaration::Imports(ImportGroup {
                position: node.start_byte(),
                end: node.end_byte(),
                parenthesized: is_parenthesized(node),
                entries,
            }))
        }
        _ => None,
    }
}

fn group<T>(node: Node<'_>, src: &[u8], members: Vec<T>) -> DeclGroup<T> {
    DeclGroup {
        doc: doc_before(node, src),
        position: node.start_byte(),
        parenthesized: is_parenthesized(node),
        members,
    }
}

/// Spec nodes of a declaration, looking through `*_spec_list` wrappers.
fn specs<'t>(node: Node<'t>, kinds: &[&str]) -> Vec<Node<'t>> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if kinds.contains(&child.kind()) {
            out.push(child);
        } else if child.kind().ends_with("_spec_list") {
            out.extend(specs(child, kinds));
        }
    }
    out
}

fn is_parenthesized(node: Node<'_>) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|child| {
        child.kind() == "(" || (child.kind().ends_with("_spec_list") && is_parenthesized(child))
    });
    found
}

/// Comment group directly above `node`, following Go's lead-comment rule.
///
/// Comments in the group are separated by at most one line break, the last
/// one ends on the line right above `node`, and a comment sharing a line with
/// the preceding token belongs to that token instead.
fn doc_before(node: Node<'_>, src: &[u8]) -> Doc {
    let mut comments = Vec::new();
    let mut next_row = node.start_position().row;
    let mut exact = true;
    let mut prev = node.prev_sibling();

    while let Some(comment) = prev.filter(|n| n.kind() == "comment") {
        let end_row = comment.end_position().row;
        let adjacent = if exact {
            end_row + 1 == next_row
        } else {
            end_row + 1 >= next_row
        };
        if !adjacent || trails_token(comment) {
            break;
        }
        comments.push(text(comment, src));
        next_row = comment.start_position().row;
        exact = false;
        prev = comment.prev_sibling();
    }

    if comments.is_empty() {
        return None;
    }
    comments.reverse();
    Some(comments.join("\n"))
}

fn trails_token(comment: Node<'_>) -> bool {
    let row = comment.start_position().row;
    let mut prev = comment.prev_sibling();
    while let Some(node) = prev {
        if node.kind() != "comment" {
            // statement terminators span the line break they consume
            let token_row = if node.kind() == "\n" {
                node.start_position().row
            } else {
                node.end_position().row
            };
            return token_row == row;
        }
        prev = node.prev_sibling();
    }
    false
}

/// End of the package clause's line, past a trailing comment if there is one.
fn package_line_end(clause: Node<'_>) -> usize {
    let mut end = clause
        .child_by_field_name("name")
        .or_else(|| last_named_child(clause))
        .unwrap_or(clause)
        .end_byte();
    let row = clause.end_position().row;
    let mut next = clause.next_sibling();
    while let Some(node) = next.filter(|node| node.start_position().row == row) {
        match node.kind() {
            "comment" => end = node.end_byte(),
            "\n" | ";" => {}
            _ => break,
        }
        next = node.next_sibling();
    }
    end
}

fn last_named_child(node: Node<'_>) -> Option<Node<'_>> {
    let count = node.named_child_count();
    count.checked_sub(1).and_then(|idx| node.named_child(idx))
}

fn text(node: Node<'_>, src: &[u8]) -> String {
    String::from_utf8_lossy(&src[node.byte_range()]).into_owned()
}

/// Decode a Go string literal (interpreted or raw).
pub fn unquote(literal: &str) -> String {
    if let Some(raw) = literal
        .strip_prefix('`')
        .and_then(|rest| rest.strip_suffix('`'))
    {
        return raw.replace('\r', "");
    }
    let inner = literal
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(literal);

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(digit @ ('x' | 'u' | 'U')) => {
                let width = match digit {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let hex: String = chars.by_ref().take(width).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push('\\');
                        out.push(digit);
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
