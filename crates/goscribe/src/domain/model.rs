//! Domain models for parsed sources, edit directives, and scanned packages.

use serde::Serialize;

/// A parsed Go source file: its top-level declarations plus the raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub content: Vec<u8>,
    /// Byte offset at the end of the `package` clause's line, after any
    /// comment trailing it.
    pub package_end: usize,
    pub decls: Vec<Declaration>,
}

impl SourceFile {
    /// First import declaration of the file, if any.
    pub fn import_group(&self) -> Option<&ImportGroup> {
        self.decls.iter().find_map(|decl| match decl {
            Declaration::Imports(group) => Some(group),
            _ => None,
        })
    }
}

/// Comment block attached to a declaration, with its comment markers kept.
pub type Doc = Option<String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    /// Functions and methods; for methods `name` is the method name.
    Function {
        name: String,
        doc: Doc,
        position: usize,
    },
    Types(DeclGroup<TypeEntry>),
    /// `var` and `const` declarations.
    Values(DeclGroup<ValueEntry>),
    Imports(ImportGroup),
}

/// A `type`, `var`, or `const` declaration with one or many members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclGroup<T> {
    pub doc: Doc,
    pub position: usize,
    pub parenthesized: bool,
    pub members: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeEntry {
    pub name: String,
    pub doc: Doc,
    pub position: usize,
}

/// One value spec. `var a, b = 1, 2` declares several names in a single spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueEntry {
    pub names: Vec<String>,
    pub doc: Doc,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportGroup {
    pub position: usize,
    /// Exclusive end offset of the whole declaration.
    pub end: usize,
    pub parenthesized: bool,
    pub entries: Vec<ImportEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    /// Unquoted import path.
    pub path: String,
    /// Explicit package name, `_`, or `.`.
    pub alias: Option<String>,
    pub position: usize,
    /// Zero-based source line, used to keep blank-line separated runs apart.
    pub line: usize,
}

/// Whether Go's exported-identifier rule holds for `name`.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// Single-point insertion produced by the doc stub scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsertionDirective {
    pub pos: usize,
    pub text: String,
}

impl InsertionDirective {
    /// Apply directives sorted by descending position to `content`.
    ///
    /// Each insertion happens at or before every offset already consumed, so
    /// the remaining offsets never need adjusting.
    pub fn apply_all(content: &str, directives: &[InsertionDirective]) -> String {
        let mut out = content.to_owned();
        for directive in directives {
            out.insert_str(directive.pos, &directive.text);
        }
        out
    }
}

/// Byte range of the original file to be replaced with `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplacementRegion {
    pub l_pos: usize,
    pub r_pos: usize,
    pub text: String,
}

impl ReplacementRegion {
    /// Splice `original[..l_pos] + text + original[r_pos..]`.
    pub fn apply(&self, original: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(original.len() + self.text.len());
        out.extend_from_slice(&original[..self.l_pos]);
        out.extend_from_slice(self.text.as_bytes());
        out.extend_from_slice(&original[self.r_pos..]);
        out
    }
}

/// A package directory discovered by the workspace scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportPath {
    /// Root-relative path with `/` separators.
    pub path: String,
    pub is_vendor: bool,
}

/// Number of decoded characters in `content[..byte_offset]`.
///
/// Invalid UTF-8 sequences count as one character each, so offsets stay
/// meaningful for files with stray bytes.
pub fn char_offset(content: &[u8], byte_offset: usize) -> usize {
    let mut prefix = &content[..byte_offset.min(content.len())];
    let mut count = 0;
    loop {
        match std::str::from_utf8(prefix) {
            Ok(valid) => return count + valid.chars().count(),
            Err(err) => {
                let (valid, rest) = prefix.split_at(err.valid_up_to());
                // `valid` is checked by `valid_up_to`
                count += std::str::from_utf8(valid).map_or(0, |s| s.chars().count());
                let bad = err.error_len().unwrap_or(rest.len());
                count += 1;
                prefix = &rest[bad..];
            }
        }
    }
}
