//! Doc comment stubs for exported declarations.

use std::path::Path;

use crate::domain::errors::ToolError;
use crate::domain::model::{
    Declaration, Doc, InsertionDirective, SourceFile, char_offset, is_exported,
};
use crate::infra::parser::{self, ParseMode};

/// Unit of the positions reported to the editor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OffsetMode {
    #[default]
    Bytes,
    /// Decoded characters, for editors that address text by code point.
    Chars,
}

impl OffsetMode {
    pub fn from_rune_count(is_rune_count: bool) -> Self {
        if is_rune_count { Self::Chars } else { Self::Bytes }
    }
}

/// Compute `// Name ...` stubs for every exported, undocumented top-level
/// declaration of the file at `path`.
///
/// Directives come back in descending position order so they can be applied
/// one after another without shifting each other.
pub fn add_comments(
    path: &Path,
    offsets: OffsetMode,
) -> Result<Vec<InsertionDirective>, ToolError> {
    let file = parser::parse_file(path, ParseMode::Full)?;
    let directives = doc_stubs(&file, offsets);
    tracing::debug!(
        file = %path.display(),
        directives = directives.len(),
        "computed doc stubs"
    );
    Ok(directives)
}

/// Directives for an already parsed file.
pub fn doc_stubs(file: &SourceFile, offsets: OffsetMode) -> Vec<InsertionDirective> {
    let mut out = Vec::new();

    for decl in &file.decls {
        match decl {
            Declaration::Function {
                name,
                doc,
                position,
            } => push_stub(&mut out, name, doc, *position),
            Declaration::Types(group) => match group.members.as_slice() {
                [] => {}
                // a lone member is documented through its declaration
                [only] => {
                    if group.doc.is_none() {
                        push_stub(&mut out, &only.name, &only.doc, group.position);
                    }
                }
                members => {
                    for member in members {
                        push_stub(&mut out, &member.name, &member.doc, member.position);
                    }
                }
            },
            Declaration::Values(group) => match group.members.as_slice() {
                [] => {}
                [only] => {
                    if group.doc.is_none()
                        && let [name] = only.names.as_slice()
                    {
                        push_stub(&mut out, name, &only.doc, group.position);
                    }
                }
                members => {
                    for member in members {
                        if let [name] = member.names.as_slice() {
                            push_stub(&mut out, name, &member.doc, member.position);
                        }
                    }
                }
            },
            Declaration::Imports(_) => {}
        }
    }

    out.sort_by(|a, b| b.pos.cmp(&a.pos));

    if offsets == OffsetMode::Chars {
        for directive in &mut out {
            directive.pos = char_offset(&file.content, directive.pos);
        }
    }
    out
}

fn push_stub(out: &mut Vec<InsertionDirective>, name: &str, doc: &Doc, position: usize) {
    if !is_exported(name) || doc.is_some() {
        return;
    }
    out.push(InsertionDirective {
        pos: position,
        text: format!("// {name} ...\n"),
    });
}
