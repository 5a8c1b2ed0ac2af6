//! Import block merging.

use std::fmt::Write as _;
use std::path::Path;

use crate::domain::errors::ToolError;
use crate::domain::model::{ImportEntry, ReplacementRegion, SourceFile};
use crate::infra::parser::{self, ParseMode};

/// Compute the replacement that adds `import` to the file at `path`.
///
/// An existing import declaration is regenerated as a whole in gofmt layout.
/// Without one, the region is an empty span at the end of the package line
/// and the text is a new single-line import.
pub fn add_import(path: &Path, import: &str) -> Result<ReplacementRegion, ToolError> {
    let file = parser::parse_file(path, ParseMode::ImportsOnly)?;
    let region = merge_import(&file, import);
    tracing::debug!(
        file = %path.display(),
        import,
        l_pos = region.l_pos,
        r_pos = region.r_pos,
        "computed import block"
    );
    Ok(region)
}

/// Merge `import` into an already parsed file.
pub fn merge_import(file: &SourceFile, import: &str) -> ReplacementRegion {
    let Some(group) = file.import_group() else {
        return ReplacementRegion {
            l_pos: file.package_end,
            r_pos: file.package_end,
            text: format!("\n\nimport {}", quote(import)),
        };
    };

    let mut runs = split_runs(&group.entries);
    let mut parenthesized = group.parenthesized;

    if !group.entries.iter().any(|entry| entry.path == import) {
        let spec = Spec {
            alias: None,
            path: import.to_owned(),
        };
        if runs.is_empty() {
            runs.push(Vec::new());
        }
        // host-qualified paths go last, everything else first
        if import.contains('.') {
            if let Some(last) = runs.last_mut() {
                last.push(spec);
            }
        } else {
            runs[0].insert(0, spec);
        }
        parenthesized = true;
    }

    for run in &mut runs {
        run.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.alias.cmp(&b.alias)));
        run.dedup();
    }

    ReplacementRegion {
        l_pos: group.position,
        r_pos: group.end,
        text: render(&runs, parenthesized),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Spec {
    alias: Option<String>,
    path: String,
}

/// Group entries into runs separated by at least one empty line.
fn split_runs(entries: &[ImportEntry]) -> Vec<Vec<Spec>> {
    let mut runs: Vec<Vec<Spec>> = Vec::new();
    let mut last_line = None;
    for entry in entries {
        let starts_run = last_line.is_none_or(|line: usize| entry.line > line + 1);
        if starts_run {
            runs.push(Vec::new());
        }
        if let Some(run) = runs.last_mut() {
            run.push(Spec {
                alias: entry.alias.clone(),
                path: entry.path.clone(),
            });
        }
        last_line = Some(entry.line);
    }
    runs
}

fn render(runs: &[Vec<Spec>], parenthesized: bool) -> String {
    let specs: Vec<&Spec> = runs.iter().flatten().collect();
    if let ([only], false) = (specs.as_slice(), parenthesized) {
        return format!("import {}", render_spec(only));
    }

    let mut out = String::from("import (\n");
    for (idx, run) in runs.iter().filter(|run| !run.is_empty()).enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        for spec in run {
            let _ = writeln!(out, "\t{}", render_spec(spec));
        }
    }
    out.push(')');
    out
}

fn render_spec(spec: &Spec) -> String {
    match &spec.alias {
        Some(alias) => format!("{alias} {}", quote(&spec.path)),
        None => quote(&spec.path),
    }
}

/// Quote `value` as a Go interpreted string literal.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merge(source: &str, import: &str) -> ReplacementRegion {
        let bytes = source.as_bytes().to_vec();
        let file = parser::parse(Path::new("demo.go"), bytes, ParseMode::ImportsOnly)
            .expect("source parses");
        merge_import(&file, import)
    }

    fn patched(source: &str, import: &str) -> String {
        let region = merge(source, import);
        String::from_utf8(region.apply(source.as_bytes())).expect("utf-8 output")
    }

    #[test]
    fn inserts_single_import_after_package_clause() {
        let source = "package demo\n\nfunc main() {}\n";
        let region = merge(source, "bytes");
        assert_eq!(region.l_pos, region.r_pos);
        assert_eq!(region.l_pos, "package demo".len());
        assert_eq!(
            patched(source, "bytes"),
            "package demo\n\nimport \"bytes\"\n\nfunc main() {}\n"
        );
    }

    #[test]
    fn new_import_goes_below_a_trailing_package_comment() {
        let source = "package demo // trailing\n\nfunc main() {}\n";
        assert_eq!(
            patched(source, "fmt"),
            "package demo // trailing\n\nimport \"fmt\"\n\nfunc main() {}\n"
        );
    }

    #[test]
    fn merging_twice_is_idempotent() {
        let source = "package demo\n\nfunc main() {}\n";
        let once = patched(source, "bytes");
        let region = merge(&once, "bytes");
        assert_eq!(region.text, "import \"bytes\"");
        assert_eq!(
            &once.as_bytes()[region.l_pos..region.r_pos],
            region.text.as_bytes()
        );
        assert_eq!(patched(&once, "bytes"), once);
    }

    #[test]
    fn single_unparenthesized_import_becomes_block() {
        let source = "package demo\n\nimport \"fmt\"\n\nfunc main() {}\n";
        assert_eq!(
            patched(source, "bytes"),
            "package demo\n\nimport (\n\t\"bytes\"\n\t\"fmt\"\n)\n\nfunc main() {}\n"
        );
    }

    #[test]
    fn plain_paths_join_the_first_run_and_dotted_paths_the_last() {
        let source = "package demo\n\nimport (\n\t\"os\"\n\n\t\"github.com/pkg/errors\"\n)\n";

        let plain = merge(source, "bytes");
        assert_eq!(
            plain.text,
            "import (\n\t\"bytes\"\n\t\"os\"\n\n\t\"github.com/pkg/errors\"\n)"
        );

        let dotted = merge(source, "example.com/lib");
        assert_eq!(
            dotted.text,
            "import (\n\t\"os\"\n\n\t\"example.com/lib\"\n\t\"github.com/pkg/errors\"\n)"
        );
    }

    #[test]
    fn existing_path_is_not_duplicated() {
        let source = "package demo\n\nimport (\n\tstrs \"strings\"\n\t\"fmt\"\n)\n";
        let region = merge(source, "strings");
        assert_eq!(region.text, "import (\n\t\"fmt\"\n\tstrs \"strings\"\n)");
        assert_eq!(region.text.matches("strings").count(), 1);
    }

    #[test]
    fn region_covers_the_whole_declaration() {
        let source = "package demo\n\nimport (\n\t\"fmt\"\n)\n\nvar x = 1\n";
        let region = merge(source, "bytes");
        let start = source.find("import").unwrap();
        let end = source.find(")\n").unwrap() + 1;
        assert_eq!((region.l_pos, region.r_pos), (start, end));
    }

    #[test]
    fn empty_block_gains_its_first_entry() {
        let source = "package demo\n\nimport ()\n";
        assert_eq!(merge(source, "io").text, "import (\n\t\"io\"\n)");
    }

    #[test]
    fn quotes_special_characters() {
        assert_eq!(quote(r#"we"ird\path"#), r#""we\"ird\\path""#);
    }
}
