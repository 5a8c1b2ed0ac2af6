use std::fs;
use std::path::PathBuf;

use goscribe::app::imports::add_import;
use insta::assert_snapshot;
use tempfile::TempDir;

fn source_file(contents: &str) -> (TempDir, PathBuf) {
    let temp = tempfile::tempdir().expect("temp dir");
    let path = temp.path().join("fixture.go");
    fs::write(&path, contents).expect("write fixture");
    (temp, path)
}

/// Merge `import` and splice the result back the way an editor would.
fn merged(contents: &str, import: &str) -> String {
    let (_temp, path) = source_file(contents);
    let region = add_import(&path, import).expect("import merges");
    String::from_utf8(region.apply(contents.as_bytes())).expect("utf-8 output")
}

#[test]
fn empty_import_decl() {
    let out = merged("package testdata\n\nfunc main() {}\n", "bytes");
    assert_snapshot!("empty_import_decl", out.trim_end());
}

#[test]
fn one_import_decl() {
    let out = merged(
        "package testdata\n\nimport \"fmt\"\n\nfunc main() {\n\tfmt.Println()\n}\n",
        "bytes",
    );
    assert_snapshot!("one_import_decl", out.trim_end());
}

#[test]
fn many_import_decl() {
    let out = merged(
        "package testdata\n\nimport (\n\t\"os\"\n\t\"fmt\"\n\n\t\"github.com/pkg/errors\"\n)\n\nfunc main() {}\n",
        "bytes",
    );
    assert_snapshot!("many_import_decl", out.trim_end());
}

#[test]
fn many_with_error_import_decl() {
    let out = merged(
        "package testdata\n\nimport (\n\t\"fmt\"\n\t\"os\"\n)\n\nfunc main() {\n\tx := )\n}\n",
        "github.com/pkg/errors",
    );
    assert_snapshot!("many_with_error_import_decl", out.trim_end());
}

#[test]
fn repeated_merge_leaves_file_unchanged() {
    let once = merged("package testdata\n\nfunc main() {}\n", "bytes");
    assert_eq!(merged(&once, "bytes"), once);
}
