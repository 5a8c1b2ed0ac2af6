//! Adapter for the external `gotests` generator.

use std::path::{Path, PathBuf};
use std::process::Command;

use regex::Regex;

use crate::domain::errors::ToolError;
use crate::infra::config::Config;

/// A generated test file, not yet written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedTest {
    pub path: PathBuf,
    pub content: Vec<u8>,
}

/// Produces table-driven test stubs for the functions of a Go file.
pub trait TestGenerator: Send + Sync {
    /// Generate tests for the functions of `file` whose names match `only`.
    fn generate(&self, file: &Path, only: &Regex) -> Result<Vec<GeneratedTest>, ToolError>;
}

/// Runs the `gotests` executable and captures what it prints.
#[derive(Debug, Clone)]
pub struct GotestsBinary {
    program: String,
}

impl GotestsBinary {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.gotests.program.clone())
    }
}

impl TestGenerator for GotestsBinary {
    fn generate(&self, file: &Path, only: &Regex) -> Result<Vec<GeneratedTest>, ToolError> {
        let output = Command::new(&self.program)
            .arg("-only")
            .arg(only.as_str())
            .arg(file)
            .output()
            .map_err(|err| ToolError::io(&self.program, err))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ToolError::Generator(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            tracing::debug!(file = %file.display(), "gotests produced no tests");
            return Ok(Vec::new());
        }

        Ok(vec![GeneratedTest {
            path: test_path(file),
            content: output.stdout,
        }])
    }
}

/// `dir/foo.go` becomes `dir/foo_test.go`.
pub fn test_path(file: &Path) -> PathBuf {
    let name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.strip_suffix(".go").unwrap_or(&name);
    let stem = stem.strip_suffix("_test").unwrap_or(stem);
    file.with_file_name(format!("{stem}_test.go"))
}
