//! Command registry wiring editor requests to the editing services.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::app::comments::{self, OffsetMode};
use crate::app::imports;
use crate::app::scan;
use crate::domain::errors::ToolError;
use crate::infra::config::Config;
use crate::infra::testgen::{GotestsBinary, TestGenerator};

/// Services shared by every command invocation.
pub struct Context {
    pub config: Config,
    pub generator: Box<dyn TestGenerator>,
}

impl Context {
    pub fn new(config: Config) -> Self {
        let generator = Box::new(GotestsBinary::from_config(&config));
        Self { config, generator }
    }

    pub fn with_generator(mut self, generator: Box<dyn TestGenerator>) -> Self {
        self.generator = generator;
        self
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .finish()
    }
}

/// A command takes the raw JSON payload and returns a JSON result.
pub type Handler = fn(&Context, &[u8]) -> Result<Value>;

/// Name to handler table handed to the transport.
#[derive(Clone, Default)]
pub struct Registry {
    commands: BTreeMap<&'static str, Handler>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in command.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register("version", version)
            .register("imports", all_imports)
            .register("add_comments", add_comments)
            .register("add_import", add_import)
            .register("gotest", gotest);
        registry
    }

    pub fn register(&mut self, name: &'static str, handler: Handler) -> &mut Self {
        self.commands.insert(name, handler);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.commands.keys().copied()
    }

    pub fn run(&self, ctx: &Context, name: &str, data: &[u8]) -> Result<Value> {
        let handler = self
            .commands
            .get(name)
            .ok_or_else(|| ToolError::UnknownCommand(name.to_owned()))?;
        tracing::debug!(
            command = name,
            payload_bytes = data.len(),
            "running command"
        );
        handler(ctx, data)
    }
}

fn payload<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    serde_json::from_slice(data)
        .map_err(|err| ToolError::InvalidArgument(err.to_string()))
        .context("error on unmarshal data")
}

fn version(_ctx: &Context, _data: &[u8]) -> Result<Value> {
    Ok(json!({ "version": env!("CARGO_PKG_VERSION") }))
}

fn all_imports(ctx: &Context, _data: &[u8]) -> Result<Value> {
    let imports = scan::all_import_paths(&ctx.config).context("error on collect imports")?;
    Ok(json!({ "imports": imports }))
}

#[derive(Debug, Deserialize)]
struct AddCommentsRequest {
    file: PathBuf,
    #[serde(rename = "isRuneCount", default)]
    is_rune_count: bool,
}

fn add_comments(_ctx: &Context, data: &[u8]) -> Result<Value> {
    let req: AddCommentsRequest = payload(data)?;
    let offsets = OffsetMode::from_rune_count(req.is_rune_count);
    let directives =
        comments::add_comments(&req.file, offsets).context("error on add comments")?;
    Ok(json!({ "status": "ok", "result": directives }))
}

#[derive(Debug, Deserialize)]
struct AddImportRequest {
    file: PathBuf,
    import: String,
}

fn add_import(_ctx: &Context, data: &[u8]) -> Result<Value> {
    let req: AddImportRequest = payload(data)?;
    let region = imports::add_import(&req.file, &req.import).context("error on add import")?;
    Ok(json!({ "status": "ok", "result": region }))
}

#[derive(Debug, Deserialize)]
struct GotestRequest {
    file: PathBuf,
    function: String,
}

fn gotest(ctx: &Context, data: &[u8]) -> Result<Value> {
    let req: GotestRequest = payload(data)?;
    let paths = write_tests(ctx.generator.as_ref(), &req.file, &req.function)?;
    Ok(json!({ "test_files": paths }))
}

/// Generate tests for functions of `file` named exactly `function` (a regex
/// fragment) and write them next to the source.
pub fn write_tests(
    generator: &dyn TestGenerator,
    file: &Path,
    function: &str,
) -> Result<Vec<PathBuf>> {
    let only = Regex::new(&format!("^{function}$"))
        .map_err(|err| ToolError::InvalidArgument(err.to_string()))
        .context("error on compile regexp")?;
    let generated = generator
        .generate(file, &only)
        .context("error on get tests")?;

    let mut paths = Vec::with_capacity(generated.len());
    for test in generated {
        fs::write(&test.path, &test.content)
            .map_err(|err| ToolError::io(&test.path, err))
            .with_context(|| format!("error on write test result ({})", test.path.display()))?;
        paths.push(test.path);
    }
    tracing::debug!(file = %file.display(), written = paths.len(), "wrote generated tests");
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::testgen::{GeneratedTest, test_path};

    struct FakeGenerator;

    impl TestGenerator for FakeGenerator {
        fn generate(&self, file: &Path, only: &Regex) -> Result<Vec<GeneratedTest>, ToolError> {
            if !only.is_match("Run") {
                return Ok(Vec::new());
            }
            Ok(vec![GeneratedTest {
                path: test_path(file),
                content: format!("// tests for {}\n", only.as_str()).into_bytes(),
            }])
        }
    }

    fn context() -> Context {
        Context::new(Config::default()).with_generator(Box::new(FakeGenerator))
    }

    #[test]
    fn default_registry_lists_builtin_commands() {
        let names: Vec<_> = Registry::with_defaults().names().collect();
        assert_eq!(
            names,
            vec!["add_comments", "add_import", "gotest", "imports", "version"]
        );
    }

    #[test]
    fn unknown_command_is_reported() {
        let err = Registry::with_defaults()
            .run(&context(), "godef", b"{}")
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ToolError>(),
            Some(ToolError::UnknownCommand(name)) if name == "godef"
        ));
    }

    #[test]
    fn add_import_returns_region() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let file = temp.path().join("main.go");
        fs::write(&file, "package main\n\nfunc main() {}\n")?;

        let data = serde_json::to_vec(&json!({ "file": file, "import": "fmt" }))?;
        let out = Registry::with_defaults().run(&context(), "add_import", &data)?;

        assert_eq!(out["status"], "ok");
        assert_eq!(out["result"]["l_pos"], 12);
        assert_eq!(out["result"]["r_pos"], 12);
        assert_eq!(out["result"]["text"], "\n\nimport \"fmt\"");
        Ok(())
    }

    #[test]
    fn add_comments_honours_rune_count_flag() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let file = temp.path().join("main.go");
        fs::write(&file, "package main\n\n// Привет\nvar x = 1\n\nfunc Run() {}\n")?;

        let registry = Registry::with_defaults();
        let bytes = registry.run(
            &context(),
            "add_comments",
            &serde_json::to_vec(&json!({ "file": file }))?,
        )?;
        let chars = registry.run(
            &context(),
            "add_comments",
            &serde_json::to_vec(&json!({ "file": file, "isRuneCount": true }))?,
        )?;

        assert_eq!(bytes["result"][0]["text"], "// Run ...\n");
        let byte_pos = bytes["result"][0]["pos"].as_u64().unwrap_or_default();
        let char_pos = chars["result"][0]["pos"].as_u64().unwrap_or_default();
        assert_eq!(byte_pos - char_pos, 6);
        Ok(())
    }

    #[test]
    fn malformed_payload_is_invalid_argument() {
        let err = Registry::with_defaults()
            .run(&context(), "add_import", b"not json")
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ToolError>(),
            Some(ToolError::InvalidArgument(_))
        ));
    }

    #[test]
    fn gotest_writes_generated_files() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let file = temp.path().join("server.go");
        fs::write(&file, "package server\n\nfunc Run() {}\n")?;

        let data = serde_json::to_vec(&json!({ "file": file, "function": "Run" }))?;
        let out = Registry::with_defaults().run(&context(), "gotest", &data)?;

        let written = temp.path().join("server_test.go");
        assert_eq!(out["test_files"], json!([written]));
        assert_eq!(fs::read_to_string(&written)?, "// tests for ^Run$\n");
        Ok(())
    }

    #[test]
    fn gotest_rejects_bad_pattern() {
        let err = write_tests(&FakeGenerator, Path::new("server.go"), "Run(").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ToolError>(),
            Some(ToolError::InvalidArgument(_))
        ));
    }

    #[test]
    fn version_reports_crate_version() -> Result<()> {
        let out = Registry::with_defaults().run(&context(), "version", b"")?;
        assert_eq!(out["version"], env!("CARGO_PKG_VERSION"));
        Ok(())
    }
}
