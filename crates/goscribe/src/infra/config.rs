//! Configuration management utilities.

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirs_next::{config_dir, home_dir};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));

const DEFAULT_GOROOT: &str = "/usr/local/go";

/// Layered configuration loaded from defaults, user, explicit file, and env.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub go: Go,
    #[serde(default)]
    pub scan: Scan,
    #[serde(default)]
    pub gotests: Gotests,
}

/// Go toolchain locations. Unset values fall back to the toolchain defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Go {
    #[serde(default)]
    pub goroot: Option<String>,
    #[serde(default)]
    pub gopath: Option<String>,
}

impl Go {
    pub fn goroot(&self) -> PathBuf {
        self.goroot
            .as_deref()
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_GOROOT))
    }

    /// Every GOPATH entry; `$HOME/go` when unset.
    pub fn gopath(&self) -> Vec<PathBuf> {
        match self.gopath.as_deref().filter(|value| !value.is_empty()) {
            Some(list) => env::split_paths(list)
                .filter(|path| !path.as_os_str().is_empty())
                .collect(),
            None => home_dir()
                .map(|home| vec![home.join("go")])
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scan {
    /// Directory names that are neither reported nor descended into.
    #[serde(default = "Scan::default_prune")]
    pub prune: Vec<String>,
    #[serde(default = "Scan::default_vendor_dir")]
    pub vendor_dir: String,
    /// Globs matched against root-relative directory paths to prune.
    #[serde(default)]
    pub ignore_globs: Vec<String>,
}

impl Scan {
    fn default_prune() -> Vec<String> {
        vec!["testdata".into(), "cmd".into()]
    }

    fn default_vendor_dir() -> String {
        "vendor".into()
    }
}

impl Default for Scan {
    fn default() -> Self {
        Self {
            prune: Self::default_prune(),
            vendor_dir: Self::default_vendor_dir(),
            ignore_globs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gotests {
    #[serde(default = "Gotests::default_program")]
    pub program: String,
}

impl Gotests {
    fn default_program() -> String {
        "gotests".into()
    }
}

impl Default for Gotests {
    fn default() -> Self {
        Self {
            program: Self::default_program(),
        }
    }
}

/// Environment overrides for toolchain locations.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    goroot: Option<String>,
    gopath: Option<String>,
    gotests: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            goroot: env::var("GOROOT").ok(),
            gopath: env::var("GOPATH").ok(),
            gotests: env::var("GOSCRIBE_GOTESTS").ok(),
        }
    }

    #[cfg(test)]
    fn for_tests(goroot: &str, gopath: &str) -> Self {
        Self {
            goroot: Some(goroot.to_owned()),
            gopath: Some(gopath.to_owned()),
            gotests: None,
        }
    }
}

impl Config {
    /// Load configuration from defaults, the user config, an optional
    /// explicit file, and environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit.filter(|path| !path.exists()) {
            anyhow::bail!("config file not found: {}", path.display());
        }
        let env = EnvOverrides::from_env();
        Self::load_with_layers(global_config_path(), explicit.map(Path::to_path_buf), env)
    }

    fn load_with_layers(
        global: Option<PathBuf>,
        explicit: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut layers: Vec<Config> = Vec::new();

        layers.push(Self::from_str(&DEFAULT_CONFIG)?);

        if let Some(global_path) = global.filter(|path| path.exists()) {
            layers.push(Self::from_file(&global_path)?);
        }

        if let Some(explicit_path) = explicit.filter(|path| path.exists()) {
            layers.push(Self::from_file(&explicit_path)?);
        }

        let merged = layers.into_iter().reduce(Config::merge);
        Ok(apply_env_overrides(merged.unwrap_or_default(), env_overrides))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_str(&data)
    }

    fn from_str(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            go: Go {
                goroot: other.go.goroot.or(self.go.goroot),
                gopath: other.go.gopath.or(self.go.gopath),
            },
            scan: merge_scan(self.scan, other.scan),
            gotests: Gotests {
                program: if other.gotests.program != Gotests::default_program() {
                    other.gotests.program
                } else {
                    self.gotests.program
                },
            },
        }
    }
}

fn merge_scan(base: Scan, overlay: Scan) -> Scan {
    let mut prune: BTreeSet<String> = base.prune.into_iter().collect();
    prune.extend(overlay.prune);

    let mut ignore_globs: BTreeSet<String> = base.ignore_globs.into_iter().collect();
    ignore_globs.extend(overlay.ignore_globs);

    Scan {
        prune: prune.into_iter().collect(),
        vendor_dir: if overlay.vendor_dir != Scan::default_vendor_dir() {
            overlay.vendor_dir
        } else {
            base.vendor_dir
        },
        ignore_globs: ignore_globs.into_iter().collect(),
    }
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("goscribe/config.toml"))
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Config {
    if let Some(goroot) = env.goroot.filter(|value| !value.is_empty()) {
        config.go.goroot = Some(goroot);
    }
    if let Some(gopath) = env.gopath.filter(|value| !value.is_empty()) {
        config.go.gopath = Some(gopath);
    }
    if let Some(program) = env.gotests.filter(|value| !value.is_empty()) {
        config.gotests.program = program;
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_uses_defaults_when_no_files() {
        let config = Config::load_with_layers(None, None, EnvOverrides::default())
            .expect("load default config");
        assert_eq!(
            config.scan.prune,
            vec!["testdata".to_string(), "cmd".to_string()]
        );
        assert_eq!(config.scan.vendor_dir, "vendor");
        assert_eq!(config.gotests.program, "gotests");
        assert_eq!(config.go.goroot(), PathBuf::from(DEFAULT_GOROOT));
    }

    #[test]
    fn merge_global_and_explicit() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let global = temp.path().join("config.toml");
        fs::write(
            &global,
            r#"
[go]
goroot = "/opt/go"
[scan]
ignore_globs = ["**/internal/gen"]
"#,
        )?;

        let explicit = temp.path().join("project.toml");
        fs::write(
            &explicit,
            r#"
[scan]
prune = ["examples"]
[gotests]
program = "/usr/local/bin/gotests"
"#,
        )?;

        let config =
            Config::load_with_layers(Some(global), Some(explicit), EnvOverrides::default())?;

        assert_eq!(config.go.goroot(), PathBuf::from("/opt/go"));
        assert!(config.scan.prune.contains(&"examples".into()));
        assert!(config.scan.prune.contains(&"testdata".into()));
        assert!(config.scan.ignore_globs.contains(&"**/internal/gen".into()));
        assert_eq!(config.gotests.program, "/usr/local/bin/gotests");
        Ok(())
    }

    #[test]
    fn env_overrides_take_precedence() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let first = temp.path().join("one");
        let second = temp.path().join("two");
        let list = env::join_paths([&first, &second])?;

        let overrides = EnvOverrides::for_tests("/srv/go", &list.to_string_lossy());
        let config = Config::load_with_layers(None, None, overrides)?;
        assert_eq!(config.go.goroot(), PathBuf::from("/srv/go"));
        assert_eq!(config.go.gopath(), vec![first, second]);
        Ok(())
    }

    #[test]
    fn invalid_config_returns_error() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let file = temp.path().join("broken.toml");
        fs::write(&file, "this is not toml")?;
        let result = Config::from_file(&file);
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let result = Config::load(Some(Path::new("/nonexistent/goscribe.toml")));
        assert!(result.is_err());
    }
}
