//! Workspace package scanning services.
//!
//! A scan walks one or more roots on a background thread and streams every
//! directory holding non-test Go sources back to the caller. What happens to
//! an entry on its way out is decided by a stack of [`Layer`]s wrapped around
//! the sink that feeds the channel.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::thread;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::domain::errors::ToolError;
use crate::domain::model::ImportPath;
use crate::infra::config::Config;

const SOURCE_SUFFIX: &str = ".go";
const TEST_SUFFIX: &str = "_test.go";

/// Receives every package discovered by a walk.
pub type Sink = Arc<dyn Fn(ImportPath) + Send + Sync>;

/// Wraps a sink to filter or rewrite entries before they reach it.
pub type Layer = fn(Sink) -> Sink;

/// Stack `layers` onto `base`; the last layer sees entries first.
pub fn layered(base: Sink, layers: &[Layer]) -> Sink {
    layers.iter().fold(base, |sink, layer| layer(sink))
}

/// Drop every entry tagged as vendored.
pub fn skip_vendor(next: Sink) -> Sink {
    Arc::new(move |entry: ImportPath| {
        if !entry.is_vendor {
            next(entry);
        }
    })
}

/// Tag every entry as vendored.
pub fn vendored(next: Sink) -> Sink {
    Arc::new(move |mut entry: ImportPath| {
        entry.is_vendor = true;
        next(entry);
    })
}

/// One directory tree to scan and the layers applied to its entries.
#[derive(Clone)]
pub struct ScanRoot {
    pub dir: PathBuf,
    pub layers: Vec<Layer>,
}

impl ScanRoot {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            layers: Vec::new(),
        }
    }

    pub fn with_layer(mut self, layer: Layer) -> Self {
        self.layers.push(layer);
        self
    }
}

impl std::fmt::Debug for ScanRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanRoot")
            .field("dir", &self.dir)
            .field("layers", &self.layers.len())
            .finish()
    }
}

/// The conventional roots: `$GOROOT/src` without vendored code, then the
/// `src` directory of every GOPATH entry with vendored code tagged.
pub fn go_roots(config: &Config) -> Vec<ScanRoot> {
    let goroot = ScanRoot::new(config.go.goroot().join("src")).with_layer(skip_vendor);
    let mut roots = vec![goroot];
    roots.extend(
        config
            .go
            .gopath()
            .into_iter()
            .map(|entry| ScanRoot::new(entry.join("src"))),
    );
    roots
}

/// Rules deciding which directories are walked.
#[derive(Clone)]
pub struct WalkRules {
    prune: Vec<OsString>,
    vendor_dir: OsString,
    ignore: Option<GlobSet>,
    list: Lister,
}

type Lister = Arc<dyn Fn(&Path) -> io::Result<Vec<Listed>> + Send + Sync>;

/// A directory entry as seen by the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Listed {
    name: OsString,
    is_dir: bool,
}

impl WalkRules {
    pub fn from_config(config: &Config) -> Result<Self, ToolError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.scan.ignore_globs {
            let glob = Glob::new(pattern).map_err(|err| {
                ToolError::InvalidArgument(format!("invalid ignore glob '{pattern}': {err}"))
            })?;
            builder.add(glob);
        }
        let ignore = if config.scan.ignore_globs.is_empty() {
            None
        } else {
            Some(builder.build().map_err(|err| {
                ToolError::InvalidArgument(format!("failed to build ignore matcher: {err}"))
            })?)
        };

        Ok(Self {
            prune: config.scan.prune.iter().map(OsString::from).collect(),
            vendor_dir: OsString::from(&config.scan.vendor_dir),
            ignore,
            list: Arc::new(list_dir),
        })
    }

    fn skips(&self, name: &OsString, rel: &str) -> bool {
        self.prune.contains(name) || self.ignore.as_ref().is_some_and(|set| set.is_match(rel))
    }
}

impl Default for WalkRules {
    fn default() -> Self {
        Self {
            prune: vec!["testdata".into(), "cmd".into()],
            vendor_dir: "vendor".into(),
            ignore: None,
            list: Arc::new(list_dir),
        }
    }
}

impl std::fmt::Debug for WalkRules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalkRules")
            .field("prune", &self.prune)
            .field("vendor_dir", &self.vendor_dir)
            .field("ignore", &self.ignore.as_ref().map(GlobSet::len))
            .finish()
    }
}

/// Directory entries sorted by name.
fn list_dir(dir: &Path) -> io::Result<Vec<Listed>> {
    let mut listed = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        listed.push(Listed {
            name: entry.file_name(),
            is_dir: entry.file_type()?.is_dir(),
        });
    }
    listed.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(listed)
}

/// Shared flag asking a running scan to stop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Lazily consumed results of a running scan.
///
/// Yields packages in discovery order. A walk failure arrives as a final
/// `Err` element, after which the stream ends. Dropping the stream cancels
/// the producer.
#[derive(Debug)]
pub struct ScanStream {
    rx: Receiver<Result<ImportPath, ToolError>>,
    cancel: CancelToken,
    done: bool,
}

impl ScanStream {
    /// Token that stops the producer at its next directory.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

impl Iterator for ScanStream {
    type Item = Result<ImportPath, ToolError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.rx.recv().ok();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}

impl Drop for ScanStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Scanner streaming Go package directories from a sequence of roots.
#[derive(Debug, Default)]
pub struct Scanner {
    rules: WalkRules,
}

impl Scanner {
    pub fn new(rules: WalkRules) -> Self {
        Self { rules }
    }

    /// Start walking `roots` in order on a background thread.
    pub fn scan(&self, roots: Vec<ScanRoot>) -> Result<ScanStream, ToolError> {
        let (tx, rx) = mpsc::channel();
        let cancel = CancelToken::default();
        let rules = self.rules.clone();
        let token = cancel.clone();

        thread::Builder::new()
            .name("goscribe-scan".into())
            .spawn(move || {
                for root in roots {
                    if token.is_cancelled() {
                        break;
                    }
                    let base: Sink = {
                        let tx = tx.clone();
                        let token = token.clone();
                        Arc::new(move |entry: ImportPath| {
                            if tx.send(Ok(entry)).is_err() {
                                token.cancel();
                            }
                        })
                    };
                    let sink = layered(base, &root.layers);
                    if let Err((dir, source)) = walk(&root.dir, &root.dir, &rules, &sink, &token) {
                        tracing::warn!(
                            root = %root.dir.display(),
                            dir = %dir.display(),
                            error = %source,
                            "package scan aborted"
                        );
                        let _ = tx.send(Err(ToolError::PartialScan {
                            root: root.dir.clone(),
                            dir,
                            source,
                        }));
                        break;
                    }
                    tracing::debug!(root = %root.dir.display(), "package scan finished root");
                }
            })
            .map_err(|err| ToolError::io("goscribe-scan", err))?;

        Ok(ScanStream {
            rx,
            cancel,
            done: false,
        })
    }
}

/// Collect every package path under the conventional Go roots.
pub fn all_import_paths(config: &Config) -> Result<Vec<String>, ToolError> {
    let scanner = Scanner::new(WalkRules::from_config(config)?);
    let mut imports = Vec::new();
    for entry in scanner.scan(go_roots(config))? {
        imports.push(entry?.path);
    }
    tracing::debug!(imports = imports.len(), "collected import paths");
    Ok(imports)
}

fn walk(
    dir: &Path,
    root: &Path,
    rules: &WalkRules,
    sink: &Sink,
    cancel: &CancelToken,
) -> Result<(), (PathBuf, io::Error)> {
    if cancel.is_cancelled() {
        return Ok(());
    }
    let listed = (rules.list)(dir).map_err(|err| (dir.to_path_buf(), err))?;

    let is_package = listed
        .iter()
        .any(|entry| !entry.is_dir && is_package_source(&entry.name));
    if is_package && dir != root {
        sink(ImportPath {
            path: relative(root, dir),
            is_vendor: false,
        });
    }

    for entry in listed.iter().filter(|entry| entry.is_dir) {
        let sub = dir.join(&entry.name);
        if rules.skips(&entry.name, &relative(root, &sub)) {
            continue;
        }
        if entry.name == rules.vendor_dir {
            walk(&sub, root, rules, &vendored(sink.clone()), cancel)?;
        } else {
            walk(&sub, root, rules, sink, cancel)?;
        }
    }
    Ok(())
}

fn is_package_source(name: &OsStr) -> bool {
    name.to_str()
        .is_some_and(|name| name.ends_with(SOURCE_SUFFIX) && !name.ends_with(TEST_SUFFIX))
}

fn relative(root: &Path, dir: &Path) -> String {
    let rel = dir.strip_prefix(root).unwrap_or(dir);
    rel.components()
        .map(|part| part.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
