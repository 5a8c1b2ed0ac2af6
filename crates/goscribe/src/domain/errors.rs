//! Domain-specific errors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{}:{line}:{column}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Terminal element of a path scan; entries yielded before it stay valid.
    #[error("error on parse dir ({}) at {}: {source}", root.display(), dir.display())]
    PartialScan {
        root: PathBuf,
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("test generator failed: {0}")]
    Generator(String),
}

impl ToolError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
