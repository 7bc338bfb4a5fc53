//! Error types
//!
//! Every error carries the path it concerns and the stage of the run that
//! produced it, so the caller can report it without extra context.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Stage of a run an error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Loading the filter file
    Filter,
    /// Opening or reading the source file
    Source,
    /// Writing or committing the output file
    Output,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Filter => "filter",
            Self::Source => "source",
            Self::Output => "output",
        };
        f.write_str(name)
    }
}

/// Errors produced by the filtering engine
#[derive(Debug, Error)]
pub enum LinedupError {
    /// Input path does not exist
    #[error("{stage} file not found: {}", path.display())]
    NotFound { path: PathBuf, stage: Stage },

    /// Input is not valid UTF-8
    #[error(
        "{stage} file {} is not valid UTF-8 (line {line}){}",
        path.display(),
        detected.map(|d| format!(", looks like {d}")).unwrap_or_default()
    )]
    Encoding {
        path: PathBuf,
        stage: Stage,
        /// 1-based line holding the first invalid byte
        line: usize,
        /// Best guess of the real encoding
        detected: Option<&'static str>,
    },

    /// Any other I/O failure
    #[error("I/O error on {stage} file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        stage: Stage,
        #[source]
        source: io::Error,
    },
}

impl LinedupError {
    /// Wrap an I/O error, mapping `NotFound` to its own variant
    pub fn io(path: impl Into<PathBuf>, stage: Stage, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound { path, stage }
        } else {
            Self::Io { path, stage, source }
        }
    }

    /// The stage the error was raised in
    pub fn stage(&self) -> Stage {
        match self {
            Self::NotFound { stage, .. }
            | Self::Encoding { stage, .. }
            | Self::Io { stage, .. } => *stage,
        }
    }
}

pub type Result<T> = std::result::Result<T, LinedupError>;
