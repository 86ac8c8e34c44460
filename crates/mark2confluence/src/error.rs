use std::path::PathBuf;

use thiserror::Error;

/// Configuration problems detected before any file is touched. Always fatal.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Setup error, DOC_DIR_PATTERN: {0}")]
    DocDirPattern(#[from] regex::Error),
    #[error("Setup error, HEADER_TEMPLATE: {0}")]
    HeaderTemplate(String),
    #[error(
        "default_parents must follow the format DIR=SPACE[->PARENT1->PARENT2], provided: {line}"
    )]
    ParentFormat { line: String },
    #[error("default_parents directory pattern '{pattern}' is not a valid glob: {reason}")]
    ParentPattern { pattern: String, reason: String },
    #[error("Setup error, ACTION: unsupported value '{0}' (expected dry-run, publish or verify)")]
    Action(String),
    #[error("Setup error, MODIFIED_INTERVAL: '{0}' is not a number of minutes")]
    ModifiedInterval(String),
    #[error("Setup error, {0}")]
    Settings(String),
    #[error("Setup error, unable to search {path}: {reason}")]
    Discovery { path: PathBuf, reason: String },
}

impl SetupError {
    pub(crate) fn parent_format(line: impl Into<String>) -> Self {
        SetupError::ParentFormat { line: line.into() }
    }
}

/// Raised by header detection and injection for a single file.
#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("The file {} has multiline comments in it that are not closed.", path.display())]
    UnterminatedComment { path: PathBuf },
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HeaderError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HeaderError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Marker returned by the line-level scanner; the file-level callers attach the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnterminatedComment;
