//! Error kinds surfaced by every public operation of the importer.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Longest statement excerpt carried inside an [`ImportError::SqlExecution`].
const STATEMENT_PREVIEW_CHARS: usize = 120;

#[derive(Debug, Error)]
pub enum ImportError {
    /// Missing path, unreadable file, or a path that is not a dump file
    #[error("{}: {source}", path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// Connect, close, or database switch failed at the driver level
    #[error("connection error: {0}")]
    Connection(String),

    /// The database rejected a statement
    #[error("statement failed: {message} (near: {statement})")]
    SqlExecution { message: String, statement: String },

    /// Malformed dump body detected by the statement splitter
    #[error("parse error at offset {offset}: {message}")]
    Parse { offset: u64, message: String },
}

impl ImportError {
    pub fn file_system(path: impl AsRef<Path>, source: io::Error) -> Self {
        ImportError::FileSystem {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn not_a_dump(path: impl AsRef<Path>) -> Self {
        Self::file_system(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "not a recognized dump file"),
        )
    }

    pub fn sql_execution(message: impl Into<String>, statement: &str) -> Self {
        ImportError::SqlExecution {
            message: message.into(),
            statement: preview(statement),
        }
    }
}

/// Shorten a statement for error messages and log lines.
pub fn preview(statement: &str) -> String {
    let flat: String = statement
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();
    if flat.chars().count() <= STATEMENT_PREVIEW_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(STATEMENT_PREVIEW_CHARS - 3).collect();
        format!("{}...", cut)
    }
}
