/// Error Module
///
/// Error taxonomy shared by discovery, extraction and loading.
use crate::db::statements::StatementKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EtlError {
    /// Missing directory or unreadable file
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Directory traversal failed below the root
    #[error("Failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    /// Line is not valid JSON
    #[error("Malformed JSON in {path} at line {line}: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Valid JSON that lacks a required field or has the wrong type
    #[error("Unexpected record shape in {path} at line {line}: {source}")]
    Shape {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("No record found in {0}")]
    EmptyFile(PathBuf),

    #[error("Timestamp {0}ms is out of range")]
    InvalidTimestamp(i64),

    #[error("Statement catalog has no entry for {0}")]
    MissingStatement(StatementKind),

    #[error("{statement} expects parameter '{column}' which the row does not provide")]
    MissingParameter { statement: StatementKind, column: &'static str },

    #[error("Statement issued outside of a transaction")]
    NoActiveTransaction,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl EtlError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}
