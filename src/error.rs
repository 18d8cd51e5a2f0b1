use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A single syntax problem reported by the validator procedure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxIssue {
    pub message: String,
    #[serde(default)]
    pub line: Option<u64>,
    #[serde(default)]
    pub column: Option<u64>,
}

impl fmt::Display for SyntaxIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, "{} ({}:{})", self.message, line, column),
            (Some(line), None) => write!(f, "{} (line {})", self.message, line),
            _ => f.write_str(&self.message),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid executable {path}: {reason}")]
    InvalidExecutable { path: PathBuf, reason: String },

    #[error("Not writable: {path}")]
    NotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Does not exist: {0}")]
    NotExists(String),

    #[error("Script contains {} syntax error(s): {}", .errors.len(), join_issues(.errors))]
    Syntax { errors: Vec<SyntaxIssue> },

    #[error("Script requirement not met: {0}")]
    Requirement(String),

    #[error("Procedure failed: {0}")]
    ProcedureFailed(String),

    #[error("No loader could load: {0}")]
    NoLoaderFound(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Syntax issues carried by a `Syntax` error, empty for every other variant
    pub fn syntax_issues(&self) -> &[SyntaxIssue] {
        match self {
            Error::Syntax { errors } => errors,
            _ => &[],
        }
    }
}

fn join_issues(errors: &[SyntaxIssue]) -> String {
    errors
        .iter()
        .map(|issue| issue.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, Error>;
