use std::fmt;
use std::path::PathBuf;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    Doi,
    Organisation,
    Orcid,
    Person,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierKind::Doi => write!(f, "DOI"),
            IdentifierKind::Organisation => write!(f, "organisation id"),
            IdentifierKind::Orcid => write!(f, "ORCID"),
            IdentifierKind::Person => write!(f, "person identity"),
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum StatsError {
    #[error("invalid {kind}: {value:?}")]
    InvalidIdentifier { kind: IdentifierKind, value: String },

    #[error("invalid source: {0}")]
    InvalidSource(String),

    #[error("failed to load organisation directory from {path}: {message}")]
    #[diagnostic(help("expected a ROR data dump (JSON array of organisation records)"))]
    DirectoryLoad { path: PathBuf, message: String },

    #[error("dataset {doi} lacks field {field}")]
    SchemaMismatch { doi: String, field: &'static str },

    #[error("malformed record at {path}:{line}: {message}")]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("input file not found: {0}")]
    InputNotFound(PathBuf),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to serialize output: {0}")]
    Serialize(String),
}

impl StatsError {
    pub fn invalid(kind: IdentifierKind, value: &str) -> Self {
        StatsError::InvalidIdentifier {
            kind,
            value: value.to_string(),
        }
    }
}
