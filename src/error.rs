// src/error.rs

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// Problems with the run's configuration. Raised before any fetch happens.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required config key `{0}`")]
    MissingKey(&'static str),

    #[error("invalid date `{0}`")]
    InvalidDate(String),

    #[error("invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("end_date {0} given without start_date")]
    EndWithoutStart(NaiveDate),

    #[error("invalid url pattern `{pattern}`: {reason}")]
    InvalidTemplate { pattern: String, reason: String },

    #[error("invalid table name `{0}`")]
    InvalidTableName(String),

    #[error("unsupported database url `{0}`")]
    UnsupportedDatabase(String),

    #[error("invalid value for `{key}`: {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("reading config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config: {0}")]
    Parse(String),
}

/// Coarse classification of a per-file fetch failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    NotFound,
    Status,
    Transport,
    Timeout,
    Io,
    Malformed,
}

impl FetchErrorKind {
    pub fn as_str(&self) -> &str {
        match self {
            FetchErrorKind::NotFound => "not_found",
            FetchErrorKind::Status => "http_status",
            FetchErrorKind::Transport => "transport",
            FetchErrorKind::Timeout => "timeout",
            FetchErrorKind::Io => "io",
            FetchErrorKind::Malformed => "malformed",
        }
    }
}

/// Failure to fetch or parse one day's source file. Never fatal on its own.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{url}: source not found")]
    NotFound { url: String },

    #[error("{url}: HTTP status {status}")]
    Status { url: String, status: u16 },

    #[error("{url}: transport error: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url}: timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    #[error("{url}: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{url}: malformed content: {reason}")]
    Malformed { url: String, reason: String },
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::NotFound { .. } => FetchErrorKind::NotFound,
            FetchError::Status { .. } => FetchErrorKind::Status,
            FetchError::Transport { .. } => FetchErrorKind::Transport,
            FetchError::Timeout { .. } => FetchErrorKind::Timeout,
            FetchError::Io { .. } => FetchErrorKind::Io,
            FetchError::Malformed { .. } => FetchErrorKind::Malformed,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            FetchError::NotFound { url }
            | FetchError::Status { url, .. }
            | FetchError::Transport { url, .. }
            | FetchError::Timeout { url, .. }
            | FetchError::Io { url, .. }
            | FetchError::Malformed { url, .. } => url,
        }
    }

    /// Whether a later run could plausibly succeed for the same file.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport { .. } | FetchError::Timeout { .. } => true,
            FetchError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("none of the {attempted} source files could be loaded")]
    NoSources { attempted: usize },
}

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("required column `{0}` is missing from the extracted data")]
    MissingColumn(String),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("column `{column}` does not exist in target table `{table}`")]
    UnknownColumn { table: String, column: String },

    #[error("row {row}, column `{column}`: cannot read {value:?} as {expected}")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
        expected: &'static str,
    },

    #[error("invalid SQL identifier `{0}`")]
    InvalidIdentifier(String),

    #[error("database error while loading `{table}`: {source}")]
    Database {
        table: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl LoadError {
    pub(crate) fn database(
        table: &str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        LoadError::Database {
            table: table.to_string(),
            source: Box::new(source),
        }
    }
}

/// Any error that ends a run in the `Failed` state.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Load(#[from] LoadError),
}
