// src/config.rs

use chrono::NaiveDate;
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::dates::{parse_date, DateRange};
use crate::error::ConfigError;
use crate::fetch::{FetchOptions, UrlTemplate, DEFAULT_FETCH_CONCURRENCY};
use crate::load::{LoadMode, LoadOptions};
use crate::schema::is_valid_identifier;

/// Inline JSON configuration document.
pub const CONFIG_ENV: &str = "SHOPIFY_PIPELINE_CONFIG";
/// Path to a JSON or YAML configuration file.
pub const CONFIG_FILE_ENV: &str = "SHOPIFY_PIPELINE_CONFIG_FILE";
/// Overrides `database_url` from the document.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// The configuration document as written, before validation.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub url_pattern: Option<String>,
    pub db_table_name: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub database_url: Option<String>,
    pub fetch_concurrency: Option<usize>,
    pub fetch_timeout_secs: Option<u64>,
    pub load_mode: Option<LoadMode>,
    pub rows_per_statement: Option<usize>,
    pub create_table: Option<bool>,
}

impl RawConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read a `.yaml`/`.yml` or JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&text),
            _ => Self::from_json(&text),
        }
    }

    /// Locate the document: an explicit `path`, else `SHOPIFY_PIPELINE_CONFIG_FILE`,
    /// else inline JSON in `SHOPIFY_PIPELINE_CONFIG`. `DATABASE_URL` wins over
    /// the document's `database_url`.
    pub fn from_env(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut raw = match path.or_else(|| env::var_os(CONFIG_FILE_ENV).map(PathBuf::from)) {
            Some(p) => Self::from_file(p)?,
            None => {
                let inline = env::var(CONFIG_ENV).map_err(|_| ConfigError::MissingKey(CONFIG_ENV))?;
                Self::from_json(&inline)?
            }
        };
        if let Ok(url) = env::var(DATABASE_URL_ENV) {
            raw.database_url = Some(url);
        }
        Ok(raw)
    }

    /// Validate everything a run needs, with "yesterday" taken relative to `today`.
    pub fn resolve(self, today: NaiveDate) -> Result<PipelineConfig, ConfigError> {
        let pattern = self
            .url_pattern
            .ok_or(ConfigError::MissingKey("url_pattern"))?;
        let template = UrlTemplate::parse(&pattern)?;

        let table = self
            .db_table_name
            .ok_or(ConfigError::MissingKey("db_table_name"))?;
        if !is_valid_identifier(&table) {
            return Err(ConfigError::InvalidTableName(table));
        }

        let start = self.start_date.as_deref().map(parse_date).transpose()?;
        let end = self.end_date.as_deref().map(parse_date).transpose()?;
        let range = DateRange::resolve(start, end, today)?;

        let concurrency = self.fetch_concurrency.unwrap_or(DEFAULT_FETCH_CONCURRENCY);
        if concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                key: "fetch_concurrency",
                reason: "must be at least 1".into(),
            });
        }
        let timeout = match self.fetch_timeout_secs {
            Some(0) => {
                return Err(ConfigError::InvalidValue {
                    key: "fetch_timeout_secs",
                    reason: "must be at least 1".into(),
                })
            }
            Some(secs) => Duration::from_secs(secs),
            None => FetchOptions::default().timeout,
        };

        let database = self
            .database_url
            .as_deref()
            .map(DatabaseTarget::parse)
            .transpose()?;

        Ok(PipelineConfig {
            template,
            range,
            table,
            database,
            fetch: FetchOptions {
                concurrency,
                timeout,
            },
            load: LoadOptions {
                mode: self.load_mode.unwrap_or_default(),
                rows_per_statement: self.rows_per_statement,
            },
            create_table: self.create_table.unwrap_or(true),
        })
    }
}

/// Where the rows go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    Postgres(String),
    DuckDb(PathBuf),
    DuckDbMemory,
}

impl DatabaseTarget {
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let url = url.trim();
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            return Ok(DatabaseTarget::Postgres(url.to_string()));
        }
        if url == "duckdb::memory:" || url == "duckdb://:memory:" {
            return Ok(DatabaseTarget::DuckDbMemory);
        }
        match url.strip_prefix("duckdb://") {
            Some(path) if !path.is_empty() => Ok(DatabaseTarget::DuckDb(PathBuf::from(path))),
            _ => Err(ConfigError::UnsupportedDatabase(url.to_string())),
        }
    }
}

/// Validated configuration for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub template: UrlTemplate,
    pub range: DateRange,
    pub table: String,
    pub database: Option<DatabaseTarget>,
    pub fetch: FetchOptions,
    pub load: LoadOptions,
    pub create_table: bool,
}
