// src/fetch/mod.rs

pub mod source;
pub mod urls;

use reqwest::Client;
use std::{io, sync::Arc, time::Duration};
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use crate::dates::{fill_date_range, DateRange, DateToken};
use crate::error::{ExtractError, FetchError, FetchErrorKind};
use crate::process::{concat, RecordSet};

pub use source::fetch_table;
pub use urls::{SourceKind, SourceUrl, UrlTemplate};

pub const DEFAULT_FETCH_CONCURRENCY: usize = 4;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchOptions {
    /// Upper bound on in-flight fetches. Results are still merged in date order.
    pub concurrency: usize,
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_FETCH_CONCURRENCY,
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

/// Build the shared HTTP client for a run.
pub fn build_client(opts: &FetchOptions) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(opts.timeout)
        .timeout(opts.timeout)
        .build()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadedSource {
    pub token: DateToken,
    pub url: String,
    pub rows: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedSource {
    pub token: DateToken,
    pub url: String,
    pub kind: FetchErrorKind,
    pub transient: bool,
    pub message: String,
}

/// Per-file outcome of an extraction, in date order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub loaded: Vec<LoadedSource>,
    pub failed: Vec<FailedSource>,
}

impl ExtractReport {
    pub fn attempted(&self) -> usize {
        self.loaded.len() + self.failed.len()
    }
}

/// Fetch one file per day of `range` and stack the successful ones.
///
/// A day whose file cannot be fetched or parsed is logged and skipped. The
/// run only fails when no file at all could be loaded.
#[instrument(
    level = "info",
    skip(client, template, opts),
    fields(pattern = template.pattern(), start = %range.start(), end = %range.end())
)]
pub async fn extract(
    client: &Client,
    template: &UrlTemplate,
    range: &DateRange,
    opts: &FetchOptions,
) -> Result<(RecordSet, ExtractReport), ExtractError> {
    let tokens = fill_date_range(range);
    let timeout = opts.timeout;

    let sem = Arc::new(Semaphore::new(opts.concurrency.max(1)));
    let mut handles = Vec::with_capacity(tokens.len());
    for token in tokens {
        let client = client.clone();
        let source = template.render(&token);
        let sem = sem.clone();
        let task_source = source.clone();
        let handle = tokio::spawn(async move {
            let _permit = sem.acquire().await;
            fetch_table(&client, &task_source, timeout).await
        });
        handles.push((token, source, handle));
    }

    // awaiting the handles in spawn order keeps the merge in date order
    let mut outcomes = Vec::with_capacity(handles.len());
    for (token, source, handle) in handles {
        let result = handle.await.unwrap_or_else(|e| {
            Err(FetchError::Io {
                url: source.to_string(),
                source: io::Error::other(e.to_string()),
            })
        });
        outcomes.push((token, source, result));
    }

    let mut report = ExtractReport::default();
    let mut tables = Vec::with_capacity(outcomes.len());
    for (token, source, result) in outcomes {
        let url = source.to_string();
        match result {
            Ok(table) => {
                info!(%url, rows = table.len(), "The following file was successfully loaded");
                report.loaded.push(LoadedSource {
                    token,
                    url,
                    rows: table.len(),
                });
                tables.push(table);
            }
            Err(err) => {
                warn!(
                    %url,
                    kind = err.kind().as_str(),
                    transient = err.is_transient(),
                    error = %err,
                    "The following file could not be loaded"
                );
                report.failed.push(FailedSource {
                    token,
                    url,
                    kind: err.kind(),
                    transient: err.is_transient(),
                    message: err.to_string(),
                });
            }
        }
    }

    let merged = concat(tables).ok_or(ExtractError::NoSources {
        attempted: report.attempted(),
    })?;
    info!(
        files = report.loaded.len(),
        skipped = report.failed.len(),
        rows = merged.len(),
        "extract complete"
    );
    Ok((merged, report))
}
