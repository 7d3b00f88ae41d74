// src/pipeline.rs

use reqwest::Client;
use std::time::Instant;
use tracing::{error, info, instrument};

use crate::config::PipelineConfig;
use crate::dates::{fill_date_range, DateToken};
use crate::error::PipelineError;
use crate::fetch::{build_client, extract, ExtractReport};
use crate::load::{ensure_table, load_data, TableSink};
use crate::process::{process_data, TransformRules};
use crate::schema::TableSchema;

/// Where a run currently is. `Succeeded` and `Failed` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RunState {
    Idle,
    Resolving,
    Extracting,
    Transforming,
    Loading,
    Succeeded,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &str {
        match self {
            RunState::Idle => "idle",
            RunState::Resolving => "resolving",
            RunState::Extracting => "extracting",
            RunState::Transforming => "transforming",
            RunState::Loading => "loading",
            RunState::Succeeded => "succeeded",
            RunState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Failed)
    }
}

/// Everything one run needs, built once up front and handed to each stage.
pub struct PipelineContext<S> {
    pub config: PipelineConfig,
    pub client: Client,
    pub sink: S,
    pub schema: TableSchema,
    pub rules: TransformRules,
}

impl<S: TableSink> PipelineContext<S> {
    pub fn new(config: PipelineConfig, sink: S) -> reqwest::Result<Self> {
        let client = build_client(&config.fetch)?;
        Ok(Self::with_client(config, client, sink))
    }

    pub fn with_client(config: PipelineConfig, client: Client, sink: S) -> Self {
        Self {
            config,
            client,
            sink,
            schema: TableSchema::shopify_data(),
            rules: TransformRules::default(),
        }
    }
}

/// What a run did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    pub state: RunState,
    /// Every state entered, in order.
    pub transitions: Vec<RunState>,
    pub dates: Vec<DateToken>,
    pub extract: ExtractReport,
    pub rows_extracted: usize,
    pub rows_transformed: usize,
    pub rows_loaded: u64,
}

impl RunReport {
    fn new() -> Self {
        Self {
            state: RunState::Idle,
            transitions: vec![RunState::Idle],
            dates: Vec::new(),
            extract: ExtractReport::default(),
            rows_extracted: 0,
            rows_transformed: 0,
            rows_loaded: 0,
        }
    }

    fn enter(&mut self, next: RunState) {
        info!(from = self.state.as_str(), to = next.as_str(), "run state");
        self.state = next;
        self.transitions.push(next);
    }
}

/// Resolve → extract → transform → load, once.
#[instrument(level = "info", skip_all, fields(table = %ctx.config.table))]
pub async fn run<S: TableSink>(ctx: &mut PipelineContext<S>) -> Result<RunReport, PipelineError> {
    let started = Instant::now();
    let mut report = RunReport::new();

    match run_stages(ctx, &mut report).await {
        Ok(()) => {
            report.enter(RunState::Succeeded);
            info!(
                rows_loaded = report.rows_loaded,
                files_loaded = report.extract.loaded.len(),
                files_skipped = report.extract.failed.len(),
                elapsed = ?started.elapsed(),
                "run succeeded"
            );
            Ok(report)
        }
        Err(e) => {
            let stage = report.state;
            report.enter(RunState::Failed);
            error!(stage = stage.as_str(), error = %e, elapsed = ?started.elapsed(), "run failed");
            Err(e)
        }
    }
}

async fn run_stages<S: TableSink>(
    ctx: &mut PipelineContext<S>,
    report: &mut RunReport,
) -> Result<(), PipelineError> {
    report.enter(RunState::Resolving);
    report.dates = fill_date_range(&ctx.config.range);

    report.enter(RunState::Extracting);
    let (raw, extract_report) = extract(
        &ctx.client,
        &ctx.config.template,
        &ctx.config.range,
        &ctx.config.fetch,
    )
    .await?;
    report.extract = extract_report;
    report.rows_extracted = raw.len();

    report.enter(RunState::Transforming);
    let transformed = process_data(&raw, &ctx.rules)?;
    report.rows_transformed = transformed.len();

    report.enter(RunState::Loading);
    if ctx.config.create_table {
        ensure_table(&mut ctx.sink, &ctx.config.table, &ctx.schema).await?;
    }
    report.rows_loaded = load_data(
        &mut ctx.sink,
        &transformed,
        &ctx.config.table,
        &ctx.schema,
        &ctx.config.load,
    )
    .await?;
    Ok(())
}
