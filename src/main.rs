use anyhow::{Context, Result};
use chrono::Local;
use shopify_etl::{
    config::{DatabaseTarget, RawConfig},
    load::{DuckSink, PostgresSink, TableSink},
    pipeline::{self, PipelineContext},
    ConfigError, PipelineConfig,
};
use std::{env, path::PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

async fn run_with<S: TableSink>(config: PipelineConfig, sink: S) -> Result<()> {
    let mut ctx = PipelineContext::new(config, sink).context("building HTTP client")?;
    let report = pipeline::run(&mut ctx).await?;
    info!(
        dates = report.dates.len(),
        rows_extracted = report.rows_extracted,
        rows_loaded = report.rows_loaded,
        "done"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(filter).init();
    info!("startup");

    // ─── 2) resolve configuration ────────────────────────────────────
    let path = env::args_os().nth(1).map(PathBuf::from);
    let config = RawConfig::from_env(path)?.resolve(Local::now().date_naive())?;
    info!(
        pattern = config.template.pattern(),
        start = %config.range.start(),
        end = %config.range.end(),
        table = %config.table,
        "configured"
    );

    // ─── 3) open the connection and run once ─────────────────────────
    let target = config
        .database
        .clone()
        .ok_or(ConfigError::MissingKey("database_url"))?;
    match target {
        DatabaseTarget::Postgres(url) => {
            let sink = PostgresSink::connect(&url)
                .await
                .context("connecting to postgres")?;
            run_with(config, sink).await
        }
        DatabaseTarget::DuckDb(path) => {
            let sink = DuckSink::open(&path)
                .with_context(|| format!("opening duckdb at {}", path.display()))?;
            run_with(config, sink).await
        }
        DatabaseTarget::DuckDbMemory => {
            let sink = DuckSink::open_in_memory().context("opening in-memory duckdb")?;
            run_with(config, sink).await
        }
    }
}
