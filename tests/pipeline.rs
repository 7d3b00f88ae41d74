use chrono::NaiveDate;
use shopify_etl::{
    dates::DateRange,
    error::{ExtractError, FetchErrorKind, PipelineError},
    fetch::{extract, FetchOptions, UrlTemplate},
    load::{DuckSink, LoadMode, TableSink},
    pipeline::{run, PipelineContext, RunState},
    process::{parse_csv, process_data, TransformRules},
    PipelineConfig, RawConfig,
};
use std::{fs, path::PathBuf};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const TABLE: &str = "shopify_data";

fn init_test_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,shopify_etl=debug")),
        )
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("data")
}

fn input_pattern() -> String {
    format!("{}/test_input_{{}}.csv", data_dir().display())
}

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2019, 4, day).unwrap()
}

fn config(pattern: &str, start: &str, end: &str) -> PipelineConfig {
    let json = serde_json::json!({
        "url_pattern": pattern,
        "db_table_name": TABLE,
        "start_date": start,
        "end_date": end,
    });
    RawConfig::from_json(&json.to_string())
        .unwrap()
        .resolve(d(20))
        .unwrap()
}

fn fixture(name: &str) -> shopify_etl::process::RecordSet {
    parse_csv(&fs::read(data_dir().join(name)).unwrap()).unwrap()
}

#[tokio::test]
async fn extract_matches_merged_fixture() {
    init_test_logging();
    let template = UrlTemplate::parse(&input_pattern()).unwrap();
    let range = DateRange::new(d(1), d(2)).unwrap();
    let (merged, report) = extract(
        &reqwest::Client::new(),
        &template,
        &range,
        &FetchOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(merged, fixture("test_output_merged.csv"));
    assert_eq!(report.loaded.len(), 2);
}

#[tokio::test]
async fn process_matches_transformed_fixture() {
    init_test_logging();
    let template = UrlTemplate::parse(&input_pattern()).unwrap();
    let range = DateRange::new(d(1), d(2)).unwrap();
    let (merged, _) = extract(
        &reqwest::Client::new(),
        &template,
        &range,
        &FetchOptions::default(),
    )
    .await
    .unwrap();

    let transformed = process_data(&merged, &TransformRules::default()).unwrap();
    assert_eq!(transformed, fixture("test_output_transformed.csv"));
}

#[tokio::test]
async fn two_day_run_loads_both_rows() {
    init_test_logging();
    let cfg = config(&input_pattern(), "2019-04-01", "2019-04-02");
    let sink = DuckSink::open_in_memory().unwrap();
    let mut ctx = PipelineContext::new(cfg, sink).unwrap();

    let report = run(&mut ctx).await.unwrap();

    assert_eq!(report.state, RunState::Succeeded);
    assert_eq!(
        report.transitions,
        vec![
            RunState::Idle,
            RunState::Resolving,
            RunState::Extracting,
            RunState::Transforming,
            RunState::Loading,
            RunState::Succeeded,
        ]
    );
    assert_eq!(report.dates.len(), 2);
    assert_eq!(report.rows_extracted, 3);
    assert_eq!(report.rows_transformed, 2);
    assert_eq!(report.rows_loaded, 2);
    assert_eq!(ctx.sink.count_rows(TABLE).await.unwrap(), 2);

    let conn = ctx.sink.connection();
    let flag = |id: &str| -> bool {
        conn.query_row(
            "SELECT has_specific_prefix FROM shopify_data WHERE id = ?",
            duckdb::params![id],
            |r| r.get(0),
        )
        .unwrap()
    };
    assert!(!flag("1"), "shopify_ prefix must not be flagged");
    assert!(flag("2"), "other_ prefix must be flagged");

    let (pinned, metafields, date): (String, i64, String) = conn
        .query_row(
            "SELECT nbrs_pinned_items, CAST(nbr_metafields AS BIGINT), CAST(export_date AS VARCHAR) \
             FROM shopify_data WHERE id = '2'",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .unwrap();
    assert_eq!(pinned, "[]");
    assert_eq!(metafields, 4);
    assert_eq!(date, "2019-04-02");
}

#[tokio::test]
async fn rerun_over_same_window_replaces_rows() {
    init_test_logging();
    let cfg = config(&input_pattern(), "2019-04-01", "2019-04-02");
    let mut ctx = PipelineContext::new(cfg, DuckSink::open_in_memory().unwrap()).unwrap();

    run(&mut ctx).await.unwrap();
    let second = run(&mut ctx).await.unwrap();

    assert_eq!(second.state, RunState::Succeeded);
    assert_eq!(second.rows_loaded, 2);
    assert_eq!(ctx.sink.count_rows(TABLE).await.unwrap(), 2);
}

#[tokio::test]
async fn missing_day_is_skipped() {
    init_test_logging();
    let cfg = config(&input_pattern(), "2019-04-01", "2019-04-03");
    let mut ctx = PipelineContext::new(cfg, DuckSink::open_in_memory().unwrap()).unwrap();

    let report = run(&mut ctx).await.unwrap();

    assert_eq!(report.state, RunState::Succeeded);
    assert_eq!(report.extract.loaded.len(), 2);
    assert_eq!(report.extract.failed.len(), 1);
    assert_eq!(report.extract.failed[0].kind, FetchErrorKind::NotFound);
    assert_eq!(report.extract.failed[0].token.as_str(), "2019-04-03");
    assert_eq!(report.rows_loaded, 2);
}

#[tokio::test]
async fn no_files_fails_the_run() {
    init_test_logging();
    let cfg = config(&input_pattern(), "2019-05-01", "2019-05-02");
    let mut ctx = PipelineContext::new(cfg, DuckSink::open_in_memory().unwrap()).unwrap();

    let err = run(&mut ctx).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Extract(ExtractError::NoSources { attempted: 2 })
    ));
}

#[tokio::test]
async fn failed_load_keeps_previous_contents() {
    init_test_logging();
    let db_dir = tempfile::tempdir().unwrap();
    let db_path = db_dir.path().join("etl.duckdb");

    // first run: the good fixtures
    {
        let cfg = config(&input_pattern(), "2019-04-01", "2019-04-02");
        let mut ctx = PipelineContext::new(cfg, DuckSink::open(&db_path).unwrap()).unwrap();
        run(&mut ctx).await.unwrap();
    }

    // second run: a day whose rows repeat a key
    let src = tempfile::tempdir().unwrap();
    let merged = fs::read_to_string(data_dir().join("test_output_merged.csv")).unwrap();
    let mut lines = merged.lines();
    let header = lines.next().unwrap();
    let first = lines.next().unwrap().replacen("1,", "9,", 1);
    let body = format!("{header}\n{first}\n{first}\n");
    fs::write(src.path().join("day_2019-04-10.csv"), body).unwrap();

    let pattern = format!("{}/day_{{}}.csv", src.path().display());
    let mut cfg = config(&pattern, "2019-04-10", "2019-04-10");
    cfg.load.mode = LoadMode::Replace;
    cfg.load.rows_per_statement = Some(1);
    let mut ctx = PipelineContext::new(cfg, DuckSink::open(&db_path).unwrap()).unwrap();

    let err = run(&mut ctx).await.unwrap_err();
    assert!(matches!(err, PipelineError::Load(_)));

    let ids: Vec<String> = {
        let conn = ctx.sink.connection();
        let mut stmt = conn.prepare("SELECT id FROM shopify_data ORDER BY id").unwrap();
        let rows = stmt.query_map([], |r| r.get(0)).unwrap();
        rows.map(|r| r.unwrap()).collect()
    };
    assert_eq!(ids, vec!["1", "2"]);
}
