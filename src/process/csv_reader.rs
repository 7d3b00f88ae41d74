// src/process/csv_reader.rs

use csv::ReaderBuilder;
use std::collections::HashSet;
use std::io::Cursor;
use tracing::trace;

use super::record_set::{Cell, RecordSet};

/// Field values read as null, matching the usual dataframe reader defaults.
pub const NULL_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

fn to_cell(raw: &str) -> Cell {
    if NULL_MARKERS.contains(&raw) {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Parse comma-separated bytes with a header row into a `RecordSet`.
///
/// Short rows are padded with nulls; a row with more fields than the header,
/// an empty input, or an empty/duplicate header name is an error.
pub fn parse_csv(data: &[u8]) -> Result<RecordSet, String> {
    if data.iter().all(|b| b.is_ascii_whitespace()) {
        return Err("no columns to parse from file".into());
    }

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(Cursor::new(data));

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| format!("reading header row: {e}"))?
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut seen = HashSet::new();
    for (idx, h) in headers.iter().enumerate() {
        if h.is_empty() {
            return Err(format!("header at index {idx} is empty"));
        }
        if !seen.insert(h.as_str()) {
            return Err(format!("duplicate column `{h}`"));
        }
    }

    let width = headers.len();
    let mut out = RecordSet::new(headers);
    for (idx, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| format!("record {idx}: {e}"))?;
        if record.len() > width {
            return Err(format!(
                "record {idx}: expected {width} fields, saw {}",
                record.len()
            ));
        }
        // blank lines come through as a single empty field
        if record.len() == 1 && width > 1 && record.get(0) == Some("") {
            trace!(record = idx, "skipping blank line");
            continue;
        }
        out.push_row(record.iter().map(to_cell).collect());
    }

    Ok(out)
}
