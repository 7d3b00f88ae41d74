// src/process/transform.rs

use tracing::{info, instrument};

use super::record_set::RecordSet;
use crate::error::TransformError;

/// Business rules applied to the merged extract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransformRules {
    /// Rows with a null or empty value here are dropped.
    pub id_column: String,
    /// Column compared against `reference_prefix`.
    pub prefix_column: String,
    pub reference_prefix: String,
    /// Derived boolean column name.
    pub flag_column: String,
}

impl Default for TransformRules {
    fn default() -> Self {
        Self {
            id_column: "application_id".into(),
            prefix_column: "index_prefix".into(),
            reference_prefix: "shopify_".into(),
            flag_column: "has_specific_prefix".into(),
        }
    }
}

/// Keep only rows whose `id_column` is present and non-empty.
pub fn filter_rows(input: &RecordSet, rules: &TransformRules) -> Result<RecordSet, TransformError> {
    let idx = input
        .column_index(&rules.id_column)
        .ok_or_else(|| TransformError::MissingColumn(rules.id_column.clone()))?;
    let mut out = input.clone();
    out.retain_rows(|row| matches!(&row[idx], Some(v) if !v.is_empty()));
    Ok(out)
}

/// Filter, then derive the prefix flag: `"false"` when the prefix equals the
/// reference exactly, `"true"` otherwise (null included).
#[instrument(level = "info", skip_all, fields(rows_in = input.len()))]
pub fn process_data(input: &RecordSet, rules: &TransformRules) -> Result<RecordSet, TransformError> {
    let prefix_idx = input
        .column_index(&rules.prefix_column)
        .ok_or_else(|| TransformError::MissingColumn(rules.prefix_column.clone()))?;

    let mut out = filter_rows(input, rules)?;
    let reference = rules.reference_prefix.as_str();
    out.set_column(&rules.flag_column, |row| {
        let differs = row[prefix_idx].as_deref() != Some(reference);
        Some(differs.to_string())
    });

    info!(
        rows_kept = out.len(),
        rows_dropped = input.len() - out.len(),
        "transformed extract"
    );
    Ok(out)
}
