// src/load/mod.rs

pub mod duck;
pub mod postgres;

use serde::Deserialize;
use std::ops::Range;
use tracing::{error, info, instrument};

use crate::error::LoadError;
use crate::process::RecordSet;
use crate::schema::{is_valid_identifier, ColumnKind, TableSchema};

pub use duck::DuckSink;
pub use postgres::PostgresSink;

/// What happens to rows already in the target table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    /// Delete existing rows in the same transaction as the insert.
    #[default]
    Replace,
    Append,
}

impl LoadMode {
    pub fn as_str(&self) -> &str {
        match self {
            LoadMode::Replace => "replace",
            LoadMode::Append => "append",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadOptions {
    pub mode: LoadMode,
    /// Rows per INSERT statement. `None` packs as many rows as the dialect's
    /// parameter limit allows.
    pub rows_per_statement: Option<usize>,
}

/// Placeholder syntax of the connected database.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    DuckDb,
}

impl Dialect {
    /// Bind parameter `n` (1-based) as text and cast it to `kind`.
    pub fn placeholder(&self, n: usize, kind: ColumnKind) -> String {
        match self {
            Dialect::Postgres => format!("CAST(${n}::text AS {})", kind.sql_type()),
            Dialect::DuckDb => format!("CAST(?::VARCHAR AS {})", kind.sql_type()),
        }
    }

    /// Most bind parameters one statement may carry.
    pub fn max_params(&self) -> usize {
        match self {
            Dialect::Postgres => 65_535,
            Dialect::DuckDb => 65_535,
        }
    }
}

/// A record set converted into fixed-order parameter tuples for one table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InsertPlan {
    pub table: String,
    pub columns: Vec<String>,
    pub kinds: Vec<ColumnKind>,
    /// One tuple per row, in record set column order.
    pub rows: Vec<Vec<Option<String>>>,
}

impl InsertPlan {
    /// Check every column against `schema` and read every cell as its
    /// column's kind. Nothing touches the database here.
    pub fn build(table: &str, data: &RecordSet, schema: &TableSchema) -> Result<Self, LoadError> {
        if !is_valid_identifier(table) {
            return Err(LoadError::InvalidIdentifier(table.to_string()));
        }

        let mut kinds = Vec::with_capacity(data.columns().len());
        for name in data.columns() {
            let col = schema.column(name).ok_or_else(|| LoadError::UnknownColumn {
                table: table.to_string(),
                column: name.clone(),
            })?;
            kinds.push(col.kind);
        }

        let mut rows = Vec::with_capacity(data.len());
        for (row_idx, row) in data.rows().iter().enumerate() {
            let mut tuple = Vec::with_capacity(kinds.len());
            for ((cell, kind), name) in row.iter().zip(&kinds).zip(data.columns()) {
                let value = kind
                    .parse(cell.as_deref())
                    .ok_or_else(|| LoadError::InvalidValue {
                        row: row_idx,
                        column: name.clone(),
                        value: cell.clone().unwrap_or_default(),
                        expected: kind.name(),
                    })?;
                tuple.push(value.to_param());
            }
            rows.push(tuple);
        }

        Ok(Self {
            table: table.to_string(),
            columns: data.columns().to_vec(),
            kinds,
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row ranges, one per INSERT statement.
    pub fn batches(&self, dialect: Dialect, rows_per_statement: Option<usize>) -> Vec<Range<usize>> {
        let width = self.columns.len().max(1);
        let limit = (dialect.max_params() / width).max(1);
        let step = rows_per_statement.unwrap_or(limit).clamp(1, limit);
        (0..self.rows.len())
            .step_by(step)
            .map(|start| start..(start + step).min(self.rows.len()))
            .collect()
    }

    /// `INSERT INTO table(cols) VALUES (..),(..)` for `rows` tuples.
    pub fn insert_sql(&self, dialect: Dialect, rows: usize) -> String {
        let width = self.columns.len();
        let tuples: Vec<String> = (0..rows)
            .map(|r| {
                let params: Vec<String> = self
                    .kinds
                    .iter()
                    .enumerate()
                    .map(|(c, kind)| dialect.placeholder(r * width + c + 1, *kind))
                    .collect();
                format!("({})", params.join(", "))
            })
            .collect();
        format!(
            "INSERT INTO {}({}) VALUES {}",
            self.table,
            self.columns.join(","),
            tuples.join(", ")
        )
    }

    /// Flattened parameters for a batch, row-major.
    pub fn params(&self, batch: Range<usize>) -> Vec<&Option<String>> {
        self.rows[batch].iter().flatten().collect()
    }
}

/// A database connection able to run a whole load in one transaction.
#[allow(async_fn_in_trait)]
pub trait TableSink {
    fn dialect(&self) -> Dialect;

    /// Run schema statements (table provisioning).
    async fn execute_ddl(&mut self, sql: &str) -> Result<(), LoadError>;

    /// Insert every row of `plan` atomically: commit all of it, or roll back
    /// and leave the table as it was.
    async fn write_all(&mut self, plan: &InsertPlan, opts: &LoadOptions) -> Result<u64, LoadError>;

    async fn count_rows(&mut self, table: &str) -> Result<i64, LoadError>;
}

/// Create `table` from `schema` unless it already exists.
pub async fn ensure_table<S: TableSink>(
    sink: &mut S,
    table: &str,
    schema: &TableSchema,
) -> Result<(), LoadError> {
    let sql = schema
        .create_table_sql(table)
        .ok_or_else(|| LoadError::InvalidIdentifier(table.to_string()))?;
    sink.execute_ddl(&sql).await?;
    info!(table, "target table ready");
    Ok(())
}

/// Bulk-insert `data` into `table` inside one transaction.
#[instrument(level = "info", skip(sink, data, schema, opts), fields(rows = data.len(), mode = opts.mode.as_str()))]
pub async fn load_data<S: TableSink>(
    sink: &mut S,
    data: &RecordSet,
    table: &str,
    schema: &TableSchema,
    opts: &LoadOptions,
) -> Result<u64, LoadError> {
    let plan = InsertPlan::build(table, data, schema).map_err(|e| {
        error!(error = %e, "could not prepare rows for insert");
        e
    })?;

    match sink.write_all(&plan, opts).await {
        Ok(n) => {
            info!(table, rows = n, "The dataframe was successfully inserted");
            Ok(n)
        }
        Err(e) => {
            error!(table, error = %e, "insert failed; transaction rolled back");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> RecordSet {
        RecordSet::from_rows(
            vec!["id".into(), "showing_logo".into(), "nbr_merchandised_queries".into()],
            vec![
                vec![Some("a".into()), Some("True".into()), Some("3.0".into())],
                vec![Some("b".into()), None, Some("4".into())],
                vec![Some("c".into()), Some("False".into()), None],
            ],
        )
    }

    #[test]
    fn plan_converts_cells_in_column_order() {
        let plan = InsertPlan::build("shopify_data", &data(), &TableSchema::shopify_data()).unwrap();
        assert_eq!(plan.columns, vec!["id", "showing_logo", "nbr_merchandised_queries"]);
        assert_eq!(
            plan.rows[0],
            vec![Some("a".into()), Some("true".into()), Some("3".into())]
        );
        assert_eq!(plan.rows[1][1], None);
    }

    #[test]
    fn plan_rejects_unknown_columns_and_bad_values() {
        let schema = TableSchema::shopify_data();
        let rs = RecordSet::from_rows(vec!["nope".into()], vec![]);
        assert!(matches!(
            InsertPlan::build("t", &rs, &schema),
            Err(LoadError::UnknownColumn { .. })
        ));

        let rs = RecordSet::from_rows(
            vec!["showing_logo".into()],
            vec![vec![Some("x".into())]],
        );
        assert!(matches!(
            InsertPlan::build("t", &rs, &schema),
            Err(LoadError::InvalidValue { row: 0, .. })
        ));

        assert!(matches!(
            InsertPlan::build("t; drop table t", &data(), &schema),
            Err(LoadError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn postgres_sql_numbers_parameters_across_rows() {
        let plan = InsertPlan::build("shopify_data", &data(), &TableSchema::shopify_data()).unwrap();
        let sql = plan.insert_sql(Dialect::Postgres, 2);
        assert_eq!(
            sql,
            "INSERT INTO shopify_data(id,showing_logo,nbr_merchandised_queries) VALUES \
             (CAST($1::text AS VARCHAR), CAST($2::text AS BOOLEAN), CAST($3::text AS INTEGER)), \
             (CAST($4::text AS VARCHAR), CAST($5::text AS BOOLEAN), CAST($6::text AS INTEGER))"
        );
        assert_eq!(plan.params(0..2).len(), 6);
    }

    #[test]
    fn batches_respect_parameter_limit() {
        let plan = InsertPlan::build("t", &data(), &TableSchema::shopify_data()).unwrap();
        assert_eq!(plan.batches(Dialect::Postgres, None), vec![0..3]);
        assert_eq!(plan.batches(Dialect::Postgres, Some(2)), vec![0..2, 2..3]);
        assert_eq!(plan.batches(Dialect::DuckDb, Some(0)), vec![0..1, 1..2, 2..3]);

        let empty = InsertPlan::build("t", &RecordSet::new(vec!["id".into()]), &TableSchema::shopify_data())
            .unwrap();
        assert!(empty.batches(Dialect::Postgres, None).is_empty());
    }
}
