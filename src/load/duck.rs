// src/load/duck.rs

use duckdb::{params_from_iter, Connection};
use std::path::Path;
use tracing::{debug, warn};

use super::{Dialect, InsertPlan, LoadMode, LoadOptions, TableSink};
use crate::error::LoadError;

/// DuckDB-backed sink, on disk or in memory.
pub struct DuckSink {
    conn: Connection,
}

impl DuckSink {
    /// Open a DuckDB database on disk at `path`, creating the file if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> duckdb::Result<Self> {
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    /// Open a DuckDB in-memory database.
    pub fn open_in_memory() -> duckdb::Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl TableSink for DuckSink {
    fn dialect(&self) -> Dialect {
        Dialect::DuckDb
    }

    async fn execute_ddl(&mut self, sql: &str) -> Result<(), LoadError> {
        self.conn
            .execute_batch(sql)
            .map_err(|e| LoadError::database("<ddl>", e))
    }

    async fn write_all(&mut self, plan: &InsertPlan, opts: &LoadOptions) -> Result<u64, LoadError> {
        let dialect = self.dialect();
        let tx = self
            .conn
            .transaction()
            .map_err(|e| LoadError::database(&plan.table, e))?;

        let result = (|| -> duckdb::Result<u64> {
            if opts.mode == LoadMode::Replace {
                let removed = tx.execute(&format!("DELETE FROM {}", plan.table), [])?;
                debug!(table = %plan.table, removed, "cleared existing rows");
            }
            let mut inserted = 0u64;
            for batch in plan.batches(dialect, opts.rows_per_statement) {
                let sql = plan.insert_sql(dialect, batch.len());
                inserted += tx.execute(&sql, params_from_iter(plan.params(batch)))? as u64;
            }
            Ok(inserted)
        })();

        match result {
            Ok(n) => {
                tx.commit()
                    .map_err(|e| LoadError::database(&plan.table, e))?;
                Ok(n)
            }
            Err(e) => {
                if let Err(rb) = tx.rollback() {
                    warn!(table = %plan.table, error = %rb, "rollback failed");
                }
                Err(LoadError::database(&plan.table, e))
            }
        }
    }

    async fn count_rows(&mut self, table: &str) -> Result<i64, LoadError> {
        self.conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
            .map_err(|e| LoadError::database(table, e))
    }
}
