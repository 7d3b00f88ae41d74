// src/load/postgres.rs

use tokio::task::JoinHandle;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error, warn};

use super::{Dialect, InsertPlan, LoadMode, LoadOptions, TableSink};
use crate::error::LoadError;

/// PostgreSQL sink over a single connection.
pub struct PostgresSink {
    client: Client,
    driver: JoinHandle<()>,
}

impl PostgresSink {
    /// Connect with a `postgres://` URL and drive the connection on a background task.
    pub async fn connect(url: &str) -> Result<Self, tokio_postgres::Error> {
        let (client, connection) = tokio_postgres::connect(url, NoTls).await?;
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "postgres connection closed with error");
            }
        });
        Ok(Self { client, driver })
    }
}

impl Drop for PostgresSink {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

impl TableSink for PostgresSink {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn execute_ddl(&mut self, sql: &str) -> Result<(), LoadError> {
        self.client
            .batch_execute(sql)
            .await
            .map_err(|e| LoadError::database("<ddl>", e))
    }

    async fn write_all(&mut self, plan: &InsertPlan, opts: &LoadOptions) -> Result<u64, LoadError> {
        let dialect = self.dialect();
        let tx = self
            .client
            .transaction()
            .await
            .map_err(|e| LoadError::database(&plan.table, e))?;

        let result: Result<u64, tokio_postgres::Error> = async {
            if opts.mode == LoadMode::Replace {
                let removed = tx
                    .execute(format!("DELETE FROM {}", plan.table).as_str(), &[])
                    .await?;
                debug!(table = %plan.table, removed, "cleared existing rows");
            }
            let mut inserted = 0u64;
            for batch in plan.batches(dialect, opts.rows_per_statement) {
                let sql = plan.insert_sql(dialect, batch.len());
                let params: Vec<&(dyn ToSql + Sync)> = plan
                    .params(batch)
                    .into_iter()
                    .map(|p| p as &(dyn ToSql + Sync))
                    .collect();
                inserted += tx.execute(sql.as_str(), &params).await?;
            }
            Ok(inserted)
        }
        .await;

        match result {
            Ok(n) => {
                tx.commit()
                    .await
                    .map_err(|e| LoadError::database(&plan.table, e))?;
                Ok(n)
            }
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    warn!(table = %plan.table, error = %rb, "rollback failed");
                }
                Err(LoadError::database(&plan.table, e))
            }
        }
    }

    async fn count_rows(&mut self, table: &str) -> Result<i64, LoadError> {
        let row = self
            .client
            .query_one(format!("SELECT COUNT(*) FROM {table}").as_str(), &[])
            .await
            .map_err(|e| LoadError::database(table, e))?;
        Ok(row.get(0))
    }
}
