use clickhouse::{Client, Row};
use serde::Serialize;
use tracing::debug;

use crate::error::StoreError;

/// Batch insert cap shared by every bulk-insert path (spec §5: "Batch
/// inserts use ≤ 10 000 rows/statement").
pub const MAX_BATCH_ROWS: usize = 10_000;

/// Thin wrapper around a `clickhouse` client. Every worker crate gets its
/// own `Store` handle (spec §5: "one store connection per worker scope");
/// the underlying `clickhouse::Client` is cheaply cloneable so this is just
/// a `Clone`.
#[derive(Clone)]
pub struct Store {
    pub(crate) client: Client,
}

impl Store {
    pub fn connect(connection_string: &str) -> Self {
        let client = Client::default().with_url(connection_string);
        Self { client }
    }

    pub(crate) async fn insert_batched<T>(&self, table: &str, rows: &[T]) -> Result<(), StoreError>
    where
        T: Row + Serialize,
    {
        for chunk in rows.chunks(MAX_BATCH_ROWS) {
            let mut insert = self.client.insert(table)?;
            for row in chunk {
                insert.write(row).await?;
            }
            insert.end().await?;
            debug!(table, rows = chunk.len(), "bulk insert committed");
        }
        Ok(())
    }
}
