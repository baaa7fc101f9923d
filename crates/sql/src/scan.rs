//! Chunked scans over an open SQL cursor

use crate::connection::SqlCursor;
use crate::store::decode_row;
use async_trait::async_trait;
use tracing::debug;
use vstore_core::{Record, RecordScan, Resource, Result};

/// [`RecordScan`] over an open SQL cursor
///
/// The cursor is closed as soon as a fetch comes back short, so a scan
/// drained to the end holds nothing open. `close` is still required after
/// an early exit.
pub struct SqlScan {
    cursor: Option<Box<dyn SqlCursor>>,
    resource: Resource,
    chunk_size: usize,
}

impl SqlScan {
    pub(crate) fn new(cursor: Box<dyn SqlCursor>, resource: Resource, chunk_size: usize) -> Self {
        Self {
            cursor: Some(cursor),
            resource,
            chunk_size,
        }
    }
}

#[async_trait]
impl RecordScan for SqlScan {
    async fn next_chunk(&mut self) -> Result<Option<Vec<Record>>> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };
        let rows = cursor.fetch(self.chunk_size).await?;
        if rows.len() < self.chunk_size {
            if let Some(cursor) = self.cursor.take() {
                cursor.close().await?;
            }
        }
        debug!(
            target: "vstore::sql",
            table = self.resource.name(),
            rows = rows.len(),
            "Fetched scan chunk"
        );
        if rows.is_empty() {
            return Ok(None);
        }
        let records = rows
            .into_iter()
            .map(|row| decode_row(&self.resource, row))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Some(records))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        if let Some(cursor) = self.cursor {
            cursor.close().await?;
        }
        Ok(())
    }
}
