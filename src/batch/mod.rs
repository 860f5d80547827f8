//! Chunked row writes.
//!
//! Chunks are written one after another, never concurrently, so the write
//! budget of the rate limiter stays accurate and rows land in input order.

use tracing::instrument;

use crate::errors::{CodaError, CodaResult};
use crate::services::{MutationsService, RowsService, WaitOptions};
use crate::types::{MutationStatus, RowEdit};

/// Default number of rows per write call.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Options for [`BatchWriter::insert_rows`].
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Rows per write call. Zero is treated as one.
    pub chunk_size: usize,
    /// Wait for each chunk's mutation to finish before sending the next.
    pub wait_for_completion: bool,
    /// Polling options used when waiting.
    pub wait: WaitOptions,
    /// Columns that identify existing rows to update instead of insert.
    pub key_columns: Option<Vec<String>>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            wait_for_completion: false,
            wait: WaitOptions::default(),
            key_columns: None,
        }
    }
}

impl BatchOptions {
    /// Sets the chunk size.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Waits for every chunk using `wait`.
    pub fn wait_for_completion(mut self, wait: WaitOptions) -> Self {
        self.wait_for_completion = true;
        self.wait = wait;
        self
    }

    /// Upserts on the given key columns.
    pub fn key_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }
}

/// Outcome of a batch write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    /// Ids of inserted rows across all chunks.
    pub row_ids: Vec<String>,
    /// Request id of each chunk's mutation, in order.
    pub request_ids: Vec<String>,
    /// Number of chunks written.
    pub chunks: usize,
}

/// Writes rows to a table in sequential chunks.
#[derive(Debug, Clone)]
pub struct BatchWriter {
    rows: RowsService,
    mutations: MutationsService,
}

impl BatchWriter {
    /// Creates a batch writer.
    pub fn new(rows: RowsService, mutations: MutationsService) -> Self {
        Self { rows, mutations }
    }

    /// Transforms `items` into rows and inserts them chunk by chunk.
    ///
    /// When waiting is enabled, a chunk whose mutation fails aborts the batch
    /// with [`CodaError::MutationFailed`]; chunks already written stay
    /// written.
    #[instrument(skip(self, items, transform, options), fields(chunk_size = options.chunk_size))]
    pub async fn insert_rows<T, I, F>(
        &self,
        doc_id: &str,
        table_id: &str,
        items: I,
        transform: F,
        options: &BatchOptions,
    ) -> CodaResult<BatchResult>
    where
        I: IntoIterator<Item = T>,
        F: FnMut(T) -> RowEdit,
    {
        let rows: Vec<RowEdit> = items.into_iter().map(transform).collect();
        let chunk_size = options.chunk_size.max(1);
        let total = rows.len().div_ceil(chunk_size);
        let mut result = BatchResult::default();

        for (index, chunk) in rows.chunks(chunk_size).enumerate() {
            let accepted = self
                .rows
                .insert(doc_id, table_id, chunk.to_vec(), options.key_columns.clone())
                .await?;

            tracing::debug!(
                chunk = index + 1,
                total,
                request_id = %accepted.request_id,
                "Batch chunk accepted"
            );

            if options.wait_for_completion {
                let handle = self
                    .mutations
                    .wait_for_mutation(&accepted.request_id, options.wait)
                    .await?;
                if handle.status == MutationStatus::Failed {
                    return Err(CodaError::MutationFailed {
                        request_id: handle.request_id,
                        message: format!(
                            "batch chunk {} of {} failed: {}",
                            index + 1,
                            total,
                            handle.error.as_deref().unwrap_or("unknown error")
                        ),
                    });
                }
            }

            result.row_ids.extend(accepted.added_row_ids);
            result.request_ids.push(accepted.request_id);
            result.chunks += 1;
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{fixtures, mock_client, MockResponse, MockTransport};
    use crate::transport::HttpMethod;
    use serde_json::json;
    use std::sync::Arc;

    fn accepted(request_id: &str, ids: &[&str]) -> MockResponse {
        MockResponse::json(&json!({"requestId": request_id, "addedRowIds": ids})).with_status(202)
    }

    fn to_row(name: &str) -> RowEdit {
        RowEdit::default().cell("Name", name)
    }

    #[tokio::test]
    async fn test_rows_are_chunked_in_order() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(accepted("req-1", &["i-1", "i-2"]));
        transport.queue(accepted("req-2", &["i-3", "i-4"]));
        transport.queue(accepted("req-3", &["i-5"]));
        let client = mock_client(Arc::clone(&transport)).unwrap();

        let names = ["a", "b", "c", "d", "e"];
        let result = client
            .rows()
            .batch()
            .insert_rows(
                "d1",
                "t1",
                names,
                to_row,
                &BatchOptions::default().chunk_size(2).key_columns(["Name"]),
            )
            .await
            .unwrap();

        assert_eq!(result.chunks, 3);
        assert_eq!(result.request_ids, vec!["req-1", "req-2", "req-3"]);
        assert_eq!(result.row_ids, vec!["i-1", "i-2", "i-3", "i-4", "i-5"]);

        let requests = transport.requests();
        assert!(requests.iter().all(|r| r.method == HttpMethod::Post));
        let last = requests[2].body_json().unwrap();
        assert_eq!(last["rows"].as_array().map(Vec::len), Some(1));
        assert_eq!(last["keyColumns"], json!(["Name"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_chunk_aborts_batch() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(accepted("req-1", &["i-1"]));
        transport.queue_json(&fixtures::mutation_status("complete", None));
        transport.queue(accepted("req-2", &["i-2"]));
        transport.queue_json(&fixtures::mutation_status("failed", Some("Quota exceeded")));
        let client = mock_client(Arc::clone(&transport)).unwrap();

        let err = client
            .rows()
            .batch()
            .insert_rows(
                "d1",
                "t1",
                ["a", "b", "c"],
                to_row,
                &BatchOptions::default()
                    .chunk_size(1)
                    .wait_for_completion(WaitOptions::default()),
            )
            .await
            .unwrap_err();

        match err {
            CodaError::MutationFailed {
                request_id,
                message,
            } => {
                assert_eq!(request_id, "req-2");
                assert!(message.contains("chunk 2 of 3"));
                assert!(message.contains("Quota exceeded"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // The third chunk is never sent.
        assert_eq!(transport.request_count(), 4);
    }

    #[tokio::test]
    async fn test_empty_input_writes_nothing() {
        let transport = Arc::new(MockTransport::new());
        let client = mock_client(Arc::clone(&transport)).unwrap();

        let result = client
            .rows()
            .batch()
            .insert_rows("d1", "t1", Vec::<&str>::new(), to_row, &BatchOptions::default())
            .await
            .unwrap();

        assert_eq!(result, BatchResult::default());
        assert_eq!(transport.request_count(), 0);
    }
}
