//! Rows service.

use futures::Stream;
use std::sync::Arc;
use tracing::instrument;

use crate::batch::BatchWriter;
use crate::client::{CallDescriptor, RequestExecutor};
use crate::errors::{CodaError, CodaResult};
use crate::pagination::{self, paginate, Page};
use crate::types::{
    CellEdit, CellValue, DeleteRowsRequest, InsertRowsRequest, ListRowsParams, MutationAccepted,
    Row, RowEdit, UpdateRowRequest, UpsertAction, UpsertOutcome,
};

use super::MutationsService;

/// Column ids are prefixed with `c-`; anything else is treated as a name.
fn is_column_id(column: &str) -> bool {
    column.starts_with("c-")
}

/// Whether a row listing may be served from the response cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Freshness {
    Cached,
    Live,
}

/// Reads, writes and searches table rows.
#[derive(Debug, Clone)]
pub struct RowsService {
    executor: Arc<RequestExecutor>,
}

impl RowsService {
    /// Creates a new rows service.
    pub fn new(executor: Arc<RequestExecutor>) -> Self {
        Self { executor }
    }

    /// Lists one page of rows.
    #[instrument(skip(self, params))]
    pub async fn list(
        &self,
        doc_id: &str,
        table_id: &str,
        params: &ListRowsParams,
    ) -> CodaResult<Page<Row>> {
        self.fetch_page(doc_id, table_id, params, Freshness::Cached)
            .await
    }

    /// Streams every row matching `params`, following page tokens.
    pub fn stream<'a>(
        &'a self,
        doc_id: &'a str,
        table_id: &'a str,
        params: ListRowsParams,
    ) -> impl Stream<Item = CodaResult<Row>> + 'a {
        self.pages(doc_id, table_id, params, Freshness::Cached)
    }

    async fn fetch_page(
        &self,
        doc_id: &str,
        table_id: &str,
        params: &ListRowsParams,
        freshness: Freshness,
    ) -> CodaResult<Page<Row>> {
        let mut descriptor =
            CallDescriptor::get(["docs", doc_id, "tables", table_id, "rows"]).with_query(params)?;
        if freshness == Freshness::Live {
            descriptor = descriptor.no_cache();
        }
        self.executor.execute(&descriptor).await
    }

    fn pages<'a>(
        &'a self,
        doc_id: &'a str,
        table_id: &'a str,
        params: ListRowsParams,
        freshness: Freshness,
    ) -> impl Stream<Item = CodaResult<Row>> + 'a {
        paginate(move |page_token| {
            let params = ListRowsParams {
                page_token,
                ..params.clone()
            };
            async move {
                self.fetch_page(doc_id, table_id, &params, freshness)
                    .await
            }
        })
    }

    /// Gets a row by id or name.
    #[instrument(skip(self))]
    pub async fn get(&self, doc_id: &str, table_id: &str, row_id: &str) -> CodaResult<Row> {
        self.executor
            .execute(&CallDescriptor::get([
                "docs", doc_id, "tables", table_id, "rows", row_id,
            ]))
            .await
    }

    /// Inserts rows, or updates rows matching `key_columns` when given.
    #[instrument(skip(self, rows, key_columns), fields(row_count = rows.len()))]
    pub async fn insert(
        &self,
        doc_id: &str,
        table_id: &str,
        rows: Vec<RowEdit>,
        key_columns: Option<Vec<String>>,
    ) -> CodaResult<MutationAccepted> {
        let body = InsertRowsRequest { rows, key_columns };
        let descriptor =
            CallDescriptor::post(["docs", doc_id, "tables", table_id, "rows"]).with_body(&body)?;
        self.executor.execute(&descriptor).await
    }

    /// Replaces the given cells of a row.
    #[instrument(skip(self, row))]
    pub async fn update(
        &self,
        doc_id: &str,
        table_id: &str,
        row_id: &str,
        row: RowEdit,
    ) -> CodaResult<MutationAccepted> {
        let descriptor = CallDescriptor::put(["docs", doc_id, "tables", table_id, "rows", row_id])
            .with_body(&UpdateRowRequest { row })?;
        self.executor.execute(&descriptor).await
    }

    /// Deletes a row.
    #[instrument(skip(self))]
    pub async fn delete(
        &self,
        doc_id: &str,
        table_id: &str,
        row_id: &str,
    ) -> CodaResult<MutationAccepted> {
        let descriptor =
            CallDescriptor::delete(["docs", doc_id, "tables", table_id, "rows", row_id]);
        self.executor.execute(&descriptor).await
    }

    /// Deletes several rows in one call.
    #[instrument(skip(self, row_ids), fields(row_count = row_ids.len()))]
    pub async fn delete_many(
        &self,
        doc_id: &str,
        table_id: &str,
        row_ids: Vec<String>,
    ) -> CodaResult<MutationAccepted> {
        let descriptor = CallDescriptor::delete(["docs", doc_id, "tables", table_id, "rows"])
            .with_body(&DeleteRowsRequest { row_ids })?;
        self.executor.execute(&descriptor).await
    }

    /// Finds up to `limit` rows whose `column` equals `value`.
    ///
    /// `column` may be a column id (`c-...`) or a column name. The server
    /// filter narrows the listing and every row is checked again locally.
    /// Listings are always fetched live, never from the response cache.
    #[instrument(skip(self, value))]
    pub async fn find(
        &self,
        doc_id: &str,
        table_id: &str,
        column: &str,
        value: &CellValue,
        limit: usize,
    ) -> CodaResult<Vec<Row>> {
        let params = ListRowsParams {
            query: Some(format!("{}:{}", column, serde_json::to_string(value)?)),
            use_column_names: Some(!is_column_id(column)),
            ..Default::default()
        };
        let rows = self.pages(doc_id, table_id, params, Freshness::Live);
        pagination::find(rows, limit, |row| {
            row.cell(column).is_some_and(|cell| cell.same_value(value))
        })
        .await
    }

    /// Updates the row whose `key_column` equals `key_value`, or inserts a
    /// new row seeded with that key when none exists.
    #[instrument(skip(self, key_value, cells))]
    pub async fn upsert(
        &self,
        doc_id: &str,
        table_id: &str,
        key_column: &str,
        key_value: impl Into<CellValue>,
        cells: Vec<CellEdit>,
    ) -> CodaResult<UpsertOutcome> {
        let key_value = key_value.into();
        let existing = self
            .find(doc_id, table_id, key_column, &key_value, 1)
            .await?
            .into_iter()
            .next();

        match existing {
            Some(row) => {
                let accepted = self
                    .update(doc_id, table_id, &row.id, RowEdit::new(cells))
                    .await?;
                tracing::debug!(row_id = %row.id, "Upsert updated existing row");
                Ok(UpsertOutcome {
                    action: UpsertAction::Updated,
                    row_id: row.id,
                    request_id: accepted.request_id,
                })
            }
            None => {
                let mut seeded = Vec::with_capacity(cells.len() + 1);
                if !cells.iter().any(|cell| cell.column == key_column) {
                    seeded.push(CellEdit::new(key_column, key_value));
                }
                seeded.extend(cells);

                let accepted = self
                    .insert(doc_id, table_id, vec![RowEdit::new(seeded)], None)
                    .await?;
                let row_id = accepted.added_row_ids.first().cloned().ok_or_else(|| {
                    CodaError::serialization("insert response did not include the new row id")
                })?;
                tracing::debug!(row_id = %row_id, "Upsert inserted new row");
                Ok(UpsertOutcome {
                    action: UpsertAction::Inserted,
                    row_id,
                    request_id: accepted.request_id,
                })
            }
        }
    }

    /// Returns a batch writer for chunked inserts.
    pub fn batch(&self) -> BatchWriter {
        BatchWriter::new(
            self.clone(),
            MutationsService::new(Arc::clone(&self.executor)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{fixtures, mock_client, MockResponse, MockTransport};
    use crate::transport::HttpMethod;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn test_upsert_updates_existing_row() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&fixtures::page(
            vec![
                fixtures::row("i-other", json!({"Email": "bob@example.com"})),
                fixtures::row("i-ada", json!({"Email": "ada@example.com"})),
            ],
            None,
        ));
        transport.queue(
            MockResponse::json(&json!({"requestId": "req-u", "id": "i-ada"})).with_status(202),
        );
        let client = mock_client(Arc::clone(&transport)).unwrap();

        let outcome = client
            .rows()
            .upsert(
                "d1",
                "t1",
                "Email",
                "ada@example.com",
                vec![CellEdit::new("Status", "Active")],
            )
            .await
            .unwrap();

        assert_eq!(outcome.action, UpsertAction::Updated);
        assert_eq!(outcome.row_id, "i-ada");
        assert_eq!(outcome.request_id, "req-u");

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].url.contains("useColumnNames=true"));
        assert_eq!(requests[1].method, HttpMethod::Put);
        assert_eq!(requests[1].path(), "/apis/v1/docs/d1/tables/t1/rows/i-ada");
        assert_eq!(
            requests[1].body_json(),
            Some(json!({"row": {"cells": [{"column": "Status", "value": "Active"}]}}))
        );
    }

    #[tokio::test]
    async fn test_upsert_inserts_when_missing() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&fixtures::page(
            vec![fixtures::row("i-other", json!({"Email": "bob@example.com"}))],
            None,
        ));
        transport.queue(
            MockResponse::json(&json!({"requestId": "req-i", "addedRowIds": ["i-new"]}))
                .with_status(202),
        );
        let client = mock_client(Arc::clone(&transport)).unwrap();

        let outcome = client
            .rows()
            .upsert(
                "d1",
                "t1",
                "Email",
                "ada@example.com",
                vec![CellEdit::new("Status", "Active")],
            )
            .await
            .unwrap();

        assert_eq!(outcome.action, UpsertAction::Inserted);
        assert_eq!(outcome.row_id, "i-new");

        let insert = transport.last_request().unwrap();
        assert_eq!(insert.method, HttpMethod::Post);
        assert_eq!(
            insert.body_json(),
            Some(json!({"rows": [{"cells": [
                {"column": "Email", "value": "ada@example.com"},
                {"column": "Status", "value": "Active"},
            ]}]}))
        );
    }

    #[tokio::test]
    async fn test_find_stops_after_limit() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&fixtures::page(
            vec![fixtures::row("i-1", json!({"c-team": "core"}))],
            Some("p2"),
        ));
        transport.queue_json(&fixtures::page(
            vec![fixtures::row("i-2", json!({"c-team": "core"}))],
            Some("p3"),
        ));
        let client = mock_client(Arc::clone(&transport)).unwrap();

        let rows = client
            .rows()
            .find("d1", "t1", "c-team", &CellValue::from("core"), 2)
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(transport.request_count(), 2);
        let first = &transport.requests()[0];
        assert!(first.url.contains("useColumnNames=false"));
        assert!(first.url.contains("query=c-team%3A%22core%22"));
    }

    #[tokio::test]
    async fn test_delete_many_sends_ids() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(
            MockResponse::json(&json!({"requestId": "req-d", "rowIds": ["i-1", "i-2"]}))
                .with_status(202),
        );
        let client = mock_client(Arc::clone(&transport)).unwrap();

        let accepted = client
            .rows()
            .delete_many("d1", "t1", vec!["i-1".into(), "i-2".into()])
            .await
            .unwrap();

        assert_eq!(accepted.row_ids, vec!["i-1", "i-2"]);
        let request = transport.last_request().unwrap();
        assert_eq!(request.method, HttpMethod::Delete);
        assert_eq!(request.body_json(), Some(json!({"rowIds": ["i-1", "i-2"]})));
    }

    #[tokio::test]
    async fn test_repeated_upsert_looks_up_live_rows() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&fixtures::page(vec![], None));
        transport.queue(
            MockResponse::json(&json!({"requestId": "req-1", "addedRowIds": ["i-new"]}))
                .with_status(202),
        );
        transport.queue_json(&fixtures::page(
            vec![fixtures::row("i-new", json!({"Email": "ada@example.com"}))],
            None,
        ));
        transport.queue(MockResponse::accepted("req-2"));
        let client = mock_client(Arc::clone(&transport)).unwrap();

        let mut actions = Vec::new();
        for status in ["Active", "Inactive"] {
            let outcome = client
                .rows()
                .upsert(
                    "d1",
                    "t1",
                    "Email",
                    "ada@example.com",
                    vec![CellEdit::new("Status", status)],
                )
                .await
                .unwrap();
            actions.push((outcome.action, outcome.row_id));
        }

        assert_eq!(
            actions,
            vec![
                (UpsertAction::Inserted, "i-new".to_string()),
                (UpsertAction::Updated, "i-new".to_string()),
            ]
        );
        let methods: Vec<_> = transport.requests().iter().map(|r| r.method).collect();
        assert_eq!(
            methods,
            vec![HttpMethod::Get, HttpMethod::Post, HttpMethod::Get, HttpMethod::Put]
        );
        let stats = client.cache_stats().unwrap();
        assert_eq!((stats.hits, stats.size), (0, 0));
    }

    #[tokio::test]
    async fn test_listing_is_still_cached() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&fixtures::page(vec![fixtures::row("i-1", json!({}))], None));
        let client = mock_client(Arc::clone(&transport)).unwrap();
        let params = ListRowsParams::default();

        client.rows().list("d1", "t1", &params).await.unwrap();
        let again = client.rows().list("d1", "t1", &params).await.unwrap();

        assert_eq!(again.items[0].id, "i-1");
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_upsert_matches_numeric_key_across_representations() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&fixtures::page(
            vec![fixtures::row("i-7", json!({"Employee No": 7.0}))],
            None,
        ));
        transport.queue(MockResponse::accepted("req-u"));
        let client = mock_client(Arc::clone(&transport)).unwrap();

        let outcome = client
            .rows()
            .upsert("d1", "t1", "Employee No", 7_i64, vec![CellEdit::new("Team", "core")])
            .await
            .unwrap();

        assert_eq!(outcome.action, UpsertAction::Updated);
        assert_eq!(outcome.row_id, "i-7");
        assert_eq!(transport.last_request().unwrap().method, HttpMethod::Put);
    }
}
