//! Tables and columns service.

use futures::Stream;
use std::sync::Arc;
use tracing::instrument;

use crate::client::{CallDescriptor, RequestExecutor};
use crate::errors::CodaResult;
use crate::pagination::{paginate, Page};
use crate::types::{Column, ListColumnsParams, ListTablesParams, Table};

/// Lists and retrieves tables and their columns.
#[derive(Debug, Clone)]
pub struct TablesService {
    executor: Arc<RequestExecutor>,
}

impl TablesService {
    /// Creates a new tables service.
    pub fn new(executor: Arc<RequestExecutor>) -> Self {
        Self { executor }
    }

    /// Lists one page of tables in a doc.
    #[instrument(skip(self, params))]
    pub async fn list(&self, doc_id: &str, params: &ListTablesParams) -> CodaResult<Page<Table>> {
        let descriptor = CallDescriptor::get(["docs", doc_id, "tables"]).with_query(params)?;
        self.executor.execute(&descriptor).await
    }

    /// Streams every table in a doc.
    pub fn stream<'a>(
        &'a self,
        doc_id: &'a str,
        params: ListTablesParams,
    ) -> impl Stream<Item = CodaResult<Table>> + 'a {
        paginate(move |page_token| {
            let params = ListTablesParams {
                page_token,
                ..params.clone()
            };
            async move { self.list(doc_id, &params).await }
        })
    }

    /// Gets a table by id or name.
    #[instrument(skip(self))]
    pub async fn get(&self, doc_id: &str, table_id: &str) -> CodaResult<Table> {
        self.executor
            .execute(&CallDescriptor::get(["docs", doc_id, "tables", table_id]))
            .await
    }

    /// Lists one page of columns in a table.
    #[instrument(skip(self, params))]
    pub async fn list_columns(
        &self,
        doc_id: &str,
        table_id: &str,
        params: &ListColumnsParams,
    ) -> CodaResult<Page<Column>> {
        let descriptor = CallDescriptor::get(["docs", doc_id, "tables", table_id, "columns"])
            .with_query(params)?;
        self.executor.execute(&descriptor).await
    }

    /// Gets a column by id or name.
    #[instrument(skip(self))]
    pub async fn get_column(
        &self,
        doc_id: &str,
        table_id: &str,
        column_id: &str,
    ) -> CodaResult<Column> {
        let descriptor =
            CallDescriptor::get(["docs", doc_id, "tables", table_id, "columns", column_id]);
        self.executor.execute(&descriptor).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{fixtures, mock_client, MockTransport};
    use serde_json::json;

    #[tokio::test]
    async fn test_list_tables_with_types() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&fixtures::page(vec![fixtures::table("grid-1", "Tasks")], None));
        let client = mock_client(Arc::clone(&transport)).unwrap();

        let params = ListTablesParams {
            table_types: Some(vec!["table".into(), "view".into()]),
            ..Default::default()
        };
        let page = client.tables().list("d1", &params).await.unwrap();

        assert_eq!(page.items[0].name, "Tasks");
        assert!(!page.has_next());
        assert!(transport
            .last_request()
            .unwrap()
            .url
            .ends_with("/docs/d1/tables?tableTypes=table%2Cview"));
    }

    #[tokio::test]
    async fn test_columns() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&fixtures::page(
            vec![json!({"id": "c-1", "name": "Name", "display": true})],
            None,
        ));
        transport.queue_json(&json!({"id": "c-2", "name": "Due", "calculated": false}));
        let client = mock_client(Arc::clone(&transport)).unwrap();

        let columns = client
            .tables()
            .list_columns("d1", "grid-1", &ListColumnsParams::default())
            .await
            .unwrap();
        assert_eq!(columns.items[0].display, Some(true));

        let column = client.tables().get_column("d1", "grid-1", "c-2").await.unwrap();
        assert_eq!(column.name, "Due");
        assert_eq!(
            transport.last_request().unwrap().path(),
            "/apis/v1/docs/d1/tables/grid-1/columns/c-2"
        );
    }
}
