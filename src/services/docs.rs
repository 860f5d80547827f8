//! Docs service.

use futures::Stream;
use std::sync::Arc;
use tracing::instrument;

use crate::client::{CallDescriptor, RequestExecutor};
use crate::errors::CodaResult;
use crate::pagination::{paginate, Page};
use crate::types::{Doc, ListDocsParams};

/// Lists and retrieves docs.
#[derive(Debug, Clone)]
pub struct DocsService {
    executor: Arc<RequestExecutor>,
}

impl DocsService {
    /// Creates a new docs service.
    pub fn new(executor: Arc<RequestExecutor>) -> Self {
        Self { executor }
    }

    /// Lists one page of docs.
    #[instrument(skip(self, params))]
    pub async fn list(&self, params: &ListDocsParams) -> CodaResult<Page<Doc>> {
        let descriptor = CallDescriptor::get(["docs"]).with_query(params)?;
        self.executor.execute(&descriptor).await
    }

    /// Streams every doc matching `params`, following page tokens.
    pub fn stream(&self, params: ListDocsParams) -> impl Stream<Item = CodaResult<Doc>> + '_ {
        paginate(move |page_token| {
            let params = ListDocsParams {
                page_token,
                ..params.clone()
            };
            async move { self.list(&params).await }
        })
    }

    /// Gets a doc by id.
    #[instrument(skip(self))]
    pub async fn get(&self, doc_id: &str) -> CodaResult<Doc> {
        self.executor
            .execute(&CallDescriptor::get(["docs", doc_id]))
            .await
    }
}
