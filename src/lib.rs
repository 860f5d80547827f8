//! Coda API Client Library
//!
//! A production-ready Rust client for the Coda API. Docs hold tables, tables
//! hold columns and rows; writes are applied asynchronously and tracked via
//! mutation status.
//!
//! # Features
//!
//! - **Rate Limiting**: Client-side sliding window with separate read and
//!   write budgets (100 reads / 10 writes per 6 seconds by default)
//! - **Caching**: GET responses cached with a per-entry time-to-live
//! - **Retries**: Exponential backoff for server and network failures
//! - **Mutation Tracking**: Poll writes until they are applied
//! - **Pagination**: Lazy streams over `nextPageToken` pages
//! - **Batch Helpers**: Chunked inserts, search and upsert
//! - **Observability**: `tracing` spans and request metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use coda_client::{CodaClient, CellEdit, WaitOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = CodaClient::builder()
//!         .api_token("your-api-token")
//!         .build()?;
//!
//!     let me = client.whoami().await?;
//!     println!("Signed in as {}", me.login_id);
//!
//!     let outcome = client
//!         .rows()
//!         .upsert(
//!             "doc-id",
//!             "grid-id",
//!             "Email",
//!             "ada@example.com",
//!             vec![CellEdit::new("Status", "Active")],
//!         )
//!         .await?;
//!
//!     client
//!         .mutations()
//!         .wait_for_mutation(&outcome.request_id, WaitOptions::default())
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! # Batch Example
//!
//! ```rust,no_run
//! use coda_client::{BatchOptions, CodaClient, RowEdit, WaitOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = CodaClient::from_env()?;
//!
//!     let names = vec!["Ada", "Grace", "Edsger"];
//!     let result = client
//!         .rows()
//!         .batch()
//!         .insert_rows(
//!             "doc-id",
//!             "grid-id",
//!             names,
//!             |name| RowEdit::default().cell("Name", name),
//!             &BatchOptions::default().wait_for_completion(WaitOptions::default()),
//!         )
//!         .await?;
//!
//!     println!("Inserted {} rows in {} chunks", result.row_ids.len(), result.chunks);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod batch;
pub mod cache;
pub mod client;
pub mod config;
pub mod errors;
pub mod observability;
pub mod pagination;
pub mod resilience;
pub mod services;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use batch::{BatchOptions, BatchResult, BatchWriter};
pub use client::{CallDescriptor, CodaClient, CodaClientBuilder, RequestExecutor};
pub use config::CodaConfig;
pub use errors::{CodaError, CodaResult};
pub use observability::{init_logging, LogLevel};
pub use pagination::{find, find_first, paginate, Page};
pub use resilience::{RateLimitConfig, RetryConfig, TrafficClass};
pub use services::WaitOptions;

// Type re-exports
pub use types::{
    CellEdit, CellValue, Column, Doc, ListColumnsParams, ListDocsParams, ListRowsParams,
    ListTablesParams, MutationAccepted, MutationHandle, MutationStatus, Row, RowEdit, Table,
    UpsertAction, UpsertOutcome, User,
};

/// Mock implementations for testing.
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
