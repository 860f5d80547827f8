//! Type definitions for the Coda API.
//!
//! Domain objects are modeled with the fields the client needs; everything
//! else in a response is ignored.

pub mod docs;
pub mod mutations;
pub mod rows;

pub use docs::{
    Column, Doc, ListColumnsParams, ListDocsParams, ListTablesParams, ObjectRef, Table, TableType,
    User,
};
pub use mutations::{MutationAccepted, MutationHandle, MutationStatus, MutationStatusResponse};
pub use rows::{
    CellEdit, CellValue, DeleteRowsRequest, InsertRowsRequest, ListRowsParams, Primitive, Row,
    RowEdit, UpdateRowRequest, UpsertAction, UpsertOutcome,
};
