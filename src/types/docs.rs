//! Doc, table, column and user types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A Coda doc.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doc {
    /// Doc id.
    pub id: String,
    /// Doc name.
    pub name: String,
    /// API link.
    #[serde(default)]
    pub href: Option<String>,
    /// Browser link.
    #[serde(default)]
    pub browser_link: Option<String>,
    /// Owner email.
    #[serde(default)]
    pub owner: Option<String>,
    /// Owner display name.
    #[serde(default)]
    pub owner_name: Option<String>,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Query parameters for listing docs.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDocsParams {
    /// Full-text search term.
    pub query: Option<String>,
    /// Only docs owned by the caller.
    pub is_owner: Option<bool>,
    /// Only published docs.
    pub is_published: Option<bool>,
    /// Restrict to a workspace.
    pub workspace_id: Option<String>,
    /// Restrict to a folder.
    pub folder_id: Option<String>,
    /// Page size.
    pub limit: Option<u32>,
    /// Continuation token.
    pub page_token: Option<String>,
}

/// Kind of table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TableType {
    /// A base table.
    Table,
    /// A view of another table.
    View,
}

/// Minimal reference to another object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    /// Object id.
    pub id: String,
    /// Object name.
    #[serde(default)]
    pub name: Option<String>,
    /// API link.
    #[serde(default)]
    pub href: Option<String>,
}

/// A table or view inside a doc.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    /// Table id.
    pub id: String,
    /// Table name.
    pub name: String,
    /// Table or view.
    #[serde(default)]
    pub table_type: Option<TableType>,
    /// API link.
    #[serde(default)]
    pub href: Option<String>,
    /// Browser link.
    #[serde(default)]
    pub browser_link: Option<String>,
    /// Number of rows.
    #[serde(default)]
    pub row_count: Option<u64>,
    /// The column used as the row display name.
    #[serde(default)]
    pub display_column: Option<ObjectRef>,
    /// Page containing the table.
    #[serde(default)]
    pub parent: Option<ObjectRef>,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Query parameters for listing tables.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTablesParams {
    /// Sort order.
    pub sort_by: Option<String>,
    /// Table types to include (`table`, `view`).
    pub table_types: Option<Vec<String>>,
    /// Page size.
    pub limit: Option<u32>,
    /// Continuation token.
    pub page_token: Option<String>,
}

/// A column of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    /// Column id.
    pub id: String,
    /// Column name.
    pub name: String,
    /// API link.
    #[serde(default)]
    pub href: Option<String>,
    /// Whether this is the display column.
    #[serde(default)]
    pub display: Option<bool>,
    /// Whether the column is a formula.
    #[serde(default)]
    pub calculated: Option<bool>,
    /// Column format, passed through unchanged.
    #[serde(default)]
    pub format: Option<Value>,
}

/// Query parameters for listing columns.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListColumnsParams {
    /// Only visible columns.
    pub visible_only: Option<bool>,
    /// Page size.
    pub limit: Option<u32>,
    /// Continuation token.
    pub page_token: Option<String>,
}

/// The user that owns the API token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Display name.
    pub name: String,
    /// Login email.
    pub login_id: String,
    /// Whether the token is restricted to specific docs.
    #[serde(default)]
    pub scoped: Option<bool>,
    /// Token name.
    #[serde(default)]
    pub token_name: Option<String>,
    /// API link.
    #[serde(default)]
    pub href: Option<String>,
}
