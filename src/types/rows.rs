//! Row and cell types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::HashMap;

use crate::errors::CodaError;

/// A scalar cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Primitive {
    /// Empty cell.
    Null,
    /// Boolean.
    Bool(bool),
    /// Number.
    Number(Number),
    /// Text.
    Text(String),
}

/// A cell value.
///
/// Cells hold a scalar or a list of scalars. Nested objects are not valid
/// cell values and are rejected by [`CellValue::try_from`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Empty cell.
    Null,
    /// Boolean.
    Bool(bool),
    /// Number.
    Number(Number),
    /// Text.
    Text(String),
    /// List of scalars.
    List(Vec<Primitive>),
}

impl CellValue {
    /// Returns the text if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true for an empty cell.
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Compares values the way a cell reads them: `1` and `1.0` match.
    pub fn same_value(&self, other: &CellValue) -> bool {
        match (self, other) {
            (CellValue::Number(a), CellValue::Number(b)) => numbers_equal(a, b),
            (CellValue::List(a), CellValue::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_value(y))
            }
            _ => self == other,
        }
    }
}

impl Primitive {
    fn same_value(&self, other: &Primitive) -> bool {
        match (self, other) {
            (Primitive::Number(a), Primitive::Number(b)) => numbers_equal(a, b),
            _ => self == other,
        }
    }
}

#[allow(clippy::float_cmp)]
fn numbers_equal(a: &Number, b: &Number) -> bool {
    a == b || matches!((a.as_f64(), b.as_f64()), (Some(x), Some(y)) if x == y)
}

fn primitive_from_value(value: Value) -> Result<Primitive, CodaError> {
    match value {
        Value::Null => Ok(Primitive::Null),
        Value::Bool(b) => Ok(Primitive::Bool(b)),
        Value::Number(n) => Ok(Primitive::Number(n)),
        Value::String(s) => Ok(Primitive::Text(s)),
        Value::Array(_) => Err(CodaError::serialization(
            "nested arrays are not valid cell values",
        )),
        Value::Object(_) => Err(CodaError::serialization(
            "objects are not valid cell values",
        )),
    }
}

impl TryFrom<Value> for CellValue {
    type Error = CodaError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(CellValue::Null),
            Value::Bool(b) => Ok(CellValue::Bool(b)),
            Value::Number(n) => Ok(CellValue::Number(n)),
            Value::String(s) => Ok(CellValue::Text(s)),
            Value::Array(items) => items
                .into_iter()
                .map(primitive_from_value)
                .collect::<Result<Vec<_>, _>>()
                .map(CellValue::List),
            Value::Object(_) => Err(CodaError::serialization(
                "objects are not valid cell values",
            )),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value.into())
    }
}

/// NaN and infinities have no JSON form and are rejected.
impl TryFrom<f64> for CellValue {
    type Error = CodaError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Number::from_f64(value)
            .map(CellValue::Number)
            .ok_or_else(|| CodaError::serialization(format!("{} is not a valid cell value", value)))
    }
}

/// A cell assignment in a write request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellEdit {
    /// Column id or name.
    pub column: String,
    /// New value.
    pub value: CellValue,
}

impl CellEdit {
    /// Creates a cell assignment.
    pub fn new(column: impl Into<String>, value: impl Into<CellValue>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// The cells of one row in a write request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowEdit {
    /// Cell assignments.
    pub cells: Vec<CellEdit>,
}

impl RowEdit {
    /// Creates a row from cell assignments.
    pub fn new(cells: Vec<CellEdit>) -> Self {
        Self { cells }
    }

    /// Adds a cell assignment.
    pub fn cell(mut self, column: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.cells.push(CellEdit::new(column, value));
        self
    }
}

/// A table row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    /// Row id.
    pub id: String,
    /// Display name of the row.
    #[serde(default)]
    pub name: Option<String>,
    /// Position of the row in the table.
    #[serde(default)]
    pub index: Option<u64>,
    /// API link.
    #[serde(default)]
    pub href: Option<String>,
    /// Browser link.
    #[serde(default)]
    pub browser_link: Option<String>,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Cell values keyed by column id (or name with `useColumnNames`).
    #[serde(default)]
    pub values: HashMap<String, Value>,
}

impl Row {
    /// Returns the value of `column` as a cell value.
    ///
    /// Returns `None` when the column is absent or holds a structured value.
    pub fn cell(&self, column: &str) -> Option<CellValue> {
        self.values
            .get(column)
            .cloned()
            .and_then(|value| CellValue::try_from(value).ok())
    }
}

/// Query parameters for listing rows.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRowsParams {
    /// Server-side filter, `<column>:<json value>`.
    pub query: Option<String>,
    /// Sort order (`createdAt`, `natural` or `updatedAt`).
    pub sort_by: Option<String>,
    /// Key `values` by column name instead of id.
    pub use_column_names: Option<bool>,
    /// Value format (`simple`, `simpleWithArrays` or `rich`).
    pub value_format: Option<String>,
    /// Only return visible rows.
    pub visible_only: Option<bool>,
    /// Page size.
    pub limit: Option<u32>,
    /// Continuation token.
    pub page_token: Option<String>,
}

/// Body of an insert/upsert request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertRowsRequest {
    /// Rows to insert.
    pub rows: Vec<RowEdit>,
    /// Columns that identify existing rows to update instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_columns: Option<Vec<String>>,
}

/// Body of a single-row update.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateRowRequest {
    /// New cell values.
    pub row: RowEdit,
}

/// Body of a bulk delete.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRowsRequest {
    /// Ids of the rows to delete.
    pub row_ids: Vec<String>,
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertAction {
    /// An existing row was updated.
    Updated,
    /// A new row was inserted.
    Inserted,
}

/// Result of an upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertOutcome {
    /// What was done.
    pub action: UpsertAction,
    /// Id of the affected row.
    pub row_id: String,
    /// Request id of the mutation.
    pub request_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cell_value_accepts_primitives_and_lists() {
        assert_eq!(CellValue::try_from(json!("a")).unwrap(), CellValue::from("a"));
        assert_eq!(CellValue::try_from(json!(true)).unwrap(), CellValue::Bool(true));
        assert_eq!(CellValue::try_from(json!(null)).unwrap(), CellValue::Null);
        assert_eq!(
            CellValue::try_from(json!([1, "x", null])).unwrap(),
            CellValue::List(vec![
                Primitive::Number(1.into()),
                Primitive::Text("x".into()),
                Primitive::Null,
            ])
        );
    }

    #[test]
    fn test_cell_value_rejects_structures() {
        assert!(CellValue::try_from(json!({"a": 1})).is_err());
        assert!(CellValue::try_from(json!([[1]])).is_err());
        assert!(CellValue::try_from(json!([{"a": 1}])).is_err());
    }

    #[test]
    fn test_cell_value_serializes_untagged() {
        let row = RowEdit::default().cell("Name", "Ada").cell("Age", 36_i64).cell("Active", true);
        let body = serde_json::to_value(&row).unwrap();
        assert_eq!(
            body,
            json!({"cells": [
                {"column": "Name", "value": "Ada"},
                {"column": "Age", "value": 36},
                {"column": "Active", "value": true},
            ]})
        );
    }

    #[test]
    fn test_numbers_match_across_representations() {
        let integer = CellValue::from(1_i64);
        let float = CellValue::try_from(json!(1.0)).unwrap();
        assert_ne!(integer, float);
        assert!(integer.same_value(&float));
        assert!(!integer.same_value(&CellValue::from(2_i64)));
        assert!(CellValue::try_from(json!([1, "a"]))
            .unwrap()
            .same_value(&CellValue::try_from(json!([1.0, "a"])).unwrap()));
        assert!(!CellValue::from("1").same_value(&integer));
    }

    #[test]
    fn test_non_finite_floats_are_rejected() {
        assert_eq!(
            CellValue::try_from(2.5_f64).unwrap(),
            CellValue::try_from(json!(2.5)).unwrap()
        );
        assert!(matches!(
            CellValue::try_from(f64::NAN),
            Err(CodaError::Serialization { .. })
        ));
        assert!(CellValue::try_from(f64::INFINITY).is_err());
    }

    #[test]
    fn test_row_deserializes_and_reads_cells() {
        let row: Row = serde_json::from_value(json!({
            "id": "i-abc",
            "type": "row",
            "name": "Ada",
            "index": 3,
            "values": {"c-name": "Ada", "c-meta": {"nested": true}}
        }))
        .unwrap();

        assert_eq!(row.cell("c-name"), Some(CellValue::from("Ada")));
        assert_eq!(row.cell("c-meta"), None);
        assert_eq!(row.cell("missing"), None);
    }
}
