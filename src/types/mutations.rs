//! Mutation tracking types.
//!
//! Writes are accepted asynchronously: the API answers with a request id and
//! the caller polls `mutationStatus/{requestId}` until the write is applied.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State of an asynchronous mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationStatus {
    /// Still being applied.
    InProgress,
    /// Applied successfully.
    Complete,
    /// Could not be applied.
    Failed,
}

impl MutationStatus {
    /// Returns true for `Complete` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MutationStatus::Complete | MutationStatus::Failed)
    }
}

/// Response to a write request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationAccepted {
    /// Id used to poll the mutation status.
    pub request_id: String,
    /// Id of the affected object, for single-object writes.
    #[serde(default)]
    pub id: Option<String>,
    /// Ids of inserted rows.
    #[serde(default)]
    pub added_row_ids: Vec<String>,
    /// Ids of deleted rows.
    #[serde(default)]
    pub row_ids: Vec<String>,
}

/// Observed state of a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationHandle {
    /// Request id of the mutation.
    pub request_id: String,
    /// Current state.
    pub status: MutationStatus,
    /// Server-provided error for a failed mutation.
    pub error: Option<String>,
    /// When the mutation reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
}

impl MutationHandle {
    /// Returns true once the mutation can no longer change.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Wire shape of `mutationStatus/{requestId}`.
///
/// Accepts an explicit `status`, or the `completed` flag with an optional
/// `error`/`warning`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationStatusResponse {
    /// Explicit state.
    #[serde(default)]
    pub status: Option<MutationStatus>,
    /// Whether the mutation has been applied.
    #[serde(default)]
    pub completed: Option<bool>,
    /// Server-provided error.
    #[serde(default)]
    pub error: Option<String>,
    /// Server-provided warning.
    #[serde(default)]
    pub warning: Option<String>,
    /// Completion time.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl MutationStatusResponse {
    /// Resolves the wire response into a handle for `request_id`.
    pub fn into_handle(self, request_id: impl Into<String>) -> MutationHandle {
        let status = match (self.status, self.completed) {
            (Some(status), _) => status,
            (None, Some(true)) if self.error.is_some() => MutationStatus::Failed,
            (None, Some(true)) => MutationStatus::Complete,
            (None, _) => MutationStatus::InProgress,
        };
        let error = match status {
            MutationStatus::Failed => self.error.or(self.warning),
            _ => self.error,
        };

        MutationHandle {
            request_id: request_id.into(),
            status,
            error,
            completed_at: self.completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn handle(body: serde_json::Value) -> MutationHandle {
        serde_json::from_value::<MutationStatusResponse>(body)
            .unwrap()
            .into_handle("req-1")
    }

    #[test]
    fn test_explicit_status() {
        assert_eq!(handle(json!({"status": "inProgress"})).status, MutationStatus::InProgress);

        let failed = handle(json!({"status": "failed", "error": "Row too large"}));
        assert_eq!(failed.status, MutationStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("Row too large"));
        assert!(failed.is_terminal());
    }

    #[test]
    fn test_completed_flag() {
        assert_eq!(handle(json!({"completed": false})).status, MutationStatus::InProgress);
        assert_eq!(handle(json!({"completed": true})).status, MutationStatus::Complete);
        assert_eq!(
            handle(json!({"completed": true, "error": "boom"})).status,
            MutationStatus::Failed
        );
    }
}
