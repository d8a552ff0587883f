//! Bulk-operation vocabulary.
//!
//! The action set is a closed enum dispatched through exhaustive matches in
//! the resource handlers; adding an action is a compile-time-checked change,
//! not a new string case.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkAction {
    Delete,
    Activate,
    Deactivate,
    SetPrimary,
    Export,
    Sync,
    MarkRead,
    MarkUnread,
    Assign,
    Schedule,
    UpdateStatus,
}

impl BulkAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkAction::Delete => "delete",
            BulkAction::Activate => "activate",
            BulkAction::Deactivate => "deactivate",
            BulkAction::SetPrimary => "set_primary",
            BulkAction::Export => "export",
            BulkAction::Sync => "sync",
            BulkAction::MarkRead => "mark_read",
            BulkAction::MarkUnread => "mark_unread",
            BulkAction::Assign => "assign",
            BulkAction::Schedule => "schedule",
            BulkAction::UpdateStatus => "update_status",
        }
    }
}

impl FromStr for BulkAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delete" => Ok(BulkAction::Delete),
            "activate" => Ok(BulkAction::Activate),
            "deactivate" => Ok(BulkAction::Deactivate),
            "set_primary" => Ok(BulkAction::SetPrimary),
            "export" => Ok(BulkAction::Export),
            "sync" => Ok(BulkAction::Sync),
            "mark_read" => Ok(BulkAction::MarkRead),
            "mark_unread" => Ok(BulkAction::MarkUnread),
            "assign" => Ok(BulkAction::Assign),
            "schedule" => Ok(BulkAction::Schedule),
            "update_status" => Ok(BulkAction::UpdateStatus),
            other => Err(format!("unknown bulk action: {}", other)),
        }
    }
}

impl std::fmt::Display for BulkAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body of every `POST /api/<resource>/bulk` endpoint.
///
/// `action` stays a string at the wire boundary so an unknown tag produces a
/// controlled 400 instead of a deserializer rejection; handlers parse it via
/// [`BulkRequest::action`].
#[derive(Debug, Clone, Deserialize)]
pub struct BulkRequest {
    pub action: String,
    #[serde(default)]
    pub ids: Vec<Uuid>,
    /// Target status for `update_status`
    #[serde(default)]
    pub status: Option<String>,
    /// Assignee for `assign`
    #[serde(default)]
    pub assigned_to: Option<Uuid>,
    /// Appointment time for `schedule`
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Output format for `export`: "csv" (default) or "json"
    #[serde(default)]
    pub format: Option<String>,
}

impl BulkRequest {
    pub fn action(&self) -> Result<BulkAction, crate::error::ApiError> {
        self.action
            .parse()
            .map_err(|e: String| crate::error::ApiError::invalid_action(e))
    }

    pub fn require_ids(&self) -> Result<&[Uuid], crate::error::ApiError> {
        if self.ids.is_empty() {
            return Err(crate::error::ApiError::validation(
                "At least one target id is required",
                None,
            ));
        }
        Ok(&self.ids)
    }
}

/// Result of a bulk mutation: how many records the action touched.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BulkOutcome {
    pub action: BulkAction,
    pub affected: u64,
}

impl BulkOutcome {
    pub fn new(action: BulkAction, affected: u64) -> Self {
        Self { action, affected }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_action_round_trips_through_str() {
        for action in [
            BulkAction::Delete,
            BulkAction::Activate,
            BulkAction::Deactivate,
            BulkAction::SetPrimary,
            BulkAction::Export,
            BulkAction::Sync,
            BulkAction::MarkRead,
            BulkAction::MarkUnread,
            BulkAction::Assign,
            BulkAction::Schedule,
            BulkAction::UpdateStatus,
        ] {
            assert_eq!(action.as_str().parse::<BulkAction>().unwrap(), action);
        }
    }

    #[test]
    fn unknown_action_tag_is_an_invalid_action_error() {
        let request: BulkRequest = serde_json::from_value(serde_json::json!({
            "action": "explode",
            "ids": [Uuid::new_v4()]
        }))
        .unwrap();
        let err = request.action().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ACTION");
    }

    #[test]
    fn empty_id_list_fails_validation() {
        let request: BulkRequest =
            serde_json::from_value(serde_json::json!({ "action": "delete" })).unwrap();
        assert!(request.require_ids().is_err());
    }
}
