// Bulk-request parsing and the closed action vocabulary.

use anyhow::Result;
use serde_json::json;
use uuid::Uuid;

use pajak_api::domain::bulk::{BulkAction, BulkOutcome, BulkRequest};

#[test]
fn wire_body_parses_into_a_typed_action() -> Result<()> {
    let request: BulkRequest = serde_json::from_value(json!({
        "action": "mark_read",
        "ids": [Uuid::new_v4(), Uuid::new_v4()]
    }))?;

    assert_eq!(request.action().unwrap(), BulkAction::MarkRead);
    assert_eq!(request.ids.len(), 2);
    Ok(())
}

#[test]
fn unknown_action_is_a_controlled_400_not_a_deserializer_error() -> Result<()> {
    // The body itself parses; only the action tag is rejected, so the
    // handler can answer with its own error envelope
    let request: BulkRequest = serde_json::from_value(json!({
        "action": "transmogrify",
        "ids": [Uuid::new_v4()]
    }))?;

    let err = request.action().unwrap_err();
    assert_eq!(err.error_code(), "INVALID_ACTION");
    assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    Ok(())
}

#[test]
fn ids_are_required_for_mutating_actions() -> Result<()> {
    let request: BulkRequest = serde_json::from_value(json!({ "action": "delete" }))?;
    assert!(request.require_ids().is_err());
    Ok(())
}

#[test]
fn optional_params_ride_along() -> Result<()> {
    let assignee = Uuid::new_v4();
    let request: BulkRequest = serde_json::from_value(json!({
        "action": "assign",
        "ids": [Uuid::new_v4()],
        "assigned_to": assignee,
        "status": "in_progress",
        "format": "json"
    }))?;

    assert_eq!(request.assigned_to, Some(assignee));
    assert_eq!(request.status.as_deref(), Some("in_progress"));
    assert_eq!(request.format.as_deref(), Some("json"));
    Ok(())
}

#[test]
fn outcome_reports_action_and_affected_count() -> Result<()> {
    let outcome = BulkOutcome::new(BulkAction::MarkRead, 0);
    let body = serde_json::to_value(outcome)?;

    // Zero affected is a legitimate outcome (e.g. mark_read on unowned ids)
    assert_eq!(body, json!({ "action": "mark_read", "affected": 0 }));
    Ok(())
}
