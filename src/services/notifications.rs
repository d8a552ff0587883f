//! Notification side effects.
//!
//! State transitions on case-like records fan out here. Failures are logged
//! and swallowed: a missed notification must never fail the request that
//! triggered it.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::models::notification::{self, Notification, NotificationType};

pub async fn notify(
    pool: &PgPool,
    owner_id: Uuid,
    notification_type: NotificationType,
    title: impl Into<String>,
    message: impl Into<String>,
) {
    let record = Notification {
        id: Uuid::new_v4(),
        owner_id,
        notification_type: notification_type.as_str().to_string(),
        title: title.into(),
        message: message.into(),
        is_read: false,
        created_at: Utc::now(),
    };

    if let Err(e) = notification::insert(pool, &record).await {
        tracing::warn!("failed to write notification for {}: {}", owner_id, e);
    }
}

pub async fn status_changed(
    pool: &PgPool,
    owner_id: Uuid,
    resource_label: &str,
    new_status: &str,
) {
    notify(
        pool,
        owner_id,
        NotificationType::StatusChanged,
        format!("{} status updated", resource_label),
        format!("Your {} is now '{}'", resource_label, new_status),
    )
    .await;
}

pub async fn assigned(pool: &PgPool, assignee_id: Uuid, resource_label: &str) {
    notify(
        pool,
        assignee_id,
        NotificationType::Assigned,
        format!("{} assigned to you", resource_label),
        format!("A {} has been assigned to you for handling", resource_label),
    )
    .await;
}
