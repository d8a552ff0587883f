use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;

pub const TABLE: &str = "notifications";
pub const SEARCH_COLUMNS: &[&str] = &["title", "message"];

/// Notification categories; written by the services layer as side effects
/// of state transitions, or by staff announcements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    StatusChanged,
    Assigned,
    Reminder,
    SyncCompleted,
    System,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::StatusChanged => "status_changed",
            NotificationType::Assigned => "assigned",
            NotificationType::Reminder => "reminder",
            NotificationType::SyncCompleted => "sync_completed",
            NotificationType::System => "system",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

pub async fn insert(pool: &PgPool, notification: &Notification) -> Result<(), DatabaseError> {
    sqlx::query(
        "INSERT INTO notifications (id, owner_id, notification_type, title,
         message, is_read, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(notification.id)
    .bind(notification.owner_id)
    .bind(&notification.notification_type)
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(notification.is_read)
    .bind(notification.created_at)
    .execute(pool)
    .await?;

    Ok(())
}
