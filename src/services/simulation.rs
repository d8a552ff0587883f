//! Deferred state-transition simulations.
//!
//! Bank syncs and consultation reminders are demo features: a detached task
//! sleeps for the configured delay and then mutates state. Pending timers
//! are not persisted; a process restart silently drops them. There is no
//! cancellation hook and no completion guarantee.

use tokio::time::Duration;
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::notification::NotificationType;
use crate::domain::status::{StatusFlow, SyncStatus};
use crate::services::notifications;

/// Flip a syncing integration to its terminal state after the configured
/// delay. The outcome is derived from the record id so repeated demo runs
/// behave consistently.
pub fn schedule_bank_sync(integration_id: Uuid, owner_id: Uuid) {
    let delay = Duration::from_millis(crate::config::config().simulation.sync_delay_ms);

    tokio::spawn(async move {
        tokio::time::sleep(delay).await;

        let outcome = if sync_succeeds(integration_id) {
            SyncStatus::Synced
        } else {
            SyncStatus::Failed
        };

        let pool = match DatabaseManager::pool().await {
            Ok(pool) => pool,
            Err(e) => {
                tracing::warn!("sync simulation for {} lost: {}", integration_id, e);
                return;
            }
        };

        // Guarded on sync_status so a concurrent manual reset wins
        let result = sqlx::query(
            "UPDATE bank_integrations
             SET sync_status = $1,
                 last_synced_at = CASE WHEN $1 = 'synced' THEN NOW() ELSE last_synced_at END,
                 updated_at = NOW()
             WHERE id = $2 AND sync_status = 'syncing'",
        )
        .bind(outcome.as_str())
        .bind(integration_id)
        .execute(&pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() > 0 => {
                crate::cache::ResponseCache::instance()
                    .invalidate_prefix("bank_integrations")
                    .await;
                let message = match outcome {
                    SyncStatus::Synced => "Bank account sync completed".to_string(),
                    _ => "Bank account sync failed; try again later".to_string(),
                };
                notifications::notify(
                    &pool,
                    owner_id,
                    NotificationType::SyncCompleted,
                    "Bank sync finished",
                    message,
                )
                .await;
            }
            Ok(_) => {
                tracing::debug!("sync simulation for {} superseded", integration_id);
            }
            Err(e) => {
                tracing::warn!("sync simulation for {} failed to persist: {}", integration_id, e);
            }
        }
    });
}

/// Deterministic demo outcome: most syncs succeed, a few fail
fn sync_succeeds(id: Uuid) -> bool {
    id.as_bytes()[0] % 4 != 0
}

/// Write a reminder notification for a scheduled consultation after the
/// configured delay.
pub fn schedule_consultation_reminder(consultation_id: Uuid, owner_id: Uuid, topic: String) {
    let delay = Duration::from_millis(crate::config::config().simulation.reminder_delay_ms);

    tokio::spawn(async move {
        tokio::time::sleep(delay).await;

        let pool = match DatabaseManager::pool().await {
            Ok(pool) => pool,
            Err(e) => {
                tracing::warn!("reminder for consultation {} lost: {}", consultation_id, e);
                return;
            }
        };

        // The consultation may have been cancelled or completed meanwhile
        let still_scheduled = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM consultations WHERE id = $1 AND status = 'scheduled'",
        )
        .bind(consultation_id)
        .fetch_one(&pool)
        .await
        .unwrap_or(0);

        if still_scheduled == 0 {
            return;
        }

        notifications::notify(
            &pool,
            owner_id,
            NotificationType::Reminder,
            "Upcoming consultation",
            format!("Reminder: your consultation on '{}' is coming up", topic),
        )
        .await;
    });
}
