use anyhow::{Context, Result};
use sqlx::PgPool;
use trade_sentinel_core::{NotificationEnvelope, NotificationPayload, TargetSpec};

use crate::models::NotificationRecord;

/// Repository for the append-only notification feed.
#[derive(Debug, Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Appends a notification for an account.
    ///
    /// The payload is stored as versioned JSON; its type tag is duplicated
    /// into a dedicated column for filtering.
    ///
    /// # Errors
    /// Returns an error if serialization or the insert fails.
    pub async fn append(
        &self,
        account_id: i32,
        trade_id: Option<i64>,
        payload: NotificationPayload,
    ) -> Result<()> {
        let type_tag = payload.type_tag();
        let envelope = NotificationEnvelope::new(payload);
        let data = serde_json::to_value(&envelope)
            .context("Failed to serialize notification payload")?;

        sqlx::query(
            r#"
            INSERT INTO trade_notifications (account_id, trade_id, notification_type, data, read)
            VALUES ($1, $2, $3, $4, FALSE)
            "#,
        )
        .bind(account_id)
        .bind(trade_id)
        .bind(type_tag)
        .bind(data)
        .execute(&self.pool)
        .await
        .context("Failed to insert notification")?;

        Ok(())
    }

    /// Unread notifications for an account, newest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn unread(&self, account_id: i32, limit: i64) -> Result<Vec<NotificationRecord>> {
        let rows = sqlx::query_as::<_, NotificationRecord>(
            r#"
            SELECT id, account_id, trade_id, notification_type, data, read, created_at
            FROM trade_notifications
            WHERE account_id = $1
              AND read = FALSE
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(account_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch unread notifications")?;

        Ok(rows)
    }

    /// Marks a notification as read.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn mark_read(&self, notification_id: i64) -> Result<()> {
        sqlx::query("UPDATE trade_notifications SET read = TRUE WHERE id = $1")
            .bind(notification_id)
            .execute(&self.pool)
            .await
            .context("Failed to mark notification read")?;

        Ok(())
    }

    /// Latest user-adjusted target ladder recorded for a trade, if any.
    ///
    /// Users can post revised targets before a fill lands; materialization
    /// prefers these over the signal's original ladder.
    ///
    /// # Errors
    /// Returns an error if the query fails or the stored payload is invalid.
    pub async fn latest_custom_levels(&self, trade_id: i64) -> Result<Option<Vec<TargetSpec>>> {
        let data = sqlx::query_scalar::<_, serde_json::Value>(
            r#"
            SELECT data
            FROM trade_notifications
            WHERE trade_id = $1
              AND notification_type = 'custom_levels_pending'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(trade_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch custom levels")?;

        let Some(data) = data else {
            return Ok(None);
        };

        let envelope: NotificationEnvelope = serde_json::from_value(data)
            .context("Invalid custom-levels notification payload")?;

        match envelope.payload {
            NotificationPayload::CustomLevelsPending { targets } => Ok(Some(targets)),
            _ => Ok(None),
        }
    }
}
