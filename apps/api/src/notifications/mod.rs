//! Notifications, persisted per recipient and then pushed live.
//!
//! Delivery order: INSERT into `notifications`, broadcast on the in-process
//! channel (feeds SSE subscribers), PUBLISH to `notifications:{user_id}` in
//! Redis for other instances. Publishing runs on a spawned task so a slow or
//! unreachable Redis never holds up the request. Nothing here fails a caller;
//! errors are logged.

use std::collections::BTreeSet;

use redis::AsyncCommands;
use sqlx::PgPool;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::notification::NotificationRow;
use crate::models::user::Role;

pub mod handlers;

const CHANNEL_CAPACITY: usize = 256;

/// Content of a notification before it is addressed.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub kind: &'static str,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}

impl NewNotification {
    pub fn new(kind: &'static str, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            link: None,
        }
    }

    pub fn link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<NotificationRow>,
    redis: redis::Client,
}

impl Notifier {
    pub fn new(redis: redis::Client) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx, redis }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationRow> {
        self.tx.subscribe()
    }

    /// Notifies each distinct recipient once. Never fails the caller.
    pub async fn notify(&self, pool: &PgPool, recipients: &[Uuid], notification: NewNotification) {
        let recipients = distinct_recipients(recipients);
        if recipients.is_empty() {
            return;
        }
        match persist(pool, &recipients, &notification).await {
            Ok(rows) => {
                for row in &rows {
                    self.broadcast(row.clone());
                }
                self.publish_in_background(rows);
            }
            Err(e) => warn!(
                "Failed to store '{}' notification for {} recipient(s): {e}",
                notification.kind,
                recipients.len()
            ),
        }
    }

    pub async fn notify_user(&self, pool: &PgPool, recipient: Uuid, notification: NewNotification) {
        self.notify(pool, &[recipient], notification).await;
    }

    /// Notifies every holder of `role`, narrowed to `department` when anyone there holds it.
    pub async fn notify_role(
        &self,
        pool: &PgPool,
        role: Role,
        department: Option<&str>,
        notification: NewNotification,
    ) {
        match role_recipients(pool, role, department).await {
            Ok(recipients) => self.notify(pool, &recipients, notification).await,
            Err(e) => warn!("Failed to resolve {role} recipients: {e}"),
        }
    }

    fn broadcast(&self, row: NotificationRow) {
        // No live subscribers is the normal case
        if self.tx.send(row).is_err() {
            debug!("No SSE subscribers connected");
        }
    }

    /// Publishes a batch over a single connection, off the request path.
    fn publish_in_background(&self, rows: Vec<NotificationRow>) {
        if rows.is_empty() {
            return;
        }
        let redis = self.redis.clone();
        tokio::spawn(async move {
            if let Err(e) = publish_all(&redis, &rows).await {
                warn!("Redis publish of {} notification(s) failed: {e}", rows.len());
            }
        });
    }
}

fn channel_for(recipient_id: Uuid) -> String {
    format!("notifications:{recipient_id}")
}

async fn publish_all(redis: &redis::Client, rows: &[NotificationRow]) -> redis::RedisResult<()> {
    let mut conn = redis.get_multiplexed_async_connection().await?;
    for row in rows {
        match serde_json::to_string(row) {
            Ok(payload) => {
                let _: i64 = conn.publish(channel_for(row.recipient_id), payload).await?;
            }
            Err(e) => warn!("Failed to serialize notification {}: {e}", row.id),
        }
    }
    Ok(())
}

fn distinct_recipients(recipients: &[Uuid]) -> Vec<Uuid> {
    recipients
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

async fn persist(
    pool: &PgPool,
    recipients: &[Uuid],
    notification: &NewNotification,
) -> Result<Vec<NotificationRow>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut rows = Vec::with_capacity(recipients.len());
    for recipient in recipients {
        let row = sqlx::query_as::<_, NotificationRow>(
            r#"
            INSERT INTO notifications (id, recipient_id, kind, title, message, link)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(recipient)
        .bind(notification.kind)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.link)
        .fetch_one(&mut *tx)
        .await?;
        rows.push(row);
    }
    tx.commit().await?;
    Ok(rows)
}

async fn role_recipients(
    pool: &PgPool,
    role: Role,
    department: Option<&str>,
) -> Result<Vec<Uuid>, sqlx::Error> {
    if let Some(department) = department {
        let scoped: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM users WHERE role = $1 AND lower(department) = lower($2)",
        )
        .bind(role.as_str())
        .bind(department)
        .fetch_all(pool)
        .await?;
        if !scoped.is_empty() {
            return Ok(scoped);
        }
    }
    sqlx::query_scalar("SELECT id FROM users WHERE role = $1")
        .bind(role.as_str())
        .fetch_all(pool)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_row(recipient_id: Uuid) -> NotificationRow {
        NotificationRow {
            id: Uuid::new_v4(),
            recipient_id,
            kind: "message".to_string(),
            title: "New message".to_string(),
            message: "Hello".to_string(),
            link: None,
            read_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_recipients_are_deduplicated() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let distinct = distinct_recipients(&[a, b, a, a]);
        assert_eq!(distinct.len(), 2);
        assert!(distinct.contains(&a) && distinct.contains(&b));
    }

    #[test]
    fn test_builder_sets_link() {
        let n = NewNotification::new("offer", "Offer sent", "Check your inbox").link("/offers/1");
        assert_eq!(n.link.as_deref(), Some("/offers/1"));
        assert_eq!(n.kind, "offer");
    }

    #[test]
    fn test_channel_is_per_recipient() {
        let recipient = Uuid::new_v4();
        assert_eq!(channel_for(recipient), format!("notifications:{recipient}"));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_subscribers_without_waiting_on_redis() {
        let notifier = Notifier::new(redis::Client::open("redis://10.255.255.1:6379/").unwrap());
        let mut rx = notifier.subscribe();
        let recipient = Uuid::new_v4();
        let row = make_row(recipient);
        notifier.broadcast(row.clone());
        notifier.publish_in_background(vec![row]);
        // The publish task may still be stuck connecting; the subscriber already has the row
        let received = tokio::time::timeout(std::time::Duration::from_millis(100), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.recipient_id, recipient);
    }
}
