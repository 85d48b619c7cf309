use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::applications::service::find_visible_application;
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::messages::{may_message, validate_body};
use crate::models::message::{ConversationRow, MessageRow};
use crate::notifications::NewNotification;
use crate::state::AppState;
use crate::users::queries::find_user;

const PREVIEW_CHARS: usize = 120;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub recipient_id: Uuid,
    pub application_id: Option<Uuid>,
    pub body: String,
}

fn preview(body: &str) -> String {
    if body.chars().count() <= PREVIEW_CHARS {
        return body.to_string();
    }
    let cut: String = body.chars().take(PREVIEW_CHARS).collect();
    format!("{}…", cut.trim_end())
}

/// POST /api/v1/messages
pub async fn handle_send(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageRow>), AppError> {
    let body = validate_body(&req.body)?;
    let recipient = find_user(&state.db, req.recipient_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", req.recipient_id)))?;
    may_message(user.id(), user.role(), recipient.id, recipient.role())?;
    if let Some(application_id) = req.application_id {
        find_visible_application(&state.db, &user, application_id).await?;
    }

    let message = sqlx::query_as::<_, MessageRow>(
        r#"
        INSERT INTO messages (id, sender_id, recipient_id, application_id, body)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.id())
    .bind(recipient.id)
    .bind(req.application_id)
    .bind(body)
    .fetch_one(&state.db)
    .await?;

    info!("Message {} from {} to {}", message.id, user.id(), recipient.id);

    state
        .notifier
        .notify_user(
            &state.db,
            recipient.id,
            NewNotification::new(
                "message",
                format!("New message from {}", user.0.full_name),
                preview(body),
            )
            .link(format!("/messages/{}", user.id())),
        )
        .await;

    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /api/v1/messages/conversations
pub async fn handle_conversations(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<ConversationRow>>, AppError> {
    let rows = sqlx::query_as::<_, ConversationRow>(
        r#"
        WITH mine AS (
            SELECT m.*,
                   CASE WHEN m.sender_id = $1 THEN m.recipient_id ELSE m.sender_id END AS counterpart_id
            FROM messages m
            WHERE m.sender_id = $1 OR m.recipient_id = $1
        ),
        latest AS (
            SELECT DISTINCT ON (counterpart_id) counterpart_id, body, sender_id, created_at
            FROM mine
            ORDER BY counterpart_id, created_at DESC, id DESC
        )
        SELECT l.counterpart_id,
               u.full_name AS counterpart_name,
               l.body AS last_body,
               l.sender_id AS last_sender_id,
               l.created_at AS last_at,
               (SELECT COUNT(*) FROM messages x
                WHERE x.sender_id = l.counterpart_id AND x.recipient_id = $1 AND x.read_at IS NULL
               ) AS unread
        FROM latest l
        JOIN users u ON u.id = l.counterpart_id
        ORDER BY l.created_at DESC
        "#,
    )
    .bind(user.id())
    .fetch_all(&state.db)
    .await?;

    Ok(Json(rows))
}

/// GET /api/v1/messages/with/:user_id
///
/// The thread with one counterpart, oldest first. Marks what they sent as read.
pub async fn handle_thread(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(counterpart_id): Path<Uuid>,
) -> Result<Json<Vec<MessageRow>>, AppError> {
    if find_user(&state.db, counterpart_id).await?.is_none() {
        return Err(AppError::NotFound(format!("User {counterpart_id} not found")));
    }

    sqlx::query(
        r#"
        UPDATE messages SET read_at = now()
        WHERE sender_id = $1 AND recipient_id = $2 AND read_at IS NULL
        "#,
    )
    .bind(counterpart_id)
    .bind(user.id())
    .execute(&state.db)
    .await?;

    let rows = sqlx::query_as::<_, MessageRow>(
        r#"
        SELECT * FROM messages
        WHERE (sender_id = $1 AND recipient_id = $2)
           OR (sender_id = $2 AND recipient_id = $1)
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(user.id())
    .bind(counterpart_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_short_body_unchanged() {
        assert_eq!(preview("See you at 10"), "See you at 10");
    }

    #[test]
    fn test_preview_truncates_long_body() {
        let long = "word ".repeat(60);
        let p = preview(&long);
        assert!(p.ends_with('…'));
        assert!(p.chars().count() <= PREVIEW_CHARS + 1);
    }
}
