use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use super::{ApprovalStage, Decision, SubjectKind};
use crate::models::approval::ApprovalStepRow;

/// Appends a decision to the approval trail. Never updates existing rows.
pub async fn record_decision(
    conn: &mut PgConnection,
    kind: SubjectKind,
    subject_id: Uuid,
    stage: ApprovalStage,
    decision: Decision,
    decided_by: Uuid,
    comment: Option<&str>,
) -> Result<ApprovalStepRow, sqlx::Error> {
    sqlx::query_as::<_, ApprovalStepRow>(
        r#"
        INSERT INTO approval_steps
            (id, subject_kind, subject_id, stage, decision, decided_by, comment)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(kind.as_str())
    .bind(subject_id)
    .bind(stage.as_str())
    .bind(decision.as_str())
    .bind(decided_by)
    .bind(comment)
    .fetch_one(conn)
    .await
}

/// Decisions for one subject, oldest first.
pub async fn list_history<'e>(
    executor: impl PgExecutor<'e>,
    kind: SubjectKind,
    subject_id: Uuid,
) -> Result<Vec<ApprovalStepRow>, sqlx::Error> {
    sqlx::query_as::<_, ApprovalStepRow>(
        r#"
        SELECT * FROM approval_steps
        WHERE subject_kind = $1 AND subject_id = $2
        ORDER BY decided_at ASC, id ASC
        "#,
    )
    .bind(kind.as_str())
    .bind(subject_id)
    .fetch_all(executor)
    .await
}

pub async fn has_decisions(
    pool: &PgPool,
    kind: SubjectKind,
    subject_id: Uuid,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM approval_steps WHERE subject_kind = $1 AND subject_id = $2)",
    )
    .bind(kind.as_str())
    .bind(subject_id)
    .fetch_one(pool)
    .await
}
