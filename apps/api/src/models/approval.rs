use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One recorded decision in an approval chain. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApprovalStepRow {
    pub id: Uuid,
    pub subject_kind: String,
    pub subject_id: Uuid,
    pub stage: String,
    pub decision: String,
    pub decided_by: Uuid,
    pub comment: Option<String>,
    pub decided_at: DateTime<Utc>,
}
