use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::text_enum;

text_enum! {
    pub enum InterviewMode {
        InPerson => "in_person",
        Video => "video",
        Phone => "phone",
    }
}

impl InterviewMode {
    pub fn label(self) -> &'static str {
        match self {
            InterviewMode::InPerson => "in person",
            InterviewMode::Video => "video call",
            InterviewMode::Phone => "phone call",
        }
    }
}

text_enum! {
    pub enum InterviewStatus {
        Scheduled => "scheduled",
        Completed => "completed",
        Cancelled => "cancelled",
        NoShow => "no_show",
    }
}

text_enum! {
    pub enum Recommendation {
        StrongHire => "strong_hire",
        Hire => "hire",
        NoHire => "no_hire",
        StrongNoHire => "strong_no_hire",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InterviewRow {
    pub id: Uuid,
    pub application_id: Uuid,
    pub round: i32,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub mode: String,
    pub location: Option<String>,
    pub interviewer_ids: Vec<Uuid>,
    pub status: String,
    pub feedback: Option<String>,
    pub rating: Option<i32>,
    pub recommendation: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
