use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::text_enum;

text_enum! {
    pub enum JobStatus {
        Draft => "draft",
        Open => "open",
        Closed => "closed",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub requisition_id: Uuid,
    pub title: String,
    pub description: String,
    pub department: String,
    pub location: String,
    pub employment_type: String,
    pub required_skills: Vec<String>,
    pub keywords: Vec<String>,
    pub experience_min_years: i32,
    pub min_salary: Option<i64>,
    pub max_salary: Option<i64>,
    pub openings: i32,
    pub status: String,
    pub posted_by: Uuid,
    pub posted_at: Option<DateTime<Utc>>,
    pub closes_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
