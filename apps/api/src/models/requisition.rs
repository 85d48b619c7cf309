use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::text_enum;

text_enum! {
    pub enum EmploymentType {
        FullTime => "full_time",
        PartTime => "part_time",
        Contract => "contract",
        Internship => "internship",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RequisitionRow {
    pub id: Uuid,
    pub raised_by: Uuid,
    pub department: String,
    pub position_title: String,
    pub headcount: i32,
    pub employment_type: String,
    pub min_salary: Option<i64>,
    pub max_salary: Option<i64>,
    pub experience_min_years: i32,
    pub required_skills: Vec<String>,
    pub justification: String,
    pub status: String,
    pub job_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
