use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

use super::text_enum;

text_enum! {
    /// Who a user is to the hiring process. Everything except `Candidate` is staff.
    pub enum Role {
        Candidate => "candidate",
        SubRecruiter => "sub_recruiter",
        Hod => "hod",
        Hr => "hr",
        Coo => "coo",
        Admin => "admin",
    }
}

impl Role {
    pub fn is_staff(self) -> bool {
        !matches!(self, Role::Candidate)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub external_id: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub department: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// The column carries a CHECK constraint; anything unparseable is treated as least privilege.
    pub fn role(&self) -> Role {
        Role::from_str(&self.role).unwrap_or(Role::Candidate)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProfileRow {
    pub user_id: Uuid,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub headline: Option<String>,
    pub skills: Vec<String>,
    pub experience_years: i32,
    pub education: Option<String>,
    pub resume_s3_key: Option<String>,
    pub resume_file_name: Option<String>,
    #[serde(skip_serializing)]
    pub resume_text: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AdminProfileRow {
    pub user_id: Uuid,
    pub designation: String,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub updated_at: DateTime<Utc>,
}
