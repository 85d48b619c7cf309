use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OfferRow {
    pub id: Uuid,
    pub application_id: Uuid,
    pub designation: String,
    pub salary: i64,
    pub currency: String,
    pub joining_date: NaiveDate,
    pub notes: Option<String>,
    pub status: String,
    pub letter_s3_key: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
