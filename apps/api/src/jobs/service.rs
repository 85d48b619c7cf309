use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::matching::keywords::{derive_keywords, normalize_skills, DEFAULT_KEYWORD_LIMIT};
use crate::models::job::{JobRow, JobStatus};

pub async fn find_job(pool: &PgPool, id: Uuid) -> Result<JobRow, AppError> {
    sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))
}

/// Explicit keywords win; otherwise they are derived from the description.
pub fn resolve_keywords(explicit: Option<&[String]>, description: &str) -> Vec<String> {
    match explicit {
        Some(keywords) if !keywords.is_empty() => normalize_skills(keywords),
        _ => derive_keywords(description, DEFAULT_KEYWORD_LIMIT),
    }
}

pub fn validate_closes_at(closes_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Result<(), AppError> {
    if closes_at.is_some_and(|at| at <= now) {
        return Err(AppError::Validation("closes_at must be in the future".to_string()));
    }
    Ok(())
}

/// Allowed lifecycle moves: draft → open → closed.
pub fn check_lifecycle(from: JobStatus, to: JobStatus) -> Result<(), AppError> {
    match (from, to) {
        (JobStatus::Draft, JobStatus::Open) | (JobStatus::Open, JobStatus::Closed) => Ok(()),
        _ => Err(AppError::Conflict(format!("job cannot move from {from} to {to}"))),
    }
}

/// Candidates only ever see open postings.
pub fn visible_to_candidates(job: &JobRow) -> bool {
    job.status == JobStatus::Open.as_str()
}

/// Escapes LIKE wildcards so a search term matches literally.
pub fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn deadline_passed(closes_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    closes_at.is_some_and(|at| at <= now)
}

/// Open, and its closing date (if any) has not passed.
pub fn accepts_applications(job: &JobRow, now: DateTime<Utc>) -> bool {
    visible_to_candidates(job) && !deadline_passed(job.closes_at, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_explicit_keywords_are_normalised() {
        let explicit = vec!["Kafka".to_string(), "kafka".to_string()];
        assert_eq!(resolve_keywords(Some(explicit.as_slice()), "ignored"), vec!["kafka"]);
    }

    #[test]
    fn test_empty_explicit_keywords_fall_back_to_description() {
        let empty: Vec<String> = Vec::new();
        let keywords = resolve_keywords(Some(empty.as_slice()), "Build Kafka pipelines with Kafka Streams");
        assert_eq!(keywords[0], "kafka");
    }

    #[test]
    fn test_lifecycle() {
        assert!(check_lifecycle(JobStatus::Draft, JobStatus::Open).is_ok());
        assert!(check_lifecycle(JobStatus::Open, JobStatus::Closed).is_ok());
        assert!(matches!(
            check_lifecycle(JobStatus::Closed, JobStatus::Open),
            Err(AppError::Conflict(_))
        ));
        assert!(check_lifecycle(JobStatus::Draft, JobStatus::Closed).is_err());
    }

    #[test]
    fn test_closes_at_in_past_rejected() {
        let now = Utc::now();
        assert!(validate_closes_at(Some(now - Duration::hours(1)), now).is_err());
        assert!(validate_closes_at(Some(now + Duration::days(7)), now).is_ok());
        assert!(validate_closes_at(None, now).is_ok());
    }

    #[test]
    fn test_deadline_closes_applications() {
        let now = Utc::now();
        assert!(deadline_passed(Some(now - Duration::minutes(1)), now));
        assert!(deadline_passed(Some(now), now));
        assert!(!deadline_passed(Some(now + Duration::days(1)), now));
        assert!(!deadline_passed(None, now));
    }

    #[test]
    fn test_escape_like_handles_backslash_first() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("C:\\dev"), "C:\\\\dev");
        assert_eq!(escape_like("a\\%"), "a\\\\\\%");
    }
}
