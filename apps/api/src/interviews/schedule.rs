use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::interview::{InterviewMode, InterviewStatus, Recommendation};

pub const MIN_DURATION_MINUTES: i32 = 15;
pub const MAX_DURATION_MINUTES: i32 = 480;
pub const DEFAULT_DURATION_MINUTES: i32 = 60;

/// Start must be in the future and the length within bounds.
pub fn validate_slot(
    scheduled_at: DateTime<Utc>,
    duration_minutes: i32,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if scheduled_at <= now {
        return Err(AppError::Validation(
            "scheduled_at must be in the future".to_string(),
        ));
    }
    if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&duration_minutes) {
        return Err(AppError::Validation(format!(
            "duration_minutes must be between {MIN_DURATION_MINUTES} and {MAX_DURATION_MINUTES}"
        )));
    }
    Ok(())
}

/// Half-open intervals `[start, start + minutes)` overlap.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_minutes: i32,
    b_start: DateTime<Utc>,
    b_minutes: i32,
) -> bool {
    let a_end = a_start + Duration::minutes(i64::from(a_minutes));
    let b_end = b_start + Duration::minutes(i64::from(b_minutes));
    a_start < b_end && b_start < a_end
}

/// Deduplicates the panel, preserving order. At least one interviewer is required.
pub fn normalize_interviewers(ids: &[Uuid]) -> Result<Vec<Uuid>, AppError> {
    let mut panel: Vec<Uuid> = Vec::with_capacity(ids.len());
    for id in ids {
        if !panel.contains(id) {
            panel.push(*id);
        }
    }
    if panel.is_empty() {
        return Err(AppError::Validation(
            "at least one interviewer is required".to_string(),
        ));
    }
    Ok(panel)
}

pub fn resolve_location(
    mode: InterviewMode,
    location: Option<&str>,
) -> Result<Option<String>, AppError> {
    let location = location
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string);
    if mode == InterviewMode::InPerson && location.is_none() {
        return Err(AppError::Validation(
            "in-person interviews need a location".to_string(),
        ));
    }
    Ok(location)
}

/// Outcome recorded against a scheduled interview.
#[derive(Debug, PartialEq)]
pub struct Outcome {
    pub status: InterviewStatus,
    pub rating: Option<i32>,
    pub recommendation: Option<Recommendation>,
}

pub fn validate_outcome(
    status: InterviewStatus,
    rating: Option<i32>,
    recommendation: Option<Recommendation>,
) -> Result<Outcome, AppError> {
    if let Some(r) = rating {
        if !(1..=5).contains(&r) {
            return Err(AppError::Validation("rating must be between 1 and 5".to_string()));
        }
    }
    match status {
        InterviewStatus::Completed => {
            if rating.is_none() || recommendation.is_none() {
                return Err(AppError::Validation(
                    "completed interviews need a rating and a recommendation".to_string(),
                ));
            }
            Ok(Outcome {
                status,
                rating,
                recommendation,
            })
        }
        // Nothing to rate when the candidate never showed up
        InterviewStatus::NoShow => Ok(Outcome {
            status,
            rating: None,
            recommendation: None,
        }),
        other => Err(AppError::Validation(format!(
            "feedback status must be completed or no_show, not {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 3, 4, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_slot_must_be_in_future() {
        let now = at(12, 0);
        assert!(validate_slot(at(11, 0), 60, now).is_err());
        assert!(validate_slot(at(12, 0), 60, now).is_err());
        assert!(validate_slot(at(13, 0), 60, now).is_ok());
    }

    #[test]
    fn test_duration_bounds() {
        let now = at(8, 0);
        assert!(validate_slot(at(9, 0), 14, now).is_err());
        assert!(validate_slot(at(9, 0), 15, now).is_ok());
        assert!(validate_slot(at(9, 0), 480, now).is_ok());
        assert!(validate_slot(at(9, 0), 481, now).is_err());
    }

    #[test]
    fn test_overlaps() {
        // 10:00-11:00 vs 10:30-11:30
        assert!(overlaps(at(10, 0), 60, at(10, 30), 60));
        // back-to-back slots do not clash
        assert!(!overlaps(at(10, 0), 60, at(11, 0), 30));
        assert!(!overlaps(at(11, 0), 30, at(10, 0), 60));
        // containment
        assert!(overlaps(at(9, 0), 240, at(10, 0), 15));
    }

    #[test]
    fn test_normalize_interviewers_dedups() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(normalize_interviewers(&[a, b, a]).unwrap(), vec![a, b]);
        assert!(normalize_interviewers(&[]).is_err());
    }

    #[test]
    fn test_in_person_needs_location() {
        assert!(resolve_location(InterviewMode::InPerson, Some("  ")).is_err());
        assert_eq!(
            resolve_location(InterviewMode::InPerson, Some(" HQ, room 4 ")).unwrap(),
            Some("HQ, room 4".to_string())
        );
        assert_eq!(resolve_location(InterviewMode::Video, None).unwrap(), None);
    }

    #[test]
    fn test_completed_needs_rating_and_recommendation() {
        assert!(validate_outcome(InterviewStatus::Completed, Some(4), None).is_err());
        assert!(validate_outcome(InterviewStatus::Completed, None, Some(Recommendation::Hire)).is_err());
        let outcome =
            validate_outcome(InterviewStatus::Completed, Some(4), Some(Recommendation::Hire)).unwrap();
        assert_eq!(outcome.rating, Some(4));
    }

    #[test]
    fn test_rating_range_and_no_show() {
        assert!(validate_outcome(InterviewStatus::Completed, Some(6), Some(Recommendation::Hire)).is_err());
        let outcome = validate_outcome(InterviewStatus::NoShow, None, None).unwrap();
        assert_eq!(outcome.status, InterviewStatus::NoShow);
        assert!(validate_outcome(InterviewStatus::Cancelled, None, None).is_err());
    }
}
