//! Direct messages between candidates and staff.

use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::Role;

pub mod handlers;

pub const MAX_BODY_CHARS: usize = 5000;

/// Trims the body and checks its length.
pub fn validate_body(body: &str) -> Result<&str, AppError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(AppError::Validation("message body cannot be empty".to_string()));
    }
    if body.chars().count() > MAX_BODY_CHARS {
        return Err(AppError::Validation(format!(
            "message body cannot exceed {MAX_BODY_CHARS} characters"
        )));
    }
    Ok(body)
}

/// Candidates may only write to staff; staff may write to anyone.
pub fn may_message(
    sender_id: Uuid,
    sender_role: Role,
    recipient_id: Uuid,
    recipient_role: Role,
) -> Result<(), AppError> {
    if sender_id == recipient_id {
        return Err(AppError::Validation(
            "you cannot message yourself".to_string(),
        ));
    }
    if !sender_role.is_staff() && !recipient_role.is_staff() {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_is_trimmed_and_bounded() {
        assert_eq!(validate_body("  hello \n").unwrap(), "hello");
        assert!(validate_body("   ").is_err());
        assert!(validate_body(&"x".repeat(MAX_BODY_CHARS)).is_ok());
        assert!(validate_body(&"x".repeat(MAX_BODY_CHARS + 1)).is_err());
    }

    #[test]
    fn test_body_limit_counts_characters() {
        // multi-byte characters count once each
        assert!(validate_body(&"é".repeat(MAX_BODY_CHARS)).is_ok());
    }

    #[test]
    fn test_candidates_only_reach_staff() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(may_message(a, Role::Candidate, b, Role::Hr).is_ok());
        assert!(matches!(
            may_message(a, Role::Candidate, b, Role::Candidate),
            Err(AppError::Forbidden)
        ));
        assert!(may_message(a, Role::Hod, b, Role::Candidate).is_ok());
        assert!(may_message(a, Role::Hr, a, Role::Hr).is_err());
    }
}
