//! Caller identity.
//!
//! Authentication happens upstream (gateway / SSO). The gateway forwards the
//! authenticated user's id in `X-User-Id`; this module resolves it to a `users`
//! row and offers role guards for handlers.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::{Role, User};
use crate::state::AppState;
use crate::users::queries::find_user;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn id(&self) -> Uuid {
        self.0.id
    }

    pub fn role(&self) -> Role {
        self.0.role()
    }

    pub fn is_staff(&self) -> bool {
        self.role().is_staff()
    }

    /// Passes if the caller holds one of `roles`. Admin always passes.
    pub fn require_role(&self, roles: &[Role]) -> Result<(), AppError> {
        let role = self.role();
        if role == Role::Admin || roles.contains(&role) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    pub fn require_staff(&self) -> Result<(), AppError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user_id = user_id_from_headers(&parts.headers)?;
        let user = find_user(&state.db, user_id)
            .await?
            .ok_or(AppError::Unauthorized)?;
        Ok(CurrentUser(user))
    }
}

fn user_id_from_headers(headers: &HeaderMap) -> Result<Uuid, AppError> {
    let raw = headers
        .get(USER_ID_HEADER)
        .ok_or(AppError::Unauthorized)?
        .to_str()
        .map_err(|_| AppError::Unauthorized)?;
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::Utc;

    fn make_user(role: Role) -> CurrentUser {
        CurrentUser(User {
            id: Uuid::new_v4(),
            external_id: "ext-1".to_string(),
            email: "someone@example.com".to_string(),
            full_name: "Someone".to_string(),
            role: role.as_str().to_string(),
            department: None,
            created_at: Utc::now(),
        })
    }

    #[test]
    fn test_header_parsing() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            user_id_from_headers(&headers),
            Err(AppError::Unauthorized)
        ));

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert!(matches!(
            user_id_from_headers(&headers),
            Err(AppError::Unauthorized)
        ));

        let id = Uuid::new_v4();
        headers.insert(
            USER_ID_HEADER,
            HeaderValue::from_str(&id.to_string()).unwrap(),
        );
        assert_eq!(user_id_from_headers(&headers).unwrap(), id);
    }

    #[test]
    fn test_require_role() {
        assert!(make_user(Role::Hr).require_role(&[Role::Hr]).is_ok());
        assert!(make_user(Role::Admin).require_role(&[Role::Hr]).is_ok());
        assert!(matches!(
            make_user(Role::Candidate).require_role(&[Role::Hr, Role::Hod]),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn test_staff_guard() {
        assert!(make_user(Role::SubRecruiter).require_staff().is_ok());
        assert!(make_user(Role::Candidate).require_staff().is_err());
    }
}
