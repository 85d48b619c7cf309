use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::errors::{conflict_on_unique, AppError};
use crate::matching::extract::extract_text;
use crate::matching::keywords::normalize_skills;
use crate::models::user::{AdminProfileRow, ProfileRow, Role, User};
use crate::state::AppState;
use crate::storage::{content_type_or_default, put_object, read_upload, resume_key};
use crate::users::queries::{find_admin_profile, find_profile, list_staff};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub external_id: String,
    pub email: String,
    pub full_name: String,
    pub role: Option<Role>,
    pub department: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_profile: Option<AdminProfileRow>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    pub phone: Option<String>,
    pub location: Option<String>,
    pub headline: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experience_years: i32,
    pub education: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdminProfileUpdate {
    pub designation: String,
    pub department: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StaffQuery {
    pub role: Option<Role>,
}

#[derive(Debug, Serialize)]
pub struct ResumeUploadResponse {
    pub resume_s3_key: String,
    pub resume_file_name: String,
    pub extracted_characters: usize,
}

/// Validated registration: the role to grant and the normalised email.
#[derive(Debug, PartialEq)]
struct Registration {
    role: Role,
    email: String,
}

fn validate_registration(
    req: &RegisterRequest,
    caller: Option<Role>,
) -> Result<Registration, AppError> {
    if req.external_id.trim().is_empty() {
        return Err(AppError::Validation("external_id is required".to_string()));
    }
    if req.full_name.trim().is_empty() {
        return Err(AppError::Validation("full_name is required".to_string()));
    }
    let email = req.email.trim().to_lowercase();
    let valid_email = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid_email {
        return Err(AppError::Validation(format!("'{}' is not a valid email", req.email)));
    }

    let role = req.role.unwrap_or(Role::Candidate);
    if role != Role::Candidate && caller != Some(Role::Admin) {
        return Err(AppError::Forbidden);
    }

    Ok(Registration { role, email })
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// POST /api/v1/users
///
/// Self-registration creates candidates. Staff accounts are created by an admin.
pub async fn handle_register(
    State(state): State<AppState>,
    caller: Option<CurrentUser>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let registration = validate_registration(&req, caller.as_ref().map(CurrentUser::role))?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, external_id, email, full_name, role, department)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(req.external_id.trim())
    .bind(&registration.email)
    .bind(req.full_name.trim())
    .bind(registration.role.as_str())
    .bind(trimmed(req.department))
    .fetch_one(&state.db)
    .await
    .map_err(|e| conflict_on_unique(e, "a user with this email or external id already exists"))?;

    info!("Registered {} user {}", registration.role, user.id);
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/v1/users/me
pub async fn handle_me(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<MeResponse>, AppError> {
    let (profile, admin_profile) = if user.is_staff() {
        (None, find_admin_profile(&state.db, user.id()).await?)
    } else {
        (find_profile(&state.db, user.id()).await?, None)
    };
    Ok(Json(MeResponse {
        user: user.0,
        profile,
        admin_profile,
    }))
}

/// PUT /api/v1/users/me/profile
pub async fn handle_upsert_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<ProfileUpdate>,
) -> Result<Json<ProfileRow>, AppError> {
    if user.role() != Role::Candidate {
        return Err(AppError::Forbidden);
    }
    if !(0..=60).contains(&req.experience_years) {
        return Err(AppError::Validation(
            "experience_years must be between 0 and 60".to_string(),
        ));
    }

    let profile = sqlx::query_as::<_, ProfileRow>(
        r#"
        INSERT INTO profiles (user_id, phone, location, headline, skills, experience_years, education)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (user_id) DO UPDATE SET
            phone = EXCLUDED.phone,
            location = EXCLUDED.location,
            headline = EXCLUDED.headline,
            skills = EXCLUDED.skills,
            experience_years = EXCLUDED.experience_years,
            education = EXCLUDED.education,
            updated_at = now()
        RETURNING *
        "#,
    )
    .bind(user.id())
    .bind(trimmed(req.phone))
    .bind(trimmed(req.location))
    .bind(trimmed(req.headline))
    .bind(normalize_skills(&req.skills))
    .bind(req.experience_years)
    .bind(trimmed(req.education))
    .fetch_one(&state.db)
    .await?;

    Ok(Json(profile))
}

/// POST /api/v1/users/me/resume
///
/// Stores the candidate's default resume and its extracted text.
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> Result<Json<ResumeUploadResponse>, AppError> {
    if user.role() != Role::Candidate {
        return Err(AppError::Forbidden);
    }
    let file = read_upload(multipart, state.config.max_upload_bytes)
        .await?
        .require_file()?;

    let text = extract_text(&file.file_name, file.content_type.as_deref(), file.bytes.clone()).await?;
    let key = resume_key(user.id(), &file.file_name);
    put_object(
        &state.s3,
        &state.config.s3_bucket,
        &key,
        file.bytes.clone(),
        content_type_or_default(&file),
    )
    .await?;

    sqlx::query(
        r#"
        INSERT INTO profiles (user_id, resume_s3_key, resume_file_name, resume_text)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id) DO UPDATE SET
            resume_s3_key = EXCLUDED.resume_s3_key,
            resume_file_name = EXCLUDED.resume_file_name,
            resume_text = EXCLUDED.resume_text,
            updated_at = now()
        "#,
    )
    .bind(user.id())
    .bind(&key)
    .bind(&file.file_name)
    .bind(&text)
    .execute(&state.db)
    .await?;

    info!("Stored resume for candidate {} at {key}", user.id());
    Ok(Json(ResumeUploadResponse {
        resume_s3_key: key,
        resume_file_name: file.file_name,
        extracted_characters: text.chars().count(),
    }))
}

/// PUT /api/v1/users/me/admin-profile
pub async fn handle_upsert_admin_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<AdminProfileUpdate>,
) -> Result<Json<AdminProfileRow>, AppError> {
    user.require_staff()?;
    if req.designation.trim().is_empty() {
        return Err(AppError::Validation("designation is required".to_string()));
    }

    let profile = sqlx::query_as::<_, AdminProfileRow>(
        r#"
        INSERT INTO admin_profiles (user_id, designation, department, phone)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id) DO UPDATE SET
            designation = EXCLUDED.designation,
            department = EXCLUDED.department,
            phone = EXCLUDED.phone,
            updated_at = now()
        RETURNING *
        "#,
    )
    .bind(user.id())
    .bind(req.designation.trim())
    .bind(trimmed(req.department))
    .bind(trimmed(req.phone))
    .fetch_one(&state.db)
    .await?;

    Ok(Json(profile))
}

/// GET /api/v1/users/staff
pub async fn handle_list_staff(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<StaffQuery>,
) -> Result<Json<Vec<User>>, AppError> {
    user.require_staff()?;
    Ok(Json(list_staff(&state.db, params.role).await?))
}
