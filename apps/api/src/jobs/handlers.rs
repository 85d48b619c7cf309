use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use crate::approvals::ChainState;
use crate::auth::CurrentUser;
use crate::errors::{conflict_on_unique, AppError};
use crate::jobs::service::{
    check_lifecycle, escape_like, find_job, resolve_keywords, validate_closes_at,
    visible_to_candidates,
};
use crate::matching::keywords::normalize_skills;
use crate::matching::scorer::{JobProfile, MatchReport};
use crate::models::job::{JobRow, JobStatus};
use crate::models::user::Role;
use crate::requisitions::service::{find_requisition, validate_salary_range};
use crate::state::AppState;
use crate::users::queries::find_profile;

const POSTERS: &[Role] = &[Role::Hr, Role::SubRecruiter];
const PUBLISHERS: &[Role] = &[Role::Hr];

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub requisition_id: Uuid,
    pub title: Option<String>,
    pub description: String,
    pub location: String,
    pub openings: Option<i32>,
    pub required_skills: Option<Vec<String>>,
    pub keywords: Option<Vec<String>>,
    pub closes_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateJobRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub openings: Option<i32>,
    pub required_skills: Option<Vec<String>>,
    pub keywords: Option<Vec<String>>,
    pub experience_min_years: Option<i32>,
    pub min_salary: Option<i64>,
    pub max_salary: Option<i64>,
    pub closes_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<JobStatus>,
    pub department: Option<String>,
    pub q: Option<String>,
}

/// POST /api/v1/jobs
///
/// Posts a draft job for an approved requisition. One job per requisition.
pub async fn handle_create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<JobRow>), AppError> {
    user.require_role(POSTERS)?;
    if req.description.trim().is_empty() || req.location.trim().is_empty() {
        return Err(AppError::Validation(
            "description and location are required".to_string(),
        ));
    }
    validate_closes_at(req.closes_at, Utc::now())?;

    let requisition = find_requisition(&state.db, req.requisition_id).await?;
    if ChainState::from_str(&requisition.status)? != ChainState::Approved {
        return Err(AppError::UnprocessableEntity(format!(
            "requisition is {}; only approved requisitions can be posted",
            requisition.status
        )));
    }
    if requisition.job_id.is_some() {
        return Err(AppError::Conflict(
            "a job has already been posted for this requisition".to_string(),
        ));
    }

    let openings = req.openings.unwrap_or(requisition.headcount);
    if openings < 1 {
        return Err(AppError::Validation("openings must be at least 1".to_string()));
    }
    let title = req
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(requisition.position_title.as_str())
        .to_string();
    let skills = req
        .required_skills
        .as_deref()
        .map(normalize_skills)
        .unwrap_or_else(|| requisition.required_skills.clone());
    let keywords = resolve_keywords(req.keywords.as_deref(), &req.description);

    let mut tx = state.db.begin().await?;
    let job = sqlx::query_as::<_, JobRow>(
        r#"
        INSERT INTO jobs
            (id, requisition_id, title, description, department, location, employment_type,
             required_skills, keywords, experience_min_years, min_salary, max_salary,
             openings, status, posted_by, closes_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(requisition.id)
    .bind(&title)
    .bind(req.description.trim())
    .bind(&requisition.department)
    .bind(req.location.trim())
    .bind(&requisition.employment_type)
    .bind(&skills)
    .bind(&keywords)
    .bind(requisition.experience_min_years)
    .bind(requisition.min_salary)
    .bind(requisition.max_salary)
    .bind(openings)
    .bind(JobStatus::Draft.as_str())
    .bind(user.id())
    .bind(req.closes_at)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| conflict_on_unique(e, "a job has already been posted for this requisition"))?;

    let linked = sqlx::query("UPDATE requisitions SET job_id = $1, updated_at = now() WHERE id = $2 AND job_id IS NULL")
        .bind(job.id)
        .bind(requisition.id)
        .execute(&mut *tx)
        .await?;
    if linked.rows_affected() == 0 {
        return Err(AppError::Conflict(
            "a job has already been posted for this requisition".to_string(),
        ));
    }
    tx.commit().await?;

    info!("Job {} drafted from requisition {}", job.id, requisition.id);
    Ok((StatusCode::CREATED, Json(job)))
}

/// PUT /api/v1/jobs/:id
pub async fn handle_update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateJobRequest>,
) -> Result<Json<JobRow>, AppError> {
    user.require_role(POSTERS)?;
    let job = find_job(&state.db, id).await?;
    if job.status == JobStatus::Closed.as_str() {
        return Err(AppError::Conflict("closed jobs cannot be edited".to_string()));
    }
    validate_closes_at(req.closes_at, Utc::now())?;

    let description = req
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(job.description.as_str())
        .to_string();
    let keywords = match (&req.keywords, description != job.description) {
        (Some(explicit), _) => resolve_keywords(Some(explicit.as_slice()), &description),
        (None, true) => resolve_keywords(None, &description),
        (None, false) => job.keywords.clone(),
    };
    let openings = req.openings.unwrap_or(job.openings);
    if openings < 1 {
        return Err(AppError::Validation("openings must be at least 1".to_string()));
    }
    let experience_min_years = req.experience_min_years.unwrap_or(job.experience_min_years);
    if !(0..=60).contains(&experience_min_years) {
        return Err(AppError::Validation(
            "experience_min_years must be between 0 and 60".to_string(),
        ));
    }
    let min_salary = req.min_salary.or(job.min_salary);
    let max_salary = req.max_salary.or(job.max_salary);
    validate_salary_range(min_salary, max_salary)?;

    let updated = sqlx::query_as::<_, JobRow>(
        r#"
        UPDATE jobs SET
            title = $1, description = $2, location = $3, openings = $4,
            required_skills = $5, keywords = $6, experience_min_years = $7,
            min_salary = $8, max_salary = $9, closes_at = $10, updated_at = now()
        WHERE id = $11 AND status = $12
        RETURNING *
        "#,
    )
    .bind(
        req.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(job.title.as_str()),
    )
    .bind(&description)
    .bind(
        req.location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(job.location.as_str()),
    )
    .bind(openings)
    .bind(
        req.required_skills
            .as_deref()
            .map(normalize_skills)
            .unwrap_or_else(|| job.required_skills.clone()),
    )
    .bind(&keywords)
    .bind(experience_min_years)
    .bind(min_salary)
    .bind(max_salary)
    .bind(req.closes_at.or(job.closes_at))
    .bind(id)
    .bind(&job.status)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::Conflict("job changed while editing; reload and retry".to_string()))?;

    Ok(Json(updated))
}

async fn move_job(state: &AppState, id: Uuid, to: JobStatus) -> Result<JobRow, AppError> {
    let job = find_job(&state.db, id).await?;
    let from = JobStatus::from_str(&job.status)?;
    check_lifecycle(from, to)?;

    let updated = sqlx::query_as::<_, JobRow>(
        r#"
        UPDATE jobs SET
            status = $1,
            posted_at = CASE WHEN $1 = 'open' THEN now() ELSE posted_at END,
            updated_at = now()
        WHERE id = $2 AND status = $3
        RETURNING *
        "#,
    )
    .bind(to.as_str())
    .bind(id)
    .bind(from.as_str())
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::Conflict("job status changed concurrently".to_string()))?;

    info!("Job {id}: {from} → {to}");
    Ok(updated)
}

/// POST /api/v1/jobs/:id/publish
pub async fn handle_publish(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<JobRow>, AppError> {
    user.require_role(PUBLISHERS)?;
    Ok(Json(move_job(&state, id, JobStatus::Open).await?))
}

/// POST /api/v1/jobs/:id/close
pub async fn handle_close(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<JobRow>, AppError> {
    user.require_role(PUBLISHERS)?;
    Ok(Json(move_job(&state, id, JobStatus::Closed).await?))
}

/// GET /api/v1/jobs
pub async fn handle_list(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<JobRow>>, AppError> {
    let status = if user.is_staff() {
        params.status
    } else {
        Some(JobStatus::Open)
    };
    let search = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(|q| format!("%{}%", escape_like(q)));

    let rows = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT * FROM jobs
        WHERE ($1::text IS NULL OR status = $1)
          AND ($2::text IS NULL OR lower(department) = lower($2))
          AND ($3::text IS NULL OR title ILIKE $3 OR description ILIKE $3)
        ORDER BY COALESCE(posted_at, created_at) DESC
        "#,
    )
    .bind(status.map(JobStatus::as_str))
    .bind(params.department.as_deref())
    .bind(search)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(rows))
}

/// GET /api/v1/jobs/:id
pub async fn handle_get(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<JobRow>, AppError> {
    let job = find_job(&state.db, id).await?;
    if !user.is_staff() && !visible_to_candidates(&job) {
        return Err(AppError::NotFound(format!("Job {id} not found")));
    }
    Ok(Json(job))
}

/// GET /api/v1/jobs/:id/match
///
/// Scores the caller's stored resume against the job before they apply.
pub async fn handle_match(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchReport>, AppError> {
    if user.role() != Role::Candidate {
        return Err(AppError::Forbidden);
    }
    let job = find_job(&state.db, id).await?;
    if !visible_to_candidates(&job) {
        return Err(AppError::NotFound(format!("Job {id} not found")));
    }
    let resume_text = find_profile(&state.db, user.id())
        .await?
        .and_then(|p| p.resume_text)
        .ok_or_else(|| {
            AppError::UnprocessableEntity("upload a resume to your profile first".to_string())
        })?;

    let report = state
        .match_scorer
        .score(&resume_text, &JobProfile::from(&job))
        .await?;
    Ok(Json(report))
}
