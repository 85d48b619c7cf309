use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::applications::service::{
    announce_status, close_open_work, current_status, find_visible_application, list_events,
    record_event, transition,
};
use crate::applications::status::ApplicationStatus;
use crate::auth::CurrentUser;
use crate::errors::{conflict_on_unique, AppError};
use crate::jobs::service::{accepts_applications, find_job};
use crate::mailer::templates;
use crate::matching::extract::extract_text;
use crate::matching::scorer::{JobProfile, MatchReport};
use crate::models::application::{ApplicationEventRow, ApplicationRow};
use crate::models::interview::InterviewRow;
use crate::models::offer::OfferRow;
use crate::models::onboarding::OnboardingDocumentRow;
use crate::models::user::Role;
use crate::notifications::NewNotification;
use crate::state::AppState;
use crate::storage::{
    content_type_or_default, discard_object, put_object, read_upload, resume_key,
};
use crate::users::queries::find_profile;

const MAX_COVER_LETTER_CHARS: usize = 10_000;

#[derive(Debug, Serialize)]
pub struct ApplyResponse {
    pub application: ApplicationRow,
    pub match_report: MatchReport,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub job_id: Option<Uuid>,
    pub status: Option<ApplicationStatus>,
    pub min_score: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct ApplicationDetail {
    pub application: ApplicationRow,
    pub job_title: String,
    pub history: Vec<ApplicationEventRow>,
    pub interviews: Vec<InterviewRow>,
    pub offer: Option<OfferRow>,
    pub documents: Vec<OnboardingDocumentRow>,
}

#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    pub status: ApplicationStatus,
    pub note: Option<String>,
}

/// Resume chosen for an application: either freshly uploaded or the profile default.
struct ResumeSource {
    s3_key: String,
    file_name: String,
    text: String,
}

/// POST /api/v1/jobs/:id/apply
///
/// Multipart: optional `file` (resume) and `cover_letter`. Without a file the
/// profile's stored resume is used.
pub async fn handle_apply(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(job_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ApplyResponse>), AppError> {
    if user.role() != Role::Candidate {
        return Err(AppError::Forbidden);
    }
    let job = find_job(&state.db, job_id).await?;
    if !accepts_applications(&job, Utc::now()) {
        return Err(AppError::UnprocessableEntity(
            "this job is not accepting applications".to_string(),
        ));
    }

    let already_applied: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM applications WHERE job_id = $1 AND candidate_id = $2)",
    )
    .bind(job_id)
    .bind(user.id())
    .fetch_one(&state.db)
    .await?;
    if already_applied {
        return Err(AppError::Conflict("you have already applied for this job".to_string()));
    }

    let form = read_upload(multipart, state.config.max_upload_bytes).await?;
    let cover_letter = form.field("cover_letter").map(|c| c.trim().to_string());
    if cover_letter
        .as_ref()
        .is_some_and(|c| c.chars().count() > MAX_COVER_LETTER_CHARS)
    {
        return Err(AppError::Validation(format!(
            "cover_letter cannot exceed {MAX_COVER_LETTER_CHARS} characters"
        )));
    }

    let uploaded_here = form.file.is_some();
    let resume = match form.file {
        Some(file) => {
            let text =
                extract_text(&file.file_name, file.content_type.as_deref(), file.bytes.clone())
                    .await?;
            let key = resume_key(user.id(), &file.file_name);
            put_object(
                &state.s3,
                &state.config.s3_bucket,
                &key,
                file.bytes.clone(),
                content_type_or_default(&file),
            )
            .await?;
            ResumeSource {
                s3_key: key,
                file_name: file.file_name,
                text,
            }
        }
        None => {
            let profile = find_profile(&state.db, user.id()).await?;
            match profile {
                Some(p) => match (p.resume_s3_key, p.resume_file_name, p.resume_text) {
                    (Some(s3_key), Some(file_name), Some(text)) => ResumeSource {
                        s3_key,
                        file_name,
                        text,
                    },
                    _ => return Err(no_resume()),
                },
                None => return Err(no_resume()),
            }
        }
    };

    let match_report = state
        .match_scorer
        .score(&resume.text, &JobProfile::from(&job))
        .await?;
    let recommended = match_report.score >= state.config.match_shortlist_threshold;

    let inserted = async {
        let mut tx = state.db.begin().await?;
        let application = sqlx::query_as::<_, ApplicationRow>(
            r#"
            INSERT INTO applications
                (id, job_id, candidate_id, status, resume_s3_key, resume_file_name,
                 resume_text, match_score, recommended, cover_letter)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(job_id)
        .bind(user.id())
        .bind(ApplicationStatus::Applied.as_str())
        .bind(&resume.s3_key)
        .bind(&resume.file_name)
        .bind(&resume.text)
        .bind(match_report.score as i32)
        .bind(recommended)
        .bind(&cover_letter)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "you have already applied for this job"))?;
        record_event(
            &mut tx,
            application.id,
            None,
            ApplicationStatus::Applied,
            user.id(),
            None,
        )
        .await?;
        tx.commit().await?;
        Ok::<_, AppError>(application)
    }
    .await;
    let application = match inserted {
        Ok(application) => application,
        Err(e) => {
            if uploaded_here {
                discard_object(&state.s3, &state.config.s3_bucket, &resume.s3_key).await;
            }
            return Err(e);
        }
    };

    info!(
        "Candidate {} applied to job {} (score {})",
        user.id(),
        job_id,
        match_report.score
    );

    state
        .notifier
        .notify_user(
            &state.db,
            job.posted_by,
            NewNotification::new(
                "application_received",
                format!("New application: {}", job.title),
                format!(
                    "{} applied (match score {}{})",
                    user.0.full_name,
                    match_report.score,
                    if recommended { ", recommended" } else { "" }
                ),
            )
            .link(format!("/applications/{}", application.id)),
        )
        .await;
    state.mailer.dispatch(templates::application_received(
        &user.0.email,
        &user.0.full_name,
        &job.title,
    ));

    Ok((
        StatusCode::CREATED,
        Json(ApplyResponse {
            application,
            match_report,
        }),
    ))
}

fn no_resume() -> AppError {
    AppError::UnprocessableEntity(
        "attach a resume or upload one to your profile before applying".to_string(),
    )
}

/// GET /api/v1/applications
pub async fn handle_list(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<ApplicationRow>>, AppError> {
    let candidate_filter = (!user.is_staff()).then(|| user.id());

    let rows = sqlx::query_as::<_, ApplicationRow>(
        r#"
        SELECT * FROM applications
        WHERE ($1::uuid IS NULL OR candidate_id = $1)
          AND ($2::uuid IS NULL OR job_id = $2)
          AND ($3::text IS NULL OR status = $3)
          AND ($4::int IS NULL OR match_score >= $4)
        ORDER BY match_score DESC, created_at ASC
        "#,
    )
    .bind(candidate_filter)
    .bind(params.job_id)
    .bind(params.status.map(ApplicationStatus::as_str))
    .bind(params.min_score)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(rows))
}

/// GET /api/v1/applications/:id
pub async fn handle_get(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApplicationDetail>, AppError> {
    let application = find_visible_application(&state.db, &user, id).await?;
    let job = find_job(&state.db, application.job_id).await?;
    let history = list_events(&state.db, id).await?;

    let interviews = sqlx::query_as::<_, InterviewRow>(
        "SELECT * FROM interviews WHERE application_id = $1 ORDER BY round ASC",
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    let offer = sqlx::query_as::<_, OfferRow>(
        r#"
        SELECT * FROM offers
        WHERE application_id = $1 AND ($2 OR status IN ('sent', 'accepted', 'declined'))
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(id)
    .bind(user.is_staff())
    .fetch_optional(&state.db)
    .await?;

    let documents = sqlx::query_as::<_, OnboardingDocumentRow>(
        "SELECT * FROM onboarding_documents WHERE application_id = $1 ORDER BY doc_type ASC",
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(ApplicationDetail {
        application,
        job_title: job.title,
        history,
        interviews,
        offer,
        documents,
    }))
}

/// POST /api/v1/applications/:id/status
///
/// Staff move applications through screening. Offer stages belong to the offer workflow.
pub async fn handle_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusChangeRequest>,
) -> Result<Json<ApplicationRow>, AppError> {
    user.require_staff()?;
    if req.status.is_offer_managed() {
        return Err(AppError::UnprocessableEntity(format!(
            "{} is set through the offer workflow",
            req.status
        )));
    }
    if req.status == ApplicationStatus::Withdrawn {
        return Err(AppError::UnprocessableEntity(
            "only the candidate can withdraw an application".to_string(),
        ));
    }
    let note = req.note.as_deref().map(str::trim).filter(|n| !n.is_empty());

    let application = find_visible_application(&state.db, &user, id).await?;
    let from = current_status(&application)?;

    let mut tx = state.db.begin().await?;
    let updated = transition(&mut tx, id, from, req.status, user.id(), note).await?;
    close_open_work(&mut tx, id, req.status).await?;
    tx.commit().await?;

    announce_status(&state, &updated, req.status, note).await;
    Ok(Json(updated))
}

/// POST /api/v1/applications/:id/withdraw
pub async fn handle_withdraw(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApplicationRow>, AppError> {
    let application = find_visible_application(&state.db, &user, id).await?;
    if application.candidate_id != user.id() {
        return Err(AppError::Forbidden);
    }
    let from = current_status(&application)?;
    if from.is_terminal() {
        return Err(AppError::Conflict(format!("application is already {from}")));
    }

    let mut tx = state.db.begin().await?;
    let updated = transition(
        &mut tx,
        id,
        from,
        ApplicationStatus::Withdrawn,
        user.id(),
        None,
    )
    .await?;
    close_open_work(&mut tx, id, ApplicationStatus::Withdrawn).await?;
    tx.commit().await?;

    match find_job(&state.db, updated.job_id).await {
        Ok(job) => {
            state
                .notifier
                .notify_user(
                    &state.db,
                    job.posted_by,
                    NewNotification::new(
                        "application_withdrawn",
                        format!("Application withdrawn: {}", job.title),
                        format!("{} withdrew their application", user.0.full_name),
                    )
                    .link(format!("/applications/{id}")),
                )
                .await;
        }
        Err(e) => warn!("Skipping withdrawal notice for application {id}: {e}"),
    }

    Ok(Json(updated))
}
