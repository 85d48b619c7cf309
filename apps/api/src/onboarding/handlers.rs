use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{info, warn};
use uuid::Uuid;

use crate::applications::service::{
    current_status, find_application, find_visible_application, parties_for_announcement,
};
use crate::applications::status::ApplicationStatus;
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::mailer::templates;
use crate::models::onboarding::{DocStatus, DocType, OnboardingDocumentRow};
use crate::models::user::Role;
use crate::notifications::NewNotification;
use crate::onboarding::{accepts_upload, summarize, Progress};
use crate::state::AppState;
use crate::storage::{
    content_type_or_default, discard_object, onboarding_key, put_object, read_upload,
};

const REVIEWERS: &[Role] = &[Role::Hr];

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub approve: bool,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OnboardingOverview {
    pub documents: Vec<OnboardingDocumentRow>,
    pub progress: Progress,
}

async fn list_documents(
    state: &AppState,
    application_id: Uuid,
) -> Result<Vec<OnboardingDocumentRow>, AppError> {
    Ok(sqlx::query_as::<_, OnboardingDocumentRow>(
        "SELECT * FROM onboarding_documents WHERE application_id = $1 ORDER BY created_at ASC, doc_type ASC",
    )
    .bind(application_id)
    .fetch_all(&state.db)
    .await?)
}

fn progress_of(documents: &[OnboardingDocumentRow]) -> Result<Progress, AppError> {
    let statuses = documents
        .iter()
        .map(|d| DocStatus::from_str(&d.status))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(summarize(statuses))
}

/// POST /api/v1/applications/:id/documents/:doc_type
pub async fn handle_upload(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((application_id, doc_type)): Path<(Uuid, DocType)>,
    multipart: Multipart,
) -> Result<Json<OnboardingDocumentRow>, AppError> {
    let application = find_visible_application(&state.db, &user, application_id).await?;
    if application.candidate_id != user.id() {
        return Err(AppError::Forbidden);
    }
    if current_status(&application)? != ApplicationStatus::Hired {
        return Err(AppError::UnprocessableEntity(
            "documents are collected once an offer is accepted".to_string(),
        ));
    }

    let existing = sqlx::query_as::<_, OnboardingDocumentRow>(
        "SELECT * FROM onboarding_documents WHERE application_id = $1 AND doc_type = $2",
    )
    .bind(application_id)
    .bind(doc_type.as_str())
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("No {} slot for this application", doc_type.label())))?;
    let status = DocStatus::from_str(&existing.status)?;
    if !accepts_upload(status) {
        return Err(AppError::Conflict(format!(
            "{} is already {status}",
            doc_type.label()
        )));
    }

    let file = read_upload(multipart, state.config.max_upload_bytes)
        .await?
        .require_file()?;
    let key = onboarding_key(application_id, doc_type.as_str(), &file.file_name);
    put_object(
        &state.s3,
        &state.config.s3_bucket,
        &key,
        file.bytes.clone(),
        content_type_or_default(&file),
    )
    .await?;

    let updated = sqlx::query_as::<_, OnboardingDocumentRow>(
        r#"
        UPDATE onboarding_documents SET
            status = 'submitted', s3_key = $1, file_name = $2, submitted_at = now(),
            reviewer_id = NULL, review_comment = NULL, reviewed_at = NULL
        WHERE id = $3 AND status IN ('pending', 'rejected')
        RETURNING *
        "#,
    )
    .bind(&key)
    .bind(&file.file_name)
    .bind(existing.id)
    .fetch_optional(&state.db)
    .await;
    let updated = match updated {
        Ok(Some(row)) => row,
        outcome => {
            discard_object(&state.s3, &state.config.s3_bucket, &key).await;
            return Err(match outcome {
                Err(e) => e.into(),
                _ => AppError::Conflict(format!("{} changed concurrently", doc_type.label())),
            });
        }
    };

    info!(
        "Candidate {} submitted {} for application {application_id}",
        user.id(),
        doc_type
    );

    state
        .notifier
        .notify_role(
            &state.db,
            Role::Hr,
            None,
            NewNotification::new(
                "document_submitted",
                "Onboarding document to review",
                format!("{} uploaded their {}", user.0.full_name, doc_type.label()),
            )
            .link(format!("/applications/{application_id}/onboarding")),
        )
        .await;

    Ok(Json(updated))
}

/// POST /api/v1/documents/:id/review
pub async fn handle_review(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<OnboardingDocumentRow>, AppError> {
    user.require_role(REVIEWERS)?;
    let comment = req
        .comment
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    if !req.approve && comment.is_none() {
        return Err(AppError::Validation(
            "a comment is required when rejecting a document".to_string(),
        ));
    }
    let next = if req.approve {
        DocStatus::Approved
    } else {
        DocStatus::Rejected
    };

    let reviewed = sqlx::query_as::<_, OnboardingDocumentRow>(
        r#"
        UPDATE onboarding_documents SET
            status = $1, reviewer_id = $2, review_comment = $3, reviewed_at = now()
        WHERE id = $4 AND status = 'submitted'
        RETURNING *
        "#,
    )
    .bind(next.as_str())
    .bind(user.id())
    .bind(comment)
    .bind(id)
    .fetch_optional(&state.db)
    .await?;
    let reviewed = match reviewed {
        Some(row) => row,
        None => {
            let status: Option<String> =
                sqlx::query_scalar("SELECT status FROM onboarding_documents WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&state.db)
                    .await?;
            return Err(match status {
                Some(status) => AppError::Conflict(format!(
                    "document is {status}; only submitted documents can be reviewed"
                )),
                None => AppError::NotFound(format!("Document {id} not found")),
            });
        }
    };
    let doc_type = DocType::from_str(&reviewed.doc_type)?;
    info!("Document {id} ({doc_type}) {next} by {}", user.id());

    let application = match find_application(&state.db, reviewed.application_id).await {
        Ok(application) => application,
        Err(e) => {
            warn!("Skipping review notices for document {id}: {e}");
            return Ok(Json(reviewed));
        }
    };
    let Some((_, candidate)) = parties_for_announcement(&state.db, &application).await else {
        return Ok(Json(reviewed));
    };
    let verdict = if req.approve { "verified" } else { "needs attention" };
    state
        .notifier
        .notify_user(
            &state.db,
            candidate.id,
            NewNotification::new(
                "document_reviewed",
                format!("Your {} {verdict}", doc_type.label()),
                comment.unwrap_or("No further action needed").to_string(),
            )
            .link(format!("/applications/{}/onboarding", application.id)),
        )
        .await;
    state.mailer.dispatch(templates::document_reviewed(
        &candidate.email,
        &candidate.full_name,
        doc_type.label(),
        req.approve,
        comment,
    ));

    Ok(Json(reviewed))
}

/// GET /api/v1/applications/:id/onboarding
pub async fn handle_overview(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(application_id): Path<Uuid>,
) -> Result<Json<OnboardingOverview>, AppError> {
    find_visible_application(&state.db, &user, application_id).await?;
    let documents = list_documents(&state, application_id).await?;
    let progress = progress_of(&documents)?;
    Ok(Json(OnboardingOverview {
        documents,
        progress,
    }))
}
