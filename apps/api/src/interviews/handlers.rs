use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgConnection;
use std::str::FromStr;
use tracing::{info, warn};
use uuid::Uuid;

use crate::applications::service::{
    current_status, find_application, parties_for_announcement, transition,
};
use crate::applications::status::ApplicationStatus;
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::interviews::schedule::{
    normalize_interviewers, resolve_location, validate_outcome, validate_slot,
    DEFAULT_DURATION_MINUTES,
};
use crate::mailer::templates::{self, InterviewDetails};
use crate::models::application::ApplicationRow;
use crate::models::interview::{InterviewMode, InterviewRow, InterviewStatus, Recommendation};
use crate::models::user::Role;
use crate::notifications::NewNotification;
use crate::state::AppState;
use crate::users::queries::count_staff;

const REVIEWERS: &[Role] = &[Role::Hr];
/// First key of the two-key advisory locks guarding interviewer calendars.
const CALENDAR_LOCK_CLASS: i32 = 4_101;

#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: Option<i32>,
    pub mode: InterviewMode,
    pub location: Option<String>,
    pub interviewer_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub status: InterviewStatus,
    pub feedback: Option<String>,
    pub rating: Option<i32>,
    pub recommendation: Option<Recommendation>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub mine: bool,
}

async fn find_interview(conn: &mut PgConnection, id: Uuid) -> Result<InterviewRow, AppError> {
    sqlx::query_as::<_, InterviewRow>("SELECT * FROM interviews WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Interview {id} not found")))
}

fn require_scheduled(interview: &InterviewRow) -> Result<(), AppError> {
    if interview.status != InterviewStatus::Scheduled.as_str() {
        return Err(AppError::Conflict(format!(
            "interview is {}; only scheduled interviews can be changed",
            interview.status
        )));
    }
    Ok(())
}

/// Locks the application row for the rest of the transaction.
async fn lock_application(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<(ApplicationRow, ApplicationStatus), AppError> {
    let application =
        sqlx::query_as::<_, ApplicationRow>("SELECT * FROM applications WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Application {id} not found")))?;
    let status = current_status(&application)?;
    Ok((application, status))
}

/// Interviews of an application that left the pipeline are frozen.
fn require_open(status: ApplicationStatus) -> Result<(), AppError> {
    if status.is_terminal() {
        return Err(AppError::Conflict(format!(
            "application is {status}; its interviews are closed"
        )));
    }
    Ok(())
}

/// Panel members in the order their calendar locks are taken.
fn lock_order(interviewer_ids: &[Uuid]) -> Vec<Uuid> {
    let mut ids = interviewer_ids.to_vec();
    ids.sort();
    ids.dedup();
    ids
}

/// Holds each panelist's calendar until the transaction ends, so concurrent
/// bookings for the same person run their overlap checks one at a time.
async fn lock_calendars(
    conn: &mut PgConnection,
    interviewer_ids: &[Uuid],
) -> Result<(), sqlx::Error> {
    for id in lock_order(interviewer_ids) {
        sqlx::query("SELECT pg_advisory_xact_lock($1, hashtext($2))")
            .bind(CALENDAR_LOCK_CLASS)
            .bind(id.to_string())
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Fails with 409 when any panelist already has a scheduled interview
/// overlapping `[start, start + minutes)`. Takes the panel's calendar locks first.
async fn check_calendar(
    conn: &mut PgConnection,
    interviewer_ids: &[Uuid],
    start: DateTime<Utc>,
    minutes: i32,
    exclude: Option<Uuid>,
) -> Result<(), AppError> {
    lock_calendars(&mut *conn, interviewer_ids).await?;
    let clashes: Vec<Uuid> = sqlx::query_scalar(
        r#"
        SELECT DISTINCT unnest(interviewer_ids) AS interviewer
        FROM interviews
        WHERE status = 'scheduled'
          AND interviewer_ids && $1
          AND ($4::uuid IS NULL OR id <> $4)
          AND scheduled_at < $2 + make_interval(mins => $3)
          AND scheduled_at + make_interval(mins => duration_minutes) > $2
        "#,
    )
    .bind(interviewer_ids)
    .bind(start)
    .bind(minutes)
    .bind(exclude)
    .fetch_all(conn)
    .await?;

    let busy: Vec<String> = clashes
        .iter()
        .filter(|id| interviewer_ids.contains(id))
        .map(Uuid::to_string)
        .collect();
    if !busy.is_empty() {
        return Err(AppError::Conflict(format!(
            "interviewer(s) {} already booked in that slot",
            busy.join(", ")
        )));
    }
    Ok(())
}

async fn announce_schedule(
    state: &AppState,
    application: &ApplicationRow,
    interview: &InterviewRow,
    rescheduled: bool,
) {
    let Some((job, candidate)) = parties_for_announcement(&state.db, application).await else {
        return;
    };
    let verb = if rescheduled { "rescheduled" } else { "scheduled" };
    let when = interview.scheduled_at.format("%d %b %Y %H:%M UTC");

    state
        .notifier
        .notify(
            &state.db,
            &interview.interviewer_ids,
            NewNotification::new(
                "interview_scheduled",
                format!("Interview {verb}: {}", job.title),
                format!(
                    "Round {} with {} on {when}",
                    interview.round, candidate.full_name
                ),
            )
            .link(format!("/interviews/{}", interview.id)),
        )
        .await;
    state
        .notifier
        .notify_user(
            &state.db,
            candidate.id,
            NewNotification::new(
                "interview_scheduled",
                format!("Interview {verb}: {}", job.title),
                format!("Round {} is on {when}", interview.round),
            )
            .link(format!("/applications/{}", application.id)),
        )
        .await;

    let mode_label = InterviewMode::from_str(&interview.mode)
        .map(InterviewMode::label)
        .unwrap_or("Interview");
    state.mailer.dispatch(templates::interview_scheduled(
        &candidate.email,
        &candidate.full_name,
        &InterviewDetails {
            job_title: &job.title,
            round: interview.round,
            scheduled_at: interview.scheduled_at,
            duration_minutes: interview.duration_minutes,
            mode_label,
            location: interview.location.as_deref(),
        },
    ));
}

/// POST /api/v1/applications/:id/interviews
pub async fn handle_create(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(application_id): Path<Uuid>,
    Json(req): Json<ScheduleRequest>,
) -> Result<(StatusCode, Json<InterviewRow>), AppError> {
    user.require_staff()?;
    let duration = req.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
    validate_slot(req.scheduled_at, duration, Utc::now())?;
    let location = resolve_location(req.mode, req.location.as_deref())?;
    let panel = normalize_interviewers(&req.interviewer_ids)?;
    if count_staff(&state.db, &panel).await? != panel.len() as i64 {
        return Err(AppError::Validation(
            "every interviewer must be an existing staff member".to_string(),
        ));
    }

    let mut tx = state.db.begin().await?;
    let (application, status) = lock_application(&mut tx, application_id).await?;
    if !matches!(
        status,
        ApplicationStatus::Shortlisted | ApplicationStatus::Interviewing
    ) {
        return Err(AppError::UnprocessableEntity(format!(
            "application is {status}; only shortlisted candidates can be interviewed"
        )));
    }
    check_calendar(&mut tx, &panel, req.scheduled_at, duration, None).await?;

    let round: i32 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(round), 0) + 1 FROM interviews WHERE application_id = $1",
    )
    .bind(application_id)
    .fetch_one(&mut *tx)
    .await?;

    let interview = sqlx::query_as::<_, InterviewRow>(
        r#"
        INSERT INTO interviews
            (id, application_id, round, scheduled_at, duration_minutes, mode, location,
             interviewer_ids, status, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(application_id)
    .bind(round)
    .bind(req.scheduled_at)
    .bind(duration)
    .bind(req.mode.as_str())
    .bind(&location)
    .bind(&panel)
    .bind(InterviewStatus::Scheduled.as_str())
    .bind(user.id())
    .fetch_one(&mut *tx)
    .await?;

    let application = if status == ApplicationStatus::Shortlisted {
        let note = format!("Round {round} scheduled");
        transition(
            &mut tx,
            application_id,
            status,
            ApplicationStatus::Interviewing,
            user.id(),
            Some(note.as_str()),
        )
        .await?
    } else {
        application
    };
    tx.commit().await?;

    info!(
        "Interview {} (round {round}) scheduled for application {application_id}",
        interview.id
    );
    announce_schedule(&state, &application, &interview, false).await;
    Ok((StatusCode::CREATED, Json(interview)))
}

/// POST /api/v1/interviews/:id/reschedule
pub async fn handle_reschedule(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<RescheduleRequest>,
) -> Result<Json<InterviewRow>, AppError> {
    user.require_staff()?;

    let mut tx = state.db.begin().await?;
    let existing = find_interview(&mut tx, id).await?;
    let (application, status) = lock_application(&mut tx, existing.application_id).await?;
    require_open(status)?;
    require_scheduled(&existing)?;
    let duration = req.duration_minutes.unwrap_or(existing.duration_minutes);
    validate_slot(req.scheduled_at, duration, Utc::now())?;
    check_calendar(
        &mut tx,
        &existing.interviewer_ids,
        req.scheduled_at,
        duration,
        Some(id),
    )
    .await?;

    let updated = sqlx::query_as::<_, InterviewRow>(
        r#"
        UPDATE interviews SET scheduled_at = $1, duration_minutes = $2, updated_at = now()
        WHERE id = $3 AND status = 'scheduled'
        RETURNING *
        "#,
    )
    .bind(req.scheduled_at)
    .bind(duration)
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::Conflict("interview changed concurrently".to_string()))?;
    tx.commit().await?;

    info!("Interview {id} moved to {} by {}", updated.scheduled_at, user.id());
    announce_schedule(&state, &application, &updated, true).await;
    Ok(Json(updated))
}

/// POST /api/v1/interviews/:id/cancel
pub async fn handle_cancel(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<InterviewRow>, AppError> {
    user.require_staff()?;
    let reason = req.reason.as_deref().map(str::trim).filter(|r| !r.is_empty());

    let cancelled = sqlx::query_as::<_, InterviewRow>(
        r#"
        UPDATE interviews SET status = 'cancelled', feedback = COALESCE($1, feedback), updated_at = now()
        WHERE id = $2 AND status = 'scheduled'
        RETURNING *
        "#,
    )
    .bind(reason)
    .bind(id)
    .fetch_optional(&state.db)
    .await?;
    let cancelled = match cancelled {
        Some(row) => row,
        None => {
            let mut conn = state.db.acquire().await?;
            let existing = find_interview(&mut conn, id).await?;
            require_scheduled(&existing)?;
            return Err(AppError::Conflict("interview changed concurrently".to_string()));
        }
    };
    info!("Interview {id} cancelled by {}", user.id());

    let application = match find_application(&state.db, cancelled.application_id).await {
        Ok(application) => application,
        Err(e) => {
            warn!("Skipping cancellation notices for interview {id}: {e}");
            return Ok(Json(cancelled));
        }
    };
    let Some((job, candidate)) = parties_for_announcement(&state.db, &application).await else {
        return Ok(Json(cancelled));
    };
    let recipients: Vec<Uuid> = cancelled
        .interviewer_ids
        .iter()
        .copied()
        .chain(std::iter::once(candidate.id))
        .collect();
    state
        .notifier
        .notify(
            &state.db,
            &recipients,
            NewNotification::new(
                "interview_cancelled",
                format!("Interview cancelled: {}", job.title),
                format!("Round {} has been cancelled", cancelled.round),
            )
            .link(format!("/applications/{}", application.id)),
        )
        .await;
    state.mailer.dispatch(templates::interview_cancelled(
        &candidate.email,
        &candidate.full_name,
        &job.title,
        reason,
    ));

    Ok(Json(cancelled))
}

/// POST /api/v1/interviews/:id/feedback
pub async fn handle_feedback(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<InterviewRow>, AppError> {
    user.require_staff()?;
    let outcome = validate_outcome(req.status, req.rating, req.recommendation)?;

    let mut tx = state.db.begin().await?;
    let existing = find_interview(&mut tx, id).await?;
    let on_panel = existing.interviewer_ids.contains(&user.id());
    if !on_panel && user.require_role(REVIEWERS).is_err() {
        return Err(AppError::Forbidden);
    }
    let (application, status) = lock_application(&mut tx, existing.application_id).await?;
    require_open(status)?;
    require_scheduled(&existing)?;

    let feedback = req
        .feedback
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty());
    let updated = sqlx::query_as::<_, InterviewRow>(
        r#"
        UPDATE interviews SET
            status = $1, feedback = $2, rating = $3, recommendation = $4, updated_at = now()
        WHERE id = $5 AND status = 'scheduled'
        RETURNING *
        "#,
    )
    .bind(outcome.status.as_str())
    .bind(feedback)
    .bind(outcome.rating)
    .bind(outcome.recommendation.map(Recommendation::as_str))
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::Conflict("feedback was already recorded".to_string()))?;
    tx.commit().await?;

    info!(
        "Interview {id} marked {} by {}",
        outcome.status,
        user.id()
    );

    if let Some((job, _)) = parties_for_announcement(&state.db, &application).await {
        state
            .notifier
            .notify_user(
                &state.db,
                job.posted_by,
                NewNotification::new(
                    "interview_feedback",
                    format!("Interview feedback: {}", job.title),
                    format!("Round {} marked {}", updated.round, outcome.status),
                )
                .link(format!("/applications/{}", application.id)),
            )
            .await;
    }

    Ok(Json(updated))
}

/// GET /api/v1/interviews
///
/// Candidates get their own upcoming interviews. Staff get every upcoming
/// interview, or with `mine=true` only those they sit on.
pub async fn handle_list(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<InterviewRow>>, AppError> {
    let candidate = (!user.is_staff()).then(|| user.id());
    let interviewer = (user.is_staff() && params.mine).then(|| user.id());

    let rows = sqlx::query_as::<_, InterviewRow>(
        r#"
        SELECT i.* FROM interviews i
        JOIN applications a ON a.id = i.application_id
        WHERE i.status = 'scheduled'
          AND i.scheduled_at >= now()
          AND ($1::uuid IS NULL OR a.candidate_id = $1)
          AND ($2::uuid IS NULL OR $2 = ANY(i.interviewer_ids))
        ORDER BY i.scheduled_at ASC
        "#,
    )
    .bind(candidate)
    .bind(interviewer)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(rows))
}
