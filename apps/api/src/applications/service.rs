use std::str::FromStr;

use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::applications::status::ApplicationStatus;
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::mailer::templates;
use crate::models::application::{ApplicationEventRow, ApplicationRow};
use crate::models::job::JobRow;
use crate::models::user::User;
use crate::notifications::NewNotification;
use crate::offers::OfferStatus;
use crate::state::AppState;

pub async fn find_application(pool: &PgPool, id: Uuid) -> Result<ApplicationRow, AppError> {
    sqlx::query_as::<_, ApplicationRow>("SELECT * FROM applications WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Application {id} not found")))
}

/// Loads an application the caller may see: staff see all, candidates only their own.
pub async fn find_visible_application(
    pool: &PgPool,
    user: &CurrentUser,
    id: Uuid,
) -> Result<ApplicationRow, AppError> {
    let application = find_application(pool, id).await?;
    if !user.is_staff() && application.candidate_id != user.id() {
        return Err(AppError::NotFound(format!("Application {id} not found")));
    }
    Ok(application)
}

pub fn current_status(application: &ApplicationRow) -> Result<ApplicationStatus, AppError> {
    Ok(ApplicationStatus::from_str(&application.status)?)
}

/// Appends a pipeline event. Never updates existing rows.
pub async fn record_event(
    conn: &mut PgConnection,
    application_id: Uuid,
    from: Option<ApplicationStatus>,
    to: ApplicationStatus,
    actor_id: Uuid,
    note: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO application_events (id, application_id, from_status, to_status, actor_id, note)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(application_id)
    .bind(from.map(ApplicationStatus::as_str))
    .bind(to.as_str())
    .bind(actor_id)
    .bind(note)
    .execute(conn)
    .await?;
    Ok(())
}

/// Moves an application along the pipeline with a compare-and-set on its
/// current status, and records the event. Run inside the caller's transaction.
pub async fn transition(
    conn: &mut PgConnection,
    application_id: Uuid,
    from: ApplicationStatus,
    to: ApplicationStatus,
    actor_id: Uuid,
    note: Option<&str>,
) -> Result<ApplicationRow, AppError> {
    if !from.can_transition_to(to) {
        return Err(AppError::UnprocessableEntity(format!(
            "application cannot move from {from} to {to}"
        )));
    }

    let updated = sqlx::query_as::<_, ApplicationRow>(
        r#"
        UPDATE applications SET status = $1, updated_at = now()
        WHERE id = $2 AND status = $3
        RETURNING *
        "#,
    )
    .bind(to.as_str())
    .bind(application_id)
    .bind(from.as_str())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| {
        AppError::Conflict("application status changed concurrently; reload and retry".to_string())
    })?;

    record_event(conn, application_id, Some(from), to, actor_id, note).await?;
    info!("Application {application_id}: {from} → {to} by {actor_id}");
    Ok(updated)
}

/// Closes what hangs off an application that just left the pipeline: the
/// in-flight offer is voided and scheduled interviews are cancelled, freeing
/// the panel's calendars. Run in the same transaction as the transition.
pub async fn close_open_work(
    conn: &mut PgConnection,
    application_id: Uuid,
    closed_as: ApplicationStatus,
) -> Result<(), sqlx::Error> {
    let Some(offer_status) = OfferStatus::voided_by(closed_as) else {
        return Ok(());
    };
    let offers = sqlx::query(
        r#"
        UPDATE offers SET status = $1, updated_at = now()
        WHERE application_id = $2 AND status = ANY($3)
        "#,
    )
    .bind(offer_status.as_str())
    .bind(application_id)
    .bind(OfferStatus::active_values())
    .execute(&mut *conn)
    .await?;
    let interviews = sqlx::query(
        r#"
        UPDATE interviews SET status = 'cancelled', updated_at = now()
        WHERE application_id = $1 AND status = 'scheduled'
        "#,
    )
    .bind(application_id)
    .execute(&mut *conn)
    .await?;

    if offers.rows_affected() + interviews.rows_affected() > 0 {
        info!(
            "Application {application_id} {closed_as}: {} offer(s) voided, {} interview(s) cancelled",
            offers.rows_affected(),
            interviews.rows_affected()
        );
    }
    Ok(())
}

pub async fn list_events(
    pool: &PgPool,
    application_id: Uuid,
) -> Result<Vec<ApplicationEventRow>, sqlx::Error> {
    sqlx::query_as::<_, ApplicationEventRow>(
        "SELECT * FROM application_events WHERE application_id = $1 ORDER BY created_at ASC, id ASC",
    )
    .bind(application_id)
    .fetch_all(pool)
    .await
}

/// The job and candidate behind an application, for messages and emails.
pub async fn load_parties(
    pool: &PgPool,
    application: &ApplicationRow,
) -> Result<(JobRow, User), AppError> {
    let job = crate::jobs::service::find_job(pool, application.job_id).await?;
    let candidate = crate::users::queries::find_user(pool, application.candidate_id)
        .await?
        .ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "candidate {} of application {} is missing",
                application.candidate_id,
                application.id
            ))
        })?;
    Ok((job, candidate))
}

/// Like [`load_parties`], for use after a commit: a failure is logged and the
/// caller skips its announcements instead of failing a change already made.
pub async fn parties_for_announcement(
    pool: &PgPool,
    application: &ApplicationRow,
) -> Option<(JobRow, User)> {
    match load_parties(pool, application).await {
        Ok(parties) => Some(parties),
        Err(e) => {
            warn!(
                "Skipping announcements for application {}: {e}",
                application.id
            );
            None
        }
    }
}

/// Tells the candidate their application moved, in-app and by email.
pub async fn announce_status(
    state: &AppState,
    application: &ApplicationRow,
    status: ApplicationStatus,
    note: Option<&str>,
) {
    let Some((job, candidate)) = parties_for_announcement(&state.db, application).await else {
        return;
    };
    state
        .notifier
        .notify_user(
            &state.db,
            candidate.id,
            NewNotification::new(
                "application_status",
                format!("{}: {}", job.title, status.label()),
                format!("Your application for {} is now {}", job.title, status.label()),
            )
            .link(format!("/applications/{}", application.id)),
        )
        .await;
    state.mailer.dispatch(templates::application_status_changed(
        &candidate.email,
        &candidate.full_name,
        &job.title,
        status.label(),
        note,
    ));
}
