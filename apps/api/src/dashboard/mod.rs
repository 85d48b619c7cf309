//! Staff dashboard: pipeline counts, the week's interviews, and approvals waiting on the caller.

use std::collections::BTreeMap;

use axum::{extract::State, Json};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::applications::status::ApplicationStatus;
use crate::approvals::{pending_states_for, ChainState, OFFER_CHAIN, REQUISITION_CHAIN};
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::interview::InterviewRow;
use crate::models::job::JobStatus;
use crate::models::offer::OfferRow;
use crate::models::requisition::RequisitionRow;
use crate::models::user::Role;
use crate::state::AppState;

const UPCOMING_DAYS: i32 = 7;

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub requisitions_by_status: BTreeMap<String, i64>,
    pub jobs_by_status: BTreeMap<String, i64>,
    pub applications_by_status: BTreeMap<String, i64>,
    pub upcoming_interviews: Vec<InterviewRow>,
    pub pending_approvals: PendingApprovals,
    pub open_job_scores: Vec<JobScoreRow>,
}

#[derive(Debug, Serialize)]
pub struct PendingApprovals {
    pub requisitions: Vec<RequisitionRow>,
    pub offers: Vec<OfferRow>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct JobScoreRow {
    pub job_id: Uuid,
    pub title: String,
    pub applications: i64,
    pub average_score: Option<f64>,
}

/// Every known status appears, zero when absent. Unknown statuses from the
/// database are kept as-is.
fn fill_counts(known: &[&str], rows: Vec<(String, i64)>) -> BTreeMap<String, i64> {
    let mut counts: BTreeMap<String, i64> = known.iter().map(|s| (s.to_string(), 0)).collect();
    for (status, count) in rows {
        *counts.entry(status).or_insert(0) += count;
    }
    counts
}

fn chain_statuses() -> Vec<&'static str> {
    let mut statuses: Vec<&'static str> = REQUISITION_CHAIN
        .stages()
        .iter()
        .map(|s| ChainState::Pending(*s).as_str())
        .collect();
    statuses.extend([ChainState::Approved.as_str(), ChainState::Rejected.as_str()]);
    statuses
}

async fn count_by_status(
    pool: &PgPool,
    table: &'static str,
) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (String, i64)>(&format!(
        "SELECT status, COUNT(*) FROM {table} GROUP BY status"
    ))
    .fetch_all(pool)
    .await
}

fn as_strings(states: Vec<ChainState>) -> Vec<&'static str> {
    states.into_iter().map(ChainState::as_str).collect()
}

/// GET /api/v1/dashboard
pub async fn handle_dashboard(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Dashboard>, AppError> {
    user.require_staff()?;
    let pool = &state.db;

    let requisitions_by_status =
        fill_counts(&chain_statuses(), count_by_status(pool, "requisitions").await?);
    let job_statuses: Vec<&str> = JobStatus::ALL.iter().map(|s| s.as_str()).collect();
    let jobs_by_status = fill_counts(&job_statuses, count_by_status(pool, "jobs").await?);
    let application_statuses: Vec<&str> =
        ApplicationStatus::ALL.iter().map(|s| s.as_str()).collect();
    let applications_by_status = fill_counts(
        &application_statuses,
        count_by_status(pool, "applications").await?,
    );

    let upcoming_interviews = sqlx::query_as::<_, InterviewRow>(
        r#"
        SELECT * FROM interviews
        WHERE status = 'scheduled'
          AND scheduled_at >= now()
          AND scheduled_at < now() + make_interval(days => $1)
        ORDER BY scheduled_at ASC
        "#,
    )
    .bind(UPCOMING_DAYS)
    .fetch_all(pool)
    .await?;

    // HODs approve for their own department only
    let department = match user.role() {
        Role::Hod => user.0.department.clone(),
        _ => None,
    };
    let requisitions = sqlx::query_as::<_, RequisitionRow>(
        r#"
        SELECT * FROM requisitions
        WHERE status = ANY($1) AND ($2::text IS NULL OR lower(department) = lower($2))
        ORDER BY created_at ASC
        "#,
    )
    .bind(as_strings(pending_states_for(&REQUISITION_CHAIN, user.role())))
    .bind(department)
    .fetch_all(pool)
    .await?;
    let offers = sqlx::query_as::<_, OfferRow>(
        "SELECT * FROM offers WHERE status = ANY($1) ORDER BY created_at ASC",
    )
    .bind(as_strings(pending_states_for(&OFFER_CHAIN, user.role())))
    .fetch_all(pool)
    .await?;

    let open_job_scores = sqlx::query_as::<_, JobScoreRow>(
        r#"
        SELECT j.id AS job_id,
               j.title,
               COUNT(a.id) AS applications,
               AVG(a.match_score)::float8 AS average_score
        FROM jobs j
        LEFT JOIN applications a ON a.job_id = j.id
        WHERE j.status = 'open'
        GROUP BY j.id, j.title
        ORDER BY j.title ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(Json(Dashboard {
        requisitions_by_status,
        jobs_by_status,
        applications_by_status,
        upcoming_interviews,
        pending_approvals: PendingApprovals {
            requisitions,
            offers,
        },
        open_job_scores,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_counts_zero_fills_known_statuses() {
        let counts = fill_counts(
            &["draft", "open", "closed"],
            vec![("open".to_string(), 4)],
        );
        assert_eq!(counts["draft"], 0);
        assert_eq!(counts["open"], 4);
        assert_eq!(counts["closed"], 0);
    }

    #[test]
    fn test_fill_counts_keeps_unknown_statuses() {
        let counts = fill_counts(&["open"], vec![("archived".to_string(), 2)]);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts["archived"], 2);
    }

    #[test]
    fn test_chain_statuses_cover_requisition_chain() {
        assert_eq!(
            chain_statuses(),
            vec!["pending_hod", "pending_hr", "pending_coo", "approved", "rejected"]
        );
    }
}
