//! Pipeline rules enforced in SQL, exercised against a real database.
//! Each test returns early when `DATABASE_URL` is unset.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, DurationRound, Utc};
use serde_json::{json, Value};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tower::ServiceExt;
use uuid::Uuid;

use super::{build_router, test_state};
use crate::applications::service::transition;
use crate::applications::status::ApplicationStatus;
use crate::auth::USER_ID_HEADER;
use crate::errors::AppError;

async fn database() -> Option<PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .expect("DATABASE_URL is set but the database is unreachable");
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    Some(pool)
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    user: Uuid,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(USER_ID_HEADER, user.to_string())
        .header(header::CONTENT_TYPE, "application/json");
    let request = match body {
        Some(body) => request.body(Body::from(serde_json::to_vec(&body).unwrap())),
        None => request.body(Body::empty()),
    }
    .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn seed_user(pool: &PgPool, role: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO users (id, external_id, email, full_name, role, department)
        VALUES ($1, $2, $3, $4, $5, 'Engineering')
        "#,
    )
    .bind(id)
    .bind(format!("sso|{id}"))
    .bind(format!("{id}@hiring.test"))
    .bind(format!("{role} {}", &id.to_string()[..8]))
    .bind(role)
    .execute(pool)
    .await
    .unwrap();
    id
}

async fn seed_job(pool: &PgPool, poster: Uuid) -> Uuid {
    let requisition = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO requisitions
            (id, raised_by, department, position_title, headcount, employment_type, justification, status)
        VALUES ($1, $2, 'Engineering', 'Backend Engineer', 1, 'full_time', 'Team growth', 'approved')
        "#,
    )
    .bind(requisition)
    .bind(poster)
    .execute(pool)
    .await
    .unwrap();

    let job = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO jobs
            (id, requisition_id, title, description, department, location, employment_type,
             openings, status, posted_by, posted_at)
        VALUES ($1, $2, 'Backend Engineer', 'Rust services', 'Engineering', 'Pune', 'full_time',
                1, 'open', $3, now())
        "#,
    )
    .bind(job)
    .bind(requisition)
    .bind(poster)
    .execute(pool)
    .await
    .unwrap();
    job
}

async fn seed_application(
    pool: &PgPool,
    job: Uuid,
    candidate: Uuid,
    status: ApplicationStatus,
) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO applications
            (id, job_id, candidate_id, status, resume_s3_key, resume_file_name, resume_text, match_score)
        VALUES ($1, $2, $3, $4, 'resumes/seed.pdf', 'seed.pdf', 'rust postgres', 70)
        "#,
    )
    .bind(id)
    .bind(job)
    .bind(candidate)
    .bind(status.as_str())
    .execute(pool)
    .await
    .unwrap();
    id
}

async fn seed_interview(
    pool: &PgPool,
    application: Uuid,
    interviewer: Uuid,
    status: &str,
    at: DateTime<Utc>,
) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO interviews
            (id, application_id, round, scheduled_at, duration_minutes, mode, interviewer_ids, status, created_by)
        VALUES ($1, $2, 1, $3, 60, 'video', $4, $5, $6)
        "#,
    )
    .bind(id)
    .bind(application)
    .bind(at)
    .bind(vec![interviewer])
    .bind(status)
    .bind(interviewer)
    .execute(pool)
    .await
    .unwrap();
    id
}

async fn seed_offer(pool: &PgPool, application: Uuid, created_by: Uuid, status: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO offers
            (id, application_id, designation, salary, currency, joining_date, status, created_by)
        VALUES ($1, $2, 'Backend Engineer', 1800000, 'INR', CURRENT_DATE + 30, $3, $4)
        "#,
    )
    .bind(id)
    .bind(application)
    .bind(status)
    .bind(created_by)
    .execute(pool)
    .await
    .unwrap();
    id
}

async fn status_of(pool: &PgPool, table: &str, id: Uuid) -> String {
    sqlx::query_scalar(&format!("SELECT status FROM {table} WHERE id = $1"))
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}

/// A whole hour comfortably in the future, shifted by `hours`.
fn slot(hours: i64) -> DateTime<Utc> {
    (Utc::now() + Duration::days(3))
        .duration_trunc(Duration::hours(1))
        .unwrap()
        + Duration::hours(hours)
}

#[tokio::test]
async fn test_rejecting_application_voids_offer_in_review() {
    let Some(pool) = database().await else { return };
    let app = build_router(test_state(pool.clone()));
    let hr = seed_user(&pool, "hr").await;
    let candidate = seed_user(&pool, "candidate").await;
    let job = seed_job(&pool, hr).await;
    let application =
        seed_application(&pool, job, candidate, ApplicationStatus::OfferPending).await;
    let offer = seed_offer(&pool, application, hr, "pending_hr").await;

    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/v1/applications/{application}/status"),
        hr,
        Some(json!({"status": "rejected", "note": "Role filled"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(status_of(&pool, "offers", offer).await, "rejected");

    // The voided offer no longer accepts decisions
    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/v1/offers/{offer}/decision"),
        hr,
        Some(json!({"decision": "approved"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_withdrawal_declines_offer_and_cancels_interviews() {
    let Some(pool) = database().await else { return };
    let app = build_router(test_state(pool.clone()));
    let hr = seed_user(&pool, "hr").await;
    let candidate = seed_user(&pool, "candidate").await;
    let job = seed_job(&pool, hr).await;
    let application =
        seed_application(&pool, job, candidate, ApplicationStatus::OfferPending).await;
    let offer = seed_offer(&pool, application, hr, "pending_coo").await;
    let interview = seed_interview(&pool, application, hr, "scheduled", slot(0)).await;

    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/v1/applications/{application}/withdraw"),
        candidate,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(status_of(&pool, "offers", offer).await, "declined");
    assert_eq!(status_of(&pool, "interviews", interview).await, "cancelled");
}

#[tokio::test]
async fn test_rejection_frees_interviewer_calendar() {
    let Some(pool) = database().await else { return };
    let app = build_router(test_state(pool.clone()));
    let hr = seed_user(&pool, "hr").await;
    let interviewer = seed_user(&pool, "hod").await;
    let job = seed_job(&pool, hr).await;
    let first_candidate = seed_user(&pool, "candidate").await;
    let first =
        seed_application(&pool, job, first_candidate, ApplicationStatus::Interviewing).await;
    let second_candidate = seed_user(&pool, "candidate").await;
    let second =
        seed_application(&pool, job, second_candidate, ApplicationStatus::Shortlisted).await;
    let interview = seed_interview(&pool, first, interviewer, "scheduled", slot(0)).await;

    let (status, _) = call(
        &app,
        "POST",
        &format!("/api/v1/applications/{first}/status"),
        hr,
        Some(json!({"status": "rejected"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(status_of(&pool, "interviews", interview).await, "cancelled");

    let (status, _) = call(
        &app,
        "POST",
        &format!("/api/v1/interviews/{interview}/reschedule"),
        hr,
        Some(json!({"scheduled_at": slot(5)})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // The slot the rejected candidate held is open again
    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/v1/applications/{second}/interviews"),
        hr,
        Some(json!({
            "scheduled_at": slot(0),
            "mode": "video",
            "interviewer_ids": [interviewer]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
}

#[tokio::test]
async fn test_closed_application_freezes_leftover_interview() {
    let Some(pool) = database().await else { return };
    let app = build_router(test_state(pool.clone()));
    let hr = seed_user(&pool, "hr").await;
    let candidate = seed_user(&pool, "candidate").await;
    let job = seed_job(&pool, hr).await;
    let application = seed_application(&pool, job, candidate, ApplicationStatus::Rejected).await;
    let interview = seed_interview(&pool, application, hr, "scheduled", slot(0)).await;

    let (status, _) = call(
        &app,
        "POST",
        &format!("/api/v1/interviews/{interview}/reschedule"),
        hr,
        Some(json!({"scheduled_at": slot(2)})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(
        &app,
        "POST",
        &format!("/api/v1/interviews/{interview}/feedback"),
        hr,
        Some(json!({"status": "completed", "rating": 4, "recommendation": "hire"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(status_of(&pool, "interviews", interview).await, "scheduled");
}

#[tokio::test]
async fn test_overlapping_booking_conflicts() {
    let Some(pool) = database().await else { return };
    let app = build_router(test_state(pool.clone()));
    let hr = seed_user(&pool, "hr").await;
    let interviewer = seed_user(&pool, "hr").await;
    let job = seed_job(&pool, hr).await;
    let busy_candidate = seed_user(&pool, "candidate").await;
    let busy = seed_application(&pool, job, busy_candidate, ApplicationStatus::Interviewing).await;
    let next_candidate = seed_user(&pool, "candidate").await;
    let next = seed_application(&pool, job, next_candidate, ApplicationStatus::Shortlisted).await;
    seed_interview(&pool, busy, interviewer, "scheduled", slot(0)).await;

    // Starts 30 minutes into the existing hour
    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/v1/applications/{next}/interviews"),
        hr,
        Some(json!({
            "scheduled_at": slot(0) + Duration::minutes(30),
            "mode": "phone",
            "interviewer_ids": [interviewer]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"]["message"].as_str().unwrap().contains(&interviewer.to_string()));

    // Back to back is fine
    let (status, _) = call(
        &app,
        "POST",
        &format!("/api/v1/applications/{next}/interviews"),
        hr,
        Some(json!({
            "scheduled_at": slot(1),
            "mode": "phone",
            "interviewer_ids": [interviewer]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_concurrent_bookings_of_one_interviewer() {
    let Some(pool) = database().await else { return };
    let app = build_router(test_state(pool.clone()));
    let hr = seed_user(&pool, "hr").await;
    let job = seed_job(&pool, hr).await;

    for round in 0..5 {
        let interviewer = seed_user(&pool, "hod").await;
        let a_candidate = seed_user(&pool, "candidate").await;
        let a = seed_application(&pool, job, a_candidate, ApplicationStatus::Shortlisted).await;
        let b_candidate = seed_user(&pool, "candidate").await;
        let b = seed_application(&pool, job, b_candidate, ApplicationStatus::Shortlisted).await;
        let body = json!({
            "scheduled_at": slot(round),
            "mode": "video",
            "interviewer_ids": [interviewer]
        });

        let uri_a = format!("/api/v1/applications/{a}/interviews");
        let uri_b = format!("/api/v1/applications/{b}/interviews");

        let (first, second) = tokio::join!(
            call(&app, "POST", &uri_a, hr, Some(body.clone())),
            call(&app, "POST", &uri_b, hr, Some(body.clone())),
        );
        let mut statuses = [first.0, second.0];
        statuses.sort();
        assert_eq!(statuses, [StatusCode::CREATED, StatusCode::CONFLICT], "round {round}");

        let booked: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM interviews WHERE $1 = ANY(interviewer_ids) AND status = 'scheduled'",
        )
        .bind(interviewer)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(booked, 1);
    }
}

#[tokio::test]
async fn test_second_offer_while_one_is_active_conflicts() {
    let Some(pool) = database().await else { return };
    let app = build_router(test_state(pool.clone()));
    let hr = seed_user(&pool, "hr").await;
    let candidate = seed_user(&pool, "candidate").await;
    let job = seed_job(&pool, hr).await;
    let application =
        seed_application(&pool, job, candidate, ApplicationStatus::Interviewing).await;
    seed_interview(&pool, application, hr, "completed", slot(-100)).await;
    seed_offer(&pool, application, hr, "approved").await;

    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/v1/applications/{application}/offers"),
        hr,
        Some(json!({
            "salary": 1_900_000,
            "joining_date": (Utc::now() + Duration::days(45)).date_naive()
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert_eq!(status_of(&pool, "applications", application).await, "interviewing");
}

#[tokio::test]
async fn test_stale_status_change_conflicts() {
    let Some(pool) = database().await else { return };
    let hr = seed_user(&pool, "hr").await;
    let candidate = seed_user(&pool, "candidate").await;
    let job = seed_job(&pool, hr).await;
    let application = seed_application(&pool, job, candidate, ApplicationStatus::Shortlisted).await;

    let mut conn = pool.acquire().await.unwrap();
    let result = transition(
        &mut conn,
        application,
        ApplicationStatus::Applied,
        ApplicationStatus::Shortlisted,
        hr,
        None,
    )
    .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert_eq!(status_of(&pool, "applications", application).await, "shortlisted");

    let events: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM application_events WHERE application_id = $1")
            .bind(application)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(events, 0);
}

const BOUNDARY: &str = "hiring-test-boundary";

/// Posts a multipart form with a single `file` part.
async fn upload(app: &Router, uri: &str, user: Uuid, file_name: &str) -> (StatusCode, Value) {
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
         Content-Type: application/pdf\r\n\r\n\
         %PDF-1.4 seed\r\n\
         --{BOUNDARY}--\r\n"
    );
    let request = Request::post(uri)
        .header(USER_ID_HEADER, user.to_string())
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_duplicate_application_is_refused_before_storing_resume() {
    let Some(pool) = database().await else { return };
    let app = build_router(test_state(pool.clone()));
    let hr = seed_user(&pool, "hr").await;
    let candidate = seed_user(&pool, "candidate").await;
    let job = seed_job(&pool, hr).await;
    seed_application(&pool, job, candidate, ApplicationStatus::Applied).await;

    // Storage is unreachable in tests, so reaching it would surface as a 500
    let uri = format!("/api/v1/jobs/{job}/apply");
    let (status, body) = upload(&app, &uri, candidate, "cv.pdf").await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
}

#[tokio::test]
async fn test_application_after_closing_date_is_refused() {
    let Some(pool) = database().await else { return };
    let app = build_router(test_state(pool.clone()));
    let hr = seed_user(&pool, "hr").await;
    let candidate = seed_user(&pool, "candidate").await;
    let job = seed_job(&pool, hr).await;
    sqlx::query("UPDATE jobs SET closes_at = now() - interval '1 hour' WHERE id = $1")
        .bind(job)
        .execute(&pool)
        .await
        .unwrap();

    let uri = format!("/api/v1/jobs/{job}/apply");
    let (status, _) = upload(&app, &uri, candidate, "cv.pdf").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_document_upload_checks_slot_before_storage() {
    let Some(pool) = database().await else { return };
    let app = build_router(test_state(pool.clone()));
    let hr = seed_user(&pool, "hr").await;
    let candidate = seed_user(&pool, "candidate").await;
    let job = seed_job(&pool, hr).await;
    let application = seed_application(&pool, job, candidate, ApplicationStatus::Hired).await;
    sqlx::query(
        r#"
        INSERT INTO onboarding_documents (id, application_id, doc_type, status, s3_key, file_name)
        VALUES ($1, $2, 'id_proof', 'submitted', 'onboarding/first.pdf', 'first.pdf')
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(application)
    .execute(&pool)
    .await
    .unwrap();

    let (status, _) = upload(
        &app,
        &format!("/api/v1/applications/{application}/documents/id_proof"),
        candidate,
        "second.pdf",
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let key: Option<String> = sqlx::query_scalar(
        "SELECT s3_key FROM onboarding_documents WHERE application_id = $1 AND doc_type = 'id_proof'",
    )
    .bind(application)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(key.as_deref(), Some("onboarding/first.pdf"));
}

#[tokio::test]
async fn test_hod_dashboard_matches_department_case_insensitively() {
    let Some(pool) = database().await else { return };
    let app = build_router(test_state(pool.clone()));
    let raiser = seed_user(&pool, "sub_recruiter").await;
    let hod = seed_user(&pool, "hod").await;
    sqlx::query("UPDATE users SET department = 'engineering' WHERE id = $1")
        .bind(hod)
        .execute(&pool)
        .await
        .unwrap();
    let requisition = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO requisitions
            (id, raised_by, department, position_title, headcount, employment_type, justification, status)
        VALUES ($1, $2, 'Engineering', 'SRE', 1, 'full_time', 'On-call cover', 'pending_hod')
        "#,
    )
    .bind(requisition)
    .bind(raiser)
    .execute(&pool)
    .await
    .unwrap();

    let (status, body) = call(&app, "GET", "/api/v1/dashboard", hod, None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let pending = body["pending_approvals"]["requisitions"].as_array().unwrap();
    assert!(pending
        .iter()
        .any(|r| r["id"] == json!(requisition.to_string())));
}
