use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use crate::applications::service::{
    current_status, find_application, find_visible_application, load_parties,
    parties_for_announcement, transition,
};
use crate::applications::status::ApplicationStatus;
use crate::approvals::history::{list_history, record_decision};
use crate::approvals::{ChainState, DecisionRequest, SubjectKind, OFFER_CHAIN};
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::mailer::templates;
use crate::models::approval::ApprovalStepRow;
use crate::models::offer::OfferRow;
use crate::models::onboarding::{DocStatus, DocType};
use crate::models::user::Role;
use crate::notifications::NewNotification;
use crate::offers::letter::{render_offer_letter, OfferLetter};
use crate::offers::OfferStatus;
use crate::state::AppState;
use crate::storage::{get_object_text, offer_letter_key, put_object};

const CREATORS: &[Role] = &[Role::Hr, Role::SubRecruiter, Role::Hod];
const SENDERS: &[Role] = &[Role::Hr];
const DEFAULT_CURRENCY: &str = "INR";

#[derive(Debug, Deserialize)]
pub struct CreateOfferRequest {
    pub designation: Option<String>,
    pub salary: i64,
    pub currency: Option<String>,
    pub joining_date: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub accept: bool,
}

#[derive(Debug, Serialize)]
pub struct OfferDetail {
    pub offer: OfferRow,
    pub history: Vec<ApprovalStepRow>,
}

#[derive(Debug, PartialEq)]
struct OfferTerms {
    salary: i64,
    currency: String,
    joining_date: NaiveDate,
}

fn validate_terms(
    salary: i64,
    currency: Option<&str>,
    joining_date: NaiveDate,
    today: NaiveDate,
) -> Result<OfferTerms, AppError> {
    if salary <= 0 {
        return Err(AppError::Validation("salary must be positive".to_string()));
    }
    if joining_date < today {
        return Err(AppError::Validation(
            "joining_date cannot be in the past".to_string(),
        ));
    }
    let currency = currency
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CURRENCY)
        .to_uppercase();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::Validation(format!(
            "'{currency}' is not a three-letter currency code"
        )));
    }
    Ok(OfferTerms {
        salary,
        currency,
        joining_date,
    })
}

async fn find_offer(state: &AppState, id: Uuid) -> Result<OfferRow, AppError> {
    sqlx::query_as::<_, OfferRow>("SELECT * FROM offers WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Offer {id} not found")))
}

fn offer_link(id: Uuid) -> String {
    format!("/offers/{id}")
}

/// Compare-and-set on the offer status.
async fn move_offer(
    conn: &mut sqlx::PgConnection,
    id: Uuid,
    from: OfferStatus,
    to: OfferStatus,
) -> Result<OfferRow, AppError> {
    sqlx::query_as::<_, OfferRow>(
        r#"
        UPDATE offers SET status = $1, updated_at = now()
        WHERE id = $2 AND status = $3
        RETURNING *
        "#,
    )
    .bind(to.as_str())
    .bind(id)
    .bind(from.as_str())
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::Conflict("offer changed concurrently; reload and retry".to_string()))
}

/// POST /api/v1/applications/:id/offers
pub async fn handle_create(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(application_id): Path<Uuid>,
    Json(req): Json<CreateOfferRequest>,
) -> Result<(StatusCode, Json<OfferRow>), AppError> {
    user.require_role(CREATORS)?;
    let terms = validate_terms(
        req.salary,
        req.currency.as_deref(),
        req.joining_date,
        Utc::now().date_naive(),
    )?;

    let application = find_application(&state.db, application_id).await?;
    let status = current_status(&application)?;
    if status != ApplicationStatus::Interviewing {
        return Err(AppError::UnprocessableEntity(format!(
            "application is {status}; offers follow interviews"
        )));
    }
    let interviewed: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM interviews WHERE application_id = $1 AND status = 'completed')",
    )
    .bind(application_id)
    .fetch_one(&state.db)
    .await?;
    if !interviewed {
        return Err(AppError::UnprocessableEntity(
            "at least one interview must be completed before an offer".to_string(),
        ));
    }

    let (job, candidate) = load_parties(&state.db, &application).await?;
    let designation = req
        .designation
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(job.title.as_str())
        .to_string();

    let mut tx = state.db.begin().await?;
    let active: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM offers WHERE application_id = $1 AND status = ANY($2))",
    )
    .bind(application_id)
    .bind(OfferStatus::active_values())
    .fetch_one(&mut *tx)
    .await?;
    if active {
        return Err(AppError::Conflict(
            "an offer is already in progress for this application".to_string(),
        ));
    }

    let offer = sqlx::query_as::<_, OfferRow>(
        r#"
        INSERT INTO offers
            (id, application_id, designation, salary, currency, joining_date, notes, status, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(application_id)
    .bind(&designation)
    .bind(terms.salary)
    .bind(&terms.currency)
    .bind(terms.joining_date)
    .bind(req.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()))
    .bind(OfferStatus::Review(OFFER_CHAIN.initial()).as_str())
    .bind(user.id())
    .fetch_one(&mut *tx)
    .await?;
    transition(
        &mut tx,
        application_id,
        status,
        ApplicationStatus::OfferPending,
        user.id(),
        Some("Offer raised for approval"),
    )
    .await?;
    tx.commit().await?;

    info!("Offer {} raised for application {application_id}", offer.id);

    if let Some(stage) = OFFER_CHAIN.initial().pending_stage() {
        state
            .notifier
            .notify_role(
                &state.db,
                stage.owner(),
                None,
                NewNotification::new(
                    "offer_approval",
                    "Offer awaiting your approval",
                    format!("{designation} for {} ({})", candidate.full_name, job.title),
                )
                .link(offer_link(offer.id)),
            )
            .await;
    }

    Ok((StatusCode::CREATED, Json(offer)))
}

/// POST /api/v1/offers/:id/decision
pub async fn handle_decision(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<OfferDetail>, AppError> {
    let comment = req.validate()?;
    let offer = find_offer(&state, id).await?;
    let current = match OfferStatus::from_str(&offer.status)? {
        OfferStatus::Review(chain) => chain,
        other => {
            return Err(AppError::Conflict(format!(
                "offer is already {other}; no further decisions accepted"
            )))
        }
    };
    let decided = current.apply(&OFFER_CHAIN, user.role(), req.decision)?;

    let application = find_application(&state.db, offer.application_id).await?;
    let (job, candidate) = load_parties(&state.db, &application).await?;

    // Upload the letter before taking row locks; the key is stable per offer
    let letter_key = if decided.next == ChainState::Approved {
        let letter = render_offer_letter(&OfferLetter {
            candidate_name: &candidate.full_name,
            designation: &offer.designation,
            department: &job.department,
            location: &job.location,
            salary: offer.salary,
            currency: &offer.currency,
            joining_date: offer.joining_date,
            notes: offer.notes.as_deref(),
            issued_on: Utc::now().date_naive(),
        });
        let key = offer_letter_key(application.id, id);
        put_object(
            &state.s3,
            &state.config.s3_bucket,
            &key,
            Bytes::from(letter),
            "text/markdown; charset=utf-8",
        )
        .await?;
        Some(key)
    } else {
        None
    };

    let mut tx = state.db.begin().await?;
    let mut updated = move_offer(
        &mut tx,
        id,
        OfferStatus::Review(current),
        OfferStatus::Review(decided.next),
    )
    .await?;
    record_decision(
        &mut tx,
        SubjectKind::Offer,
        id,
        decided.stage,
        req.decision,
        user.id(),
        comment.as_deref(),
    )
    .await?;

    if let Some(key) = &letter_key {
        updated = sqlx::query_as::<_, OfferRow>(
            "UPDATE offers SET letter_s3_key = $1, updated_at = now() WHERE id = $2 RETURNING *",
        )
        .bind(key)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
    }
    if decided.next == ChainState::Rejected {
        transition(
            &mut tx,
            application.id,
            ApplicationStatus::OfferPending,
            ApplicationStatus::Interviewing,
            user.id(),
            comment.as_deref(),
        )
        .await?;
    }
    let history = list_history(&mut *tx, SubjectKind::Offer, id).await?;
    tx.commit().await?;

    info!(
        "Offer {id}: {} {} by {} → {}",
        decided.stage,
        req.decision,
        user.id(),
        decided.next
    );

    let notification = match decided.next {
        ChainState::Pending(stage) => {
            state
                .notifier
                .notify_role(
                    &state.db,
                    stage.owner(),
                    None,
                    NewNotification::new(
                        "offer_approval",
                        "Offer awaiting your approval",
                        format!("{} for {}", updated.designation, candidate.full_name),
                    )
                    .link(offer_link(id)),
                )
                .await;
            None
        }
        ChainState::Approved => Some(NewNotification::new(
            "offer_decided",
            "Offer approved",
            format!(
                "The offer for {} is approved and ready to send",
                candidate.full_name
            ),
        )),
        ChainState::Rejected => Some(NewNotification::new(
            "offer_decided",
            "Offer rejected",
            format!(
                "The offer for {} was rejected: {}",
                candidate.full_name,
                comment.as_deref().unwrap_or_default()
            ),
        )),
    };
    if let Some(notification) = notification {
        state
            .notifier
            .notify_user(&state.db, updated.created_by, notification.link(offer_link(id)))
            .await;
    }

    Ok(Json(OfferDetail {
        offer: updated,
        history,
    }))
}

/// POST /api/v1/offers/:id/send
pub async fn handle_send(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<OfferRow>, AppError> {
    user.require_role(SENDERS)?;
    let offer = find_offer(&state, id).await?;
    let approved = OfferStatus::Review(ChainState::Approved);
    if OfferStatus::from_str(&offer.status)? != approved {
        return Err(AppError::Conflict(format!(
            "offer is {}; only approved offers can be sent",
            offer.status
        )));
    }
    let application = find_application(&state.db, offer.application_id).await?;

    let mut tx = state.db.begin().await?;
    let sent = move_offer(&mut tx, id, approved, OfferStatus::Sent).await?;
    transition(
        &mut tx,
        application.id,
        ApplicationStatus::OfferPending,
        ApplicationStatus::Offered,
        user.id(),
        None,
    )
    .await?;
    tx.commit().await?;

    info!("Offer {id} sent to candidate {}", application.candidate_id);

    let Some((job, candidate)) = parties_for_announcement(&state.db, &application).await else {
        return Ok(Json(sent));
    };
    state
        .notifier
        .notify_user(
            &state.db,
            candidate.id,
            NewNotification::new(
                "offer_sent",
                format!("You have an offer: {}", job.title),
                format!("Review and respond to your offer for {}", sent.designation),
            )
            .link(offer_link(id)),
        )
        .await;
    state.mailer.dispatch(templates::offer_extended(
        &candidate.email,
        &candidate.full_name,
        &sent.designation,
        sent.joining_date,
    ));

    Ok(Json(sent))
}

/// POST /api/v1/offers/:id/respond
///
/// Accepting hires the candidate and opens their onboarding checklist.
pub async fn handle_respond(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<RespondRequest>,
) -> Result<Json<OfferRow>, AppError> {
    let offer = find_offer(&state, id).await?;
    let application = find_application(&state.db, offer.application_id).await?;
    if application.candidate_id != user.id() {
        return Err(AppError::NotFound(format!("Offer {id} not found")));
    }
    let status = OfferStatus::from_str(&offer.status)?;
    if status != OfferStatus::Sent {
        return Err(AppError::Conflict(format!(
            "offer is {status}; only sent offers can be answered"
        )));
    }
    let (offer_to, application_to) = if req.accept {
        (OfferStatus::Accepted, ApplicationStatus::Hired)
    } else {
        (OfferStatus::Declined, ApplicationStatus::OfferDeclined)
    };

    let mut tx = state.db.begin().await?;
    let answered = move_offer(&mut tx, id, status, offer_to).await?;
    transition(
        &mut tx,
        application.id,
        ApplicationStatus::Offered,
        application_to,
        user.id(),
        None,
    )
    .await?;
    if req.accept {
        for doc_type in DocType::ALL {
            sqlx::query(
                r#"
                INSERT INTO onboarding_documents (id, application_id, doc_type, status)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (application_id, doc_type) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(application.id)
            .bind(doc_type.as_str())
            .bind(DocStatus::Pending.as_str())
            .execute(&mut *tx)
            .await?;
        }
    }
    tx.commit().await?;

    info!("Offer {id} {} by candidate {}", offer_to, user.id());

    let mut recipients = vec![answered.created_by];
    if let Ok(job) = crate::jobs::service::find_job(&state.db, application.job_id).await {
        recipients.push(job.posted_by);
    }
    state
        .notifier
        .notify(
            &state.db,
            &recipients,
            NewNotification::new(
                "offer_response",
                format!("Offer {offer_to}"),
                format!("{} has {offer_to} the offer for {}", user.0.full_name, answered.designation),
            )
            .link(offer_link(id)),
        )
        .await;

    Ok(Json(answered))
}

/// GET /api/v1/offers/:id
pub async fn handle_get(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<OfferDetail>, AppError> {
    let offer = find_offer(&state, id).await?;
    find_visible_application(&state.db, &user, offer.application_id).await?;
    if !user.is_staff() && !OfferStatus::from_str(&offer.status)?.is_released() {
        return Err(AppError::NotFound(format!("Offer {id} not found")));
    }
    let history = list_history(&state.db, SubjectKind::Offer, id).await?;
    Ok(Json(OfferDetail { offer, history }))
}

/// GET /api/v1/offers/:id/letter
pub async fn handle_letter(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let offer = find_offer(&state, id).await?;
    find_visible_application(&state.db, &user, offer.application_id).await?;
    let status = OfferStatus::from_str(&offer.status)?;
    let visible = if user.is_staff() {
        status.has_letter()
    } else {
        status.is_released()
    };
    let key = match (&offer.letter_s3_key, visible) {
        (Some(key), true) => key,
        _ => {
            return Err(AppError::NotFound(format!(
                "No offer letter available for offer {id}"
            )))
        }
    };

    let text = get_object_text(&state.s3, &state.config.s3_bucket, key).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        text,
    ))
}
