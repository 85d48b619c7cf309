use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::approvals::history::{has_decisions, list_history, record_decision};
use crate::approvals::{ChainState, DecisionRequest, SubjectKind, REQUISITION_CHAIN};
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::mailer::templates;
use crate::models::approval::ApprovalStepRow;
use crate::models::requisition::RequisitionRow;
use crate::models::user::Role;
use crate::notifications::NewNotification;
use crate::requisitions::service::{find_requisition, validate, RequisitionInput};
use crate::state::AppState;
use crate::users::queries::find_user;

const RAISERS: &[Role] = &[Role::SubRecruiter, Role::Hod, Role::Hr];

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    #[serde(default)]
    pub mine: bool,
}

#[derive(Debug, Serialize)]
pub struct RequisitionDetail {
    pub requisition: RequisitionRow,
    pub history: Vec<ApprovalStepRow>,
}

fn link(id: Uuid) -> String {
    format!("/requisitions/{id}")
}

/// POST /api/v1/requisitions
pub async fn handle_create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<RequisitionInput>,
) -> Result<(StatusCode, Json<RequisitionRow>), AppError> {
    user.require_role(RAISERS)?;
    let valid = validate(input, user.0.department.as_deref())?;
    let status = REQUISITION_CHAIN.initial();

    let requisition = sqlx::query_as::<_, RequisitionRow>(
        r#"
        INSERT INTO requisitions
            (id, raised_by, department, position_title, headcount, employment_type,
             min_salary, max_salary, experience_min_years, required_skills, justification, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.id())
    .bind(&valid.department)
    .bind(&valid.position_title)
    .bind(valid.headcount)
    .bind(valid.employment_type.as_str())
    .bind(valid.min_salary)
    .bind(valid.max_salary)
    .bind(valid.experience_min_years)
    .bind(&valid.required_skills)
    .bind(&valid.justification)
    .bind(status.as_str())
    .fetch_one(&state.db)
    .await?;

    info!(
        "Requisition {} raised by {} for {}",
        requisition.id,
        user.id(),
        requisition.position_title
    );

    state
        .notifier
        .notify_role(
            &state.db,
            Role::Hod,
            Some(&requisition.department),
            NewNotification::new(
                "requisition_approval",
                "Requisition awaiting your approval",
                format!(
                    "{} raised a requisition for {} × {}",
                    user.0.full_name, requisition.headcount, requisition.position_title
                ),
            )
            .link(link(requisition.id)),
        )
        .await;

    Ok((StatusCode::CREATED, Json(requisition)))
}

/// GET /api/v1/requisitions
pub async fn handle_list(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<RequisitionRow>>, AppError> {
    user.require_staff()?;
    let only_mine = params.mine || user.role() == Role::SubRecruiter;

    let rows = sqlx::query_as::<_, RequisitionRow>(
        r#"
        SELECT * FROM requisitions
        WHERE ($1::text IS NULL OR status = $1)
          AND ($2 = false OR raised_by = $3)
        ORDER BY created_at DESC
        "#,
    )
    .bind(params.status.as_deref())
    .bind(only_mine)
    .bind(user.id())
    .fetch_all(&state.db)
    .await?;

    Ok(Json(rows))
}

/// GET /api/v1/requisitions/:id
pub async fn handle_get(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<RequisitionDetail>, AppError> {
    user.require_staff()?;
    let requisition = find_requisition(&state.db, id).await?;
    if user.role() == Role::SubRecruiter && requisition.raised_by != user.id() {
        return Err(AppError::NotFound(format!("Requisition {id} not found")));
    }
    let history = list_history(&state.db, SubjectKind::Requisition, id).await?;
    Ok(Json(RequisitionDetail {
        requisition,
        history,
    }))
}

/// PUT /api/v1/requisitions/:id
///
/// The raiser may revise a requisition until the first decision lands.
pub async fn handle_update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<RequisitionInput>,
) -> Result<Json<RequisitionRow>, AppError> {
    let existing = find_requisition(&state.db, id).await?;
    if existing.raised_by != user.id() {
        return Err(AppError::Forbidden);
    }
    let initial = REQUISITION_CHAIN.initial();
    if existing.status != initial.as_str()
        || has_decisions(&state.db, SubjectKind::Requisition, id).await?
    {
        return Err(AppError::Conflict(
            "requisition can no longer be edited once review has started".to_string(),
        ));
    }
    let valid = validate(input, Some(&existing.department))?;

    let updated = sqlx::query_as::<_, RequisitionRow>(
        r#"
        UPDATE requisitions SET
            department = $1, position_title = $2, headcount = $3, employment_type = $4,
            min_salary = $5, max_salary = $6, experience_min_years = $7,
            required_skills = $8, justification = $9, updated_at = now()
        WHERE id = $10 AND status = $11
        RETURNING *
        "#,
    )
    .bind(&valid.department)
    .bind(&valid.position_title)
    .bind(valid.headcount)
    .bind(valid.employment_type.as_str())
    .bind(valid.min_salary)
    .bind(valid.max_salary)
    .bind(valid.experience_min_years)
    .bind(&valid.required_skills)
    .bind(&valid.justification)
    .bind(id)
    .bind(initial.as_str())
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::Conflict("requisition changed while editing".to_string()))?;

    Ok(Json(updated))
}

/// POST /api/v1/requisitions/:id/decision
pub async fn handle_decision(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<RequisitionDetail>, AppError> {
    let comment = req.validate()?;
    let requisition = find_requisition(&state.db, id).await?;
    let current: ChainState = requisition.status.parse()?;
    let transition = current.apply(&REQUISITION_CHAIN, user.role(), req.decision)?;

    let mut tx = state.db.begin().await?;
    let updated = sqlx::query_as::<_, RequisitionRow>(
        r#"
        UPDATE requisitions SET status = $1, updated_at = now()
        WHERE id = $2 AND status = $3
        RETURNING *
        "#,
    )
    .bind(transition.next.as_str())
    .bind(id)
    .bind(current.as_str())
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| {
        AppError::Conflict("requisition was decided by someone else; reload and retry".to_string())
    })?;
    record_decision(
        &mut tx,
        SubjectKind::Requisition,
        id,
        transition.stage,
        req.decision,
        user.id(),
        comment.as_deref(),
    )
    .await?;
    let history = list_history(&mut *tx, SubjectKind::Requisition, id).await?;
    tx.commit().await?;

    info!(
        "Requisition {id}: {} {} by {} → {}",
        transition.stage,
        req.decision,
        user.id(),
        transition.next
    );

    announce_decision(&state, &updated, transition.next, comment.as_deref()).await;

    Ok(Json(RequisitionDetail {
        requisition: updated,
        history,
    }))
}

async fn announce_decision(
    state: &AppState,
    requisition: &RequisitionRow,
    next: ChainState,
    comment: Option<&str>,
) {
    match next {
        ChainState::Pending(stage) => {
            state
                .notifier
                .notify_role(
                    &state.db,
                    stage.owner(),
                    Some(&requisition.department),
                    NewNotification::new(
                        "requisition_approval",
                        "Requisition awaiting your approval",
                        format!(
                            "{} ({}) needs {} sign-off",
                            requisition.position_title, requisition.department, stage
                        ),
                    )
                    .link(link(requisition.id)),
                )
                .await;
        }
        ChainState::Approved | ChainState::Rejected => {
            let approved = next == ChainState::Approved;
            let outcome = if approved { "approved" } else { "rejected" };
            state
                .notifier
                .notify_user(
                    &state.db,
                    requisition.raised_by,
                    NewNotification::new(
                        "requisition_decided",
                        format!("Requisition {outcome}"),
                        format!("Your requisition for {} was {outcome}", requisition.position_title),
                    )
                    .link(link(requisition.id)),
                )
                .await;
            if approved {
                state
                    .notifier
                    .notify_role(
                        &state.db,
                        Role::Hr,
                        None,
                        NewNotification::new(
                            "requisition_ready",
                            "Requisition ready to post",
                            format!("{} is approved and can be posted", requisition.position_title),
                        )
                        .link(link(requisition.id)),
                    )
                    .await;
            }
            match find_user(&state.db, requisition.raised_by).await {
                Ok(Some(raiser)) => state.mailer.dispatch(templates::requisition_decided(
                    &raiser.email,
                    &raiser.full_name,
                    &requisition.position_title,
                    approved,
                    comment,
                )),
                Ok(None) => {}
                Err(e) => warn!(
                    "Skipping decision email for requisition {}: {e}",
                    requisition.id
                ),
            }
        }
    }
}
