use axum::extract::{Extension, State};
use axum::Json;

use crate::credits;
use crate::db::queries;
use crate::error::AppError;
use crate::middleware::session_auth::SessionUser;
use crate::models::{
    PlanChangeRequest, SessionResponse, TextSummary, TopUpRequest, TopUpResponse, UsageResponse,
};
use crate::state::AppState;

/// GET /api/v1/credits — balance, plan and recent activity.
pub async fn usage(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<UsageResponse>, AppError> {
    let db = state.db.lock().await;
    let profile = queries::get_profile(&db, &user.user_id)?
        .ok_or_else(|| AppError::NotFound("profile missing for this session".into()))?;

    let recent_texts = queries::list_recent_texts(&db, &user.user_id, 20)?
        .into_iter()
        .map(|t| TextSummary {
            id: t.id,
            credits_used: t.credits_used,
            created_at: t.created_at,
        })
        .collect();

    Ok(Json(UsageResponse {
        credits_remaining: profile.credits_remaining,
        plan_type: profile.plan_type,
        recent_texts,
    }))
}

/// POST /api/v1/credits/topup — add a credit pack to the balance.
pub async fn top_up(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Json(req): Json<TopUpRequest>,
) -> Result<Json<TopUpResponse>, AppError> {
    let db = state.db.lock().await;
    let new_balance = credits::credit(&db, &user.user_id, req.amount)?;

    tracing::info!(user = %user.user_id, credited = req.amount, new_balance, "credits topped up");

    Ok(Json(TopUpResponse {
        credited: req.amount,
        new_balance,
    }))
}

/// POST /api/v1/plan — switch the profile between free/pro/business.
pub async fn change_plan(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Json(req): Json<PlanChangeRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let db = state.db.lock().await;
    if queries::get_profile(&db, &user.user_id)?.is_none() {
        return Err(AppError::NotFound("profile missing for this session".into()));
    }
    queries::set_plan_type(&db, &user.user_id, req.plan_type)?;
    let profile = queries::get_profile(&db, &user.user_id)?
        .ok_or_else(|| AppError::Internal("profile row vanished".into()))?;

    tracing::info!(user = %user.user_id, plan = profile.plan_type.as_str(), "plan changed");

    Ok(Json(SessionResponse { profile }))
}
