use axum::extract::{Extension, State};
use axum::Json;

use crate::db::queries;
use crate::error::AppError;
use crate::middleware::session_auth::SessionUser;
use crate::models::{
    HumanizeRequest, HumanizeResponse, HumanizedText, SaveTextRequest, SaveTextResponse,
};
use crate::pipeline::save::{save_humanized_text, MAX_INPUT_CHARS};
use crate::pipeline::{cost, humanize};
use crate::state::AppState;

/// POST /api/v1/humanize — transform the text and quote its cost. Nothing
/// is persisted or charged here; the returned request token keys the
/// subsequent save.
pub async fn humanize_preview(
    Extension(user): Extension<SessionUser>,
    Json(req): Json<HumanizeRequest>,
) -> Result<Json<HumanizeResponse>, AppError> {
    if req.text.trim().is_empty() {
        return Err(AppError::BadRequest("enter some text to humanize".into()));
    }
    if req.text.len() > MAX_INPUT_CHARS {
        return Err(AppError::BadRequest(format!(
            "text too long (max {} chars)",
            MAX_INPUT_CHARS
        )));
    }

    let mut rng = rand::thread_rng();
    let humanized_text = humanize::humanize(&req.text, &mut rng);
    let cost_in_credits = cost::credit_cost(req.text.len());

    tracing::info!(user = %user.user_id, chars = req.text.len(), cost = cost_in_credits, "humanize preview");

    Ok(Json(HumanizeResponse {
        humanized_text,
        cost_in_credits,
        request_token: uuid::Uuid::new_v4().to_string(),
    }))
}

/// POST /api/v1/texts — debit the quoted cost and persist the result.
pub async fn save_text(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Json(req): Json<SaveTextRequest>,
) -> Result<Json<SaveTextResponse>, AppError> {
    let mut db = state.db.lock().await;
    let text = save_humanized_text(&mut db, &user.user_id, &req)?;
    let credits_remaining = queries::get_credits(&db, &user.user_id)?
        .ok_or_else(|| AppError::Internal("profile row vanished".into()))?;

    tracing::info!(user = %user.user_id, credits_used = text.credits_used, "saved humanized text");

    Ok(Json(SaveTextResponse {
        text,
        credits_remaining,
    }))
}

/// GET /api/v1/texts — saved results, most recent first.
pub async fn list_texts(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<Vec<HumanizedText>>, AppError> {
    let db = state.db.lock().await;
    let texts = queries::list_texts(&db, &user.user_id)?;
    Ok(Json(texts))
}
