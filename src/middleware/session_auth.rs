use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;

use crate::session::{IdentityProvider, SqliteIdentity};
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "humanizer_session";

/// Resolved session, stored in request extensions for downstream handlers.
#[derive(Clone, Debug)]
pub struct SessionUser {
    pub user_id: String,
}

pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let token = match jar.get(SESSION_COOKIE) {
        Some(cookie) => cookie.value().to_string(),
        None => return unauthorized("missing session cookie; sign in first"),
    };

    let identity = SqliteIdentity { db: state.db.clone() };
    match identity.current_user(&token).await {
        Ok(Some(user_id)) => {
            req.extensions_mut().insert(SessionUser { user_id });
            next.run(req).await
        }
        Ok(None) => unauthorized("session expired or unknown; sign in again"),
        Err(e) => e.into_response(),
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": message, "code": "unauthorized" })),
    )
        .into_response()
}
