use axum::extract::{Extension, State};
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::json;

use crate::db::queries;
use crate::error::AppError;
use crate::middleware::session_auth::{SessionUser, SESSION_COOKIE};
use crate::models::{SessionResponse, SignInRequest, SignUpRequest};
use crate::session::{
    generate_session_token, IdentityProvider, ProfileSource, SessionController, SqliteIdentity,
    SqliteProfiles,
};
use crate::state::AppState;

fn collaborators(state: &AppState) -> (SqliteIdentity, SqliteProfiles) {
    (
        SqliteIdentity { db: state.db.clone() },
        SqliteProfiles { db: state.db.clone() },
    )
}

async fn issue_session(state: &AppState, jar: CookieJar, user_id: &str) -> Result<CookieJar, AppError> {
    let token = generate_session_token();
    let expires_at = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::days(state.config.session_ttl_days))
        .ok_or_else(|| AppError::Internal("session expiry out of range".into()))?
        .to_rfc3339();

    {
        let db = state.db.lock().await;
        queries::create_auth_session(&db, &token, user_id, &expires_at)?;
    }

    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(state.config.session_ttl_days))
        .build();

    Ok(jar.add(cookie))
}

/// POST /auth/signup — create identity + profile, open a session.
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<SignUpRequest>,
) -> Result<(CookieJar, Json<SessionResponse>), AppError> {
    let (identity, profiles) = collaborators(&state);
    let mut ctrl = SessionController::new(identity, profiles);
    let profile = ctrl
        .sign_up(&req.email, &req.password, req.display_name.as_deref())
        .await?;

    let jar = issue_session(&state, jar, &profile.id).await?;
    tracing::info!(user = %profile.id, "account created");
    Ok((jar, Json(SessionResponse { profile })))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<SignInRequest>,
) -> Result<(CookieJar, Json<SessionResponse>), AppError> {
    let (identity, profiles) = collaborators(&state);
    let mut ctrl = SessionController::new(identity, profiles);
    let profile = ctrl.sign_in(&req.email, &req.password).await?;

    let jar = issue_session(&state, jar, &profile.id).await?;
    tracing::info!(user = %profile.id, "signed in");
    Ok((jar, Json(SessionResponse { profile })))
}

/// POST /auth/logout — clear the session cookie; the server-side session
/// goes away too when it can still be resolved.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<serde_json::Value>), AppError> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let token = cookie.value().to_string();
        let (identity, profiles) = collaborators(&state);
        match identity.current_user(&token).await {
            Ok(Some(user_id)) => {
                if let Ok(Some(profile)) = profiles.read_profile(&user_id).await {
                    let mut ctrl = SessionController::resume(identity, profiles, profile);
                    let _ = ctrl.sign_out().await;
                    if let Some(err) = ctrl.last_error() {
                        tracing::warn!(user = %user_id, error = %err, "sign-out revocation failed");
                    }
                } else {
                    let db = state.db.lock().await;
                    let _ = queries::delete_sessions_for_user(&db, &user_id);
                }
            }
            _ => {
                // Token no longer resolves; drop the row if one is left.
                let db = state.db.lock().await;
                let _ = queries::delete_auth_session(&db, &token);
            }
        }
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/").build());
    Ok((jar, Json(json!({ "ok": true }))))
}

/// GET /auth/me — refresh and return the signed-in profile.
pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<SessionResponse>, AppError> {
    let profiles = SqliteProfiles { db: state.db.clone() };
    let profile = profiles
        .read_profile(&user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("profile missing for this session".into()))?;
    Ok(Json(SessionResponse { profile }))
}
