pub mod auth;
pub mod credits;
pub mod health;
pub mod texts;

use crate::middleware;
use crate::state::AppState;
use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;

pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let origin = state
        .config
        .allowed_origin
        .parse::<HeaderValue>()
        .context("ALLOWED_ORIGIN is not a valid header value")?;

    // Cookie-bound sessions, so credentials stay on and the origin is explicit.
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    // Everything that reads or spends a balance sits behind the session.
    let session_routes = Router::new()
        .route("/auth/me", axum::routing::get(auth::me))
        .route("/api/v1/humanize", axum::routing::post(texts::humanize_preview))
        .route(
            "/api/v1/texts",
            axum::routing::get(texts::list_texts).post(texts::save_text),
        )
        .route("/api/v1/credits", axum::routing::get(credits::usage))
        .route("/api/v1/credits/topup", axum::routing::post(credits::top_up))
        .route("/api/v1/plan", axum::routing::post(credits::change_plan))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::session_auth::require_session,
        ));

    Ok(Router::new()
        .route("/auth/signup", axum::routing::post(auth::signup))
        .route("/auth/login", axum::routing::post(auth::login))
        .route("/auth/logout", axum::routing::post(auth::logout))
        .route("/health", axum::routing::get(health::health_check))
        .merge(session_routes)
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(256 * 1024))
        .with_state(state))
}
