// GitHub OAuth session endpoints.
//
// The callback exchanges the authorization code for an access token, pulls
// the user's profile, and stores both in the signed `sess` cookie. Nothing
// is written server-side; logout just clears the cookie and the underlying
// OAuth token stays valid upstream.

use crate::middleware::rate_limit::strict_rate_limit_middleware;
use crate::models::auth::{ErrorResponse, MeResponse, SessionData};
use crate::session;
use crate::AppState;
use axum::{
    extract::{Extension, Query},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Json, Redirect},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

const OAUTH_SCOPE: &str = "repo read:user";

pub fn auth_routes() -> Router {
    Router::new()
        .route("/api/auth/github/login", get(github_login))
        .route("/api/auth/github/callback", get(github_callback))
        .route("/api/auth/me", get(me))
        .route("/api/auth/logout", post(logout))
        .layer(axum::middleware::from_fn(strict_rate_limit_middleware))
}

async fn github_login(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let client_id = state.github_client_id.as_ref().ok_or_else(|| {
        tracing::error!("GitHub OAuth not configured");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("GitHub OAuth not configured")),
        )
    })?;

    let oauth_state = session::generate_state();
    let state_cookie = session::state_cookie(&state.session_secret, &oauth_state).map_err(|e| {
        tracing::error!("Failed to sign oauth_state cookie: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("Internal server error")),
        )
    })?;

    let url = format!(
        "https://github.com/login/oauth/authorize?client_id={}&redirect_uri={}&scope={}&state={}",
        urlencoding::encode(client_id),
        urlencoding::encode(&state.github_redirect_uri),
        urlencoding::encode(OAUTH_SCOPE),
        oauth_state
    );

    Ok((
        AppendHeaders([(SET_COOKIE, state_cookie)]),
        Redirect::to(&url),
    ))
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
}

async fn github_callback(
    Query(params): Query<CallbackQuery>,
    headers: HeaderMap,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let code = params.code.ok_or((
        StatusCode::BAD_REQUEST,
        "Missing authorization code".to_string(),
    ))?;
    let callback_state = params.state.ok_or((
        StatusCode::BAD_REQUEST,
        "Missing state parameter".to_string(),
    ))?;

    let stored_state = session::cookie_value(&headers, session::STATE_COOKIE)
        .and_then(|token| session::decode_state(&state.session_secret, &token));
    if stored_state.as_deref() != Some(callback_state.as_str()) {
        tracing::warn!("Invalid OAuth state");
        return Err((
            StatusCode::FORBIDDEN,
            "Invalid state parameter - possible CSRF attack".to_string(),
        ));
    }

    let (client_id, client_secret) = match (
        state.github_client_id.as_ref(),
        state.github_client_secret.as_ref(),
    ) {
        (Some(id), Some(secret)) => (id, secret),
        _ => {
            tracing::error!("GitHub OAuth not configured");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "GitHub OAuth not configured".to_string(),
            ));
        }
    };

    let access_token = state
        .github
        .exchange_code(client_id, client_secret, &code, &state.github_redirect_uri)
        .await
        .map_err(|e| {
            tracing::error!("OAuth code exchange failed: {}", e);
            match e.upstream_status() {
                Some(_) => (
                    StatusCode::BAD_REQUEST,
                    "Failed to exchange code for token".to_string(),
                ),
                None => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Authentication failed".to_string(),
                ),
            }
        })?;

    let gh_user = state.github.fetch_user(&access_token).await.map_err(|e| {
        tracing::error!("Failed to fetch user info: {}", e);
        match e.upstream_status() {
            Some(_) => (
                StatusCode::BAD_REQUEST,
                "Failed to fetch user info".to_string(),
            ),
            None => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication failed".to_string(),
            ),
        }
    })?;

    let session_data = SessionData {
        gh_token: access_token,
        gh_user,
    };
    let session_cookie =
        session::session_cookie(&state.session_secret, &session_data).map_err(|e| {
            tracing::error!("Failed to sign session cookie: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication failed".to_string(),
            )
        })?;

    tracing::info!(
        user = %session_data.gh_user.login,
        "GitHub OAuth login completed"
    );

    Ok((
        AppendHeaders([
            (SET_COOKIE, session::clear_state_cookie()),
            (SET_COOKIE, session_cookie),
        ]),
        Redirect::to(&state.frontend_url),
    ))
}

async fn me(headers: HeaderMap, Extension(state): Extension<Arc<AppState>>) -> Json<MeResponse> {
    match session::get_session(&headers, &state.session_secret) {
        Some(session) => Json(MeResponse {
            authenticated: true,
            user: Some(session.gh_user),
        }),
        None => Json(MeResponse {
            authenticated: false,
            user: None,
        }),
    }
}

async fn logout() -> impl IntoResponse {
    (
        AppendHeaders([(SET_COOKIE, session::clear_session_cookie())]),
        Json(json!({ "success": true })),
    )
}
