use crate::models::auth::ErrorResponse;
use crate::session;
use crate::AppState;
use axum::{
    extract::{Extension, Request},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;

/// Requires a valid session cookie. Verified session data is inserted into
/// the request extensions for handlers to pick up.
pub async fn require_session(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, impl IntoResponse> {
    let session = match session::get_session(&headers, &state.session_secret) {
        Some(session) => session,
        None => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("Not authenticated")),
            ));
        }
    };

    request.extensions_mut().insert(session);

    Ok(next.run(request).await)
}
