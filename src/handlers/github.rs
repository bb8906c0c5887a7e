// Authenticated pass-through to the GitHub REST API, using the session's
// token. Upstream non-2xx statuses are surfaced unchanged with a generic
// message; transport failures become 500s.

use crate::github_client::{decode_content, GitHubError};
use crate::middleware::session::require_session;
use crate::models::auth::{ErrorResponse, SessionData};
use crate::AppState;
use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

pub fn github_routes() -> Router {
    Router::new()
        .route("/api/github/repos", get(list_repos))
        .route("/api/github/repos/:owner/:repo/branches", get(list_branches))
        .route("/api/github/repos/:owner/:repo/tree/:branch", get(get_tree))
        .route("/api/github/repos/:owner/:repo/contents", get(get_contents))
        .layer(axum::middleware::from_fn(require_session))
}

fn upstream_error(error: GitHubError, message: &str) -> (StatusCode, Json<ErrorResponse>) {
    let status = error
        .upstream_status()
        .and_then(|s| StatusCode::from_u16(s).ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::error!("GitHub proxy error: {}", error);
    }
    (status, Json(ErrorResponse::new(message)))
}

async fn list_repos(
    Extension(state): Extension<Arc<AppState>>,
    Extension(session): Extension<SessionData>,
) -> Result<Json<Value>, (StatusCode, Json<ErrorResponse>)> {
    state
        .github
        .list_repos(&session.gh_token)
        .await
        .map(Json)
        .map_err(|e| upstream_error(e, "Failed to fetch repositories"))
}

async fn list_branches(
    Extension(state): Extension<Arc<AppState>>,
    Extension(session): Extension<SessionData>,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Json<Value>, (StatusCode, Json<ErrorResponse>)> {
    state
        .github
        .list_branches(&session.gh_token, &owner, &repo)
        .await
        .map(Json)
        .map_err(|e| upstream_error(e, "Failed to fetch branches"))
}

async fn get_tree(
    Extension(state): Extension<Arc<AppState>>,
    Extension(session): Extension<SessionData>,
    Path((owner, repo, branch)): Path<(String, String, String)>,
) -> Result<Json<Value>, (StatusCode, Json<ErrorResponse>)> {
    let branch_data = state
        .github
        .get_branch(&session.gh_token, &owner, &repo, &branch)
        .await
        .map_err(|e| upstream_error(e, "Failed to fetch branch"))?;

    let tree_sha = branch_data
        .pointer("/commit/sha")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            tracing::error!("Branch payload missing commit sha for {}/{}", owner, repo);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to fetch branch")),
            )
        })?
        .to_string();

    state
        .github
        .get_tree(&session.gh_token, &owner, &repo, &tree_sha)
        .await
        .map(Json)
        .map_err(|e| upstream_error(e, "Failed to fetch file tree"))
}

#[derive(Debug, Deserialize)]
struct ContentsQuery {
    path: Option<String>,
    #[serde(rename = "ref")]
    git_ref: Option<String>,
}

async fn get_contents(
    Extension(state): Extension<Arc<AppState>>,
    Extension(session): Extension<SessionData>,
    Path((owner, repo)): Path<(String, String)>,
    Query(query): Query<ContentsQuery>,
) -> Result<Json<Value>, (StatusCode, Json<ErrorResponse>)> {
    let path = query.path.filter(|p| !p.is_empty()).ok_or((
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new("Missing path parameter")),
    ))?;

    let mut content = state
        .github
        .get_contents(
            &session.gh_token,
            &owner,
            &repo,
            &path,
            query.git_ref.as_deref(),
        )
        .await
        .map_err(|e| upstream_error(e, "Failed to fetch file content"))?;

    // Decode base64 payloads so the client gets plain text. Directory
    // listings and already-plain payloads pass through untouched.
    if let Some(decoded) = decode_content(&content) {
        if let Some(object) = content.as_object_mut() {
            object.insert("content".to_string(), Value::String(decoded));
            object.insert("encoding".to_string(), Value::String("utf-8".to_string()));
        }
    }

    Ok(Json(content))
}
