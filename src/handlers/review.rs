// Review submission and rating endpoints.
//
// Persistence is best-effort on both paths: a failed save or rating write
// is logged and swallowed, and the caller still gets their result.

use crate::models::auth::{ErrorResponse, SessionData};
use crate::models::review::{
    RatingRequest, RatingResponse, RepoInfo, ReviewRequest, ReviewResponse, DEFAULT_LANGUAGE,
    DEFAULT_REVIEW_TYPE,
};
use crate::services::repo_context::RepoContextParams;
use crate::services::review::ReviewParams;
use crate::services::review_store::{self, NewReview};
use crate::session;
use crate::AppState;
use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, patch, post},
    Router,
};
use chrono::{SecondsFormat, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

lazy_static! {
    // UUID v4 shape, matching what the server itself generates.
    static ref REVIEW_ID_RE: Regex = Regex::new(
        r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$"
    )
    .unwrap();
}

pub fn review_routes() -> Router {
    Router::new()
        .route("/api/review", post(submit_review))
        .route("/api/review/stats", get(review_stats))
        .route("/api/review/:id/rating", patch(submit_rating))
}

async fn submit_review(
    headers: HeaderMap,
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<ReviewRequest>,
) -> Result<Json<ReviewResponse>, (StatusCode, Json<Value>)> {
    let code = validate_code(payload.code)?;

    let language = payload
        .language
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
    let review_type = payload
        .review_type
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_REVIEW_TYPE.to_string());

    let service = state.review_service.as_ref().ok_or((
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "AI API key not configured" })),
    ))?;

    let repo_context = resolve_repo_context(
        payload.repo_info.as_ref(),
        session::get_session(&headers, &state.session_secret),
    )?;

    let feedback = service
        .review_code(ReviewParams {
            code: code.clone(),
            language: language.clone(),
            review_type: review_type.clone(),
            repo_context,
        })
        .await
        .map_err(|e| {
            tracing::error!("AI review failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        })?;

    let review_id = Uuid::new_v4();

    if let Err(e) = review_store::save_review(
        &state.db_pool,
        NewReview {
            id: review_id,
            code: &code,
            language: &language,
            review_type: &review_type,
            feedback: &feedback,
        },
    )
    .await
    {
        tracing::warn!("Failed to save review to database: {}", e);
    } else {
        tracing::info!(review_id = %review_id, "Review saved to database");
    }

    Ok(Json(ReviewResponse {
        id: review_id,
        feedback,
        created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

async fn submit_rating(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<RatingRequest>,
) -> Result<Json<RatingResponse>, (StatusCode, Json<ErrorResponse>)> {
    if !is_valid_review_id(&id) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Invalid review ID format")),
        ));
    }

    let rating = coerce_rating(payload.rating.as_ref())
        .filter(|r| *r == 1 || *r == -1)
        .ok_or((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "Rating must be 1 (thumbs up) or -1 (thumbs down)",
            )),
        ))?;

    // Well-formed id, parse cannot fail after the shape check
    let review_id = Uuid::parse_str(&id).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Invalid review ID format")),
        )
    })?;

    match review_store::update_rating(&state.db_pool, review_id, rating as i16).await {
        Ok(()) => {
            tracing::info!(review_id = %review_id, rating, "Rating saved");
        }
        Err(e) => {
            tracing::warn!("Failed to save rating to database: {}", e);
        }
    }

    Ok(Json(RatingResponse {
        success: true,
        message: "Rating received".to_string(),
    }))
}

async fn review_stats(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, Json<ErrorResponse>)> {
    let stats = review_store::get_statistics(&state.db_pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to get review statistics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to get statistics")),
            )
        })?;
    Ok(Json(serde_json::to_value(stats).unwrap_or(Value::Null)))
}

/// Rejects a missing or blank code body with a field-level error.
fn validate_code(code: Option<String>) -> Result<String, (StatusCode, Json<Value>)> {
    code.filter(|code| !code.trim().is_empty()).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Validation failed",
                "details": { "fieldErrors": { "code": ["Required"] } },
            })),
        )
    })
}

/// Gate for repo-backed reviews. A complete repo reference needs an
/// authenticated session, since its token drives the context fetches; an
/// incomplete reference is ignored and the review proceeds without context.
fn resolve_repo_context(
    repo_info: Option<&RepoInfo>,
    session: Option<SessionData>,
) -> Result<Option<RepoContextParams>, (StatusCode, Json<Value>)> {
    match repo_info {
        Some(repo_info) => match repo_info.complete() {
            Some((owner, repo, git_ref, file_path)) => {
                let session = session.ok_or((
                    StatusCode::UNAUTHORIZED,
                    Json(json!({
                        "error": "GitHub authentication required for repo reviews"
                    })),
                ))?;
                Ok(Some(RepoContextParams {
                    owner,
                    repo,
                    git_ref,
                    file_path,
                    access_token: session.gh_token,
                }))
            }
            None => {
                tracing::warn!("Ignoring incomplete repoInfo on review request");
                Ok(None)
            }
        },
        None => Ok(None),
    }
}

fn is_valid_review_id(id: &str) -> bool {
    REVIEW_ID_RE.is_match(id)
}

/// Coerces the rating the way a loose JSON client would expect: numbers
/// directly, numeric strings via parsing. Everything else is invalid.
fn coerce_rating(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::GitHubUser;

    fn sample_session() -> SessionData {
        SessionData {
            gh_token: "gho_testtoken".to_string(),
            gh_user: GitHubUser {
                id: 42,
                login: "octocat".to_string(),
                avatar_url: None,
            },
        }
    }

    fn repo_info(owner: Option<&str>, file_path: Option<&str>) -> RepoInfo {
        RepoInfo {
            owner: owner.map(str::to_string),
            repo: Some("hello".to_string()),
            git_ref: Some("main".to_string()),
            file_path: file_path.map(str::to_string),
        }
    }

    #[test]
    fn test_missing_code_yields_field_error() {
        for code in [None, Some(String::new()), Some("   \n\t".to_string())] {
            let (status, Json(body)) = validate_code(code).unwrap_err();
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "Validation failed");
            assert_eq!(body["details"]["fieldErrors"]["code"][0], "Required");
        }
    }

    #[test]
    fn test_nonblank_code_passes_validation() {
        assert_eq!(
            validate_code(Some("const a = 1;".to_string())).unwrap(),
            "const a = 1;"
        );
    }

    #[test]
    fn test_repo_info_without_session_is_unauthorized() {
        let info = repo_info(Some("octocat"), Some("src/index.ts"));
        let (status, Json(body)) = resolve_repo_context(Some(&info), None).unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            body["error"],
            "GitHub authentication required for repo reviews"
        );
    }

    #[test]
    fn test_repo_info_with_session_carries_token() {
        let info = repo_info(Some("octocat"), Some("src/index.ts"));
        let params = resolve_repo_context(Some(&info), Some(sample_session()))
            .unwrap()
            .unwrap();
        assert_eq!(params.owner, "octocat");
        assert_eq!(params.file_path, "src/index.ts");
        assert_eq!(params.access_token, "gho_testtoken");
    }

    #[test]
    fn test_incomplete_repo_info_is_ignored() {
        // Missing fields never trigger the auth gate; the review just runs
        // without repo context.
        let info = repo_info(Some("octocat"), None);
        assert!(resolve_repo_context(Some(&info), None).unwrap().is_none());
        let info = repo_info(None, Some("src/index.ts"));
        assert!(resolve_repo_context(Some(&info), Some(sample_session()))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_absent_repo_info_needs_no_session() {
        assert!(resolve_repo_context(None, None).unwrap().is_none());
    }

    #[test]
    fn test_review_id_accepts_v4_shape() {
        assert!(is_valid_review_id("123e4567-e89b-42d3-a456-426614174000"));
        assert!(is_valid_review_id(&Uuid::new_v4().to_string()));
    }

    #[test]
    fn test_review_id_rejects_malformed() {
        assert!(!is_valid_review_id("not-a-uuid"));
        // v1 shape (version nibble is 1, not 4)
        assert!(!is_valid_review_id("123e4567-e89b-12d3-a456-426614174000"));
        assert!(!is_valid_review_id(""));
        assert!(!is_valid_review_id("123e4567e89b42d3a456426614174000"));
    }

    #[test]
    fn test_coerce_rating_numbers() {
        assert_eq!(coerce_rating(Some(&json!(1))), Some(1));
        assert_eq!(coerce_rating(Some(&json!(-1))), Some(-1));
        assert_eq!(coerce_rating(Some(&json!(1.0))), Some(1));
        assert_eq!(coerce_rating(Some(&json!(0))), Some(0));
        assert_eq!(coerce_rating(Some(&json!(2))), Some(2));
    }

    #[test]
    fn test_coerce_rating_strings() {
        assert_eq!(coerce_rating(Some(&json!("1"))), Some(1));
        assert_eq!(coerce_rating(Some(&json!("-1"))), Some(-1));
        assert_eq!(coerce_rating(Some(&json!("x"))), None);
    }

    #[test]
    fn test_coerce_rating_rejects_other_shapes() {
        assert_eq!(coerce_rating(None), None);
        assert_eq!(coerce_rating(Some(&json!(null))), None);
        assert_eq!(coerce_rating(Some(&json!([1]))), None);
        assert_eq!(coerce_rating(Some(&json!({"value": 1}))), None);
        assert_eq!(coerce_rating(Some(&json!(1.5))), None);
    }

    #[test]
    fn test_only_plus_minus_one_pass_validation() {
        for (value, ok) in [
            (json!(1), true),
            (json!(-1), true),
            (json!(0), false),
            (json!(2), false),
            (json!("x"), false),
        ] {
            let accepted = coerce_rating(Some(&value))
                .filter(|r| *r == 1 || *r == -1)
                .is_some();
            assert_eq!(accepted, ok, "value: {}", value);
        }
    }
}
