use axum::{http::StatusCode, response::Json, routing::get, Extension, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

mod claude_client;
mod db;
mod github_client;
mod handlers;
mod middleware;
mod models;
mod services;
mod session;

use claude_client::ClaudeClient;
use github_client::GitHubClient;
use services::context_tools::StandardsToolClient;
use services::repo_context::RepoContextClient;
use services::review::ReviewService;

// Shared per-process state: the connection pool, the long-lived service
// clients, and the configuration every handler needs.
pub struct AppState {
    pub db_pool: sqlx::PgPool,
    pub github: GitHubClient,
    pub review_service: Option<Arc<ReviewService>>,
    pub session_secret: String,
    pub github_client_id: Option<String>,
    pub github_client_secret: Option<String>,
    pub github_redirect_uri: String,
    pub frontend_url: String,
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_logging().expect("Failed to initialize logging");

    // The session secret signs every cookie; starting without one would
    // silently produce forgeable sessions.
    let session_secret =
        std::env::var("SESSION_SECRET").expect("SESSION_SECRET must be set");

    let db_pool = db::create_pool()
        .await
        .expect("Failed to create database pool.");

    let github = GitHubClient::new();

    // AI review service, only when the API key is present. Requests that
    // need it get a 500 until it is configured.
    let review_service = match std::env::var("ANTHROPIC_API_KEY").ok() {
        Some(api_key) if !api_key.is_empty() => {
            tracing::info!("Initializing AI review service (Anthropic)...");
            let standards = Arc::new(StandardsToolClient::new());
            let repo_context = Arc::new(RepoContextClient::new(github.clone()));
            Some(Arc::new(ReviewService::new(
                ClaudeClient::new(api_key),
                standards,
                repo_context,
            )))
        }
        _ => {
            tracing::warn!("ANTHROPIC_API_KEY not found. Code review will be unavailable.");
            None
        }
    };

    let github_client_id = std::env::var("GITHUB_CLIENT_ID").ok();
    let github_client_secret = std::env::var("GITHUB_CLIENT_SECRET").ok();
    if github_client_id.is_some() && github_client_secret.is_some() {
        tracing::info!("GitHub OAuth credentials loaded");
    } else {
        tracing::warn!("GitHub OAuth credentials not complete. Repo reviews disabled.");
    }

    let github_redirect_uri = std::env::var("GITHUB_REDIRECT_URI")
        .unwrap_or_else(|_| "http://localhost:3001/api/auth/github/callback".to_string());
    let frontend_url =
        std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

    let cors_origin = frontend_url
        .parse::<axum::http::HeaderValue>()
        .expect("FRONTEND_URL must be a valid origin");

    let shared_state = Arc::new(AppState {
        db_pool,
        github,
        review_service,
        session_secret,
        github_client_id,
        github_client_secret,
        github_redirect_uri,
        frontend_url,
    });

    let app = Router::new()
        .route("/", get(root))
        .route("/api/status", get(api_status))
        .merge(handlers::auth::auth_routes())
        .merge(handlers::github::github_routes())
        .merge(handlers::review::review_routes())
        .layer(axum::middleware::from_fn(
            middleware::rate_limit::rate_limit_middleware,
        ))
        .layer(axum::middleware::from_fn(
            middleware::logging::request_logging_middleware,
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(cors_origin)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PATCH,
                ])
                .allow_headers([axum::http::header::CONTENT_TYPE])
                .allow_credentials(true),
        )
        .layer(Extension(shared_state));

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(3001);

    // ConnectInfo provides socket addresses for per-IP rate limiting
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .expect("Failed to bind server port");
    tracing::info!("listening on {}", listener.local_addr().unwrap());
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .expect("Server error");
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "debug,lintelligent=trace,sqlx=info,reqwest=info,hyper=info,tower=info".to_string()
        } else {
            "info,lintelligent=info,sqlx=warn,reqwest=warn,hyper=warn,tower=warn".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        // JSON logging for production (easier for log aggregation)
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Lintelligent backend starting up...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Build mode: {}",
        if cfg!(debug_assertions) {
            "development"
        } else {
            "production"
        }
    );

    Ok(())
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "API Server is running!" }))
}

async fn api_status(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let db_status = match sqlx::query("SELECT 1").fetch_one(&state.db_pool).await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    Ok(Json(json!({
        "status": "operational",
        "version": env!("CARGO_PKG_VERSION"),
        "services": {
            "database": db_status,
            "ai_review": if state.review_service.is_some() { "configured" } else { "not_configured" },
            "github_oauth": if state.github_client_id.is_some() && state.github_client_secret.is_some() {
                "configured"
            } else {
                "not_configured"
            },
        },
    })))
}
