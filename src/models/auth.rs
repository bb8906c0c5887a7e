use serde::{Deserialize, Serialize};

/// Minimal GitHub profile kept inside the session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubUser {
    pub id: i64,
    pub login: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Session payload carried by the signed `sess` cookie.
/// Never persisted server-side; the cookie is the only copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub gh_token: String,
    pub gh_user: GitHubUser,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<GitHubUser>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
