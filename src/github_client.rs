// src/github_client.rs
//
// Thin client over the GitHub REST API. The proxy handlers pass the
// session's token through unchanged; upstream non-2xx statuses are
// preserved so they can be surfaced to the caller as-is.

use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::auth::GitHubUser;

const API_BASE: &str = "https://api.github.com";
const OAUTH_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GitHub API returned status {status}")]
    Status { status: u16 },
    #[error("GitHub request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{0}")]
    Protocol(String),
}

impl GitHubError {
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            GitHubError::Status { status } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

impl GitHubClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent(concat!("lintelligent-backend/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }

    async fn get_json(&self, token: &str, url: &str) -> Result<Value, GitHubError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GitHubError::Status {
                status: status.as_u16(),
            });
        }
        Ok(response.json().await?)
    }

    /// Exchanges an OAuth authorization code for an access token.
    pub async fn exchange_code(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<String, GitHubError> {
        let response = self
            .client
            .post(OAUTH_TOKEN_URL)
            .header("Accept", "application/json")
            .json(&serde_json::json!({
                "client_id": client_id,
                "client_secret": client_secret,
                "code": code,
                "redirect_uri": redirect_uri,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GitHubError::Status {
                status: status.as_u16(),
            });
        }

        let token: TokenResponse = response.json().await?;
        token
            .access_token
            .ok_or_else(|| GitHubError::Protocol("No access token received".to_string()))
    }

    pub async fn fetch_user(&self, token: &str) -> Result<GitHubUser, GitHubError> {
        let value = self.get_json(token, &format!("{}/user", API_BASE)).await?;
        serde_json::from_value(value)
            .map_err(|e| GitHubError::Protocol(format!("Unexpected user payload: {}", e)))
    }

    pub async fn list_repos(&self, token: &str) -> Result<Value, GitHubError> {
        self.get_json(
            token,
            &format!("{}/user/repos?per_page=100&sort=updated", API_BASE),
        )
        .await
    }

    pub async fn list_branches(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
    ) -> Result<Value, GitHubError> {
        self.get_json(
            token,
            &format!("{}/repos/{}/{}/branches", API_BASE, owner, repo),
        )
        .await
    }

    pub async fn get_branch(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<Value, GitHubError> {
        self.get_json(
            token,
            &format!("{}/repos/{}/{}/branches/{}", API_BASE, owner, repo, branch),
        )
        .await
    }

    /// Recursive tree listing for a commit SHA.
    pub async fn get_tree(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        tree_sha: &str,
    ) -> Result<Value, GitHubError> {
        self.get_json(
            token,
            &format!(
                "{}/repos/{}/{}/git/trees/{}?recursive=1",
                API_BASE, owner, repo, tree_sha
            ),
        )
        .await
    }

    /// Raw contents object for a path, optionally pinned to a ref.
    pub async fn get_contents(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<Value, GitHubError> {
        let mut url = format!(
            "{}/repos/{}/{}/contents/{}",
            API_BASE,
            owner,
            repo,
            urlencoding::encode(path).replace("%2F", "/")
        );
        if let Some(git_ref) = git_ref {
            url.push_str(&format!("?ref={}", urlencoding::encode(git_ref)));
        }
        self.get_json(token, &url).await
    }

    /// Fetches a file's text content. Every failure mode (upstream error,
    /// transport error, non-base64 payload) collapses into None so callers
    /// can treat it as "file not found".
    pub async fn fetch_file_text(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        git_ref: &str,
        path: &str,
    ) -> Option<String> {
        let value = self
            .get_contents(token, owner, repo, path, Some(git_ref))
            .await
            .ok()?;
        decode_content(&value)
    }
}

impl Default for GitHubClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Decodes a contents-API object's base64 `content` field. GitHub wraps the
/// payload at 60 columns, so whitespace has to be stripped first.
pub fn decode_content(value: &Value) -> Option<String> {
    if value.get("encoding").and_then(Value::as_str) != Some("base64") {
        return None;
    }
    let raw = value.get("content").and_then(Value::as_str)?;
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(cleaned)
        .ok()?;
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_content_strips_wrapping() {
        // "hello world" base64-encoded with a newline inserted mid-stream
        let value = json!({
            "encoding": "base64",
            "content": "aGVsbG8g\nd29ybGQ=\n",
        });
        assert_eq!(decode_content(&value).as_deref(), Some("hello world"));
    }

    #[test]
    fn test_decode_content_rejects_other_encodings() {
        let value = json!({ "encoding": "utf-8", "content": "hello" });
        assert!(decode_content(&value).is_none());
    }

    #[test]
    fn test_decode_content_rejects_invalid_base64() {
        let value = json!({ "encoding": "base64", "content": "not base64!!" });
        assert!(decode_content(&value).is_none());
    }
}
