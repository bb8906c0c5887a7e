// Signed-cookie session handling for GitHub OAuth.
//
// The session lives entirely in a signed, httpOnly `sess` cookie: a JWT
// carrying the GitHub access token and a minimal user profile, expiring
// after 8 hours. A second short-lived `oauth_state` cookie protects the
// OAuth callback against CSRF. Nothing is stored server-side.

use crate::models::auth::{GitHubUser, SessionData};
use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const SESSION_COOKIE: &str = "sess";
pub const STATE_COOKIE: &str = "oauth_state";

const SESSION_TTL_SECONDS: i64 = 60 * 60 * 8;
const STATE_TTL_SECONDS: i64 = 60 * 10;

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    gh_token: String,
    gh_user: GitHubUser,
    exp: usize,
    iat: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct StateClaims {
    state: String,
    exp: usize,
}

pub fn generate_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

pub fn encode_session(
    secret: &str,
    data: &SessionData,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = SessionClaims {
        gh_token: data.gh_token.clone(),
        gh_user: data.gh_user.clone(),
        exp: (now + Duration::seconds(SESSION_TTL_SECONDS)).timestamp() as usize,
        iat: now.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

pub fn decode_session(secret: &str, token: &str) -> Option<SessionData> {
    let data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )
    .ok()?;
    Some(SessionData {
        gh_token: data.claims.gh_token,
        gh_user: data.claims.gh_user,
    })
}

pub fn encode_state(secret: &str, state: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = StateClaims {
        state: state.to_string(),
        exp: (Utc::now() + Duration::seconds(STATE_TTL_SECONDS)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

pub fn decode_state(secret: &str, token: &str) -> Option<String> {
    let data = decode::<StateClaims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )
    .ok()?;
    Some(data.claims.state)
}

fn cookie_attributes(max_age: i64) -> String {
    let mut attrs = format!("Path=/; HttpOnly; SameSite=Lax; Max-Age={}", max_age);
    if !cfg!(debug_assertions) {
        attrs.push_str("; Secure");
    }
    attrs
}

pub fn session_cookie(
    secret: &str,
    data: &SessionData,
) -> Result<String, jsonwebtoken::errors::Error> {
    let token = encode_session(secret, data)?;
    Ok(format!(
        "{}={}; {}",
        SESSION_COOKIE,
        token,
        cookie_attributes(SESSION_TTL_SECONDS)
    ))
}

pub fn state_cookie(secret: &str, state: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let token = encode_state(secret, state)?;
    Ok(format!(
        "{}={}; {}",
        STATE_COOKIE,
        token,
        cookie_attributes(STATE_TTL_SECONDS)
    ))
}

pub fn clear_session_cookie() -> String {
    format!("{}=; {}", SESSION_COOKIE, cookie_attributes(0))
}

pub fn clear_state_cookie() -> String {
    format!("{}=; {}", STATE_COOKIE, cookie_attributes(0))
}

/// Pulls a named cookie out of the Cookie request header.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get("cookie")?.to_str().ok()?;
    for pair in raw.split(';') {
        let pair = pair.trim();
        if let Some((key, value)) = pair.split_once('=') {
            if key == name {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Reads and verifies the session cookie. Returns None for a missing,
/// tampered, or expired cookie.
pub fn get_session(headers: &HeaderMap, secret: &str) -> Option<SessionData> {
    let token = cookie_value(headers, SESSION_COOKIE)?;
    decode_session(secret, &token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn sample_session() -> SessionData {
        SessionData {
            gh_token: "gho_testtoken".to_string(),
            gh_user: GitHubUser {
                id: 42,
                login: "octocat".to_string(),
                avatar_url: Some("https://avatars.example/42".to_string()),
            },
        }
    }

    #[test]
    fn test_session_roundtrip() {
        let token = encode_session("secret", &sample_session()).unwrap();
        let decoded = decode_session("secret", &token).unwrap();
        assert_eq!(decoded.gh_token, "gho_testtoken");
        assert_eq!(decoded.gh_user.id, 42);
        assert_eq!(decoded.gh_user.login, "octocat");
    }

    #[test]
    fn test_session_rejects_wrong_secret() {
        let token = encode_session("secret", &sample_session()).unwrap();
        assert!(decode_session("other-secret", &token).is_none());
    }

    #[test]
    fn test_session_rejects_tampered_token() {
        let mut token = encode_session("secret", &sample_session()).unwrap();
        token.push('x');
        assert!(decode_session("secret", &token).is_none());
    }

    #[test]
    fn test_state_roundtrip() {
        let state = generate_state();
        assert_eq!(state.len(), 32);
        let token = encode_state("secret", &state).unwrap();
        assert_eq!(decode_state("secret", &token).unwrap(), state);
    }

    #[test]
    fn test_cookie_value_parses_multiple_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "cookie",
            HeaderValue::from_static("a=1; sess=abc.def.ghi; b=2"),
        );
        assert_eq!(
            cookie_value(&headers, SESSION_COOKIE).as_deref(),
            Some("abc.def.ghi")
        );
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn test_get_session_missing_cookie() {
        let headers = HeaderMap::new();
        assert!(get_session(&headers, "secret").is_none());
    }
}
