// Coding-standards and security-rule tools.
//
// These used to live in a separate stdio subprocess; the tool contract is
// kept (invoke by name with a JSON argument object, get back a JSON-encoded
// text payload) but the transport is an in-process call. The client is an
// injected dependency with an idempotent ensure_connected, so swapping the
// transport back out would not touch the orchestration layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

use crate::models::review::Severity;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
    #[error("Tool call failed: {0}")]
    Failed(String),
}

/// One rule returned by the standards/security tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RulesPayload {
    pub rules: Vec<Rule>,
    pub language: String,
    pub source: String,
}

#[derive(Debug, Deserialize)]
struct LanguageArgs {
    #[serde(default)]
    language: Option<String>,
}

/// Callable context-gathering tools, addressed by name.
#[async_trait::async_trait]
pub trait ContextTools: Send + Sync {
    /// Idempotent; safe to call before every tool invocation.
    async fn ensure_connected(&self) -> Result<(), ToolError>;

    /// Invokes a tool and returns its JSON-encoded text payload.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, ToolError>;
}

/// In-process implementation backed by the built-in rules database.
pub struct StandardsToolClient {
    connected: AtomicBool,
}

impl StandardsToolClient {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
        }
    }
}

impl Default for StandardsToolClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ContextTools for StandardsToolClient {
    async fn ensure_connected(&self) -> Result<(), ToolError> {
        if !self.connected.swap(true, Ordering::SeqCst) {
            tracing::info!("Context tools client connected (in-process)");
        }
        Ok(())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, ToolError> {
        self.ensure_connected().await?;

        let args: LanguageArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let language = args.language.unwrap_or_else(|| "javascript".to_string());

        let payload = match name {
            "get_coding_standards" => RulesPayload {
                rules: coding_standards(&language),
                language,
                source: "Lintelligent coding standards database".to_string(),
            },
            "get_security_rules" => RulesPayload {
                rules: security_rules(&language),
                language,
                source: "Lintelligent security rules database".to_string(),
            },
            other => return Err(ToolError::UnknownTool(other.to_string())),
        };

        serde_json::to_string(&payload).map_err(|e| ToolError::Failed(e.to_string()))
    }
}

fn rule(title: &str, description: &str, severity: Severity) -> Rule {
    Rule {
        title: title.to_string(),
        description: description.to_string(),
        severity,
    }
}

/// Languages without their own entry fall back to the javascript set.
fn coding_standards(language: &str) -> Vec<Rule> {
    match language {
        "typescript" => vec![
            rule(
                "No any",
                "Avoid the 'any' type; it disables type checking entirely",
                Severity::High,
            ),
            rule(
                "Validate external data",
                "Use type guards before trusting data from outside the type system",
                Severity::High,
            ),
            rule(
                "Strict mode",
                "Compile with strict type checking enabled",
                Severity::High,
            ),
            rule(
                "Interfaces for shapes",
                "Define interfaces for object shapes instead of inline types",
                Severity::Medium,
            ),
            rule(
                "Union types",
                "Model alternatives with union types rather than loose strings",
                Severity::Medium,
            ),
            rule(
                "Optional chaining",
                "Prefer ?. and ?? over manual null checks",
                Severity::Low,
            ),
        ],
        _ => vec![
            rule(
                "Proper error handling",
                "Handle errors with try/catch instead of letting them propagate silently",
                Severity::High,
            ),
            rule(
                "No var",
                "Use const/let instead of var to avoid hoisting surprises",
                Severity::High,
            ),
            rule(
                "Async/await",
                "Use async/await instead of promise chains for readability and error flow",
                Severity::High,
            ),
            rule(
                "Early returns",
                "Use early returns to reduce nesting (max 3 levels)",
                Severity::Medium,
            ),
            rule(
                "Meaningful names",
                "Use descriptive variable names",
                Severity::Low,
            ),
            rule(
                "Template literals",
                "Prefer template literals over string concatenation",
                Severity::Low,
            ),
        ],
    }
}

fn security_rules(language: &str) -> Vec<Rule> {
    match language {
        "typescript" => vec![
            rule(
                "No any for input",
                "Never type user input as 'any'; validate it with type guards",
                Severity::High,
            ),
            rule(
                "No as-any escapes",
                "Never bypass the type system with 'as any' on untrusted data",
                Severity::High,
            ),
            rule(
                "Validate env at startup",
                "Validate environment variables before use",
                Severity::High,
            ),
            rule(
                "Branded types",
                "Use branded types for sensitive values like tokens",
                Severity::Medium,
            ),
        ],
        _ => vec![
            rule(
                "No eval",
                "Never use eval() or the Function constructor on dynamic input",
                Severity::High,
            ),
            rule(
                "Parameterized queries",
                "Use parameterized queries to prevent SQL injection",
                Severity::High,
            ),
            rule(
                "Sanitize input",
                "Validate and sanitize all user input before use",
                Severity::High,
            ),
            rule(
                "No innerHTML with user data",
                "Avoid innerHTML with user-controlled strings (XSS)",
                Severity::High,
            ),
            rule(
                "No secrets in localStorage",
                "Never store sensitive data in localStorage",
                Severity::Medium,
            ),
            rule(
                "Hide stack traces",
                "Report errors without exposing stack traces to clients",
                Severity::Medium,
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_coding_standards_tool_returns_rules() {
        let client = StandardsToolClient::new();
        let text = client
            .call_tool("get_coding_standards", json!({"language": "javascript"}))
            .await
            .unwrap();
        let payload: RulesPayload = serde_json::from_str(&text).unwrap();
        assert!(!payload.rules.is_empty());
        assert_eq!(payload.language, "javascript");
    }

    #[tokio::test]
    async fn test_unknown_language_falls_back_to_javascript() {
        let client = StandardsToolClient::new();
        let text = client
            .call_tool("get_security_rules", json!({"language": "cobol"}))
            .await
            .unwrap();
        let payload: RulesPayload = serde_json::from_str(&text).unwrap();
        assert!(payload
            .rules
            .iter()
            .any(|r| r.title.contains("eval") || r.title.contains("Parameterized")));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_rejected() {
        let client = StandardsToolClient::new();
        let err = client.call_tool("get_weather", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(_)));
    }

    #[tokio::test]
    async fn test_ensure_connected_is_idempotent() {
        let client = StandardsToolClient::new();
        client.ensure_connected().await.unwrap();
        client.ensure_connected().await.unwrap();
    }
}
