// AI review orchestration.
//
// Gathers the two optional context hints (standards/security rules, repo
// context), builds the two-message review prompt, calls the model, and
// parses its JSON reply. Context failures degrade to "no context"; only
// the model call itself can fail the review.

use std::sync::Arc;
use thiserror::Error;

use crate::claude_client::{ClaudeClient, ClaudeError, ClaudeMessage};
use crate::models::review::{ReviewFeedback, Severity};
use crate::services::context_tools::{ContextTools, Rule, RulesPayload};
use crate::services::repo_context::{RepoContextClient, RepoContextParams};

/// Keep at most this many rules per category in the prompt hint.
const MAX_RULES_PER_CATEGORY: usize = 3;

const PARSE_FAILURE_SUMMARY: &str = "Failed to parse AI response. Please try again.";

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error(transparent)]
    Model(#[from] ClaudeError),
}

#[derive(Debug)]
pub struct ReviewParams {
    pub code: String,
    pub language: String,
    pub review_type: String,
    pub repo_context: Option<RepoContextParams>,
}

pub struct ReviewService {
    claude: ClaudeClient,
    standards: Arc<dyn ContextTools>,
    repo_context: Arc<RepoContextClient>,
}

impl ReviewService {
    pub fn new(
        claude: ClaudeClient,
        standards: Arc<dyn ContextTools>,
        repo_context: Arc<RepoContextClient>,
    ) -> Self {
        Self {
            claude,
            standards,
            repo_context,
        }
    }

    pub async fn review_code(&self, params: ReviewParams) -> Result<ReviewFeedback, ReviewError> {
        tracing::debug!(
            language = %params.language,
            review_type = %params.review_type,
            with_repo_context = params.repo_context.is_some(),
            "starting AI review"
        );

        let standards_hint = self.standards_hint(&params.language).await;

        let mut repo_hint = String::new();
        if let Some(repo_params) = &params.repo_context {
            match self.repo_context.context_summary(repo_params).await {
                Ok(hint) => repo_hint = hint,
                Err(e) => {
                    tracing::warn!("Could not get repo context: {}", e);
                }
            }
        }

        let messages = build_prompt(
            &params.code,
            &params.language,
            &standards_hint,
            &repo_hint,
            self.claude.model(),
        );

        let response = self.claude.review_completion(messages).await?;
        Ok(parse_feedback(response.first_text(), &response.model))
    }

    /// High-severity standards and security rules, compressed into a short
    /// hint string. Tool failures log and yield an empty hint.
    async fn standards_hint(&self, language: &str) -> String {
        let mut parts = Vec::new();

        for (tool, label) in [
            ("get_coding_standards", "Standards"),
            ("get_security_rules", "Security"),
        ] {
            match self
                .standards
                .call_tool(tool, serde_json::json!({ "language": language }))
                .await
            {
                Ok(text) => match serde_json::from_str::<RulesPayload>(&text) {
                    Ok(payload) => {
                        let compressed = compress_rules(&payload.rules);
                        if !compressed.is_empty() {
                            parts.push(format!("{}: {}", label, compressed));
                        }
                    }
                    Err(e) => tracing::warn!("Could not parse {} payload: {}", tool, e),
                },
                Err(e) => tracing::warn!("Could not get context from {}: {}", tool, e),
            }
        }

        parts.join(" | ")
    }
}

/// Filters to high-severity rules, keeps the top few, and renders them as
/// "Title: description" joined with "; ".
pub fn compress_rules(rules: &[Rule]) -> String {
    rules
        .iter()
        .filter(|r| r.severity == Severity::High)
        .take(MAX_RULES_PER_CATEGORY)
        .map(|r| format!("{}: {}", r.title, r.description))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Builds the two-message review prompt. The context hints go last on
/// purpose, so direct code evidence outweighs them.
pub fn build_prompt(
    code: &str,
    language: &str,
    standards_hint: &str,
    repo_hint: &str,
    model: &str,
) -> Vec<ClaudeMessage> {
    let instruction = format!(
        "You are a code reviewer. Return ONLY valid JSON in this format: \
         {{\"suggestions\":[{{\"severity\":\"low|medium|high\",\"line\":number,\
         \"message\":string,\"reason\":string,\"fixedCode\":string}}], \
         \"summary\":\"plain text summary\", \"aiModel\":\"{model}\"}}. \
         Return ONLY raw JSON, no markdown, no prose, no code fences. \
         PRIORITY: Code evidence FIRST. Examine actual code behavior before external hints. \
         SEVERITY GUIDE: Type mismatches (API/method returns different type than \
         declared/expected) = medium+. Runtime errors (ReferenceError, undefined access, \
         out-of-scope variables) = medium+. Logic errors = medium+. Security risks = high. \
         Style-only = low. \
         CRITICAL: When a method/API returns a different type than the function declares \
         or expects, that's a TYPE MISMATCH bug (medium+), not a style suggestion. \
         When a variable is accessed outside its scope, that's a RUNTIME ERROR (medium+), \
         not a style issue. \
         Look for: type mismatches, logic errors, scope issues, API misuse, security risks. \
         Each suggestion MUST cite exact line number and quote the exact offending code. \
         Only flag issues actually present in the code. \
         Review TARGET FILE line by line. When needed, look at related files from \
         PROJECT CONTEXT to confirm how shared state or helpers behave."
    );

    let repo_block = if repo_hint.is_empty() {
        String::new()
    } else {
        format!(
            "\n\nPROJECT CONTEXT: {}. Use this to understand the codebase structure, \
             dependencies, and how this file fits into the project.",
            repo_hint
        )
    };
    let hints_block = if standards_hint.is_empty() {
        String::new()
    } else {
        format!(
            "\n\nOPTIONAL HINTS (use only if code evidence supports them, ignore if they \
             conflict with actual code behavior): {}",
            standards_hint
        )
    };

    let body = [
        "Review this code:".to_string(),
        format!("Language: {}", language),
        "CODE:".to_string(),
        "```".to_string(),
        code.to_string(),
        "```".to_string(),
        "Requirements:".to_string(),
        "- Cite exact line number and quote exact code for each issue.".to_string(),
        "- Show suggested fixes in fixedCode when relevant.".to_string(),
        repo_block,
        hints_block,
    ]
    .into_iter()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join("\n");

    vec![ClaudeMessage::user(instruction), ClaudeMessage::user(body)]
}

/// Parses the model's reply: the slice between the first `{` and the last
/// `}` is treated as JSON. Anything unparseable degrades to an empty
/// suggestion list with an explanatory summary rather than an error.
pub fn parse_feedback(content: &str, fallback_model: &str) -> ReviewFeedback {
    let candidate = match (content.find('{'), content.rfind('}')) {
        (Some(first), Some(last)) if last > first => &content[first..=last],
        _ => content,
    };

    let mut feedback: ReviewFeedback = match serde_json::from_str(candidate) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("Could not parse AI review reply: {}", e);
            ReviewFeedback {
                suggestions: Vec::new(),
                summary: PARSE_FAILURE_SUMMARY.to_string(),
                ai_model: fallback_model.to_string(),
            }
        }
    };

    if feedback.ai_model.is_empty() {
        feedback.ai_model = fallback_model.to_string();
    }
    feedback
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(title: &str, severity: Severity) -> Rule {
        Rule {
            title: title.to_string(),
            description: format!("{} description", title),
            severity,
        }
    }

    #[test]
    fn test_compress_rules_filters_and_caps() {
        let rules = vec![
            rule("A", Severity::High),
            rule("B", Severity::Low),
            rule("C", Severity::High),
            rule("D", Severity::High),
            rule("E", Severity::High),
        ];
        assert_eq!(
            compress_rules(&rules),
            "A: A description; C: C description; D: D description"
        );
    }

    #[test]
    fn test_compress_rules_empty_when_nothing_high() {
        let rules = vec![rule("A", Severity::Low), rule("B", Severity::Medium)];
        assert_eq!(compress_rules(&rules), "");
    }

    #[test]
    fn test_parse_feedback_valid_json_with_noise() {
        let reply = r#"Sure! Here is the review:
{"suggestions":[{"severity":"high","line":3,"message":"m","reason":"r","fixedCode":"f"}],"summary":"one issue","aiModel":"claude-3-haiku-20240307"}
Hope that helps."#;
        let feedback = parse_feedback(reply, "fallback-model");
        assert_eq!(feedback.suggestions.len(), 1);
        assert_eq!(feedback.suggestions[0].line, 3);
        assert_eq!(feedback.summary, "one issue");
        assert_eq!(feedback.ai_model, "claude-3-haiku-20240307");
    }

    #[test]
    fn test_parse_feedback_garbage_degrades() {
        let feedback = parse_feedback("not json at all", "claude-3-haiku-20240307");
        assert!(feedback.suggestions.is_empty());
        assert_eq!(feedback.summary, PARSE_FAILURE_SUMMARY);
        assert_eq!(feedback.ai_model, "claude-3-haiku-20240307");
    }

    #[test]
    fn test_parse_feedback_backfills_model() {
        let feedback = parse_feedback(r#"{"suggestions":[],"summary":"ok"}"#, "upstream-model");
        assert_eq!(feedback.ai_model, "upstream-model");
    }

    #[test]
    fn test_parse_feedback_mismatched_braces_degrade() {
        let feedback = parse_feedback("} backwards {", "m");
        assert!(feedback.suggestions.is_empty());
        assert_eq!(feedback.summary, PARSE_FAILURE_SUMMARY);
    }

    #[test]
    fn test_prompt_places_hints_last() {
        let messages = build_prompt(
            "const a = 1;",
            "javascript",
            "Standards: No eval: never",
            "Project: o/r (main) | Reviewing: src/a.ts",
            "claude-3-haiku-20240307",
        );
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.starts_with("You are a code reviewer."));
        let body = &messages[1].content;
        let code_pos = body.find("const a = 1;").unwrap();
        let repo_pos = body.find("PROJECT CONTEXT:").unwrap();
        let hints_pos = body.find("OPTIONAL HINTS").unwrap();
        assert!(code_pos < repo_pos);
        assert!(repo_pos < hints_pos);
    }

    #[test]
    fn test_prompt_omits_missing_hints() {
        let messages = build_prompt("x", "javascript", "", "", "m");
        let body = &messages[1].content;
        assert!(!body.contains("PROJECT CONTEXT"));
        assert!(!body.contains("OPTIONAL HINTS"));
    }
}
