// Repo-context assembly.
//
// Given a repository file reference, this builds a bounded text bundle for
// the review prompt: the target file, up to five files it imports, and a
// handful of well-known config files. Import specifiers are extracted with
// line-oriented pattern matching and resolved with a deliberately
// approximate heuristic (no bundler aliases, no monorepo workspaces, no
// directory-index imports beyond extension probing). That approximation is
// a documented limitation, not a bug.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

use crate::github_client::GitHubClient;

/// Candidate extensions probed for an import without a recognized extension,
/// in order. The empty string covers extensionless files.
const IMPORT_EXTENSIONS: [&str; 5] = ["", ".ts", ".tsx", ".js", ".jsx"];

/// At most this many import specifiers are chased per target file.
const MAX_IMPORTS: usize = 5;

/// Character caps applied to fetched content before it enters the prompt.
const RELATED_FILE_CHAR_CAP: usize = 2000;
const CONFIG_CHAR_CAP: usize = 1000;

lazy_static! {
    static ref IMPORT_RE: Regex =
        Regex::new(r#"import\s+.*?\s+from\s+["']([^"']+)["']"#).unwrap();
    static ref REQUIRE_RE: Regex = Regex::new(r#"require\(["']([^"']+)["']\)"#).unwrap();
    static ref SOURCE_EXT_RE: Regex = Regex::new(r"(?i)\.(js|jsx|ts|tsx)$").unwrap();
}

#[derive(Debug, Clone)]
pub struct RepoContextParams {
    pub owner: String,
    pub repo: String,
    pub git_ref: String,
    pub file_path: String,
    pub access_token: String,
}

#[derive(Debug, Error)]
pub enum RepoContextError {
    #[error("Failed to fetch target file {file_path} from {owner}/{repo}@{git_ref}")]
    TargetFileUnavailable {
        owner: String,
        repo: String,
        git_ref: String,
        file_path: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TargetFile {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RelatedFile {
    pub path: String,
    pub content: String,
    /// Why this file is part of the bundle.
    pub reason: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFiles {
    #[serde(rename = "packageJson", skip_serializing_if = "Option::is_none")]
    pub package_json: Option<String>,
    #[serde(rename = "tsconfigJson", skip_serializing_if = "Option::is_none")]
    pub tsconfig_json: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eslintrc: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectContext {
    #[serde(rename = "targetFile")]
    pub target_file: TargetFile,
    #[serde(rename = "relatedFiles")]
    pub related_files: Vec<RelatedFile>,
    pub configs: ConfigFiles,
    /// Import specifiers none of whose candidates could be fetched.
    #[serde(rename = "unresolvedImports")]
    pub unresolved_imports: Vec<String>,
    #[serde(rename = "projectSummary")]
    pub project_summary: String,
}

/// Extracts raw import specifiers from source text, line by line.
/// Handles `import ... from "..."` and `require("...")`; this is pattern
/// matching, not parsing.
pub fn parse_imports(content: &str) -> Vec<String> {
    let mut imports = Vec::new();
    for line in content.lines() {
        if let Some(captures) = IMPORT_RE.captures(line) {
            imports.push(captures[1].to_string());
        }
        if let Some(captures) = REQUIRE_RE.captures(line) {
            imports.push(captures[1].to_string());
        }
    }
    imports
}

/// Resolves an import specifier into candidate repository paths, in the
/// order they should be probed.
///
/// Bare specifiers resolve under the conventional `src/` root, absolute
/// specifiers from the repository root, and relative specifiers against the
/// importing file's directory with stack-based `.`/`..` normalization. A
/// path that already carries a recognized source extension is the sole
/// candidate; anything else gets the extension probe list.
pub fn resolve_import_candidates(import_path: &str, current_file_path: &str) -> Vec<String> {
    let is_relative = import_path.starts_with("./") || import_path.starts_with("../");
    let is_absolute = import_path.starts_with('/');

    let mut stack: Vec<String> = Vec::new();

    if !is_relative && !is_absolute {
        stack.push("src".to_string());
        stack.extend(
            import_path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
    } else if is_absolute {
        stack.extend(
            import_path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
    } else {
        // Start from the target file's directory, then walk the specifier.
        let mut dir: Vec<&str> = current_file_path.split('/').collect();
        dir.pop();
        stack.extend(dir.into_iter().map(str::to_string));
        for segment in import_path.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    stack.pop();
                }
                other => stack.push(other.to_string()),
            }
        }
    }

    let mut normalized: Vec<String> = Vec::new();
    for segment in stack {
        match segment.as_str() {
            "." => {}
            ".." => {
                normalized.pop();
            }
            _ => normalized.push(segment),
        }
    }
    let normalized_path = normalized.join("/");

    if SOURCE_EXT_RE.is_match(&normalized_path) {
        return vec![normalized_path];
    }

    let mut candidates = Vec::new();
    for ext in IMPORT_EXTENSIONS {
        let candidate = format!("{}{}", normalized_path, ext);
        if !candidate.is_empty() && !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }
    candidates
}

fn truncate_chars(content: String, cap: usize) -> String {
    if content.chars().count() <= cap {
        content
    } else {
        content.chars().take(cap).collect()
    }
}

fn build_summary(params: &RepoContextParams, context: &ProjectContext) -> String {
    let mut summary = format!(
        "Project: {}/{} ({}). Reviewing file: {}.",
        params.owner, params.repo, params.git_ref, params.file_path
    );
    if !context.related_files.is_empty() {
        let paths: Vec<&str> = context
            .related_files
            .iter()
            .map(|f| f.path.as_str())
            .collect();
        summary.push_str(&format!(" Related files: {}.", paths.join(", ")));
    }
    if !context.unresolved_imports.is_empty() {
        summary.push_str(&format!(
            " {} imports could not be resolved.",
            context.unresolved_imports.len()
        ));
    }
    summary
}

/// Renders the compressed pipe-joined context string handed to the prompt.
pub fn render_context_hint(params: &RepoContextParams, context: &ProjectContext) -> String {
    let mut parts = vec![
        format!(
            "Project: {}/{} ({})",
            params.owner, params.repo, params.git_ref
        ),
        format!("Reviewing: {}", params.file_path),
    ];
    if context.configs.package_json.is_some() {
        parts.push("Config: package.json dependencies".to_string());
    }
    if context.configs.tsconfig_json.is_some() {
        parts.push("Config: tsconfig.json".to_string());
    }
    if !context.related_files.is_empty() {
        let paths: Vec<&str> = context
            .related_files
            .iter()
            .map(|f| f.path.as_str())
            .collect();
        parts.push(format!("Related files: {}", paths.join(", ")));
    }
    if !context.unresolved_imports.is_empty() {
        parts.push(format!(
            "Unresolved imports: {}",
            context.unresolved_imports.join(", ")
        ));
    }
    parts.join(" | ")
}

/// Repo-context tool client. Long-lived, lazily connected, reused across
/// requests.
pub struct RepoContextClient {
    github: GitHubClient,
    connected: AtomicBool,
}

impl RepoContextClient {
    pub fn new(github: GitHubClient) -> Self {
        Self {
            github,
            connected: AtomicBool::new(false),
        }
    }

    /// Idempotent; first call logs, later calls are no-ops.
    pub fn ensure_connected(&self) {
        if !self.connected.swap(true, Ordering::SeqCst) {
            tracing::info!("Repo context client connected (in-process)");
        }
    }

    /// Assembles the full context bundle. Only the target-file fetch is
    /// fatal; every other missing file is skipped.
    pub async fn get_project_context(
        &self,
        params: &RepoContextParams,
    ) -> Result<ProjectContext, RepoContextError> {
        self.ensure_connected();

        let target_content = self
            .fetch(params, &params.file_path)
            .await
            .ok_or_else(|| RepoContextError::TargetFileUnavailable {
                owner: params.owner.clone(),
                repo: params.repo.clone(),
                git_ref: params.git_ref.clone(),
                file_path: params.file_path.clone(),
            })?;

        let imports = parse_imports(&target_content);
        let mut related_files = Vec::new();
        let mut unresolved_imports = Vec::new();

        for import in imports.iter().take(MAX_IMPORTS) {
            let candidates = resolve_import_candidates(import, &params.file_path);
            let mut resolved = false;
            for candidate in candidates {
                if let Some(content) = self.fetch(params, &candidate).await {
                    related_files.push(RelatedFile {
                        path: candidate,
                        content: truncate_chars(content, RELATED_FILE_CHAR_CAP),
                        reason: format!("Imported by {}", params.file_path),
                    });
                    resolved = true;
                    break;
                }
            }
            if !resolved {
                unresolved_imports.push(import.clone());
            }
        }

        let mut configs = ConfigFiles::default();
        configs.package_json = self
            .fetch(params, "package.json")
            .await
            .map(|c| truncate_chars(c, CONFIG_CHAR_CAP));
        configs.tsconfig_json = self
            .fetch(params, "tsconfig.json")
            .await
            .map(|c| truncate_chars(c, CONFIG_CHAR_CAP));
        let eslintrc = match self.fetch(params, ".eslintrc.json").await {
            Some(content) => Some(content),
            None => self.fetch(params, ".eslintrc.js").await,
        };
        configs.eslintrc = eslintrc.map(|c| truncate_chars(c, CONFIG_CHAR_CAP));

        let mut context = ProjectContext {
            target_file: TargetFile {
                path: params.file_path.clone(),
                content: target_content,
            },
            related_files,
            configs,
            unresolved_imports,
            project_summary: String::new(),
        };
        context.project_summary = build_summary(params, &context);
        Ok(context)
    }

    /// Bundle rendered as the compressed prompt hint. Target-file failures
    /// propagate; callers decide whether that aborts the review.
    pub async fn context_summary(
        &self,
        params: &RepoContextParams,
    ) -> Result<String, RepoContextError> {
        let context = self.get_project_context(params).await?;
        Ok(render_context_hint(params, &context))
    }

    async fn fetch(&self, params: &RepoContextParams, path: &str) -> Option<String> {
        self.github
            .fetch_file_text(
                &params.access_token,
                &params.owner,
                &params.repo,
                &params.git_ref,
                path,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_imports_matches_import_and_require() {
        let source = r#"
import fs from "fs";
import { helper } from './util';
const lodash = require("lodash");
// import commented from "nope" -- still matches, line-oriented on purpose
let x = 1;
"#;
        let imports = parse_imports(source);
        assert!(imports.contains(&"fs".to_string()));
        assert!(imports.contains(&"./util".to_string()));
        assert!(imports.contains(&"lodash".to_string()));
    }

    #[test]
    fn test_relative_import_candidate_order() {
        let candidates = resolve_import_candidates("./util", "src/a/b.ts");
        assert_eq!(
            candidates,
            vec![
                "src/a/util",
                "src/a/util.ts",
                "src/a/util.tsx",
                "src/a/util.js",
                "src/a/util.jsx",
            ]
        );
    }

    #[test]
    fn test_bare_import_resolves_under_src() {
        let candidates = resolve_import_candidates("lodash", "src/a/b.ts");
        assert_eq!(
            candidates,
            vec![
                "src/lodash",
                "src/lodash.ts",
                "src/lodash.tsx",
                "src/lodash.js",
                "src/lodash.jsx",
            ]
        );
    }

    #[test]
    fn test_absolute_import_resolves_from_root() {
        let candidates = resolve_import_candidates("/lib/helpers", "src/a/b.ts");
        assert_eq!(candidates[0], "lib/helpers");
        assert_eq!(candidates.len(), 5);
    }

    #[test]
    fn test_parent_traversal_is_normalized() {
        let candidates = resolve_import_candidates("../shared/api", "src/a/b.ts");
        assert_eq!(candidates[0], "src/shared/api");
    }

    #[test]
    fn test_recognized_extension_is_sole_candidate() {
        let candidates = resolve_import_candidates("./util.ts", "src/a/b.ts");
        assert_eq!(candidates, vec!["src/a/util.ts"]);
        let candidates = resolve_import_candidates("./styles.JSX", "src/a/b.ts");
        assert_eq!(candidates, vec!["src/a/styles.JSX"]);
    }

    #[test]
    fn test_render_context_hint_is_pipe_joined() {
        let params = RepoContextParams {
            owner: "octocat".to_string(),
            repo: "hello".to_string(),
            git_ref: "main".to_string(),
            file_path: "src/index.ts".to_string(),
            access_token: "t".to_string(),
        };
        let context = ProjectContext {
            target_file: TargetFile {
                path: "src/index.ts".to_string(),
                content: "code".to_string(),
            },
            related_files: vec![RelatedFile {
                path: "src/util.ts".to_string(),
                content: "helper".to_string(),
                reason: "Imported by src/index.ts".to_string(),
            }],
            configs: ConfigFiles {
                package_json: Some("{}".to_string()),
                tsconfig_json: None,
                eslintrc: None,
            },
            unresolved_imports: vec!["./missing".to_string()],
            project_summary: String::new(),
        };
        let hint = render_context_hint(&params, &context);
        assert_eq!(
            hint,
            "Project: octocat/hello (main) | Reviewing: src/index.ts | \
             Config: package.json dependencies | Related files: src/util.ts | \
             Unresolved imports: ./missing"
        );
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let truncated = truncate_chars("héllo wörld".repeat(300), 10);
        assert_eq!(truncated.chars().count(), 10);
    }
}
