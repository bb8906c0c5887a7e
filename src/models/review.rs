use serde::{Deserialize, Serialize};

pub const DEFAULT_LANGUAGE: &str = "javascript";
pub const DEFAULT_REVIEW_TYPE: &str = "best-practices";

/// Body of POST /api/review. `code` is optional here so that validation
/// can answer with a field-level error instead of a deserializer rejection.
#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub code: Option<String>,
    pub language: Option<String>,
    #[serde(rename = "reviewType")]
    pub review_type: Option<String>,
    #[serde(rename = "repoInfo")]
    pub repo_info: Option<RepoInfo>,
}

/// Repository reference attached to a review request. All four fields must
/// be present and non-empty for repo context to be gathered; a partial
/// reference is ignored and the review proceeds without context.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoInfo {
    pub owner: Option<String>,
    pub repo: Option<String>,
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    #[serde(rename = "filePath")]
    pub file_path: Option<String>,
}

impl RepoInfo {
    /// Returns (owner, repo, ref, file_path) when every field is usable.
    pub fn complete(&self) -> Option<(String, String, String, String)> {
        match (&self.owner, &self.repo, &self.git_ref, &self.file_path) {
            (Some(owner), Some(repo), Some(git_ref), Some(file_path))
                if !owner.is_empty()
                    && !repo.is_empty()
                    && !git_ref.is_empty()
                    && !file_path.is_empty() =>
            {
                Some((
                    owner.clone(),
                    repo.clone(),
                    git_ref.clone(),
                    file_path.clone(),
                ))
            }
            _ => None,
        }
    }

}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// One line-anchored issue proposed by the model. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewSuggestion {
    pub severity: Severity,
    pub line: u32,
    pub message: String,
    pub reason: String,
    #[serde(rename = "fixedCode", skip_serializing_if = "Option::is_none")]
    pub fixed_code: Option<String>,
}

/// The model's full reply: suggestions + summary + which model produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewFeedback {
    pub suggestions: Vec<ReviewSuggestion>,
    pub summary: String,
    #[serde(rename = "aiModel", default)]
    pub ai_model: String,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub id: uuid::Uuid,
    pub feedback: ReviewFeedback,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

/// Body of PATCH /api/review/:id/rating. The rating arrives as whatever JSON
/// the client sent (number or numeric string) and is coerced during validation.
#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    pub rating: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct RatingResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ReviewStatistics {
    #[serde(rename = "totalReviews")]
    pub total_reviews: i64,
    #[serde(rename = "totalRatings")]
    pub total_ratings: i64,
    #[serde(rename = "positiveRatings")]
    pub positive_ratings: i64,
    #[serde(rename = "negativeRatings")]
    pub negative_ratings: i64,
    #[serde(rename = "averageRating")]
    pub average_rating: f64,
}
