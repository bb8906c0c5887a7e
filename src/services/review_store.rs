// Persistence operations for code reviews.
//
// Saves and rating updates are best-effort side effects: callers log
// failures and keep going, since the user-visible result does not depend
// on successful storage.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::review::{ReviewFeedback, ReviewStatistics};

pub struct NewReview<'a> {
    pub id: Uuid,
    pub code: &'a str,
    pub language: &'a str,
    pub review_type: &'a str,
    pub feedback: &'a ReviewFeedback,
}

pub async fn save_review(pool: &PgPool, review: NewReview<'_>) -> Result<(), sqlx::Error> {
    let feedback_json = serde_json::to_value(review.feedback)
        .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

    sqlx::query(
        "INSERT INTO code_reviews (id, code, language, review_type, ai_feedback, ai_model)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(review.id)
    .bind(review.code)
    .bind(review.language)
    .bind(review.review_type)
    .bind(feedback_json)
    .bind(&review.feedback.ai_model)
    .execute(pool)
    .await?;

    Ok(())
}

/// Last write wins; rating a review twice leaves the later value.
pub async fn update_rating(pool: &PgPool, review_id: Uuid, rating: i16) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE code_reviews SET user_rating = $1, rated_at = NOW() WHERE id = $2",
    )
    .bind(rating)
    .bind(review_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Aggregate rating numbers, for learning-loop analysis.
pub async fn get_statistics(pool: &PgPool) -> Result<ReviewStatistics, sqlx::Error> {
    let row: (i64, i64, i64, i64, Option<f64>) = sqlx::query_as(
        "SELECT COUNT(*),
                COUNT(user_rating),
                COUNT(*) FILTER (WHERE user_rating = 1),
                COUNT(*) FILTER (WHERE user_rating = -1),
                AVG(user_rating)::float8
         FROM code_reviews",
    )
    .fetch_one(pool)
    .await?;

    Ok(ReviewStatistics {
        total_reviews: row.0,
        total_ratings: row.1,
        positive_ratings: row.2,
        negative_ratings: row.3,
        average_rating: row.4.unwrap_or(0.0),
    })
}
