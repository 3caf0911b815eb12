use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use peerconnect_shared::{ApiResponse, AppResult, AuthUser};

use crate::events::publisher;
use crate::models::SessionReview;
use crate::services::reviews::{RatingSummary, ReviewInput};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitReviewRequest {
    pub reviewee_id: Uuid,
    /// Left untyped so the review gate reports `InvalidRating` for
    /// fractions, strings and missing values.
    #[serde(default)]
    pub rating: serde_json::Value,
    #[validate(length(max = 2000, message = "review must be at most 2000 characters"))]
    pub review_text: Option<String>,
    #[serde(default)]
    pub helpful: bool,
    #[serde(default)]
    pub would_recommend: bool,
}

#[derive(Debug, Serialize)]
pub struct ReviewStatus {
    pub has_reviewed: bool,
}

// --- POST /sessions/:id/reviews ---

pub async fn submit_review(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<SubmitReviewRequest>,
) -> AppResult<Json<ApiResponse<SessionReview>>> {
    req.validate()?;

    let review = state.reviews.submit(
        session_id,
        user.id,
        ReviewInput {
            reviewee_id: req.reviewee_id,
            rating: req.rating,
            review_text: req.review_text,
            helpful: req.helpful,
            would_recommend: req.would_recommend,
        },
    )?;

    publisher::publish_review_submitted(&state.events, &review).await;

    Ok(Json(ApiResponse::ok(review)))
}

// --- GET /sessions/:id/reviews ---

pub async fn list_reviews(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<SessionReview>>>> {
    Ok(Json(ApiResponse::ok(state.reviews.list_reviews(session_id, user.id)?)))
}

// --- GET /sessions/:id/reviews/status ---

pub async fn review_status(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ReviewStatus>>> {
    let has_reviewed = state.reviews.has_reviewed(session_id, user.id)?;
    Ok(Json(ApiResponse::ok(ReviewStatus { has_reviewed })))
}

// --- GET /users/:id/rating ---

pub async fn rating_summary(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<RatingSummary>>> {
    Ok(Json(ApiResponse::ok(state.reviews.rating_summary(user_id)?)))
}
