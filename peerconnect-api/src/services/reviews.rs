use std::sync::Arc;

use chrono::Utc;
use peerconnect_shared::{AppError, AppResult, ErrorCode};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{NewSessionReview, SessionReview, SessionStatus};
use crate::repository::{ReviewRepository, SessionRepository};

pub const REVIEWS_SUBMITTED_TOTAL: &str = "reviews_submitted_total";

/// Rating reported for users nobody has reviewed yet.
pub const DEFAULT_AVERAGE_RATING: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct ReviewInput {
    pub reviewee_id: Uuid,
    /// Raw JSON value as submitted; only whole numbers 1 to 5 pass.
    pub rating: serde_json::Value,
    pub review_text: Option<String>,
    pub helpful: bool,
    pub would_recommend: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RatingSummary {
    pub user_id: Uuid,
    pub review_count: usize,
    pub average_rating: f64,
}

/// `4` and `4.0` are whole numbers; `4.5`, `"4"` and `null` are not.
fn whole_number(value: &serde_json::Value) -> Option<i64> {
    let serde_json::Value::Number(n) = value else {
        return None;
    };
    n.as_i64().or_else(|| {
        n.as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

pub fn average_rating(ratings: &[i16]) -> f64 {
    if ratings.is_empty() {
        return DEFAULT_AVERAGE_RATING;
    }
    ratings.iter().map(|r| *r as f64).sum::<f64>() / ratings.len() as f64
}

/// Admits at most one review per participant, once the session completed.
pub struct ReviewGate {
    sessions: Arc<dyn SessionRepository>,
    reviews: Arc<dyn ReviewRepository>,
}

impl ReviewGate {
    pub fn new(sessions: Arc<dyn SessionRepository>, reviews: Arc<dyn ReviewRepository>) -> Self {
        Self { sessions, reviews }
    }

    pub fn submit(&self, session_id: Uuid, reviewer_id: Uuid, input: ReviewInput) -> AppResult<SessionReview> {
        let session = self
            .sessions
            .find_session(session_id)?
            .ok_or_else(|| AppError::not_found("session not found"))?;

        if session.status != SessionStatus::Completed {
            return Err(AppError::new(
                ErrorCode::SessionNotCompleted,
                "reviews open once the session is completed",
            ));
        }

        let counterpart = session
            .counterpart(reviewer_id)
            .ok_or_else(|| AppError::forbidden("you are not a participant in this session"))?;

        if input.reviewee_id != counterpart {
            return Err(AppError::new(
                ErrorCode::ValidationError,
                "the reviewee must be the other participant",
            ));
        }

        let rating = whole_number(&input.rating)
            .filter(|r| (1..=5).contains(r))
            .ok_or_else(|| {
                AppError::with_details(
                    ErrorCode::InvalidRating,
                    "rating must be an integer from 1 to 5",
                    serde_json::json!({ "rating": input.rating }),
                )
            })?;

        if self.reviews.find_review(session_id, reviewer_id)?.is_some() {
            return Err(AppError::new(
                ErrorCode::DuplicateReview,
                "you have already reviewed this session",
            ));
        }

        let review_text = input
            .review_text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        // The unique index still decides a race between two submits.
        let review = self.reviews.insert_review(&NewSessionReview {
            id: Uuid::now_v7(),
            session_id,
            reviewer_id,
            reviewee_id: input.reviewee_id,
            rating: rating as i16,
            review_text,
            helpful_rating: input.helpful,
            would_recommend: input.would_recommend,
            created_at: Utc::now(),
        })?;

        metrics::counter!(REVIEWS_SUBMITTED_TOTAL).increment(1);
        tracing::info!(
            session_id = %session_id,
            reviewer_id = %reviewer_id,
            rating = review.rating,
            "review submitted"
        );
        Ok(review)
    }

    pub fn has_reviewed(&self, session_id: Uuid, reviewer_id: Uuid) -> AppResult<bool> {
        Ok(self.reviews.find_review(session_id, reviewer_id)?.is_some())
    }

    pub fn list_reviews(&self, session_id: Uuid, requester: Uuid) -> AppResult<Vec<SessionReview>> {
        let session = self
            .sessions
            .find_session(session_id)?
            .ok_or_else(|| AppError::not_found("session not found"))?;
        if !session.is_participant(requester) {
            return Err(AppError::forbidden("you are not a participant in this session"));
        }
        self.reviews.reviews_for_session(session_id)
    }

    pub fn rating_summary(&self, user_id: Uuid) -> AppResult<RatingSummary> {
        let ratings = self.reviews.ratings_for_user(user_id)?;
        Ok(RatingSummary {
            user_id,
            review_count: ratings.len(),
            average_rating: average_rating(&ratings),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::Fixture;

    fn gate(fx: &Fixture) -> ReviewGate {
        ReviewGate::new(fx.repos.sessions.clone(), fx.repos.reviews.clone())
    }

    fn input(reviewee_id: Uuid, rating: i64) -> ReviewInput {
        ReviewInput {
            reviewee_id,
            rating: rating.into(),
            review_text: None,
            helpful: true,
            would_recommend: true,
        }
    }

    #[test]
    fn full_session_then_one_review_each() {
        let fx = Fixture::new();
        let session = fx.pending_session();
        fx.lifecycle.transition(session.id, fx.mentor, SessionStatus::Active).unwrap();
        fx.lifecycle.transition(session.id, fx.learner, SessionStatus::Completed).unwrap();

        for user in [fx.mentor, fx.learner] {
            let points = fx.repos.points.points_for_user(user).unwrap().unwrap();
            assert_eq!(points.points, 10);
        }

        let gate = gate(&fx);
        gate.submit(session.id, fx.mentor, input(fx.learner, 5)).unwrap();
        gate.submit(session.id, fx.learner, input(fx.mentor, 4)).unwrap();

        let err = gate
            .submit(session.id, fx.mentor, input(fx.learner, 3))
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::DuplicateReview));
        assert!(gate.has_reviewed(session.id, fx.mentor).unwrap());
        assert_eq!(gate.list_reviews(session.id, fx.learner).unwrap().len(), 2);
    }

    #[test]
    fn reviews_wait_for_completion() {
        let fx = Fixture::new();
        for status in [SessionStatus::Pending, SessionStatus::Active, SessionStatus::Cancelled] {
            let session = fx.session_in(status);
            let err = gate(&fx)
                .submit(session.id, fx.mentor, input(fx.learner, 5))
                .unwrap_err();
            assert_eq!(err.code(), Some(ErrorCode::SessionNotCompleted), "{status}");
        }
    }

    #[test]
    fn checks_run_in_order() {
        let fx = Fixture::new();
        let gate = gate(&fx);

        let err = gate.submit(Uuid::new_v4(), fx.mentor, input(fx.learner, 9)).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::NotFound));

        let session = fx.session_in(SessionStatus::Completed);
        let err = gate
            .submit(session.id, Uuid::new_v4(), input(fx.learner, 9))
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::Forbidden));

        let err = gate.submit(session.id, fx.mentor, input(fx.mentor, 9)).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ValidationError));

        for rating in [0, 6, -1] {
            let err = gate
                .submit(session.id, fx.mentor, input(fx.learner, rating))
                .unwrap_err();
            assert_eq!(err.code(), Some(ErrorCode::InvalidRating));
        }
        assert!(!gate.has_reviewed(session.id, fx.mentor).unwrap());
    }

    #[test]
    fn rating_must_be_a_whole_number() {
        let fx = Fixture::new();
        let session = fx.session_in(SessionStatus::Completed);
        let gate = gate(&fx);

        for rating in [
            serde_json::json!(4.5),
            serde_json::json!("5"),
            serde_json::Value::Null,
            serde_json::json!(1e30),
        ] {
            let mut review = input(fx.learner, 0);
            review.rating = rating.clone();
            let err = gate.submit(session.id, fx.mentor, review).unwrap_err();
            assert_eq!(err.code(), Some(ErrorCode::InvalidRating), "{rating}");
        }

        let mut review = input(fx.learner, 0);
        review.rating = serde_json::json!(4.0);
        assert_eq!(gate.submit(session.id, fx.mentor, review).unwrap().rating, 4);
    }

    #[test]
    fn review_text_is_trimmed() {
        let fx = Fixture::new();
        let session = fx.session_in(SessionStatus::Completed);
        let gate = gate(&fx);

        let mut blank = input(fx.learner, 4);
        blank.review_text = Some("   ".into());
        assert_eq!(gate.submit(session.id, fx.mentor, blank).unwrap().review_text, None);

        let mut padded = input(fx.mentor, 4);
        padded.review_text = Some("  great teacher \n".into());
        assert_eq!(
            gate.submit(session.id, fx.learner, padded).unwrap().review_text.as_deref(),
            Some("great teacher")
        );
    }

    #[test]
    fn outsiders_cannot_list() {
        let fx = Fixture::new();
        let session = fx.session_in(SessionStatus::Completed);
        let err = gate(&fx).list_reviews(session.id, Uuid::new_v4()).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::Forbidden));
    }

    #[test]
    fn rating_summary_defaults_to_one() {
        let fx = Fixture::new();
        let gate = gate(&fx);
        let empty = gate.rating_summary(fx.mentor).unwrap();
        assert_eq!(empty.review_count, 0);
        assert_eq!(empty.average_rating, DEFAULT_AVERAGE_RATING);

        let first = fx.session_in(SessionStatus::Completed);
        let second = fx.session_in(SessionStatus::Completed);
        gate.submit(first.id, fx.learner, input(fx.mentor, 5)).unwrap();
        gate.submit(second.id, fx.learner, input(fx.mentor, 4)).unwrap();

        let summary = gate.rating_summary(fx.mentor).unwrap();
        assert_eq!(summary.review_count, 2);
        assert_eq!(summary.average_rating, 4.5);
    }
}
