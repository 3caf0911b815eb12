pub mod achievements;
pub mod chat;
pub mod health;
pub mod leaderboard;
pub mod profiles;
pub mod resources;
pub mod reviews;
pub mod sessions;
pub mod skills;

use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use peerconnect_shared::middleware::metrics_middleware;

use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        // Profiles
        .route("/me/profile", get(profiles::get_my_profile).put(profiles::upsert_my_profile))
        .route("/profiles/:id", get(profiles::get_profile))
        // Skills and peers
        .route("/skills", get(skills::list_skills))
        .route("/skills/:id/mentors", get(skills::find_mentors))
        .route("/skills/:id/learners", get(skills::find_learners))
        .route("/me/skills", get(skills::my_skills).put(skills::replace_skills))
        .route("/me/skills/:id", put(skills::set_skill).delete(skills::remove_skill))
        // Sessions
        .route("/sessions", get(sessions::list_sessions).post(sessions::create_session))
        .route("/sessions/:id", get(sessions::get_session))
        .route("/sessions/:id/transition", post(sessions::transition_session))
        .route("/sessions/:id/call", get(sessions::get_call_room))
        .route("/sessions/:id/messages", get(chat::list_messages).post(chat::send_message))
        .route("/sessions/:id/reviews", get(reviews::list_reviews).post(reviews::submit_review))
        .route("/sessions/:id/reviews/status", get(reviews::review_status))
        // Users
        .route("/users/:id/rating", get(reviews::rating_summary))
        .route("/users/:id/achievements/:achievement_id", post(achievements::award_achievement))
        // Gamification
        .route("/me/achievements", get(achievements::my_board))
        .route("/me/achievements/sync", post(achievements::sync_my_achievements))
        .route("/me/stats", get(achievements::my_stats))
        .route("/leaderboard", get(leaderboard::top))
        .route("/leaderboard/me", get(leaderboard::my_rank))
        .route("/leaderboard/achievements", get(leaderboard::recent_achievements))
        // Resources
        .route("/resources", get(resources::search_resources).post(resources::add_resource))
        .route("/resources/recommended", get(resources::recommended))
        .route("/resources/trending", get(resources::trending))
        .route("/resources/videos", get(resources::search_videos))
        .layer(axum::middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
