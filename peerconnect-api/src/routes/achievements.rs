use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;
use uuid::Uuid;

use peerconnect_shared::middleware::AdminUser;
use peerconnect_shared::{ApiResponse, AppResult, AuthUser};

use crate::models::{UserAchievement, UserStats};
use crate::services::achievements::AchievementBoard;
use crate::AppState;

// --- GET /me/achievements ---

pub async fn my_board(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<AchievementBoard>>> {
    Ok(Json(ApiResponse::ok(state.achievements.board(user.id)?)))
}

// --- GET /me/stats ---

pub async fn my_stats(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<UserStats>>> {
    Ok(Json(ApiResponse::ok(state.achievements.user_stats(user.id)?)))
}

// --- POST /me/achievements/sync ---

/// Awards everything the caller has fully progressed; returns only new awards.
pub async fn sync_my_achievements(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<UserAchievement>>>> {
    Ok(Json(ApiResponse::ok(state.achievements.sync_earned(user.id)?)))
}

// --- POST /users/:user_id/achievements/:achievement_id --- (admin)

pub async fn award_achievement(
    AdminUser(admin): AdminUser,
    State(state): State<Arc<AppState>>,
    Path((user_id, achievement_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ApiResponse<UserAchievement>>> {
    let record = state.achievements.award(user_id, achievement_id)?;
    tracing::info!(admin_id = %admin.id, user_id = %user_id, achievement_id = %achievement_id, "achievement granted by admin");
    Ok(Json(ApiResponse::ok(record)))
}
