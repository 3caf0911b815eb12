use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use peerconnect_shared::{ApiResponse, AppResult, AuthUser};

use crate::repository::RankMetric;
use crate::services::leaderboard::{LeaderboardEntry, RecentAchievement, UserRank};
use crate::AppState;

const MAX_LIMIT: i64 = 100;
const DEFAULT_RECENT_LIMIT: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default = "default_metric")]
    pub metric: RankMetric,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

fn default_metric() -> RankMetric {
    RankMetric::Points
}

fn clamp_limit(limit: Option<i64>, default: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, MAX_LIMIT)
}

/// GET /leaderboard?metric=points&limit=50
pub async fn top(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<LeaderboardQuery>,
) -> AppResult<Json<ApiResponse<Vec<LeaderboardEntry>>>> {
    let limit = clamp_limit(query.limit, state.config.leaderboard_limit);
    Ok(Json(ApiResponse::ok(state.leaderboard.top(query.metric, limit)?)))
}

/// GET /leaderboard/me?metric=points
pub async fn my_rank(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<LeaderboardQuery>,
) -> AppResult<Json<ApiResponse<UserRank>>> {
    Ok(Json(ApiResponse::ok(state.leaderboard.rank_of(user.id, query.metric)?)))
}

/// GET /leaderboard/achievements - latest awards across all users
pub async fn recent_achievements(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecentQuery>,
) -> AppResult<Json<ApiResponse<Vec<RecentAchievement>>>> {
    let limit = clamp_limit(query.limit, DEFAULT_RECENT_LIMIT);
    Ok(Json(ApiResponse::ok(state.leaderboard.recent_achievements(limit)?)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_are_clamped() {
        assert_eq!(clamp_limit(None, 50), 50);
        assert_eq!(clamp_limit(Some(0), 50), 1);
        assert_eq!(clamp_limit(Some(1000), 50), 100);
    }
}
