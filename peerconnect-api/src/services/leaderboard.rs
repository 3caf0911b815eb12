use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use peerconnect_shared::AppResult;
use serde::Serialize;
use uuid::Uuid;

use crate::models::UserPoints;
use crate::repository::{AchievementRepository, PointsRepository, ProfileRepository, RankMetric};

const UNKNOWN_DISPLAY_NAME: &str = "Anonymous";

/// Orders rows by `metric` descending, ties by user id ascending.
pub fn sort_by_metric(rows: &mut [UserPoints], metric: RankMetric) {
    rows.sort_by(|a, b| {
        metric
            .value(b)
            .cmp(&metric.value(a))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
}

/// Competition ranks for rows already in [`sort_by_metric`] order: equal
/// values share a rank and the next distinct value skips ahead.
pub fn competition_ranks(sorted: &[UserPoints], metric: RankMetric) -> Vec<i64> {
    let mut ranks = Vec::with_capacity(sorted.len());
    for (i, row) in sorted.iter().enumerate() {
        let rank = match i {
            0 => 1,
            _ if metric.value(&sorted[i - 1]) == metric.value(row) => ranks[i - 1],
            _ => i as i64 + 1,
        };
        ranks.push(rank);
    }
    ranks
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub user_id: Uuid,
    pub display_name: String,
    pub points: i32,
    pub level: i32,
    pub total_sessions_taught: i32,
    pub total_sessions_learned: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserRank {
    pub user_id: Uuid,
    pub metric: RankMetric,
    pub value: i32,
    pub rank: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentAchievement {
    pub user_id: Uuid,
    pub display_name: String,
    pub achievement_id: Uuid,
    pub achievement_name: String,
    pub icon: String,
    pub earned_at: DateTime<Utc>,
}

pub struct Leaderboard {
    points: Arc<dyn PointsRepository>,
    profiles: Arc<dyn ProfileRepository>,
    achievements: Arc<dyn AchievementRepository>,
}

impl Leaderboard {
    pub fn new(
        points: Arc<dyn PointsRepository>,
        profiles: Arc<dyn ProfileRepository>,
        achievements: Arc<dyn AchievementRepository>,
    ) -> Self {
        Self { points, profiles, achievements }
    }

    fn names(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, String>> {
        self.profiles.display_names(ids)
    }

    pub fn top(&self, metric: RankMetric, limit: i64) -> AppResult<Vec<LeaderboardEntry>> {
        let mut rows = self.points.top_points(metric, limit)?;
        sort_by_metric(&mut rows, metric);
        let ranks = competition_ranks(&rows, metric);

        let ids: Vec<Uuid> = rows.iter().map(|r| r.user_id).collect();
        let names = self.names(&ids)?;

        Ok(rows
            .into_iter()
            .zip(ranks)
            .map(|(row, rank)| LeaderboardEntry {
                rank,
                display_name: names
                    .get(&row.user_id)
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN_DISPLAY_NAME.to_string()),
                user_id: row.user_id,
                points: row.points,
                level: row.level,
                total_sessions_taught: row.total_sessions_taught,
                total_sessions_learned: row.total_sessions_learned,
            })
            .collect())
    }

    /// `1 + number of users strictly ahead`. Users without points rank as
    /// if they had zero.
    pub fn rank_of(&self, user_id: Uuid, metric: RankMetric) -> AppResult<UserRank> {
        let row = self
            .points
            .points_for_user(user_id)?
            .unwrap_or_else(|| UserPoints::empty(user_id));
        let value = metric.value(&row);
        let ahead = self.points.count_above(metric, value)?;

        Ok(UserRank {
            user_id,
            metric,
            value,
            rank: ahead + 1,
        })
    }

    pub fn recent_achievements(&self, limit: i64) -> AppResult<Vec<RecentAchievement>> {
        let awards = self.achievements.recent_awards(limit)?;
        if awards.is_empty() {
            return Ok(vec![]);
        }

        let definitions: HashMap<Uuid, _> = self
            .achievements
            .all_achievements()?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();
        let user_ids: Vec<Uuid> = awards.iter().map(|a| a.user_id).collect();
        let names = self.names(&user_ids)?;

        Ok(awards
            .into_iter()
            .filter_map(|award| {
                let definition = definitions.get(&award.achievement_id)?;
                Some(RecentAchievement {
                    user_id: award.user_id,
                    display_name: names
                        .get(&award.user_id)
                        .cloned()
                        .unwrap_or_else(|| UNKNOWN_DISPLAY_NAME.to_string()),
                    achievement_id: award.achievement_id,
                    achievement_name: definition.name.clone(),
                    icon: definition.icon.clone(),
                    earned_at: award.earned_at,
                })
            })
            .collect())
    }
}
