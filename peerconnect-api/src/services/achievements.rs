use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use peerconnect_shared::{AppError, AppResult, ErrorCode};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Achievement, AchievementType, UserAchievement, UserStats};
use crate::repository::{AchievementRepository, StatsRepository};

/// Percentage of `target` reached by `current`, or `None` when the
/// criterion is absent or not positive.
fn ratio(current: i64, target: Option<i64>) -> Option<f64> {
    let target = target.filter(|t| *t > 0)?;
    Some((current.max(0) as f64 / target as f64 * 100.0).min(100.0))
}

/// Progress toward `achievement` in `[0, 100]`. Types without a tracked
/// counter, and definitions missing their criterion, report 0.
pub fn evaluate_progress(achievement: &Achievement, stats: &UserStats) -> f64 {
    let c = &achievement.criteria;
    let progress = match achievement.achievement_type {
        AchievementType::Session => ratio(stats.sessions_learned, c.sessions_learned)
            .or_else(|| ratio(stats.sessions_taught, c.sessions_taught)),
        AchievementType::Skill => ratio(stats.total_skills, c.total_skills)
            .or_else(|| ratio(stats.skill_categories, c.skill_categories)),
        AchievementType::Contribution => ratio(stats.resources_added, c.resources_added),
        AchievementType::Social | AchievementType::Engagement | AchievementType::Special => None,
    };
    progress.unwrap_or(0.0)
}

#[derive(Debug, Clone, Serialize)]
pub struct AchievementProgress {
    #[serde(flatten)]
    pub achievement: Achievement,
    pub progress: f64,
    pub earned: bool,
    pub earned_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AchievementBoard {
    pub stats: UserStats,
    pub achievements: Vec<AchievementProgress>,
    pub earned_count: usize,
    pub total_count: usize,
    pub achievement_points: i64,
}

pub struct AchievementService {
    achievements: Arc<dyn AchievementRepository>,
    stats: Arc<dyn StatsRepository>,
}

impl AchievementService {
    pub fn new(achievements: Arc<dyn AchievementRepository>, stats: Arc<dyn StatsRepository>) -> Self {
        Self { achievements, stats }
    }

    pub fn user_stats(&self, user_id: Uuid) -> AppResult<UserStats> {
        self.stats.user_stats(user_id)
    }

    pub fn board(&self, user_id: Uuid) -> AppResult<AchievementBoard> {
        let stats = self.stats.user_stats(user_id)?;
        let earned: HashMap<Uuid, DateTime<Utc>> = self
            .achievements
            .user_achievements(user_id)?
            .into_iter()
            .map(|ua| (ua.achievement_id, ua.earned_at))
            .collect();

        let achievements: Vec<AchievementProgress> = self
            .achievements
            .all_achievements()?
            .into_iter()
            .map(|achievement| {
                let progress = evaluate_progress(&achievement, &stats);
                let earned_at = earned.get(&achievement.id).copied();
                AchievementProgress {
                    earned: earned_at.is_some() || progress >= 100.0,
                    progress,
                    earned_at,
                    achievement,
                }
            })
            .collect();

        let earned_count = achievements.iter().filter(|a| a.earned).count();
        let achievement_points = achievements
            .iter()
            .filter(|a| a.earned)
            .map(|a| a.achievement.points_required as i64)
            .sum();

        Ok(AchievementBoard {
            stats,
            total_count: achievements.len(),
            earned_count,
            achievement_points,
            achievements,
        })
    }

    /// Records the award. Awarding twice returns the original record.
    pub fn award(&self, user_id: Uuid, achievement_id: Uuid) -> AppResult<UserAchievement> {
        if self.achievements.find_achievement(achievement_id)?.is_none() {
            return Err(AppError::new(ErrorCode::AchievementNotFound, "achievement not found"));
        }

        let record = self.achievements.award(user_id, achievement_id, Utc::now())?;
        tracing::info!(user_id = %user_id, achievement_id = %achievement_id, "achievement awarded");
        Ok(record)
    }

    /// Awards every achievement whose progress reached 100 and returns the
    /// ones that were not held before.
    pub fn sync_earned(&self, user_id: Uuid) -> AppResult<Vec<UserAchievement>> {
        let stats = self.stats.user_stats(user_id)?;
        let held: Vec<Uuid> = self
            .achievements
            .user_achievements(user_id)?
            .into_iter()
            .map(|ua| ua.achievement_id)
            .collect();

        let now = Utc::now();
        let mut awarded = Vec::new();
        for achievement in self.achievements.all_achievements()? {
            if held.contains(&achievement.id) || evaluate_progress(&achievement, &stats) < 100.0 {
                continue;
            }
            awarded.push(self.achievements.award(user_id, achievement.id, now)?);
        }

        if !awarded.is_empty() {
            tracing::info!(user_id = %user_id, count = awarded.len(), "achievements synced");
        }
        Ok(awarded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AchievementCriteria, SessionStatus};
    use crate::services::test_support::Fixture;

    fn achievement(achievement_type: AchievementType, criteria: AchievementCriteria) -> Achievement {
        Achievement {
            id: Uuid::new_v4(),
            name: "test".into(),
            description: String::new(),
            icon: "star".into(),
            achievement_type,
            points_required: 10,
            criteria,
            created_at: Utc::now(),
        }
    }

    fn service(fx: &Fixture) -> AchievementService {
        AchievementService::new(fx.repos.achievements.clone(), fx.repos.stats.clone())
    }

    #[test]
    fn partial_session_progress() {
        let mentor = achievement(
            AchievementType::Session,
            AchievementCriteria { sessions_taught: Some(10), ..Default::default() },
        );
        let stats = UserStats { sessions_taught: 4, ..Default::default() };
        assert_eq!(evaluate_progress(&mentor, &stats), 40.0);
    }

    #[test]
    fn progress_caps_at_hundred_and_is_monotonic() {
        let a = achievement(
            AchievementType::Contribution,
            AchievementCriteria { resources_added: Some(5), ..Default::default() },
        );
        let mut last = -1.0;
        for added in 0..12 {
            let stats = UserStats { resources_added: added, ..Default::default() };
            let p = evaluate_progress(&a, &stats);
            assert!(p >= last);
            assert!((0.0..=100.0).contains(&p));
            last = p;
        }
        assert_eq!(last, 100.0);
    }

    #[test]
    fn learned_criterion_takes_priority() {
        let a = achievement(
            AchievementType::Session,
            AchievementCriteria {
                sessions_learned: Some(2),
                sessions_taught: Some(1),
                ..Default::default()
            },
        );
        let stats = UserStats { sessions_learned: 1, sessions_taught: 5, ..Default::default() };
        assert_eq!(evaluate_progress(&a, &stats), 50.0);
    }

    #[test]
    fn skill_falls_back_to_categories() {
        let a = achievement(
            AchievementType::Skill,
            AchievementCriteria { total_skills: Some(0), skill_categories: Some(4), ..Default::default() },
        );
        let stats = UserStats { total_skills: 9, skill_categories: 1, ..Default::default() };
        assert_eq!(evaluate_progress(&a, &stats), 25.0);
    }

    #[test]
    fn untracked_types_and_missing_criteria_are_zero() {
        let stats = UserStats { sessions_taught: 50, resources_added: 50, ..Default::default() };
        let social = achievement(
            AchievementType::Social,
            AchievementCriteria { sessions_taught: Some(1), ..Default::default() },
        );
        assert_eq!(evaluate_progress(&social, &stats), 0.0);

        let empty = achievement(AchievementType::Session, AchievementCriteria::default());
        assert_eq!(evaluate_progress(&empty, &stats), 0.0);

        let mismatched = achievement(
            AchievementType::Contribution,
            AchievementCriteria { sessions_taught: Some(1), ..Default::default() },
        );
        assert_eq!(evaluate_progress(&mismatched, &stats), 0.0);
    }

    #[test]
    fn board_marks_progress_and_summary() {
        let fx = Fixture::new();
        let first = fx.store.add_achievement(
            "First Lesson",
            AchievementType::Session,
            10,
            AchievementCriteria { sessions_taught: Some(1), ..Default::default() },
        );
        fx.store.add_achievement(
            "Mentor",
            AchievementType::Session,
            100,
            AchievementCriteria { sessions_taught: Some(10), ..Default::default() },
        );
        fx.session_in(SessionStatus::Completed);

        let board = service(&fx).board(fx.mentor).unwrap();
        assert_eq!(board.total_count, 2);
        assert_eq!(board.earned_count, 1);
        assert_eq!(board.achievement_points, 10);
        assert_eq!(board.achievements[0].achievement.id, first);
        assert!(board.achievements[0].earned);
        assert!(board.achievements[0].earned_at.is_none());
        assert_eq!(board.achievements[1].progress, 10.0);
        assert!(!board.achievements[1].earned);
        assert_eq!(board.stats.sessions_taught, 1);
        assert_eq!(board.stats.points, 10);
    }

    #[test]
    fn award_is_idempotent() {
        let fx = Fixture::new();
        let id = fx.store.add_achievement(
            "Special",
            AchievementType::Special,
            0,
            AchievementCriteria::default(),
        );
        let svc = service(&fx);

        let first = svc.award(fx.learner, id).unwrap();
        let second = svc.award(fx.learner, id).unwrap();
        assert_eq!(first.id, second.id);

        let board = svc.board(fx.learner).unwrap();
        assert!(board.achievements[0].earned);
        assert!(board.achievements[0].earned_at.is_some());

        let err = svc.award(fx.learner, Uuid::new_v4()).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::AchievementNotFound));
    }

    #[test]
    fn sync_awards_only_completed_progress() {
        let fx = Fixture::new();
        let first_steps = fx.store.add_achievement(
            "First Steps",
            AchievementType::Session,
            10,
            AchievementCriteria { sessions_learned: Some(1), ..Default::default() },
        );
        fx.store.add_achievement(
            "Eager Learner",
            AchievementType::Session,
            50,
            AchievementCriteria { sessions_learned: Some(10), ..Default::default() },
        );
        let svc = service(&fx);

        assert!(svc.sync_earned(fx.learner).unwrap().is_empty());

        fx.session_in(SessionStatus::Completed);
        let awarded = svc.sync_earned(fx.learner).unwrap();
        assert_eq!(awarded.len(), 1);
        assert_eq!(awarded[0].achievement_id, first_steps);

        assert!(svc.sync_earned(fx.learner).unwrap().is_empty());
    }
}
