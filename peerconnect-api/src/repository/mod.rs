//! Typed storage interfaces, one per aggregate.
//!
//! Services receive these as `Arc<dyn …>` so that the same logic runs
//! against Postgres in production and [`memory::MemoryStore`] in tests.
//! Both implementations honor the same contracts: status updates are
//! compare-and-swap, completion and its point award commit together, and
//! the (session, reviewer) and (user, achievement) pairs are unique.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use peerconnect_shared::AppResult;
use uuid::Uuid;

use crate::models::{
    Achievement, ChatMessage, CompletionAward, NewChatMessage, NewPeerSession, NewResource,
    NewSessionReview, NewUserSkill, PeerSession, Profile, ProfileChanges, Resource,
    ResourceFilter, SessionReview, SessionRole, SessionStatus, Skill, SkillType, StatusChange,
    UserAchievement, UserPoints, UserSkill, UserStats,
};

#[cfg(test)]
pub mod memory;
pub mod pg;

pub use pg::PgStore;

pub trait ProfileRepository: Send + Sync {
    fn find_profile(&self, id: Uuid) -> AppResult<Option<Profile>>;
    fn upsert_profile(&self, changes: &ProfileChanges) -> AppResult<Profile>;
    fn display_names(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, String>>;
}

pub trait SkillRepository: Send + Sync {
    /// Skills ordered by category then name, optionally matching `search`
    /// case-insensitively against either.
    fn list_skills(&self, search: Option<&str>) -> AppResult<Vec<Skill>>;
    fn find_skills(&self, ids: &[Uuid]) -> AppResult<Vec<Skill>>;
    fn user_skills(&self, user_id: Uuid) -> AppResult<Vec<UserSkill>>;
    /// Deletes every row for the user and inserts `skills`, atomically.
    fn replace_user_skills(&self, user_id: Uuid, skills: &[NewUserSkill]) -> AppResult<Vec<UserSkill>>;
    /// Upserts the single row for (user, skill).
    fn set_user_skill(&self, skill: &NewUserSkill) -> AppResult<UserSkill>;
    fn remove_user_skill(&self, user_id: Uuid, skill_id: Uuid) -> AppResult<bool>;
    fn users_with_skill(&self, skill_id: Uuid, skill_type: SkillType, exclude: Uuid) -> AppResult<Vec<Uuid>>;
}

pub trait SessionRepository: Send + Sync {
    fn find_session(&self, id: Uuid) -> AppResult<Option<PeerSession>>;
    fn insert_session(&self, session: &NewPeerSession) -> AppResult<PeerSession>;
    /// Sessions the user takes part in, newest first.
    fn sessions_for_user(&self, user_id: Uuid, status: Option<SessionStatus>) -> AppResult<Vec<PeerSession>>;
    /// Applies `change` only while the session is still in `change.from`.
    /// `None` means the compare failed.
    fn update_status(&self, change: &StatusChange) -> AppResult<Option<PeerSession>>;
    /// `active -> completed` plus the point award in one transaction.
    /// `None` means the session was no longer active and nothing changed.
    fn complete_session(&self, change: &StatusChange, award: &CompletionAward) -> AppResult<Option<PeerSession>>;
    /// Number of sessions, in any status, where the user holds `role`.
    fn count_sessions(&self, user_id: Uuid, role: SessionRole) -> AppResult<i64>;
}

pub trait ReviewRepository: Send + Sync {
    fn find_review(&self, session_id: Uuid, reviewer_id: Uuid) -> AppResult<Option<SessionReview>>;
    /// Fails with `DuplicateReview` when (session, reviewer) already exists.
    fn insert_review(&self, review: &NewSessionReview) -> AppResult<SessionReview>;
    fn reviews_for_session(&self, session_id: Uuid) -> AppResult<Vec<SessionReview>>;
    fn ratings_for_user(&self, reviewee_id: Uuid) -> AppResult<Vec<i16>>;
}

/// Leaderboard metric a [`PointsRepository`] can count against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMetric {
    Points,
    Level,
    SessionsTaught,
    SessionsLearned,
}

impl RankMetric {
    pub fn value(&self, row: &UserPoints) -> i32 {
        match self {
            Self::Points => row.points,
            Self::Level => row.level,
            Self::SessionsTaught => row.total_sessions_taught,
            Self::SessionsLearned => row.total_sessions_learned,
        }
    }
}

pub trait PointsRepository: Send + Sync {
    fn points_for_user(&self, user_id: Uuid) -> AppResult<Option<UserPoints>>;
    /// Top `limit` rows by `metric` descending, ties by user id ascending.
    fn top_points(&self, metric: RankMetric, limit: i64) -> AppResult<Vec<UserPoints>>;
    /// Rows strictly greater than `value` on `metric`.
    fn count_above(&self, metric: RankMetric, value: i32) -> AppResult<i64>;
}

pub trait AchievementRepository: Send + Sync {
    /// Every definition ordered by `points_required`.
    fn all_achievements(&self) -> AppResult<Vec<Achievement>>;
    fn find_achievement(&self, id: Uuid) -> AppResult<Option<Achievement>>;
    fn user_achievements(&self, user_id: Uuid) -> AppResult<Vec<UserAchievement>>;
    /// Inserts the award or returns the existing one.
    fn award(&self, user_id: Uuid, achievement_id: Uuid, at: DateTime<Utc>) -> AppResult<UserAchievement>;
    /// Latest awards across all users, newest first.
    fn recent_awards(&self, limit: i64) -> AppResult<Vec<UserAchievement>>;
}

pub trait StatsRepository: Send + Sync {
    fn user_stats(&self, user_id: Uuid) -> AppResult<UserStats>;
}

pub trait ChatRepository: Send + Sync {
    fn insert_message(&self, message: &NewChatMessage) -> AppResult<ChatMessage>;
    /// A page of the session log in ascending order, with the total count.
    fn messages_for_session(&self, session_id: Uuid, limit: i64, offset: i64) -> AppResult<(Vec<ChatMessage>, i64)>;
}

pub trait ResourceRepository: Send + Sync {
    fn insert_resource(&self, resource: &NewResource) -> AppResult<Resource>;
    /// Newest first.
    fn search_resources(&self, filter: &ResourceFilter, limit: i64) -> AppResult<Vec<Resource>>;
}

/// Every repository trait behind one handle, for wiring.
#[derive(Clone)]
pub struct Repositories {
    pub profiles: Arc<dyn ProfileRepository>,
    pub skills: Arc<dyn SkillRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub reviews: Arc<dyn ReviewRepository>,
    pub points: Arc<dyn PointsRepository>,
    pub achievements: Arc<dyn AchievementRepository>,
    pub stats: Arc<dyn StatsRepository>,
    pub chat: Arc<dyn ChatRepository>,
    pub resources: Arc<dyn ResourceRepository>,
}

impl Repositories {
    /// Uses one store for every interface.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: ProfileRepository
            + SkillRepository
            + SessionRepository
            + ReviewRepository
            + PointsRepository
            + AchievementRepository
            + StatsRepository
            + ChatRepository
            + ResourceRepository
            + 'static,
    {
        Self {
            profiles: store.clone(),
            skills: store.clone(),
            sessions: store.clone(),
            reviews: store.clone(),
            points: store.clone(),
            achievements: store.clone(),
            stats: store.clone(),
            chat: store.clone(),
            resources: store,
        }
    }
}
