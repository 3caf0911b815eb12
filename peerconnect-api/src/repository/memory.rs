use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use peerconnect_shared::{AppError, AppResult, ErrorCode};
use uuid::Uuid;

use super::{
    AchievementRepository, ChatRepository, PointsRepository, ProfileRepository, RankMetric,
    ResourceRepository, ReviewRepository, SessionRepository, SkillRepository, StatsRepository,
};
use crate::models::{
    Achievement, AchievementCriteria, AchievementType, ChatMessage, CompletionAward,
    NewChatMessage, NewPeerSession, NewResource, NewSessionReview, NewUserSkill, PeerSession,
    Profile, ProfileChanges, Resource, ResourceFilter, SessionReview, SessionRole, SessionStatus,
    Skill, SkillType, StatusChange, UserAchievement, UserPoints, UserSkill, UserStats,
};

#[derive(Default)]
struct Tables {
    profiles: HashMap<Uuid, Profile>,
    skills: Vec<Skill>,
    user_skills: Vec<UserSkill>,
    sessions: HashMap<Uuid, PeerSession>,
    messages: Vec<ChatMessage>,
    reviews: Vec<SessionReview>,
    points: HashMap<Uuid, UserPoints>,
    achievements: Vec<Achievement>,
    user_achievements: Vec<UserAchievement>,
    resources: Vec<Resource>,
}

/// In-process store with the same atomicity and uniqueness guarantees as
/// the Postgres one. Every operation runs under a single lock.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| AppError::internal("memory store lock poisoned"))
    }

    pub fn add_profile(&self, display_name: &str) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let profile = Profile {
            id,
            display_name: display_name.to_string(),
            bio: None,
            location: None,
            timezone: None,
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().unwrap().profiles.insert(id, profile);
        id
    }

    pub fn add_skill(&self, name: &str, category: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.tables.lock().unwrap().skills.push(Skill {
            id,
            name: name.to_string(),
            category: category.to_string(),
            description: None,
            created_at: Utc::now(),
        });
        id
    }

    pub fn add_achievement(
        &self,
        name: &str,
        achievement_type: AchievementType,
        points_required: i32,
        criteria: AchievementCriteria,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.tables.lock().unwrap().achievements.push(Achievement {
            id,
            name: name.to_string(),
            description: format!("{name} description"),
            icon: "star".to_string(),
            achievement_type,
            points_required,
            criteria,
            created_at: Utc::now(),
        });
        id
    }

    pub fn set_points(&self, points: UserPoints) {
        self.tables.lock().unwrap().points.insert(points.user_id, points);
    }
}

impl ProfileRepository for MemoryStore {
    fn find_profile(&self, id: Uuid) -> AppResult<Option<Profile>> {
        Ok(self.lock()?.profiles.get(&id).cloned())
    }

    fn upsert_profile(&self, changes: &ProfileChanges) -> AppResult<Profile> {
        let mut tables = self.lock()?;
        let profile = tables.profiles.entry(changes.id).or_insert_with(|| Profile {
            id: changes.id,
            display_name: String::new(),
            bio: None,
            location: None,
            timezone: None,
            created_at: changes.updated_at,
            updated_at: changes.updated_at,
        });
        profile.display_name = changes.display_name.clone();
        profile.bio = changes.bio.clone();
        profile.location = changes.location.clone();
        profile.timezone = changes.timezone.clone();
        profile.updated_at = changes.updated_at;
        Ok(profile.clone())
    }

    fn display_names(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, String>> {
        let tables = self.lock()?;
        Ok(ids
            .iter()
            .filter_map(|id| tables.profiles.get(id).map(|p| (*id, p.display_name.clone())))
            .collect())
    }
}

impl SkillRepository for MemoryStore {
    fn list_skills(&self, search: Option<&str>) -> AppResult<Vec<Skill>> {
        let tables = self.lock()?;
        let mut skills: Vec<Skill> = tables
            .skills
            .iter()
            .filter(|s| match search {
                Some(term) => contains_ci(&s.name, term) || contains_ci(&s.category, term),
                None => true,
            })
            .cloned()
            .collect();
        skills.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.name.cmp(&b.name)));
        Ok(skills)
    }

    fn find_skills(&self, ids: &[Uuid]) -> AppResult<Vec<Skill>> {
        let tables = self.lock()?;
        Ok(tables.skills.iter().filter(|s| ids.contains(&s.id)).cloned().collect())
    }

    fn user_skills(&self, user_id: Uuid) -> AppResult<Vec<UserSkill>> {
        let tables = self.lock()?;
        Ok(tables
            .user_skills
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    fn replace_user_skills(&self, user_id: Uuid, rows: &[NewUserSkill]) -> AppResult<Vec<UserSkill>> {
        let mut tables = self.lock()?;
        let mut seen = HashSet::new();
        if rows.iter().any(|r| !seen.insert(r.skill_id)) {
            return Err(AppError::Validation("duplicate (user, skill) row".into()));
        }

        tables.user_skills.retain(|s| s.user_id != user_id);
        let saved: Vec<UserSkill> = rows
            .iter()
            .map(|r| UserSkill {
                id: r.id,
                user_id,
                skill_id: r.skill_id,
                skill_type: r.skill_type,
                proficiency_level: r.proficiency_level,
                created_at: r.created_at,
            })
            .collect();
        tables.user_skills.extend(saved.iter().cloned());
        Ok(saved)
    }

    fn set_user_skill(&self, row: &NewUserSkill) -> AppResult<UserSkill> {
        let mut tables = self.lock()?;
        if let Some(existing) = tables
            .user_skills
            .iter_mut()
            .find(|s| s.user_id == row.user_id && s.skill_id == row.skill_id)
        {
            existing.skill_type = row.skill_type;
            existing.proficiency_level = row.proficiency_level;
            return Ok(existing.clone());
        }

        let saved = UserSkill {
            id: row.id,
            user_id: row.user_id,
            skill_id: row.skill_id,
            skill_type: row.skill_type,
            proficiency_level: row.proficiency_level,
            created_at: row.created_at,
        };
        tables.user_skills.push(saved.clone());
        Ok(saved)
    }

    fn remove_user_skill(&self, user_id: Uuid, skill_id: Uuid) -> AppResult<bool> {
        let mut tables = self.lock()?;
        let before = tables.user_skills.len();
        tables
            .user_skills
            .retain(|s| !(s.user_id == user_id && s.skill_id == skill_id));
        Ok(tables.user_skills.len() < before)
    }

    fn users_with_skill(&self, skill_id: Uuid, skill_type: SkillType, exclude: Uuid) -> AppResult<Vec<Uuid>> {
        let tables = self.lock()?;
        Ok(tables
            .user_skills
            .iter()
            .filter(|s| s.skill_id == skill_id && s.skill_type == skill_type && s.user_id != exclude)
            .map(|s| s.user_id)
            .collect())
    }
}

fn apply_change(session: &mut PeerSession, change: &StatusChange) {
    session.status = change.to;
    if let Some(at) = change.started_at() {
        session.started_at = Some(at);
    }
    if let Some(at) = change.ended_at() {
        session.ended_at = Some(at);
    }
    session.updated_at = change.at;
}

impl SessionRepository for MemoryStore {
    fn find_session(&self, id: Uuid) -> AppResult<Option<PeerSession>> {
        Ok(self.lock()?.sessions.get(&id).cloned())
    }

    fn insert_session(&self, new: &NewPeerSession) -> AppResult<PeerSession> {
        let session = PeerSession {
            id: new.id,
            mentor_id: new.mentor_id,
            learner_id: new.learner_id,
            skill_id: new.skill_id,
            status: new.status,
            duration_minutes: new.duration_minutes,
            match_score: new.match_score,
            scheduled_at: new.scheduled_at,
            started_at: None,
            ended_at: None,
            created_at: new.created_at,
            updated_at: new.updated_at,
        };
        self.lock()?.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    fn sessions_for_user(&self, user_id: Uuid, status: Option<SessionStatus>) -> AppResult<Vec<PeerSession>> {
        let tables = self.lock()?;
        let mut sessions: Vec<PeerSession> = tables
            .sessions
            .values()
            .filter(|s| s.is_participant(user_id))
            .filter(|s| status.map_or(true, |st| s.status == st))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(sessions)
    }

    fn update_status(&self, change: &StatusChange) -> AppResult<Option<PeerSession>> {
        let mut tables = self.lock()?;
        match tables.sessions.get_mut(&change.session_id) {
            Some(session) if session.status == change.from => {
                apply_change(session, change);
                Ok(Some(session.clone()))
            }
            _ => Ok(None),
        }
    }

    fn complete_session(&self, change: &StatusChange, award: &CompletionAward) -> AppResult<Option<PeerSession>> {
        let mut tables = self.lock()?;
        let updated = match tables.sessions.get_mut(&change.session_id) {
            Some(session) if session.status == change.from => {
                apply_change(session, change);
                session.clone()
            }
            _ => return Ok(None),
        };

        for (user_id, role) in [
            (award.mentor_id, SessionRole::Mentor),
            (award.learner_id, SessionRole::Learner),
        ] {
            tables
                .points
                .entry(user_id)
                .or_insert_with(|| UserPoints::empty(user_id))
                .credit(role, award.points, change.at);
        }
        Ok(Some(updated))
    }

    fn count_sessions(&self, user_id: Uuid, role: SessionRole) -> AppResult<i64> {
        let tables = self.lock()?;
        Ok(tables
            .sessions
            .values()
            .filter(|s| s.role_of(user_id) == Some(role))
            .count() as i64)
    }
}

impl ReviewRepository for MemoryStore {
    fn find_review(&self, session_id: Uuid, reviewer_id: Uuid) -> AppResult<Option<SessionReview>> {
        let tables = self.lock()?;
        Ok(tables
            .reviews
            .iter()
            .find(|r| r.session_id == session_id && r.reviewer_id == reviewer_id)
            .cloned())
    }

    fn insert_review(&self, new: &NewSessionReview) -> AppResult<SessionReview> {
        let mut tables = self.lock()?;
        if tables
            .reviews
            .iter()
            .any(|r| r.session_id == new.session_id && r.reviewer_id == new.reviewer_id)
        {
            return Err(AppError::new(
                ErrorCode::DuplicateReview,
                "you have already reviewed this session",
            ));
        }

        let review = SessionReview {
            id: new.id,
            session_id: new.session_id,
            reviewer_id: new.reviewer_id,
            reviewee_id: new.reviewee_id,
            rating: new.rating,
            review_text: new.review_text.clone(),
            helpful_rating: new.helpful_rating,
            would_recommend: new.would_recommend,
            created_at: new.created_at,
        };
        tables.reviews.push(review.clone());
        Ok(review)
    }

    fn reviews_for_session(&self, session_id: Uuid) -> AppResult<Vec<SessionReview>> {
        let tables = self.lock()?;
        Ok(tables
            .reviews
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect())
    }

    fn ratings_for_user(&self, reviewee_id: Uuid) -> AppResult<Vec<i16>> {
        let tables = self.lock()?;
        Ok(tables
            .reviews
            .iter()
            .filter(|r| r.reviewee_id == reviewee_id)
            .map(|r| r.rating)
            .collect())
    }
}

impl PointsRepository for MemoryStore {
    fn points_for_user(&self, user_id: Uuid) -> AppResult<Option<UserPoints>> {
        Ok(self.lock()?.points.get(&user_id).cloned())
    }

    fn top_points(&self, metric: RankMetric, limit: i64) -> AppResult<Vec<UserPoints>> {
        let tables = self.lock()?;
        let mut rows: Vec<UserPoints> = tables.points.values().cloned().collect();
        rows.sort_by(|a, b| {
            metric
                .value(b)
                .cmp(&metric.value(a))
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    fn count_above(&self, metric: RankMetric, value: i32) -> AppResult<i64> {
        let tables = self.lock()?;
        Ok(tables
            .points
            .values()
            .filter(|row| metric.value(row) > value)
            .count() as i64)
    }
}

impl AchievementRepository for MemoryStore {
    fn all_achievements(&self) -> AppResult<Vec<Achievement>> {
        let tables = self.lock()?;
        let mut all = tables.achievements.clone();
        all.sort_by(|a, b| {
            a.points_required
                .cmp(&b.points_required)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(all)
    }

    fn find_achievement(&self, id: Uuid) -> AppResult<Option<Achievement>> {
        let tables = self.lock()?;
        Ok(tables.achievements.iter().find(|a| a.id == id).cloned())
    }

    fn user_achievements(&self, user_id: Uuid) -> AppResult<Vec<UserAchievement>> {
        let tables = self.lock()?;
        let mut earned: Vec<UserAchievement> = tables
            .user_achievements
            .iter()
            .filter(|ua| ua.user_id == user_id)
            .cloned()
            .collect();
        earned.sort_by(|a, b| b.earned_at.cmp(&a.earned_at));
        Ok(earned)
    }

    fn award(&self, user_id: Uuid, achievement_id: Uuid, at: DateTime<Utc>) -> AppResult<UserAchievement> {
        let mut tables = self.lock()?;
        if let Some(existing) = tables
            .user_achievements
            .iter()
            .find(|ua| ua.user_id == user_id && ua.achievement_id == achievement_id)
        {
            return Ok(existing.clone());
        }

        let record = UserAchievement {
            id: Uuid::now_v7(),
            user_id,
            achievement_id,
            earned_at: at,
        };
        tables.user_achievements.push(record.clone());
        Ok(record)
    }

    fn recent_awards(&self, limit: i64) -> AppResult<Vec<UserAchievement>> {
        let tables = self.lock()?;
        let mut all = tables.user_achievements.clone();
        all.sort_by(|a, b| b.earned_at.cmp(&a.earned_at));
        all.truncate(limit.max(0) as usize);
        Ok(all)
    }
}

impl StatsRepository for MemoryStore {
    fn user_stats(&self, user_id: Uuid) -> AppResult<UserStats> {
        let tables = self.lock()?;
        let points = tables
            .points
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| UserPoints::empty(user_id));

        let completed = |role: SessionRole| {
            tables
                .sessions
                .values()
                .filter(|s| s.status == SessionStatus::Completed && s.role_of(user_id) == Some(role))
                .count() as i64
        };

        let held: Vec<&UserSkill> = tables.user_skills.iter().filter(|s| s.user_id == user_id).collect();
        let categories: HashSet<&str> = held
            .iter()
            .filter_map(|us| tables.skills.iter().find(|s| s.id == us.skill_id))
            .map(|s| s.category.as_str())
            .collect();

        Ok(UserStats {
            points: points.points,
            level: points.level,
            sessions_learned: completed(SessionRole::Learner),
            sessions_taught: completed(SessionRole::Mentor),
            total_skills: held.len() as i64,
            skill_categories: categories.len() as i64,
            resources_added: tables
                .resources
                .iter()
                .filter(|r| r.created_by == user_id)
                .count() as i64,
        })
    }
}

impl ChatRepository for MemoryStore {
    fn insert_message(&self, new: &NewChatMessage) -> AppResult<ChatMessage> {
        let message = ChatMessage {
            id: new.id,
            session_id: new.session_id,
            sender_id: new.sender_id,
            message: new.message.clone(),
            message_type: new.message_type,
            created_at: new.created_at,
        };
        self.lock()?.messages.push(message.clone());
        Ok(message)
    }

    fn messages_for_session(&self, session_id: Uuid, limit: i64, offset: i64) -> AppResult<(Vec<ChatMessage>, i64)> {
        let tables = self.lock()?;
        let mut log: Vec<ChatMessage> = tables
            .messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect();
        // Stable: equal timestamps keep insertion order.
        log.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let total = log.len() as i64;
        let page = log
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }
}

impl ResourceRepository for MemoryStore {
    fn insert_resource(&self, new: &NewResource) -> AppResult<Resource> {
        let resource = Resource {
            id: new.id,
            title: new.title.clone(),
            description: new.description.clone(),
            url: new.url.clone(),
            resource_type: new.resource_type.clone(),
            skill_id: new.skill_id,
            created_by: new.created_by,
            ai_generated: new.ai_generated,
            created_at: new.created_at,
        };
        self.lock()?.resources.push(resource.clone());
        Ok(resource)
    }

    fn search_resources(&self, filter: &ResourceFilter, limit: i64) -> AppResult<Vec<Resource>> {
        let tables = self.lock()?;
        let mut found: Vec<Resource> = tables
            .resources
            .iter()
            .filter(|r| match &filter.text {
                Some(text) => {
                    contains_ci(&r.title, text)
                        || r.description.as_deref().is_some_and(|d| contains_ci(d, text))
                }
                None => true,
            })
            .filter(|r| match &filter.skill_ids {
                Some(ids) => r.skill_id.is_some_and(|id| ids.contains(&id)),
                None => true,
            })
            .filter(|r| match &filter.resource_type {
                Some(t) => &r.resource_type == t,
                None => true,
            })
            .cloned()
            .collect();
        found.reverse();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found.truncate(limit.max(0) as usize);
        Ok(found)
    }
}
