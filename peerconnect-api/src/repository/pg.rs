use std::collections::HashMap;

use chrono::{DateTime, Utc};
use diesel::dsl::{count, count_star};
use diesel::expression_methods::AggregateExpressionMethods;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use peerconnect_shared::clients::db::{DbConn, DbPool};
use peerconnect_shared::{AppError, AppResult, ErrorCode};
use uuid::Uuid;

use super::{
    AchievementRepository, ChatRepository, PointsRepository, ProfileRepository, RankMetric,
    ResourceRepository, ReviewRepository, SessionRepository, SkillRepository, StatsRepository,
};
use crate::models::{
    Achievement, ChatMessage, CompletionAward, NewChatMessage, NewPeerSession, NewResource,
    NewSessionReview, NewUserAchievement, NewUserSkill, PeerSession, Profile, ProfileChanges,
    Resource, ResourceFilter, SessionReview, SessionRole, SessionStatus, Skill, SkillType,
    StatusChange, UserAchievement, UserPoints, UserSkill, UserStats,
};
use crate::schema::{
    achievements, chat_messages, peer_sessions, profiles, resources, session_reviews, skills,
    user_achievements, user_points, user_skills,
};

/// Diesel-backed implementation of every repository trait.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    fn conn(&self) -> AppResult<DbConn> {
        self.pool.get().map_err(|e| AppError::Internal(e.into()))
    }
}

#[derive(AsChangeset)]
#[diesel(table_name = peer_sessions)]
struct StatusUpdate {
    status: SessionStatus,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl From<&StatusChange> for StatusUpdate {
    fn from(change: &StatusChange) -> Self {
        Self {
            status: change.to,
            started_at: change.started_at(),
            ended_at: change.ended_at(),
            updated_at: change.at,
        }
    }
}

fn cas_status(conn: &mut PgConnection, change: &StatusChange) -> QueryResult<Option<PeerSession>> {
    diesel::update(
        peer_sessions::table
            .filter(peer_sessions::id.eq(change.session_id))
            .filter(peer_sessions::status.eq(change.from)),
    )
    .set(StatusUpdate::from(change))
    .get_result::<PeerSession>(conn)
    .optional()
}

/// Locks (creating if needed) the user's points row and adds one session.
fn credit_points(
    conn: &mut PgConnection,
    user_id: Uuid,
    role: SessionRole,
    points: i32,
    at: DateTime<Utc>,
) -> QueryResult<UserPoints> {
    diesel::insert_into(user_points::table)
        .values(&UserPoints::empty(user_id))
        .on_conflict(user_points::user_id)
        .do_nothing()
        .execute(conn)?;

    let mut row = user_points::table
        .find(user_id)
        .for_update()
        .first::<UserPoints>(conn)?;
    row.credit(role, points, at);

    diesel::update(user_points::table.find(user_id))
        .set(&row)
        .get_result::<UserPoints>(conn)
}

impl ProfileRepository for PgStore {
    fn find_profile(&self, id: Uuid) -> AppResult<Option<Profile>> {
        let mut conn = self.conn()?;
        Ok(profiles::table.find(id).first::<Profile>(&mut conn).optional()?)
    }

    fn upsert_profile(&self, changes: &ProfileChanges) -> AppResult<Profile> {
        let mut conn = self.conn()?;
        let profile = diesel::insert_into(profiles::table)
            .values(changes)
            .on_conflict(profiles::id)
            .do_update()
            .set(changes)
            .get_result::<Profile>(&mut conn)?;
        Ok(profile)
    }

    fn display_names(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut conn = self.conn()?;
        let rows = profiles::table
            .filter(profiles::id.eq_any(ids))
            .select((profiles::id, profiles::display_name))
            .load::<(Uuid, String)>(&mut conn)?;
        Ok(rows.into_iter().collect())
    }
}

impl SkillRepository for PgStore {
    fn list_skills(&self, search: Option<&str>) -> AppResult<Vec<Skill>> {
        let mut conn = self.conn()?;
        let mut query = skills::table.into_boxed();
        if let Some(term) = search {
            let pattern = format!("%{term}%");
            query = query.filter(
                skills::name
                    .ilike(pattern.clone())
                    .or(skills::category.ilike(pattern)),
            );
        }
        Ok(query
            .order((skills::category.asc(), skills::name.asc()))
            .load::<Skill>(&mut conn)?)
    }

    fn find_skills(&self, ids: &[Uuid]) -> AppResult<Vec<Skill>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let mut conn = self.conn()?;
        Ok(skills::table
            .filter(skills::id.eq_any(ids))
            .load::<Skill>(&mut conn)?)
    }

    fn user_skills(&self, user_id: Uuid) -> AppResult<Vec<UserSkill>> {
        let mut conn = self.conn()?;
        Ok(user_skills::table
            .filter(user_skills::user_id.eq(user_id))
            .order(user_skills::created_at.asc())
            .load::<UserSkill>(&mut conn)?)
    }

    fn replace_user_skills(&self, user_id: Uuid, rows: &[NewUserSkill]) -> AppResult<Vec<UserSkill>> {
        let mut conn = self.conn()?;
        let saved = conn.transaction::<_, DieselError, _>(|conn| {
            diesel::delete(user_skills::table.filter(user_skills::user_id.eq(user_id)))
                .execute(conn)?;
            if rows.is_empty() {
                return Ok(vec![]);
            }
            diesel::insert_into(user_skills::table)
                .values(rows)
                .get_results::<UserSkill>(conn)
        })?;
        Ok(saved)
    }

    fn set_user_skill(&self, row: &NewUserSkill) -> AppResult<UserSkill> {
        let mut conn = self.conn()?;
        let saved = diesel::insert_into(user_skills::table)
            .values(row)
            .on_conflict((user_skills::user_id, user_skills::skill_id))
            .do_update()
            .set((
                user_skills::skill_type.eq(row.skill_type),
                user_skills::proficiency_level.eq(row.proficiency_level),
            ))
            .get_result::<UserSkill>(&mut conn)?;
        Ok(saved)
    }

    fn remove_user_skill(&self, user_id: Uuid, skill_id: Uuid) -> AppResult<bool> {
        let mut conn = self.conn()?;
        let deleted = diesel::delete(
            user_skills::table
                .filter(user_skills::user_id.eq(user_id))
                .filter(user_skills::skill_id.eq(skill_id)),
        )
        .execute(&mut conn)?;
        Ok(deleted > 0)
    }

    fn users_with_skill(&self, skill_id: Uuid, skill_type: SkillType, exclude: Uuid) -> AppResult<Vec<Uuid>> {
        let mut conn = self.conn()?;
        Ok(user_skills::table
            .filter(user_skills::skill_id.eq(skill_id))
            .filter(user_skills::skill_type.eq(skill_type))
            .filter(user_skills::user_id.ne(exclude))
            .select(user_skills::user_id)
            .load::<Uuid>(&mut conn)?)
    }
}

impl SessionRepository for PgStore {
    fn find_session(&self, id: Uuid) -> AppResult<Option<PeerSession>> {
        let mut conn = self.conn()?;
        Ok(peer_sessions::table
            .find(id)
            .first::<PeerSession>(&mut conn)
            .optional()?)
    }

    fn insert_session(&self, session: &NewPeerSession) -> AppResult<PeerSession> {
        let mut conn = self.conn()?;
        Ok(diesel::insert_into(peer_sessions::table)
            .values(session)
            .get_result::<PeerSession>(&mut conn)?)
    }

    fn sessions_for_user(&self, user_id: Uuid, status: Option<SessionStatus>) -> AppResult<Vec<PeerSession>> {
        let mut conn = self.conn()?;
        let mut query = peer_sessions::table
            .filter(
                peer_sessions::mentor_id
                    .eq(user_id)
                    .or(peer_sessions::learner_id.eq(user_id)),
            )
            .into_boxed();
        if let Some(status) = status {
            query = query.filter(peer_sessions::status.eq(status));
        }
        Ok(query
            .order(peer_sessions::created_at.desc())
            .load::<PeerSession>(&mut conn)?)
    }

    fn update_status(&self, change: &StatusChange) -> AppResult<Option<PeerSession>> {
        let mut conn = self.conn()?;
        Ok(cas_status(&mut conn, change)?)
    }

    fn complete_session(&self, change: &StatusChange, award: &CompletionAward) -> AppResult<Option<PeerSession>> {
        let mut conn = self.conn()?;
        let completed = conn.transaction::<_, DieselError, _>(|conn| {
            let Some(session) = cas_status(conn, change)? else {
                return Ok(None);
            };
            credit_points(conn, award.mentor_id, SessionRole::Mentor, award.points, change.at)?;
            credit_points(conn, award.learner_id, SessionRole::Learner, award.points, change.at)?;
            Ok(Some(session))
        })?;
        Ok(completed)
    }

    fn count_sessions(&self, user_id: Uuid, role: SessionRole) -> AppResult<i64> {
        let mut conn = self.conn()?;
        let count = match role {
            SessionRole::Mentor => peer_sessions::table
                .filter(peer_sessions::mentor_id.eq(user_id))
                .select(count_star())
                .first::<i64>(&mut conn)?,
            SessionRole::Learner => peer_sessions::table
                .filter(peer_sessions::learner_id.eq(user_id))
                .select(count_star())
                .first::<i64>(&mut conn)?,
        };
        Ok(count)
    }
}

impl ReviewRepository for PgStore {
    fn find_review(&self, session_id: Uuid, reviewer_id: Uuid) -> AppResult<Option<SessionReview>> {
        let mut conn = self.conn()?;
        Ok(session_reviews::table
            .filter(session_reviews::session_id.eq(session_id))
            .filter(session_reviews::reviewer_id.eq(reviewer_id))
            .first::<SessionReview>(&mut conn)
            .optional()?)
    }

    fn insert_review(&self, review: &NewSessionReview) -> AppResult<SessionReview> {
        let mut conn = self.conn()?;
        diesel::insert_into(session_reviews::table)
            .values(review)
            .get_result::<SessionReview>(&mut conn)
            .map_err(|e| match e {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => AppError::new(
                    ErrorCode::DuplicateReview,
                    "you have already reviewed this session",
                ),
                other => AppError::Database(other),
            })
    }

    fn reviews_for_session(&self, session_id: Uuid) -> AppResult<Vec<SessionReview>> {
        let mut conn = self.conn()?;
        Ok(session_reviews::table
            .filter(session_reviews::session_id.eq(session_id))
            .order(session_reviews::created_at.asc())
            .load::<SessionReview>(&mut conn)?)
    }

    fn ratings_for_user(&self, reviewee_id: Uuid) -> AppResult<Vec<i16>> {
        let mut conn = self.conn()?;
        Ok(session_reviews::table
            .filter(session_reviews::reviewee_id.eq(reviewee_id))
            .select(session_reviews::rating)
            .load::<i16>(&mut conn)?)
    }
}

impl PointsRepository for PgStore {
    fn points_for_user(&self, user_id: Uuid) -> AppResult<Option<UserPoints>> {
        let mut conn = self.conn()?;
        Ok(user_points::table
            .find(user_id)
            .first::<UserPoints>(&mut conn)
            .optional()?)
    }

    fn top_points(&self, metric: RankMetric, limit: i64) -> AppResult<Vec<UserPoints>> {
        let mut conn = self.conn()?;
        let query = user_points::table.into_boxed();
        let query = match metric {
            RankMetric::Points => query.order(user_points::points.desc()),
            RankMetric::Level => query.order(user_points::level.desc()),
            RankMetric::SessionsTaught => query.order(user_points::total_sessions_taught.desc()),
            RankMetric::SessionsLearned => query.order(user_points::total_sessions_learned.desc()),
        };
        Ok(query
            .then_order_by(user_points::user_id.asc())
            .limit(limit)
            .load::<UserPoints>(&mut conn)?)
    }

    fn count_above(&self, metric: RankMetric, value: i32) -> AppResult<i64> {
        let mut conn = self.conn()?;
        let query = user_points::table.into_boxed();
        let query = match metric {
            RankMetric::Points => query.filter(user_points::points.gt(value)),
            RankMetric::Level => query.filter(user_points::level.gt(value)),
            RankMetric::SessionsTaught => query.filter(user_points::total_sessions_taught.gt(value)),
            RankMetric::SessionsLearned => query.filter(user_points::total_sessions_learned.gt(value)),
        };
        Ok(query.select(count_star()).first::<i64>(&mut conn)?)
    }
}

impl AchievementRepository for PgStore {
    fn all_achievements(&self) -> AppResult<Vec<Achievement>> {
        let mut conn = self.conn()?;
        Ok(achievements::table
            .order((achievements::points_required.asc(), achievements::name.asc()))
            .load::<Achievement>(&mut conn)?)
    }

    fn find_achievement(&self, id: Uuid) -> AppResult<Option<Achievement>> {
        let mut conn = self.conn()?;
        Ok(achievements::table
            .find(id)
            .first::<Achievement>(&mut conn)
            .optional()?)
    }

    fn user_achievements(&self, user_id: Uuid) -> AppResult<Vec<UserAchievement>> {
        let mut conn = self.conn()?;
        Ok(user_achievements::table
            .filter(user_achievements::user_id.eq(user_id))
            .order(user_achievements::earned_at.desc())
            .load::<UserAchievement>(&mut conn)?)
    }

    fn award(&self, user_id: Uuid, achievement_id: Uuid, at: DateTime<Utc>) -> AppResult<UserAchievement> {
        let mut conn = self.conn()?;
        let record = NewUserAchievement {
            id: Uuid::now_v7(),
            user_id,
            achievement_id,
            earned_at: at,
        };

        diesel::insert_into(user_achievements::table)
            .values(&record)
            .on_conflict((user_achievements::user_id, user_achievements::achievement_id))
            .do_nothing()
            .execute(&mut conn)?;

        Ok(user_achievements::table
            .filter(user_achievements::user_id.eq(user_id))
            .filter(user_achievements::achievement_id.eq(achievement_id))
            .first::<UserAchievement>(&mut conn)?)
    }

    fn recent_awards(&self, limit: i64) -> AppResult<Vec<UserAchievement>> {
        let mut conn = self.conn()?;
        Ok(user_achievements::table
            .order(user_achievements::earned_at.desc())
            .limit(limit)
            .load::<UserAchievement>(&mut conn)?)
    }
}

impl StatsRepository for PgStore {
    fn user_stats(&self, user_id: Uuid) -> AppResult<UserStats> {
        let mut conn = self.conn()?;

        let points = user_points::table
            .find(user_id)
            .first::<UserPoints>(&mut conn)
            .optional()?
            .unwrap_or_else(|| UserPoints::empty(user_id));

        let sessions_learned = peer_sessions::table
            .filter(peer_sessions::learner_id.eq(user_id))
            .filter(peer_sessions::status.eq(SessionStatus::Completed))
            .select(count_star())
            .first::<i64>(&mut conn)?;

        let sessions_taught = peer_sessions::table
            .filter(peer_sessions::mentor_id.eq(user_id))
            .filter(peer_sessions::status.eq(SessionStatus::Completed))
            .select(count_star())
            .first::<i64>(&mut conn)?;

        let total_skills = user_skills::table
            .filter(user_skills::user_id.eq(user_id))
            .select(count_star())
            .first::<i64>(&mut conn)?;

        let skill_categories = user_skills::table
            .inner_join(skills::table)
            .filter(user_skills::user_id.eq(user_id))
            .select(count(skills::category).aggregate_distinct())
            .first::<i64>(&mut conn)?;

        let resources_added = resources::table
            .filter(resources::created_by.eq(user_id))
            .select(count_star())
            .first::<i64>(&mut conn)?;

        Ok(UserStats {
            points: points.points,
            level: points.level,
            sessions_learned,
            sessions_taught,
            total_skills,
            skill_categories,
            resources_added,
        })
    }
}

impl ChatRepository for PgStore {
    fn insert_message(&self, message: &NewChatMessage) -> AppResult<ChatMessage> {
        let mut conn = self.conn()?;
        Ok(diesel::insert_into(chat_messages::table)
            .values(message)
            .get_result::<ChatMessage>(&mut conn)?)
    }

    fn messages_for_session(&self, session_id: Uuid, limit: i64, offset: i64) -> AppResult<(Vec<ChatMessage>, i64)> {
        let mut conn = self.conn()?;

        let total = chat_messages::table
            .filter(chat_messages::session_id.eq(session_id))
            .select(count_star())
            .first::<i64>(&mut conn)?;

        let items = chat_messages::table
            .filter(chat_messages::session_id.eq(session_id))
            .order((chat_messages::created_at.asc(), chat_messages::id.asc()))
            .limit(limit)
            .offset(offset)
            .load::<ChatMessage>(&mut conn)?;

        Ok((items, total))
    }
}

impl ResourceRepository for PgStore {
    fn insert_resource(&self, resource: &NewResource) -> AppResult<Resource> {
        let mut conn = self.conn()?;
        Ok(diesel::insert_into(resources::table)
            .values(resource)
            .get_result::<Resource>(&mut conn)?)
    }

    fn search_resources(&self, filter: &ResourceFilter, limit: i64) -> AppResult<Vec<Resource>> {
        let mut conn = self.conn()?;
        let mut query = resources::table.into_boxed();

        if let Some(text) = &filter.text {
            let pattern = format!("%{text}%");
            query = query.filter(
                resources::title
                    .ilike(pattern.clone())
                    .or(resources::description.ilike(pattern)),
            );
        }
        if let Some(skill_ids) = &filter.skill_ids {
            let ids: Vec<Option<Uuid>> = skill_ids.iter().copied().map(Some).collect();
            query = query.filter(resources::skill_id.eq_any(ids));
        }
        if let Some(resource_type) = &filter.resource_type {
            query = query.filter(resources::resource_type.eq(resource_type.clone()));
        }

        Ok(query
            .order(resources::created_at.desc())
            .limit(limit)
            .load::<Resource>(&mut conn)?)
    }
}
