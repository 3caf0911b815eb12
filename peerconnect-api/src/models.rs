use chrono::{DateTime, Utc};
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::{Jsonb, Text};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::schema::{
    achievements, chat_messages, peer_sessions, profiles, resources, session_reviews, skills,
    user_achievements, user_points, user_skills,
};

/// Stores a fieldless enum as its lowercase text form.
macro_rules! text_enum_sql {
    ($ty:ty) => {
        impl ToSql<Text, Pg> for $ty {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                <str as ToSql<Text, Pg>>::to_sql(self.as_str(), out)
            }
        }

        impl FromSql<Text, Pg> for $ty {
            fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                let raw = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
                raw.parse::<$ty>().map_err(Into::into)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// --- SessionStatus ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// The lifecycle table. Same-state moves are never permitted.
    pub fn can_transition_to(&self, target: SessionStatus) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Active)
                | (Self::Pending, Self::Cancelled)
                | (Self::Active, Self::Completed)
                | (Self::Active, Self::Cancelled)
        )
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

text_enum_sql!(SessionStatus);

// --- SkillType ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum SkillType {
    Teaching,
    Learning,
}

impl SkillType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Teaching => "teaching",
            Self::Learning => "learning",
        }
    }

    pub fn default_proficiency(&self) -> i32 {
        match self {
            Self::Teaching => 3,
            Self::Learning => 1,
        }
    }
}

impl FromStr for SkillType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "teaching" => Ok(Self::Teaching),
            "learning" => Ok(Self::Learning),
            other => Err(format!("unknown skill type: {other}")),
        }
    }
}

text_enum_sql!(SkillType);

// --- MessageType ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    System,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::System => "system",
        }
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "system" => Ok(Self::System),
            other => Err(format!("unknown message type: {other}")),
        }
    }
}

text_enum_sql!(MessageType);

// --- AchievementType ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum AchievementType {
    Session,
    Skill,
    Contribution,
    Social,
    Engagement,
    Special,
}

impl AchievementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Skill => "skill",
            Self::Contribution => "contribution",
            Self::Social => "social",
            Self::Engagement => "engagement",
            Self::Special => "special",
        }
    }
}

impl FromStr for AchievementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "session" => Ok(Self::Session),
            "skill" => Ok(Self::Skill),
            "contribution" => Ok(Self::Contribution),
            "social" => Ok(Self::Social),
            "engagement" => Ok(Self::Engagement),
            "special" => Ok(Self::Special),
            other => Err(format!("unknown achievement type: {other}")),
        }
    }
}

text_enum_sql!(AchievementType);

/// Thresholds an achievement is measured against. Which field applies
/// depends on the achievement type; unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromSqlRow)]
pub struct AchievementCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sessions_learned: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sessions_taught: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_skills: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_categories: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources_added: Option<i64>,
}

// Malformed criteria read as empty so that progress degrades to zero.
impl FromSql<Jsonb, Pg> for AchievementCriteria {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let value = <serde_json::Value as FromSql<Jsonb, Pg>>::from_sql(bytes)?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }
}

/// Which side of a session a user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionRole {
    Mentor,
    Learner,
}

impl SessionRole {
    pub fn teaches(&self) -> bool {
        matches!(self, Self::Mentor)
    }

    pub fn other(&self) -> Self {
        match self {
            Self::Mentor => Self::Learner,
            Self::Learner => Self::Mentor,
        }
    }
}

pub fn level_for_points(points: i32) -> i32 {
    1 + points.max(0) / 100
}

// --- Profile ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = profiles)]
pub struct Profile {
    pub id: Uuid,
    pub display_name: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub timezone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = profiles)]
#[diesel(treat_none_as_null = true)]
pub struct ProfileChanges {
    pub id: Uuid,
    pub display_name: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub timezone: Option<String>,
    pub updated_at: DateTime<Utc>,
}

// --- Skill ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = skills)]
pub struct Skill {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = user_skills)]
pub struct UserSkill {
    pub id: Uuid,
    pub user_id: Uuid,
    pub skill_id: Uuid,
    pub skill_type: SkillType,
    pub proficiency_level: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = user_skills)]
pub struct NewUserSkill {
    pub id: Uuid,
    pub user_id: Uuid,
    pub skill_id: Uuid,
    pub skill_type: SkillType,
    pub proficiency_level: i32,
    pub created_at: DateTime<Utc>,
}

impl NewUserSkill {
    pub fn new(user_id: Uuid, skill_id: Uuid, skill_type: SkillType) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            skill_id,
            skill_type,
            proficiency_level: skill_type.default_proficiency(),
            created_at: Utc::now(),
        }
    }
}

// --- PeerSession ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = peer_sessions)]
pub struct PeerSession {
    pub id: Uuid,
    pub mentor_id: Uuid,
    pub learner_id: Uuid,
    pub skill_id: Uuid,
    pub status: SessionStatus,
    pub duration_minutes: i32,
    pub match_score: f64,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PeerSession {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.mentor_id == user_id || self.learner_id == user_id
    }

    pub fn role_of(&self, user_id: Uuid) -> Option<SessionRole> {
        if self.mentor_id == user_id {
            Some(SessionRole::Mentor)
        } else if self.learner_id == user_id {
            Some(SessionRole::Learner)
        } else {
            None
        }
    }

    /// The other participant, if `user_id` is one of them.
    pub fn counterpart(&self, user_id: Uuid) -> Option<Uuid> {
        match self.role_of(user_id)? {
            SessionRole::Mentor => Some(self.learner_id),
            SessionRole::Learner => Some(self.mentor_id),
        }
    }

    pub fn participants(&self) -> [Uuid; 2] {
        [self.mentor_id, self.learner_id]
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = peer_sessions)]
pub struct NewPeerSession {
    pub id: Uuid,
    pub mentor_id: Uuid,
    pub learner_id: Uuid,
    pub skill_id: Uuid,
    pub status: SessionStatus,
    pub duration_minutes: i32,
    pub match_score: f64,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A compare-and-swap status update: applied only while the row is still
/// in `from`.
#[derive(Debug, Clone, Copy)]
pub struct StatusChange {
    pub session_id: Uuid,
    pub from: SessionStatus,
    pub to: SessionStatus,
    pub at: DateTime<Utc>,
}

impl StatusChange {
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        (self.to == SessionStatus::Active).then_some(self.at)
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.to.is_terminal().then_some(self.at)
    }
}

/// Credit applied to both participants when a session completes.
#[derive(Debug, Clone, Copy)]
pub struct CompletionAward {
    pub mentor_id: Uuid,
    pub learner_id: Uuid,
    pub points: i32,
}

// --- ChatMessage ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = chat_messages)]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub sender_id: Uuid,
    pub message: String,
    pub message_type: MessageType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = chat_messages)]
pub struct NewChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub sender_id: Uuid,
    pub message: String,
    pub message_type: MessageType,
    pub created_at: DateTime<Utc>,
}

// --- SessionReview ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = session_reviews)]
pub struct SessionReview {
    pub id: Uuid,
    pub session_id: Uuid,
    pub reviewer_id: Uuid,
    pub reviewee_id: Uuid,
    pub rating: i16,
    pub review_text: Option<String>,
    pub helpful_rating: bool,
    pub would_recommend: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = session_reviews)]
pub struct NewSessionReview {
    pub id: Uuid,
    pub session_id: Uuid,
    pub reviewer_id: Uuid,
    pub reviewee_id: Uuid,
    pub rating: i16,
    pub review_text: Option<String>,
    pub helpful_rating: bool,
    pub would_recommend: bool,
    pub created_at: DateTime<Utc>,
}

// --- UserPoints ---

#[derive(Debug, Queryable, Insertable, AsChangeset, Serialize, Clone, PartialEq)]
#[diesel(table_name = user_points)]
#[diesel(primary_key(user_id))]
pub struct UserPoints {
    pub user_id: Uuid,
    pub points: i32,
    pub level: i32,
    pub total_sessions_taught: i32,
    pub total_sessions_learned: i32,
    pub updated_at: DateTime<Utc>,
}

impl UserPoints {
    /// The row a user implicitly has before their first award.
    pub fn empty(user_id: Uuid) -> Self {
        Self {
            user_id,
            points: 0,
            level: level_for_points(0),
            total_sessions_taught: 0,
            total_sessions_learned: 0,
            updated_at: Utc::now(),
        }
    }

    /// Adds one completed session in `role` plus `points`.
    pub fn credit(&mut self, role: SessionRole, points: i32, at: DateTime<Utc>) {
        self.points += points;
        self.level = level_for_points(self.points);
        if role.teaches() {
            self.total_sessions_taught += 1;
        } else {
            self.total_sessions_learned += 1;
        }
        self.updated_at = at;
    }
}

// --- Achievement ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = achievements)]
pub struct Achievement {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub achievement_type: AchievementType,
    pub points_required: i32,
    pub criteria: AchievementCriteria,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = user_achievements)]
pub struct UserAchievement {
    pub id: Uuid,
    pub user_id: Uuid,
    pub achievement_id: Uuid,
    pub earned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = user_achievements)]
pub struct NewUserAchievement {
    pub id: Uuid,
    pub user_id: Uuid,
    pub achievement_id: Uuid,
    pub earned_at: DateTime<Utc>,
}

/// Counters an achievement's progress is measured against.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserStats {
    pub points: i32,
    pub level: i32,
    pub sessions_learned: i64,
    pub sessions_taught: i64,
    pub total_skills: i64,
    pub skill_categories: i64,
    pub resources_added: i64,
}

// --- Resource ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = resources)]
pub struct Resource {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub resource_type: String,
    pub skill_id: Option<Uuid>,
    pub created_by: Uuid,
    pub ai_generated: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = resources)]
pub struct NewResource {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub resource_type: String,
    pub skill_id: Option<Uuid>,
    pub created_by: Uuid,
    pub ai_generated: bool,
    pub created_at: DateTime<Utc>,
}

/// Filters for a resource search; every field narrows the result.
#[derive(Debug, Clone, Default)]
pub struct ResourceFilter {
    pub text: Option<String>,
    pub skill_ids: Option<Vec<Uuid>>,
    pub resource_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table() {
        use SessionStatus::*;
        let all = [Pending, Active, Completed, Cancelled];
        let allowed = [
            (Pending, Active),
            (Pending, Cancelled),
            (Active, Completed),
            (Active, Cancelled),
        ];

        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn terminal_states() {
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Cancelled.is_terminal());
        assert!(!SessionStatus::Active.is_terminal());
    }

    #[test]
    fn enums_parse_their_text_form() {
        for status in ["pending", "active", "completed", "cancelled"] {
            assert_eq!(status.parse::<SessionStatus>().unwrap().as_str(), status);
        }
        assert_eq!("teaching".parse::<SkillType>(), Ok(SkillType::Teaching));
        assert!("mentoring".parse::<SkillType>().is_err());
        assert_eq!("system".parse::<MessageType>(), Ok(MessageType::System));
        assert_eq!("special".parse::<AchievementType>(), Ok(AchievementType::Special));
    }

    #[test]
    fn criteria_ignore_unknown_keys() {
        let criteria: AchievementCriteria =
            serde_json::from_value(serde_json::json!({ "sessions_taught": 10, "streak": 3 })).unwrap();
        assert_eq!(criteria.sessions_taught, Some(10));
        assert_eq!(criteria.sessions_learned, None);
    }

    #[test]
    fn levels_step_every_hundred_points() {
        assert_eq!(level_for_points(0), 1);
        assert_eq!(level_for_points(99), 1);
        assert_eq!(level_for_points(100), 2);
        assert_eq!(level_for_points(250), 3);
    }

    #[test]
    fn credit_tracks_role() {
        let user = Uuid::new_v4();
        let mut points = UserPoints::empty(user);
        points.credit(SessionRole::Mentor, 10, Utc::now());
        points.credit(SessionRole::Learner, 10, Utc::now());
        assert_eq!(points.points, 20);
        assert_eq!(points.total_sessions_taught, 1);
        assert_eq!(points.total_sessions_learned, 1);
    }

    #[test]
    fn counterpart_and_role() {
        let now = Utc::now();
        let session = PeerSession {
            id: Uuid::new_v4(),
            mentor_id: Uuid::new_v4(),
            learner_id: Uuid::new_v4(),
            skill_id: Uuid::new_v4(),
            status: SessionStatus::Pending,
            duration_minutes: 60,
            match_score: 0.0,
            scheduled_at: None,
            started_at: None,
            ended_at: None,
            created_at: now,
            updated_at: now,
        };

        assert_eq!(session.counterpart(session.mentor_id), Some(session.learner_id));
        assert_eq!(session.role_of(session.learner_id), Some(SessionRole::Learner));
        assert_eq!(session.counterpart(Uuid::new_v4()), None);
    }

    #[test]
    fn status_change_stamps() {
        let at = Utc::now();
        let change = StatusChange {
            session_id: Uuid::new_v4(),
            from: SessionStatus::Pending,
            to: SessionStatus::Active,
            at,
        };
        assert_eq!(change.started_at(), Some(at));
        assert_eq!(change.ended_at(), None);
    }
}
