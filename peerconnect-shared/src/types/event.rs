use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope wrapping every domain event published on the bus.
///
/// Routing key format: `peerconnect.{entity}.{action}`
/// Example: `peerconnect.session.status_changed`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T: Serialize> {
    pub id: Uuid,
    pub source: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub data: T,
}

impl<T: Serialize> Event<T> {
    pub fn new(source: impl Into<String>, event_type: impl Into<String>, data: T) -> Self {
        Self {
            id: Uuid::now_v7(),
            source: source.into(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            correlation_id: None,
            user_id: None,
            data,
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_correlation(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}

pub mod routing_keys {
    pub const SESSION_CREATED: &str = "peerconnect.session.created";
    pub const SESSION_STATUS_CHANGED: &str = "peerconnect.session.status_changed";
    pub const ACHIEVEMENTS_RECOMPUTE: &str = "peerconnect.achievements.recompute";
    pub const REVIEW_SUBMITTED: &str = "peerconnect.review.submitted";
    pub const CHAT_MESSAGE_SENT: &str = "peerconnect.chat.message_sent";
}

pub mod payloads {
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct SessionCreated {
        pub session_id: Uuid,
        pub mentor_id: Uuid,
        pub learner_id: Uuid,
        pub skill_id: Uuid,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct SessionStatusChanged {
        pub session_id: Uuid,
        pub mentor_id: Uuid,
        pub learner_id: Uuid,
        pub from_status: String,
        pub to_status: String,
        pub changed_by: Uuid,
        pub points_awarded: i32,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct AchievementsRecompute {
        pub user_id: Uuid,
        pub session_id: Uuid,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ReviewSubmitted {
        pub review_id: Uuid,
        pub session_id: Uuid,
        pub reviewer_id: Uuid,
        pub reviewee_id: Uuid,
        pub rating: i16,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ChatMessageSent {
        pub message_id: Uuid,
        pub session_id: Uuid,
        pub sender_id: Uuid,
        pub message_type: String,
        pub content_preview: String,
    }
}
