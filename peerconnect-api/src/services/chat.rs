use std::sync::Arc;

use chrono::Utc;
use peerconnect_shared::{AppError, AppResult, ErrorCode, Paginated, PaginationParams};
use uuid::Uuid;

use crate::models::{ChatMessage, MessageType, NewChatMessage, PeerSession};
use crate::repository::{ChatRepository, SessionRepository};

pub const CHAT_MESSAGES_TOTAL: &str = "chat_messages_total";
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Push room carrying a session's chat.
pub fn chat_room(session_id: Uuid) -> String {
    format!("session:{session_id}")
}

/// Pushes persisted messages to connected participants.
pub trait MessageFanout: Send + Sync {
    fn deliver(&self, message: &ChatMessage);
}

pub struct ChatService {
    sessions: Arc<dyn SessionRepository>,
    chat: Arc<dyn ChatRepository>,
    fanout: Arc<dyn MessageFanout>,
}

impl ChatService {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        chat: Arc<dyn ChatRepository>,
        fanout: Arc<dyn MessageFanout>,
    ) -> Self {
        Self { sessions, chat, fanout }
    }

    fn participant_session(&self, session_id: Uuid, user_id: Uuid) -> AppResult<PeerSession> {
        let session = self
            .sessions
            .find_session(session_id)?
            .ok_or_else(|| AppError::not_found("session not found"))?;
        if !session.is_participant(user_id) {
            return Err(AppError::forbidden("you are not a participant in this session"));
        }
        Ok(session)
    }

    /// Persists a message, then fans it out. Delivery follows insert order.
    pub fn post_message(
        &self,
        session_id: Uuid,
        sender_id: Uuid,
        body: &str,
        message_type: MessageType,
    ) -> AppResult<ChatMessage> {
        self.participant_session(session_id, sender_id)?;

        let body = body.trim();
        if body.is_empty() {
            return Err(AppError::new(ErrorCode::EmptyMessage, "message cannot be empty"));
        }
        if body.chars().count() > MAX_MESSAGE_CHARS {
            return Err(AppError::Validation(format!(
                "message exceeds {MAX_MESSAGE_CHARS} characters"
            )));
        }

        let message = self.chat.insert_message(&NewChatMessage {
            id: Uuid::now_v7(),
            session_id,
            sender_id,
            message: body.to_string(),
            message_type,
            created_at: Utc::now(),
        })?;

        self.fanout.deliver(&message);
        metrics::counter!(CHAT_MESSAGES_TOTAL, "type" => message_type.as_str()).increment(1);
        tracing::debug!(session_id = %session_id, message_id = %message.id, "chat message stored");
        Ok(message)
    }

    pub fn post_system(&self, session_id: Uuid, actor: Uuid, body: &str) -> AppResult<ChatMessage> {
        self.post_message(session_id, actor, body, MessageType::System)
    }

    pub fn list_messages(
        &self,
        session_id: Uuid,
        requester: Uuid,
        params: &PaginationParams,
    ) -> AppResult<Paginated<ChatMessage>> {
        self.participant_session(session_id, requester)?;
        let (items, total) =
            self.chat
                .messages_for_session(session_id, params.limit() as i64, params.offset() as i64)?;
        Ok(Paginated::new(items, total.max(0) as u64, params))
    }
}
