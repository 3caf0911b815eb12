use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use peerconnect_shared::{AppError, AppResult, ErrorCode};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{PeerSession, SessionStatus};
use crate::repository::SessionRepository;
use crate::services::chat::ChatService;

/// Name of the conferencing room both participants join.
pub fn room_name(session_id: Uuid) -> String {
    format!("peerconnect-session-{session_id}")
}

struct CallRoom {
    name: String,
    /// Live presences per user; one user may call from several sockets.
    participants: BTreeMap<Uuid, usize>,
    opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallRoomInfo {
    pub session_id: Uuid,
    pub room_name: String,
    pub participants: Vec<Uuid>,
    pub opened_at: DateTime<Utc>,
}

/// Open rooms keyed by session id. A room exists only while its session
/// is active.
#[derive(Default)]
pub struct CallRooms {
    rooms: DashMap<Uuid, CallRoom>,
}

impl CallRooms {
    pub fn new() -> Self {
        Self::default()
    }

    fn info(session_id: Uuid, room: &CallRoom) -> CallRoomInfo {
        CallRoomInfo {
            session_id,
            room_name: room.name.clone(),
            participants: room.participants.keys().copied().collect(),
            opened_at: room.opened_at,
        }
    }

    /// Opens the room for `session_id`, or returns the one already open.
    pub fn open(&self, session_id: Uuid) -> CallRoomInfo {
        let room = self.rooms.entry(session_id).or_insert_with(|| CallRoom {
            name: room_name(session_id),
            participants: BTreeMap::new(),
            opened_at: Utc::now(),
        });
        Self::info(session_id, &room)
    }

    pub fn close(&self, session_id: Uuid) -> Option<CallRoomInfo> {
        self.rooms
            .remove(&session_id)
            .map(|(id, room)| Self::info(id, &room))
    }

    pub fn get(&self, session_id: Uuid) -> Option<CallRoomInfo> {
        self.rooms.get(&session_id).map(|room| Self::info(session_id, &room))
    }

    /// Marks `user_id` present until the returned guard is dropped.
    pub fn join(self: &Arc<Self>, session_id: Uuid, user_id: Uuid) -> AppResult<CallPresence> {
        let mut room = self.rooms.get_mut(&session_id).ok_or_else(|| {
            AppError::new(ErrorCode::CallRoomClosed, "call room is not open")
        })?;
        *room.participants.entry(user_id).or_insert(0) += 1;

        Ok(CallPresence {
            rooms: Arc::clone(self),
            session_id,
            user_id,
        })
    }

    pub fn open_count(&self) -> usize {
        self.rooms.len()
    }
}

/// Presence of one user in a call. Dropping it leaves the room, however
/// the holder exits.
pub struct CallPresence {
    rooms: Arc<CallRooms>,
    session_id: Uuid,
    user_id: Uuid,
}

impl CallPresence {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }
}

impl Drop for CallPresence {
    fn drop(&mut self) {
        // The room may already be gone if the session ended first.
        if let Some(mut room) = self.rooms.rooms.get_mut(&self.session_id) {
            if let Some(held) = room.participants.get_mut(&self.user_id) {
                *held -= 1;
                if *held == 0 {
                    room.participants.remove(&self.user_id);
                }
            }
        }
        tracing::debug!(session_id = %self.session_id, user_id = %self.user_id, "call presence released");
    }
}

/// Ties rooms to the session lifecycle and records call callbacks.
pub struct CallService {
    sessions: Arc<dyn SessionRepository>,
    rooms: Arc<CallRooms>,
    chat: Arc<ChatService>,
}

impl CallService {
    pub fn new(sessions: Arc<dyn SessionRepository>, rooms: Arc<CallRooms>, chat: Arc<ChatService>) -> Self {
        Self { sessions, rooms, chat }
    }

    /// Opens or closes the room to match the session's new status.
    pub fn sync_with_session(&self, session: &PeerSession) {
        match session.status {
            SessionStatus::Active => {
                let info = self.rooms.open(session.id);
                tracing::info!(session_id = %session.id, room = %info.room_name, "call room opened");
            }
            SessionStatus::Completed | SessionStatus::Cancelled => {
                if self.rooms.close(session.id).is_some() {
                    tracing::info!(session_id = %session.id, "call room closed");
                }
            }
            SessionStatus::Pending => {}
        }
    }

    fn active_session(&self, session_id: Uuid, user_id: Uuid) -> AppResult<PeerSession> {
        let session = self
            .sessions
            .find_session(session_id)?
            .ok_or_else(|| AppError::not_found("session not found"))?;
        if !session.is_participant(user_id) {
            return Err(AppError::forbidden("you are not a participant in this session"));
        }
        if session.status != SessionStatus::Active {
            return Err(AppError::with_details(
                ErrorCode::CallRoomClosed,
                "calls are only available while the session is active",
                serde_json::json!({ "status": session.status.as_str() }),
            ));
        }
        Ok(session)
    }

    /// Room details for a participant of an active session.
    pub fn room(&self, session_id: Uuid, user_id: Uuid) -> AppResult<CallRoomInfo> {
        let session = self.active_session(session_id, user_id)?;
        // Rooms live in memory; reopen after a restart.
        Ok(self.rooms.open(session.id))
    }

    pub fn joined(&self, session_id: Uuid, user_id: Uuid) -> AppResult<CallPresence> {
        let session = self.active_session(session_id, user_id)?;
        self.rooms.open(session.id);
        let presence = self.rooms.join(session.id, user_id)?;
        self.chat.post_system(session.id, user_id, "joined the video call")?;
        tracing::info!(session_id = %session_id, user_id = %user_id, "call joined");
        Ok(presence)
    }

    pub fn ended(&self, presence: CallPresence) -> AppResult<()> {
        let (session_id, user_id) = (presence.session_id(), presence.user_id());
        drop(presence);

        let session = self
            .sessions
            .find_session(session_id)?
            .ok_or_else(|| AppError::not_found("session not found"))?;
        if session.status == SessionStatus::Active {
            self.chat.post_system(session_id, user_id, "left the video call")?;
        }
        tracing::info!(session_id = %session_id, user_id = %user_id, "call ended");
        Ok(())
    }
}
