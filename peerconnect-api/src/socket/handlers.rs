use std::sync::Arc;

use serde::Serialize;
use socketioxide::extract::{Data, SocketRef};
use socketioxide::SocketIo;
use uuid::Uuid;

use peerconnect_shared::middleware::decode_token;
use peerconnect_shared::AppError;

use crate::events::publisher;
use crate::models::{ChatMessage, MessageType};
use crate::services::chat::{chat_room, MessageFanout};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

impl From<&AppError> for ErrorPayload {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.code().map_or("E0001", |c| c.code()).to_string(),
            message: err.to_string(),
        }
    }
}

/// Pushes persisted chat messages to the session's socket room.
pub struct SocketFanout {
    io: SocketIo,
}

impl SocketFanout {
    pub fn new(io: SocketIo) -> Self {
        Self { io }
    }
}

impl MessageFanout for SocketFanout {
    fn deliver(&self, message: &ChatMessage) {
        if let Err(e) = self.io.to(chat_room(message.session_id)).emit("new_message", message) {
            tracing::warn!(error = %e, session_id = %message.session_id, "chat fan-out failed");
        }
    }
}

fn get_user_id(socket: &SocketRef) -> Option<Uuid> {
    socket.extensions.get::<Uuid>()
}

fn session_id_of(payload: &serde_json::Value) -> Option<Uuid> {
    payload
        .get("session_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
}

fn emit_error(socket: &SocketRef, err: &AppError) {
    let _ = socket.emit("error", &ErrorPayload::from(err));
}

pub async fn on_connect_with_state(socket: SocketRef, state: Arc<AppState>) {
    let user_id = match authenticate_socket(&socket, &state) {
        Ok(id) => id,
        Err(msg) => {
            tracing::warn!(error = %msg, "socket auth failed");
            let _ = socket.emit(
                "error",
                &ErrorPayload {
                    code: "AUTH_FAILED".into(),
                    message: msg,
                },
            );
            socket.disconnect().ok();
            return;
        }
    };

    socket.extensions.insert(user_id);
    tracing::info!(user_id = %user_id, sid = %socket.id, "socket connected");
    let _ = socket.emit("connected", &serde_json::json!({ "user_id": user_id }));

    socket.on("join_session", {
        let state = state.clone();
        move |socket: SocketRef, Data::<serde_json::Value>(payload)| {
            let state = state.clone();
            async move { on_join_session(socket, payload, &state).await; }
        }
    });

    socket.on("leave_session", |socket: SocketRef, Data::<serde_json::Value>(payload)| async move {
        if let Some(session_id) = session_id_of(&payload) {
            socket.leave(chat_room(session_id)).ok();
        }
    });

    socket.on("send_message", {
        let state = state.clone();
        move |socket: SocketRef, Data::<serde_json::Value>(payload)| {
            let state = state.clone();
            async move { on_send_message(socket, payload, &state).await; }
        }
    });

    socket.on("call_joined", {
        let state = state.clone();
        move |socket: SocketRef, Data::<serde_json::Value>(payload)| {
            let state = state.clone();
            async move { on_call_joined(socket, payload, &state).await; }
        }
    });

    socket.on("call_ended", {
        let state = state.clone();
        move |socket: SocketRef, Data::<serde_json::Value>(payload)| {
            let state = state.clone();
            async move { on_call_ended(socket, payload, &state).await; }
        }
    });

    socket.on_disconnect({
        let state = state.clone();
        move |socket: SocketRef| {
            let state = state.clone();
            async move {
                on_disconnect_with_state(socket, state).await;
            }
        }
    });
}

async fn on_join_session(socket: SocketRef, payload: serde_json::Value, state: &Arc<AppState>) {
    let Some(user_id) = get_user_id(&socket) else { return };
    let Some(session_id) = session_id_of(&payload) else {
        tracing::warn!("join_session missing session_id");
        return;
    };

    match state.lifecycle.get_session(session_id, user_id) {
        Ok(session) => {
            socket.join(chat_room(session.id)).ok();
            let _ = socket.emit("joined_session", &serde_json::json!({ "session_id": session.id }));
            tracing::debug!(user_id = %user_id, session_id = %session_id, "joined session room");
        }
        Err(e) => emit_error(&socket, &e),
    }
}

async fn on_send_message(socket: SocketRef, payload: serde_json::Value, state: &Arc<AppState>) {
    let Some(user_id) = get_user_id(&socket) else { return };
    let Some(session_id) = session_id_of(&payload) else {
        tracing::warn!("send_message missing session_id");
        return;
    };
    let body = payload.get("message").and_then(|v| v.as_str()).unwrap_or_default();

    match state.chat.post_message(session_id, user_id, body, MessageType::Text) {
        Ok(message) => publisher::publish_message_sent(&state.events, &message).await,
        Err(e) => emit_error(&socket, &e),
    }
}

async fn on_call_joined(socket: SocketRef, payload: serde_json::Value, state: &Arc<AppState>) {
    let Some(user_id) = get_user_id(&socket) else { return };
    let Some(session_id) = session_id_of(&payload) else {
        tracing::warn!("call_joined missing session_id");
        return;
    };

    let key = (socket.id.to_string(), session_id);
    if state.call_presence.contains_key(&key) {
        return;
    }

    match state.calls.joined(session_id, user_id) {
        Ok(presence) => {
            state.call_presence.insert(key, presence);
            if let Ok(room) = state.calls.room(session_id, user_id) {
                let _ = socket.emit("call_room", &room);
            }
        }
        Err(e) => emit_error(&socket, &e),
    }
}

async fn on_call_ended(socket: SocketRef, payload: serde_json::Value, state: &Arc<AppState>) {
    let Some(session_id) = session_id_of(&payload) else {
        tracing::warn!("call_ended missing session_id");
        return;
    };

    if let Some((_, presence)) = state.call_presence.remove(&(socket.id.to_string(), session_id)) {
        if let Err(e) = state.calls.ended(presence) {
            emit_error(&socket, &e);
        }
    }
}

async fn on_disconnect_with_state(socket: SocketRef, state: Arc<AppState>) {
    let Some(user_id) = get_user_id(&socket) else { return };
    tracing::info!(user_id = %user_id, sid = %socket.id, "socket disconnected");

    let sid = socket.id.to_string();
    let held: Vec<(String, Uuid)> = state
        .call_presence
        .iter()
        .filter(|entry| entry.key().0 == sid)
        .map(|entry| entry.key().clone())
        .collect();

    for key in held {
        if let Some((_, presence)) = state.call_presence.remove(&key) {
            if let Err(e) = state.calls.ended(presence) {
                tracing::warn!(error = %e, session_id = %key.1, "failed to record call end on disconnect");
            }
        }
    }
}

fn authenticate_socket(socket: &SocketRef, state: &Arc<AppState>) -> Result<Uuid, String> {
    let connect_info = socket.req_parts();

    // ?token=xxx
    let query = connect_info.uri.query().unwrap_or_default();
    let token = token_from_query(query).ok_or_else(|| "missing token query parameter".to_string())?;

    let claims = decode_token(&token, &state.config.jwt_secret).map_err(|e| e.to_string())?;
    if claims.is_expired() {
        return Err("token has expired".into());
    }
    Ok(claims.sub)
}

fn token_from_query(query: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let mut split = pair.splitn(2, '=');
        let key = split.next()?;
        let value = split.next()?;
        (key == "token" && !value.is_empty()).then(|| value.to_string())
    })
}
