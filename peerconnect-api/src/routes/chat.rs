use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use peerconnect_shared::{ApiResponse, AppResult, AuthUser, Paginated, PaginationParams};

use crate::events::publisher;
use crate::models::{ChatMessage, MessageType};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

/// GET /sessions/:id/messages - chat history, oldest first
pub async fn list_messages(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<ChatMessage>>>> {
    let page = state.chat.list_messages(session_id, user.id, &params)?;
    Ok(Json(ApiResponse::ok(page)))
}

/// POST /sessions/:id/messages - persist, then push to the session room
pub async fn send_message(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> AppResult<Json<ApiResponse<ChatMessage>>> {
    let message = state
        .chat
        .post_message(session_id, user.id, &req.message, MessageType::Text)?;

    publisher::publish_message_sent(&state.events, &message).await;

    Ok(Json(ApiResponse::ok(message)))
}
