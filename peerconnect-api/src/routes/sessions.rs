use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use peerconnect_shared::{ApiResponse, AppResult, AuthUser};

use crate::events::publisher;
use crate::models::{PeerSession, SessionRole, SessionStatus};
use crate::services::calls::CallRoomInfo;
use crate::services::lifecycle::NewSessionParams;
use crate::AppState;

// --- Request DTOs ---

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSessionRequest {
    pub peer_id: Uuid,
    pub skill_id: Uuid,
    /// The requester's side of the session.
    pub role: SessionRole,
    pub scheduled_at: Option<DateTime<Utc>>,
    #[validate(range(min = 15, max = 480, message = "duration must be between 15 and 480 minutes"))]
    pub duration_minutes: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    pub status: Option<SessionStatus>,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub status: SessionStatus,
}

// --- Response DTOs ---

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub session: PeerSession,
    pub from_status: SessionStatus,
    pub points_awarded: i32,
}

// --- Handlers ---

/// POST /sessions - request a session with a peer
pub async fn create_session(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSessionRequest>,
) -> AppResult<Json<ApiResponse<PeerSession>>> {
    req.validate()?;

    let match_score = state.peers.match_score(req.peer_id, req.role.other())?;
    let session = state.lifecycle.create_session(
        user.id,
        NewSessionParams {
            peer_id: req.peer_id,
            skill_id: req.skill_id,
            requester_role: req.role,
            scheduled_at: req.scheduled_at,
            duration_minutes: req.duration_minutes,
        },
        match_score,
    )?;

    publisher::publish_session_created(&state.events, &session, user.id).await;

    Ok(Json(ApiResponse::ok(session)))
}

/// GET /sessions - the caller's sessions, newest first
pub async fn list_sessions(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListSessionsQuery>,
) -> AppResult<Json<ApiResponse<Vec<PeerSession>>>> {
    let sessions = state.lifecycle.list_sessions(user.id, query.status)?;
    Ok(Json(ApiResponse::ok(sessions)))
}

/// GET /sessions/:id
pub async fn get_session(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<PeerSession>>> {
    Ok(Json(ApiResponse::ok(state.lifecycle.get_session(session_id, user.id)?)))
}

/// POST /sessions/:id/transition - move the session to a new status
pub async fn transition_session(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<TransitionRequest>,
) -> AppResult<Json<ApiResponse<TransitionResponse>>> {
    let outcome = state.lifecycle.transition(session_id, user.id, req.status)?;

    state.calls.sync_with_session(&outcome.session);
    if outcome.session.status.is_terminal() {
        state.release_call_presence(outcome.session.id);
    }
    publisher::publish_status_changed(&state.events, &outcome, user.id).await;

    Ok(Json(ApiResponse::ok(TransitionResponse {
        from_status: outcome.from,
        points_awarded: outcome.points_awarded,
        session: outcome.session,
    })))
}

/// GET /sessions/:id/call - conferencing room of an active session
pub async fn get_call_room(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CallRoomInfo>>> {
    Ok(Json(ApiResponse::ok(state.calls.room(session_id, user.id)?)))
}
