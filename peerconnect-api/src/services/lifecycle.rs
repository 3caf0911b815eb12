use std::sync::Arc;

use chrono::{DateTime, Utc};
use peerconnect_shared::{AppError, AppResult, ErrorCode};
use uuid::Uuid;

use crate::models::{
    CompletionAward, NewPeerSession, PeerSession, SessionRole, SessionStatus, StatusChange,
};
use crate::repository::{ProfileRepository, SessionRepository, SkillRepository};

pub const SESSIONS_TRANSITIONED_TOTAL: &str = "sessions_transitioned_total";
const DEFAULT_DURATION_MINUTES: i32 = 60;

pub struct NewSessionParams {
    pub peer_id: Uuid,
    pub skill_id: Uuid,
    /// The requester's side of the session.
    pub requester_role: SessionRole,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
}

/// What a successful transition changed.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub session: PeerSession,
    pub from: SessionStatus,
    /// Credited to each participant; zero unless the session completed.
    pub points_awarded: i32,
}

impl TransitionOutcome {
    /// Users whose achievement progress may have moved.
    pub fn recompute_for(&self) -> [Uuid; 2] {
        self.session.participants()
    }
}

/// Owns the session state machine and the completion award.
pub struct SessionLifecycle {
    sessions: Arc<dyn SessionRepository>,
    skills: Arc<dyn SkillRepository>,
    profiles: Arc<dyn ProfileRepository>,
    completion_points: i32,
}

impl SessionLifecycle {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        skills: Arc<dyn SkillRepository>,
        profiles: Arc<dyn ProfileRepository>,
        completion_points: i32,
    ) -> Self {
        Self { sessions, skills, profiles, completion_points }
    }

    pub fn create_session(
        &self,
        requester: Uuid,
        params: NewSessionParams,
        match_score: f64,
    ) -> AppResult<PeerSession> {
        if params.peer_id == requester {
            return Err(AppError::new(
                ErrorCode::CannotSessionWithSelf,
                "mentor and learner must be different users",
            ));
        }
        if self.profiles.find_profile(requester)?.is_none() {
            return Err(AppError::not_found("create your profile before requesting sessions"));
        }
        if self.profiles.find_profile(params.peer_id)?.is_none() {
            return Err(AppError::not_found("peer not found"));
        }
        if self.skills.find_skills(&[params.skill_id])?.is_empty() {
            return Err(AppError::new(ErrorCode::SkillNotFound, "skill not found"));
        }

        let (mentor_id, learner_id) = match params.requester_role {
            SessionRole::Mentor => (requester, params.peer_id),
            SessionRole::Learner => (params.peer_id, requester),
        };

        let now = Utc::now();
        let session = self.sessions.insert_session(&NewPeerSession {
            id: Uuid::now_v7(),
            mentor_id,
            learner_id,
            skill_id: params.skill_id,
            status: SessionStatus::Pending,
            duration_minutes: params.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES),
            match_score,
            scheduled_at: params.scheduled_at,
            created_at: now,
            updated_at: now,
        })?;

        tracing::info!(
            session_id = %session.id,
            mentor_id = %mentor_id,
            learner_id = %learner_id,
            "session created"
        );
        Ok(session)
    }

    /// Loads a session the requester takes part in.
    pub fn get_session(&self, session_id: Uuid, requester: Uuid) -> AppResult<PeerSession> {
        let session = self
            .sessions
            .find_session(session_id)?
            .ok_or_else(|| AppError::not_found("session not found"))?;

        if !session.is_participant(requester) {
            return Err(AppError::forbidden("you are not a participant in this session"));
        }
        Ok(session)
    }

    pub fn list_sessions(&self, user_id: Uuid, status: Option<SessionStatus>) -> AppResult<Vec<PeerSession>> {
        self.sessions.sessions_for_user(user_id, status)
    }

    pub fn transition(
        &self,
        session_id: Uuid,
        requester: Uuid,
        target: SessionStatus,
    ) -> AppResult<TransitionOutcome> {
        let session = self.get_session(session_id, requester)?;
        let from = session.status;

        if !from.can_transition_to(target) {
            return Err(invalid_transition(from, target));
        }

        let change = StatusChange {
            session_id,
            from,
            to: target,
            at: Utc::now(),
        };

        let (updated, points_awarded) = if target == SessionStatus::Completed {
            let award = CompletionAward {
                mentor_id: session.mentor_id,
                learner_id: session.learner_id,
                points: self.completion_points,
            };
            (self.sessions.complete_session(&change, &award)?, self.completion_points)
        } else {
            (self.sessions.update_status(&change)?, 0)
        };

        // The row moved between our read and the compare-and-swap.
        let Some(updated) = updated else {
            tracing::warn!(session_id = %session_id, from = %from, to = %target, "lost status race");
            return Err(invalid_transition(from, target));
        };

        metrics::counter!(SESSIONS_TRANSITIONED_TOTAL, "to" => target.as_str()).increment(1);
        tracing::info!(
            session_id = %session_id,
            changed_by = %requester,
            from = %from,
            to = %target,
            points_awarded,
            "session transitioned"
        );

        Ok(TransitionOutcome {
            session: updated,
            from,
            points_awarded,
        })
    }
}

fn invalid_transition(from: SessionStatus, to: SessionStatus) -> AppError {
    AppError::with_details(
        ErrorCode::InvalidTransition,
        format!("cannot move a {from} session to {to}"),
        serde_json::json!({ "from": from.as_str(), "to": to.as_str() }),
    )
}
