use std::sync::Arc;

use uuid::Uuid;

use crate::models::{PeerSession, SessionRole, SessionStatus};
use crate::repository::memory::MemoryStore;
use crate::repository::Repositories;
use crate::services::lifecycle::{NewSessionParams, SessionLifecycle};

/// A mentor, a learner and a shared skill in a fresh in-memory store.
pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub repos: Repositories,
    pub lifecycle: SessionLifecycle,
    pub mentor: Uuid,
    pub learner: Uuid,
    pub skill: Uuid,
}

impl Fixture {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let mentor = store.add_profile("Mia Mentor");
        let learner = store.add_profile("Leo Learner");
        let skill = store.add_skill("Rust", "Programming");
        let repos = Repositories::from_store(store.clone());
        let lifecycle = SessionLifecycle::new(
            repos.sessions.clone(),
            repos.skills.clone(),
            repos.profiles.clone(),
            10,
        );

        Self { store, repos, lifecycle, mentor, learner, skill }
    }

    pub fn pending_session(&self) -> PeerSession {
        self.lifecycle
            .create_session(
                self.learner,
                NewSessionParams {
                    peer_id: self.mentor,
                    skill_id: self.skill,
                    requester_role: SessionRole::Learner,
                    scheduled_at: None,
                    duration_minutes: None,
                },
                0.5,
            )
            .unwrap()
    }

    /// Walks a new session through legal transitions until it reaches `status`.
    pub fn session_in(&self, status: SessionStatus) -> PeerSession {
        let session = self.pending_session();
        let path: &[SessionStatus] = match status {
            SessionStatus::Pending => &[],
            SessionStatus::Active => &[SessionStatus::Active],
            SessionStatus::Completed => &[SessionStatus::Active, SessionStatus::Completed],
            SessionStatus::Cancelled => &[SessionStatus::Cancelled],
        };

        let mut current = session;
        for step in path {
            current = self
                .lifecycle
                .transition(current.id, self.mentor, *step)
                .unwrap()
                .session;
        }
        current
    }
}
