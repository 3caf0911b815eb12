use std::sync::Arc;

use peerconnect_shared::AppResult;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{SessionRole, SkillType};
use crate::repository::{ProfileRepository, ReviewRepository, SessionRepository, SkillRepository};
use crate::services::reviews::average_rating;

/// A potential partner for a skill, before scoring.
#[derive(Debug, Clone, Serialize)]
pub struct PeerCandidate {
    pub user_id: Uuid,
    pub display_name: String,
    /// Sessions held in the role being searched for.
    pub total_sessions: i64,
    pub average_rating: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeerMatch {
    #[serde(flatten)]
    pub candidate: PeerCandidate,
    pub match_score: f64,
}

/// Ranks candidates. Implementations must be deterministic.
pub trait ScoringStrategy: Send + Sync {
    fn score(&self, candidate: &PeerCandidate) -> f64;
}

/// Scores by average received rating, normalised to `[0, 1]`.
pub struct RatingScoring;

impl ScoringStrategy for RatingScoring {
    fn score(&self, candidate: &PeerCandidate) -> f64 {
        (candidate.average_rating / 5.0).clamp(0.0, 1.0)
    }
}

/// Gives every candidate the same score, leaving order to the tie-breaks.
pub struct ConstantScoring(pub f64);

impl ScoringStrategy for ConstantScoring {
    fn score(&self, _candidate: &PeerCandidate) -> f64 {
        self.0
    }
}

pub struct PeerFinder {
    skills: Arc<dyn SkillRepository>,
    sessions: Arc<dyn SessionRepository>,
    reviews: Arc<dyn ReviewRepository>,
    profiles: Arc<dyn ProfileRepository>,
    scoring: Arc<dyn ScoringStrategy>,
}

impl PeerFinder {
    pub fn new(
        skills: Arc<dyn SkillRepository>,
        sessions: Arc<dyn SessionRepository>,
        reviews: Arc<dyn ReviewRepository>,
        profiles: Arc<dyn ProfileRepository>,
        scoring: Arc<dyn ScoringStrategy>,
    ) -> Self {
        Self { skills, sessions, reviews, profiles, scoring }
    }

    fn candidate(&self, user_id: Uuid, role: SessionRole, display_name: String) -> AppResult<PeerCandidate> {
        let ratings = self.reviews.ratings_for_user(user_id)?;
        Ok(PeerCandidate {
            user_id,
            display_name,
            total_sessions: self.sessions.count_sessions(user_id, role)?,
            average_rating: average_rating(&ratings),
        })
    }

    fn find(&self, requester: Uuid, skill_id: Uuid, role: SessionRole) -> AppResult<Vec<PeerMatch>> {
        let skill_type = match role {
            SessionRole::Mentor => SkillType::Teaching,
            SessionRole::Learner => SkillType::Learning,
        };
        let user_ids = self.skills.users_with_skill(skill_id, skill_type, requester)?;
        let names = self.profiles.display_names(&user_ids)?;

        let mut matches = Vec::with_capacity(user_ids.len());
        for user_id in user_ids {
            let name = names.get(&user_id).cloned().unwrap_or_default();
            let candidate = self.candidate(user_id, role, name)?;
            matches.push(PeerMatch {
                match_score: self.scoring.score(&candidate),
                candidate,
            });
        }

        matches.sort_by(|a, b| {
            b.match_score
                .total_cmp(&a.match_score)
                .then_with(|| b.candidate.total_sessions.cmp(&a.candidate.total_sessions))
                .then_with(|| a.candidate.user_id.cmp(&b.candidate.user_id))
        });

        tracing::debug!(skill_id = %skill_id, ?role, found = matches.len(), "peer search");
        Ok(matches)
    }

    /// Users teaching `skill_id`, best first.
    pub fn find_mentors(&self, requester: Uuid, skill_id: Uuid) -> AppResult<Vec<PeerMatch>> {
        self.find(requester, skill_id, SessionRole::Mentor)
    }

    /// Users learning `skill_id`, best first.
    pub fn find_learners(&self, requester: Uuid, skill_id: Uuid) -> AppResult<Vec<PeerMatch>> {
        self.find(requester, skill_id, SessionRole::Learner)
    }

    /// Score for `peer_id` taking `role` in a new session.
    pub fn match_score(&self, peer_id: Uuid, role: SessionRole) -> AppResult<f64> {
        let candidate = self.candidate(peer_id, role, String::new())?;
        Ok(self.scoring.score(&candidate))
    }
}
