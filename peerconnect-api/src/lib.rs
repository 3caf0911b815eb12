pub mod config;
pub mod events;
pub mod models;
pub mod repository;
pub mod routes;
pub mod schema;
pub mod services;
pub mod socket;

use std::sync::Arc;

use dashmap::DashMap;
use metrics_exporter_prometheus::PrometheusHandle;
use peerconnect_shared::clients::db::DbPool;
use uuid::Uuid;

use config::AppConfig;
use events::publisher::EventPublisher;
use repository::Repositories;
use services::achievements::AchievementService;
use services::calls::{CallPresence, CallRooms, CallService};
use services::chat::{ChatService, MessageFanout};
use services::leaderboard::Leaderboard;
use services::lifecycle::SessionLifecycle;
use services::peers::{PeerFinder, RatingScoring};
use services::profiles::ProfileService;
use services::resources::{ResourceService, VideoSearch};
use services::reviews::ReviewGate;
use services::skills::SkillSetService;

pub struct AppState {
    pub config: AppConfig,
    /// Absent when the state is backed by something other than Postgres.
    pub db: Option<DbPool>,
    pub events: EventPublisher,
    pub metrics_handle: PrometheusHandle,
    pub profiles: ProfileService,
    pub skills: SkillSetService,
    pub peers: PeerFinder,
    pub lifecycle: SessionLifecycle,
    pub reviews: ReviewGate,
    pub achievements: AchievementService,
    pub leaderboard: Leaderboard,
    pub chat: Arc<ChatService>,
    pub calls: CallService,
    /// Call presence held by each socket, keyed by (socket id, session id).
    pub call_presence: DashMap<(String, Uuid), CallPresence>,
    pub resources: ResourceService,
    pub videos: VideoSearch,
}

pub struct StateParts {
    pub config: AppConfig,
    pub repos: Repositories,
    pub db: Option<DbPool>,
    pub events: EventPublisher,
    pub fanout: Arc<dyn MessageFanout>,
    pub http_client: reqwest::Client,
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    pub fn new(parts: StateParts) -> Self {
        let StateParts { config, repos, db, events, fanout, http_client, metrics_handle } = parts;

        let chat = Arc::new(ChatService::new(repos.sessions.clone(), repos.chat.clone(), fanout));
        let calls = CallService::new(repos.sessions.clone(), Arc::new(CallRooms::new()), chat.clone());
        let videos = VideoSearch::new(
            http_client,
            config.youtube_api_url.clone(),
            config.youtube_api_key.clone(),
        );

        Self {
            profiles: ProfileService::new(repos.profiles.clone()),
            skills: SkillSetService::new(repos.skills.clone()),
            peers: PeerFinder::new(
                repos.skills.clone(),
                repos.sessions.clone(),
                repos.reviews.clone(),
                repos.profiles.clone(),
                Arc::new(RatingScoring),
            ),
            lifecycle: SessionLifecycle::new(
                repos.sessions.clone(),
                repos.skills.clone(),
                repos.profiles.clone(),
                config.session_completion_points,
            ),
            reviews: ReviewGate::new(repos.sessions.clone(), repos.reviews.clone()),
            achievements: AchievementService::new(repos.achievements.clone(), repos.stats.clone()),
            leaderboard: Leaderboard::new(
                repos.points.clone(),
                repos.profiles.clone(),
                repos.achievements.clone(),
            ),
            resources: ResourceService::new(repos.resources.clone(), repos.skills.clone()),
            chat,
            calls,
            call_presence: DashMap::new(),
            videos,
            config,
            db,
            events,
            metrics_handle,
        }
    }

    /// Drops every socket's call presence in `session_id`. Returns how many
    /// were held.
    pub fn release_call_presence(&self, session_id: Uuid) -> usize {
        let before = self.call_presence.len();
        self.call_presence.retain(|(_, sid), _| *sid != session_id);
        let released = before.saturating_sub(self.call_presence.len());
        if released > 0 {
            tracing::info!(session_id = %session_id, released, "call presence released with session");
        }
        released
    }
}
