use std::sync::Arc;

use chrono::Utc;
use peerconnect_shared::{AppError, AppResult, ErrorCode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{NewResource, Resource, ResourceFilter, SkillType};
use crate::repository::{ResourceRepository, SkillRepository};

pub const SEARCH_LIMIT: i64 = 50;
pub const RECOMMENDED_LIMIT: i64 = 20;
pub const TRENDING_LIMIT: i64 = 15;
pub const VIDEO_RESULTS: u32 = 8;
const DEFAULT_RESOURCE_TYPE: &str = "article";

pub struct NewResourceParams {
    pub title: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub resource_type: Option<String>,
    pub skill_id: Option<Uuid>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub struct ResourceService {
    resources: Arc<dyn ResourceRepository>,
    skills: Arc<dyn SkillRepository>,
}

impl ResourceService {
    pub fn new(resources: Arc<dyn ResourceRepository>, skills: Arc<dyn SkillRepository>) -> Self {
        Self { resources, skills }
    }

    pub fn add(&self, created_by: Uuid, params: NewResourceParams) -> AppResult<Resource> {
        let title = params.title.trim();
        if title.is_empty() {
            return Err(AppError::new(ErrorCode::ValidationError, "title is required"));
        }
        if let Some(skill_id) = params.skill_id {
            if self.skills.find_skills(&[skill_id])?.is_empty() {
                return Err(AppError::new(ErrorCode::SkillNotFound, "skill not found"));
            }
        }

        let resource = self.resources.insert_resource(&NewResource {
            id: Uuid::now_v7(),
            title: title.to_string(),
            description: non_blank(params.description),
            url: non_blank(params.url),
            resource_type: non_blank(params.resource_type)
                .unwrap_or_else(|| DEFAULT_RESOURCE_TYPE.to_string()),
            skill_id: params.skill_id,
            created_by,
            ai_generated: false,
            created_at: Utc::now(),
        })?;

        tracing::info!(resource_id = %resource.id, created_by = %created_by, "resource added");
        Ok(resource)
    }

    pub fn search(
        &self,
        text: Option<String>,
        skill_id: Option<Uuid>,
        resource_type: Option<String>,
    ) -> AppResult<Vec<Resource>> {
        let filter = ResourceFilter {
            text: non_blank(text),
            skill_ids: skill_id.map(|id| vec![id]),
            resource_type: non_blank(resource_type),
        };
        self.resources.search_resources(&filter, SEARCH_LIMIT)
    }

    /// Newest resources tagged with any skill the user is learning.
    pub fn recommended(&self, user_id: Uuid) -> AppResult<Vec<Resource>> {
        let learning: Vec<Uuid> = self
            .skills
            .user_skills(user_id)?
            .into_iter()
            .filter(|s| s.skill_type == SkillType::Learning)
            .map(|s| s.skill_id)
            .collect();
        if learning.is_empty() {
            return Ok(vec![]);
        }

        let filter = ResourceFilter {
            skill_ids: Some(learning),
            ..Default::default()
        };
        self.resources.search_resources(&filter, RECOMMENDED_LIMIT)
    }

    pub fn trending(&self) -> AppResult<Vec<Resource>> {
        self.resources
            .search_resources(&ResourceFilter::default(), TRENDING_LIMIT)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VideoResult {
    pub video_id: String,
    pub title: String,
    pub url: String,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    title: String,
    #[serde(default)]
    thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Deserialize)]
struct Thumbnails {
    medium: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

/// Items without a video id (channels, playlists) are skipped.
fn into_videos(response: SearchResponse) -> Vec<VideoResult> {
    response
        .items
        .into_iter()
        .filter_map(|item| {
            let video_id = item.id.video_id?;
            Some(VideoResult {
                url: format!("https://www.youtube.com/watch?v={video_id}"),
                thumbnail_url: item.snippet.thumbnails.and_then(|t| t.medium).map(|t| t.url),
                title: item.snippet.title,
                video_id,
            })
        })
        .collect()
}

/// YouTube Data API v3 search.
pub struct VideoSearch {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl VideoSearch {
    pub fn new(http: reqwest::Client, api_url: String, api_key: Option<String>) -> Self {
        Self {
            http,
            api_url,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn search(&self, query: &str) -> AppResult<Vec<VideoResult>> {
        let Some(api_key) = &self.api_key else {
            return Err(AppError::new(
                ErrorCode::ServiceUnavailable,
                "video search is not configured",
            ));
        };
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::new(ErrorCode::ValidationError, "query is required"));
        }

        let max_results = VIDEO_RESULTS.to_string();
        let res = self
            .http
            .get(&self.api_url)
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("q", query),
                ("maxResults", max_results.as_str()),
                ("key", api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "video search request failed");
                AppError::new(ErrorCode::ServiceUnavailable, "video search is unavailable")
            })?;

        if !res.status().is_success() {
            tracing::error!(status = %res.status(), "video search returned an error");
            return Err(AppError::new(ErrorCode::ServiceUnavailable, "video search is unavailable"));
        }

        let body = res.json::<SearchResponse>().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse video search response");
            AppError::internal("invalid video search response")
        })?;
        Ok(into_videos(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::MemoryStore;
    use crate::repository::Repositories;
    use crate::services::skills::SkillSetService;

    fn setup() -> (Arc<MemoryStore>, Repositories, ResourceService) {
        let store = Arc::new(MemoryStore::new());
        let repos = Repositories::from_store(store.clone());
        let svc = ResourceService::new(repos.resources.clone(), repos.skills.clone());
        (store, repos, svc)
    }

    fn params(title: &str, skill_id: Option<Uuid>) -> NewResourceParams {
        NewResourceParams {
            title: title.into(),
            description: None,
            url: None,
            resource_type: None,
            skill_id,
        }
    }

    #[test]
    fn add_defaults_and_validation() {
        let (store, _, svc) = setup();
        let user = store.add_profile("Ann");

        let saved = svc
            .add(
                user,
                NewResourceParams {
                    title: "  The Book  ".into(),
                    description: Some(" ".into()),
                    url: Some("https://doc.rust-lang.org/book/".into()),
                    resource_type: None,
                    skill_id: None,
                },
            )
            .unwrap();
        assert_eq!(saved.title, "The Book");
        assert_eq!(saved.resource_type, "article");
        assert_eq!(saved.description, None);
        assert!(!saved.ai_generated);

        let err = svc.add(user, params("   ", None)).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ValidationError));

        let err = svc.add(user, params("x", Some(Uuid::new_v4()))).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::SkillNotFound));
    }

    #[test]
    fn search_filters_newest_first() {
        let (store, _, svc) = setup();
        let user = store.add_profile("Ann");
        let rust = store.add_skill("Rust", "Programming");

        svc.add(user, params("Rust ownership", Some(rust))).unwrap();
        svc.add(user, params("Guitar chords", None)).unwrap();
        svc.add(user, params("Async Rust", Some(rust))).unwrap();

        let found = svc.search(Some("rust".into()), None, None).unwrap();
        let titles: Vec<&str> = found.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Async Rust", "Rust ownership"]);

        assert_eq!(svc.search(None, Some(rust), None).unwrap().len(), 2);
        assert_eq!(svc.search(None, None, Some("video".into())).unwrap().len(), 0);
        assert_eq!(svc.trending().unwrap().len(), 3);
    }

    #[test]
    fn recommendations_follow_learning_skills() {
        let (store, repos, svc) = setup();
        let user = store.add_profile("Ann");
        let rust = store.add_skill("Rust", "Programming");
        let piano = store.add_skill("Piano", "Music");
        svc.add(user, params("Rust book", Some(rust))).unwrap();
        svc.add(user, params("Scales", Some(piano))).unwrap();

        assert!(svc.recommended(user).unwrap().is_empty());

        SkillSetService::new(repos.skills.clone())
            .replace(user, &[rust], &[piano])
            .unwrap();
        let picks = svc.recommended(user).unwrap();
        assert_eq!(picks.len(), 1);
        assert_eq!(picks[0].title, "Scales");
    }

    #[test]
    fn search_response_maps_videos() {
        let body: SearchResponse = serde_json::from_value(serde_json::json!({
            "items": [
                {
                    "id": { "kind": "youtube#video", "videoId": "abc123" },
                    "snippet": {
                        "title": "Rust in 100 seconds",
                        "thumbnails": { "medium": { "url": "https://i.ytimg.com/vi/abc123/mqdefault.jpg" } }
                    }
                },
                {
                    "id": { "kind": "youtube#channel", "channelId": "chan" },
                    "snippet": { "title": "A channel" }
                }
            ]
        }))
        .unwrap();

        let videos = into_videos(body);
        assert_eq!(
            videos,
            vec![VideoResult {
                video_id: "abc123".into(),
                title: "Rust in 100 seconds".into(),
                url: "https://www.youtube.com/watch?v=abc123".into(),
                thumbnail_url: Some("https://i.ytimg.com/vi/abc123/mqdefault.jpg".into()),
            }]
        );
    }

    #[tokio::test]
    async fn unconfigured_search_is_unavailable() {
        let search = VideoSearch::new(reqwest::Client::new(), "http://localhost".into(), Some(" ".into()));
        assert!(!search.is_configured());
        let err = search.search("rust").await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ServiceUnavailable));
    }
}
