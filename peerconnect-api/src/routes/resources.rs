use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use peerconnect_shared::{ApiResponse, AppResult, AuthUser};

use crate::models::Resource;
use crate::services::resources::{NewResourceParams, VideoResult};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateResourceRequest {
    #[validate(length(max = 200, message = "title must be at most 200 characters"))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(url(message = "url must be a valid URL"))]
    pub url: Option<String>,
    #[validate(length(max = 32))]
    pub resource_type: Option<String>,
    pub skill_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub skill_id: Option<Uuid>,
    pub resource_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VideoQuery {
    pub q: String,
}

/// POST /resources
pub async fn add_resource(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateResourceRequest>,
) -> AppResult<Json<ApiResponse<Resource>>> {
    req.validate()?;

    let resource = state.resources.add(
        user.id,
        NewResourceParams {
            title: req.title,
            description: req.description,
            url: req.url,
            resource_type: req.resource_type,
            skill_id: req.skill_id,
        },
    )?;
    Ok(Json(ApiResponse::ok(resource)))
}

/// GET /resources?q=&skill_id=&resource_type=
pub async fn search_resources(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<ApiResponse<Vec<Resource>>>> {
    let found = state
        .resources
        .search(query.q, query.skill_id, query.resource_type)?;
    Ok(Json(ApiResponse::ok(found)))
}

/// GET /resources/recommended - for the caller's learning skills
pub async fn recommended(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<Resource>>>> {
    Ok(Json(ApiResponse::ok(state.resources.recommended(user.id)?)))
}

/// GET /resources/trending
pub async fn trending(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<Resource>>>> {
    Ok(Json(ApiResponse::ok(state.resources.trending()?)))
}

/// GET /resources/videos?q=
pub async fn search_videos(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<VideoQuery>,
) -> AppResult<Json<ApiResponse<Vec<VideoResult>>>> {
    Ok(Json(ApiResponse::ok(state.videos.search(&query.q).await?)))
}
