use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use peerconnect_shared::{ApiResponse, AppResult, AuthUser};

use crate::models::{SkillType, UserSkill};
use crate::services::peers::PeerMatch;
use crate::services::skills::{SkillCategory, SkillSet};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CatalogQuery {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReplaceSkillsRequest {
    #[validate(length(max = 50, message = "at most 50 teaching skills"))]
    #[serde(default)]
    pub teaching: Vec<Uuid>,
    #[validate(length(max = 50, message = "at most 50 learning skills"))]
    #[serde(default)]
    pub learning: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SetSkillRequest {
    pub skill_type: SkillType,
}

/// GET /skills - the catalog grouped by category
pub async fn list_skills(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<CatalogQuery>,
) -> AppResult<Json<ApiResponse<Vec<SkillCategory>>>> {
    let catalog = state.skills.catalog(query.search.as_deref())?;
    Ok(Json(ApiResponse::ok(catalog)))
}

/// GET /me/skills
pub async fn my_skills(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<SkillSet>>> {
    Ok(Json(ApiResponse::ok(state.skills.skill_set(user.id)?)))
}

/// PUT /me/skills - replace the whole skill set
pub async fn replace_skills(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReplaceSkillsRequest>,
) -> AppResult<Json<ApiResponse<SkillSet>>> {
    req.validate()?;
    let set = state.skills.replace(user.id, &req.teaching, &req.learning)?;
    Ok(Json(ApiResponse::ok(set)))
}

/// PUT /me/skills/:skill_id - tag one skill as teaching or learning
pub async fn set_skill(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(skill_id): Path<Uuid>,
    Json(req): Json<SetSkillRequest>,
) -> AppResult<Json<ApiResponse<UserSkill>>> {
    let row = state.skills.set_skill(user.id, skill_id, req.skill_type)?;
    Ok(Json(ApiResponse::ok(row)))
}

/// DELETE /me/skills/:skill_id
pub async fn remove_skill(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(skill_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    state.skills.remove_skill(user.id, skill_id)?;
    Ok(Json(ApiResponse::ok_with_message((), "skill removed")))
}

/// GET /skills/:skill_id/mentors
pub async fn find_mentors(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(skill_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<PeerMatch>>>> {
    Ok(Json(ApiResponse::ok(state.peers.find_mentors(user.id, skill_id)?)))
}

/// GET /skills/:skill_id/learners
pub async fn find_learners(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(skill_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<PeerMatch>>>> {
    Ok(Json(ApiResponse::ok(state.peers.find_learners(user.id, skill_id)?)))
}
