use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use peerconnect_shared::{ApiResponse, AppResult, AuthUser};

use crate::models::Profile;
use crate::services::profiles::ProfileUpdate;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct UpsertProfileRequest {
    pub display_name: String,
    #[validate(length(max = 500, message = "bio must be at most 500 characters"))]
    pub bio: Option<String>,
    #[validate(length(max = 100))]
    pub location: Option<String>,
    #[validate(length(max = 64))]
    pub timezone: Option<String>,
}

// --- GET /me/profile ---

pub async fn get_my_profile(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Profile>>> {
    let profile = state.profiles.get(user.id)?;
    Ok(Json(ApiResponse::ok(profile)))
}

// --- PUT /me/profile ---

pub async fn upsert_my_profile(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpsertProfileRequest>,
) -> AppResult<Json<ApiResponse<Profile>>> {
    req.validate()?;

    let profile = state.profiles.upsert(
        user.id,
        ProfileUpdate {
            display_name: req.display_name,
            bio: req.bio,
            location: req.location,
            timezone: req.timezone,
        },
    )?;
    Ok(Json(ApiResponse::ok(profile)))
}

// --- GET /profiles/:id ---

pub async fn get_profile(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Profile>>> {
    let profile = state.profiles.get(id)?;
    Ok(Json(ApiResponse::ok(profile)))
}
