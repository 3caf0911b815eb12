use std::sync::Arc;

use chrono::Utc;
use peerconnect_shared::{AppError, AppResult, ErrorCode};
use uuid::Uuid;

use crate::models::{Profile, ProfileChanges};
use crate::repository::ProfileRepository;

pub const MAX_DISPLAY_NAME_CHARS: usize = 50;

pub struct ProfileUpdate {
    pub display_name: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub timezone: Option<String>,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub struct ProfileService {
    profiles: Arc<dyn ProfileRepository>,
}

impl ProfileService {
    pub fn new(profiles: Arc<dyn ProfileRepository>) -> Self {
        Self { profiles }
    }

    pub fn get(&self, user_id: Uuid) -> AppResult<Profile> {
        self.profiles
            .find_profile(user_id)?
            .ok_or_else(|| AppError::not_found("profile not found"))
    }

    /// Creates the caller's profile on first write, replaces it afterwards.
    pub fn upsert(&self, user_id: Uuid, update: ProfileUpdate) -> AppResult<Profile> {
        let display_name = update.display_name.trim();
        if display_name.is_empty() {
            return Err(AppError::new(
                ErrorCode::InvalidDisplayName,
                "display name is required",
            ));
        }
        if display_name.chars().count() > MAX_DISPLAY_NAME_CHARS {
            return Err(AppError::new(
                ErrorCode::InvalidDisplayName,
                format!("display name must be at most {MAX_DISPLAY_NAME_CHARS} characters"),
            ));
        }

        let profile = self.profiles.upsert_profile(&ProfileChanges {
            id: user_id,
            display_name: display_name.to_string(),
            bio: trimmed(update.bio),
            location: trimmed(update.location),
            timezone: trimmed(update.timezone),
            updated_at: Utc::now(),
        })?;

        tracing::info!(user_id = %user_id, "profile saved");
        Ok(profile)
    }
}
