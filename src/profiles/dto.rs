use serde::{Deserialize, Serialize};

use super::repo_types::Profile;
use crate::auth::repo_types::User;

/// Editable profile fields; absent fields stay as they are.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProfileUpdate {
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub linkedin_profile: Option<String>,
    pub preferred_tone: Option<String>,
    pub email_notifications: Option<bool>,
    pub daily_reminders: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateProfileRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile: Option<ProfileUpdate>,
}

#[derive(Debug, Serialize)]
pub struct UserWithProfile {
    #[serde(flatten)]
    pub user: User,
    pub profile: Profile,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: UserWithProfile,
}

#[derive(Debug, Serialize)]
pub struct ProfileUpdatedResponse {
    pub message: &'static str,
    pub user: UserWithProfile,
}
