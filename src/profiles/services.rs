use time::OffsetDateTime;
use tracing::{info, instrument};

use super::dto::{ProfileUpdate, UpdateProfileRequest};
use super::repo_types::{Profile, BIO_MAX_LEN, LOCATION_MAX_LEN, TONES};
use crate::{
    auth::{claims::TokenError, repo_types::User, validation::is_valid_email},
    context::Principal,
    entity::{self, audit::acting_principal},
    error::{AppError, FieldErrors},
    state::AppState,
};

const BLANK: &str = "This field may not be blank.";

/// Accounts created before profiles existed get one on first access.
async fn profile_for(state: &AppState, user: &User) -> Result<Profile, AppError> {
    if let Some(profile) = state.profiles.find_by_user(user.id).await? {
        return Ok(profile);
    }
    let mut profile = Profile::new(user.id);
    entity::save(state.profiles.as_ref(), &mut profile, None).await?;
    info!(user_id = %user.id, "missing profile created");
    Ok(profile)
}

async fn current_user(state: &AppState, principal: &Principal) -> Result<User, AppError> {
    Ok(state
        .users
        .find_by_id(principal.id)
        .await?
        .ok_or(TokenError::UnknownUser)?)
}

pub async fn get(state: &AppState, principal: &Principal) -> Result<(User, Profile), AppError> {
    let user = current_user(state, principal).await?;
    let profile = profile_for(state, &user).await?;
    Ok((user, profile))
}

fn normalize_website(website: &str) -> String {
    let website = website.trim();
    if website.is_empty() || website.starts_with("http://") || website.starts_with("https://") {
        website.to_string()
    } else {
        format!("https://{website}")
    }
}

fn check_max(errors: &mut FieldErrors, field: &str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.add(field, format!("Ensure this field has no more than {max} characters."));
    }
}

/// Validate `update` and apply it to `profile`; nothing is applied on error.
fn apply_profile_update(profile: &mut Profile, update: ProfileUpdate, errors: &mut FieldErrors) {
    let mut next = profile.clone();

    if let Some(bio) = update.bio {
        check_max(errors, "bio", &bio, BIO_MAX_LEN);
        next.bio = bio;
    }
    if let Some(location) = update.location {
        check_max(errors, "location", &location, LOCATION_MAX_LEN);
        next.location = location;
    }
    if let Some(website) = update.website {
        next.website = normalize_website(&website);
    }
    if let Some(linkedin) = update.linkedin_profile {
        let linkedin = linkedin.trim().to_string();
        if !linkedin.is_empty() && !linkedin.contains("linkedin.com") {
            errors.add("linkedin_profile", "Please provide a valid LinkedIn profile URL");
        }
        next.linkedin_profile = linkedin;
    }
    if let Some(tone) = update.preferred_tone {
        if !TONES.contains(&tone.as_str()) {
            errors.add("preferred_tone", format!("\"{tone}\" is not a valid choice."));
        }
        next.preferred_tone = tone;
    }
    if let Some(v) = update.email_notifications {
        next.email_notifications = v;
    }
    if let Some(v) = update.daily_reminders {
        next.daily_reminders = v;
    }

    if errors.is_empty() {
        *profile = next;
    }
}

/// Update account fields and, when given, the nested profile, in one write.
/// The profile is stamped with the acting principal from the request context.
#[instrument(skip(state, req), fields(user_id = %principal.id))]
pub async fn update(
    state: &AppState,
    principal: &Principal,
    req: UpdateProfileRequest,
) -> Result<(User, Profile), AppError> {
    let mut user = current_user(state, principal).await?;
    let mut profile = profile_for(state, &user).await?;
    let mut errors = FieldErrors::default();

    if let Some(email) = req.email {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            errors.add("email", BLANK);
        } else if !is_valid_email(&email) {
            errors.add("email", "Enter a valid email address.");
        } else if email != user.email {
            if let Some(other) = state.users.find_by_email(&email).await? {
                if other.id != user.id {
                    errors.add("email", "A user with this email already exists.");
                }
            }
        }
        user.email = email;
    }
    for (field, value, slot) in [
        ("first_name", req.first_name, &mut user.first_name),
        ("last_name", req.last_name, &mut user.last_name),
    ] {
        if let Some(value) = value {
            let value = value.trim().to_string();
            if value.is_empty() {
                errors.add(field, BLANK);
            }
            *slot = value;
        }
    }

    if let Some(update) = req.profile {
        apply_profile_update(&mut profile, update, &mut errors);
    }
    errors.into_result("Profile update failed")?;

    profile
        .audit
        .stamp(acting_principal(None), OffsetDateTime::now_utc());
    state
        .users
        .update_account(&user, &profile)
        .await
        .map_err(|e| e.into_app_error("Profile update failed"))?;
    info!(profile_id = %profile.id, "profile updated");
    Ok((user, profile))
}
