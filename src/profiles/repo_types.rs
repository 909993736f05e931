use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::entity::{AuditMeta, Auditable};

pub const TONES: [&str; 5] = [
    "professional",
    "casual",
    "motivational",
    "technical",
    "storytelling",
];
pub const BIO_MAX_LEN: usize = 500;
pub const LOCATION_MAX_LEN: usize = 100;

/// One per user, created together with the account.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bio: String,
    pub location: String,
    pub website: String,
    pub linkedin_profile: String,
    #[serde(skip_serializing)]
    pub linkedin_access_token: Option<String>,
    pub linkedin_connected: bool,
    pub preferred_tone: String,
    pub email_notifications: bool,
    pub daily_reminders: bool,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub audit: AuditMeta,
}

impl Profile {
    /// A not-yet-persisted profile with defaults.
    pub fn new(user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            bio: String::new(),
            location: String::new(),
            website: String::new(),
            linkedin_profile: String::new(),
            linkedin_access_token: None,
            linkedin_connected: false,
            preferred_tone: TONES[0].to_string(),
            email_notifications: true,
            daily_reminders: true,
            audit: AuditMeta::default(),
        }
    }
}

impl Auditable for Profile {
    fn id(&self) -> Uuid {
        self.id
    }
    fn audit(&self) -> &AuditMeta {
        &self.audit
    }
    fn audit_mut(&mut self) -> &mut AuditMeta {
        &mut self.audit
    }
}
