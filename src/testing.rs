//! In-memory stores for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::blacklist::TokenBlacklist;
use crate::auth::dto::RegisterRequest;
use crate::auth::repo::{AccountWriteError, UserStore};
use crate::auth::repo_types::{NewUser, User};
use crate::categories::repo::CategoryStore;
use crate::categories::repo_types::Category;
use crate::context::Principal;
use crate::entity::audit::acting_principal;
use crate::entity::{Repository, SoftDeleteRepository, View};
use crate::profiles::repo::ProfileStore;
use crate::profiles::repo_types::Profile;
use crate::state::AppState;

pub const PASSWORD: &str = "Tangerine-Kite-42";

pub fn fake_state() -> AppState {
    AppState::fake()
}

pub fn register_request(username: &str, email: &str) -> RegisterRequest {
    RegisterRequest {
        username: username.into(),
        email: email.into(),
        first_name: "Test".into(),
        last_name: "Person".into(),
        password: PASSWORD.into(),
        password_confirm: PASSWORD.into(),
    }
}

pub fn user(username: &str, email: &str) -> User {
    User {
        id: Uuid::new_v4(),
        username: username.into(),
        email: email.into(),
        first_name: String::new(),
        last_name: String::new(),
        password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".into(),
        is_active: true,
        is_staff: false,
        date_joined: OffsetDateTime::now_utc(),
        last_login: None,
    }
}

pub fn principal(name: &str) -> Principal {
    user(name, &format!("{name}@example.com")).principal()
}

pub fn staff(name: &str) -> Principal {
    Principal {
        is_staff: true,
        ..principal(name)
    }
}

#[derive(Default)]
pub struct MemoryUsers {
    users: Mutex<HashMap<Uuid, User>>,
    profiles: Mutex<HashMap<Uuid, Profile>>,
}

impl MemoryUsers {
    pub fn set_active(&self, id: Uuid, active: bool) {
        if let Some(u) = self.users.lock().unwrap().get_mut(&id) {
            u.is_active = active;
        }
    }

    pub fn set_staff(&self, id: Uuid, staff: bool) {
        if let Some(u) = self.users.lock().unwrap().get_mut(&id) {
            u.is_staff = staff;
        }
    }

    fn find(&self, pred: impl Fn(&User) -> bool) -> Option<User> {
        self.users.lock().unwrap().values().find(|u| pred(u)).cloned()
    }
}

#[async_trait]
impl UserStore for MemoryUsers {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        Ok(self.find(|u| u.username == username))
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.find(|u| u.email == email))
    }

    async fn create_with_profile(&self, new_user: NewUser) -> Result<(User, Profile), AccountWriteError> {
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.username == new_user.username) {
            return Err(AccountWriteError::UsernameTaken);
        }
        if users.values().any(|u| u.email == new_user.email) {
            return Err(AccountWriteError::EmailTaken);
        }
        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username,
            email: new_user.email,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            password_hash: new_user.password_hash,
            is_active: true,
            is_staff: false,
            date_joined: OffsetDateTime::now_utc(),
            last_login: None,
        };
        let mut profile = Profile::new(user.id);
        profile
            .audit
            .stamp(acting_principal(None), OffsetDateTime::now_utc());

        users.insert(user.id, user.clone());
        self.profiles.lock().unwrap().insert(profile.id, profile.clone());
        Ok((user, profile))
    }

    async fn update_account(&self, user: &User, profile: &Profile) -> Result<(), AccountWriteError> {
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.id != user.id && u.email == user.email) {
            return Err(AccountWriteError::EmailTaken);
        }
        if let Some(u) = users.get_mut(&user.id) {
            u.email = user.email.clone();
            u.first_name = user.first_name.clone();
            u.last_name = user.last_name.clone();
        }
        self.profiles.lock().unwrap().insert(profile.id, profile.clone());
        Ok(())
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        if let Some(u) = self.users.lock().unwrap().get_mut(&id) {
            u.password_hash = password_hash.to_string();
        }
        Ok(())
    }

    async fn record_login(&self, id: Uuid, at: OffsetDateTime) -> anyhow::Result<()> {
        if let Some(u) = self.users.lock().unwrap().get_mut(&id) {
            u.last_login = Some(at);
        }
        Ok(())
    }
}

#[async_trait]
impl Repository<Profile> for MemoryUsers {
    async fn insert(&self, entity: &Profile) -> anyhow::Result<()> {
        self.profiles.lock().unwrap().insert(entity.id, entity.clone());
        Ok(())
    }

    async fn update(&self, entity: &Profile) -> anyhow::Result<()> {
        self.profiles.lock().unwrap().insert(entity.id, entity.clone());
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MemoryUsers {
    async fn find_by_user(&self, user_id: Uuid) -> anyhow::Result<Option<Profile>> {
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .values()
            .find(|p| p.user_id == user_id)
            .cloned())
    }
}

/// Lookups always miss, as if another request committed the same identifier
/// between the uniqueness check and the write.
pub struct RacyUsers(pub Arc<MemoryUsers>);

#[async_trait]
impl UserStore for RacyUsers {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        self.0.find_by_id(id).await
    }

    async fn find_by_username(&self, _username: &str) -> anyhow::Result<Option<User>> {
        Ok(None)
    }

    async fn find_by_email(&self, _email: &str) -> anyhow::Result<Option<User>> {
        Ok(None)
    }

    async fn create_with_profile(&self, new_user: NewUser) -> Result<(User, Profile), AccountWriteError> {
        self.0.create_with_profile(new_user).await
    }

    async fn update_account(&self, user: &User, profile: &Profile) -> Result<(), AccountWriteError> {
        self.0.update_account(user, profile).await
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        self.0.set_password_hash(id, password_hash).await
    }

    async fn record_login(&self, id: Uuid, at: OffsetDateTime) -> anyhow::Result<()> {
        self.0.record_login(id, at).await
    }
}

/// State whose user lookups race with writes; profiles share the same store.
pub fn racy_state() -> AppState {
    let users = Arc::new(MemoryUsers::default());
    AppState {
        users: Arc::new(RacyUsers(users.clone())),
        profiles: users,
        ..fake_state()
    }
}

#[derive(Default)]
pub struct MemoryBlacklist(Mutex<HashMap<Uuid, OffsetDateTime>>);

#[async_trait]
impl TokenBlacklist for MemoryBlacklist {
    async fn revoke(&self, session_id: Uuid, _user_id: Uuid, expires_at: OffsetDateTime) -> anyhow::Result<()> {
        let mut revoked = self.0.lock().unwrap();
        let now = OffsetDateTime::now_utc();
        revoked.retain(|_, until| *until >= now);
        revoked.entry(session_id).or_insert(expires_at);
        Ok(())
    }

    async fn is_revoked(&self, session_id: Uuid) -> anyhow::Result<bool> {
        Ok(self.0.lock().unwrap().contains_key(&session_id))
    }
}

#[derive(Default)]
pub struct MemoryCategories(Mutex<Vec<Category>>);

impl MemoryCategories {
    fn taken(&self, pred: impl Fn(&Category) -> bool, except: Option<Uuid>) -> bool {
        self.0
            .lock()
            .unwrap()
            .iter()
            .any(|c| Some(c.id) != except && pred(c))
    }

    fn with_row(&self, id: Uuid, f: impl FnOnce(&mut Category)) {
        if let Some(c) = self.0.lock().unwrap().iter_mut().find(|c| c.id == id) {
            f(c);
        }
    }
}

#[async_trait]
impl Repository<Category> for MemoryCategories {
    async fn insert(&self, entity: &Category) -> anyhow::Result<()> {
        self.0.lock().unwrap().push(entity.clone());
        Ok(())
    }

    async fn update(&self, entity: &Category) -> anyhow::Result<()> {
        self.with_row(entity.id, |c| {
            let deletion = c.deletion.clone();
            let created = (c.audit.created_at, c.audit.created_by);
            *c = entity.clone();
            c.deletion = deletion;
            (c.audit.created_at, c.audit.created_by) = created;
        });
        Ok(())
    }
}

#[async_trait]
impl SoftDeleteRepository<Category> for MemoryCategories {
    async fn write_deletion(&self, entity: &Category, restamped: bool) -> anyhow::Result<()> {
        self.with_row(entity.id, |c| {
            c.deletion = entity.deletion.clone();
            if restamped {
                c.audit.updated_at = entity.audit.updated_at;
                c.audit.updated_by = entity.audit.updated_by;
            }
        });
        Ok(())
    }

    async fn remove(&self, id: Uuid) -> anyhow::Result<()> {
        self.0.lock().unwrap().retain(|c| c.id != id);
        Ok(())
    }

    async fn find(&self, id: Uuid, view: View) -> anyhow::Result<Option<Category>> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id && view.admits(&c.deletion))
            .cloned())
    }

    async fn list(&self, view: View) -> anyhow::Result<Vec<Category>> {
        let mut rows: Vec<Category> = self
            .0
            .lock()
            .unwrap()
            .iter()
            .filter(|c| view.admits(&c.deletion))
            .cloned()
            .collect();
        rows.sort_by(|a, b| (a.sort_order, &a.name).cmp(&(b.sort_order, &b.name)));
        Ok(rows)
    }
}

#[async_trait]
impl CategoryStore for MemoryCategories {
    async fn name_taken(&self, name: &str, except: Option<Uuid>) -> anyhow::Result<bool> {
        Ok(self.taken(|c| c.name == name, except))
    }

    async fn slug_taken(&self, slug: &str, except: Option<Uuid>) -> anyhow::Result<bool> {
        Ok(self.taken(|c| c.slug == slug, except))
    }
}
