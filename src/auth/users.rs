//! Application user accounts.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::AuthError;

/// A stored user account.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_active: bool,
    #[serde(skip)]
    password_hash: String,
}

/// Fields accepted when creating a user.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
}

/// Profile fields that may change after creation.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_staff: Option<bool>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

/// User accounts with a unique username index.
#[derive(Debug)]
pub struct UserStore {
    next_id: AtomicU64,
    users: DashMap<u64, User>,
    by_username: DashMap<String, u64>,
}

impl Default for UserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UserStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            users: DashMap::new(),
            by_username: DashMap::new(),
        }
    }

    pub fn create(&self, new: NewUser) -> Result<User, AuthError> {
        if new.username.trim().is_empty() {
            return Err(AuthError::EmptyUsername);
        }
        let password_hash = hash_password(&new.password)?;

        let id = match self.by_username.entry(new.username.clone()) {
            Entry::Occupied(_) => return Err(AuthError::DuplicateUsername(new.username)),
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                slot.insert(id);
                id
            }
        };

        let user = User {
            id,
            username: new.username,
            email: new.email,
            first_name: new.first_name,
            last_name: new.last_name,
            is_staff: new.is_staff,
            is_active: true,
            password_hash,
        };
        self.users.insert(id, user.clone());
        tracing::info!(user_id = id, username = %user.username, "User created");
        Ok(user)
    }

    pub fn get(&self, id: u64) -> Option<User> {
        self.users.get(&id).map(|u| u.value().clone())
    }

    pub fn find_by_username(&self, username: &str) -> Option<User> {
        let id = *self.by_username.get(username)?;
        self.get(id)
    }

    /// Verify credentials; inactive accounts never authenticate.
    pub fn authenticate(&self, username: &str, password: &str) -> Option<User> {
        let user = self.find_by_username(username)?;
        (user.is_active && verify_password(password, &user.password_hash)).then_some(user)
    }

    pub fn update(&self, id: u64, changes: UserChanges) -> Result<Option<User>, AuthError> {
        let password_hash = changes.password.as_deref().map(hash_password).transpose()?;

        let Some(mut user) = self.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(first_name) = changes.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = changes.last_name {
            user.last_name = last_name;
        }
        if let Some(is_staff) = changes.is_staff {
            user.is_staff = is_staff;
        }
        if let Some(is_active) = changes.is_active {
            user.is_active = is_active;
        }
        if let Some(hash) = password_hash {
            user.password_hash = hash;
        }
        Ok(Some(user.value().clone()))
    }

    pub fn remove(&self, id: u64) -> Option<User> {
        let (_, user) = self.users.remove(&id)?;
        self.by_username.remove(&user.username);
        Some(user)
    }

    /// All users ordered by id.
    pub fn list(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.iter().map(|u| u.value().clone()).collect();
        users.sort_unstable_by_key(|u| u.id);
        users
    }
}
