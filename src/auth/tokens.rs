//! API tokens and login sessions.

use std::fmt::Write;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::RngCore;

/// Random lowercase hex string of `bytes * 2` characters.
fn random_key(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    buf.iter().fold(String::with_capacity(bytes * 2), |mut out, b| {
        let _ = write!(out, "{:02x}", b);
        out
    })
}

/// One API token per user, created on first request.
#[derive(Debug, Default)]
pub struct TokenStore {
    by_key: DashMap<String, u64>,
    by_user: DashMap<u64, String>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing token for the user, or a fresh 40-character one.
    pub fn get_or_create(&self, user_id: u64) -> String {
        match self.by_user.entry(user_id) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(slot) => {
                let key = random_key(20);
                self.by_key.insert(key.clone(), user_id);
                slot.insert(key.clone());
                key
            }
        }
    }

    /// User owning the token.
    pub fn lookup(&self, key: &str) -> Option<u64> {
        self.by_key.get(key).map(|entry| *entry.value())
    }

    pub fn revoke_user(&self, user_id: u64) {
        if let Some((_, key)) = self.by_user.remove(&user_id) {
            self.by_key.remove(&key);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Session {
    user_id: u64,
    expires_at: Instant,
}

impl Session {
    fn expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Session keys issued by the login endpoint, valid for a fixed age.
///
/// Expired sessions are dropped when looked up and swept on every new login.
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    max_age: Duration,
}

impl SessionStore {
    pub fn new(max_age: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            max_age,
        }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn create(&self, user_id: u64) -> String {
        let now = Instant::now();
        self.prune_expired(now);

        let key = random_key(16);
        self.sessions.insert(
            key.clone(),
            Session {
                user_id,
                expires_at: now + self.max_age,
            },
        );
        key
    }

    pub fn lookup(&self, key: &str) -> Option<u64> {
        let now = Instant::now();
        let session = *self.sessions.get(key)?.value();
        if session.expired(now) {
            self.sessions.remove_if(key, |_, s| s.expired(now));
            return None;
        }
        Some(session.user_id)
    }

    pub fn remove(&self, key: &str) -> bool {
        self.sessions.remove(key).is_some()
    }

    pub fn remove_user(&self, user_id: u64) {
        self.sessions.retain(|_, session| session.user_id != user_id);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn prune_expired(&self, now: Instant) {
        self.sessions.retain(|_, session| !session.expired(now));
    }
}
