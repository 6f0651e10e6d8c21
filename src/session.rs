use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::{HeaderMap, header};
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::SessionUser;

/// Name of the session cookie issued at login.
pub const SESSION_COOKIE: &str = "inventario_session";

/// Sessions live for 24 hours from login, matching the cookie's Max-Age.
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

struct SessionEntry {
    user: SessionUser,
    created_at: Instant,
}

/// SessionStore
///
/// In-process session registry. A login mints a random UUID token, stores the
/// user's identity snapshot under it, and hands the token to the browser as an
/// HttpOnly cookie. Lookups past the TTL evict the entry, so an expired cookie
/// behaves exactly like a missing one.
#[derive(Clone)]
pub struct SessionStore {
    entries: Arc<DashMap<Uuid, SessionEntry>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_ttl(SESSION_TTL)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Creates a session for `user` and returns its token.
    pub fn insert(&self, user: SessionUser) -> Uuid {
        let token = Uuid::new_v4();
        self.entries.insert(
            token,
            SessionEntry {
                user,
                created_at: Instant::now(),
            },
        );
        token
    }

    /// Resolves a token to its user snapshot. Expired entries are removed on
    /// access rather than by a background sweeper.
    pub fn get(&self, token: &Uuid) -> Option<SessionUser> {
        let expired = match self.entries.get(token) {
            Some(entry) => {
                if entry.created_at.elapsed() < self.ttl {
                    return Some(entry.user.clone());
                }
                true
            }
            None => false,
        };
        if expired {
            self.entries.remove(token);
        }
        None
    }

    /// Destroys a session. Idempotent: removing an unknown token is a no-op.
    pub fn remove(&self, token: &Uuid) {
        self.entries.remove(token);
    }
}

/// Builds the Set-Cookie value issued at login.
pub fn session_cookie(token: Uuid) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        SESSION_TTL.as_secs()
    )
}

/// Builds the Set-Cookie value that clears the session cookie at logout.
pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// Extracts the session token from a request's Cookie header, if present and
/// well formed. Malformed tokens are ignored, not rejected.
pub fn token_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        if name == SESSION_COOKIE {
            Uuid::parse_str(value.trim()).ok()
        } else {
            None
        }
    })
}
