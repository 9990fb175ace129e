//! Server-side home of the visitor's storage layers.
//!
//! [`ClientStorage`] has three scopes. Each is kept somewhere different:
//!
//! - **local** lives in the tower-sessions session under
//!   [`LOCAL_STORAGE`](crate::models::session_keys::LOCAL_STORAGE) and
//!   survives restarts with the session store
//! - **session** lives in an in-process [`SessionStorageCache`] keyed by the
//!   visitor id; entries expire when idle and vanish on restart
//! - **cookies** are real HTTP cookies, restricted to the recovery prefix
//!
//! The [`Visitor`] extractor loads a snapshot, handlers run domain logic
//! against [`Visitor::storage`], and [`Visitor::save`] writes back only what
//! changed, returning the `Set-Cookie` headers to send.

use std::collections::BTreeMap;
use std::time::Duration;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, header, request::Parts},
};
use moka::future::Cache;
use tower_sessions::Session;
use tower_sessions::cookie::time::Duration as CookieDuration;
use tower_sessions::cookie::{Cookie, SameSite};
use uuid::Uuid;

use lupul_core::storage::{ClientStorage, MemoryStore, keys};

use crate::error::AppError;
use crate::models::session_keys;
use crate::state::AppState;

/// Idle lifetime of a visitor's session-scoped entries.
pub const SESSION_STORAGE_IDLE: Duration = Duration::from_secs(2 * 60 * 60);

/// Lifetime of a recovery cookie.
const RECOVERY_COOKIE_MAX_AGE: i64 = 24 * 60 * 60;

/// Upper bound on visitors with session-scoped entries.
const SESSION_STORAGE_CAPACITY: u64 = 100_000;

/// Session-scoped entries per visitor.
pub type SessionStorageCache = Cache<Uuid, BTreeMap<String, String>>;

/// Build the session-scoped storage cache.
#[must_use]
pub fn session_storage_cache(idle: Duration) -> SessionStorageCache {
    Cache::builder()
        .max_capacity(SESSION_STORAGE_CAPACITY)
        .time_to_idle(idle)
        .build()
}

/// Recovery cookies sent with the request.
///
/// Other cookies (the session cookie included) are ignored.
#[must_use]
pub fn recovery_cookies(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .filter(|cookie| cookie.name().starts_with(keys::RECOVERY_COOKIE_PREFIX))
        .map(|cookie| (cookie.name().to_owned(), cookie.value_trimmed().to_owned()))
        .collect()
}

/// `Set-Cookie` for a recovery cookie; `None` as value deletes it.
fn set_cookie_header(name: &str, value: Option<&str>, secure: bool) -> Option<HeaderValue> {
    let max_age = if value.is_some() {
        CookieDuration::seconds(RECOVERY_COOKIE_MAX_AGE)
    } else {
        CookieDuration::ZERO
    };
    let cookie = Cookie::build((name, value.unwrap_or_default()))
        .path("/")
        .max_age(max_age)
        .same_site(SameSite::Lax)
        .http_only(true)
        .secure(secure)
        .build();

    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(header) => Some(header),
        Err(e) => {
            tracing::warn!(cookie = name, error = %e, "Skipping cookie with invalid value");
            None
        }
    }
}

/// A visitor's storage for the duration of one request.
pub struct Visitor {
    session: Session,
    id: Uuid,
    cache: SessionStorageCache,
    secure: bool,
    /// The loaded storage layers.
    pub storage: ClientStorage,
}

impl Visitor {
    /// Stable id of this visitor.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The visitor's tower-sessions session.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Persist every changed key.
    ///
    /// Returns the `Set-Cookie` headers for changed cookies.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Session` if the session store rejects the write.
    pub async fn save(mut self) -> Result<HeaderMap, AppError> {
        if self.storage.local.has_changes() {
            self.storage.local.take_changes();
            let entries: BTreeMap<String, String> = self
                .storage
                .local
                .iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect();
            self.session
                .insert(session_keys::LOCAL_STORAGE, entries)
                .await?;
        }

        if self.storage.session.has_changes() {
            self.storage.session.take_changes();
            let entries: BTreeMap<String, String> = self
                .storage
                .session
                .iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect();
            if entries.is_empty() {
                self.cache.invalidate(&self.id).await;
            } else {
                self.cache.insert(self.id, entries).await;
            }
        }

        let mut headers = HeaderMap::new();
        for (name, value) in self.storage.cookies.take_changes() {
            if let Some(header) = set_cookie_header(&name, value.as_deref(), self.secure) {
                headers.append(header::SET_COOKIE, header);
            }
        }
        Ok(headers)
    }
}

impl FromRequestParts<AppState> for Visitor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;

        let id = match session.get::<Uuid>(session_keys::VISITOR_ID).await? {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4();
                session.insert(session_keys::VISITOR_ID, id).await?;
                id
            }
        };

        let local = session
            .get::<BTreeMap<String, String>>(session_keys::LOCAL_STORAGE)
            .await?
            .unwrap_or_default();
        let cache = state.session_storage().clone();
        let volatile = cache.get(&id).await.unwrap_or_default();
        let cookies = recovery_cookies(&parts.headers);

        Ok(Self {
            session,
            id,
            cache,
            secure: state.config().is_secure(),
            storage: ClientStorage {
                session: MemoryStore::from_entries(volatile),
                local: MemoryStore::from_entries(local),
                cookies: MemoryStore::from_entries(cookies),
            },
        })
    }
}
