//! Session persistence for the SSE transport.
//!
//! A [`SessionStore`] maps session ids to [`SessionData`] across two variants:
//!
//! - a primary [`SessionBackend`] reachable over the network ([`RedisBackend`]),
//!   with explicit TTL support;
//! - a process-local [`MemoryBackend`] fallback with no TTL enforcement.
//!
//! The primary variant never surfaces errors. Any connectivity problem
//! (malformed connection string, refused connection, failed command) disables
//! it for the rest of the process lifetime, and from then on every operation is
//! served by the fallback. Data already written to the primary is not migrated.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Session lifetime in the primary variant.
pub const SESSION_TTL_SECS: u64 = 86_400;

/// Prefix for every key written to Redis.
pub const KEY_PREFIX: &str = "gaia-mcp:";

/// Upper bound on the initial Redis connection attempt.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Server-side record binding an SSE session to the caller's credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    /// Session id generated by the transport at connection time
    pub session_id: String,
    /// Gaia API key supplied by the client when connecting
    pub api_key: String,
}

impl SessionData {
    /// Create a session record.
    pub fn new(session_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            api_key: api_key.into(),
        }
    }
}

/// One storage variant for session data.
///
/// Implementations never fail the caller: `set` reports success as a boolean,
/// `get` reports any failure as absence, and `delete`/`quit` are best-effort.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Store `data` under `session_id`, expiring after `ttl_secs` where supported.
    async fn set(&self, session_id: &str, data: &SessionData, ttl_secs: u64) -> bool;

    /// Fetch the record for `session_id`, if any.
    async fn get(&self, session_id: &str) -> Option<SessionData>;

    /// Remove the record for `session_id`. Removing an unknown id is a no-op.
    async fn delete(&self, session_id: &str);

    /// Release any connection held by the backend. Idempotent.
    async fn quit(&self);

    /// Whether the backend is still able to serve requests.
    fn is_connected(&self) -> bool;
}

/// Process-local session map.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    sessions: DashMap<String, SessionData>,
}

impl MemoryBackend {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no records are held.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionBackend for MemoryBackend {
    async fn set(&self, session_id: &str, data: &SessionData, _ttl_secs: u64) -> bool {
        self.sessions.insert(session_id.to_string(), data.clone());
        true
    }

    async fn get(&self, session_id: &str) -> Option<SessionData> {
        self.sessions.get(session_id).map(|entry| entry.value().clone())
    }

    async fn delete(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    async fn quit(&self) {}

    fn is_connected(&self) -> bool {
        true
    }
}

/// Redis-backed session storage.
///
/// Holds at most one multiplexed connection. Once the connection is dropped,
/// because of an error or an explicit [`quit`](SessionBackend::quit), it is
/// never re-established.
pub struct RedisBackend {
    key_prefix: String,
    connection: RwLock<Option<MultiplexedConnection>>,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("key_prefix", &self.key_prefix)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Whether `url` uses one of the accepted Redis URI schemes.
pub fn is_redis_url(url: &str) -> bool {
    url.starts_with("redis://") || url.starts_with("rediss://")
}

impl RedisBackend {
    /// Connect to Redis at `url`.
    ///
    /// Never fails: an unrecognized scheme, an unparsable URL, a refused
    /// connection or a connection attempt exceeding [`CONNECT_TIMEOUT`] all
    /// produce a backend that is already disabled.
    pub async fn connect(url: &str) -> Self {
        if !is_redis_url(url) {
            warn!(
                "Redis URL does not have a valid format. Expected redis:// or rediss://. \
                 Using in-memory storage."
            );
            return Self::disabled();
        }

        let client = match redis::Client::open(url) {
            Ok(client) => client,
            Err(e) => {
                error!(error = %e, "Failed to initialize Redis client");
                warn!("Falling back to in-memory session storage");
                return Self::disabled();
            }
        };

        match tokio::time::timeout(CONNECT_TIMEOUT, client.get_multiplexed_async_connection()).await
        {
            Ok(Ok(connection)) => {
                info!("Connected to Redis server");
                Self::with_connection(connection)
            }
            Ok(Err(e)) => {
                error!(error = %e, "Redis connection error");
                warn!("Falling back to in-memory session storage");
                Self::disabled()
            }
            Err(_) => {
                error!(
                    timeout_secs = CONNECT_TIMEOUT.as_secs(),
                    "Redis connection timed out"
                );
                warn!("Falling back to in-memory session storage");
                Self::disabled()
            }
        }
    }

    /// A backend with no connection. Every operation reports failure.
    pub fn disabled() -> Self {
        Self {
            key_prefix: KEY_PREFIX.to_string(),
            connection: RwLock::new(None),
        }
    }

    fn with_connection(connection: MultiplexedConnection) -> Self {
        Self {
            key_prefix: KEY_PREFIX.to_string(),
            connection: RwLock::new(Some(connection)),
        }
    }

    fn key(&self, session_id: &str) -> String {
        format!("{}{}", self.key_prefix, session_id)
    }

    fn current(&self) -> Option<MultiplexedConnection> {
        self.connection
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn take(&self) -> Option<MultiplexedConnection> {
        self.connection
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    /// Drop the connection for good after a runtime failure.
    fn disable(&self, err: &redis::RedisError) {
        if self.take().is_some() {
            error!(error = %err, "Redis connection error");
            warn!("Falling back to in-memory session storage");
        }
    }
}

#[async_trait]
impl SessionBackend for RedisBackend {
    async fn set(&self, session_id: &str, data: &SessionData, ttl_secs: u64) -> bool {
        let Some(mut connection) = self.current() else {
            return false;
        };

        let payload = match serde_json::to_string(data) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, session_id, "Failed to encode session data");
                return false;
            }
        };

        let key = self.key(session_id);
        let result: redis::RedisResult<()> =
            connection.set_ex(key.as_str(), payload, ttl_secs).await;
        match result {
            Ok(()) => {
                debug!(session_id, "Session saved to Redis");
                true
            }
            Err(e) => {
                error!(error = %e, session_id, "Failed to save session to Redis");
                self.disable(&e);
                false
            }
        }
    }

    async fn get(&self, session_id: &str) -> Option<SessionData> {
        let mut connection = self.current()?;

        let key = self.key(session_id);
        let result: redis::RedisResult<Option<String>> = connection.get(key.as_str()).await;
        match result {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(data) => Some(data),
                Err(e) => {
                    error!(error = %e, session_id, "Stored session data is not valid JSON");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                error!(error = %e, session_id, "Failed to get session from Redis");
                self.disable(&e);
                None
            }
        }
    }

    async fn delete(&self, session_id: &str) {
        let Some(mut connection) = self.current() else {
            return;
        };

        let key = self.key(session_id);
        let result: redis::RedisResult<()> = connection.del(key.as_str()).await;
        match result {
            Ok(()) => debug!(session_id, "Session deleted from Redis"),
            Err(e) => {
                error!(error = %e, session_id, "Failed to delete session from Redis");
                self.disable(&e);
            }
        }
    }

    async fn quit(&self) {
        if let Some(mut connection) = self.take() {
            info!("Closing Redis connection");
            let result: redis::RedisResult<()> =
                redis::cmd("QUIT").query_async(&mut connection).await;
            if let Err(e) = result {
                debug!(error = %e, "Redis QUIT failed; dropping connection");
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connection
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }
}

/// Session persistence with a primary variant and an in-memory fallback.
///
/// Callers never need to know which variant served a request.
pub struct SessionStore {
    primary: Option<Arc<dyn SessionBackend>>,
    fallback: MemoryBackend,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("primary_connected", &self.is_primary_connected())
            .field("fallback_len", &self.fallback.len())
            .finish()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl SessionStore {
    /// A store with no primary variant.
    pub fn in_memory() -> Self {
        Self {
            primary: None,
            fallback: MemoryBackend::new(),
        }
    }

    /// A store backed by `primary`, with the in-memory map as fallback.
    pub fn with_primary(primary: Arc<dyn SessionBackend>) -> Self {
        Self {
            primary: Some(primary),
            fallback: MemoryBackend::new(),
        }
    }

    /// Build a store from an optional connection string.
    ///
    /// `None` or an empty string yields a fallback-only store.
    pub async fn connect(url: Option<&str>) -> Self {
        match url.map(str::trim).filter(|url| !url.is_empty()) {
            Some(url) => Self::with_primary(Arc::new(RedisBackend::connect(url).await)),
            None => {
                info!("Redis not configured, using in-memory session storage");
                Self::in_memory()
            }
        }
    }

    /// Whether a primary variant is configured and still enabled.
    pub fn is_primary_connected(&self) -> bool {
        self.primary
            .as_ref()
            .is_some_and(|primary| primary.is_connected())
    }

    /// Persist `data` for `session_id`.
    ///
    /// Writes to the primary variant with [`SESSION_TTL_SECS`]; when that is
    /// missing or fails, the record is kept in the fallback map instead.
    pub async fn save(&self, session_id: &str, data: SessionData) {
        if let Some(primary) = &self.primary {
            if primary.set(session_id, &data, SESSION_TTL_SECS).await {
                return;
            }
        }
        self.fallback.set(session_id, &data, SESSION_TTL_SECS).await;
    }

    /// Look up the record for `session_id`, consulting the primary first.
    pub async fn load(&self, session_id: &str) -> Option<SessionData> {
        if let Some(primary) = &self.primary {
            if let Some(data) = primary.get(session_id).await {
                return Some(data);
            }
        }
        self.fallback.get(session_id).await
    }

    /// Remove `session_id` from both variants.
    pub async fn remove(&self, session_id: &str) {
        if let Some(primary) = &self.primary {
            primary.delete(session_id).await;
        }
        self.fallback.delete(session_id).await;
    }

    /// Release the primary variant's connection. Idempotent.
    pub async fn quit(&self) {
        if let Some(primary) = &self.primary {
            primary.quit().await;
        }
    }
}
