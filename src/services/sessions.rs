//! Conversation session persistence.
//!
//! A session is the (state, context) pair of one identity, carried between
//! turns. Every save bumps `version`; a save that carries a stale version is
//! rejected with `Error::Conflict`.

use crate::database::DbPool;
use crate::error::{Error, Result};
use crate::queries;
use crate::services::conversation::context::SessionContext;
use crate::services::conversation::state_machine::{HOME, State};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scc::hash_map::Entry;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub identity: String,
    pub state: State,
    pub context: SessionContext,
    /// Version the session was loaded at. Zero for a session never saved.
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// A fresh session at HOME with an empty context.
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            state: HOME,
            context: SessionContext::default(),
            version: 0,
            updated_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, identity: &str) -> Result<Option<Session>>;

    /// Persists `session` if the stored version still equals
    /// `session.version`. Returns the new version.
    async fn save(&self, session: &Session) -> Result<i64>;
}

/// Session store held in memory.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: scc::HashMap<String, Session>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn stale(identity: &str, expected: i64) -> Error {
    Error::Conflict(format!(
        "Session for {} changed since version {}",
        identity, expected
    ))
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, identity: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read_async(identity, |_, s| s.clone()).await)
    }

    async fn save(&self, session: &Session) -> Result<i64> {
        let mut stored = session.clone();
        stored.version = session.version + 1;
        stored.updated_at = Utc::now();
        let version = stored.version;

        match self.sessions.entry_async(session.identity.clone()).await {
            Entry::Occupied(mut entry) => {
                if entry.get().version != session.version {
                    return Err(stale(&session.identity, session.version));
                }
                *entry.get_mut() = stored;
            }
            Entry::Vacant(entry) => {
                if session.version != 0 {
                    return Err(stale(&session.identity, session.version));
                }
                entry.insert_entry(stored);
            }
        }
        Ok(version)
    }
}

/// Session store backed by the `conversation_sessions` table.
pub struct PgSessionStore {
    pool: DbPool,
}

impl PgSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn load(&self, identity: &str) -> Result<Option<Session>> {
        let mut conn = self.pool.acquire().await?;
        let Some(row) = queries::sessions::get_session(&mut conn, identity).await? else {
            return Ok(None);
        };

        let state = row
            .state
            .parse::<State>()
            .map_err(|_| Error::Internal(format!("Unknown stored state '{}'", row.state)))?;
        let context: SessionContext = serde_json::from_value(row.context)?;

        Ok(Some(Session {
            identity: row.identity,
            state,
            context,
            version: row.version,
            updated_at: row.updated_at,
        }))
    }

    async fn save(&self, session: &Session) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        let context = serde_json::to_value(&session.context)?;
        let state = session.state.to_string();

        let saved = if session.version == 0 {
            queries::sessions::insert_session(&mut conn, &session.identity, &state, &context).await?
        } else {
            queries::sessions::update_session(
                &mut conn,
                &session.identity,
                &state,
                &context,
                session.version,
            )
            .await?
        };

        saved.ok_or_else(|| stale(&session.identity, session.version))
    }
}
