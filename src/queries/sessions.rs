use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::DbConn;

/// Row of the `conversation_sessions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRow {
    pub identity: String,
    pub state: String,
    pub context: Value,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

/// Gets the session of one identity. The session may not exist.
pub async fn get_session(conn: &mut DbConn, identity: &str) -> Result<Option<SessionRow>> {
    let row = sqlx::query_as::<_, SessionRow>(
        r#"
        SELECT identity, state, context, version, updated_at
        FROM conversation_sessions
        WHERE identity = $1
        "#,
    )
    .bind(identity)
    .fetch_optional(conn)
    .await
    .map_err(Error::Sqlx)?;

    Ok(row)
}

/// Inserts the first version of a session.
///
/// Returns `None` when a row for the identity already exists.
pub async fn insert_session(
    conn: &mut DbConn,
    identity: &str,
    state: &str,
    context: &Value,
) -> Result<Option<i64>> {
    let version = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO conversation_sessions (identity, state, context, version)
        VALUES ($1, $2, $3, 1)
        ON CONFLICT (identity) DO NOTHING
        RETURNING version
        "#,
    )
    .bind(identity)
    .bind(state)
    .bind(context)
    .fetch_optional(conn)
    .await
    .map_err(Error::Sqlx)?;

    Ok(version)
}

/// Updates a session if it is still at `expected_version`.
///
/// Returns the new version, or `None` when another writer got there first.
pub async fn update_session(
    conn: &mut DbConn,
    identity: &str,
    state: &str,
    context: &Value,
    expected_version: i64,
) -> Result<Option<i64>> {
    let version = sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE conversation_sessions
        SET state = $2, context = $3, version = version + 1, updated_at = NOW()
        WHERE identity = $1 AND version = $4
        RETURNING version
        "#,
    )
    .bind(identity)
    .bind(state)
    .bind(context)
    .bind(expected_version)
    .fetch_optional(conn)
    .await
    .map_err(Error::Sqlx)?;

    Ok(version)
}
