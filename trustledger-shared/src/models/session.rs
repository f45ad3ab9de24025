/// Session registry rows
///
/// A signed session token is only honoured while its `jti` has a live row
/// here. Logout deletes the row; password changes delete every row of the
/// user (optionally sparing the current one).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub jti: Uuid,
    pub user_id: i64,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    pub async fn insert<'e, E: PgExecutor<'e>>(executor: E, session: &Session) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO sessions (jti, user_id, issued_at, expires_at) VALUES ($1, $2, $3, $4)")
            .bind(session.jti)
            .bind(session.user_id)
            .bind(session.issued_at)
            .bind(session.expires_at)
            .execute(executor)
            .await?;

        Ok(())
    }

    /// Whether an unexpired session with this jti exists
    pub async fn is_live<'e, E: PgExecutor<'e>>(executor: E, jti: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM sessions WHERE jti = $1 AND expires_at > NOW())",
        )
        .bind(jti)
        .fetch_one(executor)
        .await
    }

    pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, jti: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE jti = $1")
            .bind(jti)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes all sessions of a user except `keep`; returns how many went
    pub async fn delete_for_user<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: i64,
        keep: Option<Uuid>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1 AND ($2::uuid IS NULL OR jti <> $2)")
            .bind(user_id)
            .bind(keep)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }

    /// Removes expired rows
    pub async fn purge_expired<'e, E: PgExecutor<'e>>(executor: E) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW()")
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}
