/// Session issuing and revocation
///
/// A session is a signed token ([`super::jwt`]) whose `jti` is recorded in a
/// [`SessionRegistry`]. Validation checks both; revocation deletes the
/// registry entry, so a revoked token is rejected even before it expires.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use chrono::Duration;
/// use trustledger_shared::auth::session::{JwtSessionStore, SessionStore};
/// use trustledger_shared::store::memory::MemoryStore;
///
/// # async fn example(user: trustledger_shared::models::user::User) -> Result<(), Box<dyn std::error::Error>> {
/// let registry = Arc::new(MemoryStore::new());
/// let sessions = JwtSessionStore::new("an-example-secret-of-at-least-32-bytes", Duration::hours(24), registry);
///
/// let issued = sessions.issue(&user).await?;
/// let claims = sessions.validate(&issued.token).await?;
/// sessions.revoke(claims.jti).await?;
/// assert!(sessions.validate(&issued.token).await.is_err());
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;
use uuid::Uuid;

use super::jwt::{create_token, validate_token, Claims, JwtError};
use crate::models::session::Session;
use crate::models::user::User;
use crate::store::StoreError;

/// Error type for session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Token(#[from] JwtError),

    /// Signature is fine but the session was logged out or superseded
    #[error("Session has been revoked")]
    Revoked,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Durable set of live session IDs
#[async_trait]
pub trait SessionRegistry: Send + Sync {
    async fn insert_session(&self, session: Session) -> Result<(), StoreError>;

    /// Whether an unexpired session with this ID exists
    async fn session_is_live(&self, jti: Uuid) -> Result<bool, StoreError>;

    async fn remove_session(&self, jti: Uuid) -> Result<(), StoreError>;

    /// Removes all sessions of a user except `keep`
    async fn remove_user_sessions(&self, user_id: i64, keep: Option<Uuid>) -> Result<u64, StoreError>;
}

/// A freshly issued session
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub jti: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Issue, validate and revoke session credentials
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn issue(&self, user: &User) -> Result<IssuedSession, SessionError>;

    async fn validate(&self, token: &str) -> Result<Claims, SessionError>;

    async fn revoke(&self, jti: Uuid) -> Result<(), SessionError>;

    /// Revokes every session of a user, optionally sparing one
    async fn revoke_user_sessions(&self, user_id: i64, keep: Option<Uuid>) -> Result<u64, SessionError>;
}

/// JWT-backed session store
pub struct JwtSessionStore {
    secret: String,
    ttl: Duration,
    registry: Arc<dyn SessionRegistry>,
}

impl JwtSessionStore {
    pub fn new(secret: impl Into<String>, ttl: Duration, registry: Arc<dyn SessionRegistry>) -> Self {
        Self {
            secret: secret.into(),
            ttl,
            registry,
        }
    }
}

#[async_trait]
impl SessionStore for JwtSessionStore {
    async fn issue(&self, user: &User) -> Result<IssuedSession, SessionError> {
        let claims = Claims::new(user.id, user.is_admin, self.ttl);
        let token = create_token(&claims, &self.secret)?;

        let session = Session {
            jti: claims.jti,
            user_id: user.id,
            issued_at: claims.issued_at(),
            expires_at: claims.expires_at(),
        };
        self.registry.insert_session(session).await?;

        debug!(user_id = user.id, jti = %claims.jti, "Session issued");

        Ok(IssuedSession {
            token,
            jti: claims.jti,
            expires_at: claims.expires_at(),
        })
    }

    async fn validate(&self, token: &str) -> Result<Claims, SessionError> {
        let claims = validate_token(token, &self.secret)?;

        if !self.registry.session_is_live(claims.jti).await? {
            return Err(SessionError::Revoked);
        }

        Ok(claims)
    }

    async fn revoke(&self, jti: Uuid) -> Result<(), SessionError> {
        self.registry.remove_session(jti).await?;
        debug!(jti = %jti, "Session revoked");
        Ok(())
    }

    async fn revoke_user_sessions(&self, user_id: i64, keep: Option<Uuid>) -> Result<u64, SessionError> {
        let removed = self.registry.remove_user_sessions(user_id, keep).await?;
        debug!(user_id, removed, "User sessions revoked");
        Ok(removed)
    }
}
