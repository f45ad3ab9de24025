/// Authentication middleware for Axum
///
/// Validates the `Authorization: Bearer <token>` header against the
/// [`SessionStore`] and adds an [`AuthContext`] to the request extensions.
/// Both the signature and the session registry entry must be valid; a
/// logged-out token is rejected with 401 like an expired one.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use axum::{middleware, routing::get, Extension, Router};
/// use trustledger_shared::auth::middleware::{create_session_middleware, AuthContext};
/// use trustledger_shared::auth::session::SessionStore;
///
/// async fn whoami(Extension(auth): Extension<AuthContext>) -> String {
///     format!("user {} (admin: {})", auth.user_id, auth.is_admin)
/// }
///
/// fn router(sessions: Arc<dyn SessionStore>) -> Router {
///     Router::new()
///         .route("/whoami", get(whoami))
///         .layer(middleware::from_fn(create_session_middleware(sessions)))
/// }
/// ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error};
use uuid::Uuid;

use super::jwt::JwtError;
use super::session::{SessionError, SessionStore};

/// Authenticated caller, available to handlers as `Extension<AuthContext>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: i64,

    /// Session ID (`jti`) of the presented token
    pub session_id: Uuid,

    pub is_admin: bool,
}

/// Error type for authentication middleware
#[derive(Debug)]
pub enum AuthError {
    /// Missing authorization header
    MissingCredentials,

    /// Header present but not `Bearer <token>`
    InvalidFormat(String),

    /// Bad signature, expired or revoked
    InvalidToken(String),

    /// Session registry unavailable
    StoreError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AuthError::MissingCredentials => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Authentication credentials were not provided.".to_string(),
            ),
            AuthError::InvalidFormat(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AuthError::InvalidToken(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            AuthError::StoreError(msg) => {
                error!(error = %msg, "Session lookup failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

impl From<SessionError> for AuthError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Token(JwtError::Expired) => AuthError::InvalidToken("Token expired".to_string()),
            SessionError::Token(e) => AuthError::InvalidToken(e.to_string()),
            SessionError::Revoked => AuthError::InvalidToken("Session has been revoked".to_string()),
            SessionError::Store(e) => AuthError::StoreError(e.to_string()),
        }
    }
}

/// Extracts the bearer token from a request
pub fn bearer_token(req: &Request) -> Result<&str, AuthError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))
}

/// Session authentication middleware
pub async fn session_auth_middleware(
    sessions: Arc<dyn SessionStore>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    // Owned so no borrow of the request is held across the await
    let token = bearer_token(&req)?.to_string();
    let claims = sessions.validate(&token).await?;

    debug!(user_id = claims.sub, jti = %claims.jti, "Request authenticated");

    req.extensions_mut().insert(AuthContext {
        user_id: claims.sub,
        session_id: claims.jti,
        is_admin: claims.admin,
    });

    Ok(next.run(req).await)
}

type MiddlewareFuture = Pin<Box<dyn Future<Output = Result<Response, AuthError>> + Send>>;

/// Captures the session store and returns a middleware function for
/// `axum::middleware::from_fn`
pub fn create_session_middleware(
    sessions: Arc<dyn SessionStore>,
) -> impl Fn(Request, Next) -> MiddlewareFuture + Clone {
    move |req, next| {
        let sessions = sessions.clone();
        Box::pin(session_auth_middleware(sessions, req, next))
    }
}
