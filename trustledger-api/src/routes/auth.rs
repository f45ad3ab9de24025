/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /api/auth/login` - Login with phone (or admin username) and password
/// - `POST /api/auth/logout` - Revoke the current session
/// - `POST /api/auth/change-password` - Change own password
/// - `POST /api/auth/reset-password` - Admin: reset a member's password to their phone

use crate::{
    app::AppState,
    error::{ApiResult, ValidJson},
    routes::MessageResponse,
};
use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use trustledger_shared::auth::{authorization::require_admin, middleware::AuthContext};
use validator::Validate;

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Member phone number, or the admin username
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub phone: String,

    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Session token for `Authorization: Bearer <token>`
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user_id: i64,

    /// Normalized username
    pub phone: String,
    pub is_admin: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_id: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_code: Option<String>,

    /// Member name, or the username for accounts without a member profile
    pub name: String,
    pub password_reset_required: bool,
}

/// Change password request
#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub old_password: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

/// Admin password reset request
#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(range(min = 1, message = "Enter a valid member id."))]
    pub member_id: i64,
}

/// Admin password reset response
#[derive(Debug, Serialize, Deserialize)]
pub struct ResetPasswordResponse {
    pub message: String,

    /// The member's phone number
    pub temporary_password: String,
    pub member_id: i64,
}

/// Login and open a session
///
/// # Endpoint
///
/// ```text
/// POST /api/auth/login
/// Content-Type: application/json
///
/// { "phone": "9876543210", "password": "initial-pass" }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Unknown user, wrong password or deactivated member
/// - `422 Unprocessable Entity`: Blank fields
pub async fn login(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let (user, member) = state.ledger.authenticate(&req.phone, &req.password).await?;
    let session = state.sessions.issue(&user).await?;

    info!(user_id = user.id, is_admin = user.is_admin, jti = %session.jti, "User logged in");

    let response = match member {
        Some(member) => LoginResponse {
            token: session.token,
            expires_at: session.expires_at,
            user_id: user.id,
            phone: user.username,
            is_admin: user.is_admin,
            member_id: Some(member.id),
            member_code: Some(member.member_code),
            name: member.name,
            password_reset_required: member.password_reset_required,
        },
        None => LoginResponse {
            token: session.token,
            expires_at: session.expires_at,
            user_id: user.id,
            name: user.username.clone(),
            phone: user.username,
            is_admin: user.is_admin,
            member_id: None,
            member_code: None,
            password_reset_required: false,
        },
    };

    Ok(Json(response))
}

/// Revoke the session the request was made with
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<MessageResponse>> {
    state.sessions.revoke(auth.session_id).await?;

    info!(user_id = auth.user_id, jti = %auth.session_id, "User logged out");

    Ok(Json(MessageResponse::new("Successfully logged out")))
}

/// Change the caller's password
///
/// Other sessions of the user are revoked; the current one stays valid.
///
/// # Errors
///
/// - `400 Bad Request`: Old password is incorrect
/// - `422 Unprocessable Entity`: New password too short
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidJson(req): ValidJson<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .ledger
        .change_password(auth.user_id, &req.old_password, &req.new_password)
        .await?;

    let revoked = state
        .sessions
        .revoke_user_sessions(auth.user_id, Some(auth.session_id))
        .await?;
    info!(user_id = auth.user_id, revoked, "Other sessions revoked after password change");

    Ok(Json(MessageResponse::new("Password changed successfully")))
}

/// Reset a member's password to their phone number (admin only)
///
/// Every session of the member is revoked and they must change the
/// password after logging in again.
pub async fn reset_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidJson(req): ValidJson<ResetPasswordRequest>,
) -> ApiResult<Json<ResetPasswordResponse>> {
    require_admin(&auth)?;

    let reset = state.ledger.reset_member_password(req.member_id).await?;
    state.sessions.revoke_user_sessions(reset.member.user_id, None).await?;

    Ok(Json(ResetPasswordResponse {
        message: format!("Password reset successfully for {}", reset.member.name),
        temporary_password: reset.temporary_password,
        member_id: reset.member.id,
    }))
}
