/// Authorization checks
///
/// Two roles exist. Admins may do everything; a member may only read their
/// own member record, children and payments.
///
/// # Example
///
/// ```
/// use trustledger_shared::auth::authorization::{require_admin, require_owner};
/// use trustledger_shared::auth::middleware::AuthContext;
/// use uuid::Uuid;
///
/// let member = AuthContext { user_id: 5, session_id: Uuid::new_v4(), is_admin: false };
///
/// assert!(require_admin(&member).is_err());
/// assert!(require_owner(&member, 5).is_ok());
/// assert!(require_owner(&member, 6).is_err());
/// ```

use super::middleware::AuthContext;

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// Endpoint is reserved for administrators
    #[error("Admin access required")]
    AdminRequired,

    /// Caller does not own the resource
    #[error("Not authorized to access this resource")]
    NotAuthorized,
}

/// Requires the caller to be an administrator
pub fn require_admin(auth: &AuthContext) -> Result<(), AuthzError> {
    if auth.is_admin {
        Ok(())
    } else {
        Err(AuthzError::AdminRequired)
    }
}

/// Requires the caller to be an administrator or the owning user
///
/// `owner_user_id` is the `user_id` of the member the resource belongs to.
pub fn require_owner(auth: &AuthContext, owner_user_id: i64) -> Result<(), AuthzError> {
    if auth.is_admin || auth.user_id == owner_user_id {
        Ok(())
    } else {
        Err(AuthzError::NotAuthorized)
    }
}
