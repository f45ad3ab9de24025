/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing
/// - [`jwt`]: Signed session tokens
/// - [`session`]: Session issuing, validation and revocation over a registry
/// - [`middleware`]: Axum middleware that authenticates requests
/// - [`authorization`]: Admin and ownership checks
///
/// # Security Features
///
/// - **Password Hashing**: Argon2id with 64 MB memory, 3 iterations
/// - **Session Tokens**: HS256 JWTs with a registry-backed `jti`, so logout
///   and password changes revoke tokens before they expire
///
/// # Example
///
/// ```no_run
/// use trustledger_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("member_password")?;
/// assert!(verify_password("member_password", &hash)?);
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod session;
