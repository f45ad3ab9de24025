/// Middleware modules for the API server
///
/// Session authentication lives in `trustledger_shared::auth::middleware`;
/// this crate only adds response hardening.

pub mod security;
