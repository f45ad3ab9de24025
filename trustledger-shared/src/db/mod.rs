/// Database layer for TrustLedger
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool with a startup health check
/// - `migrations`: Embedded migration runner
///
/// Record types and their queries are in the `models` module; the
/// transactional units of work that combine them are in `store::postgres`.

pub mod migrations;
pub mod pool;
