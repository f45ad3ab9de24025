//! # TrustLedger Shared Library
//!
//! Types, persistence and business logic of the trust's membership and
//! payments ledger, used by the API server.
//!
//! ## Module Organization
//!
//! - `ledger`: Member codes, balance reconciliation, payment references and
//!   the use cases built on them
//! - `models`: Record types and their SQL
//! - `store`: The `RecordStore` boundary with PostgreSQL and in-memory stores
//! - `auth`: Password hashing, sessions, middleware and authorization
//! - `db`: Connection pool and migrations

pub mod auth;
pub mod db;
pub mod ledger;
pub mod models;
pub mod store;

/// Current version of the TrustLedger shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
