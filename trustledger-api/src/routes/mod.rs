/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Login, logout and password management
/// - `members`: Member registration, profiles and statistics
/// - `children`: Children of members
/// - `payments`: Payment recording, history and statistics
/// - `bank_accounts`: The trust's bank accounts
/// - `dashboard`: Admin dashboard aggregates

pub mod auth;
pub mod bank_accounts;
pub mod children;
pub mod dashboard;
pub mod health;
pub mod members;
pub mod payments;

use serde::{Deserialize, Deserializer, Serialize};

/// Deserializes a field that may be absent, null or set
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`:
/// absent gives `None`, `null` gives `Some(None)`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Plain `{ "message": ... }` acknowledgement
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
