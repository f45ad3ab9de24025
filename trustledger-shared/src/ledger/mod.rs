/// Member identity and balance ledger
///
/// The core of TrustLedger. Everything around it is CRUD glue.
///
/// # Modules
///
/// - [`identity`]: `KT-NNNN` member code allocation
/// - [`balance`]: `amount_due = annual_tax - amount_paid` reconciliation
/// - [`reference`]: payment reference generation
/// - [`phone`]: phone normalization for usernames
/// - [`service`]: the use cases (register member, record payment, ...)
///   that validate input and drive the [`RecordStore`](crate::store::RecordStore)

pub mod balance;
pub mod identity;
pub mod phone;
pub mod reference;
pub mod service;

use serde::Serialize;

use crate::auth::password::PasswordError;
use crate::store::StoreError;

/// One failed field check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Error type for ledger use cases
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Input rejected before anything was written
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0} not found")]
    NotFound(&'static str),

    /// A unique field already holds this value
    #[error("A record with this {field} already exists")]
    Conflict { field: &'static str },

    /// Unknown username or wrong password on login
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Well-formed request that cannot be honoured (e.g. wrong old password)
    #[error("{0}")]
    BadRequest(String),

    #[error("Store failure: {0}")]
    Store(String),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(entity) => LedgerError::NotFound(entity),
            StoreError::Conflict { field } => LedgerError::Conflict { field },
            StoreError::Backend(message) => LedgerError::Store(message),
        }
    }
}

/// Collects field errors and turns them into a [`LedgerError::Validation`]
#[derive(Debug, Default)]
pub(crate) struct Checks {
    errors: Vec<FieldError>,
}

impl Checks {
    pub(crate) fn fail(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub(crate) fn require(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.fail(field, "This field may not be blank.");
        }
    }

    pub(crate) fn finish(self) -> Result<(), LedgerError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(LedgerError::Validation(self.errors))
        }
    }
}
