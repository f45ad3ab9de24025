/// Record store abstraction
///
/// The ledger talks to persistence only through [`RecordStore`]. Two
/// implementations exist:
///
/// - [`postgres::PgStore`]: production store backed by sqlx transactions
/// - [`memory::MemoryStore`]: every table behind one async mutex, used for
///   development and by the test suites
///
/// Multi-step writes (registering a member with its code and children,
/// recording a payment and crediting the member) are single units of work
/// in both stores. Member code allocation is serialized: PostgreSQL takes a
/// transaction-scoped advisory lock, the memory store holds its mutex.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use trustledger_shared::store::{memory::MemoryStore, RecordStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
/// store.ping().await?;
/// assert!(store.find_member(1).await?.is_none());
/// # Ok(())
/// # }
/// ```

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::ledger::identity::IdentityAllocator;
use crate::models::bank_account::{
    BankAccount, BankAccountCounts, BankAccountPage, BankAccountQuery, NewBankAccount, UpdateBankAccount,
};
use crate::models::child::{Child, NewChild, UpdateChild};
use crate::models::member::{Member, MemberFilter, MemberRegistration, MemberStatistics, UpdateMember};
use crate::models::payment::{NewPayment, Payment, PaymentFilter, PaymentStatistics, UpdatePayment};
use crate::models::user::{NewUser, User};

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The addressed record does not exist
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A unique field already holds this value
    #[error("A record with this {field} already exists")]
    Conflict { field: &'static str },

    /// The backend failed (connection, query, pool timeout)
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Maps a unique constraint name to the field it protects
fn conflict_field(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("users_username_key") => "username",
        Some("members_phone_key") => "phone",
        Some("members_member_code_key") => "member_code",
        Some("members_user_id_key") => "user_id",
        Some("payments_reference_number_key") => "reference_number",
        Some("bank_accounts_account_no_key") => "account_no",
        _ => "key",
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("Record"),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::Conflict {
                field: conflict_field(db.constraint()),
            },
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                StoreError::NotFound("Referenced record")
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Persistence boundary of the ledger
///
/// Lookups return `Ok(None)` for missing rows; mutations of a missing row
/// return [`StoreError::NotFound`].
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Short backend name for health output
    fn backend(&self) -> &'static str;

    /// Verifies the backend is reachable
    async fn ping(&self) -> Result<(), StoreError>;

    // Users

    async fn create_user(&self, data: NewUser) -> Result<User, StoreError>;

    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn set_password(&self, user_id: i64, password_hash: &str) -> Result<(), StoreError>;

    async fn touch_last_login(&self, user_id: i64) -> Result<(), StoreError>;

    // Members

    /// Creates the login account, allocates the member code, inserts the
    /// member and its children as one unit of work
    ///
    /// The member's phone becomes the account's username.
    async fn register_member(
        &self,
        registration: MemberRegistration,
        codes: &IdentityAllocator,
    ) -> Result<(Member, Vec<Child>), StoreError>;

    async fn find_member(&self, id: i64) -> Result<Option<Member>, StoreError>;

    async fn find_member_by_user(&self, user_id: i64) -> Result<Option<Member>, StoreError>;

    /// Members ordered by name
    async fn list_members(&self, filter: &MemberFilter) -> Result<Vec<Member>, StoreError>;

    /// Applies the changes under the member's write lock and reconciles
    async fn update_member(&self, id: i64, changes: UpdateMember) -> Result<Member, StoreError>;

    async fn set_password_reset_required(&self, member_id: i64, required: bool) -> Result<(), StoreError>;

    async fn member_statistics(&self) -> Result<MemberStatistics, StoreError>;

    /// Most recently created active members, newest first
    async fn recent_members(&self, limit: i64) -> Result<Vec<Member>, StoreError>;

    // Children

    async fn add_child(&self, member_id: i64, data: NewChild) -> Result<Child, StoreError>;

    async fn find_child(&self, id: i64) -> Result<Option<Child>, StoreError>;

    /// Children ordered by date of birth
    async fn list_children(&self, member_id: Option<i64>) -> Result<Vec<Child>, StoreError>;

    async fn update_child(&self, id: i64, changes: UpdateChild) -> Result<Child, StoreError>;

    async fn delete_child(&self, id: i64) -> Result<(), StoreError>;

    // Payments

    /// Inserts the payment and, when it is completed, credits the member in
    /// the same unit of work
    ///
    /// Returns the payment and the member as persisted afterwards.
    async fn record_payment(&self, data: NewPayment) -> Result<(Payment, Member), StoreError>;

    async fn find_payment(&self, id: i64) -> Result<Option<Payment>, StoreError>;

    /// Payments newest first
    async fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, StoreError>;

    /// Edits a payment without touching the member's balance
    async fn update_payment(&self, id: i64, changes: UpdatePayment) -> Result<Payment, StoreError>;

    /// Completed-payment aggregates plus total outstanding dues
    async fn payment_statistics(&self, month_start: NaiveDate) -> Result<PaymentStatistics, StoreError>;

    // Bank accounts

    async fn create_bank_account(&self, data: NewBankAccount) -> Result<BankAccount, StoreError>;

    async fn find_bank_account(&self, id: i64) -> Result<Option<BankAccount>, StoreError>;

    async fn list_bank_accounts(&self, query: &BankAccountQuery) -> Result<BankAccountPage, StoreError>;

    async fn update_bank_account(&self, id: i64, changes: UpdateBankAccount) -> Result<BankAccount, StoreError>;

    async fn delete_bank_account(&self, id: i64) -> Result<(), StoreError>;

    async fn bank_account_counts(&self) -> Result<BankAccountCounts, StoreError>;
}
