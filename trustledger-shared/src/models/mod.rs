/// Database models for TrustLedger
///
/// This module contains the record types and their SQL operations. Each
/// operation is generic over [`sqlx::PgExecutor`], so it runs the same on a
/// pool or inside a transaction.
///
/// # Models
///
/// - `user`: Login accounts (admins and members)
/// - `member`: Family heads with their balance fields
/// - `child`: Children recorded under a member
/// - `payment`: Contributions, joined with the paying member on read
/// - `bank_account`: Accounts the trust collects into
/// - `session`: Registry of live session tokens
///
/// # Example
///
/// ```no_run
/// use trustledger_shared::models::member::{Member, MemberFilter};
/// use trustledger_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let active = Member::list(&pool, &MemberFilter {
///     is_active: Some(true),
///     ..Default::default()
/// }).await?;
/// # Ok(())
/// # }
/// ```

pub mod bank_account;
pub mod child;
pub mod member;
pub mod payment;
pub mod session;
pub mod user;

/// `ILIKE` pattern matching `text` anywhere, with `\`, `%` and `_` taken literally
pub(crate) fn contains_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
