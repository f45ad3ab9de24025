/// Balance reconciliation
///
/// A member's outstanding dues are always derived, never stored
/// independently: `amount_due = annual_tax - amount_paid`. All arithmetic
/// uses [`rust_decimal::Decimal`], so there is no rounding drift.
///
/// # Example
///
/// ```
/// use rust_decimal::Decimal;
/// use trustledger_shared::ledger::balance::{dues_status, outstanding, DuesStatus};
///
/// let due = outstanding(Decimal::new(2000000, 2), Decimal::new(1500000, 2));
/// assert_eq!(due, Decimal::new(500000, 2));
/// assert_eq!(dues_status(Decimal::new(1500000, 2), due), DuesStatus::Partial);
/// ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::member::Member;

/// Derived payment standing of a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuesStatus {
    /// Nothing outstanding (due is zero or negative)
    Paid,

    /// Something paid, something still due
    Partial,

    /// Nothing paid yet
    Pending,
}

impl DuesStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuesStatus::Paid => "Paid",
            DuesStatus::Partial => "Partial",
            DuesStatus::Pending => "Pending",
        }
    }
}

/// Outstanding amount for the given tax and cumulative payments
///
/// May be negative when a member has overpaid.
pub fn outstanding(annual_tax: Decimal, amount_paid: Decimal) -> Decimal {
    annual_tax - amount_paid
}

/// Payment standing from paid and due amounts
pub fn dues_status(amount_paid: Decimal, amount_due: Decimal) -> DuesStatus {
    if amount_due <= Decimal::ZERO {
        DuesStatus::Paid
    } else if amount_paid > Decimal::ZERO {
        DuesStatus::Partial
    } else {
        DuesStatus::Pending
    }
}

/// Recomputes `amount_due` on a member in place
///
/// Called on every member save and after every completed payment insert.
pub fn reconcile(member: &mut Member) {
    member.amount_due = outstanding(member.annual_tax, member.amount_paid);
}

/// Adds a completed payment to a member's running total and reconciles
pub fn credit(member: &mut Member, amount: Decimal) {
    member.amount_paid += amount;
    reconcile(member);
}
