/// Payment model and database operations
///
/// A payment is a contribution made by a member. Only the insert path of a
/// `completed` payment credits the member's balance; later edits to a
/// payment (amount, status, method, notes) never touch `amount_paid`.
///
/// Rows are always read joined with their member so that listings can show
/// the member's name and phone without a second lookup.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE payment_method AS ENUM ('UPI', 'Bank Transfer', 'Cash', 'Cheque', 'Card');
/// CREATE TYPE payment_status AS ENUM ('pending', 'completed', 'failed', 'cancelled');
///
/// CREATE TABLE payments (
///     id BIGSERIAL PRIMARY KEY,
///     member_id BIGINT NOT NULL REFERENCES members(id) ON DELETE CASCADE,
///     amount NUMERIC(10, 2) NOT NULL CHECK (amount > 0),
///     payment_method payment_method NOT NULL,
///     reference_number VARCHAR(100) NOT NULL UNIQUE,
///     status payment_status NOT NULL DEFAULT 'completed',
///     payment_date DATE NOT NULL DEFAULT CURRENT_DATE,
///     notes TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;

/// How a payment was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method")]
pub enum PaymentMethod {
    #[serde(rename = "UPI")]
    #[sqlx(rename = "UPI")]
    Upi,

    #[serde(rename = "Bank Transfer")]
    #[sqlx(rename = "Bank Transfer")]
    BankTransfer,

    Cash,

    Cheque,

    Card,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Upi => "UPI",
            PaymentMethod::BankTransfer => "Bank Transfer",
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Cheque => "Cheque",
            PaymentMethod::Card => "Card",
        }
    }
}

/// Payment lifecycle status
///
/// Transitions are free-form; only a payment recorded as `Completed` on
/// creation affects the member's balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

/// Payment model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: i64,

    /// Paying member
    pub member_id: i64,

    /// Member's name at read time
    pub member_name: String,

    /// Member's phone at read time
    pub member_phone: String,

    /// Positive, at most two decimal places
    pub amount: Decimal,

    pub payment_method: PaymentMethod,

    /// Globally unique reference (`TXN...` when generated)
    pub reference_number: String,

    pub status: PaymentStatus,

    /// Set on creation, never edited
    pub payment_date: NaiveDate,

    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Input for recording a payment
///
/// The reference is already resolved and the status already decided by the
/// payment recorder.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub member_id: i64,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub reference_number: String,
    pub status: PaymentStatus,
    pub payment_date: NaiveDate,
    pub notes: Option<String>,
}

/// Admin edit of an existing payment
///
/// Has no effect on the member's balance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePayment {
    pub amount: Option<Decimal>,
    pub payment_method: Option<PaymentMethod>,
    pub status: Option<PaymentStatus>,

    /// Use Some(None) to clear
    pub notes: Option<Option<String>>,
}

impl UpdatePayment {
    pub fn apply(self, payment: &mut Payment) {
        if let Some(amount) = self.amount {
            payment.amount = amount;
        }
        if let Some(method) = self.payment_method {
            payment.payment_method = method;
        }
        if let Some(status) = self.status {
            payment.status = status;
        }
        if let Some(notes) = self.notes {
            payment.notes = notes;
        }
    }
}

/// Filter for listing payments
#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub status: Option<PaymentStatus>,
    pub payment_method: Option<PaymentMethod>,
    pub member_id: Option<i64>,

    /// Case-insensitive substring over member name, member phone and reference
    pub search: Option<String>,

    /// Maximum number of rows, newest first
    pub limit: Option<i64>,
}

impl PaymentFilter {
    /// Whether a payment passes this filter (limit not considered)
    pub fn matches(&self, payment: &Payment) -> bool {
        if self.status.is_some_and(|s| s != payment.status) {
            return false;
        }
        if self.payment_method.is_some_and(|m| m != payment.payment_method) {
            return false;
        }
        if self.member_id.is_some_and(|id| id != payment.member_id) {
            return false;
        }
        if let Some(ref search) = self.search {
            let needle = search.to_lowercase();
            let hit = payment.member_name.to_lowercase().contains(&needle)
                || payment.member_phone.contains(&needle)
                || payment.reference_number.to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }
        true
    }
}

/// Aggregates for the payment statistics view
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentStatistics {
    /// Number of completed payments
    pub total_payments: i64,

    /// Sum of completed payments
    pub total_amount_collected: Decimal,

    /// Sum of every member's outstanding dues
    pub total_pending: Decimal,

    /// Completed payments dated in the current month
    pub payments_this_month: i64,

    /// Sum of completed payments dated in the current month
    pub amount_this_month: Decimal,
}

const PAYMENT_COLUMNS: &str = "p.id, p.member_id, m.name AS member_name, m.phone AS member_phone, \
     p.amount, p.payment_method, p.reference_number, p.status, p.payment_date, p.notes, \
     p.created_at, p.updated_at";

impl Payment {
    /// Inserts a payment
    ///
    /// Fails with a unique violation on `payments_reference_number_key` when
    /// the reference is already used.
    pub async fn insert<'e, E: PgExecutor<'e>>(executor: E, data: &NewPayment) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Payment>(&format!(
            r#"
            WITH p AS (
                INSERT INTO payments (member_id, amount, payment_method, reference_number,
                                      status, payment_date, notes)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
            )
            SELECT {}
            FROM p JOIN members m ON m.id = p.member_id
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(data.member_id)
        .bind(data.amount)
        .bind(data.payment_method)
        .bind(&data.reference_number)
        .bind(data.status)
        .bind(data.payment_date)
        .bind(&data.notes)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Payment>(&format!(
            "SELECT {} FROM payments p JOIN members m ON m.id = p.member_id WHERE p.id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Lists payments newest first
    pub async fn list<'e, E: PgExecutor<'e>>(executor: E, filter: &PaymentFilter) -> Result<Vec<Self>, sqlx::Error> {
        let pattern = filter.search.as_deref().map(super::contains_pattern);

        sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {}
            FROM payments p JOIN members m ON m.id = p.member_id
            WHERE ($1::payment_status IS NULL OR p.status = $1)
              AND ($2::payment_method IS NULL OR p.payment_method = $2)
              AND ($3::bigint IS NULL OR p.member_id = $3)
              AND ($4::text IS NULL OR m.name ILIKE $4 OR m.phone ILIKE $4 OR p.reference_number ILIKE $4)
            ORDER BY p.payment_date DESC, p.created_at DESC, p.id DESC
            LIMIT $5
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(filter.status)
        .bind(filter.payment_method)
        .bind(filter.member_id)
        .bind(pattern)
        .bind(filter.limit)
        .fetch_all(executor)
        .await
    }

    /// Persists the editable fields of a payment
    pub async fn save<'e, E: PgExecutor<'e>>(executor: E, payment: &Payment) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Payment>(&format!(
            r#"
            WITH p AS (
                UPDATE payments
                SET amount = $2, payment_method = $3, status = $4, notes = $5, updated_at = NOW()
                WHERE id = $1
                RETURNING *
            )
            SELECT {}
            FROM p JOIN members m ON m.id = p.member_id
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(payment.id)
        .bind(payment.amount)
        .bind(payment.payment_method)
        .bind(payment.status)
        .bind(&payment.notes)
        .fetch_optional(executor)
        .await
    }

    /// Completed-payment aggregates, with the monthly window starting at
    /// `month_start` inclusive
    ///
    /// `total_pending` is filled in by the caller from the member table.
    pub async fn statistics<'e, E: PgExecutor<'e>>(
        executor: E,
        month_start: NaiveDate,
    ) -> Result<PaymentStatistics, sqlx::Error> {
        let (total_payments, total_amount_collected, payments_this_month, amount_this_month): (
            i64,
            Option<Decimal>,
            i64,
            Option<Decimal>,
        ) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                SUM(amount),
                COUNT(*) FILTER (WHERE payment_date >= $1),
                SUM(amount) FILTER (WHERE payment_date >= $1)
            FROM payments
            WHERE status = 'completed'
            "#,
        )
        .bind(month_start)
        .fetch_one(executor)
        .await?;

        Ok(PaymentStatistics {
            total_payments,
            total_amount_collected: total_amount_collected.unwrap_or(Decimal::ZERO),
            total_pending: Decimal::ZERO,
            payments_this_month,
            amount_this_month: amount_this_month.unwrap_or(Decimal::ZERO),
        })
    }
}
