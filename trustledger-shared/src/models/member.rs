/// Member model and database operations
///
/// A member is a family head registered with the trust. Each member has:
/// - an internal key (`id`) assigned by the store
/// - a human-readable code (`member_code`, e.g. `KT-0007`) assigned once on
///   insert by [`IdentityAllocator`](crate::ledger::identity::IdentityAllocator)
/// - balance fields where `amount_due` is always `annual_tax - amount_paid`
///
/// Members are never physically deleted; deactivation sets `is_active = false`.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE members (
///     id BIGSERIAL PRIMARY KEY,
///     user_id BIGINT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
///     member_code VARCHAR(20) NOT NULL UNIQUE,
///     name VARCHAR(200) NOT NULL,
///     phone VARCHAR(10) NOT NULL UNIQUE,
///     date_of_birth DATE NOT NULL,
///     address TEXT NOT NULL,
///     father_name VARCHAR(200) NOT NULL,
///     mother_name VARCHAR(200),
///     spouse_name VARCHAR(200),
///     annual_tax NUMERIC(10, 2) NOT NULL DEFAULT 20000.00,
///     amount_paid NUMERIC(10, 2) NOT NULL DEFAULT 0.00,
///     amount_due NUMERIC(10, 2) NOT NULL DEFAULT 0.00,
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     password_reset_required BOOLEAN NOT NULL DEFAULT TRUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;

use crate::ledger::balance::{self, DuesStatus};
use crate::models::child::NewChild;

/// Member model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Member {
    /// Internal key, monotonically increasing in insertion order
    pub id: i64,

    /// Owning login account
    pub user_id: i64,

    /// Human-readable code, immutable once assigned
    pub member_code: String,

    pub name: String,

    /// Normalized 10-digit phone number (also the username)
    pub phone: String,

    pub date_of_birth: NaiveDate,

    pub address: String,

    pub father_name: String,

    pub mother_name: Option<String>,

    pub spouse_name: Option<String>,

    /// Expected yearly contribution
    pub annual_tax: Decimal,

    /// Cumulative completed payments
    pub amount_paid: Decimal,

    /// Derived: `annual_tax - amount_paid`
    pub amount_due: Decimal,

    /// Soft-delete flag
    pub is_active: bool,

    /// Set on registration and on admin password reset
    pub password_reset_required: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Member {
    /// Derived payment standing
    pub fn payment_status(&self) -> DuesStatus {
        balance::dues_status(self.amount_paid, self.amount_due)
    }
}

/// Profile fields supplied when registering a member
///
/// `phone` must already be normalized.
#[derive(Debug, Clone)]
pub struct NewMember {
    pub name: String,
    pub phone: String,
    pub date_of_birth: NaiveDate,
    pub address: String,
    pub father_name: String,
    pub mother_name: Option<String>,
    pub spouse_name: Option<String>,
    pub annual_tax: Decimal,
}

/// Everything needed to register a member atomically
///
/// The store creates the login account, allocates the member code, inserts
/// the member and its children in one unit of work.
#[derive(Debug, Clone)]
pub struct MemberRegistration {
    /// Argon2id hash of the initial password
    pub password_hash: String,

    pub member: NewMember,

    pub children: Vec<NewChild>,
}

/// Admin-editable member fields
///
/// Only `Some` fields are applied. `member_code`, `phone` and the balance
/// fields are deliberately absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateMember {
    pub name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub father_name: Option<String>,

    /// Use Some(None) to clear
    pub mother_name: Option<Option<String>>,

    /// Use Some(None) to clear
    pub spouse_name: Option<Option<String>>,

    pub annual_tax: Option<Decimal>,
    pub is_active: Option<bool>,
}

impl UpdateMember {
    /// Applies the changes to a member and reconciles its balance
    pub fn apply(self, member: &mut Member) {
        if let Some(name) = self.name {
            member.name = name;
        }
        if let Some(date_of_birth) = self.date_of_birth {
            member.date_of_birth = date_of_birth;
        }
        if let Some(address) = self.address {
            member.address = address;
        }
        if let Some(father_name) = self.father_name {
            member.father_name = father_name;
        }
        if let Some(mother_name) = self.mother_name {
            member.mother_name = mother_name;
        }
        if let Some(spouse_name) = self.spouse_name {
            member.spouse_name = spouse_name;
        }
        if let Some(annual_tax) = self.annual_tax {
            member.annual_tax = annual_tax;
        }
        if let Some(is_active) = self.is_active {
            member.is_active = is_active;
        }

        balance::reconcile(member);
    }
}

/// Filter for listing members
#[derive(Debug, Clone, Default)]
pub struct MemberFilter {
    /// Only members with this active flag
    pub is_active: Option<bool>,

    /// Case-insensitive substring over name, phone and father's name
    pub search: Option<String>,

    /// Restrict to the member owned by this user
    pub user_id: Option<i64>,
}

impl MemberFilter {
    /// Whether a member passes this filter
    pub fn matches(&self, member: &Member) -> bool {
        if let Some(active) = self.is_active {
            if member.is_active != active {
                return false;
            }
        }
        if let Some(user_id) = self.user_id {
            if member.user_id != user_id {
                return false;
            }
        }
        if let Some(ref search) = self.search {
            let needle = search.to_lowercase();
            let hit = member.name.to_lowercase().contains(&needle)
                || member.phone.contains(&needle)
                || member.father_name.to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }
        true
    }
}

/// Member counts for the admin statistics view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberStatistics {
    /// Active members
    pub total_members: i64,

    /// Members with nothing outstanding
    pub members_paid: i64,

    /// Members with a positive balance due
    pub members_pending: i64,
}

const MEMBER_COLUMNS: &str = "id, user_id, member_code, name, phone, date_of_birth, address, \
     father_name, mother_name, spouse_name, annual_tax, amount_paid, amount_due, \
     is_active, password_reset_required, created_at, updated_at";

impl Member {
    /// Inserts a member with an already allocated code
    ///
    /// `amount_paid` starts at zero and `amount_due` is reconciled here.
    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: i64,
        member_code: &str,
        data: &NewMember,
    ) -> Result<Self, sqlx::Error> {
        let amount_paid = Decimal::ZERO;
        let amount_due = balance::outstanding(data.annual_tax, amount_paid);

        sqlx::query_as::<_, Member>(&format!(
            r#"
            INSERT INTO members (user_id, member_code, name, phone, date_of_birth, address,
                                 father_name, mother_name, spouse_name,
                                 annual_tax, amount_paid, amount_due)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            MEMBER_COLUMNS
        ))
        .bind(user_id)
        .bind(member_code)
        .bind(&data.name)
        .bind(&data.phone)
        .bind(data.date_of_birth)
        .bind(&data.address)
        .bind(&data.father_name)
        .bind(&data.mother_name)
        .bind(&data.spouse_name)
        .bind(data.annual_tax)
        .bind(amount_paid)
        .bind(amount_due)
        .fetch_one(executor)
        .await
    }

    /// Code of the most recently inserted member that has one
    pub async fn last_code<'e, E: PgExecutor<'e>>(executor: E) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT member_code FROM members WHERE member_code <> '' ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(executor)
        .await
    }

    /// Finds a member by internal key
    pub async fn find_by_id<'e, E: PgExecutor<'e>>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Member>(&format!("SELECT {} FROM members WHERE id = $1", MEMBER_COLUMNS))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Finds a member by internal key and locks the row until the
    /// surrounding transaction ends
    pub async fn find_for_update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Member>(&format!(
            "SELECT {} FROM members WHERE id = $1 FOR UPDATE",
            MEMBER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Finds the member owned by a user
    pub async fn find_by_user_id<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Member>(&format!("SELECT {} FROM members WHERE user_id = $1", MEMBER_COLUMNS))
            .bind(user_id)
            .fetch_optional(executor)
            .await
    }

    /// Lists members ordered by name
    pub async fn list<'e, E: PgExecutor<'e>>(executor: E, filter: &MemberFilter) -> Result<Vec<Self>, sqlx::Error> {
        let pattern = filter.search.as_deref().map(super::contains_pattern);

        sqlx::query_as::<_, Member>(&format!(
            r#"
            SELECT {}
            FROM members
            WHERE ($1::boolean IS NULL OR is_active = $1)
              AND ($2::text IS NULL OR name ILIKE $2 OR phone ILIKE $2 OR father_name ILIKE $2)
              AND ($3::bigint IS NULL OR user_id = $3)
            ORDER BY name, id
            "#,
            MEMBER_COLUMNS
        ))
        .bind(filter.is_active)
        .bind(pattern)
        .bind(filter.user_id)
        .fetch_all(executor)
        .await
    }

    /// Most recently created active members
    pub async fn recent<'e, E: PgExecutor<'e>>(executor: E, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Member>(&format!(
            "SELECT {} FROM members WHERE is_active ORDER BY created_at DESC, id DESC LIMIT $1",
            MEMBER_COLUMNS
        ))
        .bind(limit)
        .fetch_all(executor)
        .await
    }

    /// Persists every mutable field of a member
    ///
    /// The caller is expected to have reconciled the balance.
    pub async fn save<'e, E: PgExecutor<'e>>(executor: E, member: &Member) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Member>(&format!(
            r#"
            UPDATE members
            SET name = $2, date_of_birth = $3, address = $4, father_name = $5,
                mother_name = $6, spouse_name = $7, annual_tax = $8,
                amount_paid = $9, amount_due = $10, is_active = $11,
                password_reset_required = $12, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            MEMBER_COLUMNS
        ))
        .bind(member.id)
        .bind(&member.name)
        .bind(member.date_of_birth)
        .bind(&member.address)
        .bind(&member.father_name)
        .bind(&member.mother_name)
        .bind(&member.spouse_name)
        .bind(member.annual_tax)
        .bind(member.amount_paid)
        .bind(member.amount_due)
        .bind(member.is_active)
        .bind(member.password_reset_required)
        .fetch_one(executor)
        .await
    }

    /// Sets or clears the password-reset flag
    pub async fn set_password_reset_required<'e, E: PgExecutor<'e>>(
        executor: E,
        id: i64,
        required: bool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE members SET password_reset_required = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(required)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Member counts for the statistics view
    pub async fn statistics<'e, E: PgExecutor<'e>>(executor: E) -> Result<MemberStatistics, sqlx::Error> {
        let (total_members, members_paid, members_pending): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE is_active),
                COUNT(*) FILTER (WHERE amount_due <= 0),
                COUNT(*) FILTER (WHERE amount_due > 0)
            FROM members
            "#,
        )
        .fetch_one(executor)
        .await?;

        Ok(MemberStatistics {
            total_members,
            members_paid,
            members_pending,
        })
    }

    /// Sum of outstanding dues across all members
    pub async fn total_due<'e, E: PgExecutor<'e>>(executor: E) -> Result<Decimal, sqlx::Error> {
        let total: Option<Decimal> = sqlx::query_scalar("SELECT SUM(amount_due) FROM members")
            .fetch_one(executor)
            .await?;

        Ok(total.unwrap_or(Decimal::ZERO))
    }
}
