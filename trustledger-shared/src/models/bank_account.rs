/// Bank account model and database operations
///
/// Accounts the trust collects into. Administered by admins only and
/// physically deletable.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE bank_account_status AS ENUM ('Active', 'Inactive', 'Pending');
///
/// CREATE TABLE bank_accounts (
///     id BIGSERIAL PRIMARY KEY,
///     account_no VARCHAR(50) NOT NULL UNIQUE,
///     account_name VARCHAR(200) NOT NULL,
///     ifsc_code VARCHAR(20) NOT NULL,
///     bank_name VARCHAR(100) NOT NULL,
///     branch_name VARCHAR(100) NOT NULL,
///     branch_address TEXT NOT NULL,
///     contact_no VARCHAR(20) NOT NULL,
///     status bank_account_status NOT NULL DEFAULT 'Active',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;

static IFSC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{4}0[A-Z0-9]{6}$").expect("static IFSC pattern is valid"));

static ACCOUNT_NO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{9,18}$").expect("static account number pattern is valid"));

/// Checks an Indian Financial System Code, e.g. `SBIN0001234`
pub fn is_valid_ifsc(code: &str) -> bool {
    IFSC.is_match(code)
}

/// Checks an account number (9 to 18 digits)
pub fn is_valid_account_no(account_no: &str) -> bool {
    ACCOUNT_NO.is_match(account_no)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "bank_account_status")]
pub enum BankAccountStatus {
    #[default]
    Active,
    Inactive,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BankAccount {
    pub id: i64,
    pub account_no: String,
    pub account_name: String,
    pub ifsc_code: String,
    pub bank_name: String,
    pub branch_name: String,
    pub branch_address: String,
    pub contact_no: String,
    pub status: BankAccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBankAccount {
    pub account_no: String,
    pub account_name: String,
    pub ifsc_code: String,
    pub bank_name: String,
    pub branch_name: String,
    pub branch_address: String,
    pub contact_no: String,
    #[serde(default)]
    pub status: BankAccountStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBankAccount {
    pub account_no: Option<String>,
    pub account_name: Option<String>,
    pub ifsc_code: Option<String>,
    pub bank_name: Option<String>,
    pub branch_name: Option<String>,
    pub branch_address: Option<String>,
    pub contact_no: Option<String>,
    pub status: Option<BankAccountStatus>,
}

impl UpdateBankAccount {
    pub fn apply(self, account: &mut BankAccount) {
        if let Some(v) = self.account_no {
            account.account_no = v;
        }
        if let Some(v) = self.account_name {
            account.account_name = v;
        }
        if let Some(v) = self.ifsc_code {
            account.ifsc_code = v;
        }
        if let Some(v) = self.bank_name {
            account.bank_name = v;
        }
        if let Some(v) = self.branch_name {
            account.branch_name = v;
        }
        if let Some(v) = self.branch_address {
            account.branch_address = v;
        }
        if let Some(v) = self.contact_no {
            account.contact_no = v;
        }
        if let Some(v) = self.status {
            account.status = v;
        }
    }
}

/// Search and pagination for the account listing
#[derive(Debug, Clone, Default)]
pub struct BankAccountQuery {
    /// Case-insensitive substring over holder name, bank, branch and account number
    pub search: Option<String>,

    /// None returns every matching account
    pub limit: Option<i64>,

    pub offset: i64,
}

impl BankAccountQuery {
    pub fn matches(&self, account: &BankAccount) -> bool {
        match self.search {
            Some(ref search) => {
                let needle = search.to_lowercase();
                account.account_name.to_lowercase().contains(&needle)
                    || account.bank_name.to_lowercase().contains(&needle)
                    || account.branch_name.to_lowercase().contains(&needle)
                    || account.account_no.contains(&needle)
            }
            None => true,
        }
    }
}

/// One page of accounts plus the total number of matches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccountPage {
    pub accounts: Vec<BankAccount>,
    pub total: i64,
}

/// Counts shown on the dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankAccountCounts {
    pub total: i64,
    pub active: i64,
}

const BANK_ACCOUNT_COLUMNS: &str = "id, account_no, account_name, ifsc_code, bank_name, branch_name, \
     branch_address, contact_no, status, created_at, updated_at";

const SEARCH_CLAUSE: &str = "($1::text IS NULL OR account_name ILIKE $1 OR bank_name ILIKE $1 \
     OR branch_name ILIKE $1 OR account_no ILIKE $1)";

impl BankAccount {
    /// Inserts an account; a duplicate number violates `bank_accounts_account_no_key`
    pub async fn insert<'e, E: PgExecutor<'e>>(executor: E, data: &NewBankAccount) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, BankAccount>(&format!(
            r#"
            INSERT INTO bank_accounts (account_no, account_name, ifsc_code, bank_name,
                                       branch_name, branch_address, contact_no, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            BANK_ACCOUNT_COLUMNS
        ))
        .bind(&data.account_no)
        .bind(&data.account_name)
        .bind(&data.ifsc_code)
        .bind(&data.bank_name)
        .bind(&data.branch_name)
        .bind(&data.branch_address)
        .bind(&data.contact_no)
        .bind(data.status)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, BankAccount>(&format!(
            "SELECT {} FROM bank_accounts WHERE id = $1",
            BANK_ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Lists accounts newest first
    pub async fn list<'e, E: PgExecutor<'e>>(
        executor: E,
        query: &BankAccountQuery,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let pattern = query.search.as_deref().map(super::contains_pattern);

        sqlx::query_as::<_, BankAccount>(&format!(
            "SELECT {} FROM bank_accounts WHERE {} ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
            BANK_ACCOUNT_COLUMNS, SEARCH_CLAUSE
        ))
        .bind(pattern)
        .bind(query.limit)
        .bind(query.offset)
        .fetch_all(executor)
        .await
    }

    /// Number of accounts matching the search, ignoring pagination
    pub async fn count_matching<'e, E: PgExecutor<'e>>(
        executor: E,
        query: &BankAccountQuery,
    ) -> Result<i64, sqlx::Error> {
        let pattern = query.search.as_deref().map(super::contains_pattern);

        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM bank_accounts WHERE {}", SEARCH_CLAUSE))
            .bind(pattern)
            .fetch_one(executor)
            .await
    }

    pub async fn save<'e, E: PgExecutor<'e>>(
        executor: E,
        account: &BankAccount,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, BankAccount>(&format!(
            r#"
            UPDATE bank_accounts
            SET account_no = $2, account_name = $3, ifsc_code = $4, bank_name = $5,
                branch_name = $6, branch_address = $7, contact_no = $8, status = $9,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            BANK_ACCOUNT_COLUMNS
        ))
        .bind(account.id)
        .bind(&account.account_no)
        .bind(&account.account_name)
        .bind(&account.ifsc_code)
        .bind(&account.bank_name)
        .bind(&account.branch_name)
        .bind(&account.branch_address)
        .bind(&account.contact_no)
        .bind(account.status)
        .fetch_optional(executor)
        .await
    }

    pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM bank_accounts WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn counts<'e, E: PgExecutor<'e>>(executor: E) -> Result<BankAccountCounts, sqlx::Error> {
        let (total, active): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE status = 'Active') FROM bank_accounts",
        )
        .fetch_one(executor)
        .await?;

        Ok(BankAccountCounts { total, active })
    }
}
