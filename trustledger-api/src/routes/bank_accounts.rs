/// Bank account endpoints (admin only)
///
/// The listing is paginated with `page` (from 1) and `per_page`
/// (default 10, `-1` for every account), and filtered with `search`.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidJson},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use trustledger_shared::{
    auth::{authorization::require_admin, middleware::AuthContext},
    models::bank_account::{BankAccount, BankAccountQuery, BankAccountStatus, NewBankAccount, UpdateBankAccount},
};
use validator::Validate;

const DEFAULT_PER_PAGE: i64 = 10;
const MAX_PER_PAGE: i64 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct ListBankAccountsQuery {
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// One page of bank accounts
///
/// Page fields are omitted when every account was requested.
#[derive(Debug, Serialize)]
pub struct BankAccountListResponse {
    pub bank_accounts: Vec<BankAccount>,
    pub total: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_page: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBankAccountRequest {
    pub account_no: String,

    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub account_name: String,

    pub ifsc_code: String,

    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub bank_name: String,

    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub branch_name: String,

    pub branch_address: String,

    #[validate(length(max = 20, message = "Ensure this field has no more than 20 characters."))]
    pub contact_no: String,

    #[serde(default)]
    pub status: BankAccountStatus,
}

/// Bank account edit request; absent fields are left unchanged
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBankAccountRequest {
    pub account_no: Option<String>,

    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub account_name: Option<String>,

    pub ifsc_code: Option<String>,

    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub bank_name: Option<String>,

    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub branch_name: Option<String>,

    pub branch_address: Option<String>,

    #[validate(length(max = 20, message = "Ensure this field has no more than 20 characters."))]
    pub contact_no: Option<String>,

    pub status: Option<BankAccountStatus>,
}

fn page_count(total: i64, per_page: i64) -> i64 {
    total / per_page + i64::from(total % per_page != 0)
}

/// Turns page parameters into a store query
fn page_query(query: ListBankAccountsQuery) -> ApiResult<(BankAccountQuery, Option<(i64, i64)>)> {
    let search = query.search.filter(|s| !s.trim().is_empty());
    let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE);

    if per_page == -1 {
        return Ok((
            BankAccountQuery {
                search,
                limit: None,
                offset: 0,
            },
            None,
        ));
    }

    let page = query.page.unwrap_or(1);
    if !(1..=MAX_PER_PAGE).contains(&per_page) || page < 1 {
        return Err(ApiError::BadRequest(format!(
            "page must be at least 1 and per_page between 1 and {} (or -1 for all)",
            MAX_PER_PAGE
        )));
    }

    Ok((
        BankAccountQuery {
            search,
            limit: Some(per_page),
            offset: (page - 1).saturating_mul(per_page),
        },
        Some((page, per_page)),
    ))
}

pub async fn list_bank_accounts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListBankAccountsQuery>,
) -> ApiResult<Json<BankAccountListResponse>> {
    require_admin(&auth)?;

    let (query, paging) = page_query(query)?;
    let page = state.ledger.store().list_bank_accounts(&query).await?;

    let response = match paging {
        Some((current_page, per_page)) => BankAccountListResponse {
            bank_accounts: page.accounts,
            total: page.total,
            pages: Some(page_count(page.total, per_page)),
            current_page: Some(current_page),
            per_page: Some(per_page),
        },
        None => BankAccountListResponse {
            bank_accounts: page.accounts,
            total: page.total,
            pages: None,
            current_page: None,
            per_page: None,
        },
    };

    Ok(Json(response))
}

/// Create a bank account
///
/// # Errors
///
/// - `409 Conflict`: Account number already registered
/// - `422 Unprocessable Entity`: Account number not 9-18 digits, invalid IFSC, blank fields
pub async fn create_bank_account(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidJson(req): ValidJson<CreateBankAccountRequest>,
) -> ApiResult<(StatusCode, Json<BankAccount>)> {
    require_admin(&auth)?;

    let account = state
        .ledger
        .create_bank_account(NewBankAccount {
            account_no: req.account_no,
            account_name: req.account_name,
            ifsc_code: req.ifsc_code,
            bank_name: req.bank_name,
            branch_name: req.branch_name,
            branch_address: req.branch_address,
            contact_no: req.contact_no,
            status: req.status,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn get_bank_account(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<BankAccount>> {
    require_admin(&auth)?;

    let account = state
        .ledger
        .store()
        .find_bank_account(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Bank account not found".to_string()))?;

    Ok(Json(account))
}

pub async fn update_bank_account(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    ValidJson(req): ValidJson<UpdateBankAccountRequest>,
) -> ApiResult<Json<BankAccount>> {
    require_admin(&auth)?;

    let account = state
        .ledger
        .update_bank_account(
            id,
            UpdateBankAccount {
                account_no: req.account_no,
                account_name: req.account_name,
                ifsc_code: req.ifsc_code,
                bank_name: req.bank_name,
                branch_name: req.branch_name,
                branch_address: req.branch_address,
                contact_no: req.contact_no,
                status: req.status,
            },
        )
        .await?;

    Ok(Json(account))
}

pub async fn delete_bank_account(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    require_admin(&auth)?;

    state.ledger.store().delete_bank_account(id).await?;
    info!(bank_account_id = id, "Bank account deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_offsets() {
        let (query, paging) = page_query(ListBankAccountsQuery {
            search: Some("sbi".to_string()),
            page: Some(3),
            per_page: Some(20),
        })
        .unwrap();

        assert_eq!(query.limit, Some(20));
        assert_eq!(query.offset, 40);
        assert_eq!(query.search.as_deref(), Some("sbi"));
        assert_eq!(paging, Some((3, 20)));
    }

    #[test]
    fn test_page_query_all() {
        let (query, paging) = page_query(ListBankAccountsQuery {
            per_page: Some(-1),
            page: Some(4),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(query.limit, None);
        assert_eq!(query.offset, 0);
        assert!(paging.is_none());
    }

    #[test]
    fn test_page_query_defaults_and_rejects() {
        let (query, paging) = page_query(ListBankAccountsQuery {
            search: Some("   ".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(query.limit, Some(DEFAULT_PER_PAGE));
        assert!(query.search.is_none());
        assert_eq!(paging, Some((1, DEFAULT_PER_PAGE)));

        assert!(page_query(ListBankAccountsQuery {
            page: Some(0),
            ..Default::default()
        })
        .is_err());
        assert!(page_query(ListBankAccountsQuery {
            per_page: Some(0),
            ..Default::default()
        })
        .is_err());
    }

    #[test]
    fn test_page_query_rejects_oversized_pages() {
        assert!(page_query(ListBankAccountsQuery {
            per_page: Some(MAX_PER_PAGE),
            ..Default::default()
        })
        .is_ok());

        for per_page in [MAX_PER_PAGE + 1, i64::MAX] {
            assert!(page_query(ListBankAccountsQuery {
                per_page: Some(per_page),
                ..Default::default()
            })
            .is_err());
        }
    }

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0, 10), 0);
        assert_eq!(page_count(3, 2), 2);
        assert_eq!(page_count(4, 2), 2);
        assert_eq!(page_count(i64::MAX, 100), i64::MAX / 100 + 1);
    }
}
