/// Payment endpoints
///
/// # Endpoints
///
/// - `GET  /api/payments` - Admin: all payments; member: own payments.
///   Filters: `status`, `payment_method`, `member`, `search`
/// - `POST /api/payments` - Admin: record a completed payment and credit the member
/// - `GET  /api/payments/mine` - Own payment history
/// - `GET  /api/payments/statistics` - Admin: collection totals
/// - `GET  /api/payments/recent?limit=10` - Admin: newest payments
/// - `GET  /api/payments/:id` - Owner or admin
/// - `PUT  /api/payments/:id` - Admin: edit; the member's balance is not touched

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidJson},
    routes::{double_option, members::own_member, members::MemberResponse},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trustledger_shared::{
    auth::{
        authorization::{require_admin, require_owner},
        middleware::AuthContext,
    },
    ledger::service::PaymentRequest,
    models::payment::{Payment, PaymentFilter, PaymentMethod, PaymentStatistics, PaymentStatus, UpdatePayment},
};
use validator::Validate;

const DEFAULT_RECENT_LIMIT: i64 = 10;
const MAX_RECENT_LIMIT: i64 = 100;

/// Query parameters for the payment listing
#[derive(Debug, Default, Deserialize)]
pub struct ListPaymentsQuery {
    pub status: Option<PaymentStatus>,
    pub payment_method: Option<PaymentMethod>,

    /// Member id (admin only)
    pub member: Option<i64>,

    /// Matches member name, member phone or reference number
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

/// Payment recording request
#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentRequest {
    #[serde(alias = "member")]
    pub member_id: i64,

    pub amount: Decimal,
    pub payment_method: PaymentMethod,

    /// Generated as `TXN` + 9 characters when absent or blank
    #[validate(length(max = 100, message = "Ensure this field has no more than 100 characters."))]
    pub reference_number: Option<String>,

    pub notes: Option<String>,
}

/// Payment edit request; absent fields are left unchanged
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePaymentRequest {
    pub amount: Option<Decimal>,
    pub payment_method: Option<PaymentMethod>,
    pub status: Option<PaymentStatus>,

    /// `null` clears
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

/// A recorded payment and the member's balance after it
#[derive(Debug, Serialize)]
pub struct RecordedPayment {
    pub payment: Payment,
    pub member: MemberResponse,
}

pub async fn list_payments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListPaymentsQuery>,
) -> ApiResult<Json<Vec<Payment>>> {
    let store = state.ledger.store();

    let member_id = if auth.is_admin {
        query.member
    } else {
        match store.find_member_by_user(auth.user_id).await? {
            Some(member) => Some(member.id),
            None => return Ok(Json(Vec::new())),
        }
    };

    let filter = PaymentFilter {
        status: query.status,
        payment_method: query.payment_method,
        member_id,
        search: query.search.filter(|s| !s.trim().is_empty()),
        limit: None,
    };

    Ok(Json(store.list_payments(&filter).await?))
}

/// Record a payment (admin only)
///
/// The payment is stored as completed, dated today, and the member's
/// `amount_paid` / `amount_due` are updated in the same transaction.
///
/// # Errors
///
/// - `404 Not Found`: Unknown member
/// - `409 Conflict`: Reference number already used
/// - `422 Unprocessable Entity`: Amount not positive
pub async fn record_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidJson(req): ValidJson<RecordPaymentRequest>,
) -> ApiResult<(StatusCode, Json<RecordedPayment>)> {
    require_admin(&auth)?;

    let (payment, member) = state
        .ledger
        .record_payment(PaymentRequest {
            member_id: req.member_id,
            amount: req.amount,
            payment_method: req.payment_method,
            reference_number: req.reference_number,
            notes: req.notes,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RecordedPayment {
            payment,
            member: MemberResponse::summary(member),
        }),
    ))
}

pub async fn my_payments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Payment>>> {
    let member = own_member(&state, &auth).await?;

    let filter = PaymentFilter {
        member_id: Some(member.id),
        ..Default::default()
    };

    Ok(Json(state.ledger.store().list_payments(&filter).await?))
}

pub async fn payment_statistics(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<PaymentStatistics>> {
    require_admin(&auth)?;
    Ok(Json(state.ledger.payment_statistics().await?))
}

pub async fn recent_payments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<RecentQuery>,
) -> ApiResult<Json<Vec<Payment>>> {
    require_admin(&auth)?;

    let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    if !(1..=MAX_RECENT_LIMIT).contains(&limit) {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_RECENT_LIMIT
        )));
    }

    let filter = PaymentFilter {
        limit: Some(limit),
        ..Default::default()
    };

    Ok(Json(state.ledger.store().list_payments(&filter).await?))
}

pub async fn get_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Payment>> {
    let store = state.ledger.store();

    let payment = store
        .find_payment(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Payment not found".to_string()))?;

    if !auth.is_admin {
        let member = store
            .find_member(payment.member_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Payment not found".to_string()))?;
        require_owner(&auth, member.user_id)?;
    }

    Ok(Json(payment))
}

pub async fn update_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    ValidJson(req): ValidJson<UpdatePaymentRequest>,
) -> ApiResult<Json<Payment>> {
    require_admin(&auth)?;

    let payment = state
        .ledger
        .update_payment(
            id,
            UpdatePayment {
                amount: req.amount,
                payment_method: req.payment_method,
                status: req.status,
                notes: req.notes,
            },
        )
        .await?;

    Ok(Json(payment))
}
