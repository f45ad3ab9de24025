/// Admin dashboard endpoints

use crate::{app::AppState, error::ApiResult, routes::members::MemberResponse};
use axum::{extract::State, Extension, Json};
use trustledger_shared::{
    auth::{authorization::require_admin, middleware::AuthContext},
    ledger::service::DashboardStats,
};

const RECENT_MEMBERS: i64 = 5;

/// `GET /api/dashboard/stats`
pub async fn stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<DashboardStats>> {
    require_admin(&auth)?;
    Ok(Json(state.ledger.dashboard().await?))
}

/// `GET /api/dashboard/recent-members`: newest active members
pub async fn recent_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<MemberResponse>>> {
    require_admin(&auth)?;

    let members = state.ledger.store().recent_members(RECENT_MEMBERS).await?;
    Ok(Json(members.into_iter().map(MemberResponse::summary).collect()))
}
