/// Member endpoints
///
/// # Endpoints
///
/// - `GET    /api/members` - Admin: all members (`is_active`, `search`); member: own record
/// - `POST   /api/members` - Admin: register a member with login and children
/// - `GET    /api/members/me` - Own profile with children
/// - `GET    /api/members/statistics` - Admin: active / paid / pending counts
/// - `GET    /api/members/:id` - Owner or admin: profile with children
/// - `PUT    /api/members/:id` - Admin: edit profile, balance is reconciled
/// - `DELETE /api/members/:id` - Admin: deactivate (code stays reserved)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidJson},
    routes::double_option,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trustledger_shared::{
    auth::{
        authorization::{require_admin, require_owner},
        middleware::AuthContext,
    },
    ledger::{balance::DuesStatus, service::MemberApplication},
    models::{
        child::{Child, Gender, NewChild},
        member::{Member, MemberFilter, MemberStatistics, UpdateMember},
    },
};
use validator::Validate;

/// Member with derived payment status
#[derive(Debug, Serialize)]
pub struct MemberResponse {
    #[serde(flatten)]
    pub member: Member,

    pub payment_status: DuesStatus,

    /// Present on detail views
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Child>>,
}

impl MemberResponse {
    pub fn summary(member: Member) -> Self {
        Self {
            payment_status: member.payment_status(),
            member,
            children: None,
        }
    }

    pub fn detail(member: Member, children: Vec<Child>) -> Self {
        Self {
            payment_status: member.payment_status(),
            member,
            children: Some(children),
        }
    }
}

/// Query parameters for the member listing
#[derive(Debug, Default, Deserialize)]
pub struct ListMembersQuery {
    pub is_active: Option<bool>,

    /// Matches name, phone or father's name
    pub search: Option<String>,
}

/// Child entry of a registration
#[derive(Debug, Deserialize, Validate)]
pub struct ChildInput {
    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
}

impl From<ChildInput> for NewChild {
    fn from(input: ChildInput) -> Self {
        NewChild {
            name: input.name,
            date_of_birth: input.date_of_birth,
            gender: input.gender,
        }
    }
}

/// Member registration request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateMemberRequest {
    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub name: String,

    #[validate(length(max = 20, message = "Ensure this field has no more than 20 characters."))]
    pub phone: String,

    pub password: String,
    pub date_of_birth: NaiveDate,
    pub address: String,

    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub father_name: String,

    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub mother_name: Option<String>,

    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub spouse_name: Option<String>,

    /// Defaults to the configured annual tax
    pub annual_tax: Option<Decimal>,

    #[serde(default)]
    pub children: Vec<ChildInput>,
}

/// Member edit request; absent fields are left unchanged
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMemberRequest {
    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,

    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub father_name: Option<String>,

    /// `null` clears
    #[serde(default, deserialize_with = "double_option")]
    pub mother_name: Option<Option<String>>,

    /// `null` clears
    #[serde(default, deserialize_with = "double_option")]
    pub spouse_name: Option<Option<String>>,

    pub annual_tax: Option<Decimal>,
    pub is_active: Option<bool>,
}

impl From<UpdateMemberRequest> for UpdateMember {
    fn from(req: UpdateMemberRequest) -> Self {
        UpdateMember {
            name: req.name,
            date_of_birth: req.date_of_birth,
            address: req.address,
            father_name: req.father_name,
            mother_name: req.mother_name,
            spouse_name: req.spouse_name,
            annual_tax: req.annual_tax,
            is_active: req.is_active,
        }
    }
}

/// Loads a member the caller may read, with 404 before 403
pub(crate) async fn owned_member(state: &AppState, auth: &AuthContext, id: i64) -> ApiResult<Member> {
    let member = state
        .ledger
        .store()
        .find_member(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;
    require_owner(auth, member.user_id)?;
    Ok(member)
}

/// The caller's own member record
pub(crate) async fn own_member(state: &AppState, auth: &AuthContext) -> ApiResult<Member> {
    state
        .ledger
        .store()
        .find_member_by_user(auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member profile not found".to_string()))
}

async fn with_children(state: &AppState, member: Member) -> ApiResult<MemberResponse> {
    let children = state.ledger.store().list_children(Some(member.id)).await?;
    Ok(MemberResponse::detail(member, children))
}

pub async fn list_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListMembersQuery>,
) -> ApiResult<Json<Vec<MemberResponse>>> {
    let filter = if auth.is_admin {
        MemberFilter {
            is_active: query.is_active,
            search: query.search.filter(|s| !s.trim().is_empty()),
            user_id: None,
        }
    } else {
        MemberFilter {
            user_id: Some(auth.user_id),
            ..Default::default()
        }
    };

    let members = state.ledger.store().list_members(&filter).await?;
    Ok(Json(members.into_iter().map(MemberResponse::summary).collect()))
}

/// Register a member (admin only)
///
/// Creates the login account (username = normalized phone), allocates the
/// next member code and inserts the children, all or nothing.
///
/// # Errors
///
/// - `409 Conflict`: Phone already registered
/// - `422 Unprocessable Entity`: Invalid phone, blank fields, short password
pub async fn create_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidJson(req): ValidJson<CreateMemberRequest>,
) -> ApiResult<(StatusCode, Json<MemberResponse>)> {
    require_admin(&auth)?;

    let (member, children) = state
        .ledger
        .register_member(MemberApplication {
            name: req.name,
            phone: req.phone,
            password: req.password,
            date_of_birth: req.date_of_birth,
            address: req.address,
            father_name: req.father_name,
            mother_name: req.mother_name,
            spouse_name: req.spouse_name,
            annual_tax: req.annual_tax,
            children: req.children.into_iter().map(Into::into).collect(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(MemberResponse::detail(member, children))))
}

pub async fn my_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<MemberResponse>> {
    let member = own_member(&state, &auth).await?;
    Ok(Json(with_children(&state, member).await?))
}

pub async fn member_statistics(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<MemberStatistics>> {
    require_admin(&auth)?;
    Ok(Json(state.ledger.store().member_statistics().await?))
}

pub async fn get_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MemberResponse>> {
    let member = owned_member(&state, &auth, id).await?;
    Ok(Json(with_children(&state, member).await?))
}

pub async fn update_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    ValidJson(req): ValidJson<UpdateMemberRequest>,
) -> ApiResult<Json<MemberResponse>> {
    require_admin(&auth)?;

    let deactivating = req.is_active == Some(false);
    let member = state.ledger.update_member(id, req.into()).await?;

    if deactivating {
        let revoked = state.sessions.revoke_user_sessions(member.user_id, None).await?;
        tracing::debug!(member_id = id, revoked, "Sessions of deactivated member revoked");
    }

    Ok(Json(with_children(&state, member).await?))
}

/// Deactivate a member (admin only)
///
/// Payments and children are kept; the member can no longer log in.
pub async fn delete_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    require_admin(&auth)?;

    let member = state.ledger.deactivate_member(id).await?;
    let revoked = state.sessions.revoke_user_sessions(member.user_id, None).await?;
    tracing::debug!(member_id = id, revoked, "Sessions of deactivated member revoked");

    Ok(StatusCode::NO_CONTENT)
}
