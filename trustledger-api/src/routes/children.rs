/// Children endpoints
///
/// Members may manage their own children; admins may manage all of them.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidJson},
    routes::members::{owned_member, ChildInput},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use trustledger_shared::{
    auth::{authorization::require_owner, middleware::AuthContext},
    models::child::{Child, Gender, UpdateChild},
};
use validator::Validate;

/// Child edit request; absent fields are left unchanged
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateChildRequest {
    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
}

/// Loads a child and checks the caller owns its parent member
async fn owned_child(state: &AppState, auth: &AuthContext, id: i64) -> ApiResult<Child> {
    let store = state.ledger.store();

    let child = store
        .find_child(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Child not found".to_string()))?;

    if !auth.is_admin {
        let member = store
            .find_member(child.member_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Child not found".to_string()))?;
        require_owner(auth, member.user_id)?;
    }

    Ok(child)
}

/// `POST /api/members/:id/children`
pub async fn add_child(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(member_id): Path<i64>,
    ValidJson(req): ValidJson<ChildInput>,
) -> ApiResult<(StatusCode, Json<Child>)> {
    let member = owned_member(&state, &auth, member_id).await?;
    let child = state.ledger.add_child(member.id, req.into()).await?;

    Ok((StatusCode::CREATED, Json(child)))
}

/// `GET /api/children`: all children for admins, own children for members
pub async fn list_children(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Child>>> {
    let store = state.ledger.store();

    let children = if auth.is_admin {
        store.list_children(None).await?
    } else {
        match store.find_member_by_user(auth.user_id).await? {
            Some(member) => store.list_children(Some(member.id)).await?,
            None => Vec::new(),
        }
    };

    Ok(Json(children))
}

pub async fn get_child(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Child>> {
    Ok(Json(owned_child(&state, &auth, id).await?))
}

pub async fn update_child(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    ValidJson(req): ValidJson<UpdateChildRequest>,
) -> ApiResult<Json<Child>> {
    owned_child(&state, &auth, id).await?;

    let child = state
        .ledger
        .update_child(
            id,
            UpdateChild {
                name: req.name,
                date_of_birth: req.date_of_birth,
                gender: req.gender,
            },
        )
        .await?;

    Ok(Json(child))
}

pub async fn delete_child(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    owned_child(&state, &auth, id).await?;
    state.ledger.store().delete_child(id).await?;

    Ok(StatusCode::NO_CONTENT)
}
