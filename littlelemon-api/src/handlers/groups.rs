use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{delete, get},
};
use tracing::instrument;

use crate::auth::Caller;
use crate::error::{ApiError, ApiErrorResponse};
use crate::roles::RoleGroup;
use crate::serializer::{DetailView, UserView};
use crate::services::staff::{self, MembershipInput};

use super::{ApiJson, ApiPath, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/groups/{group}/users", get(list_members).post(add_member))
        .route("/groups/{group}/users/{user_id}", delete(remove_member))
}

fn role_group(slug: &str) -> Result<RoleGroup, ApiError> {
    RoleGroup::from_slug(slug).ok_or_else(|| ApiError::NotFound("Group not found.".to_string()))
}

#[utoipa::path(
    get,
    path = "/groups/{group}/users",
    params(("group" = String, Path, description = "`manager` or `delivery-crew`")),
    responses(
        (status = 200, description = "Members of the group", body = [UserView]),
        (status = 403, description = "Manager role required", body = ApiErrorResponse),
        (status = 404, description = "Unknown group", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "groups"
)]
#[instrument(skip_all, fields(user_id = caller.user.id, group = %group))]
pub async fn list_members(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(group): ApiPath<String>,
) -> Result<Json<Vec<UserView>>, ApiError> {
    let group = role_group(&group)?;
    let conn = &mut state.db()?;
    Ok(Json(staff::members(conn, &caller, group)?))
}

#[utoipa::path(
    post,
    path = "/groups/{group}/users",
    params(("group" = String, Path, description = "`manager` or `delivery-crew`")),
    request_body = MembershipInput,
    responses(
        (status = 201, description = "User added to the group", body = UserView),
        (status = 400, description = "No user_id in the body", body = ApiErrorResponse),
        (status = 403, description = "Manager role required", body = ApiErrorResponse),
        (status = 404, description = "Unknown group or user", body = ApiErrorResponse),
        (status = 409, description = "User already in the group", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "groups"
)]
#[instrument(skip_all, fields(user_id = caller.user.id, group = %group))]
pub async fn add_member(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(group): ApiPath<String>,
    ApiJson(payload): ApiJson<MembershipInput>,
) -> Result<(StatusCode, Json<UserView>), ApiError> {
    let group = role_group(&group)?;
    let conn = &mut state.db()?;
    let user = staff::promote(conn, &caller, group, payload)?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    delete,
    path = "/groups/{group}/users/{user_id}",
    params(
        ("group" = String, Path, description = "`manager` or `delivery-crew`"),
        ("user_id" = i32, Path, description = "User to remove"),
    ),
    responses(
        (status = 200, description = "User removed from the group", body = DetailView),
        (status = 403, description = "Manager role required", body = ApiErrorResponse),
        (status = 404, description = "Unknown group or user", body = ApiErrorResponse),
        (status = 409, description = "User is not in the group", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "groups"
)]
#[instrument(skip_all, fields(user_id = caller.user.id, group = %group, target = target))]
pub async fn remove_member(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath((group, target)): ApiPath<(String, i32)>,
) -> Result<Json<DetailView>, ApiError> {
    let group = role_group(&group)?;
    let conn = &mut state.db()?;
    Ok(Json(staff::demote(conn, &caller, group, target)?))
}
