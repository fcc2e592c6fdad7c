use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::get,
};
use tracing::instrument;

use crate::auth::Caller;
use crate::error::{ApiError, ApiErrorResponse};
use crate::serializer::{CategoryView, MenuItemView};
use crate::services::UpdateMode;
use crate::services::catalog::{self, CategoryInput, MenuItemFilter, MenuItemInput};

use super::{ApiJson, ApiPath, ApiQuery, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/menu-items", get(list_menu_items).post(create_menu_item))
        .route(
            "/menu-items/{id}",
            get(get_menu_item)
                .put(replace_menu_item)
                .patch(modify_menu_item)
                .delete(delete_menu_item),
        )
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/{id}",
            get(get_category)
                .put(replace_category)
                .patch(modify_category)
                .delete(delete_category),
        )
}

#[utoipa::path(
    get,
    path = "/menu-items",
    params(MenuItemFilter),
    responses(
        (status = 200, description = "Menu items", body = [MenuItemView]),
        (status = 400, description = "Invalid filter", body = ApiErrorResponse),
        (status = 401, description = "Invalid bearer token", body = ApiErrorResponse),
    ),
    security(
        (),
        ("bearer" = [])
    ),
    tag = "menu"
)]
#[instrument(skip_all, fields(user_id = caller.as_ref().map(|c| c.user.id)))]
pub async fn list_menu_items(
    State(state): State<AppState>,
    caller: Option<Caller>,
    ApiQuery(filter): ApiQuery<MenuItemFilter>,
) -> Result<Json<Vec<MenuItemView>>, ApiError> {
    let conn = &mut state.db()?;
    Ok(Json(catalog::list_menu_items(conn, caller.as_ref(), filter)?))
}

#[utoipa::path(
    post,
    path = "/menu-items",
    request_body = MenuItemInput,
    responses(
        (status = 201, description = "Menu item created", body = MenuItemView),
        (status = 400, description = "Invalid menu item", body = ApiErrorResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorResponse),
        (status = 403, description = "Manager role required", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "menu"
)]
#[instrument(skip_all, fields(user_id = caller.user.id))]
pub async fn create_menu_item(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(payload): ApiJson<MenuItemInput>,
) -> Result<(StatusCode, Json<MenuItemView>), ApiError> {
    let conn = &mut state.db()?;
    let item = catalog::create_menu_item(conn, &caller, payload)?;
    Ok((StatusCode::CREATED, Json(item)))
}

#[utoipa::path(
    get,
    path = "/menu-items/{id}",
    params(("id" = i32, Path, description = "Menu item id")),
    responses(
        (status = 200, description = "Menu item", body = MenuItemView),
        (status = 401, description = "Invalid bearer token", body = ApiErrorResponse),
        (status = 404, description = "Menu item not found", body = ApiErrorResponse),
    ),
    security(
        (),
        ("bearer" = [])
    ),
    tag = "menu"
)]
#[instrument(skip_all, fields(user_id = caller.as_ref().map(|c| c.user.id), menu_item_id = id))]
pub async fn get_menu_item(
    State(state): State<AppState>,
    caller: Option<Caller>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<MenuItemView>, ApiError> {
    let conn = &mut state.db()?;
    Ok(Json(catalog::get_menu_item(conn, caller.as_ref(), id)?))
}

#[utoipa::path(
    put,
    path = "/menu-items/{id}",
    params(("id" = i32, Path, description = "Menu item id")),
    request_body = MenuItemInput,
    responses(
        (status = 200, description = "Menu item replaced", body = MenuItemView),
        (status = 400, description = "Invalid menu item", body = ApiErrorResponse),
        (status = 403, description = "Manager role required", body = ApiErrorResponse),
        (status = 404, description = "Menu item not found", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "menu"
)]
#[instrument(skip_all, fields(user_id = caller.user.id, menu_item_id = id))]
pub async fn replace_menu_item(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<MenuItemInput>,
) -> Result<Json<MenuItemView>, ApiError> {
    let conn = &mut state.db()?;
    Ok(Json(catalog::update_menu_item(
        conn,
        &caller,
        id,
        payload,
        UpdateMode::Replace,
    )?))
}

#[utoipa::path(
    patch,
    path = "/menu-items/{id}",
    params(("id" = i32, Path, description = "Menu item id")),
    request_body = MenuItemInput,
    responses(
        (status = 200, description = "Menu item updated", body = MenuItemView),
        (status = 400, description = "Invalid menu item", body = ApiErrorResponse),
        (status = 403, description = "Manager role required", body = ApiErrorResponse),
        (status = 404, description = "Menu item not found", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "menu"
)]
#[instrument(skip_all, fields(user_id = caller.user.id, menu_item_id = id))]
pub async fn modify_menu_item(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<MenuItemInput>,
) -> Result<Json<MenuItemView>, ApiError> {
    let conn = &mut state.db()?;
    Ok(Json(catalog::update_menu_item(
        conn,
        &caller,
        id,
        payload,
        UpdateMode::Partial,
    )?))
}

#[utoipa::path(
    delete,
    path = "/menu-items/{id}",
    params(("id" = i32, Path, description = "Menu item id")),
    responses(
        (status = 204, description = "Menu item deleted"),
        (status = 403, description = "Manager role required", body = ApiErrorResponse),
        (status = 404, description = "Menu item not found", body = ApiErrorResponse),
        (status = 409, description = "Menu item appears in orders", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "menu"
)]
#[instrument(skip_all, fields(user_id = caller.user.id, menu_item_id = id))]
pub async fn delete_menu_item(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<i32>,
) -> Result<StatusCode, ApiError> {
    let conn = &mut state.db()?;
    catalog::delete_menu_item(conn, &caller, id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/categories",
    responses(
        (status = 200, description = "Categories", body = [CategoryView]),
        (status = 401, description = "Invalid bearer token", body = ApiErrorResponse),
    ),
    security(
        (),
        ("bearer" = [])
    ),
    tag = "menu"
)]
#[instrument(skip_all, fields(user_id = caller.as_ref().map(|c| c.user.id)))]
pub async fn list_categories(
    State(state): State<AppState>,
    caller: Option<Caller>,
) -> Result<Json<Vec<CategoryView>>, ApiError> {
    let conn = &mut state.db()?;
    Ok(Json(catalog::list_categories(conn, caller.as_ref())?))
}

#[utoipa::path(
    post,
    path = "/categories",
    request_body = CategoryInput,
    responses(
        (status = 201, description = "Category created", body = CategoryView),
        (status = 400, description = "Invalid category", body = ApiErrorResponse),
        (status = 403, description = "Manager role required", body = ApiErrorResponse),
        (status = 409, description = "Title already used", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "menu"
)]
#[instrument(skip_all, fields(user_id = caller.user.id))]
pub async fn create_category(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(payload): ApiJson<CategoryInput>,
) -> Result<(StatusCode, Json<CategoryView>), ApiError> {
    let conn = &mut state.db()?;
    let category = catalog::create_category(conn, &caller, payload)?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[utoipa::path(
    get,
    path = "/categories/{id}",
    params(("id" = i32, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category", body = CategoryView),
        (status = 404, description = "Category not found", body = ApiErrorResponse),
    ),
    security(
        (),
        ("bearer" = [])
    ),
    tag = "menu"
)]
#[instrument(skip_all, fields(user_id = caller.as_ref().map(|c| c.user.id), category_id = id))]
pub async fn get_category(
    State(state): State<AppState>,
    caller: Option<Caller>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<CategoryView>, ApiError> {
    let conn = &mut state.db()?;
    Ok(Json(catalog::get_category(conn, caller.as_ref(), id)?))
}

#[utoipa::path(
    put,
    path = "/categories/{id}",
    params(("id" = i32, Path, description = "Category id")),
    request_body = CategoryInput,
    responses(
        (status = 200, description = "Category replaced", body = CategoryView),
        (status = 400, description = "Invalid category", body = ApiErrorResponse),
        (status = 403, description = "Manager role required", body = ApiErrorResponse),
        (status = 404, description = "Category not found", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "menu"
)]
#[instrument(skip_all, fields(user_id = caller.user.id, category_id = id))]
pub async fn replace_category(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<CategoryInput>,
) -> Result<Json<CategoryView>, ApiError> {
    let conn = &mut state.db()?;
    Ok(Json(catalog::update_category(
        conn,
        &caller,
        id,
        payload,
        UpdateMode::Replace,
    )?))
}

#[utoipa::path(
    patch,
    path = "/categories/{id}",
    params(("id" = i32, Path, description = "Category id")),
    request_body = CategoryInput,
    responses(
        (status = 200, description = "Category updated", body = CategoryView),
        (status = 400, description = "Invalid category", body = ApiErrorResponse),
        (status = 403, description = "Manager role required", body = ApiErrorResponse),
        (status = 404, description = "Category not found", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "menu"
)]
#[instrument(skip_all, fields(user_id = caller.user.id, category_id = id))]
pub async fn modify_category(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<CategoryInput>,
) -> Result<Json<CategoryView>, ApiError> {
    let conn = &mut state.db()?;
    Ok(Json(catalog::update_category(
        conn,
        &caller,
        id,
        payload,
        UpdateMode::Partial,
    )?))
}

#[utoipa::path(
    delete,
    path = "/categories/{id}",
    params(("id" = i32, Path, description = "Category id")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 403, description = "Manager role required", body = ApiErrorResponse),
        (status = 404, description = "Category not found", body = ApiErrorResponse),
        (status = 409, description = "Category still has menu items", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "menu"
)]
#[instrument(skip_all, fields(user_id = caller.user.id, category_id = id))]
pub async fn delete_category(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<i32>,
) -> Result<StatusCode, ApiError> {
    let conn = &mut state.db()?;
    catalog::delete_category(conn, &caller, id)?;
    Ok(StatusCode::NO_CONTENT)
}
