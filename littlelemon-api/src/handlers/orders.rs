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
use crate::serializer::{OrderPlacedView, OrderView};
use crate::services::UpdateMode;
use crate::services::orders::{self, OrderUpdate};

use super::{ApiJson, ApiPath, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders).post(place_order))
        .route(
            "/orders/{id}",
            get(get_order)
                .put(replace_order)
                .patch(modify_order)
                .delete(delete_order),
        )
}

#[utoipa::path(
    get,
    path = "/orders",
    responses(
        (status = 200, description = "Orders visible to the caller", body = [OrderView]),
        (status = 401, description = "Unauthorized", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "orders"
)]
#[instrument(skip_all, fields(user_id = caller.user.id))]
pub async fn list_orders(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<OrderView>>, ApiError> {
    let conn = &mut state.db()?;
    Ok(Json(orders::list_orders(conn, &caller)?))
}

#[utoipa::path(
    post,
    path = "/orders",
    responses(
        (status = 201, description = "Order created from the cart", body = OrderPlacedView),
        (status = 400, description = "Cart is empty", body = ApiErrorResponse),
        (status = 403, description = "Only customers place orders", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "orders"
)]
#[instrument(skip_all, fields(user_id = caller.user.id))]
pub async fn place_order(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<(StatusCode, Json<OrderPlacedView>), ApiError> {
    let conn = &mut state.db()?;
    let order = orders::place_order(conn, &caller)?;
    Ok((
        StatusCode::CREATED,
        Json(OrderPlacedView {
            detail: "Order created successfully".to_string(),
            order_id: order.id,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order details", body = OrderView),
        (status = 401, description = "Unauthorized", body = ApiErrorResponse),
        (status = 404, description = "Order not found", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "orders"
)]
#[instrument(skip_all, fields(user_id = caller.user.id, order_id = id))]
pub async fn get_order(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<OrderView>, ApiError> {
    let conn = &mut state.db()?;
    Ok(Json(orders::get_order(conn, &caller, id)?))
}

#[utoipa::path(
    put,
    path = "/orders/{id}",
    params(("id" = i32, Path, description = "Order id")),
    request_body = OrderUpdate,
    responses(
        (status = 200, description = "Order replaced", body = OrderView),
        (status = 400, description = "Invalid status or delivery crew", body = ApiErrorResponse),
        (status = 403, description = "Manager role required", body = ApiErrorResponse),
        (status = 404, description = "Order not found", body = ApiErrorResponse),
        (status = 409, description = "Delivered orders cannot be reopened", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "orders"
)]
#[instrument(skip_all, fields(user_id = caller.user.id, order_id = id))]
pub async fn replace_order(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<OrderUpdate>,
) -> Result<Json<OrderView>, ApiError> {
    let conn = &mut state.db()?;
    Ok(Json(orders::update_order(
        conn,
        &caller,
        id,
        payload,
        UpdateMode::Replace,
    )?))
}

#[utoipa::path(
    patch,
    path = "/orders/{id}",
    params(("id" = i32, Path, description = "Order id")),
    request_body = OrderUpdate,
    responses(
        (status = 200, description = "Order updated", body = OrderView),
        (status = 400, description = "Invalid status or delivery crew", body = ApiErrorResponse),
        (status = 403, description = "Not allowed to change these fields", body = ApiErrorResponse),
        (status = 404, description = "Order not found", body = ApiErrorResponse),
        (status = 409, description = "Delivered orders cannot be reopened", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "orders"
)]
#[instrument(skip_all, fields(user_id = caller.user.id, order_id = id))]
pub async fn modify_order(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<OrderUpdate>,
) -> Result<Json<OrderView>, ApiError> {
    let conn = &mut state.db()?;
    Ok(Json(orders::update_order(
        conn,
        &caller,
        id,
        payload,
        UpdateMode::Partial,
    )?))
}

#[utoipa::path(
    delete,
    path = "/orders/{id}",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 403, description = "Manager role required", body = ApiErrorResponse),
        (status = 404, description = "Order not found", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "orders"
)]
#[instrument(skip_all, fields(user_id = caller.user.id, order_id = id))]
pub async fn delete_order(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<i32>,
) -> Result<StatusCode, ApiError> {
    let conn = &mut state.db()?;
    orders::delete_order(conn, &caller, id)?;
    Ok(StatusCode::NO_CONTENT)
}
