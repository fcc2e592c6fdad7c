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
use crate::serializer::CartLineView;
use crate::services::cart::{self, CartLineInput};

use super::{ApiJson, AppState};

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/cart/menu-items",
        get(list_cart).post(add_to_cart).delete(clear_cart),
    )
}

#[utoipa::path(
    get,
    path = "/cart/menu-items",
    responses(
        (status = 200, description = "Lines in the caller's cart", body = [CartLineView]),
        (status = 401, description = "Unauthorized", body = ApiErrorResponse),
        (status = 403, description = "Only customers have a cart", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "cart"
)]
#[instrument(skip_all, fields(user_id = caller.user.id))]
pub async fn list_cart(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<CartLineView>>, ApiError> {
    let conn = &mut state.db()?;
    Ok(Json(cart::list(conn, &caller)?))
}

#[utoipa::path(
    post,
    path = "/cart/menu-items",
    request_body = CartLineInput,
    responses(
        (status = 201, description = "Line added", body = CartLineView),
        (status = 400, description = "Invalid quantity or missing field", body = ApiErrorResponse),
        (status = 403, description = "Only customers have a cart", body = ApiErrorResponse),
        (status = 404, description = "Menu item not found", body = ApiErrorResponse),
        (status = 409, description = "Menu item already in the cart", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "cart"
)]
#[instrument(skip_all, fields(user_id = caller.user.id))]
pub async fn add_to_cart(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(payload): ApiJson<CartLineInput>,
) -> Result<(StatusCode, Json<CartLineView>), ApiError> {
    let conn = &mut state.db()?;
    let line = cart::add_item(conn, &caller, payload)?;
    Ok((StatusCode::CREATED, Json(line)))
}

#[utoipa::path(
    delete,
    path = "/cart/menu-items",
    responses(
        (status = 204, description = "Cart emptied"),
        (status = 403, description = "Only customers have a cart", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "cart"
)]
#[instrument(skip_all, fields(user_id = caller.user.id))]
pub async fn clear_cart(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<StatusCode, ApiError> {
    let conn = &mut state.db()?;
    let removed = cart::clear(conn, &caller)?;
    tracing::debug!(removed, "cart cleared");
    Ok(StatusCode::NO_CONTENT)
}
