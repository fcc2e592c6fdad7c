use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use tracing::instrument;

use crate::auth::{Caller, IssuedToken};
use crate::error::{ApiError, ApiErrorResponse};
use crate::serializer::UserView;
use crate::services::accounts::{self, RegisterInput, TokenRequest};

use super::{ApiForm, ApiJson, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", post(register))
        .route("/users/me", get(me))
        .route("/auth/token", post(issue_token))
}

#[utoipa::path(
    post,
    path = "/users",
    request_body = RegisterInput,
    responses(
        (status = 201, description = "User created successfully", body = UserView),
        (status = 400, description = "Invalid username or password", body = ApiErrorResponse),
        (status = 409, description = "Username already taken", body = ApiErrorResponse),
    ),
    tag = "users"
)]
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterInput>,
) -> Result<(StatusCode, Json<UserView>), ApiError> {
    let conn = &mut state.db()?;
    let user = accounts::register(conn, payload)?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    post,
    path = "/auth/token",
    request_body(content = TokenRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Token issued successfully", body = IssuedToken),
        (status = 401, description = "Invalid credentials", body = ApiErrorResponse),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn issue_token(
    State(state): State<AppState>,
    ApiForm(payload): ApiForm<TokenRequest>,
) -> Result<Json<IssuedToken>, ApiError> {
    let conn = &mut state.db()?;
    Ok(Json(accounts::authenticate(conn, &state.tokens, payload)?))
}

#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "The authenticated user", body = UserView),
        (status = 401, description = "Unauthorized", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "users"
)]
#[instrument(skip_all, fields(user_id = caller.user.id))]
pub async fn me(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<UserView>, ApiError> {
    let conn = &mut state.db()?;
    Ok(Json(accounts::profile(conn, &caller)?))
}
