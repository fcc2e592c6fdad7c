pub mod accounts;
pub mod cart;
pub mod catalog;
pub mod groups;
pub mod orders;

use std::sync::Arc;

use axum::Router;
use axum::extract::{FromRequest, FromRequestParts};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::TokenIssuer;
use crate::error::ApiError;
use crate::{DbConn, DbPool};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub tokens: Arc<TokenIssuer>,
}

impl AppState {
    pub fn new(pool: DbPool, tokens: TokenIssuer) -> Self {
        Self {
            pool,
            tokens: Arc::new(tokens),
        }
    }

    pub fn db(&self) -> Result<DbConn, ApiError> {
        Ok(self.pool.get()?)
    }
}

/// JSON body whose rejections use the service's error format.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// Form body whose rejections use the service's error format.
#[derive(FromRequest)]
#[from_request(via(axum::Form), rejection(ApiError))]
pub struct ApiForm<T>(pub T);

pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(accounts::router())
        .merge(catalog::router())
        .merge(cart::router())
        .merge(orders::router())
        .merge(groups::router())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        accounts::register,
        accounts::issue_token,
        accounts::me,
        catalog::list_menu_items,
        catalog::create_menu_item,
        catalog::get_menu_item,
        catalog::replace_menu_item,
        catalog::modify_menu_item,
        catalog::delete_menu_item,
        catalog::list_categories,
        catalog::create_category,
        catalog::get_category,
        catalog::replace_category,
        catalog::modify_category,
        catalog::delete_category,
        cart::list_cart,
        cart::add_to_cart,
        cart::clear_cart,
        orders::list_orders,
        orders::place_order,
        orders::get_order,
        orders::replace_order,
        orders::modify_order,
        orders::delete_order,
        groups::list_members,
        groups::add_member,
        groups::remove_member,
    ),
    components(
        schemas(
            crate::services::accounts::RegisterInput,
            crate::services::accounts::TokenRequest,
            crate::services::catalog::MenuItemInput,
            crate::services::catalog::CategoryInput,
            crate::services::cart::CartLineInput,
            crate::services::orders::OrderUpdate,
            crate::services::staff::MembershipInput,
            crate::auth::IssuedToken,
            crate::serializer::UserView,
            crate::serializer::CategoryView,
            crate::serializer::MenuItemView,
            crate::serializer::CartLineView,
            crate::serializer::OrderLineView,
            crate::serializer::CustomerOrderView,
            crate::serializer::StaffOrderView,
            crate::serializer::OrderView,
            crate::serializer::DetailView,
            crate::serializer::OrderPlacedView,
            crate::error::ApiErrorResponse,
            crate::error::ErrorDetail,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "users", description = "Registration and profiles"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "menu", description = "Menu items and categories"),
        (name = "cart", description = "Customer cart"),
        (name = "orders", description = "Order placement and fulfilment"),
        (name = "groups", description = "Manager and Delivery Crew membership")
    ),
    info(
        title = "Little Lemon API",
        description = "Restaurant menu, cart and order management",
        version = "1.0.0"
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            use utoipa::openapi::security::*;
            let password_flow = Password::new("/auth/token", Scopes::default());
            components.add_security_scheme(
                "bearer",
                SecurityScheme::OAuth2(OAuth2::new([Flow::Password(password_flow)])),
            );
        }
    }
}
