//! Shared harness for the HTTP tests.
//!
//! Every [`TestApp`] owns a single-connection pool whose connection sits in a
//! test transaction, so nothing a test writes outlives it.

#![allow(dead_code)]

use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use chrono::{TimeDelta, Utc};
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection, Pool};
use http_body_util::BodyExt;
use littlelemon_api::auth::TokenIssuer;
use littlelemon_api::handlers::{AppState, app};
use littlelemon_api::models::{NewUser, UserGroup};
use littlelemon_api::roles::{self, RoleGroup};
use littlelemon_api::schema::{user_groups, users};
use littlelemon_api::{DbPool, run_migrations};
use serde_json::Value;
use tower::ServiceExt;

static MIGRATE: Once = Once::new();
static SEQ: AtomicUsize = AtomicUsize::new(0);

fn database_url() -> String {
    dotenvy::dotenv().ok();
    std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests")
}

#[derive(Debug)]
struct TestTransaction;

impl CustomizeConnection<PgConnection, r2d2::Error> for TestTransaction {
    fn on_acquire(&self, conn: &mut PgConnection) -> Result<(), r2d2::Error> {
        conn.begin_test_transaction().map_err(r2d2::Error::QueryError)
    }
}

/// A name no other running test will use.
pub fn unique(prefix: &str) -> String {
    format!(
        "{prefix}-{}-{}",
        std::process::id(),
        SEQ.fetch_add(1, Ordering::Relaxed)
    )
}

pub struct TestUser {
    pub id: i32,
    pub username: String,
    pub token: String,
}

pub struct TestApp {
    router: Router,
    pool: DbPool,
    tokens: TokenIssuer,
}

impl TestApp {
    pub fn new() -> Self {
        let database_url = database_url();
        MIGRATE.call_once(|| {
            let mut conn = PgConnection::establish(&database_url).expect("connect for migrations");
            run_migrations(&mut conn).expect("run migrations");
        });

        let pool = Pool::builder()
            .max_size(1)
            .connection_customizer(Box::new(TestTransaction))
            .build(ConnectionManager::<PgConnection>::new(database_url))
            .expect("build test pool");
        let state = AppState::new(pool.clone(), TokenIssuer::new("test-secret", TimeDelta::hours(1)));

        Self {
            router: app(state),
            pool,
            tokens: TokenIssuer::new("test-secret", TimeDelta::hours(1)),
        }
    }

    /// Inserts a user directly and returns a token for it.
    pub fn user(&self, prefix: &str, groups: &[RoleGroup], is_superuser: bool) -> TestUser {
        let username = unique(prefix);
        let conn = &mut self.pool.get().expect("test connection");

        let id = diesel::insert_into(users::table)
            .values(&NewUser {
                username: &username,
                email: "",
                first_name: "",
                last_name: "",
                password_hash: "!",
                is_superuser,
                date_joined: Utc::now(),
            })
            .returning(users::id)
            .get_result::<i32>(conn)
            .expect("insert user");
        for group in groups {
            diesel::insert_into(user_groups::table)
                .values(&UserGroup {
                    user_id: id,
                    group_id: roles::group_id(conn, *group).expect("seeded group"),
                })
                .execute(conn)
                .expect("insert membership");
        }

        TestUser {
            id,
            username,
            token: self.tokens.issue(id).expect("issue token").access_token,
        }
    }

    pub fn customer(&self) -> TestUser {
        self.user("customer", &[], false)
    }

    pub fn manager(&self) -> TestUser {
        self.user("manager", &[RoleGroup::Manager], false)
    }

    pub fn crew(&self) -> TestUser {
        self.user("crew", &[RoleGroup::DeliveryCrew], false)
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("JSON body")
        };
        (status, body)
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        user: Option<&TestUser>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", user.token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("valid request");
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, user: &TestUser) -> (StatusCode, Value) {
        self.call(Method::GET, uri, Some(user), None).await
    }

    pub async fn post(&self, uri: &str, user: &TestUser, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(user), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, user: &TestUser, body: Value) -> (StatusCode, Value) {
        self.call(Method::PATCH, uri, Some(user), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, user: &TestUser) -> (StatusCode, Value) {
        self.call(Method::DELETE, uri, Some(user), None).await
    }

    /// Creates a category and one item in it, returning the item id.
    pub async fn menu_item(&self, manager: &TestUser, title: &str, price: &str) -> i32 {
        let (status, category) = self
            .post(
                "/categories",
                manager,
                serde_json::json!({ "title": unique("Mains") }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{category}");

        let (status, item) = self
            .post(
                "/menu-items",
                manager,
                serde_json::json!({
                    "title": title,
                    "price": price,
                    "featured": false,
                    "category_id": category["id"],
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{item}");
        item["id"].as_i64().expect("item id") as i32
    }
}
