//! End-to-end tests of the HTTP surface.
//!
//! These tests require a PostgreSQL database reachable through `DATABASE_URL`.
//! Each test runs inside a transaction that is rolled back when it finishes.
//!
//! Run with: cargo test -- --ignored

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::json;

use common::{TestApp, unique};

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn requests_without_a_token_are_unauthenticated() {
    let app = TestApp::new();

    let (status, body) = app.call(Method::GET, "/orders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["kind"], "unauthenticated");

    let (status, _) = app
        .call(Method::POST, "/menu-items", None, Some(json!({ "title": "Soup" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    for uri in ["/orders", "/menu-items"] {
        let request = Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, "Bearer not-a-jwt")
            .body(Body::empty())
            .unwrap();
        let (status, _) = app.send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
    }
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn anyone_can_browse_the_menu() {
    let app = TestApp::new();
    let manager = app.manager();
    let title = unique("LemonDessert");
    let id = app.menu_item(&manager, &title, "6.50").await;

    let (status, items) = app
        .call(Method::GET, &format!("/menu-items?search={title}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK, "{items}");
    assert_eq!(items[0]["id"], id);
    assert_eq!(items[0]["price"], "6.50");

    let (status, items) = app
        .call(Method::GET, "/menu-items?search=6.50", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        items.as_array().unwrap().iter().any(|item| item["id"] == id),
        "{items}"
    );

    let (status, item) = app
        .call(Method::GET, &format!("/menu-items/{id}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let category_id = item["category"]["id"].as_i64().unwrap();

    let (status, _) = app.call(Method::GET, "/categories", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, category) = app
        .call(Method::GET, &format!("/categories/{category_id}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(category["id"], category_id);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn registered_users_can_log_in() {
    let app = TestApp::new();
    let username = unique("tilly");

    let (status, user) = app
        .call(
            Method::POST,
            "/users",
            None,
            Some(json!({ "username": username, "password": "lemonade-stand", "email": "t@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{user}");
    assert_eq!(user["username"], username.as_str());
    assert_eq!(user["groups"], json!([]));

    let (status, body) = app
        .call(
            Method::POST,
            "/users",
            None,
            Some(json!({ "username": username, "password": "lemonade-stand" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let form = format!("grant_type=password&username={username}&password=wrong-password");
    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/token")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form))
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let form = format!("grant_type=password&username={username}&password=lemonade-stand");
    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/token")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form))
        .unwrap();
    let (status, token) = app.send(request).await;
    assert_eq!(status, StatusCode::OK, "{token}");
    assert_eq!(token["token_type"], "bearer");

    let request = Request::builder()
        .uri("/users/me")
        .header(
            header::AUTHORIZATION,
            format!("Bearer {}", token["access_token"].as_str().unwrap()),
        )
        .body(Body::empty())
        .unwrap();
    let (status, me) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["user_id"], user["user_id"]);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn catalog_writes_need_a_manager() {
    let app = TestApp::new();
    let manager = app.manager();
    let customer = app.customer();

    let (status, _) = app
        .post("/categories", &customer, json!({ "title": unique("Desserts") }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let item_id = app.menu_item(&manager, "Lemon Dessert", "6.5").await;
    let (status, item) = app.get(&format!("/menu-items/{item_id}"), &customer).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["price"], "6.50");

    let (status, body) = app
        .post(
            "/menu-items",
            &manager,
            json!({
                "title": "Lemon Dessert",
                "price": "7.00",
                "category_id": item["category"]["id"],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["fields"]["title"].is_array());
    assert!(body["error"]["fields"]["category_id"].is_array());

    let (status, _) = app
        .patch(&format!("/menu-items/{item_id}"), &customer, json!({ "featured": true }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, item) = app
        .patch(&format!("/menu-items/{item_id}"), &manager, json!({ "featured": true }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["featured"], true);
    assert_eq!(item["title"], "Lemon Dessert");
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn cart_holds_one_line_per_item() {
    let app = TestApp::new();
    let manager = app.manager();
    let customer = app.customer();
    let item_id = app.menu_item(&manager, "Greek Salad", "12.50").await;

    let (status, line) = app
        .post("/cart/menu-items", &customer, json!({ "menuitem_id": item_id, "quantity": 2 }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{line}");
    assert_eq!(line["unit_price"], "12.50");
    assert_eq!(line["price"], "25.00");

    let (status, body) = app
        .post("/cart/menu-items", &customer, json!({ "menuitem_id": item_id, "quantity": 1 }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["message"], "This menu item is already in your cart");

    let (status, body) = app
        .post("/cart/menu-items", &customer, json!({ "menuitem_id": item_id, "quantity": 0 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["fields"]["quantity"].is_array());

    let (status, _) = app.get("/cart/menu-items", &manager).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.delete("/cart/menu-items", &customer).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, lines) = app.get("/cart/menu-items", &customer).await;
    assert_eq!(lines, json!([]));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn empty_cart_cannot_be_ordered() {
    let app = TestApp::new();
    let customer = app.customer();

    let (status, body) = app.post("/orders", &customer, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "No items in cart to order");

    let (_, orders) = app.get("/orders", &customer).await;
    assert_eq!(orders, json!([]));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn placing_an_order_moves_the_cart_into_it() {
    let app = TestApp::new();
    let manager = app.manager();
    let customer = app.customer();
    let salad = app.menu_item(&manager, "Greek Salad", "12.50").await;
    let bread = app.menu_item(&manager, "Bruschetta", "5.00").await;

    app.post("/cart/menu-items", &customer, json!({ "menuitem_id": salad, "quantity": 2 }))
        .await;
    app.post("/cart/menu-items", &customer, json!({ "menuitem_id": bread, "quantity": 1 }))
        .await;

    let (status, placed) = app.post("/orders", &customer, json!({})).await;
    assert_eq!(status, StatusCode::CREATED, "{placed}");
    assert_eq!(placed["detail"], "Order created successfully");
    let order_id = placed["order_id"].as_i64().unwrap();

    let (_, cart) = app.get("/cart/menu-items", &customer).await;
    assert_eq!(cart, json!([]));

    let (status, order) = app.get(&format!("/orders/{order_id}"), &customer).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["total"], "30.00");
    assert_eq!(order["status"], false);
    assert_eq!(order["delivery_crew"], json!(null));
    assert_eq!(order["items"].as_array().unwrap().len(), 2);
    assert!(order.get("user_id").is_none());

    let (_, order) = app.get(&format!("/orders/{order_id}"), &manager).await;
    assert_eq!(order["user"], customer.username.as_str());
    assert_eq!(order["user_id"], customer.id);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn customers_only_see_their_own_orders() {
    let app = TestApp::new();
    let manager = app.manager();
    let alice = app.customer();
    let bob = app.customer();
    let item = app.menu_item(&manager, "Lemon Cake", "4.00").await;

    app.post("/cart/menu-items", &alice, json!({ "menuitem_id": item, "quantity": 1 }))
        .await;
    let (_, placed) = app.post("/orders", &alice, json!({})).await;
    let order_id = placed["order_id"].as_i64().unwrap();

    let (status, _) = app.get(&format!("/orders/{order_id}"), &bob).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, bobs) = app.get("/orders", &bob).await;
    assert_eq!(bobs, json!([]));

    let (status, _) = app.post("/orders", &manager, json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn delivery_crew_only_marks_assigned_orders_delivered() {
    let app = TestApp::new();
    let manager = app.manager();
    let crew = app.crew();
    let customer = app.customer();
    let item = app.menu_item(&manager, "Pasta", "9.00").await;

    app.post("/cart/menu-items", &customer, json!({ "menuitem_id": item, "quantity": 1 }))
        .await;
    let (_, placed) = app.post("/orders", &customer, json!({})).await;
    let uri = format!("/orders/{}", placed["order_id"]);

    let (status, body) = app
        .patch(&uri, &manager, json!({ "delivery_crew_id": customer.id }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["fields"]["delivery_crew_id"].is_array());

    let (status, _) = app.get(&uri, &crew).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, order) = app
        .patch(&uri, &manager, json!({ "delivery_crew_id": crew.id }))
        .await;
    assert_eq!(status, StatusCode::OK, "{order}");
    assert_eq!(order["delivery_crew_id"], crew.id);

    let (_, assigned) = app.get("/orders", &crew).await;
    assert_eq!(assigned.as_array().unwrap().len(), 1);

    let (status, _) = app
        .patch(&uri, &crew, json!({ "status": true, "delivery_crew_id": null }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, order) = app.patch(&uri, &crew, json!({ "status": true })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], true);

    let (status, _) = app.patch(&uri, &manager, json!({ "status": false })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app.call(Method::PUT, &uri, Some(&crew), Some(json!({ "status": true }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.delete(&uri, &manager).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&uri, &manager).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn promotion_and_demotion_are_not_idempotent() {
    let app = TestApp::new();
    let manager = app.manager();
    let customer = app.customer();

    let (status, user) = app
        .post("/groups/delivery-crew/users", &manager, json!({ "user_id": customer.id }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{user}");
    assert_eq!(user["groups"], json!(["Delivery Crew"]));

    let (status, _) = app
        .post("/groups/delivery-crew/users", &manager, json!({ "user_id": customer.id }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, members) = app.get("/groups/delivery-crew/users", &manager).await;
    assert!(
        members
            .as_array()
            .unwrap()
            .iter()
            .any(|m| m["user_id"] == customer.id)
    );

    let uri = format!("/groups/delivery-crew/users/{}", customer.id);
    let (status, body) = app.delete(&uri, &manager).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["detail"],
        format!("User {} removed from Delivery Crew group.", customer.username)
    );
    let (status, _) = app.delete(&uri, &manager).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app.post("/groups/manager/users", &manager, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "No user_id field provided in body");

    let (status, _) = app
        .post("/groups/manager/users", &customer, json!({ "user_id": customer.id }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get("/groups/kitchen/users", &manager).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
