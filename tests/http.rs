mod common;

use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use common::TestApp;
use serde_json::{Value, json};
use storefront_api::{
    dto::cart::AddToCartRequest,
    middleware::auth::issue_token,
    models::Permission,
    routes::build_router,
    services::cart_service,
};
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

#[tokio::test]
async fn health_is_public() {
    let app = build_router(TestApp::new().state);
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn cart_writes_need_a_session() {
    let app = build_router(TestApp::new().state);
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/cart",
            json!({ "item_id": uuid::Uuid::new_v4() }),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["data"]["error"], "You must be signed in to do that");
}

#[tokio::test]
async fn garbage_token_is_unauthenticated() {
    let app = build_router(TestApp::new().state);
    let response = app
        .oneshot(
            Request::get("/api/me")
                .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signup_sets_a_cookie_that_identifies_the_user() {
    let test_app = TestApp::new();
    let app = build_router(test_app.state.clone());

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/signup",
            json!({ "email": "wes@example.com", "name": "Wes", "password": "pw" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("set-cookie")
        .to_string();
    assert!(cookie.starts_with("token="));
    assert!(cookie.contains("HttpOnly"));
    let pair = cookie.split(';').next().expect("cookie pair").to_string();

    let body = body_json(response).await;
    assert!(body["data"]["user"].get("password_hash").is_none());

    let response = app
        .clone()
        .oneshot(
            Request::get("/api/me")
                .header(header::COOKIE, pair)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["email"], "wes@example.com");
    assert_eq!(body["data"]["permissions"], json!(["USER"]));

    let response = app
        .oneshot(
            Request::post("/api/auth/signout")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let cleared = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("set-cookie");
    assert!(cleared.contains("Max-Age=0"));
}

#[tokio::test]
async fn anonymous_me_is_null() {
    let app = build_router(TestApp::new().state);
    let response = app
        .oneshot(Request::get("/api/me").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn unknown_routes_fall_back_to_404() {
    let app = build_router(TestApp::new().state);
    let response = app
        .oneshot(Request::get("/nope").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn checkout_ignores_a_client_supplied_total() {
    let test_app = TestApp::new();
    let seller = test_app.user("seller@example.com", &[Permission::User]).await;
    let buyer = test_app.user("buyer@example.com", &[Permission::User]).await;
    let lamp = test_app.item(&seller, "Lamp", 1200).await;
    cart_service::add_to_cart(&test_app.state, &buyer, AddToCartRequest { item_id: lamp.id })
        .await
        .expect("add to cart");

    let buyer_id = common::user_id(&buyer);
    let jwt = issue_token(buyer_id, &test_app.state.config).expect("token");
    let mut request = json_request(
        "POST",
        "/api/orders",
        json!({ "token": "tok_visa", "total": 1 }),
    );
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {jwt}").parse().expect("header value"),
    );

    let response = build_router(test_app.state.clone())
        .oneshot(request)
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["order"]["total"], 1200);
    let requests = test_app.payments.requests.lock().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].amount, 1200);
}
