//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use subtrack_core::config::{
    AppConfig, AuthConfig, ClassifierConfig, FeedConfig, SupabaseConfig,
};
use subtrack_core::test_utils::MockSupabaseServer;
use tower::ServiceExt;

/// Build a router wired to a mock Supabase server and the mock classifier.
///
/// The mock server handle must stay alive for the duration of the test.
async fn setup_test_app() -> (Router, MockSupabaseServer) {
    let supabase = MockSupabaseServer::start().await;
    let config = AppConfig {
        auth: AuthConfig {
            jwt_secret: "test-secret".to_string(),
            token_expire_minutes: 30,
        },
        classifier: ClassifierConfig::mock(),
        supabase: SupabaseConfig {
            url: supabase.url(),
            service_role_key: "test-key".to_string(),
        },
        feed: FeedConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            credentials: None,
        },
    };
    let app = create_router(Arc::new(AppState::from_config(config)));
    (app, supabase)
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn authed_json_request(
    method: &str,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// Sign up and log in a test user, returning the access token
async fn register_and_login(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/signup",
            serde_json::json!({ "email": "user@example.com", "password": "hunter2" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from("username=user%40example.com&password=hunter2"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["token_type"], "bearer");
    json["access_token"].as_str().unwrap().to_string()
}

// ========== Auth tests ==========

#[tokio::test]
async fn test_signup_rejects_duplicate_email() {
    let (app, _supabase) = setup_test_app().await;

    let body = serde_json::json!({ "email": "dup@example.com", "password": "pw" });
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/auth/signup", body.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/auth/signup", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = get_body_json(response).await;
    assert_eq!(json["error"], "Email already registered");
}

#[tokio::test]
async fn test_signup_rejects_invalid_email() {
    let (app, _supabase) = setup_test_app().await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth/signup",
            serde_json::json!({ "email": "not-an-email", "password": "pw" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_rejects_wrong_password() {
    let (app, _supabase) = setup_test_app().await;

    let _token = register_and_login(&app).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from("username=user%40example.com&password=wrong"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let (app, _supabase) = setup_test_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/subscriptions")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/subscriptions")
                .header("authorization", "Bearer not-a-valid-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ========== Subscription tests ==========

#[tokio::test]
async fn test_create_list_delete_subscription() {
    let (app, _supabase) = setup_test_app().await;
    let token = register_and_login(&app).await;

    // Create with defaults filled in
    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/subscriptions",
            &token,
            serde_json::json!({
                "title": "Netflix",
                "amount": 99.0,
                "renewal_date": "2024-03-16"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let created = get_body_json(response).await;
    assert_eq!(created["title"], "Netflix");
    assert_eq!(created["category"], "uncategorized");
    assert_eq!(created["currency"], "DKK");
    assert_eq!(created["frequency"], "monthly");
    assert_eq!(created["source"], "manual");
    let id = created["id"].as_i64().unwrap();

    // List
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/subscriptions")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = get_body_json(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    // Delete
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/subscriptions/{}", id))
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Gone from the listing (soft delete)
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/subscriptions")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let listed = get_body_json(response).await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_unknown_subscription_is_404() {
    let (app, _supabase) = setup_test_app().await;
    let token = register_and_login(&app).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/subscriptions/4242")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_user_summary() {
    let (app, _supabase) = setup_test_app().await;
    let token = register_and_login(&app).await;

    for (title, amount, category) in [
        ("Netflix", 99.0, "Streaming & Entertainment"),
        ("Spotify", 109.0, "Streaming & Entertainment"),
        ("Tryg", 249.0, "Insurance & Pension"),
    ] {
        let response = app
            .clone()
            .oneshot(authed_json_request(
                "POST",
                "/api/subscriptions",
                &token,
                serde_json::json!({
                    "title": title,
                    "amount": amount,
                    "renewal_date": "2024-03-16",
                    "category": category
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/user/summary")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["monthly_total"], 457.0);
    assert_eq!(json["top3_expensive"][0]["title"], "Tryg");
    assert_eq!(json["category_spending"][0]["total"], 249.0);
    assert_eq!(
        json["category_spending"][1]["category"],
        "Streaming & Entertainment"
    );
}

// ========== Detection tests ==========

#[tokio::test]
async fn test_analyze_transactions_endpoint() {
    let (app, _supabase) = setup_test_app().await;
    let token = register_and_login(&app).await;

    let transaction = |date: &str| {
        serde_json::json!({
            "descriptions": { "display": "OPENAI *CHATGPT" },
            "amount": { "value": { "unscaledValue": 9900, "scale": 2 }, "currencyCode": "DKK" },
            "dates": { "booked": date }
        })
    };

    let response = app
        .oneshot(authed_json_request(
            "POST",
            "/api/detect/transactions",
            &token,
            serde_json::json!({
                "transactions": [transaction("2024-01-15"), transaction("2024-02-15")]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    let subscriptions = json["subscriptions"].as_array().unwrap();
    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions[0]["name"], "OpenAI");
    assert_eq!(subscriptions[0]["amount"], 99.0);
    assert_eq!(subscriptions[0]["source"], "api-feed");
    assert_eq!(subscriptions[0]["renewal_date"], "2024-03-16");
}

#[tokio::test]
async fn test_analyze_statement_rejects_non_pdf() {
    let (app, _supabase) = setup_test_app().await;
    let token = register_and_login(&app).await;

    let boundary = "test-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"statement.txt\"\r\n\
         Content-Type: text/plain\r\n\r\nnot a pdf\r\n--{b}--\r\n",
        b = boundary
    );

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/detect/statement")
                .header("authorization", format!("Bearer {}", token))
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={}", boundary),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = get_body_json(response).await;
    assert_eq!(json["error"], "Only PDF files are supported");
}

// ========== Feed tests ==========

#[tokio::test]
async fn test_feed_token_unconfigured_is_503() {
    let (app, _supabase) = setup_test_app().await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/feed/token",
            serde_json::json!({ "code": "abc" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
