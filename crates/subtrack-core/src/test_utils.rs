//! Test utilities for subtrack-core
//!
//! Mock HTTP servers standing in for the external collaborators: the
//! Supabase REST facade and the OpenAI-compatible classifier endpoint.
//! Used by unit tests here and by the server crate's handler tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Json, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use tokio::sync::oneshot;

// ========== Mock Supabase ==========

/// In-memory tables behind the mock REST facade
#[derive(Default)]
struct MockStoreState {
    users: Mutex<Vec<Value>>,
    subscriptions: Mutex<Vec<Value>>,
    events: Mutex<Vec<Value>>,
    next_id: AtomicI64,
}

impl MockStoreState {
    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Mock Supabase server for testing
pub struct MockSupabaseServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockSupabaseServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let state = Arc::new(MockStoreState::default());
        let app = Router::new()
            .route(
                "/rest/v1/users",
                get(list_users).post(create_user).patch(patch_users),
            )
            .route(
                "/rest/v1/subscriptions",
                get(list_subscriptions)
                    .post(create_subscription)
                    .patch(patch_subscriptions),
            )
            .route("/rest/v1/analytics_events", post(create_event))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockSupabaseServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Apply PostgREST-style `column=eq.value` filters to a row
fn row_matches(row: &Value, filters: &HashMap<String, String>) -> bool {
    for (column, raw) in filters {
        if matches!(column.as_str(), "select" | "order" | "limit") {
            continue;
        }
        let Some(expected) = raw.strip_prefix("eq.") else {
            continue;
        };
        let matched = match row.get(column) {
            Some(Value::String(s)) => s == expected,
            Some(Value::Number(n)) => n.to_string() == expected,
            Some(Value::Bool(b)) => b.to_string() == expected,
            _ => false,
        };
        if !matched {
            return false;
        }
    }
    true
}

fn merge_patch(row: &mut Value, patch: &Value) {
    if let (Some(row_map), Some(patch_map)) = (row.as_object_mut(), patch.as_object()) {
        for (key, value) in patch_map {
            row_map.insert(key.clone(), value.clone());
        }
    }
}

async fn list_users(
    State(state): State<Arc<MockStoreState>>,
    Query(filters): Query<HashMap<String, String>>,
) -> Json<Vec<Value>> {
    let users = state.users.lock().unwrap();
    Json(
        users
            .iter()
            .filter(|row| row_matches(row, &filters))
            .cloned()
            .collect(),
    )
}

async fn create_user(
    State(state): State<Arc<MockStoreState>>,
    Json(mut body): Json<Value>,
) -> (StatusCode, Json<Vec<Value>>) {
    let id = state.allocate_id();
    merge_patch(
        &mut body,
        &json!({
            "id": id,
            "last_login": null,
            "created_at": "2024-01-01T00:00:00+00:00",
        }),
    );
    state.users.lock().unwrap().push(body.clone());
    (StatusCode::CREATED, Json(vec![body]))
}

async fn patch_users(
    State(state): State<Arc<MockStoreState>>,
    Query(filters): Query<HashMap<String, String>>,
    Json(patch): Json<Value>,
) -> Json<Vec<Value>> {
    let mut users = state.users.lock().unwrap();
    for row in users.iter_mut() {
        if row_matches(row, &filters) {
            merge_patch(row, &patch);
        }
    }
    Json(Vec::new())
}

async fn list_subscriptions(
    State(state): State<Arc<MockStoreState>>,
    Query(filters): Query<HashMap<String, String>>,
) -> Json<Vec<Value>> {
    let subscriptions = state.subscriptions.lock().unwrap();
    Json(
        subscriptions
            .iter()
            .filter(|row| row_matches(row, &filters))
            .cloned()
            .collect(),
    )
}

async fn create_subscription(
    State(state): State<Arc<MockStoreState>>,
    Json(mut body): Json<Value>,
) -> (StatusCode, Json<Vec<Value>>) {
    let id = state.allocate_id();
    merge_patch(
        &mut body,
        &json!({
            "id": id,
            "is_active": true,
            "created_at": "2024-01-01T00:00:00+00:00",
        }),
    );
    state.subscriptions.lock().unwrap().push(body.clone());
    (StatusCode::CREATED, Json(vec![body]))
}

async fn patch_subscriptions(
    State(state): State<Arc<MockStoreState>>,
    Query(filters): Query<HashMap<String, String>>,
    Json(patch): Json<Value>,
) -> Json<Vec<Value>> {
    let mut subscriptions = state.subscriptions.lock().unwrap();
    for row in subscriptions.iter_mut() {
        if row_matches(row, &filters) {
            merge_patch(row, &patch);
        }
    }
    Json(Vec::new())
}

async fn create_event(
    State(state): State<Arc<MockStoreState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Vec<Value>>) {
    state.events.lock().unwrap().push(body);
    (StatusCode::CREATED, Json(Vec::new()))
}

// ========== Mock classifier (OpenAI-compatible) ==========

/// Mock chat-completions server returning a canned reply
pub struct MockClassifierServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockClassifierServer {
    /// Start the mock server; every completion request gets `reply` back
    pub async fn start(reply: &str) -> Self {
        let reply = Arc::new(reply.to_string());
        let app = Router::new()
            .route("/v1/models", get(handle_models))
            .route(
                "/v1/chat/completions",
                post({
                    let reply = reply.clone();
                    move |_body: Json<Value>| {
                        let reply = reply.clone();
                        async move {
                            Json(json!({
                                "choices": [
                                    { "message": { "role": "assistant", "content": reply.as_str() } }
                                ]
                            }))
                        }
                    }
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockClassifierServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_models() -> Json<Value> {
    Json(json!({ "data": [ { "id": "gpt-4o-mini" } ] }))
}
