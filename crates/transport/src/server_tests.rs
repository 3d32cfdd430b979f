// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio::net::TcpListener;

use super::*;
use crate::client;

async fn echo_handler(request: Request) -> Response {
    match (request.method, request.path.as_str()) {
        (Method::Get, "/health") => Response::ok(r#"{"ok":true}"#),
        (Method::Post, "/echo") => Response::ok(request.body),
        _ => Response::new(404, r#"{"error":"not found"}"#),
    }
}

async fn spawn_test_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let handler: Arc<dyn Handler> = Arc::new(echo_handler);
    tokio::spawn(serve(listener, handler));
    addr
}

#[tokio::test]
async fn get_route_is_dispatched() {
    let addr = spawn_test_server().await;
    let response = client::get(&addr, "/health").await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, r#"{"ok":true}"#);
}

#[tokio::test]
async fn post_route_echoes_body() {
    let addr = spawn_test_server().await;
    let response = client::post(&addr, "/echo", r#"{"hi":1}"#).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, r#"{"hi":1}"#);
}

#[tokio::test]
async fn unknown_route_is_404() {
    let addr = spawn_test_server().await;
    let response = client::get(&addr, "/nope").await.unwrap();
    assert_eq!(response.status, 404);
}
