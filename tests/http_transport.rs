use axum::extract::RawQuery;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bp_console::transport::api::ConsoleApi;
use bp_console::transport::http::HttpTransport;
use bp_console::transport::{Base64Cipher, Method, Payload, Transport, TransportError};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;

async fn echo_query(RawQuery(query): RawQuery) -> String {
    query.unwrap_or_default()
}

async fn echo_body(headers: HeaderMap, body: String) -> Json<Value> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    Json(json!({"content_type": content_type, "body": body}))
}

async fn echo_cookie(headers: HeaderMap) -> String {
    headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn sealed() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        STANDARD.encode(r#"{"file_path":"/etc/bp/acl.txt","content":"proxy *"}"#),
    )
}

async fn serve() -> String {
    let app = Router::new()
        .route("/api/echo-query", get(echo_query))
        .route("/api/echo-body", post(echo_body))
        .route("/api/cookie", get(echo_cookie))
        .route(
            "/api/json",
            get(|| async { Json(json!({"file_path": "/etc/bp/config.json"})) }),
        )
        .route("/api/text", get(|| async { "line 1\nline 2" }))
        .route("/api/empty", post(|| async { StatusCode::OK }))
        .route(
            "/api/missing",
            get(|| async { (StatusCode::NOT_FOUND, "config file not found") }),
        )
        .route("/api/blank", get(|| async { StatusCode::SERVICE_UNAVAILABLE }))
        .route("/api/config/query_acl", get(sealed));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn get_encodes_parameters_into_query_string() {
    let transport = HttpTransport::new(&serve().await).unwrap();

    let payload = transport
        .call(
            Method::Get,
            "/api/echo-query",
            Some(json!({"hostname": "proxy.local", "lines": 200, "skip": null})),
        )
        .await
        .unwrap();

    assert_eq!(
        payload,
        Payload::Text("hostname=proxy.local&lines=200".to_string())
    );
}

#[tokio::test]
async fn json_and_text_bodies_are_told_apart() {
    let transport = HttpTransport::new(&serve().await).unwrap();

    let json_reply = transport.call(Method::Get, "/api/json", None).await.unwrap();
    assert_eq!(
        json_reply,
        Payload::Json(json!({"file_path": "/etc/bp/config.json"}))
    );

    let text_reply = transport.call(Method::Get, "/api/text", None).await.unwrap();
    assert_eq!(text_reply, Payload::Text("line 1\nline 2".to_string()));

    let empty_reply = transport.call(Method::Post, "/api/empty", None).await.unwrap();
    assert_eq!(empty_reply, Payload::Empty);
}

#[tokio::test]
async fn rejected_status_carries_server_message_or_reason() {
    let transport = HttpTransport::new(&serve().await).unwrap();

    let missing = transport.call(Method::Get, "/api/missing", None).await;
    assert_eq!(
        missing,
        Err(TransportError::Rejected {
            status: 404,
            message: "config file not found".to_string(),
        })
    );

    let blank = transport.call(Method::Get, "/api/blank", None).await;
    assert_eq!(
        blank,
        Err(TransportError::Rejected {
            status: 503,
            message: "Service Unavailable".to_string(),
        })
    );
}

#[tokio::test]
async fn post_sends_pretty_json() {
    let transport = HttpTransport::new(&serve().await).unwrap();
    let body = json!({"modify_type": "acl", "content": "proxy *"});

    let reply = transport
        .call(Method::Post, "/api/echo-body", Some(body.clone()))
        .await
        .unwrap()
        .into_json()
        .unwrap();

    assert_eq!(reply["content_type"], "application/json");
    assert_eq!(
        reply["body"].as_str().unwrap(),
        serde_json::to_string_pretty(&body).unwrap()
    );
}

#[tokio::test]
async fn cookie_is_attached_to_every_request() {
    let transport = HttpTransport::new(&serve().await)
        .unwrap()
        .with_cookie("session=abc123");

    let reply = transport.call(Method::Get, "/api/cookie", None).await.unwrap();
    assert_eq!(reply, Payload::Text("session=abc123".to_string()));
}

#[tokio::test]
async fn cipher_seals_requests_and_opens_responses() {
    let transport = HttpTransport::new(&serve().await)
        .unwrap()
        .with_cipher(Arc::new(Base64Cipher));

    let query = transport
        .call(Method::Get, "/api/echo-query", Some(json!({"hostname": "proxy.local"})))
        .await
        .unwrap()
        .into_text();
    assert_eq!(
        STANDARD.decode(query).unwrap(),
        b"hostname=proxy.local".to_vec()
    );

    let body = json!({"hostname": "proxy.local"});
    let reply = transport
        .call(Method::Post, "/api/echo-body", Some(body.clone()))
        .await
        .unwrap()
        .into_json()
        .unwrap();
    let sealed_body = reply["body"].as_str().unwrap();
    assert_eq!(
        String::from_utf8(STANDARD.decode(sealed_body).unwrap()).unwrap(),
        serde_json::to_string_pretty(&body).unwrap()
    );

    let api = ConsoleApi::new(Arc::new(transport));
    let acl = api.query_acl().await.unwrap();
    assert_eq!(acl.file_path.as_deref(), Some("/etc/bp/acl.txt"));
    assert_eq!(acl.content.as_deref(), Some("proxy *"));
}
