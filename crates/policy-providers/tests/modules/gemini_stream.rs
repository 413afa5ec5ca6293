//! Tests for the Gemini provider against a local stub server
//!
//! The stub speaks the `streamGenerateContent?alt=sse` wire format, so the
//! full request, status handling and incremental decoding path is exercised.

use std::time::Duration;

use axum::Router;
use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse as _, Response};
use axum::routing::post;
use futures::StreamExt as _;
use policy_core::{Error, GenerationProvider as _, Prompt};
use policy_providers::GeminiProvider;
use serde_json::{Value, json};
use tokio::net::TcpListener;

async fn spawn_stub(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{address}/v1beta")
}

fn sse_event(text: &str) -> String {
    format!(
        "data: {}\r\n\r\n",
        json!({"candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]})
    )
}

async fn generate(
    Path(action): Path<String>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<Value>,
) -> Response {
    if headers.get("x-goog-api-key").and_then(|value| value.to_str().ok()) != Some("test-key") {
        return (StatusCode::UNAUTHORIZED, "bad key").into_response();
    }
    if action != "gemini-test:streamGenerateContent" {
        return (StatusCode::NOT_FOUND, action).into_response();
    }
    let question = body["contents"][0]["parts"][0]["text"]
        .as_str()
        .unwrap_or_default()
        .to_owned();
    let events = [
        sse_event("You asked: "),
        sse_event(&question),
        "data: {\"usageMetadata\": {\"promptTokenCount\": 4}}\r\n\r\n".to_owned(),
    ]
    .concat();
    ([(header::CONTENT_TYPE, "text/event-stream")], events).into_response()
}

fn prompt(user: &str) -> Prompt {
    Prompt {
        system: "Answer only from context.".to_owned(),
        user: user.to_owned(),
    }
}

#[tokio::test]
async fn test_streams_increments_from_sse() {
    let base = spawn_stub(Router::new().route("/v1beta/models/{action}", post(generate))).await;
    let provider =
        GeminiProvider::new("test-key", "gemini-test", base, Duration::from_secs(5)).unwrap();

    let stream = provider.stream(&prompt("leave policy?")).await.unwrap();
    let increments: Vec<String> = stream.map(Result::unwrap).collect().await;

    assert_eq!(increments, vec!["You asked: ", "leave policy?"]);
}

#[tokio::test]
async fn test_error_status_fails_before_streaming() {
    let router = Router::new().route(
        "/v1beta/models/{action}",
        post(|| async { (StatusCode::TOO_MANY_REQUESTS, "quota exhausted") }),
    );
    let base = spawn_stub(router).await;
    let provider =
        GeminiProvider::new("test-key", "gemini-test", base, Duration::from_secs(5)).unwrap();

    match provider.stream(&prompt("q")).await {
        Err(Error::Generation(message)) => {
            assert!(message.contains("429"), "unexpected message: {message}");
            assert!(message.contains("quota exhausted"));
        }
        Err(other) => panic!("expected generation error, got {other}"),
        Ok(_) => panic!("expected generation error, got a stream"),
    }
}

#[tokio::test]
async fn test_wrong_key_is_rejected() {
    let base = spawn_stub(Router::new().route("/v1beta/models/{action}", post(generate))).await;
    let provider =
        GeminiProvider::new("other-key", "gemini-test", base, Duration::from_secs(5)).unwrap();

    let result = provider.stream(&prompt("q")).await;
    assert!(matches!(result, Err(Error::Generation(message)) if message.contains("401")));
}
