//! Tests for the Gemini embedding client against a stub `batchEmbedContents`

use std::time::Duration;

use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse as _, Response};
use axum::routing::post;
use axum::{Json, Router, serve};
use policy_context::GeminiEmbeddingClient;
use policy_core::{EmbeddingProvider as _, Error};
use serde_json::{Value, json};
use tokio::net::TcpListener;

async fn spawn_stub(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        serve(listener, router).await.unwrap();
    });
    format!("http://{address}/v1beta")
}

/// Embeds each text as `[len, position, 1.0]`.
async fn batch_embed(
    Path(action): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if headers.get("x-goog-api-key").is_none() {
        return (StatusCode::FORBIDDEN, "missing key").into_response();
    }
    if action != "text-embedding-004:batchEmbedContents" {
        return (StatusCode::NOT_FOUND, action).into_response();
    }
    let requests = body["requests"].as_array().cloned().unwrap_or_default();
    let embeddings: Vec<Value> = requests
        .iter()
        .enumerate()
        .map(|(position, request)| {
            let text = request["content"]["parts"][0]["text"].as_str().unwrap_or_default();
            json!({"values": [text.len() as f32, position as f32, 1.0]})
        })
        .collect();
    Json(json!({ "embeddings": embeddings })).into_response()
}

fn client(base: String) -> GeminiEmbeddingClient {
    GeminiEmbeddingClient::new("test-key", "text-embedding-004", base, Duration::from_secs(5))
        .unwrap()
}

#[tokio::test]
async fn test_embed_preserves_length_and_order() {
    let base = spawn_stub(Router::new().route("/v1beta/models/{action}", post(batch_embed))).await;
    let texts = vec!["a".to_owned(), "bbb".to_owned(), "cc".to_owned()];

    let vectors = client(base).embed(&texts).await.unwrap();

    assert_eq!(vectors.len(), 3);
    assert_eq!(vectors[0], vec![1.0, 0.0, 1.0]);
    assert_eq!(vectors[1], vec![3.0, 1.0, 1.0]);
    assert_eq!(vectors[2], vec![2.0, 2.0, 1.0]);
}

#[tokio::test]
async fn test_short_response_is_an_embedding_error() {
    let router = Router::new().route(
        "/v1beta/models/{action}",
        post(|| async { Json(json!({"embeddings": [{"values": [0.1, 0.2]}]})) }),
    );
    let base = spawn_stub(router).await;
    let texts = vec!["one".to_owned(), "two".to_owned()];

    let error = client(base).embed(&texts).await.unwrap_err();

    match error {
        Error::Embedding { context, message } => {
            assert!(context.contains("batch of 2 texts"), "{context}");
            assert!(message.contains("1 embeddings for 2 inputs"), "{message}");
        }
        other => panic!("expected embedding error, got {other}"),
    }
}

#[tokio::test]
async fn test_error_status_includes_body() {
    let router = Router::new().route(
        "/v1beta/models/{action}",
        post(|| async { (StatusCode::TOO_MANY_REQUESTS, "RESOURCE_EXHAUSTED") }),
    );
    let base = spawn_stub(router).await;

    let error = client(base).embed(&["text".to_owned()]).await.unwrap_err();

    let rendered = error.to_string();
    assert!(rendered.contains("429"), "{rendered}");
    assert!(rendered.contains("RESOURCE_EXHAUSTED"), "{rendered}");
}
