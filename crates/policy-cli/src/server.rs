//! HTTP interface over the ingestion and chat pipelines.

use std::future;

use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse as _, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::TryStreamExt as _;
use policy_core::Error;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use crate::cli::Variant;
use crate::state::AppState;

/// Content type of streamed answers.
pub const ANSWER_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Body of a chat request.
#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    /// Question to answer.
    #[serde(default)]
    pub query: Option<String>,
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/ingest", post(ingest_cloud))
        .route("/api/ingest/local", post(ingest_local))
        .route("/api/chat", post(chat_cloud))
        .route("/api/chat/local", post(chat_local))
        .route("/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .with_state(state)
}

/// Serves `state` on `bind_address` until ctrl-c is received.
///
/// # Errors
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(state: AppState, bind_address: &str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_address).await?;
    info!(address = %listener.local_addr()?, "Listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {error}");
        future::pending::<()>().await;
    }
}

async fn ingest_cloud(State(state): State<AppState>) -> Response {
    ingest(&state, Variant::Cloud).await
}

async fn ingest_local(State(state): State<AppState>) -> Response {
    ingest(&state, Variant::Local).await
}

async fn ingest(state: &AppState, variant: Variant) -> Response {
    let pipelines = state.pipelines(variant);
    let report = pipelines.ingest(state.documents_dir()).await;
    let collection = pipelines.ingestion.collection();

    if report.success {
        let message = format!(
            "Ingested {} documents into {collection}",
            report.documents_ingested
        );
        (
            StatusCode::OK,
            Json(json!({ "message": message, "count": report.chunk_count })),
        )
            .into_response()
    } else {
        let reason = report
            .error
            .unwrap_or_else(|| "unknown ingestion failure".to_owned());
        error!(collection, "Ingestion failed: {reason}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "Ingestion failed", "error": reason })),
        )
            .into_response()
    }
}

async fn chat_cloud(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    chat(&state, Variant::Cloud, payload).await
}

async fn chat_local(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    chat(&state, Variant::Local, payload).await
}

async fn chat(
    state: &AppState,
    variant: Variant,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let query = match payload {
        Ok(Json(request)) => request.query.unwrap_or_default(),
        Err(rejection) => {
            warn!("Rejected chat request: {rejection}");
            return bad_request(&format!("Invalid request body: {}", rejection.body_text()));
        }
    };
    if query.trim().is_empty() {
        return bad_request("Query is required");
    }

    match state.pipelines(variant).retrieval.answer(&query).await {
        Ok(stream) => {
            let stream =
                stream.inspect_err(|error| warn!("Answer stream ended with error: {error}"));
            (
                [(header::CONTENT_TYPE, ANSWER_CONTENT_TYPE)],
                Body::from_stream(stream),
            )
                .into_response()
        }
        Err(Error::InvalidQuery(message)) => bad_request(&message),
        Err(failure) => {
            error!("Chat request failed: {failure}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to generate an answer",
                    "details": failure.to_string(),
                })),
            )
                .into_response()
        }
    }
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}
