//! Tests for the `ingest` and `ask` command handlers

use policy_cli::Variant;
use policy_cli::handlers::{handle_ask, handle_ingest};
use policy_providers::MockProvider;
use tempfile::TempDir;

use crate::common::Fixture;

async fn ingested(generator: MockProvider) -> Fixture {
    let fixture = Fixture::new(generator);
    let mut out = Vec::new();
    handle_ingest(
        &fixture.state,
        Variant::Cloud,
        fixture.dir.path(),
        &mut out,
    )
    .await
    .unwrap();
    let summary = String::from_utf8(out).unwrap();
    assert_eq!(
        summary,
        "Ingested 2 chunks from 2 documents into policy_documents\n"
    );
    fixture
}

#[tokio::test]
async fn ask_streams_answer_to_output() {
    let fixture = ingested(MockProvider::new(["Twenty ", "days", "."])).await;

    let mut out = Vec::new();
    handle_ask(&fixture.state, Variant::Cloud, "vacation days", false, &mut out)
        .await
        .unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "Twenty days.\n");
    assert_eq!(fixture.generator.call_count(), 1);
}

#[tokio::test]
async fn dry_run_prints_context_without_generating() {
    let fixture = ingested(MockProvider::new(["unused"])).await;

    let mut out = Vec::new();
    handle_ask(&fixture.state, Variant::Cloud, "book flights", true, &mut out)
        .await
        .unwrap();
    let printed = String::from_utf8(out).unwrap();
    assert!(printed.contains("travel.md #0: Travel: book economy flights"));
    assert_eq!(printed.lines().count(), 1);
    assert_eq!(fixture.generator.call_count(), 0);
}

#[tokio::test]
async fn ask_reports_stream_failure() {
    let fixture = ingested(MockProvider::new(["partial"]).with_stream_failure("reset")).await;

    let mut out = Vec::new();
    let result = handle_ask(&fixture.state, Variant::Cloud, "vacation", false, &mut out).await;
    assert!(result.unwrap_err().to_string().contains("reset"));
    assert_eq!(String::from_utf8(out).unwrap(), "partial");
}

#[tokio::test]
async fn ingest_reports_failure_for_empty_directory() {
    let fixture = Fixture::new(MockProvider::new(["unused"]));
    let empty = TempDir::new().unwrap();

    let mut out = Vec::new();
    let result = handle_ingest(
        &fixture.state,
        Variant::Local,
        empty.path(),
        &mut out,
    )
    .await;
    assert!(result.unwrap_err().to_string().contains("No text files found"));
}
