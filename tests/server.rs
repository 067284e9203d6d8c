//! HTTP API served on an ephemeral port over an in-memory pipeline.

use std::sync::Arc;

use serde_json::{json, Value};

use askdocs::pipeline::{Pipeline, PipelineConfig, PipelineSettings};
use askdocs::server::router;
use askdocs_core::embedding::HashEmbedder;
use askdocs_core::generate::EchoGenerator;
use askdocs_core::store::memory::InMemoryStore;

async fn spawn_server() -> String {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = Arc::new(Pipeline::new(PipelineConfig {
        embedder: Arc::new(HashEmbedder::default()),
        store: store.clone(),
        catalog: store,
        blobs: None,
        generator: Arc::new(EchoGenerator),
        settings: PipelineSettings::default(),
    }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(pipeline)).await.unwrap();
    });
    format!("http://{addr}")
}

async fn ingest_paris(client: &reqwest::Client, base: &str) -> Value {
    let response = client
        .post(format!("{base}/ingest"))
        .json(&json!({
            "documents": [
                {
                    "name": "doc1.pdf",
                    "source_url": "http://x/doc1",
                    "text": "Paris is the capital of France. It has a population of 2 million."
                },
                {
                    "name": "owls.txt",
                    "source_url": "http://x/owls",
                    "text": "Owls hunt at night."
                }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    response.json().await.unwrap()
}

#[tokio::test]
async fn test_health_reports_corpus_state() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    let body: Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["corpus"]["state"], "empty");

    ingest_paris(&client, &base).await;
    let body: Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["corpus"]["state"], "ready");
}

#[tokio::test]
async fn test_ingest_then_ask_with_history() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    let report = ingest_paris(&client, &base).await;
    assert_eq!(report["chunks_indexed"], 2);
    assert_eq!(report["documents"][0]["status"], "indexed");

    let first: Value = client
        .post(format!("{base}/ask"))
        .json(&json!({ "question": "What is the capital of France?" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first["turn"]["answer"]["status"], "generated");
    assert!(first["turn"]["answer"]["text"]
        .as_str()
        .unwrap()
        .contains("Paris"));
    assert_eq!(first["turn"]["retrieval"][0]["document_name"], "doc1.pdf");
    assert_eq!(first["history"].as_array().unwrap().len(), 1);

    let second: Value = client
        .post(format!("{base}/ask"))
        .json(&json!({
            "question": "When do owls hunt?",
            "history": first["history"],
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let history = second["history"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["question"], "What is the capital of France?");
    assert_eq!(history[1]["question"], "When do owls hunt?");
}

#[tokio::test]
async fn test_documents_lists_live_corpus() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();
    ingest_paris(&client, &base).await;

    let body: Value = client
        .get(format!("{base}/documents"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = body["documents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["doc1.pdf", "owls.txt"]);
}

#[tokio::test]
async fn test_blank_question_is_bad_request() {
    let base = spawn_server().await;
    let response = reqwest::Client::new()
        .post(format!("{base}/ask"))
        .json(&json!({ "question": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_ingest_with_nothing_indexable_is_unprocessable() {
    let base = spawn_server().await;
    let response = reqwest::Client::new()
        .post(format!("{base}/ingest"))
        .json(&json!({
            "documents": [{ "name": "blank.txt", "source_url": "http://x/blank", "text": "   " }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 422);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "nothing_indexed");
    assert_eq!(body["report"]["documents"][0]["status"], "skipped");
    assert_eq!(body["report"]["documents"][0]["stage"], "chunk");
}
