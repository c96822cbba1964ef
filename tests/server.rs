//! HTTP API tests against an in-process server on an ephemeral port.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{build_service, HashEmbedder, RecordingGenerator};
use rag_mind::embedding::Embedder;
use rag_mind::server::router;
use rag_mind::service::RagService;
use serde_json::{json, Value};
use tempfile::TempDir;

struct TestServer {
    base: String,
    service: Arc<RagService>,
    client: reqwest::Client,
    tmp: TempDir,
}

impl TestServer {
    async fn start(embedder: Arc<dyn Embedder>) -> Self {
        let tmp = TempDir::new().unwrap();
        let service =
            Arc::new(build_service(tmp.path(), embedder, Arc::new(RecordingGenerator::new())).await);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(Arc::clone(&service));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{}", addr),
            service,
            client: reqwest::Client::new(),
            tmp,
        }
    }

    fn docs(&self, files: &[(&str, &str)]) -> String {
        let dir = self.tmp.path().join("docs");
        std::fs::create_dir_all(&dir).unwrap();
        for (name, content) in files {
            std::fs::write(dir.join(name), content).unwrap();
        }
        dir.display().to_string()
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let resp = self
            .client
            .get(format!("{}{}", self.base, path))
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(format!("{}{}", self.base, path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }
}

#[tokio::test]
async fn test_health() {
    let server = TestServer::start(Arc::new(HashEmbedder::new())).await;
    let (status, body) = server.get("/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_question_validation() {
    let server = TestServer::start(Arc::new(HashEmbedder::new())).await;

    let (status, body) = server.post("/api/question", json!({})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
    assert_eq!(body["error"]["message"], "question is required");

    let (status, body) = server.post("/api/question", json!({ "question": "  " })).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");

    for n in [0, -3] {
        let (status, body) = server
            .post("/api/question", json!({ "question": "hi", "n_results": n }))
            .await;
        assert_eq!(status, 400, "n_results = {}", n);
        assert_eq!(body["error"]["code"], "bad_request");
    }
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let server = TestServer::start(Arc::new(HashEmbedder::new())).await;
    let resp = server
        .client
        .post(format!("{}/api/question", server.base))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_settings_round_trip() {
    let server = TestServer::start(Arc::new(HashEmbedder::new())).await;

    let (status, body) = server.get("/api/settings").await;
    assert_eq!(status, 200);
    assert_eq!(body["collection_name"], "rag_collection");
    assert_eq!(body["n_results"], 5);
    assert_eq!(body["chunk_size"], 1000);
    assert_eq!(body["use_augmentation"], true);

    let (status, body) = server
        .post("/api/settings", json!({ "n_results": 3, "use_augmentation": false }))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["settings"]["n_results"], 3);
    assert_eq!(body["settings"]["use_augmentation"], false);
    assert_eq!(body["settings"]["chunk_size"], 1000);

    let (_, body) = server.get("/api/settings").await;
    assert_eq!(body["n_results"], 3);

    // Rejected updates leave the settings untouched.
    let (status, body) = server
        .post("/api/settings", json!({ "chunk_size": 100, "chunk_overlap": 100 }))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
    let (_, body) = server.get("/api/settings").await;
    assert_eq!(body["chunk_size"], 1000);

    let persisted = std::fs::read_to_string(&server.service.config().settings.path).unwrap();
    let persisted: Value = serde_json::from_str(&persisted).unwrap();
    assert_eq!(persisted["n_results"], 3);
}

#[tokio::test]
async fn test_settings_update_rejects_unknown_fields() {
    let server = TestServer::start(Arc::new(HashEmbedder::new())).await;

    let (status, body) = server
        .post("/api/settings", json!({ "chunk_sise": 200, "n_results": 2 }))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("chunk_sise"));

    let (_, body) = server.get("/api/settings").await;
    assert_eq!(body["n_results"], 5);
    assert_eq!(body["chunk_size"], 1000);
}

#[tokio::test]
async fn test_document_path_add_and_remove() {
    let server = TestServer::start(Arc::new(HashEmbedder::new())).await;
    let docs = server.docs(&[("a.md", "Backups run nightly.")]);

    let (status, body) = server
        .post("/api/document-path/add", json!({ "path": "/no/such/dir" }))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, body) = server.post("/api/document-path/add", json!({})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["message"], "path is required");

    let (status, body) = server
        .post("/api/document-path/add", json!({ "path": docs }))
        .await;
    assert_eq!(status, 200);
    assert!(body["message"].as_str().unwrap().contains("Added"));
    assert!(body.get("report").is_none());

    let (status, _) = server
        .post("/api/document-path/add", json!({ "path": docs }))
        .await;
    assert_eq!(status, 400);

    let (_, settings) = server.get("/api/settings").await;
    assert_eq!(settings["document_paths"], json!([docs]));

    let (status, body) = server
        .post("/api/document-path/remove", json!({ "path": docs }))
        .await;
    assert_eq!(status, 200);
    assert!(body["message"].as_str().unwrap().contains("Removed"));

    let (status, body) = server
        .post("/api/document-path/remove", json!({ "path": docs }))
        .await;
    assert_eq!(status, 200);
    assert!(body["message"].as_str().unwrap().contains("not configured"));
}

#[tokio::test]
async fn test_add_path_with_reindex_then_ask() {
    let server = TestServer::start(Arc::new(HashEmbedder::new())).await;
    let docs = server.docs(&[
        ("k8s.md", "Kubernetes schedules pods onto nodes."),
        ("food.md", "Boil pasta in salted water."),
    ]);

    let (status, body) = server
        .post(
            "/api/document-path/add",
            json!({ "path": docs, "reindex": true }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["report"]["documents_processed"], 2);
    assert_eq!(body["report"]["chunks_written"], 2);

    let (status, body) = server
        .post(
            "/api/question",
            json!({ "question": "How are kubernetes pods scheduled?", "n_results": 1 }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["answer"], "stub answer");
    assert_eq!(body["grounded"], true);
    assert_eq!(body["num_chunks"], 1);
    assert!(body["relevant_chunks"][0]
        .as_str()
        .unwrap()
        .contains("Kubernetes"));
}

#[tokio::test]
async fn test_reindex_and_stats() {
    let server = TestServer::start(Arc::new(HashEmbedder::new())).await;
    let docs = server.docs(&[("a.md", "alpha"), ("b.txt", "beta"), ("c.bin", "gamma")]);
    server.service.add_document_path(&docs).unwrap();

    let (status, body) = server.post("/api/reindex", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["report"]["documents_processed"], 2);
    assert_eq!(body["stats"]["total_chunks"], 2);
    assert!(body["report"]["run_id"].as_str().is_some());

    let (status, body) = server.get("/api/stats").await;
    assert_eq!(status, 200);
    assert_eq!(body["collection_name"], "rag_collection");
    assert_eq!(body["total_chunks"], 2);
    assert_eq!(body["sources"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_concurrent_reindex_is_conflict() {
    let server = TestServer::start(Arc::new(HashEmbedder::slow(Duration::from_millis(300)))).await;
    let docs = server.docs(&[("a.md", "one"), ("b.md", "two")]);
    server.service.add_document_path(&docs).unwrap();

    let first = {
        let client = server.client.clone();
        let url = format!("{}/api/reindex", server.base);
        tokio::spawn(async move { client.post(url).send().await.unwrap().status().as_u16() })
    };
    while !server.service.is_reindexing() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let (status, body) = server.post("/api/reindex", json!({})).await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["code"], "conflict");

    assert_eq!(first.await.unwrap(), 200);
}

#[tokio::test]
async fn test_embedding_outage_is_unavailable() {
    let server = TestServer::start(Arc::new(HashEmbedder::down())).await;
    let docs = server.docs(&[("a.md", "some text")]);
    server.service.add_document_path(&docs).unwrap();

    let (status, body) = server.post("/api/reindex", json!({})).await;
    assert_eq!(status, 503);
    assert_eq!(body["error"]["code"], "unavailable");

    let (status, body) = server
        .post("/api/question", json!({ "question": "anything?" }))
        .await;
    assert_eq!(status, 503);
    assert_eq!(body["error"]["code"], "unavailable");
}

#[tokio::test]
async fn test_reindex_completes_after_client_disconnects() {
    let server = TestServer::start(Arc::new(HashEmbedder::slow(Duration::from_millis(300)))).await;
    let docs = server.docs(&[
        ("a.md", "alpha"),
        ("b.md", "beta"),
        ("c.md", "gamma"),
        ("d.md", "delta"),
    ]);
    server.service.add_document_path(&docs).unwrap();

    let impatient = reqwest::Client::builder()
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap();
    let result = impatient
        .post(format!("{}/api/reindex", server.base))
        .send()
        .await;
    assert!(result.is_err(), "request should time out before the reindex ends");

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        if !server.service.is_reindexing()
            && server.service.stats().await.unwrap().total_chunks == 4
        {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "reindex did not finish after the client went away"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
