use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use sift_core::{Config, DocumentId, Engine, MemoryStore, RawDocument, SledStore, Store};
use std::sync::Arc;
use tower::ServiceExt;

const GREAT: &str = "rust is great. rust systems programming.";
const LEARNING: &str = "learning rust.";

fn raw(url: &str, text: &str) -> RawDocument {
    RawDocument { url: url.into(), content: text.as_bytes().to_vec(), content_type: "text/plain".into() }
}

async fn build_tiny_index<S: Store + 'static>(store: Arc<S>) {
    let engine = Engine::new(store, Config::default());
    let docs = vec![
        raw("https://b.example/learning", LEARNING),
        raw("https://a.example/great", GREAT),
        raw("https://c.example/pasta", "cooking pasta at home."),
    ];
    let stats = engine.build_index(docs).wait().await.unwrap();
    assert_eq!(stats.indexed, 3);
}

async fn tiny_app() -> Router {
    let store = Arc::new(MemoryStore::new());
    build_tiny_index(Arc::clone(&store)).await;
    server::build_app_with_store(store).unwrap()
}

async fn call(app: Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::get(uri).body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let (status, json) = call(tiny_app().await, "/search?q=rust&k=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"], 2);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["url"], "https://a.example/great");
    assert_eq!(arr[1]["url"], "https://b.example/learning");
    assert!(arr[0]["score"].as_f64().unwrap() > arr[1]["score"].as_f64().unwrap());
    assert_eq!(arr[1]["snippet"], "learning <em>rust</em>.");
}

#[tokio::test]
async fn k_limits_results_but_not_total_hits() {
    let (_, json) = call(tiny_app().await, "/search?q=rust+pasta&k=1").await;
    assert_eq!(json["total_hits"], 3);
    assert_eq!(json["results"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn k_zero_returns_no_results() {
    let (status, json) = call(tiny_app().await, "/search?q=rust&k=0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"], 2);
    assert!(json["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_terms_find_nothing() {
    let (status, json) = call(tiny_app().await, "/search?q=haskell").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"], 0);
    assert!(json["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn doc_returns_url_and_text() {
    let id = DocumentId::from_text(GREAT);
    let (status, json) = call(tiny_app().await, &format!("/doc/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["url"], "https://a.example/great");
    assert_eq!(json["text"], GREAT);

    let (status, json) = call(tiny_app().await, "/doc/0000").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not found");
}

#[tokio::test]
async fn health_is_ok() {
    let req = Request::get("/health").body(Body::empty()).unwrap();
    let resp = tiny_app().await.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn serves_a_sled_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.db");
    {
        let store = Arc::new(SledStore::open(&path).unwrap());
        build_tiny_index(Arc::clone(&store)).await;
        store.close().unwrap();
    }
    let app = server::build_app(path.to_str().unwrap()).unwrap();
    let (status, json) = call(app, "/search?q=learning").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["results"][0]["url"], "https://b.example/learning");
}
