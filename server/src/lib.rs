use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sift_core::codec;
use sift_core::search::rank;
use sift_core::{DocumentId, PersistedIndex, SledStore, Store, Tokenizer};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const MAX_K: usize = 100;
const SNIPPET_CHARS: usize = 200;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_ms: u128,
    pub total_hits: usize,
    pub results: Vec<SearchResult>,
}

#[derive(Serialize)]
pub struct SearchResult {
    pub id: String,
    pub url: String,
    pub score: f64,
    pub snippet: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    /// Built from the normalization recorded when the index was built.
    pub tokenizer: Tokenizer,
}

pub struct ApiError(sift_core::Error);

impl From<sift_core::Error> for ApiError {
    fn from(e: sift_core::Error) -> Self { Self(e) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "request failed");
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

pub fn build_app(db_path: &str) -> Result<Router> {
    let store = SledStore::open(db_path)?;
    build_app_with_store(Arc::new(store))
}

pub fn build_app_with_store(store: Arc<dyn Store>) -> Result<Router> {
    let normalization = codec::load_meta(&*store)?.map(|m| m.normalization).unwrap_or_default();
    let doc_count = codec::load_doc_count(&*store)?;
    tracing::info!(doc_count, ?normalization, "serving index");
    let state = AppState { store, tokenizer: Tokenizer::new(normalization) };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);
    Ok(app)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let source = PersistedIndex::new(&*state.store);
    let hits = rank(&source, &state.tokenizer, &params.q, None)?;
    let total_hits = hits.len();
    let k = params.k.min(MAX_K);

    let words: Vec<&str> = params.q.split_whitespace().collect();
    let mut results = Vec::with_capacity(k.min(total_hits));
    for hit in hits.into_iter().take(k) {
        let snippet = codec::load_content(&*state.store, &hit.id)?.map(|text| snippet(&text, &words));
        results.push(SearchResult { id: hit.id.to_string(), url: hit.url, score: hit.score, snippet });
    }

    let took_ms = start.elapsed().as_millis();
    tracing::debug!(query = %params.q, total_hits, took_ms, "search");
    Ok(Json(SearchResponse { query: params.q, took_ms, total_hits, results }))
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
) -> Result<Response, ApiError> {
    let id = DocumentId::from_stored(doc_id);
    let Some(url) = codec::load_url(&*state.store, &id)? else {
        let body = Json(serde_json::json!({ "error": "not found" }));
        return Ok((StatusCode::NOT_FOUND, body).into_response());
    };
    let text = codec::load_content(&*state.store, &id)?;
    Ok(Json(serde_json::json!({ "id": id, "url": url, "text": text })).into_response())
}

/// Up to `SNIPPET_CHARS` characters around the first occurrence of any query
/// word, with every occurrence wrapped in `<em>`.
fn snippet(text: &str, words: &[&str]) -> String {
    let pattern = words.iter().filter(|w| !w.is_empty()).map(|w| regex::escape(w)).collect::<Vec<_>>().join("|");
    let matcher = if pattern.is_empty() {
        None
    } else {
        regex::RegexBuilder::new(&pattern).case_insensitive(true).build().ok()
    };

    let first = matcher.as_ref().and_then(|re| re.find(text)).map(|m| m.start()).unwrap_or(0);
    let lead = text[..first].chars().rev().take(SNIPPET_CHARS / 2).map(char::len_utf8).sum::<usize>();
    let window: String = text[first - lead..].chars().take(SNIPPET_CHARS).collect();

    match matcher {
        Some(re) => re.replace_all(&window, |caps: &regex::Captures| format!("<em>{}</em>", &caps[0])).into_owned(),
        None => window,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_highlights_query_words() {
        let s = snippet("Rust is great. rust systems programming.", &["rust"]);
        assert_eq!(s, "<em>Rust</em> is great. <em>rust</em> systems programming.");
    }

    #[test]
    fn snippet_centers_on_first_match() {
        let text = format!("{}needle{}", "a ".repeat(300), " b".repeat(300));
        let s = snippet(&text, &["needle"]);
        assert!(s.contains("<em>needle</em>"));
        assert!(s.starts_with("a "));
        assert_eq!(s.chars().count(), SNIPPET_CHARS + "<em></em>".len());
    }

    #[test]
    fn snippet_without_match_is_the_prefix() {
        let s = snippet("héllo wörld", &["zzz"]);
        assert_eq!(s, "héllo wörld");
    }
}
