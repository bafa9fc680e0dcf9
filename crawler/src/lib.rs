use anyhow::Result;
use lazy_static::lazy_static;
use reqwest::{header, Client, Url};
use scraper::{Html, Selector};
use sift_core::{Crawler, Error, RawDocument};
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod dir;

pub use dir::DirCrawler;

lazy_static! {
    static ref LINKS: Selector = Selector::parse("a[href]").expect("valid selector");
}

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Link hops followed from a seed. Seeds are depth 0.
    pub max_depth: usize,
    /// Maximum number of documents to emit
    pub max_pages: usize,
    /// Concurrent fetches
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Only follow links that stay on the host of the page they were found on
    pub same_host_only: bool,
    /// Pages fetched per host
    pub max_per_host: usize,
    pub max_body_bytes: usize,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_pages: 10_000,
            concurrency: 5,
            timeout_secs: 12,
            user_agent: "sift-bot/0.1".to_string(),
            same_host_only: true,
            max_per_host: 10_000,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Breadth-first HTML crawler. Pages that fail to fetch, are not `text/html`,
/// or are too large are logged and skipped.
pub struct HttpCrawler {
    client: Client,
    seeds: Vec<Url>,
    options: CrawlOptions,
}

impl HttpCrawler {
    pub fn new(seeds: Vec<Url>, options: CrawlOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(options.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(options.timeout_secs))
            .build()?;
        Ok(Self { client, seeds, options })
    }

    /// Parse a seed, defaulting to https when no scheme is given.
    pub fn parse_seed(s: &str) -> Result<Url> {
        Ok(Url::parse(s).or_else(|_| Url::parse(&format!("https://{s}")))?)
    }
}

struct FetchedPage {
    body: Vec<u8>,
    content_type: String,
    links: Vec<Url>,
}

impl Crawler for HttpCrawler {
    fn crawl(
        self,
        out: mpsc::Sender<RawDocument>,
        cancel: CancellationToken,
    ) -> impl Future<Output = sift_core::Result<()>> + Send {
        async move {
            let HttpCrawler { client, seeds, options } = self;
            if seeds.is_empty() {
                return Err(Error::Crawler("no valid seeds".into()));
            }
            info!(
                seeds = seeds.len(),
                max_depth = options.max_depth,
                max_pages = options.max_pages,
                concurrency = options.concurrency,
                same_host_only = options.same_host_only,
                "crawler starting"
            );

            let mut frontier: VecDeque<(Url, usize)> = seeds.into_iter().map(|u| (u, 0)).collect();
            let mut seen: HashSet<String> = HashSet::new();
            let mut per_host: HashMap<String, usize> = HashMap::new();
            let mut inflight = JoinSet::new();
            let mut emitted = 0usize;

            loop {
                while inflight.len() < options.concurrency.max(1) && emitted + inflight.len() < options.max_pages {
                    let Some((url, depth)) = frontier.pop_front() else { break };
                    if !seen.insert(norm(&url)) {
                        continue;
                    }
                    if let Some(host) = url.host_str() {
                        let fetched = per_host.entry(host.to_string()).or_insert(0);
                        if *fetched >= options.max_per_host {
                            continue;
                        }
                        *fetched += 1;
                    }
                    let client = client.clone();
                    let max_body = options.max_body_bytes;
                    inflight.spawn(async move {
                        let page = fetch_page(&client, &url, max_body).await;
                        (url, depth, page)
                    });
                }

                let joined = tokio::select! {
                    _ = cancel.cancelled() => break,
                    joined = inflight.join_next() => joined,
                };
                let Some(joined) = joined else { break };
                let (url, depth, page) = match joined {
                    Ok(done) => done,
                    Err(e) => {
                        warn!(error = %e, "fetch task failed");
                        continue;
                    }
                };
                let page = match page {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(error = %e, "skipping page");
                        continue;
                    }
                };

                if depth < options.max_depth {
                    for link in page.links {
                        if options.same_host_only && link.host_str() != url.host_str() {
                            continue;
                        }
                        if !seen.contains(&norm(&link)) {
                            frontier.push_back((link, depth + 1));
                        }
                    }
                }

                let doc = RawDocument { url: norm(&url), content: page.body, content_type: page.content_type };
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    sent = out.send(doc) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
                emitted += 1;
                debug!(url = %url, depth, "emitted page");
                if emitted % 100 == 0 {
                    info!(emitted, visited = seen.len(), frontier = frontier.len(), "progress");
                }
            }

            inflight.abort_all();
            info!(
                emitted,
                visited = seen.len(),
                frontier = frontier.len(),
                cancelled = cancel.is_cancelled(),
                "crawler done"
            );
            Ok(())
        }
    }
}

async fn fetch_page(client: &Client, url: &Url, max_body: usize) -> sift_core::Result<FetchedPage> {
    let fail = |reason: String| Error::Fetch { url: url.to_string(), reason };
    let resp = client.get(url.clone()).send().await.map_err(|e| fail(e.to_string()))?;
    if !resp.status().is_success() {
        return Err(fail(format!("status {}", resp.status())));
    }
    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if !content_type.starts_with("text/html") {
        return Err(fail(format!("unsupported content type {content_type:?}")));
    }
    let bytes = resp.bytes().await.map_err(|e| fail(e.to_string()))?;
    if bytes.len() > max_body {
        return Err(fail(format!("body too large ({} bytes)", bytes.len())));
    }
    let links = extract_links(url, &String::from_utf8_lossy(&bytes));
    Ok(FetchedPage { body: bytes.to_vec(), content_type, links })
}

/// Absolute http(s) targets of every `<a href>` in `body`, without fragments.
pub fn extract_links(base: &Url, body: &str) -> Vec<Url> {
    let doc = Html::parse_document(body);
    doc.select(&LINKS)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|h| base.join(h).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(|mut u| {
            u.set_fragment(None);
            u
        })
        .collect()
}

fn norm(u: &Url) -> String {
    let mut s = u.clone();
    s.set_fragment(None);
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_are_resolved_against_the_page() {
        let base = Url::parse("https://example.com/docs/index.html").unwrap();
        let body = r##"<a href="/about">a</a><a href="guide.html#intro">b</a>
            <a href="mailto:me@example.com">c</a><a href="https://other.org/x">d</a><a>e</a>"##;
        let links: Vec<String> = extract_links(&base, body).into_iter().map(String::from).collect();
        assert_eq!(
            links,
            vec!["https://example.com/about", "https://example.com/docs/guide.html", "https://other.org/x"]
        );
    }

    #[test]
    fn seeds_default_to_https() {
        assert_eq!(HttpCrawler::parse_seed("example.com").unwrap().as_str(), "https://example.com/");
        assert_eq!(HttpCrawler::parse_seed("http://example.com/a").unwrap().as_str(), "http://example.com/a");
    }

    #[test]
    fn norm_drops_fragments() {
        let u = Url::parse("https://example.com/a#b").unwrap();
        assert_eq!(norm(&u), "https://example.com/a");
    }
}
