use crawler::{CrawlOptions, HttpCrawler};
use sift_core::{Crawler, RawDocument};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

fn page(path: &str) -> Option<(&'static str, String)> {
    let html = |body: &str| Some(("text/html; charset=utf-8", format!("<html><body>{body}</body></html>")));
    match path {
        "/" => html(
            r#"<a href="/a">a</a> <a href="/b#top">b</a> <a href="/img.png">img</a>
               <a href="/missing">gone</a> <a href="http://elsewhere.invalid/">out</a>"#,
        ),
        "/a" => html(r#"<a href="/c">c</a> <a href="/">home</a>"#),
        "/b" => Some(("Text/HTML", "<html><body>leaf</body></html>".to_string())),
        "/c" => html(r#"<a href="/d">d</a>"#),
        "/d" => html("too deep"),
        "/img.png" => Some(("image/png", "PNG".to_string())),
        _ => None,
    }
}

async fn serve(listener: TcpListener) {
    loop {
        let Ok((mut sock, _)) = listener.accept().await else { return };
        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            let n = sock.read(&mut buf).await.unwrap_or(0);
            let req = String::from_utf8_lossy(&buf[..n]);
            let path = req.split_whitespace().nth(1).unwrap_or("/").to_string();
            let resp = match page(&path) {
                Some((ct, body)) => format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: {ct}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                ),
                None => "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string(),
            };
            let _ = sock.write_all(resp.as_bytes()).await;
            let _ = sock.shutdown().await;
        });
    }
}

async fn crawl(options: CrawlOptions) -> Vec<RawDocument> {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = Url::parse(&format!("http://{}/", listener.local_addr().unwrap())).unwrap();
    tokio::spawn(serve(listener));

    let crawler = HttpCrawler::new(vec![base], options).unwrap();
    let (tx, mut rx) = mpsc::channel(16);
    let task = tokio::spawn(crawler.crawl(tx, CancellationToken::new()));
    let mut docs = Vec::new();
    while let Some(doc) = rx.recv().await {
        docs.push(doc);
    }
    task.await.unwrap().unwrap();
    docs
}

fn paths(docs: &[RawDocument]) -> Vec<String> {
    let mut p: Vec<String> = docs.iter().map(|d| Url::parse(&d.url).unwrap().path().to_string()).collect();
    p.sort();
    p
}

#[tokio::test]
async fn it_follows_links_up_to_max_depth() {
    let docs = crawl(CrawlOptions { max_depth: 2, concurrency: 2, ..Default::default() }).await;
    assert_eq!(paths(&docs), vec!["/", "/a", "/b", "/c"]);
    assert!(docs.iter().all(|d| d.content_type.starts_with("text/html")));
}

#[tokio::test]
async fn content_type_check_ignores_case() {
    let docs = crawl(CrawlOptions { max_depth: 1, ..Default::default() }).await;
    let b = docs.iter().find(|d| d.url.ends_with("/b")).expect("mixed-case html page is kept");
    assert_eq!(b.content_type, "text/html");
}

#[tokio::test]
async fn depth_zero_fetches_only_seeds() {
    let docs = crawl(CrawlOptions { max_depth: 0, ..Default::default() }).await;
    assert_eq!(paths(&docs), vec!["/"]);
}

#[tokio::test]
async fn max_pages_bounds_the_crawl() {
    let docs = crawl(CrawlOptions { max_pages: 2, concurrency: 1, ..Default::default() }).await;
    assert_eq!(docs.len(), 2);
}

#[tokio::test]
async fn no_seeds_is_an_error() {
    let crawler = HttpCrawler::new(Vec::new(), CrawlOptions::default()).unwrap();
    let (tx, _rx) = mpsc::channel(1);
    assert!(crawler.crawl(tx, CancellationToken::new()).await.is_err());
}
