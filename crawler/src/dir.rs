use reqwest::Url;
use sift_core::{Crawler, Error, RawDocument};
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Emits the html, text and markdown files under a directory in file name order.
pub struct DirCrawler {
    root: PathBuf,
    max_pages: usize,
}

impl DirCrawler {
    pub fn new(root: impl Into<PathBuf>, max_pages: usize) -> Self {
        Self { root: root.into(), max_pages }
    }
}

fn content_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "html" | "htm" => Some("text/html"),
        "txt" | "md" => Some("text/plain"),
        _ => None,
    }
}

fn file_url(path: &Path) -> String {
    match Url::from_file_path(path) {
        Ok(u) => u.to_string(),
        Err(()) => path.display().to_string(),
    }
}

impl Crawler for DirCrawler {
    fn crawl(
        self,
        out: mpsc::Sender<RawDocument>,
        cancel: CancellationToken,
    ) -> impl Future<Output = sift_core::Result<()>> + Send {
        async move {
            if !self.root.is_dir() {
                return Err(Error::Crawler(format!("{} is not a directory", self.root.display())));
            }
            let root = self.root.canonicalize()?;
            let files: Vec<(PathBuf, &'static str)> = WalkDir::new(&root)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter_map(|e| content_type(e.path()).map(|ct| (e.into_path(), ct)))
                .take(self.max_pages)
                .collect();
            info!(root = %root.display(), files = files.len(), "walking directory");

            let mut emitted = 0usize;
            for (path, ct) in files {
                let content = match std::fs::read(&path) {
                    Ok(c) => c,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping unreadable file");
                        continue;
                    }
                };
                let doc = RawDocument { url: file_url(&path), content, content_type: ct.to_string() };
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    sent = out.send(doc) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
                emitted += 1;
            }
            info!(emitted, cancelled = cancel.is_cancelled(), "directory walk done");
            Ok(())
        }
    }
}
