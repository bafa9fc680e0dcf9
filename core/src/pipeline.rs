//! Crawl -> tokenize -> index pipeline.
//!
//! Stages are tasks joined by bounded channels. A full channel blocks its
//! producer. Completion travels by channel closure: the crawler drops its
//! sender, the tokenizer stage drains and drops its own, and index workers exit
//! once their input is closed and empty. The run then writes the reverse index
//! and document count and reports `Done`.

use crate::codec::{self, IndexMeta};
use crate::config::Config;
use crate::extract;
use crate::index::{Document, InvertedIndex};
use crate::store::Store;
use crate::tokenizer::Tokenizer;
use crate::{DocumentId, Error, RawDocument, Result, TokenizedDocument};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Produces raw documents. The stream closes when `crawl` returns and drops `out`.
/// Per-page failures are logged and skipped; an `Err` fails the whole run.
pub trait Crawler: Send + 'static {
    fn crawl(
        self,
        out: mpsc::Sender<RawDocument>,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Replays documents that were fetched elsewhere.
impl Crawler for Vec<RawDocument> {
    fn crawl(self, out: mpsc::Sender<RawDocument>, cancel: CancellationToken) -> impl Future<Output = Result<()>> + Send {
        async move {
            for doc in self {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    sent = out.send(doc) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
            Ok(())
        }
    }
}

/// Run lifecycle: `Idle -> Crawling -> Indexing -> Draining -> Done`.
///
/// Tokenizing and indexing overlap the crawl from `Crawling` on. `Indexing` is
/// the tokenize/index phase once the crawl has closed its stream, and
/// `Draining` covers the single write of term records and the document count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Idle,
    /// Crawler running; tokenizing and indexing overlap with it.
    Crawling,
    /// Crawler closed its stream; downstream stages are finishing what is queued.
    Indexing,
    /// All workers exited; the reverse index and document count are being written.
    Draining,
    Done,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Raw documents received from the crawler.
    pub crawled: u64,
    /// Documents newly added to the index and persisted.
    pub indexed: u64,
    /// Documents whose content was already indexed.
    pub duplicates: u64,
    /// Documents without indexable text.
    pub skipped: u64,
    /// Documents whose records could not be written to the store. They are
    /// left out of the index.
    pub failed: u64,
    /// Term records written when draining.
    pub terms: u64,
}

#[derive(Default)]
struct Counters {
    crawled: AtomicU64,
    indexed: AtomicU64,
    duplicates: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) { counter.fetch_add(1, Ordering::Relaxed); }

    fn snapshot(&self, terms: u64) -> RunStats {
        RunStats {
            crawled: self.crawled.load(Ordering::Relaxed),
            indexed: self.indexed.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            terms,
        }
    }
}

pub struct RunHandle {
    cancel: CancellationToken,
    state: watch::Receiver<RunState>,
    index: Arc<InvertedIndex>,
    task: JoinHandle<Result<RunStats>>,
}

impl RunHandle {
    /// Stop the crawl. Queued documents are still indexed and persisted.
    pub fn cancel(&self) { self.cancel.cancel() }

    pub fn cancel_token(&self) -> CancellationToken { self.cancel.clone() }

    pub fn state(&self) -> RunState { *self.state.borrow() }

    /// Resolves once the run reaches `state` or any later state.
    pub async fn reached(&mut self, state: RunState) {
        let _ = self.state.wait_for(|s| ordinal(*s) >= ordinal(state)).await;
    }

    pub fn index(&self) -> &Arc<InvertedIndex> { &self.index }

    pub async fn wait(self) -> Result<RunStats> { self.task.await? }
}

fn ordinal(state: RunState) -> u8 {
    match state {
        RunState::Idle => 0,
        RunState::Crawling => 1,
        RunState::Indexing => 2,
        RunState::Draining => 3,
        RunState::Done => 4,
    }
}

/// Start a run feeding `index` and `store`. Must be called inside a Tokio runtime.
pub fn build_index<C, S>(crawler: C, store: Arc<S>, index: Arc<InvertedIndex>, config: &Config) -> RunHandle
where
    C: Crawler,
    S: Store + ?Sized + 'static,
{
    let cancel = CancellationToken::new();
    let (state_tx, state_rx) = watch::channel(RunState::Idle);
    let task = tokio::spawn(run(crawler, store, Arc::clone(&index), config.clone(), cancel.clone(), state_tx));
    RunHandle { cancel, state: state_rx, index, task }
}

async fn run<C, S>(
    crawler: C,
    store: Arc<S>,
    index: Arc<InvertedIndex>,
    config: Config,
    cancel: CancellationToken,
    state: watch::Sender<RunState>,
) -> Result<RunStats>
where
    C: Crawler,
    S: Store + ?Sized + 'static,
{
    codec::write_meta(&*store, &IndexMeta::new(config.normalization))?;
    let counters = Arc::new(Counters::default());
    let tokenizer = Tokenizer::new(config.normalization);
    let (raw_tx, raw_rx) = mpsc::channel::<RawDocument>(config.raw_capacity.max(1));
    let (tok_tx, tok_rx) = mpsc::channel::<TokenizedDocument>(config.tokenized_capacity.max(1));

    state.send_replace(RunState::Crawling);
    info!(
        tokenizer_workers = config.tokenizer_workers,
        index_workers = config.index_workers,
        "crawl started"
    );
    let crawl = tokio::spawn(crawler.crawl(raw_tx, cancel));

    let raw_rx = Arc::new(Mutex::new(raw_rx));
    let mut tokenizers = JoinSet::new();
    for worker in 0..config.tokenizer_workers.max(1) {
        tokenizers.spawn(tokenize_stage(
            worker,
            Arc::clone(&raw_rx),
            tok_tx.clone(),
            tokenizer,
            config.store_content,
            Arc::clone(&counters),
        ));
    }
    drop(tok_tx);

    let tok_rx = Arc::new(Mutex::new(tok_rx));
    let mut workers = JoinSet::new();
    for worker in 0..config.index_workers.max(1) {
        workers.spawn(index_worker(
            worker,
            Arc::clone(&tok_rx),
            Arc::clone(&index),
            Arc::clone(&store),
            Arc::clone(&counters),
        ));
    }

    let crawled = crawl.await.map_err(Error::from).and_then(|r| r);
    if let Err(e) = &crawled {
        warn!(error = %e, "crawler failed, keeping partial index");
    }
    state.send_replace(RunState::Indexing);
    info!("crawl finished, draining queued documents");

    while let Some(joined) = tokenizers.join_next().await {
        joined?;
    }
    while let Some(joined) = workers.join_next().await {
        joined?;
    }

    state.send_replace(RunState::Draining);
    let terms = codec::write_postings(&*store, &index)?;
    let stats = counters.snapshot(terms as u64);
    state.send_replace(RunState::Done);
    info!(
        crawled = stats.crawled,
        indexed = stats.indexed,
        duplicates = stats.duplicates,
        skipped = stats.skipped,
        failed = stats.failed,
        terms = stats.terms,
        corpus = index.corpus_size(),
        "run complete"
    );
    crawled?;
    Ok(stats)
}

/// Extract, hash and tokenize one raw document. `None` when it has no text.
pub fn tokenize_document(tokenizer: &Tokenizer, raw: RawDocument, keep_text: bool) -> Option<TokenizedDocument> {
    let text = extract::document_text(&raw.content, &raw.content_type);
    if text.is_empty() {
        debug!(url = %raw.url, content_type = %raw.content_type, "no indexable text");
        return None;
    }
    let id = DocumentId::from_text(&text);
    let terms = tokenizer.terms(&text).collect();
    Some(TokenizedDocument { id, url: raw.url, terms, text: keep_text.then_some(text) })
}

async fn tokenize_stage(
    worker: usize,
    rx: Arc<Mutex<mpsc::Receiver<RawDocument>>>,
    tx: mpsc::Sender<TokenizedDocument>,
    tokenizer: Tokenizer,
    keep_text: bool,
    counters: Arc<Counters>,
) {
    loop {
        let next = rx.lock().await.recv().await;
        let Some(raw) = next else { break };
        Counters::bump(&counters.crawled);
        let Some(doc) = tokenize_document(&tokenizer, raw, keep_text) else {
            Counters::bump(&counters.skipped);
            continue;
        };
        if tx.send(doc).await.is_err() {
            break;
        }
    }
    debug!(worker, "tokenizer stage exited");
}

async fn index_worker<S: Store + ?Sized>(
    worker: usize,
    rx: Arc<Mutex<mpsc::Receiver<TokenizedDocument>>>,
    index: Arc<InvertedIndex>,
    store: Arc<S>,
    counters: Arc<Counters>,
) {
    loop {
        let next = rx.lock().await.recv().await;
        let Some(TokenizedDocument { id, url, terms, text }) = next else { break };
        let Some(doc) = index.insert(Document::new(id, url, terms)) else {
            Counters::bump(&counters.duplicates);
            continue;
        };
        match codec::write_document(&*store, &doc, text.as_deref()) {
            Ok(()) => {
                Counters::bump(&counters.indexed);
                debug!(worker, id = %doc.id, url = %doc.url, terms = doc.term_freq.len(), "indexed");
            }
            Err(e) => {
                // Only documents with their own records may reach the drain batch.
                index.remove(&doc.id);
                Counters::bump(&counters.failed);
                warn!(worker, url = %doc.url, error = %e, "failed to persist document, dropped from index");
            }
        }
    }
    debug!(worker, "index worker exited");
}
