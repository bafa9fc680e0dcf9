use crate::codec;
use crate::config::Config;
use crate::index::InvertedIndex;
use crate::pipeline::{self, Crawler, RunHandle};
use crate::search::{self, SearchHit};
use crate::store::Store;
use crate::tokenizer::Tokenizer;
use crate::Result;
use std::sync::Arc;

/// A live index bound to its store.
pub struct Engine<S: Store + ?Sized + 'static> {
    store: Arc<S>,
    index: Arc<InvertedIndex>,
    config: Config,
    tokenizer: Tokenizer,
}

impl<S: Store + ?Sized + 'static> Engine<S> {
    /// Start from an empty index.
    pub fn new(store: Arc<S>, config: Config) -> Self {
        let tokenizer = Tokenizer::new(config.normalization);
        Self { store, index: Arc::new(InvertedIndex::new()), config, tokenizer }
    }

    /// Restore whatever the store already holds so new runs add to it. A persisted
    /// normalization policy overrides the configured one.
    pub fn open(store: Arc<S>, mut config: Config) -> Result<Self> {
        if let Some(meta) = codec::load_meta(&*store)? {
            if meta.normalization != config.normalization {
                tracing::warn!(
                    persisted = ?meta.normalization,
                    configured = ?config.normalization,
                    "keeping the normalization the index was built with"
                );
                config.normalization = meta.normalization;
            }
        }
        let index = codec::load_index(&*store)?;
        let tokenizer = Tokenizer::new(config.normalization);
        Ok(Self { store, index: Arc::new(index), config, tokenizer })
    }

    pub fn build_index<C: Crawler>(&self, crawler: C) -> RunHandle {
        pipeline::build_index(crawler, Arc::clone(&self.store), Arc::clone(&self.index), &self.config)
    }

    pub fn search(&self, query: &str, top_k: Option<usize>) -> Result<Vec<String>> {
        search::search(&*self.index, &self.tokenizer, query, top_k)
    }

    pub fn rank(&self, query: &str, top_k: Option<usize>) -> Result<Vec<SearchHit>> {
        search::rank(&*self.index, &self.tokenizer, query, top_k)
    }

    pub fn corpus_size(&self) -> usize { self.index.corpus_size() }

    pub fn index(&self) -> &Arc<InvertedIndex> { &self.index }

    pub fn store(&self) -> &Arc<S> { &self.store }

    pub fn config(&self) -> &Config { &self.config }

    pub fn tokenizer(&self) -> &Tokenizer { &self.tokenizer }
}
