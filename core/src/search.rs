use crate::codec;
use crate::index::{idf_weight, tf_weight, InvertedIndex};
use crate::store::Store;
use crate::tokenizer::Tokenizer;
use crate::{DocumentId, Result};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

/// What the scorer needs from an index, live or persisted.
pub trait TermSource {
    fn corpus_size(&self) -> Result<usize>;
    /// Documents containing `term`, each with its occurrence count.
    fn postings(&self, term: &str) -> Result<Vec<(DocumentId, u64)>>;
    fn url(&self, id: &DocumentId) -> Result<Option<String>>;
}

impl TermSource for InvertedIndex {
    fn corpus_size(&self) -> Result<usize> { Ok(InvertedIndex::corpus_size(self)) }

    fn postings(&self, term: &str) -> Result<Vec<(DocumentId, u64)>> { Ok(InvertedIndex::postings(self, term)) }

    fn url(&self, id: &DocumentId) -> Result<Option<String>> { Ok(self.document(id).map(|d| d.url.clone())) }
}

/// Scores straight from `doc_count`, `term:` and `url:` records.
pub struct PersistedIndex<'a, S: Store + ?Sized> {
    store: &'a S,
}

impl<'a, S: Store + ?Sized> PersistedIndex<'a, S> {
    pub fn new(store: &'a S) -> Self { Self { store } }
}

impl<S: Store + ?Sized> TermSource for PersistedIndex<'_, S> {
    fn corpus_size(&self) -> Result<usize> { Ok(codec::load_doc_count(self.store)? as usize) }

    fn postings(&self, term: &str) -> Result<Vec<(DocumentId, u64)>> { codec::load_postings(self.store, term) }

    fn url(&self, id: &DocumentId) -> Result<Option<String>> { codec::load_url(self.store, id) }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: DocumentId,
    pub url: String,
    pub score: f64,
}

/// Rank documents by summed TF-IDF over the distinct query terms. Ties go to the
/// smaller URL. `top_k` of `None` returns every match.
pub fn rank<T: TermSource + ?Sized>(
    source: &T,
    tokenizer: &Tokenizer,
    query: &str,
    top_k: Option<usize>,
) -> Result<Vec<SearchHit>> {
    let terms: BTreeSet<String> = tokenizer.terms(query).collect();
    let mut matched = Vec::new();
    for term in terms {
        let postings = source.postings(&term)?;
        if !postings.is_empty() {
            matched.push((term, postings));
        }
    }
    if matched.is_empty() {
        return Ok(Vec::new());
    }

    // Read after the postings: the corpus only grows, so N never trails df.
    let n = source.corpus_size()?;
    let mut scores: HashMap<DocumentId, f64> = HashMap::new();
    for (term, postings) in &matched {
        let df = postings.len();
        let idf = idf_weight(n.max(df), df);
        tracing::debug!(term = %term, df, idf, "scoring term");
        for (id, count) in postings {
            *scores.entry(id.clone()).or_insert(0.0) += tf_weight(*count) * idf;
        }
    }

    let mut hits = Vec::with_capacity(scores.len());
    for (id, score) in scores {
        let url = source.url(&id)?.unwrap_or_default();
        hits.push(SearchHit { id, url, score });
    }
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.url.cmp(&b.url))
            .then_with(|| a.id.cmp(&b.id))
    });
    if let Some(k) = top_k {
        hits.truncate(k);
    }
    Ok(hits)
}

/// Ranked URLs for `query`.
pub fn search<T: TermSource + ?Sized>(
    source: &T,
    tokenizer: &Tokenizer,
    query: &str,
    top_k: Option<usize>,
) -> Result<Vec<String>> {
    Ok(rank(source, tokenizer, query, top_k)?.into_iter().map(|h| h.url).collect())
}
