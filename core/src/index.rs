use crate::{DocumentId, Term};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Occurrence counts of each term in one document. Zero counts are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermFrequencies(HashMap<Term, u64>);

impl TermFrequencies {
    pub fn from_terms<I, T>(terms: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Term>,
    {
        let mut counts: HashMap<Term, u64> = HashMap::new();
        for t in terms {
            *counts.entry(t.into()).or_insert(0) += 1;
        }
        Self(counts)
    }

    /// Build from stored (term, count) pairs; repeated terms are summed.
    pub fn from_counts<I: IntoIterator<Item = (Term, u64)>>(pairs: I) -> Self {
        let mut counts: HashMap<Term, u64> = HashMap::new();
        for (t, c) in pairs {
            if c > 0 {
                *counts.entry(t).or_insert(0) += c;
            }
        }
        Self(counts)
    }

    pub fn count(&self, term: &str) -> u64 { self.0.get(term).copied().unwrap_or(0) }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.0.iter().map(|(t, c)| (t.as_str(), *c))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub url: String,
    pub term_freq: TermFrequencies,
}

impl Document {
    pub fn new<I, T>(id: DocumentId, url: impl Into<String>, terms: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Term>,
    {
        Self { id, url: url.into(), term_freq: TermFrequencies::from_terms(terms) }
    }
}

/// `ln(1 + count)`
pub fn tf_weight(count: u64) -> f64 { (count as f64).ln_1p() }

/// `ln((N + 1) / (df + 1))`: zero when the term is in every document.
pub fn idf_weight(corpus_size: usize, df: usize) -> f64 {
    ((corpus_size as f64 + 1.0) / (df as f64 + 1.0)).ln()
}

/// Shared inverted index. Corpus and postings sit behind separate locks; any
/// operation touching both takes corpus first, then postings.
#[derive(Default)]
pub struct InvertedIndex {
    corpus: RwLock<HashMap<DocumentId, Arc<Document>>>,
    postings: RwLock<HashMap<Term, HashSet<DocumentId>>>,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    /// Count `terms` and insert the document. Returns false if the id was already indexed.
    pub fn add_document<I, T>(&self, id: DocumentId, url: &str, terms: I) -> bool
    where
        I: IntoIterator<Item = T>,
        T: Into<Term>,
    {
        self.insert(Document::new(id, url, terms)).is_some()
    }

    /// Insert a prepared document. Returns the stored document only when it was new.
    pub fn insert(&self, doc: Document) -> Option<Arc<Document>> {
        let mut corpus = self.corpus.write();
        if corpus.contains_key(&doc.id) {
            return None;
        }
        let mut postings = self.postings.write();
        for (term, _) in doc.term_freq.iter() {
            postings.entry(term.to_string()).or_default().insert(doc.id.clone());
        }
        let doc = Arc::new(doc);
        corpus.insert(doc.id.clone(), Arc::clone(&doc));
        Some(doc)
    }

    /// Take a document back out, dropping terms left without postings.
    pub fn remove(&self, id: &DocumentId) -> Option<Arc<Document>> {
        let mut corpus = self.corpus.write();
        let doc = corpus.remove(id)?;
        let mut postings = self.postings.write();
        for (term, _) in doc.term_freq.iter() {
            if let Some(ids) = postings.get_mut(term) {
                ids.remove(id);
                if ids.is_empty() {
                    postings.remove(term);
                }
            }
        }
        Some(doc)
    }

    pub fn term_frequency(&self, term: &str, id: &DocumentId) -> f64 {
        let count = self.corpus.read().get(id).map_or(0, |d| d.term_freq.count(term));
        tf_weight(count)
    }

    pub fn inverse_document_frequency(&self, term: &str) -> f64 {
        let corpus = self.corpus.read();
        let postings = self.postings.read();
        idf_weight(corpus.len(), postings.get(term).map_or(0, HashSet::len))
    }

    pub fn corpus_size(&self) -> usize { self.corpus.read().len() }

    pub fn term_count(&self) -> usize { self.postings.read().len() }

    pub fn document_frequency(&self, term: &str) -> usize {
        self.postings.read().get(term).map_or(0, HashSet::len)
    }

    pub fn contains(&self, id: &DocumentId) -> bool { self.corpus.read().contains_key(id) }

    pub fn document(&self, id: &DocumentId) -> Option<Arc<Document>> {
        self.corpus.read().get(id).cloned()
    }

    /// Posting set of `term` with each document's count for it.
    pub fn postings(&self, term: &str) -> Vec<(DocumentId, u64)> {
        let corpus = self.corpus.read();
        let postings = self.postings.read();
        let Some(ids) = postings.get(term) else { return Vec::new() };
        ids.iter()
            .filter_map(|id| corpus.get(id).map(|d| (id.clone(), d.term_freq.count(term))))
            .collect()
    }

    /// Every term with its postings, for writing the reverse index.
    pub fn term_records(&self) -> Vec<(Term, Vec<(DocumentId, u64)>)> {
        let corpus = self.corpus.read();
        let postings = self.postings.read();
        postings
            .iter()
            .map(|(term, ids)| {
                let list = ids
                    .iter()
                    .filter_map(|id| corpus.get(id).map(|d| (id.clone(), d.term_freq.count(term))))
                    .collect();
                (term.clone(), list)
            })
            .collect()
    }

    pub fn documents(&self) -> Vec<Arc<Document>> { self.corpus.read().values().cloned().collect() }
}
