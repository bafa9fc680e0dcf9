use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt;

pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod index;
pub mod pipeline;
pub mod search;
pub mod store;
pub mod tokenizer;

pub use config::{Config, Normalization};
pub use engine::Engine;
pub use error::{Error, Result};
pub use index::{Document, InvertedIndex, TermFrequencies};
pub use pipeline::{build_index, Crawler, RunHandle, RunState, RunStats};
pub use search::{PersistedIndex, SearchHit, TermSource};
pub use store::{BatchWriter, MemoryStore, SledStore, Store};
pub use tokenizer::{tokenize, Tokenizer};

pub type Term = String;

/// Content address of a document: hex SHA-1 of its extracted text. Two URLs
/// serving the same text share one id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn from_text(text: &str) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(text.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Wrap an id read back from storage.
    pub fn from_stored(s: impl Into<String>) -> Self { Self(s.into()) }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// A fetched body as the crawler hands it over.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub url: String,
    pub content: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct TokenizedDocument {
    pub id: DocumentId,
    pub url: String,
    pub terms: Vec<Term>,
    /// Extracted text, kept only when content storage is enabled.
    pub text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_depends_on_content_only() {
        let a = DocumentId::from_text("the cat sat");
        let b = DocumentId::from_text("the cat sat");
        let c = DocumentId::from_text("the dog ran");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 40);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
