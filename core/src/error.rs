use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A single page could not be fetched or parsed. The page is skipped.
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("malformed record {key}: {reason}")]
    Encoding { key: String, reason: String },

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Store(#[from] sled::Error),

    #[error("store is closed")]
    StoreClosed,

    #[error("crawler failed: {0}")]
    Crawler(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pipeline task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn encoding(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Encoding { key: key.into(), reason: reason.into() }
    }

    pub fn is_not_found(&self) -> bool { matches!(self, Error::NotFound(_)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_distinguished() {
        assert!(Error::NotFound("doc:abc".into()).is_not_found());
        assert!(!Error::StoreClosed.is_not_found());
        assert!(!Error::encoding("doc:abc", "bad count").is_not_found());
    }

    #[test]
    fn display_carries_context() {
        let e = Error::Fetch { url: "https://example.com".into(), reason: "timeout".into() };
        assert_eq!(e.to_string(), "fetch failed for https://example.com: timeout");
    }
}
