use serde::{Deserialize, Serialize};

/// How terms are normalized after tokenization. Nothing is folded unless asked for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Normalization {
    pub lowercase: bool,
    /// Apply NFKC compatibility normalization.
    pub nfkc: bool,
    /// English snowball stemming, applied to letter runs only.
    pub stem: bool,
}

/// Pipeline settings for one build run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capacity of the crawler -> tokenizer channel.
    pub raw_capacity: usize,
    /// Capacity of the tokenizer -> index channel.
    pub tokenized_capacity: usize,
    pub tokenizer_workers: usize,
    pub index_workers: usize,
    /// Persist the extracted text of each document, compressed.
    pub store_content: bool,
    pub normalization: Normalization,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            raw_capacity: 1000,
            tokenized_capacity: 1000,
            tokenizer_workers: 1,
            index_workers: 4,
            store_content: true,
            normalization: Normalization::default(),
        }
    }
}

impl Config {
    pub fn from_json(s: &str) -> serde_json::Result<Self> { serde_json::from_str(s) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = Config::from_json(r#"{"index_workers": 8, "normalization": {"lowercase": true}}"#).unwrap();
        assert_eq!(cfg.index_workers, 8);
        assert_eq!(cfg.raw_capacity, 1000);
        assert!(cfg.normalization.lowercase);
        assert!(!cfg.normalization.stem);
    }
}
