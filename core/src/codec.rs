//! Key/value layout of a persisted index.
//!
//! | key                 | value                                   |
//! |---------------------|-----------------------------------------|
//! | `doc:<id>`          | `term:count,term:count,...`             |
//! | `term:<term>`       | `id:count,id:count,...`                 |
//! | `url:<id>`          | URL of the first instance indexed       |
//! | `content:<id>`      | zstd-compressed extracted text          |
//! | `doc_count`         | little-endian u64                       |
//! | `meta`              | JSON [`IndexMeta`]                      |
//!
//! Key parts and pair fields escape `%`, `:` and `,` so any term can be stored.
//! Counts are base-10 ASCII.

use crate::config::Normalization;
use crate::index::{Document, InvertedIndex, TermFrequencies};
use crate::store::Store;
use crate::{DocumentId, Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use time::format_description::well_known::Rfc3339;

pub const KEY_SEP: char = ':';
pub const PAIR_SEP: char = ',';

pub const DOC_NS: &str = "doc";
pub const TERM_NS: &str = "term";
pub const URL_NS: &str = "url";
pub const CONTENT_NS: &str = "content";
pub const DOC_COUNT_KEY: &str = "doc_count";
pub const META_KEY: &str = "meta";

pub const FORMAT_VERSION: u32 = 1;
const COMPRESSION_LEVEL: i32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub version: u32,
    pub normalization: Normalization,
    pub created_at: String,
}

impl IndexMeta {
    pub fn new(normalization: Normalization) -> Self {
        let created_at = time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
        Self { version: FORMAT_VERSION, normalization, created_at }
    }
}

fn escape(part: &str) -> Cow<'_, str> {
    if !part.contains(['%', KEY_SEP, PAIR_SEP]) {
        return Cow::Borrowed(part);
    }
    let mut out = String::with_capacity(part.len() + 4);
    for c in part.chars() {
        match c {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            ',' => out.push_str("%2C"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn unescape(s: &str) -> Option<String> {
    if !s.contains('%') {
        return Some(s.to_string());
    }
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = s.get(i + 1..i + 3)?;
            if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;
            }
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// `<namespace>:<part>` with the part escaped.
pub fn make_key(namespace: &str, part: &str) -> String { format!("{namespace}{KEY_SEP}{}", escape(part)) }

/// Recover the single part of a key in `namespace`.
pub fn parse_key(namespace: &str, key: &str) -> Option<String> {
    let part = key.strip_prefix(namespace)?.strip_prefix(KEY_SEP)?;
    unescape(part)
}

pub fn doc_key(id: &DocumentId) -> String { make_key(DOC_NS, id.as_str()) }
pub fn term_key(term: &str) -> String { make_key(TERM_NS, term) }
pub fn url_key(id: &DocumentId) -> String { make_key(URL_NS, id.as_str()) }
pub fn content_key(id: &DocumentId) -> String { make_key(CONTENT_NS, id.as_str()) }

fn prefix(namespace: &str) -> String { format!("{namespace}{KEY_SEP}") }

/// Comma-joined `field:count` pairs, sorted by field.
pub fn encode_pairs<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, u64)>,
{
    let mut pairs: Vec<(&str, u64)> = pairs.into_iter().collect();
    pairs.sort_unstable();
    let mut out = String::new();
    for (i, (field, count)) in pairs.into_iter().enumerate() {
        if i > 0 {
            out.push(PAIR_SEP);
        }
        out.push_str(&escape(field));
        out.push(KEY_SEP);
        out.push_str(&count.to_string());
    }
    out
}

/// Decode `field:count` pairs. A malformed pair is logged and skipped; the rest
/// of the record is still returned.
pub fn decode_pairs(key: &str, value: &[u8]) -> Vec<(String, u64)> {
    let Ok(s) = std::str::from_utf8(value) else {
        tracing::warn!(key, "record is not valid UTF-8, skipping");
        return Vec::new();
    };
    let mut out = Vec::new();
    for raw in s.split(PAIR_SEP) {
        if raw.is_empty() {
            continue;
        }
        match decode_pair(raw) {
            Ok(pair) => out.push(pair),
            Err(reason) => tracing::warn!(key, pair = raw, reason, "skipping malformed pair"),
        }
    }
    out
}

fn decode_pair(raw: &str) -> std::result::Result<(String, u64), &'static str> {
    let mut fields = raw.split(KEY_SEP);
    let (Some(field), Some(count), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err("expected exactly two fields");
    };
    let count: u64 = count.parse().map_err(|_| "count is not a number")?;
    let field = unescape(field).ok_or("bad escape sequence")?;
    if field.is_empty() {
        return Err("empty field");
    }
    Ok((field, count))
}

pub fn encode_document(tf: &TermFrequencies) -> String { encode_pairs(tf.iter()) }

pub fn decode_document(key: &str, value: &[u8]) -> TermFrequencies {
    TermFrequencies::from_counts(decode_pairs(key, value))
}

pub fn encode_postings(postings: &[(DocumentId, u64)]) -> String {
    encode_pairs(postings.iter().map(|(id, c)| (id.as_str(), *c)))
}

pub fn decode_postings(key: &str, value: &[u8]) -> Vec<(DocumentId, u64)> {
    decode_pairs(key, value).into_iter().map(|(id, c)| (DocumentId::from_stored(id), c)).collect()
}

pub fn encode_doc_count(n: u64) -> [u8; 8] { n.to_le_bytes() }

pub fn decode_doc_count(value: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = value
        .try_into()
        .map_err(|_| Error::encoding(DOC_COUNT_KEY, format!("expected 8 bytes, got {}", value.len())))?;
    Ok(u64::from_le_bytes(bytes))
}

pub fn compress(text: &str) -> Result<Vec<u8>> { Ok(zstd::encode_all(text.as_bytes(), COMPRESSION_LEVEL)?) }

pub fn decompress(key: &str, data: &[u8]) -> Result<String> {
    let bytes = zstd::decode_all(data)?;
    String::from_utf8(bytes).map_err(|_| Error::encoding(key, "content is not valid UTF-8"))
}

fn not_found_as_none<T>(r: Result<T>) -> Result<Option<T>> {
    match r {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Write every record of one document in a single batch.
pub fn write_document<S: Store + ?Sized>(store: &S, doc: &Document, text: Option<&str>) -> Result<()> {
    let record = encode_document(&doc.term_freq);
    let content = text.map(compress).transpose()?;
    let (dk, uk, ck) = (doc_key(&doc.id), url_key(&doc.id), content_key(&doc.id));
    store.batch_write(&mut |w| {
        w.set(&dk, record.as_bytes());
        w.set(&uk, doc.url.as_bytes());
        if let Some(c) = &content {
            w.set(&ck, c);
        }
        Ok(())
    })
}

/// Write the reverse index and `doc_count` from the in-memory index. Returns the
/// number of term records written.
pub fn write_postings<S: Store + ?Sized>(store: &S, index: &InvertedIndex) -> Result<usize> {
    let records = index.term_records();
    let doc_count = encode_doc_count(index.corpus_size() as u64);
    store.batch_write(&mut |w| {
        for (term, postings) in &records {
            w.set(&term_key(term), encode_postings(postings).as_bytes());
        }
        w.set(DOC_COUNT_KEY, &doc_count);
        Ok(())
    })?;
    Ok(records.len())
}

pub fn write_meta<S: Store + ?Sized>(store: &S, meta: &IndexMeta) -> Result<()> {
    let json = serde_json::to_vec(meta).map_err(|e| Error::encoding(META_KEY, e.to_string()))?;
    store.put(META_KEY, &json)
}

pub fn load_meta<S: Store + ?Sized>(store: &S) -> Result<Option<IndexMeta>> {
    let Some(raw) = not_found_as_none(store.get(META_KEY))? else { return Ok(None) };
    let meta = serde_json::from_slice(&raw).map_err(|e| Error::encoding(META_KEY, e.to_string()))?;
    Ok(Some(meta))
}

/// Persisted corpus size; zero if nothing was written yet.
pub fn load_doc_count<S: Store + ?Sized>(store: &S) -> Result<u64> {
    match not_found_as_none(store.get(DOC_COUNT_KEY))? {
        Some(raw) => decode_doc_count(&raw),
        None => Ok(0),
    }
}

pub fn load_postings<S: Store + ?Sized>(store: &S, term: &str) -> Result<Vec<(DocumentId, u64)>> {
    let key = term_key(term);
    Ok(not_found_as_none(store.get(&key))?.map(|raw| decode_postings(&key, &raw)).unwrap_or_default())
}

pub fn load_url<S: Store + ?Sized>(store: &S, id: &DocumentId) -> Result<Option<String>> {
    let raw = not_found_as_none(store.get(&url_key(id)))?;
    Ok(raw.map(|b| String::from_utf8_lossy(&b).into_owned()))
}

pub fn load_content<S: Store + ?Sized>(store: &S, id: &DocumentId) -> Result<Option<String>> {
    let key = content_key(id);
    match not_found_as_none(store.get(&key))? {
        Some(raw) => Ok(Some(decompress(&key, &raw)?)),
        None => Ok(None),
    }
}

/// Rebuild an index from `doc:` and `url:` records.
pub fn load_index<S: Store + ?Sized>(store: &S) -> Result<InvertedIndex> {
    let mut docs: Vec<(DocumentId, TermFrequencies)> = Vec::new();
    store.iterate_prefix(&prefix(DOC_NS), &mut |k, v| {
        let key = String::from_utf8_lossy(k);
        match parse_key(DOC_NS, &key) {
            Some(id) if !id.is_empty() => docs.push((DocumentId::from_stored(id), decode_document(&key, v))),
            _ => tracing::warn!(key = %key, "skipping record with malformed key"),
        }
        Ok(())
    })?;

    let index = InvertedIndex::new();
    for (id, term_freq) in docs {
        if term_freq.is_empty() {
            tracing::warn!(id = %id, "document record has no usable terms, skipping");
            continue;
        }
        let url = load_url(store, &id)?.unwrap_or_default();
        index.insert(Document { id, url, term_freq });
    }
    tracing::info!(docs = index.corpus_size(), terms = index.term_count(), "restored index");
    Ok(index)
}
