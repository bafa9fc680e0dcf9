use crate::{Error, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// Collects the writes of one batch.
pub trait BatchWriter {
    fn set(&mut self, key: &str, value: &[u8]);
}

/// Minimal key/value contract the index persists through. Implementations are
/// safe to share between workers.
pub trait Store: Send + Sync {
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;
    /// Fails with [`Error::NotFound`] when the key is absent.
    fn get(&self, key: &str) -> Result<Vec<u8>>;
    /// Visit every key starting with `prefix`. An error from `visit` stops the scan.
    fn iterate_prefix(&self, prefix: &str, visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<()>) -> Result<()>;
    /// Apply every write made by `fill` together, or none if `fill` fails.
    fn batch_write(&self, fill: &mut dyn FnMut(&mut dyn BatchWriter) -> Result<()>) -> Result<()>;
    fn exists(&self, key: &str) -> bool;
    fn close(&self) -> Result<()>;
}

pub struct SledStore {
    db: sled::Db,
}

struct SledBatch(sled::Batch);

impl BatchWriter for SledBatch {
    fn set(&mut self, key: &str, value: &[u8]) { self.0.insert(key.as_bytes(), value); }
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> { Ok(Self { db: sled::open(path)? }) }

    pub fn temporary() -> Result<Self> {
        Ok(Self { db: sled::Config::new().temporary(true).open()? })
    }
}

impl Store for SledStore {
    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.db.insert(key, value)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        match self.db.get(key)? {
            Some(v) => Ok(v.to_vec()),
            None => Err(Error::NotFound(key.to_string())),
        }
    }

    fn iterate_prefix(&self, prefix: &str, visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<()>) -> Result<()> {
        for item in self.db.scan_prefix(prefix) {
            let (k, v) = item?;
            visit(&k, &v)?;
        }
        Ok(())
    }

    fn batch_write(&self, fill: &mut dyn FnMut(&mut dyn BatchWriter) -> Result<()>) -> Result<()> {
        let mut batch = SledBatch(sled::Batch::default());
        fill(&mut batch)?;
        self.db.apply_batch(batch.0)?;
        Ok(())
    }

    fn exists(&self, key: &str) -> bool { self.db.contains_key(key).unwrap_or(false) }

    fn close(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

/// In-process store over an ordered map. Every call fails once closed.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<String, Vec<u8>>>,
    closed: AtomicBool,
}

struct PendingWrites(Vec<(String, Vec<u8>)>);

impl BatchWriter for PendingWrites {
    fn set(&mut self, key: &str, value: &[u8]) { self.0.push((key.to_string(), value.to_vec())); }
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.data.read().len() }

    pub fn is_empty(&self) -> bool { self.data.read().is_empty() }

    pub fn keys(&self) -> Vec<String> { self.data.read().keys().cloned().collect() }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) { Err(Error::StoreClosed) } else { Ok(()) }
    }
}

impl Store for MemoryStore {
    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.check_open()?;
        self.data.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.check_open()?;
        self.data.read().get(key).cloned().ok_or_else(|| Error::NotFound(key.to_string()))
    }

    fn iterate_prefix(&self, prefix: &str, visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<()>) -> Result<()> {
        self.check_open()?;
        // snapshot so `visit` may write back without deadlocking
        let matched: Vec<(String, Vec<u8>)> = self
            .data
            .read()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (k, v) in matched {
            visit(k.as_bytes(), &v)?;
        }
        Ok(())
    }

    fn batch_write(&self, fill: &mut dyn FnMut(&mut dyn BatchWriter) -> Result<()>) -> Result<()> {
        self.check_open()?;
        let mut pending = PendingWrites(Vec::new());
        fill(&mut pending)?;
        let mut data = self.data.write();
        for (k, v) in pending.0 {
            data.insert(k, v);
        }
        Ok(())
    }

    fn exists(&self, key: &str) -> bool { self.check_open().is_ok() && self.data.read().contains_key(key) }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
