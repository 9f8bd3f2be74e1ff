//! In-process [`KeyValueStore`] with a byte quota.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{entry_size, EntryMeta, KeyValueStore};
use crate::errors::{Result, WizardError};

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, (String, i64)>,
    /// Logical clock stamping each write.
    clock: i64,
}

#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().entries.get(key).map(|(v, _)| v.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut inner = self.lock();
        let usage: usize = inner
            .entries
            .iter()
            .map(|(k, (v, _))| entry_size(k, v))
            .sum();
        let existing = inner
            .entries
            .get(key)
            .map(|(v, _)| entry_size(key, v))
            .unwrap_or(0);
        let needed = entry_size(key, value);
        let available = self.capacity.saturating_sub(usage - existing);
        if needed > available {
            return Err(WizardError::QuotaExceeded {
                key: key.to_string(),
                needed,
                available,
            });
        }

        inner.clock += 1;
        let stamp = inner.clock;
        inner
            .entries
            .insert(key.to_string(), (value.to_string(), stamp));
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.lock().entries.remove(key);
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<EntryMeta>> {
        Ok(self
            .lock()
            .entries
            .iter()
            .map(|(k, (v, stamp))| EntryMeta {
                key: k.clone(),
                bytes: entry_size(k, v),
                updated_at: *stamp,
            })
            .collect())
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}
