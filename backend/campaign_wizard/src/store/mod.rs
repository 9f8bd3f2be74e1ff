//! # Draft store
//!
//! Best-effort persistence of an in-progress campaign over a quota-bounded
//! key-value store. Two independent keys are used:
//!
//! | Key                     | Contents                         |
//! |-------------------------|----------------------------------|
//! | `donation_event_draft`  | [`FormDraft`] (scalar fields)    |
//! | `donation_event_images` | [`ImagePreviewCache`]            |
//!
//! Previews are much larger than field values, so they live under their own
//! key: when the preview cache overflows the quota it is dropped on its own
//! and the field draft survives.
//!
//! Before every write, if usage is above [`EVICTION_THRESHOLD`] of capacity,
//! entries that do not belong to the draft are evicted oldest first, then
//! the stale preview region itself.

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::errors::{Result, WizardError};
use crate::fields::FormDraft;
use crate::preview::ImagePreviewCache;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub const DRAFT_KEY: &str = "donation_event_draft";
pub const IMAGES_KEY: &str = "donation_event_images";

/// Fraction of capacity above which old entries are evicted before a write.
pub const EVICTION_THRESHOLD: f64 = 0.8;

/// Size and age of one stored entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
    pub key: String,
    pub bytes: usize,
    /// Ordering stamp; larger means written more recently.
    pub updated_at: i64,
}

/// Bytes an entry counts against the quota.
pub fn entry_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

/// Shared, origin-scoped string storage with a byte quota.
///
/// `set` must fail with [`WizardError::QuotaExceeded`] rather than exceed
/// [`KeyValueStore::capacity`].
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Ok even if the key does not exist.
    async fn remove(&self, key: &str) -> Result<()>;

    async fn entries(&self) -> Result<Vec<EntryMeta>>;

    /// Estimated capacity in bytes.
    fn capacity(&self) -> usize;

    async fn usage(&self) -> Result<usize> {
        Ok(self.entries().await?.iter().map(|e| e.bytes).sum())
    }
}

/// Outcome of writing the preview region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSave {
    Saved,
    /// Over quota; the region was removed.
    Dropped,
    /// Any other failure; swallowed.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistReport {
    pub fields_saved: bool,
    pub images: ImageSave,
}

impl PersistReport {
    pub fn images_dropped(&self) -> bool {
        self.images == ImageSave::Dropped
    }
}

#[derive(Clone)]
pub struct DraftStore {
    backend: Arc<dyn KeyValueStore>,
}

impl DraftStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub async fn save(&self, draft: &FormDraft) -> Result<()> {
        let json = serde_json::to_string(draft)?;
        self.evict_if_crowded().await?;
        self.backend.set(DRAFT_KEY, &json).await?;
        debug!("Saved draft ({} bytes)", json.len());
        Ok(())
    }

    /// Write the preview region. Overflowing the quota is not an error:
    /// the region is removed and [`ImageSave::Dropped`] returned.
    pub async fn save_images(&self, cache: &ImagePreviewCache) -> Result<ImageSave> {
        if cache.is_empty() {
            self.backend.remove(IMAGES_KEY).await?;
            return Ok(ImageSave::Saved);
        }

        let json = serde_json::to_string(cache)?;
        self.evict_if_crowded().await?;
        match self.backend.set(IMAGES_KEY, &json).await {
            Ok(()) => {
                debug!("Saved image previews ({} bytes)", json.len());
                Ok(ImageSave::Saved)
            }
            Err(WizardError::QuotaExceeded {
                needed, available, ..
            }) => {
                warn!("Image previews too large to keep ({needed} bytes, {available} available); dropping them");
                if let Err(e) = self.backend.remove(IMAGES_KEY).await {
                    warn!("Failed to remove stale image previews: {e}");
                }
                Ok(ImageSave::Dropped)
            }
            Err(e) => Err(e),
        }
    }

    /// Save fields, then previews. Never fails: errors other than a preview
    /// quota overflow are logged and reported as not saved.
    pub async fn persist(&self, draft: &FormDraft, images: &ImagePreviewCache) -> PersistReport {
        let fields_saved = match self.save(draft).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Draft save failed: {e}");
                false
            }
        };
        let images = match self.save_images(images).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Image preview save failed: {e}");
                ImageSave::Failed
            }
        };
        PersistReport {
            fields_saved,
            images,
        }
    }

    /// The stored draft, if it holds anything worth restoring.
    pub async fn load(&self) -> Result<Option<FormDraft>> {
        let Some(raw) = self.backend.get(DRAFT_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<FormDraft>(&raw) {
            Ok(draft) if draft.fields.has_meaningful_content() => Ok(Some(draft)),
            Ok(_) => {
                debug!("Stored draft is empty; not restoring");
                Ok(None)
            }
            Err(e) => {
                warn!("Discarding unreadable draft: {e}");
                Ok(None)
            }
        }
    }

    pub async fn load_images(&self) -> Result<Option<ImagePreviewCache>> {
        let Some(raw) = self.backend.get(IMAGES_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<ImagePreviewCache>(&raw) {
            Ok(cache) if !cache.is_empty() => Ok(Some(cache)),
            Ok(_) => Ok(None),
            Err(e) => {
                warn!("Discarding unreadable image previews: {e}");
                Ok(None)
            }
        }
    }

    pub async fn clear(&self) -> Result<()> {
        self.backend.remove(DRAFT_KEY).await?;
        self.backend.remove(IMAGES_KEY).await?;
        info!("Draft cleared");
        Ok(())
    }

    /// Evict entries until usage is back under the threshold. The field
    /// draft itself is never evicted. Returns the number of entries removed.
    async fn evict_if_crowded(&self) -> Result<usize> {
        let threshold = (self.backend.capacity() as f64 * EVICTION_THRESHOLD) as usize;
        let mut usage = self.backend.usage().await?;
        if usage <= threshold {
            return Ok(0);
        }

        let mut candidates: Vec<EntryMeta> = self
            .backend
            .entries()
            .await?
            .into_iter()
            .filter(|e| e.key != DRAFT_KEY)
            .collect();
        // Foreign entries oldest first, our own preview region last.
        candidates.sort_by_key(|e| (e.key == IMAGES_KEY, e.updated_at));

        let mut evicted = 0;
        for entry in candidates {
            if usage <= threshold {
                break;
            }
            self.backend.remove(&entry.key).await?;
            usage = usage.saturating_sub(entry.bytes);
            evicted += 1;
            debug!("Evicted {} ({} bytes)", entry.key, entry.bytes);
        }
        info!("Evicted {evicted} entries; usage now {usage} bytes");
        Ok(evicted)
    }
}
