//! Favicon cache: in-memory read-through layer over the persistent icon
//! store, with blob-handle bookkeeping.
//!
//! Lookups on the hot path are synchronous and never touch I/O. Writes
//! swap the in-memory entry first and release the displaced blob handle
//! after the swap, so a reader never observes a revoked URL. Persistence
//! is best-effort: a store failure is logged and the in-memory entry
//! stands for the rest of the session.

use chrono::{DateTime, Utc};
use iconduit_core::blob::{BLOB_URL_PREFIX, BlobArena};
use iconduit_core::cache::hash::icon_digest;
use iconduit_core::{IconDb, IconRecord};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Arena category for all favicon blob handles.
pub const FAVICON_CATEGORY: &str = "favicon";

/// One origin's resolved icon, as held in memory.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Blob URL (or direct URL, for hydrated non-blob entries)
    pub url: String,
    /// True when the entry is a placeholder rather than a fetched icon
    pub is_default: bool,
    /// SHA-256 hex digest of the icon bytes
    pub digest: String,
    /// Informational only; nothing expires on it
    pub fetched_at: DateTime<Utc>,
}

/// Session-lifetime mapping from origin key to resolved icon.
pub struct FaviconCache {
    mem: RwLock<HashMap<String, CacheEntry>>,
    blobs: Arc<BlobArena>,
    db: Option<IconDb>,
}

impl FaviconCache {
    /// Create a cache over the given arena, optionally backed by a
    /// persistent store.
    pub fn new(blobs: Arc<BlobArena>, db: Option<IconDb>) -> Self {
        Self { mem: RwLock::new(HashMap::new()), blobs, db }
    }

    /// Synchronous read from the in-memory layer. Never blocks on I/O.
    pub fn get_cached(&self, origin_key: &str) -> Option<CacheEntry> {
        let mem = self.mem.read().expect("favicon cache lock poisoned");
        mem.get(origin_key).cloned()
    }

    /// Async read-through: in-memory hit, else persistent-store row
    /// re-materialized into a fresh blob handle and kept in memory.
    pub async fn hydrate(&self, origin_key: &str) -> Option<CacheEntry> {
        if let Some(entry) = self.get_cached(origin_key) {
            return Some(entry);
        }

        let db = self.db.as_ref()?;
        let record = match db.get_icon(origin_key).await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!("icon store read failed for {origin_key}: {err}");
                return None;
            }
        };

        let url = self
            .blobs
            .acquire(record.bytes, record.content_type.as_deref(), FAVICON_CATEGORY);
        let fetched_at = DateTime::parse_from_rfc3339(&record.fetched_at)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        let entry = CacheEntry { url: url.clone(), is_default: record.is_default, digest: record.digest, fetched_at };

        let mut mem = self.mem.write().expect("favicon cache lock poisoned");
        if let Some(existing) = mem.get(origin_key) {
            // Another task populated this origin while we read the store;
            // keep its entry and revoke the handle we just made.
            let existing = existing.clone();
            drop(mem);
            self.blobs.release(&url);
            return Some(existing);
        }
        mem.insert(origin_key.to_string(), entry.clone());
        drop(mem);

        Some(entry)
    }

    /// Store a fetched icon, replacing any previous entry for the origin.
    ///
    /// Returns the entry's URL. Unchanged bytes (same digest) keep the
    /// live handle and only refresh the timestamp. Last-writer-wins: a
    /// late arrival still lands, and the URL it displaces is always
    /// released.
    pub async fn store(
        &self,
        origin_key: &str,
        bytes: &[u8],
        content_type: Option<&str>,
        provider: Option<&str>,
        source_url: Option<&str>,
    ) -> String {
        let digest = icon_digest(bytes);

        {
            let mut mem = self.mem.write().expect("favicon cache lock poisoned");
            if let Some(entry) = mem.get_mut(origin_key)
                && entry.digest == digest
                && !entry.is_default
            {
                entry.fetched_at = Utc::now();
                return entry.url.clone();
            }
        }

        let url = self.blobs.acquire(bytes, content_type, FAVICON_CATEGORY);
        let entry = CacheEntry { url: url.clone(), is_default: false, digest: digest.clone(), fetched_at: Utc::now() };

        let displaced = {
            let mut mem = self.mem.write().expect("favicon cache lock poisoned");
            mem.insert(origin_key.to_string(), entry)
        };

        // Release after the swap, never before.
        if let Some(old) = displaced
            && old.url.starts_with(BLOB_URL_PREFIX)
        {
            self.blobs.release(&old.url);
        }

        if let Some(db) = &self.db {
            let record = IconRecord {
                origin_key: origin_key.to_string(),
                bytes: bytes.to_vec(),
                content_type: content_type.map(|s| s.to_string()),
                is_default: false,
                digest,
                provider: provider.map(|s| s.to_string()),
                source_url: source_url.map(|s| s.to_string()),
                fetched_at: Utc::now().to_rfc3339(),
            };
            if let Err(err) = db.upsert_icon(&record).await {
                tracing::warn!("icon store write failed for {origin_key}: {err}; in-memory entry stands");
            }
        }

        url
    }

    /// Drop one origin's entry, releasing its blob handle.
    pub async fn evict(&self, origin_key: &str) {
        let removed = {
            let mut mem = self.mem.write().expect("favicon cache lock poisoned");
            mem.remove(origin_key)
        };

        if let Some(entry) = removed
            && entry.url.starts_with(BLOB_URL_PREFIX)
        {
            self.blobs.release(&entry.url);
        }

        if let Some(db) = &self.db {
            if let Err(err) = db.delete_icon(origin_key).await {
                tracing::warn!("icon store delete failed for {origin_key}: {err}");
            }
        }
    }

    /// Drop every entry and bulk-release the favicon blob category.
    pub async fn clear(&self) {
        self.mem.write().expect("favicon cache lock poisoned").clear();
        let released = self.blobs.release_category(FAVICON_CATEGORY);
        tracing::debug!("cleared favicon cache, released {released} handles");

        if let Some(db) = &self.db {
            if let Err(err) = db.purge_all().await {
                tracing::warn!("icon store purge failed: {err}");
            }
        }
    }

    /// Number of in-memory entries.
    pub fn len(&self) -> usize {
        self.mem.read().expect("favicon cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The arena backing this cache's blob handles.
    pub fn blobs(&self) -> &Arc<BlobArena> {
        &self.blobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_only_cache() -> FaviconCache {
        FaviconCache::new(Arc::new(BlobArena::new()), None)
    }

    async fn db_backed_cache() -> FaviconCache {
        let db = IconDb::open_in_memory().await.unwrap();
        FaviconCache::new(Arc::new(BlobArena::new()), Some(db))
    }

    #[tokio::test]
    async fn test_store_then_get_roundtrip() {
        let cache = mem_only_cache();
        let url = cache
            .store("example.com", b"png-bytes", Some("image/png"), Some("duckduckgo"), None)
            .await;

        let entry = cache.get_cached("example.com").unwrap();
        assert_eq!(entry.url, url);
        assert!(!entry.is_default);

        let blob = cache.blobs().get(&url).unwrap();
        assert_eq!(blob.bytes.as_ref(), b"png-bytes");
        assert_eq!(blob.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_get_cached_missing() {
        let cache = mem_only_cache();
        assert!(cache.get_cached("nowhere.example").is_none());
    }

    #[tokio::test]
    async fn test_replacement_keeps_single_live_blob() {
        let cache = mem_only_cache();
        let first = cache.store("example.com", b"old-bytes", Some("image/png"), None, None).await;
        let second = cache.store("example.com", b"new-bytes", Some("image/png"), None, None).await;

        assert_ne!(first, second);
        assert_eq!(cache.blobs().category_len(FAVICON_CATEGORY), 1);
        assert!(cache.blobs().get(&first).is_none());
        assert_eq!(cache.blobs().get(&second).unwrap().bytes.as_ref(), b"new-bytes");
    }

    #[tokio::test]
    async fn test_unchanged_bytes_keep_live_handle() {
        let cache = mem_only_cache();
        let first = cache.store("example.com", b"same", Some("image/png"), None, None).await;
        let second = cache.store("example.com", b"same", Some("image/png"), None, None).await;

        assert_eq!(first, second);
        assert_eq!(cache.blobs().category_len(FAVICON_CATEGORY), 1);
        assert!(cache.blobs().get(&first).is_some());
    }

    #[tokio::test]
    async fn test_store_persists_and_hydrates() {
        let db = IconDb::open_in_memory().await.unwrap();
        let writer = FaviconCache::new(Arc::new(BlobArena::new()), Some(db.clone()));
        writer.store("example.com", b"png-bytes", Some("image/png"), Some("google-s2"), None).await;

        // Fresh cache over the same store: memory is cold, hydration
        // re-materializes the row into a new handle.
        let reader = FaviconCache::new(Arc::new(BlobArena::new()), Some(db));
        assert!(reader.get_cached("example.com").is_none());

        let entry = reader.hydrate("example.com").await.unwrap();
        assert!(!entry.is_default);
        let blob = reader.blobs().get(&entry.url).unwrap();
        assert_eq!(blob.bytes.as_ref(), b"png-bytes");

        // Hydration fills the synchronous layer.
        assert!(reader.get_cached("example.com").is_some());
        assert_eq!(reader.blobs().category_len(FAVICON_CATEGORY), 1);
    }

    #[tokio::test]
    async fn test_hydrate_missing_origin() {
        let cache = db_backed_cache().await;
        assert!(cache.hydrate("nowhere.example").await.is_none());
        assert_eq!(cache.blobs().len(), 0);
    }

    #[tokio::test]
    async fn test_evict_releases_handle() {
        let cache = db_backed_cache().await;
        let url = cache.store("example.com", b"png", Some("image/png"), None, None).await;

        cache.evict("example.com").await;
        assert!(cache.get_cached("example.com").is_none());
        assert!(cache.blobs().get(&url).is_none());
        assert!(cache.hydrate("example.com").await.is_none());
    }

    #[tokio::test]
    async fn test_clear_releases_category() {
        let cache = mem_only_cache();
        cache.store("a.example", b"a", None, None, None).await;
        cache.store("b.example", b"b", None, None, None).await;

        cache.clear().await;
        assert!(cache.is_empty());
        assert_eq!(cache.blobs().category_len(FAVICON_CATEGORY), 0);
    }

    #[tokio::test]
    async fn test_clear_spares_other_categories() {
        let arena = Arc::new(BlobArena::new());
        let wallpaper = arena.acquire(b"wall".as_slice(), None, "wallpaper");
        let cache = FaviconCache::new(arena.clone(), None);
        cache.store("a.example", b"a", None, None, None).await;

        cache.clear().await;
        assert!(arena.get(&wallpaper).is_some());
    }
}
