//! Arena for temporary in-memory byte handles ("blob URLs").
//!
//! Repeatedly fetched icons and wallpapers would grow memory without bound
//! if their byte buffers were never dropped. The arena centralizes the
//! lifecycle: every handle that must eventually be revoked enters through
//! [`BlobArena::acquire`], and is revoked exactly once, either
//! individually via [`BlobArena::release`] on replacement or in bulk via
//! [`BlobArena::release_category`]. Double-release is a no-op, not an
//! error: during rapid replacement several code paths may race to clean up
//! the same handle.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Prefix for all handle URLs issued by the arena.
pub const BLOB_URL_PREFIX: &str = "blob:iconduit/";

/// Bytes tracked by the arena, tagged for bulk cleanup.
#[derive(Debug, Clone)]
pub struct ManagedBlob {
    pub bytes: Arc<[u8]>,
    pub content_type: Option<String>,
    pub category: String,
}

#[derive(Debug, Default)]
struct ArenaInner {
    blobs: HashMap<String, ManagedBlob>,
    next_id: u64,
}

/// Tracker for addressable in-memory byte handles.
///
/// Handles are opaque `blob:iconduit/<serial>` URLs. Lookups, counts, and
/// releases are all O(1) map operations behind a short non-async lock, so
/// the arena is safe to call from both sync and async contexts.
#[derive(Debug, Default)]
pub struct BlobArena {
    inner: RwLock<ArenaInner>,
}

impl BlobArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register bytes under a fresh handle URL tagged with `category`.
    pub fn acquire(&self, bytes: impl Into<Arc<[u8]>>, content_type: Option<&str>, category: &str) -> String {
        let mut inner = self.inner.write().expect("blob arena lock poisoned");
        let url = format!("{BLOB_URL_PREFIX}{:016x}", inner.next_id);
        inner.next_id += 1;
        inner.blobs.insert(
            url.clone(),
            ManagedBlob {
                bytes: bytes.into(),
                content_type: content_type.map(|s| s.to_string()),
                category: category.to_string(),
            },
        );
        url
    }

    /// Revoke a handle. Returns `false` when the handle is untracked or
    /// already released; the second release of a URL has no effect.
    pub fn release(&self, url: &str) -> bool {
        let mut inner = self.inner.write().expect("blob arena lock poisoned");
        inner.blobs.remove(url).is_some()
    }

    /// Revoke every handle tagged with `category`, returning how many were
    /// released.
    pub fn release_category(&self, category: &str) -> usize {
        let mut inner = self.inner.write().expect("blob arena lock poisoned");
        let before = inner.blobs.len();
        inner.blobs.retain(|_, blob| blob.category != category);
        before - inner.blobs.len()
    }

    /// Resolve a live handle back to its bytes and content type.
    pub fn get(&self, url: &str) -> Option<ManagedBlob> {
        let inner = self.inner.read().expect("blob arena lock poisoned");
        inner.blobs.get(url).cloned()
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.inner.read().expect("blob arena lock poisoned").blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live handles tagged with `category`.
    pub fn category_len(&self, category: &str) -> usize {
        let inner = self.inner.read().expect("blob arena lock poisoned");
        inner.blobs.values().filter(|b| b.category == category).count()
    }
}
