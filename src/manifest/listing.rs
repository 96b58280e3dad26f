// src/manifest/listing.rs

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Shared snapshot of the files currently present in the output directory.
///
/// Readers take an `Arc` to an immutable snapshot; a refresh builds a whole
/// new set and swaps it in under the write lock, so nobody ever observes a
/// half-updated listing. Clones share the same underlying snapshot slot.
#[derive(Debug, Clone, Default)]
pub struct OutputListing {
    current: Arc<RwLock<Arc<BTreeSet<PathBuf>>>>,
}

impl OutputListing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<BTreeSet<PathBuf>> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    pub fn replace(&self, entries: BTreeSet<PathBuf>) {
        let fresh = Arc::new(entries);
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = fresh;
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.snapshot().contains(path)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}
