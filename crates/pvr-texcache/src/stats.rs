use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated on the render thread; readable from anywhere.
#[derive(Debug, Default)]
pub struct TextureCacheStats {
    lookup_hits: AtomicU64,
    lookup_misses: AtomicU64,
    decodes: AtomicU64,
    uploads: AtomicU64,
    skipped_uploads: AtomicU64,
    invalid_textures: AtomicU64,
    evictions: AtomicU64,
    custom_loads: AtomicU64,
    custom_dumps: AtomicU64,
}

impl TextureCacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_lookup_hits(&self) {
        self.lookup_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_lookup_misses(&self) {
        self.lookup_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_decodes(&self) {
        self.decodes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_uploads(&self) {
        self.uploads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_skipped_uploads(&self) {
        self.skipped_uploads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_invalid_textures(&self) {
        self.invalid_textures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_evictions(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_custom_loads(&self) {
        self.custom_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_custom_dumps(&self) {
        self.custom_dumps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TextureCacheStatsSnapshot {
        TextureCacheStatsSnapshot {
            lookup_hits: self.lookup_hits.load(Ordering::Relaxed),
            lookup_misses: self.lookup_misses.load(Ordering::Relaxed),
            decodes: self.decodes.load(Ordering::Relaxed),
            uploads: self.uploads.load(Ordering::Relaxed),
            skipped_uploads: self.skipped_uploads.load(Ordering::Relaxed),
            invalid_textures: self.invalid_textures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            custom_loads: self.custom_loads.load(Ordering::Relaxed),
            custom_dumps: self.custom_dumps.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextureCacheStatsSnapshot {
    pub lookup_hits: u64,
    pub lookup_misses: u64,
    pub decodes: u64,
    pub uploads: u64,
    pub skipped_uploads: u64,
    pub invalid_textures: u64,
    pub evictions: u64,
    pub custom_loads: u64,
    pub custom_dumps: u64,
}
