use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use pvr_texconv::{PaletteFormat, TexelFormat};
use pvr_vram::{Vram, VramGuard, VramRange};
use tracing::{debug, trace};

use crate::backend::TextureBackend;
use crate::config::TextureCacheConfig;
use crate::entry::{TextureEntry, UpdateContext};
use crate::env::CacheEnv;
use crate::key::{Tcw, TcwFlags, TextureKey, Tsp};
use crate::palette::PaletteSource;
use crate::stats::TextureCacheStatsSnapshot;

/// Emulator state a texture lookup reads.
#[derive(Clone, Copy)]
pub struct FrameState<'a> {
    pub vram: &'a Vram,
    pub palette: &'a dyn PaletteSource,
    /// `TEXT_CONTROL` register value.
    pub text_control: u32,
}

/// Bounded map from texture key to decoded texture.
///
/// Entries evicted, cleaned up or cleared hand their GPU handles to a retirement queue; the
/// renderer deletes them with [`TextureCache::flush_deletions`] once the frame using them is done.
pub struct TextureCache<H> {
    entries: LruCache<TextureKey, TextureEntry<H>>,
    env: Arc<CacheEnv>,
    guard: Arc<VramGuard>,
    retired: Vec<H>,
    frame: u64,
}

impl<H> std::fmt::Debug for TextureCache<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureCache")
            .field("len", &self.entries.len())
            .field("retired", &self.retired.len())
            .field("frame", &self.frame)
            .finish_non_exhaustive()
    }
}

impl<H> TextureCache<H> {
    pub fn new(config: TextureCacheConfig, guard: Arc<VramGuard>) -> Self {
        Self::with_env(Arc::new(CacheEnv::new(config)), guard)
    }

    pub fn with_env(env: Arc<CacheEnv>, guard: Arc<VramGuard>) -> Self {
        let capacity = NonZeroUsize::new(env.config().capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            env,
            guard,
            retired: Vec::new(),
            frame: 0,
        }
    }

    pub fn env(&self) -> &Arc<CacheEnv> {
        &self.env
    }

    pub fn config(&self) -> &TextureCacheConfig {
        self.env.config()
    }

    pub fn stats(&self) -> TextureCacheStatsSnapshot {
        self.env.stats().snapshot()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Handles waiting for [`TextureCache::flush_deletions`].
    pub fn pending_deletions(&self) -> usize {
        self.retired.len()
    }

    /// Looks at an entry without touching its recency.
    pub fn peek(&self, key: &TextureKey) -> Option<&TextureEntry<H>> {
        self.entries.peek(key)
    }

    /// Makes room for `key` if it is missing, releasing the least recently used entry.
    fn reserve(&mut self, key: &TextureKey) {
        if self.entries.contains(key) {
            self.env.stats().inc_lookup_hits();
            return;
        }
        self.env.stats().inc_lookup_misses();
        if self.entries.len() < self.entries.cap().get() {
            return;
        }
        if let Some((evicted_key, mut evicted)) = self.entries.pop_lru() {
            evicted.release(&mut self.retired);
            self.env.stats().inc_evictions();
            trace!(key = evicted_key.raw(), "evicted texture entry");
        }
    }

    /// The entry for `tsp`/`tcw`, created dirty if it is not cached.
    pub fn lookup_or_create(
        &mut self,
        tsp: Tsp,
        tcw: Tcw,
        palette_format: PaletteFormat,
    ) -> &mut TextureEntry<H> {
        let key = TextureKey::new(tsp, tcw, palette_format);
        self.reserve(&key);
        let (env, guard) = (Arc::clone(&self.env), Arc::clone(&self.guard));
        let entry = self
            .entries
            .get_or_insert_mut(key, || TextureEntry::new(tsp, tcw, env, guard));
        entry.touch(self.frame);
        entry
    }

    /// Resolves a texture for drawing: looks it up, decodes it if stale and swaps in a custom
    /// replacement once one has loaded. Returns `None` if the texture cannot be decoded.
    pub fn get_texture<B>(
        &mut self,
        tsp: Tsp,
        tcw: Tcw,
        state: &FrameState<'_>,
        backend: &mut B,
    ) -> Option<&H>
    where
        B: TextureBackend<Handle = H>,
    {
        let key = TextureKey::new(tsp, tcw, state.palette.format());
        self.reserve(&key);
        let (env, guard) = (Arc::clone(&self.env), Arc::clone(&self.guard));
        let entry = self
            .entries
            .get_or_insert_mut(key, || TextureEntry::new(tsp, tcw, env, guard));
        entry.touch(self.frame);

        if entry.needs_update(state.palette) {
            let mut ctx = UpdateContext {
                vram: state.vram,
                palette: state.palette,
                backend: &mut *backend,
                retired: &mut self.retired,
                text_control: state.text_control,
            };
            if let Err(err) = entry.update(&mut ctx) {
                debug!(key = key.raw(), %err, "texture lookup failed");
                return None;
            }
        }
        entry.check_custom_override(backend, &mut self.retired);
        entry.handle()
    }

    /// Registers a 16-bit surface the renderer drew at `address` as a clean texture backed by
    /// `handle`. Pack modes without a texture equivalent hand the handle back.
    pub fn register_render_target(
        &mut self,
        address: u32,
        pack_mode: u32,
        width: u32,
        height: u32,
        handle: H,
    ) -> Result<TextureKey, H> {
        let format = match pack_mode {
            0 | 3 => TexelFormat::Argb1555,
            1 => TexelFormat::Rgb565,
            2 => TexelFormat::Argb4444,
            _ => return Err(handle),
        };
        let address = address & (self.guard.vram_size() - 1);
        let tsp = Tsp::for_size(width, height);
        let tcw = Tcw::builder()
            .address(address)
            .format(format)
            .flags(TcwFlags::SCAN_ORDER)
            .build();
        let key = TextureKey::new(tsp, tcw, PaletteFormat::default());
        let range = VramRange::from_len(address, width * height * 2);
        let entry = TextureEntry::from_render_target(
            tsp,
            tcw,
            Arc::clone(&self.env),
            Arc::clone(&self.guard),
            (width, height),
            range,
            handle,
        );
        if let Some((old_key, mut old)) = self.entries.push(key, entry) {
            old.release(&mut self.retired);
            if old_key != key {
                self.env.stats().inc_evictions();
            }
        }
        if let Some(entry) = self.entries.peek_mut(&key) {
            entry.touch(self.frame);
        }
        debug!(address, pack_mode, width, height, "registered render target");
        Ok(key)
    }

    /// Releases up to `cleanup_batch` entries that have stayed dirty for `stale_frames` frames.
    /// Returns the number released.
    pub fn collect_garbage(&mut self, frame: u64) -> usize {
        self.frame = frame;
        let stale = self.env.config().stale_frames;
        let batch = self.env.config().cleanup_batch;
        let mut victims = Vec::new();
        for (key, entry) in self.entries.iter_mut() {
            let Some(since) = entry.dirty_since(frame) else {
                continue;
            };
            if victims.len() < batch && frame.saturating_sub(since) >= stale {
                victims.push(*key);
            }
        }
        for key in &victims {
            if let Some(mut entry) = self.entries.pop(key) {
                entry.release(&mut self.retired);
            }
        }
        if !victims.is_empty() {
            debug!(frame, released = victims.len(), "released stale textures");
        }
        victims.len()
    }

    /// Deletes retired GPU handles. Call once the frame that last used them has finished.
    pub fn flush_deletions<B>(&mut self, backend: &mut B) -> usize
    where
        B: TextureBackend<Handle = H>,
    {
        let count = self.retired.len();
        for handle in self.retired.drain(..) {
            backend.delete_texture(handle);
        }
        count
    }

    /// Releases every entry.
    pub fn clear(&mut self) {
        let count = self.entries.len();
        while let Some((_, mut entry)) = self.entries.pop_lru() {
            entry.release(&mut self.retired);
        }
        debug!(count, "texture cache cleared");
    }
}
