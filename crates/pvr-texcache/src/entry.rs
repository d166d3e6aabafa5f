//! One cached texture and its lifecycle.
//!
//! An entry starts dirty. [`TextureEntry::update`] protects the entry's VRAM range, hashes the
//! source bytes and, when they changed, decodes and uploads them. Writes into the protected range
//! (reported by the [`VramGuard`]) or a change of the selected palette bank make it dirty again.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use pvr_texconv::mipmap::{chain_size, decode_chain, level_offset};
use pvr_texconv::{
    flatten_levels, Layout, PixelBuffer, TexelDecoder, TexelFormat, DIAGNOSTIC_PIXEL,
    VQ_CODEBOOK_SIZE,
};
use pvr_vram::{InvalidationTarget, LockHandle, Vram, VramGuard, VramRange};
use tracing::{debug, trace, warn};

use crate::backend::{TextureBackend, TextureType, TextureUpload};
use crate::custom::{CustomImage, CustomSlot};
use crate::env::CacheEnv;
use crate::error::{Result, TextureError};
use crate::hash::texture_hash;
use crate::key::{Tcw, Tsp};
use crate::palette::{PaletteSelector, PaletteSource};

/// How an entry's source bytes turn into pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodePath {
    /// One 16-bit texel (or half a YUV pair) per two bytes.
    Linear16 { layout: Layout },
    /// 4- or 8-bit palette indices, always twiddled.
    Linear8Paletted { selector: PaletteSelector },
    /// 2 KiB codebook followed by one index per block.
    CompressedWithCodebook {
        layout: Layout,
        palette: Option<PaletteSelector>,
    },
    /// Full twiddled mip chain of the inner path, smallest level first.
    Mipmapped(Box<DecodePath>),
    /// Reserved pixel format; decodes to [`DIAGNOSTIC_PIXEL`].
    Unsupported,
}

impl DecodePath {
    pub fn select(tcw: Tcw) -> Self {
        let format = tcw.format();
        if format == TexelFormat::Reserved {
            return DecodePath::Unsupported;
        }
        let palette = PaletteSelector::for_texture(format, tcw.pal_select());
        let planar = tcw.planar() && palette.is_none();
        let layout = if planar {
            Layout::Planar
        } else {
            Layout::Twiddled
        };
        let path = match (tcw.vq_compressed(), palette) {
            (true, palette) => DecodePath::CompressedWithCodebook { layout, palette },
            (false, Some(selector)) => DecodePath::Linear8Paletted { selector },
            (false, None) => DecodePath::Linear16 { layout },
        };
        if tcw.mipmapped() && !planar {
            DecodePath::Mipmapped(Box::new(path))
        } else {
            path
        }
    }

    pub fn palette(&self) -> Option<PaletteSelector> {
        match self {
            DecodePath::Linear8Paletted { selector } => Some(*selector),
            DecodePath::CompressedWithCodebook { palette, .. } => *palette,
            DecodePath::Mipmapped(inner) => inner.palette(),
            DecodePath::Linear16 { .. } | DecodePath::Unsupported => None,
        }
    }

    pub fn is_compressed(&self) -> bool {
        match self {
            DecodePath::CompressedWithCodebook { .. } => true,
            DecodePath::Mipmapped(inner) => inner.is_compressed(),
            _ => false,
        }
    }

    pub fn is_mipmapped(&self) -> bool {
        matches!(self, DecodePath::Mipmapped(_))
    }

    pub fn is_planar(&self) -> bool {
        matches!(
            self,
            DecodePath::Linear16 {
                layout: Layout::Planar
            } | DecodePath::CompressedWithCodebook {
                layout: Layout::Planar,
                ..
            }
        )
    }
}

/// Everything an update needs from the outside world.
pub struct UpdateContext<'a, B: TextureBackend> {
    pub vram: &'a Vram,
    pub palette: &'a dyn PaletteSource,
    pub backend: &'a mut B,
    /// Handles replaced by this update, to be deleted at the next frame boundary.
    pub retired: &'a mut Vec<B::Handle>,
    /// `TEXT_CONTROL` register; its low five bits select the planar stride.
    pub text_control: u32,
}

/// Part of an entry the guard may reach from a write.
#[derive(Debug)]
struct EntryShared {
    dirty: AtomicBool,
    generation: AtomicU32,
}

impl EntryShared {
    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

impl InvalidationTarget for EntryShared {
    fn invalidate_from_write(&self, offset: u32) {
        trace!(offset, "texture invalidated by VRAM write");
        self.mark_dirty();
    }
}

/// Source bytes of one update.
#[derive(Clone, Copy, Debug)]
struct SourcePlan {
    range: VramRange,
    /// Rows that can be decoded; less than the texture height when clamped at the end of VRAM.
    rows: u32,
}

pub struct TextureEntry<H> {
    tsp: Tsp,
    tcw: Tcw,
    format: TexelFormat,
    path: DecodePath,
    width: u32,
    height: u32,
    env: Arc<CacheEnv>,
    guard: Arc<VramGuard>,
    shared: Arc<EntryShared>,
    lock: Option<LockHandle>,
    range: Option<VramRange>,
    hash: Option<u32>,
    palette_hash: Option<u32>,
    handle: Option<H>,
    upload_size: (u32, u32),
    custom: Arc<CustomSlot>,
    released: bool,
    warned_unsupported: bool,
    dirty_since: Option<u64>,
    last_used: u64,
}

impl<H> std::fmt::Debug for TextureEntry<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureEntry")
            .field("tsp", &self.tsp)
            .field("tcw", &self.tcw)
            .field("path", &self.path)
            .field("size", &(self.width, self.height))
            .field("range", &self.range)
            .field("hash", &self.hash)
            .field("dirty", &self.is_dirty())
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl<H> TextureEntry<H> {
    pub fn new(tsp: Tsp, tcw: Tcw, env: Arc<CacheEnv>, guard: Arc<VramGuard>) -> Self {
        let path = DecodePath::select(tcw);
        let width = tsp.width();
        let height = if path.is_mipmapped() {
            width
        } else {
            tsp.height()
        };
        Self {
            tsp,
            tcw,
            format: tcw.format(),
            path,
            width,
            height,
            env,
            guard,
            shared: Arc::new(EntryShared {
                dirty: AtomicBool::new(true),
                generation: AtomicU32::new(0),
            }),
            lock: None,
            range: None,
            hash: None,
            palette_hash: None,
            handle: None,
            upload_size: (0, 0),
            custom: CustomSlot::new(),
            released: false,
            warned_unsupported: false,
            dirty_since: None,
            last_used: 0,
        }
    }

    /// A clean entry for a `width` x `height` surface the renderer drew into `range`, backed by
    /// `handle`.
    ///
    /// The entry keeps the surface size rather than the power-of-two size of `tsp`, so a later
    /// re-decode reads rows with the stride they were written with.
    pub fn from_render_target(
        tsp: Tsp,
        tcw: Tcw,
        env: Arc<CacheEnv>,
        guard: Arc<VramGuard>,
        (width, height): (u32, u32),
        range: VramRange,
        handle: H,
    ) -> Self {
        let mut entry = Self::new(tsp, tcw, env, guard);
        entry.width = width;
        entry.height = height;
        entry.upload_size = (width, height);
        entry.handle = Some(handle);
        entry.shared.dirty.store(false, Ordering::Release);
        entry.protect(range);
        entry
    }

    pub fn tsp(&self) -> Tsp {
        self.tsp
    }

    pub fn tcw(&self) -> Tcw {
        self.tcw
    }

    pub fn format(&self) -> TexelFormat {
        self.format
    }

    pub fn path(&self) -> &DecodePath {
        &self.path
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Dimensions of the last upload (after upscaling or a custom override).
    pub fn upload_size(&self) -> (u32, u32) {
        self.upload_size
    }

    pub fn handle(&self) -> Option<&H> {
        self.handle.as_ref()
    }

    pub fn content_hash(&self) -> Option<u32> {
        self.hash
    }

    pub fn palette_hash(&self) -> Option<u32> {
        self.palette_hash
    }

    /// VRAM bytes the current decode depends on.
    pub fn vram_range(&self) -> Option<VramRange> {
        self.range
    }

    pub fn lock_handle(&self) -> Option<LockHandle> {
        self.lock
    }

    pub fn is_dirty(&self) -> bool {
        self.shared.dirty.load(Ordering::Acquire)
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Bumped on every invalidation.
    pub fn generation(&self) -> u32 {
        self.shared.generation.load(Ordering::Acquire)
    }

    pub fn custom_slot(&self) -> &Arc<CustomSlot> {
        &self.custom
    }

    pub(crate) fn touch(&mut self, frame: u64) {
        self.last_used = frame;
    }

    pub fn last_used(&self) -> u64 {
        self.last_used
    }

    /// Frame at which cleanup first saw this entry dirty; reset when it is clean.
    pub(crate) fn dirty_since(&mut self, frame: u64) -> Option<u64> {
        if self.is_dirty() {
            Some(*self.dirty_since.get_or_insert(frame))
        } else {
            self.dirty_since = None;
            None
        }
    }

    /// True if the entry must be decoded again before use: it was invalidated, never decoded,
    /// or the palette bank it reads has changed since the last decode.
    pub fn needs_update(&self, palette: &dyn PaletteSource) -> bool {
        if self.released {
            return false;
        }
        if self.is_dirty() {
            return true;
        }
        match self.path.palette() {
            Some(selector) => Some(palette.bank_hash(selector)) != self.palette_hash,
            None => false,
        }
    }

    /// Marks the entry dirty and drops its protection. The GPU handle stays usable.
    pub fn invalidate(&mut self) {
        self.shared.mark_dirty();
        if let Some(lock) = self.lock.take() {
            self.guard.unprotect(lock);
        }
    }

    /// Unregisters from the guard and hands the GPU handle to `retired`. Idempotent.
    pub fn release(&mut self, retired: &mut Vec<H>) {
        if self.released {
            return;
        }
        self.released = true;
        self.shared.mark_dirty();
        if let Some(lock) = self.lock.take() {
            self.guard.unprotect(lock);
        }
        self.custom.discard();
        if let Some(handle) = self.handle.take() {
            retired.push(handle);
        }
        trace!(tcw = format_args!("{:#010x}", self.tcw.0), "texture entry released");
    }

    fn protect(&mut self, range: VramRange) {
        let owner: Weak<dyn InvalidationTarget> = Arc::downgrade(&self.shared) as _;
        self.lock = self.guard.protect_range(range, owner);
        self.range = Some(range);
    }

    fn stride(&self, text_control: u32) -> u32 {
        if self.tcw.stride_select() && self.path.is_planar() {
            let stride = (text_control & 31) * 32;
            if stride != 0 {
                return stride;
            }
        }
        self.width
    }

    fn plan(&self, vram_size: u32, text_control: u32) -> Result<SourcePlan> {
        let base = self.tcw.base_address(vram_size - 1);
        let bpp = self.format.bits_per_pixel();
        let stride = self.stride(text_control);
        let planar = self.path.is_planar();
        let row_texels = if planar { stride } else { self.width };
        let (size, clampable) = match &self.path {
            DecodePath::Mipmapped(inner) => (
                chain_size(self.format, inner.is_compressed(), self.width.trailing_zeros()),
                false,
            ),
            DecodePath::CompressedWithCodebook { layout, .. } => {
                let per_index = self.format.block_shape(*layout).pixels();
                (VQ_CODEBOOK_SIZE + row_texels * self.height / per_index, false)
            }
            _ => (row_texels * self.height * bpp / 8, true),
        };

        let end = base as u64 + size as u64;
        if end <= vram_size as u64 {
            return Ok(SourcePlan {
                range: VramRange::new(base, end as u32),
                rows: self.height,
            });
        }
        let out_of_bounds = TextureError::OutOfBounds {
            start: base,
            end: end.min(u32::MAX as u64) as u32,
            vram_size,
        };
        if !clampable {
            return Err(out_of_bounds);
        }
        let mut rows = ((vram_size - base) as u64 * 8 / (row_texels as u64 * bpp as u64)) as u32;
        if !planar && rows > 0 {
            // The kept rows are re-twiddled as a texture of their own, which needs a power-of-two
            // height covering at least one block.
            rows = 1 << rows.ilog2();
            if rows < self.format.block_shape(Layout::Twiddled).height {
                rows = 0;
            }
        }
        if rows == 0 {
            return Err(out_of_bounds);
        }
        let range_end = base + rows * row_texels * bpp / 8;
        debug!(
            base,
            rows,
            height = self.height,
            "texture clamped at the end of VRAM"
        );
        Ok(SourcePlan {
            range: VramRange::new(base, range_end),
            rows,
        })
    }

    /// Decodes `source` into its levels, smallest first.
    fn decode(&self, source: &[u8], rows: u32, palette: &[u32], stride: u32, top_only: bool) -> Vec<PixelBuffer> {
        let decoder = TexelDecoder::new(self.format, self.env.config().channel_order).with_palette(palette);
        let (w, h) = (self.width, self.height);
        match &self.path {
            DecodePath::Unsupported => vec![PixelBuffer::filled(w, rows, DIAGNOSTIC_PIXEL)],
            DecodePath::Linear16 {
                layout: Layout::Planar,
            } => {
                let mut out = PixelBuffer::new(w, rows);
                decoder.decode_planar(source, stride, &mut out);
                vec![out]
            }
            DecodePath::Linear16 {
                layout: Layout::Twiddled,
            }
            | DecodePath::Linear8Paletted { .. } => {
                let mut out = PixelBuffer::new(w, rows);
                decoder.decode_twiddled(source, &mut out);
                vec![out]
            }
            DecodePath::CompressedWithCodebook { layout, .. } => {
                let split = source.len().min(VQ_CODEBOOK_SIZE as usize);
                let (codebook, indices) = source.split_at(split);
                let mut out = PixelBuffer::new(w, h);
                match layout {
                    Layout::Planar => decoder.decode_planar_vq(codebook, indices, stride, &mut out),
                    Layout::Twiddled => decoder.decode_vq(codebook, indices, &mut out),
                }
                vec![out]
            }
            DecodePath::Mipmapped(inner) => {
                let compressed = inner.is_compressed();
                let size_log2 = w.trailing_zeros();
                if !top_only {
                    return decode_chain(&decoder, source, size_log2, compressed);
                }
                let offset = level_offset(self.format, compressed, size_log2) as usize;
                let data = source.get(offset..).unwrap_or(&[]);
                let mut out = PixelBuffer::new(w, w);
                if compressed {
                    let codebook = &source[..source.len().min(VQ_CODEBOOK_SIZE as usize)];
                    decoder.decode_vq(codebook, data, &mut out);
                } else {
                    decoder.decode_twiddled(data, &mut out);
                }
                vec![out]
            }
        }
    }

    /// Re-decodes the entry if its source changed and re-registers its VRAM range.
    ///
    /// Sources that run past the end of VRAM are clamped to whole rows for linear textures. For
    /// compressed and mipmapped textures this fails with [`TextureError::OutOfBounds`]; the entry
    /// then stays dirty and unregistered.
    pub fn update<B>(&mut self, ctx: &mut UpdateContext<'_, B>) -> Result<()>
    where
        B: TextureBackend<Handle = H>,
    {
        if self.released {
            return Err(TextureError::Released);
        }
        let env = Arc::clone(&self.env);
        let config = env.config();
        let stats = env.stats();

        let plan = match self.plan(ctx.vram.size(), ctx.text_control) {
            Ok(plan) => plan,
            Err(err) => {
                stats.inc_invalid_textures();
                warn!(
                    tcw = format_args!("{:#010x}", self.tcw.0),
                    %err,
                    "texture cannot be decoded"
                );
                return Err(err);
            }
        };

        // Clear before protecting: a write racing with the decode below re-dirties the entry.
        self.shared.dirty.store(false, Ordering::Release);
        if let Some(lock) = self.lock.take() {
            self.guard.unprotect(lock);
        }
        self.protect(plan.range);

        let source = ctx.vram.bytes(plan.range);
        let selector = self.path.palette();
        let palette_hash = selector.map(|s| ctx.palette.bank_hash(s));
        let hash = texture_hash(source, palette_hash, self.tcw.0);
        if self.hash == Some(hash) && self.handle.is_some() {
            stats.inc_skipped_uploads();
            self.palette_hash = palette_hash;
            trace!(hash = format_args!("{hash:08x}"), "texture unchanged, upload skipped");
            return Ok(());
        }

        if self.path == DecodePath::Unsupported && !self.warned_unsupported {
            self.warned_unsupported = true;
            warn!(
                tcw = format_args!("{:#010x}", self.tcw.0),
                "reserved texture format, using diagnostic color"
            );
        }

        let order = config.channel_order;
        let palette = selector
            .map(|s| ctx.palette.decoded_bank(s, order))
            .unwrap_or_default();
        let upscale = config.upscales(self.width, plan.rows, self.format == TexelFormat::Yuv422);
        let top_only = upscale || !config.use_mipmaps;
        let stride = self.stride(ctx.text_control);
        let levels = self.decode(source, plan.rows, &palette, stride, top_only);
        stats.inc_decodes();

        let Some(top) = levels.last() else {
            return Ok(());
        };
        if let Some(custom) = env.custom() {
            if config.custom_textures {
                custom.request_load(hash, &self.custom);
            }
            if config.dump_textures
                && custom.request_dump(
                    hash,
                    CustomImage::from_pixels(top.width(), top.height(), top.pixels(), order),
                )
            {
                stats.inc_custom_dumps();
            }
        }

        let has_alpha = self.format.has_alpha()
            || (selector.is_some() && ctx.palette.format().has_alpha());
        let scaled;
        let (pixels, width, height, mip_levels): (&[u32], u32, u32, u32) = if levels.len() > 1 {
            scaled = flatten_levels(&levels);
            (scaled.as_slice(), self.width, self.width, levels.len() as u32)
        } else if upscale {
            let factor = config.upscale_factor;
            let (w, h) = (top.width() * factor, top.height() * factor);
            let mut out = vec![0u32; (w * h) as usize];
            env.upscaler()
                .scale(factor, top.pixels(), &mut out, top.width(), top.height(), has_alpha);
            scaled = out;
            (scaled.as_slice(), w, h, 1)
        } else {
            (top.pixels(), top.width(), top.height(), 1)
        };
        let source_type = if upscale {
            TextureType::Rgba8888
        } else {
            TextureType::for_format(self.format)
        };

        let handle = ctx.backend.upload_texture(&TextureUpload {
            pixels,
            width,
            height,
            order,
            source_type,
            mip_levels,
        });
        stats.inc_uploads();
        if let Some(old) = self.handle.replace(handle) {
            ctx.retired.push(old);
        }
        self.upload_size = (width, height);
        self.hash = Some(hash);
        self.palette_hash = palette_hash;
        trace!(
            hash = format_args!("{hash:08x}"),
            width,
            height,
            mip_levels,
            "texture uploaded"
        );
        Ok(())
    }

    /// Uploads a custom image that finished loading since the last call. Returns true if the
    /// entry's handle was replaced.
    pub fn check_custom_override<B>(&mut self, backend: &mut B, retired: &mut Vec<H>) -> bool
    where
        B: TextureBackend<Handle = H>,
    {
        if self.released {
            return false;
        }
        let Some(image) = self.custom.take_ready() else {
            return false;
        };
        let order = self.env.config().channel_order;
        let pixels = image.to_pixels(order);
        let handle = backend.upload_texture(&TextureUpload {
            pixels: &pixels,
            width: image.width,
            height: image.height,
            order,
            source_type: TextureType::Rgba8888,
            mip_levels: 1,
        });
        if let Some(old) = self.handle.replace(handle) {
            retired.push(old);
        }
        self.upload_size = (image.width, image.height);
        self.env.stats().inc_custom_loads();
        debug!(
            width = image.width,
            height = image.height,
            "custom texture replaced decoded texture"
        );
        true
    }
}

impl<H> Drop for TextureEntry<H> {
    fn drop(&mut self) {
        if let Some(lock) = self.lock.take() {
            self.guard.unprotect(lock);
        }
        self.custom.discard();
    }
}
