//! PowerVR2 texture and framebuffer caching.
//!
//! The workspace is split along the pipeline:
//!
//! - [`texconv`]: pure texel decoders (twiddled, planar, VQ, palette, YUV).
//! - [`vram`]: the owned VRAM buffer and the page guard that reports writes into registered
//!   ranges.
//! - [`texcache`]: decoded textures keyed by their control words, invalidated through the guard
//!   and palette hashes, with optional custom replacement images.
//! - [`framebuffer`]: framebuffer and render-to-texture packing to and from VRAM.

#![forbid(unsafe_code)]

pub use pvr_framebuffer as framebuffer;
pub use pvr_texcache as texcache;
pub use pvr_texconv as texconv;
pub use pvr_vram as vram;
