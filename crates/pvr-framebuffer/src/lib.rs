//! Framebuffer pixel packing for the PowerVR2.
//!
//! [`decode_framebuffer`] reads a displayed or rendered frame out of VRAM into linear 32-bit
//! pixels; [`encode_to_vram`] writes a render back, honouring the clip rectangle, ordered dither,
//! key value and alpha threshold of `FB_W_CTRL`. Writes go through [`pvr_vram::Vram`], so any
//! cached texture decoded from the overwritten bytes is invalidated. [`encode_to_texture`] packs a
//! render into a caller-owned buffer for render-to-texture.
//!
//! The [`registers`] module turns raw register values into [`FramebufferDescriptor`]s.

#![forbid(unsafe_code)]

mod codec;
mod descriptor;
pub mod dither;
mod error;
mod format;
pub mod registers;

pub use codec::{decode_framebuffer, encode_to_texture, encode_to_vram};
pub use descriptor::{ClipRect, FramebufferDescriptor, Interlace};
pub use error::{FramebufferError, Result};
pub use format::{FramebufferFormat, PackParams};
