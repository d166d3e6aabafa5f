//! Texel format conversion for PowerVR2 (Dreamcast/Naomi) VRAM textures.
//!
//! Everything in this crate is a pure function of its inputs: callers hand in the VRAM bytes a
//! texture was stored in and receive packed 32-bit RGBA (or BGRA) pixels. Supported encodings:
//!
//! - 16-bit ARGB1555, RGB565, ARGB4444 and bump maps (decoded as 4444)
//! - YUV422 (two pixels share chroma)
//! - 4-bit and 8-bit palette indices, resolved through an already decoded palette bank
//! - VQ compression (2 KiB codebook followed by one index byte per block)
//!
//! in either the twiddled (bit-interleaved) or planar (row-major) layout, plus the mip chain
//! layout used by twiddled textures.

#![forbid(unsafe_code)]

mod buffer;
pub mod color;
mod decode;
mod format;
pub mod mipmap;
pub mod twiddle;

pub use buffer::{flatten_levels, PixelBuffer};
pub use color::{ChannelOrder, PaletteFormat, Rgba8};
pub use decode::{TexelDecoder, DIAGNOSTIC_PIXEL, VQ_CODEBOOK_SIZE};
pub use format::{BlockShape, Layout, TexelFormat};
