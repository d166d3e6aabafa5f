//! Texture cache for PowerVR2 VRAM textures.
//!
//! [`TextureCache`] maps texture control words to decoded, uploaded textures. Each
//! [`TextureEntry`] registers the VRAM bytes it was decoded from with the session's
//! [`pvr_vram::VramGuard`]; a write into those bytes marks it dirty and the next lookup decodes it
//! again. Paletted textures additionally compare a hash of their palette bank, since palette RAM
//! is not VRAM. Re-decodes whose content hash did not change skip the upload.
//!
//! GPU objects stay behind the [`TextureBackend`] trait. Handles an entry gives up are queued and
//! deleted at a frame boundary with [`TextureCache::flush_deletions`].

mod backend;
mod cache;
mod config;
pub mod custom;
mod entry;
mod env;
mod error;
pub mod hash;
mod key;
mod palette;
mod stats;
mod upscale;

pub use backend::{TextureBackend, TextureType, TextureUpload};
pub use cache::{FrameState, TextureCache};
pub use config::TextureCacheConfig;
pub use custom::{
    CustomImage, CustomSlot, CustomTextureSource, CustomTextures, DirectoryTextureDumper,
    DirectoryTextureSource, TextureDumper,
};
pub use entry::{DecodePath, TextureEntry, UpdateContext};
pub use env::CacheEnv;
pub use error::{CustomTextureError, Result, TextureError};
pub use key::{Tcw, TcwBuilder, TcwFlags, TextureKey, Tsp};
pub use palette::{PaletteRam, PaletteSelector, PaletteSource, PALETTE_ENTRIES};
pub use stats::{TextureCacheStats, TextureCacheStatsSnapshot};
pub use upscale::{PixelReplicationUpscaler, Upscaler};
