use pvr_texconv::ChannelOrder;
use serde::{Deserialize, Serialize};

/// Knobs of the texture cache. Missing fields take their defaults when deserialized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureCacheConfig {
    /// Integer upscaling factor handed to the upscaler; 1 disables upscaling.
    pub upscale_factor: u32,
    /// Textures wider or taller than this are never upscaled.
    pub max_filtered_texture_size: u32,
    /// Upload full mip chains for mipmapped textures instead of the top level only.
    pub use_mipmaps: bool,
    /// Look up replacement images for decoded textures.
    pub custom_textures: bool,
    /// Export every freshly decoded texture.
    pub dump_textures: bool,
    /// Byte order of the pixels handed to the backend.
    pub channel_order: ChannelOrder,
    /// Maximum number of cached entries before the least recently used one is released.
    pub capacity: usize,
    /// Frames an entry may stay dirty before cleanup releases it.
    pub stale_frames: u64,
    /// Entries released per cleanup pass.
    pub cleanup_batch: usize,
}

impl Default for TextureCacheConfig {
    fn default() -> Self {
        Self {
            upscale_factor: 1,
            max_filtered_texture_size: 256,
            use_mipmaps: true,
            custom_textures: false,
            dump_textures: false,
            channel_order: ChannelOrder::Rgba,
            capacity: 4096,
            stale_frames: 120,
            cleanup_batch: 5,
        }
    }
}

impl TextureCacheConfig {
    /// Whether a `width` x `height` texture of this kind gets upscaled.
    pub fn upscales(&self, width: u32, height: u32, yuv: bool) -> bool {
        self.upscale_factor > 1
            && !yuv
            && width <= self.max_filtered_texture_size
            && height <= self.max_filtered_texture_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: TextureCacheConfig =
            serde_json::from_str(r#"{ "upscale_factor": 4, "channel_order": "bgra" }"#).unwrap();
        assert_eq!(cfg.upscale_factor, 4);
        assert_eq!(cfg.channel_order, ChannelOrder::Bgra);
        assert_eq!(cfg.max_filtered_texture_size, 256);
        assert!(cfg.use_mipmaps);
    }

    #[test]
    fn upscale_limits() {
        let cfg = TextureCacheConfig {
            upscale_factor: 2,
            ..Default::default()
        };
        assert!(cfg.upscales(256, 128, false));
        assert!(!cfg.upscales(512, 128, false));
        assert!(!cfg.upscales(64, 64, true));
        assert!(!TextureCacheConfig::default().upscales(8, 8, false));
    }
}
