use std::sync::Arc;

use crate::config::TextureCacheConfig;
use crate::custom::CustomTextures;
use crate::stats::TextureCacheStats;
use crate::upscale::{PixelReplicationUpscaler, Upscaler};

/// State shared by a cache and all of its entries.
pub struct CacheEnv {
    config: TextureCacheConfig,
    upscaler: Arc<dyn Upscaler>,
    stats: TextureCacheStats,
    custom: Option<CustomTextures>,
}

impl std::fmt::Debug for CacheEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEnv")
            .field("config", &self.config)
            .field("stats", &self.stats)
            .field("custom", &self.custom)
            .finish_non_exhaustive()
    }
}

impl CacheEnv {
    pub fn new(config: TextureCacheConfig) -> Self {
        Self {
            config,
            upscaler: Arc::new(PixelReplicationUpscaler),
            stats: TextureCacheStats::new(),
            custom: None,
        }
    }

    pub fn with_upscaler(mut self, upscaler: Arc<dyn Upscaler>) -> Self {
        self.upscaler = upscaler;
        self
    }

    pub fn with_custom_textures(mut self, custom: CustomTextures) -> Self {
        self.custom = Some(custom);
        self
    }

    pub fn config(&self) -> &TextureCacheConfig {
        &self.config
    }

    pub fn upscaler(&self) -> &dyn Upscaler {
        &*self.upscaler
    }

    pub fn stats(&self) -> &TextureCacheStats {
        &self.stats
    }

    pub fn custom(&self) -> Option<&CustomTextures> {
        self.custom.as_ref()
    }
}
