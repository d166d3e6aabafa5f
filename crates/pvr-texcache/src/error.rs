use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TextureError {
    /// The texture's source bytes run past the end of VRAM and cannot be clamped.
    #[error("texture source {start:#x}..{end:#x} exceeds VRAM size {vram_size:#x}")]
    OutOfBounds { start: u32, end: u32, vram_size: u32 },

    #[error("texture entry was released")]
    Released,
}

/// Failures of the custom texture layer. These are logged and never reach the render path.
#[derive(Debug, Error)]
pub enum CustomTextureError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image codec error on {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("decoded image {width}x{height} has an unusable size")]
    BadDimensions { width: u32, height: u32 },
}

pub type Result<T, E = TextureError> = std::result::Result<T, E>;
