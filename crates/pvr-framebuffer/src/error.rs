use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FramebufferError {
    #[error("unsupported framebuffer pack mode {0}")]
    UnsupportedPackMode(u32),

    #[error("framebuffer of {width}x{height} pixels is empty")]
    Empty { width: u32, height: u32 },

    #[error("pixel buffer holds {got} pixels, {needed} required")]
    PixelsTooShort { needed: usize, got: usize },

    #[error("destination holds {got} bytes, {needed} required")]
    DestinationTooShort { needed: usize, got: usize },
}

pub type Result<T, E = FramebufferError> = std::result::Result<T, E>;
