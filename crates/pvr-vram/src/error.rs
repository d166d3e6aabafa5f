use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VramError {
    #[error("VRAM size {0:#x} is not a non-zero power of two")]
    SizeNotPowerOfTwo(u32),

    #[error("page size {page_size:#x} must be a power of two no larger than VRAM ({vram_size:#x})")]
    InvalidPageSize { page_size: u32, vram_size: u32 },

    #[error("guard covers {guard_size:#x} bytes but VRAM is {vram_size:#x}")]
    GuardSizeMismatch { guard_size: u32, vram_size: u32 },

    #[error("host memory protection failed: {0}")]
    Protection(String),
}

pub type Result<T, E = VramError> = std::result::Result<T, E>;
