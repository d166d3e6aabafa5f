//! PowerVR2 VRAM storage and write tracking.
//!
//! [`Vram`] owns the session's video memory. [`VramGuard`] records which byte ranges currently
//! back decoded textures and, when one of those ranges is written, invalidates the owner before
//! the write lands. Protection itself is a [`WriteProtect`] capability: [`SoftwareProtect`]
//! (checked by [`Vram`]'s write path) by default, or `mprotect` traps with the `host-mprotect`
//! feature for hosts that let generated code write VRAM directly.

#![deny(unsafe_code)]

mod error;
mod guard;
mod protect;
mod range;
mod vram;

#[cfg(all(unix, feature = "host-mprotect"))]
#[allow(unsafe_code)]
pub mod host;

pub use error::{Result, VramError};
pub use guard::{GuardConfig, InvalidationTarget, LockHandle, VramGuard, DEFAULT_PAGE_SIZE};
pub use protect::{SoftwareProtect, WriteProtect};
pub use range::VramRange;
pub use vram::{Vram, DEFAULT_VRAM_SIZE};
