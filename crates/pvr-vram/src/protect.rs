use std::sync::atomic::{AtomicU64, Ordering};

/// Platform write-protection capability used by [`crate::VramGuard`].
///
/// Offsets and lengths are VRAM-relative and always page aligned. Implementations report
/// failures through logging; the guard treats protection as best effort.
pub trait WriteProtect: Send + Sync {
    fn protect(&self, offset: u32, len: u32);

    fn unprotect(&self, offset: u32, len: u32);

    /// Whether a faulting write can complete while its page stays protected.
    ///
    /// Software protection checks every write before it lands, so the guard may invalidate only
    /// the ranges actually written. Hardware traps retry the faulting instruction, which only
    /// makes progress once the whole page is writable again.
    fn resumes_protected_writes(&self) -> bool {
        true
    }
}

/// Protection enforced by [`crate::Vram`]'s write path instead of the MMU.
#[derive(Clone, Copy, Debug, Default)]
pub struct SoftwareProtect;

impl WriteProtect for SoftwareProtect {
    fn protect(&self, _offset: u32, _len: u32) {}

    fn unprotect(&self, _offset: u32, _len: u32) {}
}

/// One bit per page, readable without the page-table lock.
#[derive(Debug)]
pub(crate) struct ProtectionMap {
    words: Box<[AtomicU64]>,
}

impl ProtectionMap {
    pub(crate) fn new(pages: u32) -> Self {
        let words = (pages as usize).div_ceil(64);
        Self {
            words: (0..words).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    #[inline]
    pub(crate) fn get(&self, page: u32) -> bool {
        let (word, bit) = (page as usize / 64, page % 64);
        self.words
            .get(word)
            .is_some_and(|w| w.load(Ordering::Acquire) & (1 << bit) != 0)
    }

    pub(crate) fn set(&self, page: u32, protected: bool) {
        let (word, bit) = (page as usize / 64, page % 64);
        if let Some(w) = self.words.get(word) {
            if protected {
                w.fetch_or(1 << bit, Ordering::AcqRel);
            } else {
                w.fetch_and(!(1 << bit), Ordering::AcqRel);
            }
        }
    }

    pub(crate) fn count(&self) -> u32 {
        self.words
            .iter()
            .map(|w| w.load(Ordering::Relaxed).count_ones())
            .sum()
    }
}
