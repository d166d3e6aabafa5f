//! Page-granular write tracking for decoded VRAM ranges.
//!
//! Every registered range gets a slot in a central table; pages only hold [`LockHandle`]s into
//! that table. Releasing a slot bumps its generation, so handles that outlive their registration
//! (an entry invalidated by a write, then released) are recognised and ignored.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::{debug, trace, warn};

use crate::error::{Result, VramError};
use crate::protect::{ProtectionMap, SoftwareProtect, WriteProtect};
use crate::range::VramRange;

pub const DEFAULT_PAGE_SIZE: u32 = 4096;

/// Receiver of invalidations raised by writes to a protected range.
pub trait InvalidationTarget: Send + Sync {
    /// Runs with the page table locked and must not call back into the guard.
    fn invalidate_from_write(&self, offset: u32);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GuardConfig {
    pub page_size: u32,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Registration of one range, returned by [`VramGuard::protect_range`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LockHandle {
    slot: u32,
    generation: u32,
}

struct LockedBlock {
    range: VramRange,
    owner: Weak<dyn InvalidationTarget>,
}

#[derive(Default)]
struct Slot {
    generation: u32,
    block: Option<LockedBlock>,
}

#[derive(Default)]
struct PageTable {
    pages: Vec<Vec<LockHandle>>,
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl PageTable {
    fn block(&self, handle: LockHandle) -> Option<&LockedBlock> {
        let slot = self.slots.get(handle.slot as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.block.as_ref()
    }

    fn insert(&mut self, block: LockedBlock) -> LockHandle {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.block = Some(block);
            return LockHandle {
                slot: index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            block: Some(block),
        });
        LockHandle {
            slot: index,
            generation: 0,
        }
    }

    /// Tombstones the slot and returns what it held.
    fn take(&mut self, handle: LockHandle) -> Option<LockedBlock> {
        let slot = self.slots.get_mut(handle.slot as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let block = slot.block.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.slot);
        self.live -= 1;
        Some(block)
    }
}

/// Tracks which VRAM pages back live decodes and invalidates their owners on write.
///
/// A page is write protected exactly while at least one registered range touches it. All table
/// mutations happen under one lock; [`VramGuard::is_page_protected`] reads a lock-free bitmap
/// so unprotected writes stay cheap.
pub struct VramGuard {
    table: Mutex<PageTable>,
    map: ProtectionMap,
    protector: Arc<dyn WriteProtect>,
    vram_size: u32,
    page_shift: u32,
}

impl std::fmt::Debug for VramGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VramGuard")
            .field("vram_size", &self.vram_size)
            .field("page_size", &self.page_size())
            .field("protected_pages", &self.map.count())
            .finish_non_exhaustive()
    }
}

impl VramGuard {
    /// Guard with software protection and the default page size.
    pub fn new(vram_size: u32) -> Result<Self> {
        Self::with_protector(vram_size, GuardConfig::default(), Arc::new(SoftwareProtect))
    }

    pub fn with_protector(
        vram_size: u32,
        config: GuardConfig,
        protector: Arc<dyn WriteProtect>,
    ) -> Result<Self> {
        if vram_size == 0 || !vram_size.is_power_of_two() {
            return Err(VramError::SizeNotPowerOfTwo(vram_size));
        }
        let page_size = config.page_size;
        if page_size == 0 || !page_size.is_power_of_two() || page_size > vram_size {
            return Err(VramError::InvalidPageSize {
                page_size,
                vram_size,
            });
        }
        let pages = vram_size / page_size;
        Ok(Self {
            table: Mutex::new(PageTable {
                pages: vec![Vec::new(); pages as usize],
                ..PageTable::default()
            }),
            map: ProtectionMap::new(pages),
            protector,
            vram_size,
            page_shift: page_size.trailing_zeros(),
        })
    }

    pub fn vram_size(&self) -> u32 {
        self.vram_size
    }

    pub fn page_size(&self) -> u32 {
        1 << self.page_shift
    }

    pub fn page_of(&self, offset: u32) -> u32 {
        (offset & (self.vram_size - 1)) >> self.page_shift
    }

    pub fn is_page_protected(&self, page: u32) -> bool {
        self.map.get(page)
    }

    /// Whether any page touched by `[offset, offset + len)` is protected.
    pub fn is_range_protected(&self, offset: u32, len: u32) -> bool {
        self.clamp(VramRange::from_len(offset, len))
            .is_some_and(|r| r.pages(self.page_shift).any(|p| self.map.get(p)))
    }

    pub fn protected_pages(&self) -> u32 {
        self.map.count()
    }

    /// Number of live registrations referencing `page`.
    pub fn page_ref_count(&self, page: u32) -> usize {
        self.lock()
            .pages
            .get(page as usize)
            .map_or(0, |list| list.len())
    }

    pub fn live_locks(&self) -> usize {
        self.lock().live
    }

    /// Whether `handle` still refers to a live registration.
    pub fn is_registered(&self, handle: LockHandle) -> bool {
        self.lock().block(handle).is_some()
    }

    fn lock(&self) -> MutexGuard<'_, PageTable> {
        self.table.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    fn clamp(&self, range: VramRange) -> Option<VramRange> {
        if range.start > range.end {
            warn!(
                start = range.start,
                end = range.end,
                "rejecting inverted VRAM lock range"
            );
            return None;
        }
        if range.start >= self.vram_size {
            warn!(
                start = range.start,
                vram_size = self.vram_size,
                "VRAM lock range starts past the end of VRAM"
            );
            return None;
        }
        let mut range = range;
        if range.end > self.vram_size {
            warn!(
                start = range.start,
                end = range.end,
                vram_size = self.vram_size,
                "clamping VRAM lock range to the end of VRAM"
            );
            range.end = self.vram_size;
        }
        (!range.is_empty()).then_some(range)
    }

    fn set_protected(&self, page: u32, protected: bool) {
        self.map.set(page, protected);
        let offset = page << self.page_shift;
        if protected {
            self.protector.protect(offset, self.page_size());
        } else {
            self.protector.unprotect(offset, self.page_size());
        }
    }

    /// Protects every page overlapping `range` and registers `owner` for invalidation.
    ///
    /// Returns `None` (nothing registered) for empty or inverted ranges. Ranges running past the
    /// end of VRAM are clamped.
    pub fn protect_range(
        &self,
        range: VramRange,
        owner: Weak<dyn InvalidationTarget>,
    ) -> Option<LockHandle> {
        let range = self.clamp(range)?;
        let mut table = self.lock();
        let handle = table.insert(LockedBlock { range, owner });
        for page in range.pages(self.page_shift) {
            let list = &mut table.pages[page as usize];
            if list.is_empty() {
                self.set_protected(page, true);
            }
            list.push(handle);
        }
        trace!(?range, slot = handle.slot, "protected VRAM range");
        Some(handle)
    }

    /// Drops a registration. Returns false if it was already gone.
    pub fn unprotect(&self, handle: LockHandle) -> bool {
        let mut table = self.lock();
        let Some(block) = table.take(handle) else {
            return false;
        };
        self.detach(&mut table, handle, block.range);
        trace!(range = ?block.range, slot = handle.slot, "unprotected VRAM range");
        true
    }

    /// Removes `handle` from the page lists of `range`, lifting protection on pages left empty.
    fn detach(&self, table: &mut PageTable, handle: LockHandle, range: VramRange) {
        for page in range.pages(self.page_shift) {
            let Some(list) = table.pages.get_mut(page as usize) else {
                continue;
            };
            list.retain(|h| *h != handle);
            if list.is_empty() && self.map.get(page) {
                self.set_protected(page, false);
            }
        }
    }

    /// Software write path: call before storing `len` bytes at `offset`.
    ///
    /// Returns the number of registrations invalidated.
    pub fn on_write(&self, offset: u32, len: u32) -> usize {
        if !self.is_range_protected(offset, len) {
            return 0;
        }
        self.on_write_fault_range(offset, len)
    }

    /// Fault callback for a write of one byte at `offset`.
    pub fn on_write_fault(&self, offset: u32) -> usize {
        self.on_write_fault_range(offset, 1)
    }

    /// Invalidates the owners of every registration hit by a write to `[offset, offset + len)`.
    ///
    /// With software protection only ranges containing a written byte are invalidated and a page
    /// stays protected while other registrations remain on it. Otherwise every registration on a
    /// written page is invalidated and the page is always unprotected so the write can retry.
    pub fn on_write_fault_range(&self, offset: u32, len: u32) -> usize {
        let offset = offset & (self.vram_size - 1);
        let Some(written) = self.clamp(VramRange::from_len(offset, len.max(1))) else {
            return 0;
        };
        let whole_page = !self.protector.resumes_protected_writes();
        let mut invalidated = 0;

        let mut table = self.lock();
        for page in written.pages(self.page_shift) {
            let page_range = VramRange::from_len(page << self.page_shift, self.page_size());
            let handles = table.pages[page as usize].clone();
            for handle in handles {
                let Some(range) = table.block(handle).map(|b| b.range) else {
                    warn!(page, slot = handle.slot, "page references a released lock slot");
                    table.pages[page as usize].retain(|h| *h != handle);
                    continue;
                };
                if !range.overlaps(&page_range) {
                    warn!(
                        page,
                        ?range,
                        "lock range no longer overlaps the faulting page"
                    );
                    table.pages[page as usize].retain(|h| *h != handle);
                    continue;
                }
                if !whole_page && !range.overlaps(&written) {
                    continue;
                }
                let Some(block) = table.take(handle) else {
                    continue;
                };
                self.detach(&mut table, handle, block.range);
                if let Some(owner) = block.owner.upgrade() {
                    owner.invalidate_from_write(offset);
                }
                invalidated += 1;
            }
            let page_empty = table.pages[page as usize].is_empty();
            if (whole_page || page_empty) && self.map.get(page) {
                if !page_empty {
                    table.pages[page as usize].clear();
                }
                self.set_protected(page, false);
            }
        }
        drop(table);

        if invalidated > 0 {
            debug!(offset, len, invalidated, "VRAM write invalidated cached ranges");
        }
        invalidated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct HitCounter {
        hits: AtomicU32,
    }

    impl InvalidationTarget for HitCounter {
        fn invalidate_from_write(&self, _offset: u32) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn target() -> (Arc<HitCounter>, Weak<dyn InvalidationTarget>) {
        let p = Arc::new(HitCounter::default());
        let weak: Weak<dyn InvalidationTarget> = Arc::downgrade(&p) as _;
        (p, weak)
    }

    #[test]
    fn rejects_bad_geometry() {
        assert_eq!(
            VramGuard::new(3000).unwrap_err(),
            VramError::SizeNotPowerOfTwo(3000)
        );
        let err = VramGuard::with_protector(
            0x1000,
            GuardConfig { page_size: 0x2000 },
            Arc::new(SoftwareProtect),
        )
        .unwrap_err();
        assert!(matches!(err, VramError::InvalidPageSize { .. }));
    }

    #[test]
    fn shared_page_stays_protected_until_last_release() {
        let guard = VramGuard::new(0x10000).unwrap();
        let (_a, wa) = target();
        let (_b, wb) = target();
        let ha = guard.protect_range(VramRange::new(0x1000, 0x1100), wa).unwrap();
        let hb = guard.protect_range(VramRange::new(0x1800, 0x2100), wb).unwrap();
        assert_eq!(guard.page_ref_count(1), 2);
        assert!(guard.unprotect(ha));
        assert!(guard.is_page_protected(1));
        assert!(guard.unprotect(hb));
        assert!(!guard.is_page_protected(1));
        assert!(!guard.is_page_protected(2));
        assert_eq!(guard.live_locks(), 0);
    }

    #[test]
    fn release_is_idempotent() {
        let guard = VramGuard::new(0x10000).unwrap();
        let (_a, wa) = target();
        let (_b, wb) = target();
        let ha = guard.protect_range(VramRange::new(0x0, 0x800), wa).unwrap();
        let _hb = guard.protect_range(VramRange::new(0x400, 0x900), wb).unwrap();
        assert!(guard.unprotect(ha));
        assert!(!guard.unprotect(ha));
        assert_eq!(guard.page_ref_count(0), 1);
        assert!(guard.is_page_protected(0));
    }

    #[test]
    fn stale_handle_does_not_release_reused_slot() {
        let guard = VramGuard::new(0x10000).unwrap();
        let (_a, wa) = target();
        let (_b, wb) = target();
        let ha = guard.protect_range(VramRange::new(0x0, 0x10), wa).unwrap();
        guard.unprotect(ha);
        let hb = guard.protect_range(VramRange::new(0x0, 0x10), wb).unwrap();
        assert_ne!(ha, hb);
        assert!(!guard.unprotect(ha));
        assert!(guard.is_registered(hb));
    }

    #[test]
    fn clamps_and_rejects_ranges() {
        let guard = VramGuard::new(0x4000).unwrap();
        let (_a, wa) = target();
        assert!(guard
            .protect_range(VramRange::new(0x200, 0x100), wa.clone())
            .is_none());
        assert!(guard.protect_range(VramRange::new(0x100, 0x100), wa.clone()).is_none());
        assert_eq!(guard.live_locks(), 0);

        let h = guard.protect_range(VramRange::new(0x3f00, 0x5000), wa).unwrap();
        assert!(guard.is_page_protected(3));
        assert!(guard.is_registered(h));
        assert_eq!(guard.protected_pages(), 1);
    }

    #[test]
    fn write_fault_invalidates_only_touched_ranges() {
        let guard = VramGuard::new(0x10000).unwrap();
        let (a, wa) = target();
        let (b, wb) = target();
        guard.protect_range(VramRange::new(0x2000, 0x2400), wa).unwrap();
        guard.protect_range(VramRange::new(0x2800, 0x3800), wb).unwrap();

        assert_eq!(guard.on_write(0x2100, 4), 1);
        assert_eq!(a.hits.load(Ordering::SeqCst), 1);
        assert_eq!(b.hits.load(Ordering::SeqCst), 0);
        assert!(guard.is_page_protected(2));

        // Unregistered bytes on a protected page do nothing.
        assert_eq!(guard.on_write(0x2600, 1), 0);
        assert_eq!(b.hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dropped_owner_is_skipped() {
        let guard = VramGuard::new(0x10000).unwrap();
        let (a, wa) = target();
        guard.protect_range(VramRange::new(0x0, 0x100), wa).unwrap();
        drop(a);
        assert_eq!(guard.on_write_fault(0x10), 1);
        assert!(!guard.is_page_protected(0));
        assert_eq!(guard.live_locks(), 0);
    }

    struct TrapProtect;

    impl WriteProtect for TrapProtect {
        fn protect(&self, _offset: u32, _len: u32) {}
        fn unprotect(&self, _offset: u32, _len: u32) {}
        fn resumes_protected_writes(&self) -> bool {
            false
        }
    }

    #[test]
    fn trap_protection_invalidates_whole_page() {
        let guard =
            VramGuard::with_protector(0x10000, GuardConfig::default(), Arc::new(TrapProtect))
                .unwrap();
        let (a, wa) = target();
        let (b, wb) = target();
        guard.protect_range(VramRange::new(0x2000, 0x2400), wa).unwrap();
        guard.protect_range(VramRange::new(0x2800, 0x3800), wb).unwrap();

        assert_eq!(guard.on_write_fault(0x2100), 2);
        assert_eq!(a.hits.load(Ordering::SeqCst), 1);
        assert_eq!(b.hits.load(Ordering::SeqCst), 1);
        assert!(!guard.is_page_protected(2));
        // The second range's other page was released along with it.
        assert!(!guard.is_page_protected(3));
    }
}
