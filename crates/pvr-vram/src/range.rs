use core::fmt;
use core::ops::Range;

/// Half-open byte range `[start, end)` of VRAM offsets.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct VramRange {
    pub start: u32,
    pub end: u32,
}

impl VramRange {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub const fn from_len(start: u32, len: u32) -> Self {
        Self {
            start,
            end: start.saturating_add(len),
        }
    }

    pub const fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub const fn contains(&self, offset: u32) -> bool {
        offset >= self.start && offset < self.end
    }

    pub const fn overlaps(&self, other: &VramRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Indices of the pages (of size `1 << page_shift`) this range touches.
    pub fn pages(&self, page_shift: u32) -> Range<u32> {
        if self.is_empty() {
            return 0..0;
        }
        (self.start >> page_shift)..(((self.end - 1) >> page_shift) + 1)
    }

    pub fn as_usize_range(&self) -> Range<usize> {
        self.start as usize..self.end as usize
    }
}

impl fmt::Debug for VramRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#08x}..{:#08x}", self.start, self.end)
    }
}
