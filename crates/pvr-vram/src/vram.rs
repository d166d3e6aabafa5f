use std::sync::Arc;

use crate::error::{Result, VramError};
use crate::guard::VramGuard;
use crate::range::VramRange;

/// 8 MiB, the Dreamcast's VRAM.
pub const DEFAULT_VRAM_SIZE: u32 = 8 * 1024 * 1024;

/// Session-owned VRAM bytes.
///
/// Addresses wrap modulo the (power of two) size. Reads go straight to the buffer; every write
/// first reports itself to the shared [`VramGuard`] so decodes depending on the written bytes are
/// invalidated before the new value is observable.
#[derive(Debug)]
pub struct Vram {
    bytes: Box<[u8]>,
    mask: u32,
    guard: Arc<VramGuard>,
}

impl Vram {
    pub fn new(size: u32) -> Result<Self> {
        let guard = Arc::new(VramGuard::new(size)?);
        Self::with_guard(guard)
    }

    /// VRAM sized to match `guard`.
    pub fn with_guard(guard: Arc<VramGuard>) -> Result<Self> {
        let size = guard.vram_size();
        if size == 0 || !size.is_power_of_two() {
            return Err(VramError::SizeNotPowerOfTwo(size));
        }
        Ok(Self {
            bytes: vec![0u8; size as usize].into_boxed_slice(),
            mask: size - 1,
            guard,
        })
    }

    pub fn size(&self) -> u32 {
        self.mask + 1
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn guard(&self) -> &Arc<VramGuard> {
        &self.guard
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Bytes of `range`, truncated at the end of VRAM.
    pub fn bytes(&self, range: VramRange) -> &[u8] {
        let len = self.bytes.len();
        let start = (range.start as usize).min(len);
        let end = (range.end as usize).clamp(start, len);
        &self.bytes[start..end]
    }

    /// Everything from `offset` to the end of VRAM.
    pub fn tail(&self, offset: u32) -> &[u8] {
        let start = (offset as usize).min(self.bytes.len());
        &self.bytes[start..]
    }

    pub fn read_u8(&self, addr: u32) -> u8 {
        self.bytes[(addr & self.mask) as usize]
    }

    pub fn read_u16(&self, addr: u32) -> u16 {
        u16::from_le_bytes([self.read_u8(addr), self.read_u8(addr.wrapping_add(1))])
    }

    pub fn read_u32(&self, addr: u32) -> u32 {
        u32::from_le_bytes([
            self.read_u8(addr),
            self.read_u8(addr.wrapping_add(1)),
            self.read_u8(addr.wrapping_add(2)),
            self.read_u8(addr.wrapping_add(3)),
        ])
    }

    pub fn write_u8(&mut self, addr: u32, value: u8) {
        self.write_bytes(addr, &[value]);
    }

    pub fn write_u16(&mut self, addr: u32, value: u16) {
        self.write_bytes(addr, &value.to_le_bytes());
    }

    pub fn write_u32(&mut self, addr: u32, value: u32) {
        self.write_bytes(addr, &value.to_le_bytes());
    }

    /// Stores `data` at `addr`, wrapping at the end of VRAM.
    pub fn write_bytes(&mut self, addr: u32, data: &[u8]) {
        let mut addr = addr & self.mask;
        let mut rest = data;
        while !rest.is_empty() {
            let room = (self.size() - addr) as usize;
            let (chunk, tail) = rest.split_at(rest.len().min(room));
            self.guard.on_write(addr, chunk.len() as u32);
            let start = addr as usize;
            self.bytes[start..start + chunk.len()].copy_from_slice(chunk);
            addr = 0;
            rest = tail;
        }
    }

    pub fn fill(&mut self, range: VramRange, value: u8) {
        let start = (range.start as usize).min(self.bytes.len());
        let end = (range.end as usize).clamp(start, self.bytes.len());
        if start == end {
            return;
        }
        self.guard.on_write(start as u32, (end - start) as u32);
        self.bytes[start..end].fill(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_wrap_modulo_size() {
        let mut vram = Vram::new(0x1000).unwrap();
        vram.write_u32(0x0ffe, 0xaabb_ccdd);
        assert_eq!(vram.read_u8(0x0ffe), 0xdd);
        assert_eq!(vram.read_u8(0x0fff), 0xcc);
        assert_eq!(vram.read_u8(0x0000), 0xbb);
        assert_eq!(vram.read_u8(0x0001), 0xaa);
        assert_eq!(vram.read_u32(0x1ffe), 0xaabb_ccdd);
    }

    #[test]
    fn bytes_are_truncated_at_end() {
        let vram = Vram::new(0x1000).unwrap();
        assert_eq!(vram.bytes(VramRange::new(0xff0, 0x1100)).len(), 0x10);
        assert!(vram.bytes(VramRange::new(0x2000, 0x3000)).is_empty());
    }

    #[test]
    fn rejects_odd_sizes() {
        assert!(matches!(
            Vram::new(0x1800),
            Err(VramError::SizeNotPowerOfTwo(0x1800))
        ));
    }
}
