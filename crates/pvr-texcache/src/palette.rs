use pvr_texconv::{color::decode_palette, ChannelOrder, PaletteFormat, TexelFormat};

use crate::hash::content_hash;

/// Number of 32-bit entries in palette RAM.
pub const PALETTE_ENTRIES: usize = 1024;

/// Which slice of palette RAM a paletted texture indexes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PaletteSelector {
    /// 16 entries starting at `index * 16`.
    Bank16(u8),
    /// 256 entries starting at `index * 256`.
    Bank256(u8),
}

impl PaletteSelector {
    /// Selector for a texture of `format` with control word palette bits `pal_select`.
    pub fn for_texture(format: TexelFormat, pal_select: u32) -> Option<Self> {
        match format {
            TexelFormat::Pal4 => Some(PaletteSelector::Bank16((pal_select & 0x3f) as u8)),
            TexelFormat::Pal8 => Some(PaletteSelector::Bank256(((pal_select >> 4) & 3) as u8)),
            _ => None,
        }
    }

    pub fn start(self) -> usize {
        match self {
            PaletteSelector::Bank16(i) => i as usize * 16,
            PaletteSelector::Bank256(i) => i as usize * 256,
        }
    }

    pub fn len(self) -> usize {
        match self {
            PaletteSelector::Bank16(_) => 16,
            PaletteSelector::Bank256(_) => 256,
        }
    }

    pub fn range(self) -> std::ops::Range<usize> {
        self.start()..self.start() + self.len()
    }
}

/// The live palette, as seen by texture decodes.
pub trait PaletteSource {
    fn format(&self) -> PaletteFormat;

    /// Raw palette words of the selected bank.
    fn bank(&self, selector: PaletteSelector) -> &[u32];

    /// Content hash of the selected bank.
    fn bank_hash(&self, selector: PaletteSelector) -> u32;

    /// The selected bank decoded to output pixels.
    fn decoded_bank(&self, selector: PaletteSelector, order: ChannelOrder) -> Vec<u32> {
        let raw = self.bank(selector);
        let mut out = vec![0u32; raw.len()];
        decode_palette(raw, self.format(), order, &mut out);
        out
    }
}

/// Palette RAM with bank hashes kept current on every write.
#[derive(Clone, Debug)]
pub struct PaletteRam {
    entries: Box<[u32; PALETTE_ENTRIES]>,
    format: PaletteFormat,
    hash16: [u32; PALETTE_ENTRIES / 16],
    hash256: [u32; PALETTE_ENTRIES / 256],
}

impl Default for PaletteRam {
    fn default() -> Self {
        Self::new()
    }
}

impl PaletteRam {
    pub fn new() -> Self {
        let mut ram = Self {
            entries: Box::new([0; PALETTE_ENTRIES]),
            format: PaletteFormat::default(),
            hash16: [0; PALETTE_ENTRIES / 16],
            hash256: [0; PALETTE_ENTRIES / 256],
        };
        ram.rehash_all();
        ram
    }

    /// Writes `PAL_RAM_CTRL`.
    pub fn set_ctrl(&mut self, pal_ram_ctrl: u32) {
        self.format = PaletteFormat::from_ctrl(pal_ram_ctrl);
    }

    pub fn set_format(&mut self, format: PaletteFormat) {
        self.format = format;
    }

    pub fn entries(&self) -> &[u32] {
        &self.entries[..]
    }

    pub fn read(&self, index: usize) -> u32 {
        self.entries[index % PALETTE_ENTRIES]
    }

    pub fn write(&mut self, index: usize, value: u32) {
        let index = index % PALETTE_ENTRIES;
        if self.entries[index] == value {
            return;
        }
        self.entries[index] = value;
        self.rehash(index);
    }

    /// Bulk load starting at entry `first`; entries past the end of palette RAM are dropped.
    pub fn load(&mut self, first: usize, values: &[u32]) {
        let first = first.min(PALETTE_ENTRIES);
        let n = values.len().min(PALETTE_ENTRIES - first);
        self.entries[first..first + n].copy_from_slice(&values[..n]);
        self.rehash_all();
    }

    fn hash_slice(words: &[u32]) -> u32 {
        content_hash(bytemuck::cast_slice(words))
    }

    fn rehash(&mut self, index: usize) {
        let b16 = index / 16;
        self.hash16[b16] = Self::hash_slice(&self.entries[b16 * 16..(b16 + 1) * 16]);
        let b256 = index / 256;
        self.hash256[b256] = Self::hash_slice(&self.entries[b256 * 256..(b256 + 1) * 256]);
    }

    fn rehash_all(&mut self) {
        for b in 0..self.hash16.len() {
            self.hash16[b] = Self::hash_slice(&self.entries[b * 16..(b + 1) * 16]);
        }
        for b in 0..self.hash256.len() {
            self.hash256[b] = Self::hash_slice(&self.entries[b * 256..(b + 1) * 256]);
        }
    }
}

impl PaletteSource for PaletteRam {
    fn format(&self) -> PaletteFormat {
        self.format
    }

    fn bank(&self, selector: PaletteSelector) -> &[u32] {
        &self.entries[selector.range()]
    }

    fn bank_hash(&self, selector: PaletteSelector) -> u32 {
        match selector {
            PaletteSelector::Bank16(i) => self.hash16[i as usize % self.hash16.len()],
            PaletteSelector::Bank256(i) => self.hash256[i as usize % self.hash256.len()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_follow_pal_select() {
        assert_eq!(
            PaletteSelector::for_texture(TexelFormat::Pal4, 0x25),
            Some(PaletteSelector::Bank16(0x25))
        );
        assert_eq!(
            PaletteSelector::for_texture(TexelFormat::Pal8, 0x25),
            Some(PaletteSelector::Bank256(2))
        );
        assert_eq!(PaletteSelector::for_texture(TexelFormat::Rgb565, 0x25), None);
        assert_eq!(PaletteSelector::Bank16(0x25).range(), 0x250..0x260);
        assert_eq!(PaletteSelector::Bank256(3).range(), 0x300..0x400);
    }

    #[test]
    fn writes_only_change_covering_bank_hashes() {
        let mut ram = PaletteRam::new();
        let b0 = ram.bank_hash(PaletteSelector::Bank16(0));
        let b1 = ram.bank_hash(PaletteSelector::Bank16(1));
        let big = ram.bank_hash(PaletteSelector::Bank256(0));

        ram.write(3, 0xffff);

        assert_ne!(ram.bank_hash(PaletteSelector::Bank16(0)), b0);
        assert_eq!(ram.bank_hash(PaletteSelector::Bank16(1)), b1);
        assert_ne!(ram.bank_hash(PaletteSelector::Bank256(0)), big);
    }

    #[test]
    fn decoded_bank_uses_current_format() {
        let mut ram = PaletteRam::new();
        ram.write(16, 0xf800);
        ram.set_ctrl(1);
        let bank = ram.decoded_bank(PaletteSelector::Bank16(1), ChannelOrder::Rgba);
        assert_eq!(bank.len(), 16);
        assert_eq!(bank[0], ChannelOrder::Rgba.pack([255, 0, 0, 255]));
    }

    #[test]
    fn bulk_load_rehashes() {
        let mut ram = PaletteRam::new();
        let before = ram.bank_hash(PaletteSelector::Bank256(3));
        ram.load(1020, &[1, 2, 3, 4, 5, 6]);
        assert_eq!(ram.read(1023), 4);
        assert_ne!(ram.bank_hash(PaletteSelector::Bank256(3)), before);
    }
}
