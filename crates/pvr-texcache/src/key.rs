//! Texture control words and the cache key derived from them.

use bitflags::bitflags;
use pvr_texconv::{PaletteFormat, TexelFormat};

/// Texture shading parameter word (only the texture-related fields are decoded).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Tsp(pub u32);

impl Tsp {
    pub const SIZE_MASK: u32 = 0x3f;

    pub const fn tex_v(self) -> u32 {
        self.0 & 7
    }

    pub const fn tex_u(self) -> u32 {
        (self.0 >> 3) & 7
    }

    pub const fn filter_mode(self) -> u32 {
        (self.0 >> 13) & 3
    }

    pub const fn width(self) -> u32 {
        8 << self.tex_u()
    }

    pub const fn height(self) -> u32 {
        8 << self.tex_v()
    }

    /// Smallest size fields covering a `width` x `height` surface (capped at 1024).
    pub fn for_size(width: u32, height: u32) -> Self {
        let mut u = 0;
        while u < 7 && (8u32 << u) < width {
            u += 1;
        }
        let mut v = 0;
        while v < 7 && (8u32 << v) < height {
            v += 1;
        }
        Tsp((u << 3) | v)
    }
}

bitflags! {
    /// Single-bit fields of the texture control word.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct TcwFlags: u32 {
        const STRIDE_SELECT = 1 << 25;
        const SCAN_ORDER = 1 << 26;
        const VQ_COMPRESSED = 1 << 30;
        const MIPMAPPED = 1 << 31;
    }
}

/// Texture control word.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Tcw(pub u32);

impl Tcw {
    /// Address, stride select, scan order, pixel format, VQ and mipmap bits.
    pub const KEY_MASK: u32 = 0xfe1f_ffff;

    pub const fn tex_addr(self) -> u32 {
        self.0 & 0x1f_ffff
    }

    pub fn flags(self) -> TcwFlags {
        TcwFlags::from_bits_truncate(self.0)
    }

    pub const fn pixel_fmt(self) -> u32 {
        (self.0 >> 27) & 7
    }

    pub const fn pal_select(self) -> u32 {
        (self.0 >> 21) & 0x3f
    }

    pub const fn format(self) -> TexelFormat {
        TexelFormat::from_pixel_fmt(self.pixel_fmt())
    }

    /// Byte address of the texture (or its codebook) in VRAM.
    pub const fn base_address(self, vram_mask: u32) -> u32 {
        (self.tex_addr() << 3) & vram_mask
    }

    pub fn planar(self) -> bool {
        self.flags().contains(TcwFlags::SCAN_ORDER)
    }

    pub fn vq_compressed(self) -> bool {
        self.flags().contains(TcwFlags::VQ_COMPRESSED)
    }

    pub fn mipmapped(self) -> bool {
        self.flags().contains(TcwFlags::MIPMAPPED)
    }

    pub fn stride_select(self) -> bool {
        self.flags().contains(TcwFlags::STRIDE_SELECT)
    }

    pub fn builder() -> TcwBuilder {
        TcwBuilder(0)
    }
}

/// Assembles control words, mostly for render-to-texture entries and tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct TcwBuilder(u32);

impl TcwBuilder {
    pub fn address(self, byte_address: u32) -> Self {
        Self((self.0 & !0x1f_ffff) | ((byte_address >> 3) & 0x1f_ffff))
    }

    pub fn format(self, format: TexelFormat) -> Self {
        Self((self.0 & !(7 << 27)) | (format.pixel_fmt() << 27))
    }

    pub fn palette(self, pal_select: u32) -> Self {
        Self((self.0 & !(0x3f << 21)) | ((pal_select & 0x3f) << 21))
    }

    pub fn flags(self, flags: TcwFlags) -> Self {
        Self(self.0 | flags.bits())
    }

    pub fn build(self) -> Tcw {
        Tcw(self.0)
    }
}

/// Identity of a cached texture.
///
/// Paletted textures keep the whole control word (palette select included) plus the palette
/// format and filter mode; other textures drop the bits that do not affect decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureKey(u64);

impl TextureKey {
    pub fn new(tsp: Tsp, tcw: Tcw, palette_format: PaletteFormat) -> Self {
        let mut low = tsp.0 & Tsp::SIZE_MASK;
        let high = if tcw.format().is_paletted() {
            low |= (palette_format.ctrl_bits() << 6) | (tsp.filter_mode() << 8);
            tcw.0
        } else {
            tcw.0 & Tcw::KEY_MASK
        };
        Self(((high as u64) << 32) | low as u64)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_word_fields() {
        let tcw = Tcw::builder()
            .address(0x10_0008)
            .format(TexelFormat::Pal8)
            .palette(0x2a)
            .flags(TcwFlags::VQ_COMPRESSED | TcwFlags::MIPMAPPED)
            .build();
        assert_eq!(tcw.base_address(0x7f_ffff), 0x10_0008);
        assert_eq!(tcw.format(), TexelFormat::Pal8);
        assert_eq!(tcw.pal_select(), 0x2a);
        assert!(tcw.vq_compressed() && tcw.mipmapped());
        assert!(!tcw.planar());
    }

    #[test]
    fn size_fields() {
        let tsp = Tsp((3 << 3) | 1);
        assert_eq!((tsp.width(), tsp.height()), (64, 16));
        assert_eq!(Tsp::for_size(640, 480), Tsp((7 << 3) | 6));
        assert_eq!(Tsp::for_size(1, 8), Tsp(0));
    }

    #[test]
    fn key_ignores_palette_bits_of_direct_color_textures() {
        let tsp = Tsp(0x09);
        let a = Tcw::builder().address(0x1000).format(TexelFormat::Rgb565);
        let b = a.palette(0x3f);
        assert_eq!(
            TextureKey::new(tsp, a.build(), PaletteFormat::Argb1555),
            TextureKey::new(tsp, b.build(), PaletteFormat::Argb8888)
        );
    }

    #[test]
    fn key_separates_palette_banks_and_formats() {
        let tsp = Tsp(0x09);
        let base = Tcw::builder().address(0x1000).format(TexelFormat::Pal4);
        let k = |tcw: TcwBuilder, f| TextureKey::new(tsp, tcw.build(), f);
        assert_ne!(
            k(base.palette(1), PaletteFormat::Argb1555),
            k(base.palette(2), PaletteFormat::Argb1555)
        );
        assert_ne!(
            k(base.palette(1), PaletteFormat::Argb1555),
            k(base.palette(1), PaletteFormat::Rgb565)
        );
    }
}
