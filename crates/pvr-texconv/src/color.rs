//! Channel expansion, quantization and packing for the 16-bit PVR color formats.
//!
//! Every expansion to 8 bits replicates the most significant bits into the low bits, which is
//! what the hardware does when it samples a 16-bit texel. Quantization back to fewer bits rounds
//! to nearest so that `quantize(expand(c)) == c` for every representable channel value.

/// One decoded color, `[r, g, b, a]`.
pub type Rgba8 = [u8; 4];

/// Byte order of a packed 32-bit output pixel.
///
/// `Rgba` lays out `r, g, b, a` in memory (little-endian `u32` with red in the low byte), which
/// is what GL-style backends consume. `Bgra` swaps red and blue for D3D-style backends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ChannelOrder {
    #[default]
    Rgba,
    Bgra,
}

impl ChannelOrder {
    #[inline]
    pub const fn pack(self, [r, g, b, a]: Rgba8) -> u32 {
        match self {
            ChannelOrder::Rgba => u32::from_le_bytes([r, g, b, a]),
            ChannelOrder::Bgra => u32::from_le_bytes([b, g, r, a]),
        }
    }

    #[inline]
    pub const fn unpack(self, pixel: u32) -> Rgba8 {
        let [c0, g, c2, a] = pixel.to_le_bytes();
        match self {
            ChannelOrder::Rgba => [c0, g, c2, a],
            ChannelOrder::Bgra => [c2, g, c0, a],
        }
    }
}

#[inline]
pub const fn expand4(c: u8) -> u8 {
    (c << 4) | (c & 0xf)
}

#[inline]
pub const fn expand5(c: u8) -> u8 {
    (c << 3) | (c >> 2)
}

#[inline]
pub const fn expand6(c: u8) -> u8 {
    (c << 2) | (c >> 4)
}

/// Rounds an 8-bit channel to `bits` bits (1..=8).
#[inline]
pub const fn quantize(value: u8, bits: u32) -> u8 {
    let max = (1u32 << bits) - 1;
    ((value as u32 * max + 127) / 255) as u8
}

/// Ordered-dither variant of [`quantize`]. `threshold` is in sixteenths of one output step.
///
/// The value is offset by `threshold / 16` of a step and then truncated, so a threshold of 8
/// behaves like rounding and the 4x4 pattern preserves the average over a block.
#[inline]
pub const fn quantize_dithered(value: u8, bits: u32, threshold: u8) -> u8 {
    let max = (1u32 << bits) - 1;
    let q = (value as u32 * max * 16 + (threshold as u32 & 0xf) * 255) / (255 * 16);
    if q > max {
        max as u8
    } else {
        q as u8
    }
}

#[inline]
pub const fn argb1555(word: u16) -> Rgba8 {
    let r = ((word >> 10) & 0x1f) as u8;
    let g = ((word >> 5) & 0x1f) as u8;
    let b = (word & 0x1f) as u8;
    let a = if word & 0x8000 != 0 { 0xff } else { 0 };
    [expand5(r), expand5(g), expand5(b), a]
}

#[inline]
pub const fn rgb565(word: u16) -> Rgba8 {
    let r = ((word >> 11) & 0x1f) as u8;
    let g = ((word >> 5) & 0x3f) as u8;
    let b = (word & 0x1f) as u8;
    [expand5(r), expand6(g), expand5(b), 0xff]
}

#[inline]
pub const fn argb4444(word: u16) -> Rgba8 {
    let a = ((word >> 12) & 0xf) as u8;
    let r = ((word >> 8) & 0xf) as u8;
    let g = ((word >> 4) & 0xf) as u8;
    let b = (word & 0xf) as u8;
    [expand4(r), expand4(g), expand4(b), expand4(a)]
}

#[inline]
pub const fn argb8888(word: u32) -> Rgba8 {
    let [b, g, r, a] = word.to_le_bytes();
    [r, g, b, a]
}

/// YUV422 to RGB with the integer coefficients the PVR texture unit uses.
///
/// `u` and `v` are stored biased by 128. Division truncates toward zero.
#[inline]
pub fn yuv422(y: u8, u: u8, v: u8) -> Rgba8 {
    let y = y as i32;
    let u = u as i32 - 128;
    let v = v as i32 - 128;

    let r = y + v * 11 / 8;
    let g = y - (u * 11 + v * 22) / 32;
    let b = y + u * 110 / 64;

    [
        r.clamp(0, 255) as u8,
        g.clamp(0, 255) as u8,
        b.clamp(0, 255) as u8,
        0xff,
    ]
}

/// Palette RAM entry encodings selected by `PAL_RAM_CTRL & 3`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PaletteFormat {
    #[default]
    Argb1555,
    Rgb565,
    Argb4444,
    Argb8888,
}

impl PaletteFormat {
    pub const fn from_ctrl(pal_ram_ctrl: u32) -> Self {
        match pal_ram_ctrl & 3 {
            0 => PaletteFormat::Argb1555,
            1 => PaletteFormat::Rgb565,
            2 => PaletteFormat::Argb4444,
            _ => PaletteFormat::Argb8888,
        }
    }

    pub const fn ctrl_bits(self) -> u32 {
        self as u32
    }

    /// Whether decoded entries can carry anything other than full alpha.
    pub const fn has_alpha(self) -> bool {
        !matches!(self, PaletteFormat::Rgb565)
    }

    #[inline]
    pub const fn decode(self, entry: u32) -> Rgba8 {
        match self {
            PaletteFormat::Argb1555 => argb1555(entry as u16),
            PaletteFormat::Rgb565 => rgb565(entry as u16),
            PaletteFormat::Argb4444 => argb4444(entry as u16),
            PaletteFormat::Argb8888 => argb8888(entry),
        }
    }
}

/// Decodes raw palette RAM words into packed output pixels.
pub fn decode_palette(raw: &[u32], format: PaletteFormat, order: ChannelOrder, out: &mut [u32]) {
    for (dst, &entry) in out.iter_mut().zip(raw) {
        *dst = order.pack(format.decode(entry));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_bit_expansion_replicates_high_bits() {
        assert_eq!(expand5(0), 0);
        assert_eq!(expand5(0x1f), 0xff);
        assert_eq!(expand5(0x10), 0x84);
        assert_eq!(expand6(0x3f), 0xff);
        assert_eq!(expand6(0x20), 0x82);
        assert_eq!(expand4(0xa), 0xaa);
    }

    #[test]
    fn quantize_inverts_expansion() {
        for c in 0..32u8 {
            assert_eq!(quantize(expand5(c), 5), c);
        }
        for c in 0..64u8 {
            assert_eq!(quantize(expand6(c), 6), c);
        }
        for c in 0..16u8 {
            assert_eq!(quantize(expand4(c), 4), c);
        }
    }

    #[test]
    fn dither_threshold_spans_one_step() {
        // 0x84 sits exactly on 5-bit level 16.
        assert_eq!(quantize_dithered(0x84, 5, 0), 16);
        assert_eq!(quantize_dithered(0x84, 5, 15), 16);
        // Halfway between levels 16 and 17.
        let mid = (expand5(16) as u32 + expand5(17) as u32) / 2;
        assert_eq!(quantize_dithered(mid as u8, 5, 0), 16);
        assert_eq!(quantize_dithered(mid as u8, 5, 15), 17);
        assert_eq!(quantize_dithered(0xff, 5, 15), 31);
    }

    #[test]
    fn unpackers_match_hardware_layouts() {
        assert_eq!(argb1555(0xfc00), [0xff, 0, 0, 0xff]);
        assert_eq!(argb1555(0x03e0), [0, 0xff, 0, 0]);
        assert_eq!(rgb565(0x07e0), [0, 0xff, 0, 0xff]);
        assert_eq!(argb4444(0x8f00), [0xff, 0, 0, 0x88]);
        assert_eq!(argb8888(0x80ff_4020), [0xff, 0x40, 0x20, 0x80]);
    }

    #[test]
    fn channel_order_swaps_red_and_blue() {
        let rgba = ChannelOrder::Rgba.pack([1, 2, 3, 4]);
        let bgra = ChannelOrder::Bgra.pack([1, 2, 3, 4]);
        assert_eq!(rgba.to_le_bytes(), [1, 2, 3, 4]);
        assert_eq!(bgra.to_le_bytes(), [3, 2, 1, 4]);
        assert_eq!(ChannelOrder::Bgra.unpack(bgra), [1, 2, 3, 4]);
    }

    #[test]
    fn yuv_grey_is_neutral() {
        assert_eq!(yuv422(0x80, 0x80, 0x80), [0x80, 0x80, 0x80, 0xff]);
        // Saturated chroma clamps instead of wrapping.
        assert_eq!(yuv422(0xff, 0xff, 0xff)[0], 0xff);
        assert_eq!(yuv422(0, 0, 0)[2], 0);
    }

    #[test]
    fn palette_format_follows_ctrl_bits() {
        assert_eq!(PaletteFormat::from_ctrl(0), PaletteFormat::Argb1555);
        assert_eq!(PaletteFormat::from_ctrl(7), PaletteFormat::Argb8888);
        let mut out = [0u32; 2];
        decode_palette(&[0xf800, 0x001f], PaletteFormat::Rgb565, ChannelOrder::Rgba, &mut out);
        assert_eq!(out[0].to_le_bytes(), [0xff, 0, 0, 0xff]);
        assert_eq!(out[1].to_le_bytes(), [0, 0, 0xff, 0xff]);
    }
}
