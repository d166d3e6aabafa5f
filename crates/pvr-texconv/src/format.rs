/// Texel encodings selected by the `PixelFmt` field (bits 27..=29) of the texture control word.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TexelFormat {
    Argb1555,
    Rgb565,
    Argb4444,
    Yuv422,
    /// Bump maps are sampled as 4444.
    BumpMap,
    Pal4,
    Pal8,
    Reserved,
}

impl TexelFormat {
    pub const fn from_pixel_fmt(bits: u32) -> Self {
        match bits & 7 {
            0 => TexelFormat::Argb1555,
            1 => TexelFormat::Rgb565,
            2 => TexelFormat::Argb4444,
            3 => TexelFormat::Yuv422,
            4 => TexelFormat::BumpMap,
            5 => TexelFormat::Pal4,
            6 => TexelFormat::Pal8,
            _ => TexelFormat::Reserved,
        }
    }

    pub const fn pixel_fmt(self) -> u32 {
        match self {
            TexelFormat::Argb1555 => 0,
            TexelFormat::Rgb565 => 1,
            TexelFormat::Argb4444 => 2,
            TexelFormat::Yuv422 => 3,
            TexelFormat::BumpMap => 4,
            TexelFormat::Pal4 => 5,
            TexelFormat::Pal8 => 6,
            TexelFormat::Reserved => 7,
        }
    }

    pub const fn bits_per_pixel(self) -> u32 {
        match self {
            TexelFormat::Pal4 => 4,
            TexelFormat::Pal8 => 8,
            _ => 16,
        }
    }

    pub const fn is_paletted(self) -> bool {
        matches!(self, TexelFormat::Pal4 | TexelFormat::Pal8)
    }

    /// Whether decoded pixels can carry non-opaque alpha without consulting a palette.
    pub const fn has_alpha(self) -> bool {
        matches!(
            self,
            TexelFormat::Argb1555 | TexelFormat::Argb4444 | TexelFormat::BumpMap
        )
    }

    /// Pixel shape of one 8-byte block in the given layout.
    pub const fn block_shape(self, layout: Layout) -> BlockShape {
        match (self, layout) {
            (TexelFormat::Pal4, _) => BlockShape { width: 4, height: 4 },
            (TexelFormat::Pal8, _) => BlockShape { width: 2, height: 4 },
            (_, Layout::Planar) => BlockShape { width: 4, height: 1 },
            (_, Layout::Twiddled) => BlockShape { width: 2, height: 2 },
        }
    }
}

/// Texel ordering in VRAM.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Layout {
    /// Row-major, optionally with a stride wider than the texture.
    Planar,
    /// Bit-interleaved, see [`crate::twiddle`].
    Twiddled,
}

/// Pixels covered by one 8-byte source block (or one codebook entry).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockShape {
    pub width: u32,
    pub height: u32,
}

impl BlockShape {
    pub const fn pixels(self) -> u32 {
        self.width * self.height
    }
}
