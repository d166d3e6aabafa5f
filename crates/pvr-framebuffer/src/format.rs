use pvr_texconv::color::{argb1555, argb4444, expand5, expand6, quantize, quantize_dithered};
use pvr_texconv::Rgba8;

use crate::error::{FramebufferError, Result};

/// Pixel packings of the display and render-to-texture framebuffers, in `FB_W_CTRL` pack mode
/// order. Multi-byte colors are stored blue first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FramebufferFormat {
    /// RGB555 with bit 15 taken from the key value's top bit.
    Krgb0555,
    Rgb565,
    Argb4444,
    /// RGB555 with bit 15 set when alpha exceeds the threshold.
    Argb1555,
    /// Three bytes per pixel.
    Rgb888,
    /// Four bytes per pixel, the fourth holding the key value.
    Krgb0888,
    Argb8888,
}

impl FramebufferFormat {
    pub fn from_pack_mode(pack_mode: u32) -> Result<Self> {
        Ok(match pack_mode {
            0 => FramebufferFormat::Krgb0555,
            1 => FramebufferFormat::Rgb565,
            2 => FramebufferFormat::Argb4444,
            3 => FramebufferFormat::Argb1555,
            4 => FramebufferFormat::Rgb888,
            5 => FramebufferFormat::Krgb0888,
            6 => FramebufferFormat::Argb8888,
            other => return Err(FramebufferError::UnsupportedPackMode(other)),
        })
    }

    pub const fn pack_mode(self) -> u32 {
        self as u32
    }

    /// Format of the `fb_depth` field of `FB_R_CTRL`.
    pub const fn from_display_depth(depth: u32) -> Self {
        match depth & 3 {
            0 => FramebufferFormat::Krgb0555,
            1 => FramebufferFormat::Rgb565,
            2 => FramebufferFormat::Rgb888,
            _ => FramebufferFormat::Krgb0888,
        }
    }

    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            FramebufferFormat::Rgb888 => 3,
            FramebufferFormat::Krgb0888 | FramebufferFormat::Argb8888 => 4,
            _ => 2,
        }
    }

    /// 16-bit formats; the only ones with fewer than 8 bits per channel.
    pub const fn is_16bit(self) -> bool {
        self.bytes_per_pixel() == 2
    }

    pub const fn stores_alpha(self) -> bool {
        matches!(
            self,
            FramebufferFormat::Argb4444 | FramebufferFormat::Argb1555 | FramebufferFormat::Argb8888
        )
    }

    /// Unpacks one pixel from `bytes` (at least [`Self::bytes_per_pixel`] long).
    ///
    /// With `concat`, 555/565 channels fill their low bits from it instead of replicating their
    /// high bits, as the display read path does.
    pub fn decode(self, bytes: &[u8], concat: Option<u8>) -> Rgba8 {
        let word = || u16::from_le_bytes([bytes[0], bytes[1]]);
        let c5 = |c: u16| {
            let c = (c & 0x1f) as u8;
            concat.map_or(expand5(c), |k| (c << 3) | (k & 7))
        };
        match self {
            FramebufferFormat::Krgb0555 => {
                let w = word();
                [c5(w >> 10), c5(w >> 5), c5(w), 0xff]
            }
            FramebufferFormat::Rgb565 => {
                let w = word();
                let g = ((w >> 5) & 0x3f) as u8;
                let g = concat.map_or(expand6(g), |k| (g << 2) | (k & 3));
                [c5(w >> 11), g, c5(w), 0xff]
            }
            FramebufferFormat::Argb4444 => argb4444(word()),
            FramebufferFormat::Argb1555 => argb1555(word()),
            FramebufferFormat::Rgb888 | FramebufferFormat::Krgb0888 => {
                [bytes[2], bytes[1], bytes[0], 0xff]
            }
            FramebufferFormat::Argb8888 => [bytes[2], bytes[1], bytes[0], bytes[3]],
        }
    }

    /// Packs one pixel into `out` (at least [`Self::bytes_per_pixel`] long).
    ///
    /// `dither` is the ordered-dither threshold for this pixel position, honoured by the 16-bit
    /// formats only.
    pub fn encode(self, [r, g, b, a]: Rgba8, params: &PackParams, dither: Option<u8>, out: &mut [u8]) {
        let q = |v: u8, bits: u32| -> u16 {
            match dither {
                Some(t) => quantize_dithered(v, bits, t) as u16,
                None => quantize(v, bits) as u16,
            }
        };
        let rgb555 = || (q(r, 5) << 10) | (q(g, 5) << 5) | q(b, 5);
        let word = match self {
            FramebufferFormat::Krgb0555 => {
                rgb555() | if params.kval & 0x80 != 0 { 0x8000 } else { 0 }
            }
            FramebufferFormat::Rgb565 => (q(r, 5) << 11) | (q(g, 6) << 5) | q(b, 5),
            FramebufferFormat::Argb4444 => (q(a, 4) << 12) | (q(r, 4) << 8) | (q(g, 4) << 4) | q(b, 4),
            FramebufferFormat::Argb1555 => {
                rgb555() | if a > params.alpha_threshold { 0x8000 } else { 0 }
            }
            FramebufferFormat::Rgb888 => {
                out[..3].copy_from_slice(&[b, g, r]);
                return;
            }
            FramebufferFormat::Krgb0888 => {
                out[..4].copy_from_slice(&[b, g, r, params.kval]);
                return;
            }
            FramebufferFormat::Argb8888 => {
                out[..4].copy_from_slice(&[b, g, r, a]);
                return;
            }
        };
        out[..2].copy_from_slice(&word.to_le_bytes());
    }
}

/// Constant inputs of pixel packing, from `FB_W_CTRL`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PackParams {
    /// Written to bit 15 (0555) or the fourth byte (0888).
    pub kval: u8,
    /// 1555 alpha is set for source alpha strictly above this.
    pub alpha_threshold: u8,
}

impl Default for PackParams {
    fn default() -> Self {
        Self {
            kval: 0,
            alpha_threshold: 0x7f,
        }
    }
}
