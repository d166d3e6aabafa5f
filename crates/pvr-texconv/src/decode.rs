use crate::buffer::PixelBuffer;
use crate::color::{argb1555, argb4444, rgb565, yuv422, ChannelOrder};
use crate::format::{Layout, TexelFormat};
use crate::twiddle::twiddle_index;

/// Fill color for textures whose format has no decoder (mid grey, half alpha).
pub const DIAGNOSTIC_PIXEL: u32 = 0x8080_8080;

/// 256 codebook entries of 8 bytes precede the index data of VQ textures.
pub const VQ_CODEBOOK_SIZE: u32 = 256 * 8;

// Source pixel order inside one 8-byte block.
const PAL4_ORDER: [(u32, u32); 16] = [
    (0, 0),
    (0, 1),
    (1, 0),
    (1, 1),
    (0, 2),
    (0, 3),
    (1, 2),
    (1, 3),
    (2, 0),
    (2, 1),
    (3, 0),
    (3, 1),
    (2, 2),
    (2, 3),
    (3, 2),
    (3, 3),
];
const PAL8_ORDER: [(u32, u32); 8] = [
    (0, 0),
    (0, 1),
    (1, 0),
    (1, 1),
    (0, 2),
    (0, 3),
    (1, 2),
    (1, 3),
];
const TWIDDLE_ORDER: [(u32, u32); 4] = [(0, 0), (0, 1), (1, 0), (1, 1)];

/// Copies the 8-byte block at `offset`, zero-filling whatever lies past the end of `src`.
#[inline]
fn read_block(src: &[u8], offset: usize) -> [u8; 8] {
    let mut block = [0u8; 8];
    if let Some(tail) = src.get(offset..) {
        let n = tail.len().min(8);
        block[..n].copy_from_slice(&tail[..n]);
    }
    block
}

#[inline]
fn block_u16(block: &[u8; 8], i: usize) -> u16 {
    u16::from_le_bytes([block[i * 2], block[i * 2 + 1]])
}

#[inline]
fn block_u32(block: &[u8; 8], i: usize) -> u32 {
    u32::from_le_bytes([
        block[i * 4],
        block[i * 4 + 1],
        block[i * 4 + 2],
        block[i * 4 + 3],
    ])
}

fn log2(edge: u32) -> u32 {
    edge.max(1).next_power_of_two().trailing_zeros()
}

/// Converts VRAM texel blocks of one format into packed output pixels.
///
/// Paletted formats resolve indices through `palette`, which must already be decoded to output
/// pixels and start at the selected bank. Indices past the end of the slice read as zero.
#[derive(Clone, Copy, Debug)]
pub struct TexelDecoder<'a> {
    format: TexelFormat,
    order: ChannelOrder,
    palette: &'a [u32],
}

impl<'a> TexelDecoder<'a> {
    pub fn new(format: TexelFormat, order: ChannelOrder) -> Self {
        Self {
            format,
            order,
            palette: &[],
        }
    }

    pub fn with_palette(self, palette: &'a [u32]) -> Self {
        Self { palette, ..self }
    }

    pub fn format(&self) -> TexelFormat {
        self.format
    }

    pub fn order(&self) -> ChannelOrder {
        self.order
    }

    /// Returns true if the format has no decoder; `out` then holds [`DIAGNOSTIC_PIXEL`].
    fn fill_unsupported(&self, out: &mut PixelBuffer) -> bool {
        if self.format == TexelFormat::Reserved {
            out.fill(DIAGNOSTIC_PIXEL);
            return true;
        }
        false
    }

    #[inline]
    fn palette_entry(&self, index: u8) -> u32 {
        self.palette.get(index as usize).copied().unwrap_or(0)
    }

    #[inline]
    fn texel16(&self, word: u16) -> u32 {
        let rgba = match self.format {
            TexelFormat::Rgb565 => rgb565(word),
            TexelFormat::Argb4444 | TexelFormat::BumpMap => argb4444(word),
            _ => argb1555(word),
        };
        self.order.pack(rgba)
    }

    #[inline]
    fn yuv(&self, y: u32, u: u32, v: u32) -> u32 {
        self.order
            .pack(yuv422((y & 0xff) as u8, (u & 0xff) as u8, (v & 0xff) as u8))
    }

    fn convert_block(&self, block: &[u8; 8], layout: Layout, out: &mut PixelBuffer, x: u32, y: u32) {
        match (self.format, layout) {
            (TexelFormat::Pal4, _) => {
                for (i, &(dx, dy)) in PAL4_ORDER.iter().enumerate() {
                    let byte = block[i / 2];
                    let index = if i % 2 == 0 { byte & 0xf } else { byte >> 4 };
                    out.put(x + dx, y + dy, self.palette_entry(index));
                }
            }
            (TexelFormat::Pal8, _) => {
                for (i, &(dx, dy)) in PAL8_ORDER.iter().enumerate() {
                    out.put(x + dx, y + dy, self.palette_entry(block[i]));
                }
            }
            (TexelFormat::Yuv422, Layout::Twiddled) => {
                // Columns share chroma: words 0/2 hold row 0, words 1/3 hold row 1.
                for row in 0..2 {
                    let left = block_u16(block, row) as u32;
                    let right = block_u16(block, row + 2) as u32;
                    let (u, v) = (left, right);
                    out.put(x, y + row as u32, self.yuv(left >> 8, u, v));
                    out.put(x + 1, y + row as u32, self.yuv(right >> 8, u, v));
                }
            }
            (TexelFormat::Yuv422, Layout::Planar) => {
                for pair in 0..2 {
                    let word = block_u32(block, pair);
                    let (u, y0, v, y1) = (word, word >> 8, word >> 16, word >> 24);
                    let px = x + pair as u32 * 2;
                    out.put(px, y, self.yuv(y0, u, v));
                    out.put(px + 1, y, self.yuv(y1, u, v));
                }
            }
            (_, Layout::Twiddled) => {
                for (i, &(dx, dy)) in TWIDDLE_ORDER.iter().enumerate() {
                    out.put(x + dx, y + dy, self.texel16(block_u16(block, i)));
                }
            }
            (_, Layout::Planar) => {
                for i in 0..4 {
                    out.put(x + i as u32, y, self.texel16(block_u16(block, i)));
                }
            }
        }
    }

    /// Row-major texels, `stride` texels per source row (0 means the output width).
    ///
    /// Paletted formats have no planar encoding and are read as twiddled.
    pub fn decode_planar(&self, src: &[u8], stride: u32, out: &mut PixelBuffer) {
        if self.fill_unsupported(out) {
            return;
        }
        if self.format.is_paletted() {
            self.decode_twiddled(src, out);
            return;
        }
        let stride = if stride == 0 { out.width() } else { stride };
        let blocks_per_row = stride / 4;
        let visible = blocks_per_row.min(out.width().div_ceil(4));
        for y in 0..out.height() {
            for bx in 0..visible {
                let offset = (y as usize * blocks_per_row as usize + bx as usize) * 8;
                let block = read_block(src, offset);
                self.convert_block(&block, Layout::Planar, out, bx * 4, y);
            }
        }
    }

    pub fn decode_twiddled(&self, src: &[u8], out: &mut PixelBuffer) {
        if self.fill_unsupported(out) {
            return;
        }
        let shape = self.format.block_shape(Layout::Twiddled);
        let (wl, hl) = (log2(out.width()), log2(out.height()));
        for y in (0..out.height()).step_by(shape.height as usize) {
            for x in (0..out.width()).step_by(shape.width as usize) {
                let offset = (twiddle_index(x, y, wl, hl) / shape.pixels()) as usize * 8;
                let block = read_block(src, offset);
                self.convert_block(&block, Layout::Twiddled, out, x, y);
            }
        }
    }

    /// Twiddled VQ: one index byte per block, each selecting an 8-byte codebook entry.
    pub fn decode_vq(&self, codebook: &[u8], indices: &[u8], out: &mut PixelBuffer) {
        if self.fill_unsupported(out) {
            return;
        }
        let shape = self.format.block_shape(Layout::Twiddled);
        let (wl, hl) = (log2(out.width()), log2(out.height()));
        for y in (0..out.height()).step_by(shape.height as usize) {
            for x in (0..out.width()).step_by(shape.width as usize) {
                let slot = (twiddle_index(x, y, wl, hl) / shape.pixels()) as usize;
                let index = indices.get(slot).copied().unwrap_or(0);
                let block = read_block(codebook, index as usize * 8);
                self.convert_block(&block, Layout::Twiddled, out, x, y);
            }
        }
    }

    /// Planar VQ: index bytes in row-major block order.
    pub fn decode_planar_vq(&self, codebook: &[u8], indices: &[u8], stride: u32, out: &mut PixelBuffer) {
        if self.fill_unsupported(out) {
            return;
        }
        if self.format.is_paletted() {
            self.decode_vq(codebook, indices, out);
            return;
        }
        let stride = if stride == 0 { out.width() } else { stride };
        let blocks_per_row = stride / 4;
        let visible = blocks_per_row.min(out.width().div_ceil(4));
        for y in 0..out.height() {
            for bx in 0..visible {
                let slot = y as usize * blocks_per_row as usize + bx as usize;
                let index = indices.get(slot).copied().unwrap_or(0);
                let block = read_block(codebook, index as usize * 8);
                self.convert_block(&block, Layout::Planar, out, bx * 4, y);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::twiddle::twiddle_slow;
    use pretty_assertions::assert_eq;

    fn rgba(pixel: u32) -> [u8; 4] {
        pixel.to_le_bytes()
    }

    #[test]
    fn planar_565_reads_rows_with_stride() {
        // 4x2 texture stored with an 8-texel stride; the second half of each row is padding.
        let mut src = Vec::new();
        for row in 0..2u16 {
            for col in 0..8u16 {
                let word: u16 = if col < 4 { 0xf800 >> (row * 11) } else { 0xffff };
                src.extend_from_slice(&word.to_le_bytes());
            }
        }
        let dec = TexelDecoder::new(TexelFormat::Rgb565, ChannelOrder::Rgba);
        let mut out = PixelBuffer::new(4, 2);
        dec.decode_planar(&src, 8, &mut out);
        assert!(out.row(0).iter().all(|&p| rgba(p) == [0xff, 0, 0, 0xff]));
        assert!(out.row(1).iter().all(|&p| rgba(p) == [0, 0, 0xff, 0xff]));
    }

    #[test]
    fn twiddled_1555_places_block_texels_column_major() {
        // Texel n of the twiddled stream carries blue = n.
        let (w, h) = (8u32, 8u32);
        let src: Vec<u8> = (0..w * h)
            .flat_map(|n| (0x8000u16 | n as u16).to_le_bytes())
            .collect();
        let dec = TexelDecoder::new(TexelFormat::Argb1555, ChannelOrder::Rgba);
        let mut out = PixelBuffer::new(w, h);
        dec.decode_twiddled(&src, &mut out);
        for y in 0..h {
            for x in 0..w {
                let n = twiddle_slow(x, y, w, h) as u8;
                let expected = crate::color::expand5(n & 0x1f);
                assert_eq!(rgba(out.get(x, y).unwrap())[2], expected, "({x},{y})");
            }
        }
    }

    #[test]
    fn pal4_resolves_nibbles_through_palette() {
        let palette: Vec<u32> = (0..16).map(|i| 0x100 + i).collect();
        // 8x8 texture: four 4x4 blocks, each byte = two texels (low nibble first).
        let src: Vec<u8> = (0..32u8).map(|i| (i & 0xf) | ((15 - (i & 0xf)) << 4)).collect();
        let dec = TexelDecoder::new(TexelFormat::Pal4, ChannelOrder::Rgba).with_palette(&palette);
        let mut out = PixelBuffer::new(8, 8);
        dec.decode_twiddled(&src, &mut out);
        // Block 0, byte 0: (0,0) low nibble 0, (0,1) high nibble 15.
        assert_eq!(out.get(0, 0), Some(0x100));
        assert_eq!(out.get(0, 1), Some(0x10f));
        // Byte 4 of block 0 covers (2,0)/(2,1).
        assert_eq!(out.get(2, 0), Some(0x104));
        assert_eq!(out.get(2, 1), Some(0x10b));
    }

    #[test]
    fn pal8_out_of_range_index_reads_zero() {
        let palette = vec![0xdead_beefu32; 4];
        let src = [0u8, 1, 2, 3, 200, 200, 200, 200];
        let dec = TexelDecoder::new(TexelFormat::Pal8, ChannelOrder::Rgba).with_palette(&palette);
        let mut out = PixelBuffer::new(2, 4);
        dec.decode_twiddled(&src, &mut out);
        assert_eq!(out.get(1, 1), Some(0xdead_beef));
        assert_eq!(out.get(0, 2), Some(0));
    }

    #[test]
    fn vq_expands_codebook_entries() {
        let mut codebook = vec![0u8; VQ_CODEBOOK_SIZE as usize];
        // Entry 5: solid red 565.
        for i in 0..4 {
            codebook[5 * 8 + i * 2..5 * 8 + i * 2 + 2].copy_from_slice(&0xf800u16.to_le_bytes());
        }
        let indices = [5u8, 0, 0, 5];
        let dec = TexelDecoder::new(TexelFormat::Rgb565, ChannelOrder::Bgra);
        let mut out = PixelBuffer::new(4, 4);
        dec.decode_vq(&codebook, &indices, &mut out);
        // BGRA packing puts red in the third byte.
        assert_eq!(rgba(out.get(0, 0).unwrap()), [0, 0, 0xff, 0xff]);
        assert_eq!(rgba(out.get(3, 3).unwrap()), [0, 0, 0xff, 0xff]);
        assert_eq!(rgba(out.get(2, 0).unwrap()), [0, 0, 0, 0xff]);
    }

    #[test]
    fn planar_yuv_shares_chroma_per_pair() {
        // U=0x80, Y0=0x10, V=0x80, Y1=0xf0.
        let word = 0xf080_1080u32;
        let mut src = Vec::new();
        src.extend_from_slice(&word.to_le_bytes());
        src.extend_from_slice(&word.to_le_bytes());
        let dec = TexelDecoder::new(TexelFormat::Yuv422, ChannelOrder::Rgba);
        let mut out = PixelBuffer::new(4, 1);
        dec.decode_planar(&src, 0, &mut out);
        assert_eq!(rgba(out.get(0, 0).unwrap()), [0x10, 0x10, 0x10, 0xff]);
        assert_eq!(rgba(out.get(1, 0).unwrap()), [0xf0, 0xf0, 0xf0, 0xff]);
        assert_eq!(rgba(out.get(2, 0).unwrap()), [0x10, 0x10, 0x10, 0xff]);
    }

    #[test]
    fn reserved_format_fills_diagnostic_color() {
        let dec = TexelDecoder::new(TexelFormat::Reserved, ChannelOrder::Rgba);
        let mut out = PixelBuffer::new(8, 8);
        dec.decode_twiddled(&[0u8; 128], &mut out);
        assert!(out.pixels().iter().all(|&p| p == DIAGNOSTIC_PIXEL));
    }

    #[test]
    fn short_source_decodes_missing_blocks_as_zero() {
        let dec = TexelDecoder::new(TexelFormat::Argb4444, ChannelOrder::Rgba);
        let mut out = PixelBuffer::filled(8, 8, 0xffff_ffff);
        dec.decode_twiddled(&[0xff; 8], &mut out);
        assert_eq!(out.get(0, 0), Some(0xffff_ffff));
        assert_eq!(out.get(7, 7), Some(0));
    }
}
