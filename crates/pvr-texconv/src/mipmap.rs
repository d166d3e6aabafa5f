//! Mip chain layout of twiddled textures.
//!
//! Levels are stored smallest first. Each level starts at a fixed offset from the texture base:
//! uncompressed chains are measured in texels (scaled by bits per pixel), VQ chains in index
//! bytes after the codebook.

use crate::buffer::PixelBuffer;
use crate::decode::{TexelDecoder, VQ_CODEBOOK_SIZE};
use crate::format::{Layout, TexelFormat};

/// Start of each VQ mip level, in index bytes after the codebook.
pub const VQ_MIP_POINT: [u32; 11] = [
    0x00000, 0x00001, 0x00002, 0x00006, 0x00016, 0x00056, 0x00156, 0x00556, 0x01556, 0x05556,
    0x15556,
];

/// Start of each uncompressed mip level, in texels.
pub const OTHER_MIP_POINT: [u32; 11] = [
    0x00003, 0x00004, 0x00008, 0x00018, 0x00058, 0x00158, 0x00558, 0x01558, 0x05558, 0x15558,
    0x55558,
];

/// Byte offset of mip level `level` (edge `1 << level`) from the texture base address.
pub fn level_offset(format: TexelFormat, compressed: bool, level: u32) -> u32 {
    let level = (level as usize).min(VQ_MIP_POINT.len() - 1);
    if compressed {
        VQ_CODEBOOK_SIZE + VQ_MIP_POINT[level]
    } else {
        OTHER_MIP_POINT[level] * format.bits_per_pixel() / 8
    }
}

/// Bytes spanned by a full chain whose largest level has edge `1 << size_log2`.
pub fn chain_size(format: TexelFormat, compressed: bool, size_log2: u32) -> u32 {
    let edge = 1u32 << size_log2;
    let texels = edge * edge;
    if compressed {
        let per_index = format.block_shape(Layout::Twiddled).pixels();
        level_offset(format, true, size_log2) + texels / per_index
    } else {
        level_offset(format, false, size_log2) + texels * format.bits_per_pixel() / 8
    }
}

/// Decodes every level of a twiddled chain. `src` starts at the texture base (the codebook
/// for VQ textures). Returned levels are ordered smallest first.
///
/// Level 0 of a VQ chain is a single index whose 2x2 block is decoded and sampled at (1, 1).
pub fn decode_chain(
    decoder: &TexelDecoder<'_>,
    src: &[u8],
    size_log2: u32,
    compressed: bool,
) -> Vec<PixelBuffer> {
    let codebook = &src[..src.len().min(VQ_CODEBOOK_SIZE as usize)];
    (0..=size_log2)
        .map(|level| {
            let edge = 1u32 << level;
            let offset = level_offset(decoder.format(), compressed, level) as usize;
            let data = src.get(offset..).unwrap_or(&[]);
            let mut out = PixelBuffer::new(edge, edge);
            if !compressed {
                decoder.decode_twiddled(data, &mut out);
            } else if level == 0 {
                let mut quad = PixelBuffer::new(2, 2);
                decoder.decode_vq(codebook, data, &mut quad);
                out.put(0, 0, quad.get(1, 1).unwrap_or(0));
            } else {
                decoder.decode_vq(codebook, data, &mut out);
            }
            out
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ChannelOrder;

    #[test]
    fn mip_points_follow_level_sizes() {
        for level in 0..10 {
            let texels = 1u32 << (2 * level);
            assert_eq!(OTHER_MIP_POINT[level + 1] - OTHER_MIP_POINT[level], texels);
            // One index per 2x2 block, with the 1x1 level still taking a whole index.
            let indices = (texels / 4).max(1);
            assert_eq!(VQ_MIP_POINT[level + 1] - VQ_MIP_POINT[level], indices);
        }
    }

    #[test]
    fn chain_sizes() {
        // 8x8 1555: levels end at (0x18 + 64) texels.
        assert_eq!(chain_size(TexelFormat::Argb1555, false, 3), (0x18 + 64) * 2);
        assert_eq!(chain_size(TexelFormat::Rgb565, true, 3), 2048 + 6 + 16);
        assert_eq!(level_offset(TexelFormat::Pal4, false, 0), 1);
    }

    #[test]
    fn vq_level0_samples_bottom_right_of_quad() {
        let mut src = vec![0u8; chain_size(TexelFormat::Rgb565, true, 1) as usize];
        // Codebook entry 1: texels (0,0), (0,1), (1,0), (1,1) = 0x0001..0x0004.
        for (i, word) in [0x0001u16, 0x0002, 0x0003, 0x07e0].iter().enumerate() {
            src[8 + i * 2..8 + i * 2 + 2].copy_from_slice(&word.to_le_bytes());
        }
        src[VQ_CODEBOOK_SIZE as usize] = 1;
        let dec = TexelDecoder::new(TexelFormat::Rgb565, ChannelOrder::Rgba);
        let levels = decode_chain(&dec, &src, 1, true);
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].width(), 1);
        assert_eq!(levels[0].get(0, 0).unwrap().to_le_bytes(), [0, 0xff, 0, 0xff]);
        assert_eq!(levels[1].width(), 2);
    }

    #[test]
    fn uncompressed_level0_skips_leading_padding() {
        let mut src = vec![0u8; chain_size(TexelFormat::Argb1555, false, 1) as usize];
        src[6..8].copy_from_slice(&0xfc00u16.to_le_bytes());
        let dec = TexelDecoder::new(TexelFormat::Argb1555, ChannelOrder::Rgba);
        let levels = decode_chain(&dec, &src, 1, false);
        assert_eq!(levels[0].get(0, 0).unwrap().to_le_bytes(), [0xff, 0, 0, 0xff]);
    }
}
