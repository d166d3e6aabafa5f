use pvr_texconv::{ChannelOrder, PixelBuffer, Rgba8};
use pvr_vram::Vram;
use tracing::trace;

use crate::descriptor::FramebufferDescriptor;
use crate::dither;
use crate::error::{FramebufferError, Result};
use crate::format::{FramebufferFormat, PackParams};

fn premultiply([r, g, b, a]: Rgba8) -> Rgba8 {
    let m = |c: u8| ((c as u32 * a as u32 + 127) / 255) as u8;
    [m(r), m(g), m(b), a]
}

fn unpremultiply([r, g, b, a]: Rgba8) -> Rgba8 {
    if a == 0 {
        return [r, g, b, a];
    }
    let d = |c: u8| ((c as u32 * 255 + a as u32 / 2) / a as u32).min(255) as u8;
    [d(r), d(g), d(b), a]
}

fn check_size(desc: &FramebufferDescriptor) -> Result<()> {
    if desc.width == 0 || desc.height == 0 {
        return Err(FramebufferError::Empty {
            width: desc.width,
            height: desc.height,
        });
    }
    Ok(())
}

/// Copies `out.len()` bytes starting at `addr`, wrapping at the end of VRAM.
fn read_row(vram: &Vram, addr: u32, out: &mut [u8]) {
    let start = (addr & vram.mask()) as usize;
    match vram.as_slice().get(start..start + out.len()) {
        Some(bytes) => out.copy_from_slice(bytes),
        None => {
            for (i, byte) in out.iter_mut().enumerate() {
                *byte = vram.read_u8(addr.wrapping_add(i as u32));
            }
        }
    }
}

fn decode_rows(vram: &Vram, desc: &FramebufferDescriptor) -> PixelBuffer {
    let bpp = desc.format.bytes_per_pixel() as usize;
    let unpremultiplied = desc.premultiplied && desc.format.stores_alpha();
    let mut out = PixelBuffer::new(desc.width, desc.height);
    let mut row = vec![0u8; desc.row_bytes() as usize];
    for y in 0..desc.height {
        read_row(vram, desc.row_address(y), &mut row);
        for (x, px) in row.chunks_exact(bpp).enumerate() {
            let mut rgba = desc.format.decode(px, desc.concat);
            if unpremultiplied {
                rgba = premultiply(rgba);
            }
            out.put(x as u32, y, desc.order.pack(rgba));
        }
    }
    out
}

/// Reads a framebuffer out of VRAM into linear pixels in `desc.order`.
///
/// Interlaced descriptors whose fields are half a stride apart are read as one progressive
/// surface; the result is the same as reading the fields row by row.
pub fn decode_framebuffer(vram: &Vram, desc: &FramebufferDescriptor) -> Result<PixelBuffer> {
    check_size(desc)?;
    match desc.deinterlaced() {
        Some(flat) => {
            trace!(address = desc.address, "reading interlaced fields as one surface");
            Ok(decode_rows(vram, &flat))
        }
        None => Ok(decode_rows(vram, desc)),
    }
}

/// Packs `pixels` (row-major, `desc.width` per row, in `desc.order`) into VRAM.
///
/// Only pixels inside the clip rectangle are written; VRAM outside it keeps its contents. Writes
/// go through [`Vram::write_bytes`], so cached textures over the written bytes are invalidated.
pub fn encode_to_vram(vram: &mut Vram, pixels: &[u32], desc: &FramebufferDescriptor) -> Result<()> {
    check_size(desc)?;
    let needed = desc.width as usize * desc.height as usize;
    if pixels.len() < needed {
        return Err(FramebufferError::PixelsTooShort {
            needed,
            got: pixels.len(),
        });
    }
    let x0 = desc.clip.x_min;
    let x1 = desc.clip.x_max.min(desc.width - 1);
    let y0 = desc.clip.y_min;
    let y1 = desc.clip.y_max.min(desc.height - 1);
    if x0 > x1 || y0 > y1 {
        return Ok(());
    }

    let bpp = desc.format.bytes_per_pixel();
    let dithered = desc.dither && desc.format.is_16bit();
    let unpremultiply_alpha = desc.premultiplied && desc.format.stores_alpha();
    let mut segment = vec![0u8; ((x1 - x0 + 1) * bpp) as usize];
    for y in y0..=y1 {
        let row = &pixels[(y * desc.width) as usize..][..desc.width as usize];
        for (x, out) in (x0..=x1).zip(segment.chunks_exact_mut(bpp as usize)) {
            let mut rgba = desc.order.unpack(row[x as usize]);
            if unpremultiply_alpha {
                rgba = unpremultiply(rgba);
            }
            let threshold = dithered.then(|| dither::threshold(x, y));
            desc.format.encode(rgba, &desc.pack, threshold, out);
        }
        vram.write_bytes(desc.row_address(y).wrapping_add(x0 * bpp), &segment);
    }
    Ok(())
}

/// Packs a `width` x `height` render into `dest` for use as a texture.
///
/// `line_stride` is in bytes, 0 meaning packed rows. Columns that do not fit in the stride are
/// dropped.
pub fn encode_to_texture(
    pixels: &[u32],
    width: u32,
    height: u32,
    dest: &mut [u8],
    pack_mode: u32,
    line_stride: u32,
    order: ChannelOrder,
) -> Result<()> {
    let format = FramebufferFormat::from_pack_mode(pack_mode)?;
    if width == 0 || height == 0 {
        return Err(FramebufferError::Empty { width, height });
    }
    let bpp = format.bytes_per_pixel();
    let stride = if line_stride == 0 { width * bpp } else { line_stride };
    let columns = width.min(stride / bpp);

    let needed = width as usize * height as usize;
    if pixels.len() < needed {
        return Err(FramebufferError::PixelsTooShort {
            needed,
            got: pixels.len(),
        });
    }
    let needed = ((height - 1) * stride + columns * bpp) as usize;
    if dest.len() < needed {
        return Err(FramebufferError::DestinationTooShort {
            needed,
            got: dest.len(),
        });
    }

    let params = PackParams::default();
    for y in 0..height {
        let src = &pixels[(y * width) as usize..][..columns as usize];
        let dst = &mut dest[(y * stride) as usize..][..(columns * bpp) as usize];
        for (&p, out) in src.iter().zip(dst.chunks_exact_mut(bpp as usize)) {
            format.encode(order.unpack(p), &params, None, out);
        }
    }
    Ok(())
}
