//! Typed views of the framebuffer registers and the descriptors they imply.

use crate::descriptor::{ClipRect, FramebufferDescriptor, Interlace};
use crate::error::Result;
use crate::format::{FramebufferFormat, PackParams};

/// `FB_R_CTRL`: display read control.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FbReadCtrl(pub u32);

impl FbReadCtrl {
    pub const fn enabled(self) -> bool {
        self.0 & 1 != 0
    }

    pub const fn depth(self) -> u32 {
        (self.0 >> 2) & 3
    }

    pub const fn concat(self) -> u8 {
        ((self.0 >> 4) & 7) as u8
    }

    pub const fn format(self) -> FramebufferFormat {
        FramebufferFormat::from_display_depth(self.depth())
    }
}

/// `FB_R_SIZE`: display size, all fields in 32-bit words or lines, minus one where noted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FbReadSize(pub u32);

impl FbReadSize {
    /// Words per line, minus one.
    pub const fn x_size(self) -> u32 {
        self.0 & 0x3ff
    }

    /// Lines, minus one.
    pub const fn y_size(self) -> u32 {
        (self.0 >> 10) & 0x3ff
    }

    /// Words skipped between lines, plus one.
    pub const fn modulus(self) -> u32 {
        (self.0 >> 20) & 0x3ff
    }
}

/// `FB_W_CTRL`: render write control.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FbWriteCtrl(pub u32);

impl FbWriteCtrl {
    pub const fn pack_mode(self) -> u32 {
        self.0 & 7
    }

    pub const fn dither(self) -> bool {
        self.0 & 8 != 0
    }

    pub const fn kval(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn alpha_threshold(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn format(self) -> Result<FramebufferFormat> {
        FramebufferFormat::from_pack_mode(self.pack_mode())
    }

    pub const fn pack_params(self) -> PackParams {
        PackParams {
            kval: self.kval(),
            alpha_threshold: self.alpha_threshold(),
        }
    }
}

/// `FB_X_CLIP` / `FB_Y_CLIP`: inclusive min in bits 0..=10, max in bits 16..=26.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FbClip(pub u32);

impl FbClip {
    pub const fn min(self) -> u32 {
        self.0 & 0x7ff
    }

    pub const fn max(self) -> u32 {
        (self.0 >> 16) & 0x7ff
    }
}

/// Descriptor for reading the displayed frame. With `second_field` the frame is interlaced and
/// twice as tall as one field.
pub fn display_descriptor(
    ctrl: FbReadCtrl,
    size: FbReadSize,
    first_field: u32,
    second_field: Option<u32>,
) -> FramebufferDescriptor {
    let format = ctrl.format();
    let bpp = format.bytes_per_pixel();
    let line_bytes = (size.x_size() + 1) * 4;
    let skip_bytes = size.modulus().saturating_sub(1) * 4;
    let lines = size.y_size() + 1;
    let height = if second_field.is_some() { lines * 2 } else { lines };
    let mut desc = FramebufferDescriptor::new(format, line_bytes / bpp, height, first_field);
    desc.line_stride = line_bytes + skip_bytes;
    desc.concat = Some(ctrl.concat());
    desc.interlace = second_field.map(|second_field| Interlace { second_field });
    desc
}

/// Descriptor for writing a `width` x `height` render to `address`. `line_stride` is
/// `FB_W_LINESTRIDE` in 64-bit units.
pub fn render_descriptor(
    ctrl: FbWriteCtrl,
    address: u32,
    line_stride: u32,
    x_clip: FbClip,
    y_clip: FbClip,
    width: u32,
    height: u32,
) -> Result<FramebufferDescriptor> {
    let mut desc = FramebufferDescriptor::new(ctrl.format()?, width, height, address);
    desc.line_stride = (line_stride & 0x1ff) * 8;
    desc.clip = ClipRect {
        x_min: x_clip.min(),
        x_max: x_clip.max(),
        y_min: y_clip.min(),
        y_max: y_clip.max(),
    };
    desc.dither = ctrl.dither();
    desc.pack = ctrl.pack_params();
    Ok(desc)
}
