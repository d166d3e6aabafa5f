use pvr_texconv::ChannelOrder;

use crate::format::{FramebufferFormat, PackParams};

/// Inclusive pixel rectangle; encodes skip pixels outside it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClipRect {
    pub x_min: u32,
    pub x_max: u32,
    pub y_min: u32,
    pub y_max: u32,
}

impl ClipRect {
    /// Covers a whole `width` x `height` surface.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x_min: 0,
            x_max: width.saturating_sub(1),
            y_min: 0,
            y_max: height.saturating_sub(1),
        }
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        (self.x_min..=self.x_max).contains(&x) && (self.y_min..=self.y_max).contains(&y)
    }
}

/// Two interlaced fields: output row `2y` comes from the first field's row `y`, row `2y + 1` from
/// the second's, both advancing by the descriptor's line stride.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interlace {
    pub second_field: u32,
}

/// Parameters of one framebuffer transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FramebufferDescriptor {
    pub format: FramebufferFormat,
    pub width: u32,
    pub height: u32,
    /// VRAM byte address of the first row (of the first field when interlaced).
    pub address: u32,
    /// Bytes from one row start to the next; 0 means packed rows.
    pub line_stride: u32,
    pub clip: ClipRect,
    /// Ordered dither on encode, 16-bit formats only.
    pub dither: bool,
    /// Buffer colors are premultiplied by alpha.
    pub premultiplied: bool,
    pub pack: PackParams,
    /// Low bits fed to 555/565 channels on decode instead of bit replication.
    pub concat: Option<u8>,
    /// Byte order of the linear pixel buffer.
    pub order: ChannelOrder,
    pub interlace: Option<Interlace>,
}

impl FramebufferDescriptor {
    pub fn new(format: FramebufferFormat, width: u32, height: u32, address: u32) -> Self {
        Self {
            format,
            width,
            height,
            address,
            line_stride: 0,
            clip: ClipRect::full(width, height),
            dither: false,
            premultiplied: false,
            pack: PackParams::default(),
            concat: None,
            order: ChannelOrder::Rgba,
            interlace: None,
        }
    }

    /// Bytes of visible pixels in one row.
    pub fn row_bytes(&self) -> u32 {
        self.width * self.format.bytes_per_pixel()
    }

    /// Effective line stride in bytes.
    pub fn stride(&self) -> u32 {
        if self.line_stride == 0 {
            self.row_bytes()
        } else {
            self.line_stride
        }
    }

    /// VRAM address of output row `y`.
    pub fn row_address(&self, y: u32) -> u32 {
        match self.interlace {
            Some(Interlace { second_field }) => {
                let field = if y % 2 == 0 { self.address } else { second_field };
                field.wrapping_add((y / 2) * self.stride())
            }
            None => self.address.wrapping_add(y * self.stride()),
        }
    }

    /// The progressive equivalent of an interlaced descriptor whose second field starts half a
    /// stride after the first, if there is one.
    pub fn deinterlaced(&self) -> Option<Self> {
        let Interlace { second_field } = self.interlace?;
        let stride = self.stride();
        let gap = second_field.checked_sub(self.address)?;
        if gap == 0 || stride != gap * 2 || gap < self.row_bytes() {
            return None;
        }
        Some(Self {
            line_stride: gap,
            interlace: None,
            ..*self
        })
    }
}
