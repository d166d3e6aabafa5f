/// Row-major buffer of packed 32-bit output pixels.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, 0)
    }

    pub fn filled(width: u32, height: u32, pixel: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![pixel; width as usize * height as usize],
        }
    }

    /// Wraps existing pixels; returns `None` if the length does not match the dimensions.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<u32>) -> Option<Self> {
        (pixels.len() == width as usize * height as usize).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u32] {
        &mut self.pixels
    }

    pub fn into_pixels(self) -> Vec<u32> {
        self.pixels
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    pub fn row(&self, y: u32) -> &[u32] {
        let w = self.width as usize;
        let start = (y as usize * w).min(self.pixels.len());
        let end = (start + w).min(self.pixels.len());
        &self.pixels[start..end]
    }

    /// Stores one pixel; coordinates outside the buffer are dropped.
    ///
    /// Decoders write whole source blocks, which overhang the buffer for mip levels smaller
    /// than a block.
    #[inline]
    pub fn put(&mut self, x: u32, y: u32, pixel: u32) {
        if x < self.width && y < self.height {
            self.pixels[y as usize * self.width as usize + x as usize] = pixel;
        }
    }

    pub fn fill(&mut self, pixel: u32) {
        self.pixels.fill(pixel);
    }
}

/// Concatenates mip levels (smallest first) into one upload buffer.
pub fn flatten_levels(levels: &[PixelBuffer]) -> Vec<u32> {
    let total = levels.iter().map(|l| l.pixels.len()).sum();
    let mut out = Vec::with_capacity(total);
    for level in levels {
        out.extend_from_slice(&level.pixels);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_outside_bounds_is_ignored() {
        let mut buf = PixelBuffer::new(1, 1);
        buf.put(0, 0, 7);
        buf.put(1, 0, 9);
        buf.put(0, 1, 9);
        assert_eq!(buf.pixels(), &[7]);
    }

    #[test]
    fn flatten_keeps_level_order() {
        let a = PixelBuffer::filled(1, 1, 1);
        let b = PixelBuffer::filled(2, 2, 2);
        assert_eq!(flatten_levels(&[a, b]), vec![1, 2, 2, 2, 2]);
    }

    #[test]
    fn from_pixels_checks_length() {
        assert!(PixelBuffer::from_pixels(2, 2, vec![0; 3]).is_none());
        let buf = PixelBuffer::from_pixels(2, 1, vec![1, 2]).unwrap();
        assert_eq!(buf.as_bytes().len(), 8);
        assert_eq!(buf.row(0), &[1, 2]);
    }
}
