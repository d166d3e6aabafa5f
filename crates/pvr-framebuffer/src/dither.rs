/// 4x4 ordered-dither thresholds in sixteenths of an output step, row-major.
pub const DITHER_MATRIX: [u8; 16] = [15, 3, 12, 0, 7, 11, 4, 8, 13, 1, 14, 2, 5, 9, 6, 10];

#[inline]
pub fn threshold(x: u32, y: u32) -> u8 {
    DITHER_MATRIX[((y % 4) * 4 + x % 4) as usize]
}
