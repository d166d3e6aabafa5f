//! Twiddled (Morton-order) addressing.
//!
//! The PVR stores twiddled textures by interleaving the bits of the texel coordinates, starting
//! with the lowest `y` bit. When one dimension is larger than the other, its remaining high bits
//! are appended contiguously once the smaller dimension runs out.

use std::sync::OnceLock;

/// Largest texture edge (1024) has 10 coordinate bits; tables cover log2 sizes 0..=10.
const SIZES: usize = 11;
const TABLE_LEN: usize = 1024;

/// Interleaves `x` and `y` for a `x_size` by `y_size` texture (sizes are powers of two).
pub fn twiddle_slow(mut x: u32, mut y: u32, x_size: u32, y_size: u32) -> u32 {
    let mut out = 0;
    let mut shift = 0;
    let mut x_size = x_size >> 1;
    let mut y_size = y_size >> 1;
    while x_size != 0 || y_size != 0 {
        if y_size != 0 {
            out |= (y & 1) << shift;
            y_size >>= 1;
            y >>= 1;
            shift += 1;
        }
        if x_size != 0 {
            out |= (x & 1) << shift;
            x_size >>= 1;
            x >>= 1;
            shift += 1;
        }
    }
    out
}

struct DetwiddleTables {
    /// `[log2 height][x]`: contribution of the `x` coordinate.
    x: Vec<u32>,
    /// `[log2 width][y]`: contribution of the `y` coordinate.
    y: Vec<u32>,
}

fn tables() -> &'static DetwiddleTables {
    static TABLES: OnceLock<DetwiddleTables> = OnceLock::new();
    TABLES.get_or_init(|| {
        let mut x = vec![0u32; SIZES * TABLE_LEN];
        let mut y = vec![0u32; SIZES * TABLE_LEN];
        for s in 0..SIZES {
            let other = 1u32 << s;
            for i in 0..TABLE_LEN {
                x[s * TABLE_LEN + i] = twiddle_slow(i as u32, 0, TABLE_LEN as u32, other);
                y[s * TABLE_LEN + i] = twiddle_slow(0, i as u32, other, TABLE_LEN as u32);
            }
        }
        DetwiddleTables { x, y }
    })
}

/// Texel index of `(x, y)` inside a twiddled `width` by `height` texture.
///
/// `width_log2`/`height_log2` are the log2 of the texture edges.
#[inline]
pub fn twiddle_index(x: u32, y: u32, width_log2: u32, height_log2: u32) -> u32 {
    let (xi, yi) = (x as usize, y as usize);
    let (wl, hl) = (width_log2 as usize, height_log2 as usize);
    if xi < TABLE_LEN && yi < TABLE_LEN && wl < SIZES && hl < SIZES {
        let t = tables();
        t.x[hl * TABLE_LEN + xi] + t.y[wl * TABLE_LEN + yi]
    } else {
        twiddle_slow(x, y, 1 << width_log2, 1 << height_log2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_interleaves_y_first() {
        assert_eq!(twiddle_slow(0, 0, 8, 8), 0);
        assert_eq!(twiddle_slow(0, 1, 8, 8), 1);
        assert_eq!(twiddle_slow(1, 0, 8, 8), 2);
        assert_eq!(twiddle_slow(1, 1, 8, 8), 3);
        assert_eq!(twiddle_slow(2, 0, 8, 8), 8);
        assert_eq!(twiddle_slow(7, 7, 8, 8), 63);
    }

    #[test]
    fn wide_texture_appends_high_x_bits() {
        // 16x2: one interleaved pair, then x bits 1..=3 contiguously.
        assert_eq!(twiddle_slow(1, 1, 16, 2), 3);
        assert_eq!(twiddle_slow(2, 0, 16, 2), 4);
        assert_eq!(twiddle_slow(15, 1, 16, 2), 31);
    }

    #[test]
    fn tables_match_slow_path() {
        for (w, h) in [(8u32, 8u32), (64, 8), (8, 256), (1024, 1024), (32, 512)] {
            let (wl, hl) = (w.trailing_zeros(), h.trailing_zeros());
            for y in (0..h).step_by(3) {
                for x in (0..w).step_by(5) {
                    assert_eq!(twiddle_index(x, y, wl, hl), twiddle_slow(x, y, w, h));
                }
            }
        }
    }
}
