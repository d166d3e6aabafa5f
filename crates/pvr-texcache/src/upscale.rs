/// Integer-factor texture upscaler.
pub trait Upscaler: Send + Sync {
    /// Scales the `width` x `height` image in `src` into `dst`, which holds
    /// `width * factor` x `height * factor` pixels.
    fn scale(&self, factor: u32, src: &[u32], dst: &mut [u32], width: u32, height: u32, has_alpha: bool);
}

/// Nearest-neighbour pixel replication.
#[derive(Clone, Copy, Debug, Default)]
pub struct PixelReplicationUpscaler;

impl Upscaler for PixelReplicationUpscaler {
    fn scale(&self, factor: u32, src: &[u32], dst: &mut [u32], width: u32, height: u32, _has_alpha: bool) {
        let (w, f) = (width as usize, factor as usize);
        let out_w = w * f;
        for y in 0..height as usize {
            let row = &src[y * w..(y + 1) * w];
            for dy in 0..f {
                let base = (y * f + dy) * out_w;
                let Some(out) = dst.get_mut(base..base + out_w) else {
                    return;
                };
                for (x, &p) in row.iter().enumerate() {
                    out[x * f..(x + 1) * f].fill(p);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replicates_each_pixel() {
        let src = [1, 2, 3, 4];
        let mut dst = [0u32; 16];
        PixelReplicationUpscaler.scale(2, &src, &mut dst, 2, 2, false);
        assert_eq!(
            dst,
            [1, 1, 2, 2, 1, 1, 2, 2, 3, 3, 4, 4, 3, 3, 4, 4]
        );
    }
}
