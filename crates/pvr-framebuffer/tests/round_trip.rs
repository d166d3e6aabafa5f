use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use pvr_framebuffer::{
    decode_framebuffer, encode_to_vram, FramebufferDescriptor, FramebufferFormat, Interlace,
};
use pvr_texconv::color::{expand4, expand5, expand6};
use pvr_texconv::{ChannelOrder, Rgba8};
use pvr_vram::{InvalidationTarget, Vram, VramRange};

/// Nearest color the format stores exactly.
fn representable(format: FramebufferFormat, [r, g, b, a]: Rgba8) -> Rgba8 {
    match format {
        FramebufferFormat::Krgb0555 => [expand5(r >> 3), expand5(g >> 3), expand5(b >> 3), 255],
        FramebufferFormat::Rgb565 => [expand5(r >> 3), expand6(g >> 2), expand5(b >> 3), 255],
        FramebufferFormat::Argb4444 => [expand4(r >> 4), expand4(g >> 4), expand4(b >> 4), expand4(a >> 4)],
        FramebufferFormat::Argb1555 => {
            let a = if a & 0x80 != 0 { 255 } else { 0 };
            [expand5(r >> 3), expand5(g >> 3), expand5(b >> 3), a]
        }
        FramebufferFormat::Rgb888 | FramebufferFormat::Krgb0888 => [r, g, b, 255],
        FramebufferFormat::Argb8888 => [r, g, b, a],
    }
}

fn surface() -> impl Strategy<Value = (FramebufferFormat, u32, u32, Vec<Rgba8>, bool)> {
    (0..7u32, 1..9u32, 1..9u32, any::<bool>()).prop_flat_map(|(mode, w, h, bgra)| {
        let format = FramebufferFormat::from_pack_mode(mode).unwrap();
        let pixels = prop::collection::vec(any::<[u8; 4]>(), (w * h) as usize);
        (Just(format), Just(w), Just(h), pixels, Just(bgra))
    })
}

proptest! {
    #[test]
    fn representable_colors_survive_encode_and_decode((format, w, h, colors, bgra) in surface()) {
        let mut vram = Vram::new(0x1_0000).unwrap();
        let mut desc = FramebufferDescriptor::new(format, w, h, 0x800);
        desc.line_stride = 64;
        desc.order = if bgra { ChannelOrder::Bgra } else { ChannelOrder::Rgba };
        let expected: Vec<u32> = colors
            .iter()
            .map(|&c| desc.order.pack(representable(format, c)))
            .collect();

        encode_to_vram(&mut vram, &expected, &desc).unwrap();
        let decoded = decode_framebuffer(&vram, &desc).unwrap();

        prop_assert_eq!(decoded.pixels(), expected.as_slice());
    }

    #[test]
    fn dither_never_moves_more_than_one_step(v in any::<u8>(), x in 0..4u32, y in 0..4u32) {
        let mut vram = Vram::new(0x1000).unwrap();
        let mut desc = FramebufferDescriptor::new(FramebufferFormat::Rgb565, 4, 4, 0);
        desc.dither = true;
        let pixels = vec![ChannelOrder::Rgba.pack([v, v, v, 255]); 16];
        encode_to_vram(&mut vram, &pixels, &desc).unwrap();

        let red = (vram.read_u16((y * 4 + x) * 2) >> 11) as i32;
        let exact = v as f32 * 31.0 / 255.0;
        prop_assert!((red as f32 - exact).abs() < 1.0);
    }
}

#[test]
fn separate_fields_interleave_rows() {
    let mut vram = Vram::new(0x1_0000).unwrap();
    let mut desc = FramebufferDescriptor::new(FramebufferFormat::Argb8888, 2, 4, 0x1000);
    desc.line_stride = 0x100;
    desc.interlace = Some(Interlace { second_field: 0x8000 });
    let pixels: Vec<u32> = (0..8u8)
        .map(|i| ChannelOrder::Rgba.pack([i, i, i, 255]))
        .collect();

    encode_to_vram(&mut vram, &pixels, &desc).unwrap();

    // Row 1 lands in the second field, row 2 on the first field's second line.
    assert_eq!(vram.read_u8(0x8000), 2);
    assert_eq!(vram.read_u8(0x1100), 4);
    assert_eq!(decode_framebuffer(&vram, &desc).unwrap().pixels(), pixels.as_slice());
}

#[derive(Default)]
struct WriteCounter(AtomicU32);

impl InvalidationTarget for WriteCounter {
    fn invalidate_from_write(&self, _offset: u32) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn render_write_invalidates_overlapping_registration() {
    let mut vram = Vram::new(0x1_0000).unwrap();
    let inside = Arc::new(WriteCounter::default());
    let outside = Arc::new(WriteCounter::default());
    let weak_inside: Weak<dyn InvalidationTarget> = Arc::downgrade(&inside) as _;
    let weak_outside: Weak<dyn InvalidationTarget> = Arc::downgrade(&outside) as _;
    vram.guard()
        .protect_range(VramRange::new(0x2000, 0x2200), weak_inside)
        .unwrap();
    vram.guard()
        .protect_range(VramRange::new(0x9000, 0x9200), weak_outside)
        .unwrap();

    let desc = FramebufferDescriptor::new(FramebufferFormat::Rgb565, 16, 16, 0x2000);
    encode_to_vram(&mut vram, &vec![0; 256], &desc).unwrap();

    assert_eq!(inside.0.load(Ordering::SeqCst), 1);
    assert_eq!(outside.0.load(Ordering::SeqCst), 0);
    assert_eq!(vram.guard().live_locks(), 1);
}
