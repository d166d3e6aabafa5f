mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use pvr::framebuffer::registers::{render_descriptor, FbClip, FbWriteCtrl};
use pvr::framebuffer::{decode_framebuffer, encode_to_vram, FramebufferDescriptor, FramebufferFormat};
use pvr::texcache::{PaletteRam, Tcw, TcwFlags, TextureCache, TextureCacheConfig, Tsp};
use pvr::texconv::{ChannelOrder, TexelFormat};
use pvr::vram::Vram;

use common::{frame, init_tracing, RecordingBackend};

fn gradient(width: u32, height: u32) -> Vec<u32> {
    (0..width * height)
        .map(|i| {
            let (x, y) = (i % width, i / width);
            ChannelOrder::Rgba.pack([(x * 16) as u8, (y * 16) as u8, 0x80, 0xff])
        })
        .collect()
}

#[test]
fn framebuffer_write_over_texture_is_picked_up() {
    init_tracing();
    let mut vram = Vram::new(0x1_0000).unwrap();
    let palette = PaletteRam::new();
    let mut cache: TextureCache<u32> =
        TextureCache::new(TextureCacheConfig::default(), Arc::clone(vram.guard()));
    let mut backend = RecordingBackend::default();
    let tsp = Tsp((1 << 3) | 1);
    let tcw = Tcw::builder()
        .address(0x4000)
        .format(TexelFormat::Rgb565)
        .flags(TcwFlags::SCAN_ORDER)
        .build();
    cache.get_texture(tsp, tcw, &frame(&vram, &palette), &mut backend);
    assert_eq!(backend.upload_count(), 1);

    let desc = FramebufferDescriptor::new(FramebufferFormat::Rgb565, 16, 16, 0x4000);
    encode_to_vram(&mut vram, &gradient(16, 16), &desc).unwrap();

    let handle = cache
        .get_texture(tsp, tcw, &frame(&vram, &palette), &mut backend)
        .copied();
    assert_eq!(handle, Some(2));
    let readback = decode_framebuffer(&vram, &desc).unwrap();
    assert_eq!(backend.last_pixels(), readback.pixels());
}

#[test]
fn render_target_stays_clean_until_cpu_writes() {
    let mut vram = Vram::new(0x1_0000).unwrap();
    let palette = PaletteRam::new();
    let mut cache: TextureCache<u32> =
        TextureCache::new(TextureCacheConfig::default(), Arc::clone(vram.guard()));
    let mut backend = RecordingBackend::default();

    // RGB565, 32x32 at 0x6000, stride 64 bytes (8 x 64-bit units).
    let ctrl = FbWriteCtrl(1);
    let clip_x = FbClip(31 << 16);
    let clip_y = FbClip(31 << 16);
    let desc = render_descriptor(ctrl, 0x6000, 8, clip_x, clip_y, 32, 32).unwrap();
    encode_to_vram(&mut vram, &gradient(32, 32), &desc).unwrap();
    let key = cache
        .register_render_target(0x6000, ctrl.pack_mode(), 32, 32, 100)
        .unwrap();
    assert!(!cache.peek(&key).unwrap().is_dirty());

    let tsp = Tsp::for_size(32, 32);
    let tcw = Tcw::builder()
        .address(0x6000)
        .format(TexelFormat::Rgb565)
        .flags(TcwFlags::SCAN_ORDER)
        .build();
    let handle = cache
        .get_texture(tsp, tcw, &frame(&vram, &palette), &mut backend)
        .copied();
    assert_eq!(handle, Some(100));
    assert_eq!(backend.upload_count(), 0);

    vram.write_u16(0x6000 + 10, 0);
    let handle = cache
        .get_texture(tsp, tcw, &frame(&vram, &palette), &mut backend)
        .copied();
    assert_eq!(handle, Some(1));
    assert_eq!(cache.flush_deletions(&mut backend), 1);
    assert_eq!(backend.deleted, vec![100]);
}

#[test]
fn render_targets_without_texture_format_are_refused() {
    let vram = Vram::new(0x1_0000).unwrap();
    let mut cache: TextureCache<u32> =
        TextureCache::new(TextureCacheConfig::default(), Arc::clone(vram.guard()));
    assert_eq!(cache.register_render_target(0x6000, 6, 32, 32, 7), Err(7));
    assert!(cache.is_empty());
}
