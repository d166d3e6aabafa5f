#![allow(dead_code)]

use pvr::texcache::{FrameState, PaletteRam, TextureBackend, TextureUpload};
use pvr::vram::Vram;

/// Installs a test-writer subscriber once so `RUST_LOG`-style output shows up with `--nocapture`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Backend that hands out sequential handles and keeps every uploaded level.
#[derive(Default)]
pub struct RecordingBackend {
    next: u32,
    pub uploads: Vec<(u32, u32, Vec<u32>)>,
    pub deleted: Vec<u32>,
}

impl RecordingBackend {
    pub fn upload_count(&self) -> usize {
        self.uploads.len()
    }

    pub fn last_pixels(&self) -> &[u32] {
        self.uploads.last().map_or(&[], |(_, _, p)| p.as_slice())
    }
}

impl TextureBackend for RecordingBackend {
    type Handle = u32;

    fn upload_texture(&mut self, upload: &TextureUpload<'_>) -> u32 {
        self.next += 1;
        self.uploads
            .push((upload.width, upload.height, upload.pixels.to_vec()));
        self.next
    }

    fn delete_texture(&mut self, handle: u32) {
        self.deleted.push(handle);
    }
}

pub fn frame<'a>(vram: &'a Vram, palette: &'a PaletteRam) -> FrameState<'a> {
    FrameState {
        vram,
        palette,
        text_control: 0,
    }
}
