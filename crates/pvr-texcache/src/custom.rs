//! Replacement ("custom") textures and texture dumping.
//!
//! Loads run on a single background worker so a slow disk never stalls the render thread. An
//! entry asks for its hash once per decode and picks the image up on a later frame through its
//! [`CustomSlot`]. Failures are logged and otherwise ignored: the decoded texture stays in use.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use hashbrown::{HashMap, HashSet};
use image::{ImageFormat, RgbaImage};
use pvr_texconv::ChannelOrder;
use tracing::{debug, warn};

use crate::error::CustomTextureError;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poison| poison.into_inner())
}

/// An RGBA8 image, row-major, 4 bytes per pixel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl CustomImage {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, CustomTextureError> {
        if width == 0 || height == 0 || rgba.len() != width as usize * height as usize * 4 {
            return Err(CustomTextureError::BadDimensions { width, height });
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    /// Packs decoded pixels (in `order`) back into RGBA8 bytes.
    pub fn from_pixels(width: u32, height: u32, pixels: &[u32], order: ChannelOrder) -> Self {
        let rgba = pixels.iter().flat_map(|&p| order.unpack(p)).collect();
        Self {
            width,
            height,
            rgba,
        }
    }

    pub fn to_pixels(&self, order: ChannelOrder) -> Vec<u32> {
        self.rgba
            .chunks_exact(4)
            .map(|c| order.pack([c[0], c[1], c[2], c[3]]))
            .collect()
    }
}

/// Looks up replacement images by texture hash.
pub trait CustomTextureSource: Send + Sync {
    fn load(&self, hash: u32) -> Result<Option<CustomImage>, CustomTextureError>;
}

/// Persists freshly decoded textures under their hash.
pub trait TextureDumper: Send + Sync {
    fn dump(&self, hash: u32, image: &CustomImage) -> Result<(), CustomTextureError>;
}

/// Texture pack directory: files named `<hash in hex>.png` (or `.jpg`).
#[derive(Debug)]
pub struct DirectoryTextureSource {
    files: HashMap<u32, PathBuf>,
}

impl DirectoryTextureSource {
    /// Indexes `dir`. Files whose stem is not a hex hash are ignored.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CustomTextureError> {
        let dir = dir.as_ref();
        let io_err = |source| CustomTextureError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut files = HashMap::new();
        for item in std::fs::read_dir(dir).map_err(io_err)? {
            let path = item.map_err(io_err)?.path();
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase);
            if !matches!(ext.as_deref(), Some("png" | "jpg" | "jpeg")) {
                continue;
            }
            let Some(hash) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| u32::from_str_radix(s, 16).ok())
            else {
                continue;
            };
            files.insert(hash, path);
        }
        debug!(dir = %dir.display(), count = files.len(), "indexed custom textures");
        Ok(Self { files })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn contains(&self, hash: u32) -> bool {
        self.files.contains_key(&hash)
    }
}

impl CustomTextureSource for DirectoryTextureSource {
    fn load(&self, hash: u32) -> Result<Option<CustomImage>, CustomTextureError> {
        let Some(path) = self.files.get(&hash) else {
            return Ok(None);
        };
        let decoded = image::open(path).map_err(|source| CustomTextureError::Image {
            path: path.clone(),
            source,
        })?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        CustomImage::new(width, height, rgba.into_raw()).map(Some)
    }
}

/// Writes dumps as `<dir>/<hash in hex>.png`.
#[derive(Debug, Clone)]
pub struct DirectoryTextureDumper {
    dir: PathBuf,
}

impl DirectoryTextureDumper {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CustomTextureError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| CustomTextureError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, hash: u32) -> PathBuf {
        self.dir.join(format!("{hash:x}.png"))
    }
}

impl TextureDumper for DirectoryTextureDumper {
    fn dump(&self, hash: u32, image: &CustomImage) -> Result<(), CustomTextureError> {
        let path = self.path_for(hash);
        let buf = RgbaImage::from_raw(image.width, image.height, image.rgba.clone()).ok_or(
            CustomTextureError::BadDimensions {
                width: image.width,
                height: image.height,
            },
        )?;
        buf.save_with_format(&path, ImageFormat::Png)
            .map_err(|source| CustomTextureError::Image { path, source })
    }
}

/// Per-entry mailbox for asynchronously loaded images.
#[derive(Debug, Default)]
pub struct CustomSlot {
    in_flight: AtomicU32,
    discarded: AtomicBool,
    ready: Mutex<Option<CustomImage>>,
}

impl CustomSlot {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// True while a load request has not been serviced.
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) != 0
    }

    pub fn has_ready(&self) -> bool {
        lock(&self.ready).is_some()
    }

    /// Takes the loaded image, if any. Each image is handed out once.
    pub fn take_ready(&self) -> Option<CustomImage> {
        lock(&self.ready).take()
    }

    /// Drops any pending image and makes later results go nowhere.
    pub fn discard(&self) {
        self.discarded.store(true, Ordering::Release);
        lock(&self.ready).take();
    }

    pub fn is_discarded(&self) -> bool {
        self.discarded.load(Ordering::Acquire)
    }

    fn deliver(&self, image: CustomImage) {
        let mut ready = lock(&self.ready);
        if !self.is_discarded() {
            *ready = Some(image);
        }
    }
}

enum Job {
    Load { hash: u32, slot: Arc<CustomSlot> },
    Dump { hash: u32, image: CustomImage },
    Flush(Sender<()>),
}

/// Background loader and dumper shared by every entry of a cache.
pub struct CustomTextures {
    sender: Mutex<Option<Sender<Job>>>,
    worker: Option<JoinHandle<()>>,
    dumped: Mutex<HashSet<u32>>,
    loads_enabled: bool,
    dumps_enabled: bool,
}

impl std::fmt::Debug for CustomTextures {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomTextures")
            .field("loads_enabled", &self.loads_enabled)
            .field("dumps_enabled", &self.dumps_enabled)
            .finish_non_exhaustive()
    }
}

impl CustomTextures {
    pub fn new(
        source: Option<Arc<dyn CustomTextureSource>>,
        dumper: Option<Arc<dyn TextureDumper>>,
    ) -> Result<Self, CustomTextureError> {
        let loads_enabled = source.is_some();
        let dumps_enabled = dumper.is_some();
        let (tx, rx) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("pvr-custom-textures".into())
            .spawn(move || run_worker(rx, source, dumper))
            .map_err(|source| CustomTextureError::Io {
                path: PathBuf::new(),
                source,
            })?;
        Ok(Self {
            sender: Mutex::new(Some(tx)),
            worker: Some(worker),
            dumped: Mutex::new(HashSet::new()),
            loads_enabled,
            dumps_enabled,
        })
    }

    pub fn loads_enabled(&self) -> bool {
        self.loads_enabled
    }

    pub fn dumps_enabled(&self) -> bool {
        self.dumps_enabled
    }

    fn send(&self, job: Job) -> bool {
        match lock(&self.sender).as_ref() {
            Some(tx) => tx.send(job).is_ok(),
            None => false,
        }
    }

    /// Queues a lookup of `hash`; the result lands in `slot`.
    pub fn request_load(&self, hash: u32, slot: &Arc<CustomSlot>) -> bool {
        if !self.loads_enabled || slot.is_discarded() {
            return false;
        }
        slot.in_flight.fetch_add(1, Ordering::AcqRel);
        let queued = self.send(Job::Load {
            hash,
            slot: Arc::clone(slot),
        });
        if !queued {
            slot.in_flight.fetch_sub(1, Ordering::AcqRel);
        }
        queued
    }

    /// Queues a dump of `image` unless this hash was already dumped.
    pub fn request_dump(&self, hash: u32, image: CustomImage) -> bool {
        if !self.dumps_enabled || !lock(&self.dumped).insert(hash) {
            return false;
        }
        self.send(Job::Dump { hash, image })
    }

    /// Blocks until every job queued so far has been serviced.
    pub fn flush(&self) {
        let (tx, rx) = mpsc::channel();
        if self.send(Job::Flush(tx)) {
            let _ = rx.recv();
        }
    }
}

impl Drop for CustomTextures {
    fn drop(&mut self) {
        lock(&self.sender).take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("custom texture worker panicked");
            }
        }
    }
}

fn run_worker(
    jobs: Receiver<Job>,
    source: Option<Arc<dyn CustomTextureSource>>,
    dumper: Option<Arc<dyn TextureDumper>>,
) {
    for job in jobs {
        match job {
            Job::Load { hash, slot } => {
                if !slot.is_discarded() {
                    if let Some(source) = &source {
                        match source.load(hash) {
                            Ok(Some(image)) => {
                                debug!(hash = format_args!("{hash:08x}"), "custom texture loaded");
                                slot.deliver(image);
                            }
                            Ok(None) => {}
                            Err(err) => warn!(hash = format_args!("{hash:08x}"), %err, "custom texture load failed"),
                        }
                    }
                }
                slot.in_flight.fetch_sub(1, Ordering::AcqRel);
            }
            Job::Dump { hash, image } => {
                if let Some(dumper) = &dumper {
                    if let Err(err) = dumper.dump(hash, &image) {
                        warn!(hash = format_args!("{hash:08x}"), %err, "texture dump failed");
                    }
                }
            }
            Job::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}
