use pvr_texconv::{ChannelOrder, TexelFormat};

/// Source encoding of an uploaded texture, for backends that pick a host format from it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureType {
    Rgba5551,
    Rgb565,
    Rgba4444,
    Rgba8888,
}

impl TextureType {
    /// Host texture type for a decoded texel format. Paletted, YUV and reserved formats all
    /// decode to full 8-bit channels.
    pub fn for_format(format: TexelFormat) -> Self {
        match format {
            TexelFormat::Argb1555 => TextureType::Rgba5551,
            TexelFormat::Rgb565 => TextureType::Rgb565,
            TexelFormat::Argb4444 | TexelFormat::BumpMap => TextureType::Rgba4444,
            _ => TextureType::Rgba8888,
        }
    }
}

/// One texture upload. `pixels` holds `mip_levels` levels smallest first when mipmapped,
/// otherwise a single `width` x `height` level.
#[derive(Debug)]
pub struct TextureUpload<'a> {
    pub pixels: &'a [u32],
    pub width: u32,
    pub height: u32,
    pub order: ChannelOrder,
    pub source_type: TextureType,
    pub mip_levels: u32,
}

/// Renderer side of the cache: owns GPU objects behind opaque handles.
pub trait TextureBackend {
    type Handle;

    fn upload_texture(&mut self, upload: &TextureUpload<'_>) -> Self::Handle;

    fn delete_texture(&mut self, handle: Self::Handle);
}
