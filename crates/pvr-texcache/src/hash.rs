use xxhash_rust::xxh32::xxh32;

/// Seed shared with existing texture packs; changing it renames every custom texture.
pub const HASH_SEED: u32 = 7;

/// Format bits of the texture control word folded into the content hash.
pub const TCW_FORMAT_MASK: u32 = 0xfc00_0000;

pub fn content_hash(bytes: &[u8]) -> u32 {
    xxh32(bytes, HASH_SEED)
}

/// Hash identifying a decoded texture: source bytes, palette contents, and format bits.
pub fn texture_hash(source: &[u8], palette_hash: Option<u32>, tcw: u32) -> u32 {
    content_hash(source) ^ palette_hash.unwrap_or(0) ^ (tcw & TCW_FORMAT_MASK)
}
