// ============================================
// AO Map - Запечённое затенение блока (необязательно)
// ============================================

use crate::terrain::block::BlockSource;
use crate::terrain::error::TerrainError;
use crate::terrain::gpu::{Texture, TextureFormat, TextureImage};

use super::image::{decode_map, encode_map, MapKind};

pub const AO_MAP_SECTION: &str = "aoMap";

pub const AO_MAP: MapKind = MapKind {
    magic: *b"ao2\0",
    version: 1,
    format: TextureFormat::R8,
    label: "terrain ao",
};

pub struct TerrainAoMap2 {
    texture: Texture,
}

impl TerrainAoMap2 {
    /// None если у блока нет AO
    pub fn load(source: &BlockSource) -> Result<Option<Self>, TerrainError> {
        let data = match source.open(AO_MAP_SECTION) {
            Some(data) => data,
            None => return Ok(None),
        };
        let image = decode_map(&AO_MAP, &data, &source.section(AO_MAP_SECTION))?;
        let texture = source.textures().create_texture(image)?;
        Ok(Some(Self { texture }))
    }

    pub fn encode(image: &TextureImage) -> Result<Vec<u8>, TerrainError> {
        encode_map(&AO_MAP, image)
    }

    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn texture_memory(&self) -> usize {
        self.texture.memory_used()
    }
}
