// ============================================
// LOD Texture - Запечённая текстура дальнего блока
// ============================================
// Рисуется вместо смесей слоёв, когда блок далеко.

use crate::terrain::block::BlockSource;
use crate::terrain::error::TerrainError;
use crate::terrain::gpu::{Texture, TextureFormat, TextureImage};

use super::image::{decode_map, encode_map, MapKind};

pub const LOD_TEXTURE_SECTION: &str = "lodTexture";

pub const LOD_TEXTURE: MapKind = MapKind {
    magic: *b"ltx\0",
    version: 1,
    format: TextureFormat::Rgba8,
    label: "terrain lod texture",
};

pub struct TerrainLodTexture {
    texture: Texture,
}

impl TerrainLodTexture {
    pub fn load(source: &BlockSource) -> Result<Option<Self>, TerrainError> {
        let Some(data) = source.open(LOD_TEXTURE_SECTION) else {
            return Ok(None);
        };
        let image = decode_map(&LOD_TEXTURE, &data, &source.section(LOD_TEXTURE_SECTION))?;
        Ok(Some(Self { texture: source.textures().create_texture(image)? }))
    }

    pub fn encode(image: &TextureImage) -> Result<Vec<u8>, TerrainError> {
        encode_map(&LOD_TEXTURE, image)
    }

    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn texture_memory(&self) -> usize {
        self.texture.memory_used()
    }
}
