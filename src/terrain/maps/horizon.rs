// ============================================
// Horizon Shadow Map - Углы горизонта для теней ландшафта
// ============================================
// Тексель: два u16 угла (восток, запад). Секция обязательна.

use crate::terrain::block::{BlockId, BlockSource};
use crate::terrain::error::TerrainError;
use crate::terrain::gpu::{Texture, TextureFormat, TextureImage};

use super::image::{decode_map, encode_map, MapKind};

pub const HORIZON_SHADOWS_SECTION: &str = "horizonShadows";

pub const HORIZON_SHADOW_MAP: MapKind = MapKind {
    magic: *b"hsm\0",
    version: 1,
    format: TextureFormat::Rgba8,
    label: "terrain horizon shadows",
};

pub struct HorizonShadowMap2 {
    /// Невладеющая ссылка на блок
    owner: BlockId,
    image: TextureImage,
    texture: Texture,
}

impl HorizonShadowMap2 {
    pub fn load(source: &BlockSource) -> Result<Self, TerrainError> {
        let data = source.require(HORIZON_SHADOWS_SECTION)?;
        let image = decode_map(
            &HORIZON_SHADOW_MAP,
            &data,
            &source.section(HORIZON_SHADOWS_SECTION),
        )?;
        let texture = source.textures().create_texture(TextureImage::from_texels(
            image.desc().clone(),
            image.texels().to_vec(),
        )?)?;
        Ok(Self { owner: source.id(), image, texture })
    }

    /// Пустая карта (горизонт на 0 градусов) заданного размера
    pub fn flat_image(size: u32) -> TextureImage {
        TextureImage::new(HORIZON_SHADOW_MAP.desc(size, size))
    }

    pub fn encode(image: &TextureImage) -> Result<Vec<u8>, TerrainError> {
        encode_map(&HORIZON_SHADOW_MAP, image)
    }

    pub fn owner(&self) -> BlockId {
        self.owner
    }

    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn width(&self) -> u32 {
        self.image.desc().width
    }

    pub fn height(&self) -> u32 {
        self.image.desc().height
    }

    /// Углы горизонта (восток, запад) в текселе
    pub fn shadow_at(&self, x: u32, z: u32) -> (u16, u16) {
        let x = x.min(self.width().saturating_sub(1)) as usize;
        let z = z.min(self.height().saturating_sub(1)) as usize;
        let i = (z * self.width() as usize + x) * 4;
        let t = &self.image.texels()[i..i + 4];
        (u16::from_le_bytes([t[0], t[1]]), u16::from_le_bytes([t[2], t[3]]))
    }

    pub fn texture_memory(&self) -> usize {
        self.texture.memory_used()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::gpu::CpuTextureFactory;
    use crate::terrain::storage::MemoryStorage;
    use std::sync::Arc;

    #[test]
    fn test_load_keeps_owner_and_angles() {
        let mut image = HorizonShadowMap2::flat_image(4);
        image.row_mut(1)[4..8].copy_from_slice(&[0x34, 0x12, 0x78, 0x56]);

        let storage = Arc::new(MemoryStorage::new());
        storage.insert("b/horizonShadows", HorizonShadowMap2::encode(&image).unwrap());
        let source = BlockSource::new("b", 100.0, storage, Arc::new(CpuTextureFactory::new()));

        let shadows = HorizonShadowMap2::load(&source).unwrap();
        assert_eq!(shadows.owner(), source.id());
        assert_eq!(shadows.shadow_at(1, 1), (0x1234, 0x5678));
        assert_eq!(shadows.shadow_at(100, 0), (0, 0));
    }

    #[test]
    fn test_missing_section_fails() {
        let source = BlockSource::new(
            "b",
            100.0,
            Arc::new(MemoryStorage::new()),
            Arc::new(CpuTextureFactory::new()),
        );
        assert!(matches!(
            HorizonShadowMap2::load(&source),
            Err(TerrainError::SectionNotFound(_))
        ));
    }
}
