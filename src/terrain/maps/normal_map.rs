// ============================================
// Terrain Normal Map - LOD нормали + качественная карта нормалей
// ============================================
//
// LOD нормали всегда в памяти (грузятся post-load задачей),
// качественная карта стримится вблизи камеры. Когда она выгружена,
// рисуем с LOD нормалями.

use std::sync::Arc;

use crate::terrain::block::{BlockSource, RenderTextureMask};
use crate::terrain::error::TerrainError;
use crate::terrain::gpu::{Texture, TextureFormat, TextureImage};
use crate::terrain::height::TerrainHeightMap2;
use crate::terrain::resource::{
    LoadJob, Resource, ResourcePolicy, ResourceRequired, ResourceState, TaskManager,
};

use super::image::{decode_map, encode_map, MapKind};

pub const NORMALS_SECTION: &str = "normals";
pub const LOD_NORMALS_SECTION: &str = "lodNormals";

/// Меньше этого размера отдельная LOD карта не строится
const MIN_MAP_SIZE: u32 = 32;

pub const NORMAL_MAP: MapKind = MapKind {
    magic: *b"nrm\0",
    version: 1,
    format: TextureFormat::Rg8,
    label: "terrain normals",
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NormalMapQuality {
    /// Интерполированные нормали
    Nice,
    /// Нормали узлов сетки, с алиасингом
    Fast,
}

/// x в старшем байте, z в младшем (y всегда положительный)
#[inline]
fn pack_normal(x: f32, z: f32) -> u16 {
    const SCALE: f32 = 255.9 / 2.0;
    let px = ((x + 1.0) * SCALE) as u16;
    let pz = ((z + 1.0) * SCALE) as u16;
    (px << 8) | pz
}

/// Распаковать нормаль из текселя карты
pub fn unpack_normal(texel: u16) -> (f32, f32, f32) {
    const SCALE: f32 = 255.9 / 2.0;
    let x = (texel >> 8) as f32 / SCALE - 1.0;
    let z = (texel & 0xFF) as f32 / SCALE - 1.0;
    let y = (1.0 - x * x - z * z).max(0.0).sqrt();
    (x, y, z)
}

/// Построить изображение нормалей size x size по карте высот
pub fn generate_normal_image(
    map: &TerrainHeightMap2,
    quality: NormalMapQuality,
    size: u32,
) -> TextureImage {
    let mut image = TextureImage::new(NORMAL_MAP.desc(size, size));
    let steps = size.saturating_sub(1).max(1) as f32;

    for zi in 0..size {
        let row = image.row_mut(zi);
        for xi in 0..size {
            let normal = match quality {
                NormalMapQuality::Nice => {
                    let step = map.block_size() / steps;
                    map.normal_at(xi as f32 * step, zi as f32 * step)
                }
                NormalMapQuality::Fast => {
                    let off = map.visible_offset() as f32;
                    let x = off + xi as f32 * map.vertices_width() as f32 / steps;
                    let z = off + zi as f32 * map.vertices_height() as f32 / steps;
                    map.normal_at_pole(x as i32, z as i32)
                }
            };
            let packed = pack_normal(normal.x, normal.z).to_le_bytes();
            row[xi as usize * 2..xi as usize * 2 + 2].copy_from_slice(&packed);
        }
    }
    image
}

pub fn encode_normal_map(image: &TextureImage) -> Result<Vec<u8>, TerrainError> {
    encode_map(&NORMAL_MAP, image)
}

pub fn load_normal_map(source: &BlockSource, section: &str) -> Result<Texture, TerrainError> {
    let data = source.require(section)?;
    let image = decode_map(&NORMAL_MAP, &data, &source.section(section))?;
    source.textures().create_texture(image)
}

pub struct NormalMapPolicy;

impl ResourcePolicy for NormalMapPolicy {
    type Object = Texture;
    type Params = RenderTextureMask;
    type Source = Arc<BlockSource>;

    fn name(&self) -> String {
        "quality normal map".to_string()
    }

    fn evaluate(&self, mask: &RenderTextureMask) -> ResourceRequired {
        ResourceRequired::from(mask.quality_normals_required())
    }

    fn load_job(&self, source: &Arc<BlockSource>) -> LoadJob<Texture> {
        let pin = source.pin();
        Box::new(move || load_normal_map(pin.source(), NORMALS_SECTION))
    }
}

pub struct TerrainNormalMap2 {
    lod_normals: Option<Texture>,
    quality: Resource<NormalMapPolicy>,
}

impl Default for TerrainNormalMap2 {
    fn default() -> Self {
        Self::new()
    }
}

impl TerrainNormalMap2 {
    pub fn new() -> Self {
        Self { lod_normals: None, quality: Resource::new(NormalMapPolicy) }
    }

    /// Сгенерировать обе карты из карты высот
    pub fn generate(
        &mut self,
        map: &TerrainHeightMap2,
        quality: NormalMapQuality,
        size: u32,
        source: &BlockSource,
    ) -> Result<(), TerrainError> {
        let textures = source.textures();
        let full = textures.create_texture(generate_normal_image(map, quality, size))?;

        let lod = if size > MIN_MAP_SIZE && quality == NormalMapQuality::Nice {
            let lod_size = (size >> 2).max(MIN_MAP_SIZE);
            textures.create_texture(generate_normal_image(map, quality, lod_size))?
        } else {
            full.clone()
        };

        self.lod_normals = Some(lod);
        self.quality.set_object(full);
        Ok(())
    }

    pub fn set_lod_normals(&mut self, texture: Texture) {
        self.lod_normals = Some(texture);
    }

    pub fn lod_normals(&self) -> Option<&Texture> {
        self.lod_normals.as_ref()
    }

    pub fn evaluate(&mut self, mask: RenderTextureMask) -> ResourceRequired {
        self.quality.evaluate(&mask)
    }

    pub fn stream(&mut self, tasks: &TaskManager, source: &Arc<BlockSource>) {
        self.quality.stream(tasks, source);
    }

    /// Лучшая доступная карта: качественная, иначе LOD
    pub fn texture(&self) -> Option<&Texture> {
        match self.quality.object() {
            Some(texture) => Some(texture.as_ref()),
            None => self.lod_normals.as_ref(),
        }
    }

    pub fn has_quality_normals(&self) -> bool {
        self.quality.is_loaded()
    }

    pub fn state(&self) -> ResourceState {
        self.quality.state()
    }

    pub fn is_loading(&self) -> bool {
        self.quality.is_loading()
    }

    pub fn complete_pending(&mut self) {
        self.quality.complete_pending();
    }

    pub fn texture_memory(&self) -> usize {
        self.lod_normals.as_ref().map(|t| t.memory_used()).unwrap_or(0)
            + self.quality.object().map(|t| t.memory_used()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::gpu::CpuTextureFactory;
    use crate::terrain::storage::MemoryStorage;

    fn flat_map() -> TerrainHeightMap2 {
        let mut map = TerrainHeightMap2::new(100.0, 0, 0);
        map.create(16).unwrap();
        map
    }

    #[test]
    fn test_flat_map_packs_up_normals() {
        for quality in [NormalMapQuality::Nice, NormalMapQuality::Fast] {
            let image = generate_normal_image(&flat_map(), quality, 8);
            let texel = u16::from_le_bytes([image.texels()[0], image.texels()[1]]);
            assert_eq!(texel, pack_normal(0.0, 0.0));
            let (x, y, z) = unpack_normal(texel);
            assert!(x.abs() < 0.01 && z.abs() < 0.01);
            assert!((y - 1.0).abs() < 0.01);
        }
    }

    #[test]
    fn test_generate_builds_smaller_lod_map() {
        let source = BlockSource::new(
            "b",
            100.0,
            Arc::new(MemoryStorage::new()),
            Arc::new(CpuTextureFactory::new()),
        );
        let mut normals = TerrainNormalMap2::new();
        normals.generate(&flat_map(), NormalMapQuality::Nice, 128, &source).unwrap();
        assert_eq!(normals.lod_normals().map(|t| t.width()), Some(32));
        assert_eq!(normals.texture().map(|t| t.width()), Some(128));
    }

    #[test]
    fn test_quality_map_degrades_to_lod_normals() {
        let storage = Arc::new(MemoryStorage::new());
        let image = generate_normal_image(&flat_map(), NormalMapQuality::Fast, 64);
        storage.insert("b/normals", encode_normal_map(&image).unwrap());
        let source = BlockSource::new("b", 100.0, storage, Arc::new(CpuTextureFactory::new()));

        let mut normals = TerrainNormalMap2::new();
        normals.set_lod_normals(load_normal_map(&source, NORMALS_SECTION).unwrap());
        let tasks = TaskManager::synchronous();

        normals.evaluate(RenderTextureMask::PRELOAD_NORMALS);
        normals.stream(&tasks, &source);
        assert!(normals.has_quality_normals());

        normals.evaluate(RenderTextureMask::DRAW_LOD_NORMALS);
        normals.stream(&tasks, &source);
        assert!(!normals.has_quality_normals());
        assert!(normals.texture().is_some());
    }
}
