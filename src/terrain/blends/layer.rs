// ============================================
// Texture Layer - Один текстурный слой блока
// ============================================
// Секции "layer1".."layerN": текстура, проекция и карта весов.

use serde::{Deserialize, Serialize};

use crate::terrain::block::BlockSource;
use crate::terrain::codec::{decode_section, encode_section};
use crate::terrain::error::TerrainError;

pub const TEXTURE_LAYER_MAGIC: [u8; 4] = *b"tlr\0";
pub const TEXTURE_LAYER_VERSION: u32 = 2;

/// Наибольшая сторона карты весов
pub const MAX_LAYER_SIZE: u32 = 4096;

/// Имя секции слоя (нумерация с 1)
pub fn layer_section_name(index: usize) -> String {
    format!("layer{}", index + 1)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureLayer {
    pub texture_name: String,
    pub bump_texture_name: Option<String>,
    pub u_projection: [f32; 4],
    pub v_projection: [f32; 4],
    pub width: u32,
    pub height: u32,
    /// Веса смешивания, width * height байт
    pub weights: Vec<u8>,
}

impl TextureLayer {
    /// Слой с постоянным весом
    pub fn filled(texture_name: &str, width: u32, height: u32, weight: u8) -> Self {
        Self {
            texture_name: texture_name.to_string(),
            bump_texture_name: None,
            u_projection: [1.0, 0.0, 0.0, 0.0],
            v_projection: [0.0, 0.0, 1.0, 0.0],
            width,
            height,
            weights: vec![weight; width as usize * height as usize],
        }
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn weight(&self, x: u32, y: u32) -> u8 {
        self.weights[y as usize * self.width as usize + x as usize]
    }

    pub fn has_bump(&self) -> bool {
        self.bump_texture_name.is_some()
    }

    pub fn memory_used(&self) -> usize {
        self.weights.len()
    }

    pub fn encode(&self) -> Result<Vec<u8>, TerrainError> {
        encode_section(TEXTURE_LAYER_MAGIC, TEXTURE_LAYER_VERSION, self)
    }

    pub fn decode(data: &[u8], section: &str) -> Result<Self, TerrainError> {
        let (_, layer): (u32, TextureLayer) =
            decode_section(data, TEXTURE_LAYER_MAGIC, &[TEXTURE_LAYER_VERSION], section)?;
        if layer.width == 0
            || layer.height == 0
            || layer.width > MAX_LAYER_SIZE
            || layer.height > MAX_LAYER_SIZE
        {
            return Err(TerrainError::InvalidData(format!(
                "{}: bad weight map size {}x{}",
                section, layer.width, layer.height
            )));
        }
        let expected = (layer.width as usize).checked_mul(layer.height as usize);
        if expected != Some(layer.weights.len()) {
            return Err(TerrainError::InvalidData(format!(
                "{}: weights do not match {}x{}",
                section, layer.width, layer.height
            )));
        }
        Ok(layer)
    }
}

/// Сколько слоёв у блока: секции идут подряд без пропусков
pub fn count_layers(source: &BlockSource) -> usize {
    let mut count = 0;
    while source.has_section(&layer_section_name(count)) {
        count += 1;
    }
    count
}

/// Прочитать все слои блока по порядку
pub fn load_layers(source: &BlockSource) -> Result<Vec<TextureLayer>, TerrainError> {
    let count = count_layers(source);
    let mut layers = Vec::with_capacity(count);
    for i in 0..count {
        let name = layer_section_name(i);
        let data = source.require(&name)?;
        layers.push(TextureLayer::decode(&data, &source.section(&name))?);
    }
    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::gpu::CpuTextureFactory;
    use crate::terrain::storage::MemoryStorage;
    use std::sync::Arc;

    #[test]
    fn test_layers_are_counted_until_gap() {
        let storage = Arc::new(MemoryStorage::new());
        let layer = TextureLayer::filled("grass.dds", 8, 8, 255);
        storage.insert("b/layer1", layer.encode().unwrap());
        storage.insert("b/layer2", layer.encode().unwrap());
        storage.insert("b/layer4", layer.encode().unwrap());
        let source = BlockSource::new("b", 100.0, storage, Arc::new(CpuTextureFactory::new()));

        assert_eq!(count_layers(&source), 2);
        let layers = load_layers(&source).unwrap();
        assert_eq!(layers[1].texture_name, "grass.dds");
        assert_eq!(layers[1].weight(7, 7), 255);
    }

    #[test]
    fn test_weights_size_is_checked() {
        let mut layer = TextureLayer::filled("rock.dds", 4, 4, 10);
        layer.weights.pop();
        let data = layer.encode().unwrap();
        assert!(matches!(
            TextureLayer::decode(&data, "b/layer1"),
            Err(TerrainError::InvalidData(_))
        ));
    }

    #[test]
    fn test_oversized_layer_is_rejected() {
        let layer = TextureLayer {
            texture_name: "huge.dds".into(),
            bump_texture_name: None,
            u_projection: [1.0, 0.0, 0.0, 0.0],
            v_projection: [0.0, 0.0, 1.0, 0.0],
            width: 65536,
            height: 65536,
            weights: Vec::new(),
        };
        let data = layer.encode().unwrap();
        assert!(matches!(
            TextureLayer::decode(&data, "b/layer1"),
            Err(TerrainError::InvalidData(_))
        ));

        let layer = TextureLayer { width: MAX_LAYER_SIZE + 1, height: 1, ..layer };
        let data = layer.encode().unwrap();
        assert!(TextureLayer::decode(&data, "b/layer1").is_err());
    }
}
