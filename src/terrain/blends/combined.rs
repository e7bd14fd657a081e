// ============================================
// Combined Layer - До 4 слоёв в одной RGBA текстуре весов
// ============================================

use std::sync::Arc;

use crate::terrain::error::TerrainError;
use crate::terrain::gpu::{Texture, TextureDesc, TextureFactory, TextureFormat, TextureImage};

use super::layer::TextureLayer;

/// Максимум слоёв в одной смеси (по каналу RGBA на слой)
pub const MAX_LAYERS_PER_COMBINED: usize = 4;

/// Разложить слои по корзинам одинакового размера, first-fit.
/// Порядок слоёв внутри корзины совпадает с порядком в блоке.
pub fn bucket_layers(sizes: &[(u32, u32)]) -> Vec<Vec<usize>> {
    let mut buckets: Vec<((u32, u32), Vec<usize>)> = Vec::new();
    for (index, size) in sizes.iter().enumerate() {
        let slot = buckets
            .iter_mut()
            .find(|(s, b)| s == size && b.len() < MAX_LAYERS_PER_COMBINED);
        match slot {
            Some((_, bucket)) => bucket.push(index),
            None => buckets.push((*size, vec![index])),
        }
    }
    buckets.into_iter().map(|(_, b)| b).collect()
}

pub struct CombinedLayer {
    width: u32,
    height: u32,
    layers: Vec<Arc<TextureLayer>>,
    blend_texture: Texture,
}

impl CombinedLayer {
    /// Упаковать веса слоёв в каналы RGBA8 и создать текстуру смеси
    pub fn build(
        layers: Vec<Arc<TextureLayer>>,
        textures: &dyn TextureFactory,
    ) -> Result<Self, TerrainError> {
        let (width, height) = match layers.first() {
            Some(layer) => layer.size(),
            None => return Err(TerrainError::NoLayers),
        };
        debug_assert!(layers.len() <= MAX_LAYERS_PER_COMBINED);
        debug_assert!(layers.iter().all(|l| l.size() == (width, height)));

        let mut image =
            TextureImage::new(TextureDesc::new(width, height, TextureFormat::Rgba8, "terrain blend"));
        for y in 0..height {
            let row = image.row_mut(y);
            for x in 0..width {
                let texel = &mut row[x as usize * 4..x as usize * 4 + 4];
                for (channel, layer) in layers.iter().enumerate() {
                    texel[channel] = layer.weight(x, y);
                }
            }
        }

        let blend_texture = textures.create_texture(image)?;
        Ok(Self { width, height, layers, blend_texture })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> &[Arc<TextureLayer>] {
        &self.layers
    }

    pub fn blend_texture(&self) -> &Texture {
        &self.blend_texture
    }

    pub fn texture_memory(&self) -> usize {
        self.blend_texture.memory_used()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::gpu::CpuTextureFactory;

    #[test]
    fn test_bucket_by_size_first_fit() {
        let sizes = [(64, 64), (32, 32), (64, 64), (64, 64), (64, 64), (64, 64), (32, 32)];
        let buckets = bucket_layers(&sizes);
        assert_eq!(buckets, vec![vec![0, 2, 3, 4], vec![1, 6], vec![5]]);
        assert!(bucket_layers(&[]).is_empty());
    }

    #[test]
    fn test_channels_hold_layer_weights() {
        let factory = CpuTextureFactory::new();
        let layers = vec![
            Arc::new(TextureLayer::filled("a", 2, 2, 10)),
            Arc::new(TextureLayer::filled("b", 2, 2, 20)),
            Arc::new(TextureLayer::filled("c", 2, 2, 30)),
        ];
        let combined = CombinedLayer::build(layers, &factory).unwrap();
        assert_eq!(combined.len(), 3);
        assert_eq!(&combined.blend_texture().texels()[..4], &[10, 20, 30, 0]);
        assert_eq!(combined.texture_memory(), 16);
    }
}
