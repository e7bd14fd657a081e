// ============================================
// Blends Module - Текстурные слои и их смеси
// ============================================

pub mod combined;
pub mod layer;
pub mod resource;

pub use combined::{bucket_layers, CombinedLayer, MAX_LAYERS_PER_COMBINED};
pub use layer::{
    count_layers, layer_section_name, load_layers, TextureLayer, TEXTURE_LAYER_MAGIC,
    TEXTURE_LAYER_VERSION,
};
pub use resource::{load_blends, BlendsPolicy, TerrainBlends, TerrainBlendsResource};
