// ============================================
// Maps Module - Текстурные карты блока
// ============================================

pub mod ao_map;
pub mod horizon;
pub mod image;
pub mod lod_texture;
pub mod normal_map;

pub use ao_map::{TerrainAoMap2, AO_MAP_SECTION};
pub use horizon::{HorizonShadowMap2, HORIZON_SHADOWS_SECTION};
pub use image::{decode_map, encode_map, MapKind};
pub use lod_texture::{TerrainLodTexture, LOD_TEXTURE_SECTION};
pub use normal_map::{
    encode_normal_map, generate_normal_image, load_normal_map, unpack_normal, NormalMapQuality,
    TerrainNormalMap2, LOD_NORMALS_SECTION, NORMALS_SECTION,
};
