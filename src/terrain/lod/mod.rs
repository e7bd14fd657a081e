// ============================================
// LOD Module - Вершинные LOD и карты высот блока
// ============================================

pub mod height_map_resource;
pub mod manager;
pub mod vertex_entry;
pub mod vertex_lod;

pub use height_map_resource::{load_height_map, HeightMapResource, HEIGHTS_SECTION};
pub use manager::{VertexLodManager, VertexLodRequest};
pub use vertex_entry::{lod_grid_size, TerrainVertex, VertexLodEntry};
pub use vertex_lod::{
    min_max_xz_distance, xz_distance, DistanceInfo, LodMasks, MorphRange, MorphRanges,
    NeighbourMasks, TerrainVertexLod, DIRECTION_NEGATIVE_X, DIRECTION_NEGATIVE_Z,
    DIRECTION_POSITIVE_X, DIRECTION_POSITIVE_Z, FULL_SUB_BLOCK_MASK, LAST_LOD_DIST,
};
