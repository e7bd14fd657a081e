// ============================================
// Height Module - Карты высот ландшафта
// ============================================

pub mod collision;
pub mod format;
pub mod grid;
pub mod height_map;
pub mod quad_tree;

pub use collision::{
    CellRange, ClosestHit, CollisionOptions, TerrainCollisionCallback, TriangleCollector,
};
pub use format::{HeightMapHeader, VERSION_ABS_FLOAT, VERSION_ABS_QFLOAT};
pub use grid::HeightGrid;
pub use height_map::{HeightMapLock, TerrainHeightMap2, UnlockCallback};
pub use quad_tree::QuadTree;
