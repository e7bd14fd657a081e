// ============================================
// Terrain Module - Блоки ландшафта, LOD и стриминг
// ============================================

pub mod blends;
pub mod block;
pub mod codec;
pub mod context;
pub mod error;
pub mod gpu;
pub mod height;
pub mod lod;
pub mod maps;
pub mod math;
pub mod resource;
pub mod settings;
pub mod space;
pub mod storage;

pub use blends::{CombinedLayer, TerrainBlends, TerrainBlendsResource, TextureLayer};
pub use block::{
    BlockId, BlockSource, DrawRecorder, DrawState, LodRenderInfo, RenderTextureMask,
    TerrainBlock2, TerrainDrawer,
};
pub use context::StreamContext;
pub use error::TerrainError;
pub use gpu::{CpuTextureFactory, Texture, TextureFactory, TextureFormat};
pub use height::{
    ClosestHit, CollisionOptions, HeightGrid, TerrainCollisionCallback, TerrainHeightMap2,
    TriangleCollector,
};
pub use lod::{
    DistanceInfo, HeightMapResource, TerrainVertexLod, VertexLodEntry, VertexLodManager,
};
pub use maps::{HorizonShadowMap2, NormalMapQuality, TerrainNormalMap2};
pub use math::{BoundingBox, WorldTriangle};
pub use resource::{Resource, ResourcePolicy, ResourceRequired, ResourceState, TaskManager};
pub use settings::{StreamMode, TerrainSettings};
pub use space::{BlockKey, SpatialObserver, TerrainSpace};
pub use storage::{DirectoryStorage, MemoryStorage, TerrainStorage};
