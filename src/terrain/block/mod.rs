// ============================================
// Block Module - Блок ландшафта и его стриминг
// ============================================

pub mod draw_state;
pub mod mask;
pub mod post_load;
pub mod source;
pub mod terrain_block;

pub use draw_state::{DrawCall, DrawRecorder, DrawState, LodRenderInfo, TerrainDrawer};
pub use mask::RenderTextureMask;
pub use post_load::{perform_background_steps, PostLoadResult, PostLoadTask};
pub use source::{BlockId, BlockSource, PinGuard};
pub use terrain_block::{BlockMetaData, TerrainBlock2, TERRAIN_BLOCK_META_DATA_SECTION};

pub use crate::terrain::lod::DistanceInfo;
