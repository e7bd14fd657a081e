// ============================================
// Draw State - Что блок рисует в этом кадре
// ============================================

use std::sync::Arc;

use crate::terrain::blends::TerrainBlends;
use crate::terrain::lod::{LodMasks, MorphRange, NeighbourMasks, VertexLodEntry};

use super::mask::RenderTextureMask;

/// Маска текстур + маски геоморфинга
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LodRenderInfo {
    pub render_texture_mask: RenderTextureMask,
    pub masks: LodMasks,
}

/// Снимок ресурсов, собранный pre_draw(). Держит Arc, поэтому
/// выгрузка во время кадра не ломает отрисовку.
#[derive(Clone, Default)]
pub struct DrawState {
    pub current: Option<Arc<VertexLodEntry>>,
    pub next: Option<Arc<VertexLodEntry>>,
    pub blends: Option<Arc<TerrainBlends>>,
    /// render_target_count, для которого собран снимок
    pub stamp: Option<u64>,
}

impl DrawState {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_drawable(&self) -> bool {
        self.current.is_some() && self.next.is_some()
    }
}

/// Рендер, которому блок отдаёт свои сетки
pub trait TerrainDrawer {
    fn draw_lod(
        &mut self,
        entry: &VertexLodEntry,
        morph: MorphRange,
        sub_block_mask: u8,
        neighbour_masks: &NeighbourMasks,
        blends: Option<&TerrainBlends>,
        mask: RenderTextureMask,
    );
}

/// Запись вызовов отрисовки (тесты, отладочный вывод)
#[derive(Debug, Default)]
pub struct DrawRecorder {
    pub calls: Vec<DrawCall>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawCall {
    pub lod: u32,
    pub morph: MorphRange,
    pub sub_block_mask: u8,
    pub has_blends: bool,
}

impl TerrainDrawer for DrawRecorder {
    fn draw_lod(
        &mut self,
        entry: &VertexLodEntry,
        morph: MorphRange,
        sub_block_mask: u8,
        _neighbour_masks: &NeighbourMasks,
        blends: Option<&TerrainBlends>,
        _mask: RenderTextureMask,
    ) {
        self.calls.push(DrawCall {
            lod: entry.lod(),
            morph,
            sub_block_mask,
            has_blends: blends.is_some(),
        });
    }
}
