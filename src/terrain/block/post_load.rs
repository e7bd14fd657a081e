// ============================================
// Post Load Task - Карты блока после загрузки
// ============================================
//
// Нормали, тени горизонта, AO и LOD-текстура декодируются одной
// задачей: фоновая часть строит объекты, а в блок они попадают
// только на главном потоке (TerrainBlock2::apply_post_load).

use std::sync::Arc;

use crate::terrain::error::TerrainError;
use crate::terrain::gpu::Texture;
use crate::terrain::maps::{
    load_normal_map, HorizonShadowMap2, TerrainAoMap2, TerrainLodTexture, LOD_NORMALS_SECTION,
};
use crate::terrain::resource::{TaskHandle, TaskManager, TaskPoll};

use super::source::BlockSource;

/// Результат фоновой части
#[derive(Default)]
pub struct PostLoadResult {
    pub lod_normals: Option<Texture>,
    pub horizon: Option<HorizonShadowMap2>,
    pub ao_map: Option<TerrainAoMap2>,
    pub lod_texture: Option<TerrainLodTexture>,
    /// Обязательная карта не загрузилась: в блок публикуются только нормали
    pub error: Option<TerrainError>,
}

/// Фоновые шаги. Необязательные карты при ошибке просто пропускаются.
pub fn perform_background_steps(source: &BlockSource) -> PostLoadResult {
    let mut result = PostLoadResult::default();

    match TerrainLodTexture::load(source) {
        Ok(lod_texture) => result.lod_texture = lod_texture,
        Err(e) => log::warn!("{}: lod texture not loaded: {}", source.file_name(), e),
    }

    match load_normal_map(source, LOD_NORMALS_SECTION) {
        Ok(texture) => result.lod_normals = Some(texture),
        Err(e) => log::warn!("{}: no valid normals found: {}", source.file_name(), e),
    }

    match TerrainAoMap2::load(source) {
        Ok(ao_map) => result.ao_map = ao_map,
        Err(e) => log::warn!("{}: ao map not loaded: {}", source.file_name(), e),
    }

    match HorizonShadowMap2::load(source) {
        Ok(horizon) => result.horizon = Some(horizon),
        Err(e) => result.error = Some(e),
    }

    result
}

pub struct PostLoadTask {
    handle: TaskHandle<PostLoadResult>,
}

impl PostLoadTask {
    /// Запустить задачу; блок закреплён, пока она не закончится
    pub fn start(tasks: &TaskManager, source: &Arc<BlockSource>) -> Self {
        let pin = source.pin();
        let handle = tasks.submit(move || perform_background_steps(pin.source()));
        Self { handle }
    }

    pub fn poll(&self) -> TaskPoll<PostLoadResult> {
        self.handle.try_take()
    }

    pub fn wait(self) -> Result<PostLoadResult, TerrainError> {
        self.handle.wait()
    }
}
