// ============================================
// Height Map Resource - Детальная карта высот блока
// ============================================
//
// Дефолтная карта высот всегда в памяти, детальная подгружается
// только вблизи камеры.

use std::sync::Arc;

use crate::terrain::block::BlockSource;
use crate::terrain::error::TerrainError;
use crate::terrain::height::TerrainHeightMap2;
use crate::terrain::resource::{
    LoadJob, Resource, ResourcePolicy, ResourceRequired, ResourceState, TaskManager,
};

/// Базовое имя секций высот
pub const HEIGHTS_SECTION: &str = "heights";

/// Прочитать карту высот LOD из секций блока
pub fn load_height_map(source: &BlockSource, lod: u32) -> Result<TerrainHeightMap2, TerrainError> {
    let name = TerrainHeightMap2::height_section_name(HEIGHTS_SECTION, lod);
    let data = source.require(&name)?;
    let mut map = TerrainHeightMap2::new(source.block_size(), 0, lod);
    map.load(&data, &source.section(&name))?;
    Ok(map)
}

pub struct HeightMapPolicy {
    lod: u32,
}

impl ResourcePolicy for HeightMapPolicy {
    type Object = TerrainHeightMap2;
    type Params = bool;
    type Source = Arc<BlockSource>;

    fn name(&self) -> String {
        format!("height map lod {}", self.lod)
    }

    fn evaluate(&self, required: &bool) -> ResourceRequired {
        ResourceRequired::from(*required)
    }

    fn load_job(&self, source: &Arc<BlockSource>) -> LoadJob<TerrainHeightMap2> {
        let pin = source.pin();
        let lod = self.lod;
        Box::new(move || load_height_map(pin.source(), lod))
    }
}

pub struct HeightMapResource {
    resource: Resource<HeightMapPolicy>,
}

impl HeightMapResource {
    pub fn new(lod: u32) -> Self {
        Self { resource: Resource::new(HeightMapPolicy { lod }) }
    }

    pub fn lod(&self) -> u32 {
        self.resource.policy().lod
    }

    pub fn evaluate(&mut self, required: bool) -> ResourceRequired {
        self.resource.evaluate(&required)
    }

    pub fn stream(&mut self, tasks: &TaskManager, source: &Arc<BlockSource>) {
        self.resource.stream(tasks, source);
    }

    pub fn height_map(&self) -> Option<&Arc<TerrainHeightMap2>> {
        self.resource.object()
    }

    pub fn state(&self) -> ResourceState {
        self.resource.state()
    }

    pub fn required(&self) -> ResourceRequired {
        self.resource.required()
    }

    pub fn is_loading(&self) -> bool {
        self.resource.is_loading()
    }

    pub fn complete_pending(&mut self) {
        self.resource.complete_pending();
    }

    pub fn memory(&self) -> usize {
        self.height_map().map(|m| m.size_in_bytes()).unwrap_or(0)
    }
}
