// ============================================
// Terrain Blends Resource - Стриминг смесей текстур блока
// ============================================

use std::sync::Arc;

use crate::terrain::block::{BlockSource, RenderTextureMask};
use crate::terrain::error::TerrainError;
use crate::terrain::resource::{
    LoadJob, Resource, ResourcePolicy, ResourceRequired, ResourceState, TaskManager,
};

use super::combined::{bucket_layers, CombinedLayer};
use super::layer::{load_layers, TextureLayer};

/// Загруженные слои и их смеси
pub struct TerrainBlends {
    texture_layers: Vec<Arc<TextureLayer>>,
    combined_layers: Vec<CombinedLayer>,
}

impl TerrainBlends {
    pub fn texture_layers(&self) -> &[Arc<TextureLayer>] {
        &self.texture_layers
    }

    pub fn combined_layers(&self) -> &[CombinedLayer] {
        &self.combined_layers
    }

    pub fn texture_memory(&self) -> usize {
        self.combined_layers.iter().map(|c| c.texture_memory()).sum()
    }
}

/// Прочитать слои блока и собрать смеси. Блок без слоёв не грузится.
pub fn load_blends(source: &BlockSource) -> Result<TerrainBlends, TerrainError> {
    let texture_layers: Vec<Arc<TextureLayer>> =
        load_layers(source)?.into_iter().map(Arc::new).collect();
    if texture_layers.is_empty() {
        return Err(TerrainError::NoLayers);
    }

    let sizes: Vec<(u32, u32)> = texture_layers.iter().map(|l| l.size()).collect();
    let combined_layers = bucket_layers(&sizes)
        .into_iter()
        .map(|bucket| {
            let layers = bucket.iter().map(|&i| texture_layers[i].clone()).collect();
            CombinedLayer::build(layers, source.textures())
        })
        .collect::<Result<Vec<_>, _>>()?;

    log::debug!(
        "{}: {} layers in {} combined layers",
        source.file_name(),
        texture_layers.len(),
        combined_layers.len()
    );
    Ok(TerrainBlends { texture_layers, combined_layers })
}

pub struct BlendsPolicy;

impl ResourcePolicy for BlendsPolicy {
    type Object = TerrainBlends;
    type Params = RenderTextureMask;
    type Source = Arc<BlockSource>;

    fn name(&self) -> String {
        "terrain blends".to_string()
    }

    fn evaluate(&self, mask: &RenderTextureMask) -> ResourceRequired {
        ResourceRequired::from(mask.blends_required())
    }

    fn load_job(&self, source: &Arc<BlockSource>) -> LoadJob<TerrainBlends> {
        let pin = source.pin();
        Box::new(move || load_blends(pin.source()))
    }
}

pub struct TerrainBlendsResource {
    resource: Resource<BlendsPolicy>,
    n_layers: usize,
}

impl TerrainBlendsResource {
    /// n_layers - число слоёв, найденных при загрузке блока
    pub fn new(n_layers: usize) -> Self {
        Self { resource: Resource::new(BlendsPolicy), n_layers }
    }

    pub fn evaluate(&mut self, mask: RenderTextureMask) -> ResourceRequired {
        self.resource.evaluate(&mask)
    }

    pub fn stream(&mut self, tasks: &TaskManager, source: &Arc<BlockSource>) {
        self.resource.stream(tasks, source);
    }

    pub fn blends(&self) -> Option<&Arc<TerrainBlends>> {
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

    pub fn n_layers(&self) -> usize {
        self.n_layers
    }

    /// Слой доступен только пока смеси загружены
    pub fn layer(&self, index: usize) -> Option<Arc<TextureLayer>> {
        self.blends()?.texture_layers.get(index).cloned()
    }

    pub fn texture_memory(&self) -> usize {
        self.blends().map(|b| b.texture_memory()).unwrap_or(0)
    }
}
