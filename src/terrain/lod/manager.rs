// ============================================
// Vertex LOD Manager - Вершинные LOD одного блока
// ============================================
//
// По одному ресурсу на LOD. Одновременно нужны только текущий и
// следующий (для морфинга), остальные выгружаются.

use std::sync::Arc;

use crate::terrain::height::TerrainHeightMap2;
use crate::terrain::resource::{
    LoadJob, Resource, ResourcePolicy, ResourceRequired, ResourceState, TaskManager,
};

use super::vertex_entry::{lod_grid_size, VertexLodEntry};

/// Текущий и следующий LOD блока
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexLodRequest {
    pub current: u32,
    pub next: u32,
}

pub struct VertexLodPolicy {
    lod: u32,
    num_lods: u32,
}

impl ResourcePolicy for VertexLodPolicy {
    type Object = VertexLodEntry;
    type Params = VertexLodRequest;
    type Source = Arc<TerrainHeightMap2>;

    fn name(&self) -> String {
        format!("vertex lod {}", self.lod)
    }

    fn evaluate(&self, request: &VertexLodRequest) -> ResourceRequired {
        ResourceRequired::from(self.lod == request.current || self.lod == request.next)
    }

    fn load_job(&self, source: &Arc<TerrainHeightMap2>) -> LoadJob<VertexLodEntry> {
        let map = source.clone();
        let (lod, num_lods) = (self.lod, self.num_lods);
        Box::new(move || Ok(VertexLodEntry::build(&map, lod, num_lods)))
    }

    /// Пересобрать, когда появилась более детальная карта высот
    fn is_stale(&self, entry: &VertexLodEntry, source: &Arc<TerrainHeightMap2>) -> bool {
        source.lod_level() < entry.source_lod()
    }
}

pub struct VertexLodManager {
    lods: Vec<Resource<VertexLodPolicy>>,
}

impl VertexLodManager {
    pub fn new(num_lods: u32) -> Self {
        let lods = (0..num_lods)
            .map(|lod| Resource::new(VertexLodPolicy { lod, num_lods }))
            .collect();
        Self { lods }
    }

    /// Вершин на сторону для LOD
    pub fn lod_size(lod: u32, num_lods: u32) -> u32 {
        lod_grid_size(lod, num_lods)
    }

    #[inline]
    pub fn num_lods(&self) -> u32 {
        self.lods.len() as u32
    }

    /// Самый грубый LOD
    pub fn lowest_lod(&self) -> u32 {
        self.num_lods().saturating_sub(1)
    }

    pub fn evaluate(&mut self, current: u32, next: u32) {
        let request = VertexLodRequest { current, next };
        for lod in &mut self.lods {
            lod.evaluate(&request);
        }
    }

    pub fn stream(&mut self, tasks: &TaskManager, height_map: &Arc<TerrainHeightMap2>) {
        for lod in &mut self.lods {
            lod.stream(tasks, height_map);
        }
        self.evict_not_required();
    }

    /// Опоздавшие фоновые загрузки не должны держать третий LOD
    fn evict_not_required(&mut self) {
        for lod in &mut self.lods {
            if lod.required() == ResourceRequired::No && lod.is_loaded() {
                lod.unload();
            }
        }
    }

    /// Сетка LOD. С подменой - ближайшая загруженная, сначала грубее.
    pub fn get_lod(&self, lod: u32, do_substitution: bool) -> Option<Arc<VertexLodEntry>> {
        let n = self.num_lods();
        if n == 0 {
            return None;
        }
        let lod = lod.min(n - 1);
        if let Some(entry) = self.lods[lod as usize].object() {
            return Some(entry.clone());
        }
        if !do_substitution {
            return None;
        }
        for d in 1..n {
            let candidates = [lod.checked_add(d), lod.checked_sub(d)];
            for candidate in candidates.into_iter().flatten() {
                if let Some(entry) = self.lods.get(candidate as usize).and_then(|r| r.object()) {
                    return Some(entry.clone());
                }
            }
        }
        None
    }

    pub fn state(&self, lod: u32) -> Option<ResourceState> {
        self.lods.get(lod as usize).map(|r| r.state())
    }

    pub fn loaded_count(&self) -> usize {
        self.lods.iter().filter(|r| r.is_loaded()).count()
    }

    pub fn is_loading(&self) -> bool {
        self.lods.iter().any(|r| r.is_loading())
    }

    /// Дождаться всех фоновых сборок
    pub fn complete_pending(&mut self) {
        for lod in &mut self.lods {
            lod.complete_pending();
        }
        self.evict_not_required();
    }

    pub fn vertex_memory(&self) -> usize {
        self.lods
            .iter()
            .filter_map(|r| r.object())
            .map(|e| e.size_in_bytes())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::settings::StreamMode;

    fn flat_map(lod: u32) -> Arc<TerrainHeightMap2> {
        let mut map = TerrainHeightMap2::new(100.0, 0, lod);
        map.create(32 >> lod).unwrap();
        Arc::new(map)
    }

    #[test]
    fn test_at_most_two_lods_resident() {
        let tasks = TaskManager::synchronous();
        let map = flat_map(0);
        let mut manager = VertexLodManager::new(5);

        for current in 0..5 {
            let next = (current + 1).min(manager.lowest_lod());
            manager.evaluate(current, next);
            manager.stream(&tasks, &map);
            assert!(manager.loaded_count() <= 2);
            assert!(manager.get_lod(current, false).is_some());
            assert!(manager.get_lod(next, false).is_some());
        }
    }

    #[test]
    fn test_complete_pending_keeps_two_lods() {
        let tasks = TaskManager::new(StreamMode::Asynchronous, 2).unwrap();
        let map = flat_map(0);
        let mut manager = VertexLodManager::new(5);

        manager.evaluate(0, 1);
        manager.stream(&tasks, &map);
        manager.evaluate(3, 4);
        manager.stream(&tasks, &map);
        manager.complete_pending();

        assert!(!manager.is_loading());
        assert!(manager.loaded_count() <= 2);
        assert!(manager.get_lod(3, false).is_some());
        assert!(manager.get_lod(4, false).is_some());
        assert!(manager.get_lod(0, false).is_none());
    }

    #[test]
    fn test_substitution_picks_nearest() {
        let tasks = TaskManager::synchronous();
        let map = flat_map(0);
        let mut manager = VertexLodManager::new(5);
        manager.evaluate(3, 4);
        manager.stream(&tasks, &map);

        assert!(manager.get_lod(1, false).is_none());
        assert_eq!(manager.get_lod(1, true).map(|e| e.lod()), Some(3));
        assert_eq!(manager.get_lod(4, true).map(|e| e.lod()), Some(4));

        let empty = VertexLodManager::new(5);
        assert!(empty.get_lod(2, true).is_none());
    }

    #[test]
    fn test_rebuilt_when_finer_map_arrives() {
        let tasks = TaskManager::synchronous();
        let mut manager = VertexLodManager::new(5);
        manager.evaluate(0, 1);

        manager.stream(&tasks, &flat_map(1));
        assert_eq!(manager.get_lod(0, false).map(|e| e.source_lod()), Some(1));

        manager.stream(&tasks, &flat_map(0));
        assert_eq!(manager.get_lod(0, false).map(|e| e.source_lod()), Some(0));
    }
}
