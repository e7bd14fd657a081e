// ============================================
// Stream Context - Настройки и состояние кадра для стриминга
// ============================================
// Передаётся по ссылке в evaluate/stream/pre_draw вместо глобальных
// флагов.

use super::error::TerrainError;
use super::lod::TerrainVertexLod;
use super::resource::TaskManager;
use super::settings::TerrainSettings;

pub struct StreamContext {
    pub settings: TerrainSettings,
    pub vertex_lod: TerrainVertexLod,
    pub tasks: TaskManager,
    /// Кадр отражения: смеси не стримятся
    pub reflection_pass: bool,
    /// Номер текущего render target, для отметки pre_draw
    pub render_target_count: u64,
}

impl StreamContext {
    pub fn new(settings: TerrainSettings) -> Result<Self, TerrainError> {
        let tasks = TaskManager::from_settings(&settings)?;
        Self::with_tasks(settings, tasks)
    }

    /// Настройки проверяются здесь: таблица дистанций должна совпасть
    /// с числом вершинных LOD
    pub fn with_tasks(settings: TerrainSettings, tasks: TaskManager) -> Result<Self, TerrainError> {
        let settings = settings.validated()?;
        let vertex_lod = TerrainVertexLod::new(&settings);
        debug_assert_eq!(vertex_lod.num_lods(), settings.num_vertex_lods());
        Ok(Self {
            settings,
            vertex_lod,
            tasks,
            reflection_pass: false,
            render_target_count: 0,
        })
    }

    /// Синхронный контекст (тесты, инструменты)
    pub fn synchronous(settings: TerrainSettings) -> Result<Self, TerrainError> {
        Self::with_tasks(settings, TaskManager::synchronous())
    }

    /// Начать новый render target: pre_draw пересоберёт состояние
    pub fn begin_render_target(&mut self) {
        self.render_target_count += 1;
    }

    pub fn num_vertex_lods(&self) -> u32 {
        self.settings.num_vertex_lods()
    }

    /// Масштабировать дистанции LOD (качество графики)
    pub fn apply_lod_modifier(&mut self, modifier: f32) {
        self.vertex_lod.apply_lod_modifier(modifier);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_validate_settings() {
        let settings = TerrainSettings {
            height_map_size: 32,
            lod_distances: vec![100.0],
            ..TerrainSettings::default()
        };
        let ctx = StreamContext::synchronous(settings).unwrap();
        assert_eq!(ctx.settings.lod_distances.len(), 4);
        assert_eq!(ctx.vertex_lod.num_lods(), ctx.num_vertex_lods());

        let bad = TerrainSettings { height_map_size: 100, ..TerrainSettings::default() };
        assert!(matches!(
            StreamContext::synchronous(bad),
            Err(TerrainError::NotPowerOfTwo(100))
        ));
    }
}
