// ============================================
// Terrain Settings - Настройки ландшафта (JSON)
// ============================================
// Data-driven настройки пространства: размеры карт, таблица
// дистанций LOD, пороги LOD-текстур, нормалей и бампа.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::TerrainError;

/// Режим стриминга ресурсов
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamMode {
    /// Загрузка прямо внутри stream()
    Synchronous,
    /// Загрузка в фоновом пуле, публикация на главном потоке
    Asynchronous,
}

/// Настройки ландшафта для одного пространства
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainSettings {
    /// Длина ребра блока в метрах
    pub block_size: f32,
    /// Размер самой детальной карты высот (степень двойки)
    pub height_map_size: u32,
    /// Дистанции переключения LOD (на одну меньше числа LOD)
    pub lod_distances: Vec<f32>,
    pub start_bias: f32,
    pub end_bias: f32,

    pub lod_texture_start: f32,
    pub lod_texture_distance: f32,
    pub blend_preload_distance: f32,

    pub lod_normal_start: f32,
    pub lod_normal_distance: f32,
    pub normal_preload_distance: f32,

    pub bump_mapping: bool,
    pub bump_fading_start: f32,
    pub bump_fading_distance: f32,

    /// Дистанция, внутри которой нужна детальная карта высот
    pub detail_height_map_distance: f32,
    /// Самый детальный разрешённый вершинный LOD
    pub top_vertex_lod: u32,
    /// LOD карты высот, которая всегда в памяти
    pub default_height_map_lod: u32,
    pub use_lod_texture: bool,
    pub constant_lod: bool,
    pub do_block_split: bool,
    pub zoom_factor: f32,

    pub normal_map_size: u32,
    pub ao_map_size: u32,

    pub stream_mode: StreamMode,
    pub worker_threads: usize,
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            block_size: 100.0,
            height_map_size: 128,
            lod_distances: vec![200.0, 400.0, 600.0, 800.0, 1200.0, 1600.0],
            start_bias: 0.75,
            end_bias: 0.85,
            lod_texture_start: 200.0,
            lod_texture_distance: 100.0,
            blend_preload_distance: 50.0,
            lod_normal_start: 400.0,
            lod_normal_distance: 100.0,
            normal_preload_distance: 50.0,
            bump_mapping: true,
            bump_fading_start: 100.0,
            bump_fading_distance: 50.0,
            detail_height_map_distance: 300.0,
            top_vertex_lod: 0,
            default_height_map_lod: 1,
            use_lod_texture: true,
            constant_lod: false,
            do_block_split: true,
            zoom_factor: 1.0,
            normal_map_size: 128,
            ao_map_size: 64,
            stream_mode: StreamMode::Asynchronous,
            worker_threads: 2,
        }
    }
}

impl TerrainSettings {
    /// Загрузить настройки из JSON строки
    pub fn from_json(json: &str) -> Result<Self, TerrainError> {
        let settings: TerrainSettings = serde_json::from_str(json)
            .map_err(|e| TerrainError::Config(format!("Failed to parse JSON: {}", e)))?;
        settings.validated()
    }

    /// Загрузить настройки из файла
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TerrainError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Проверка и выравнивание таблицы дистанций под число LOD
    pub fn validated(mut self) -> Result<Self, TerrainError> {
        if !self.height_map_size.is_power_of_two() || self.height_map_size < 2 {
            return Err(TerrainError::NotPowerOfTwo(self.height_map_size));
        }
        if self.block_size <= 0.0 {
            return Err(TerrainError::Config(format!(
                "block size must be positive, got {}",
                self.block_size
            )));
        }
        if self.zoom_factor.abs() < f32::EPSILON {
            return Err(TerrainError::Config("zoom factor can't be zero".into()));
        }
        if self.start_bias <= 0.0 {
            return Err(TerrainError::Config("start bias must be positive".into()));
        }

        // Последний LOD не переключается, поэтому дистанций на одну меньше
        let wanted = self.num_vertex_lods().saturating_sub(1) as usize;
        if self.lod_distances.len() != wanted {
            log::warn!(
                "terrain settings: {} lod distances for {} vertex lods, resizing",
                self.lod_distances.len(),
                self.num_vertex_lods()
            );
            let mut last = self.lod_distances.last().copied().unwrap_or(self.block_size);
            self.lod_distances.truncate(wanted);
            while self.lod_distances.len() < wanted {
                last *= 2.0;
                self.lod_distances.push(last);
            }
        }

        let lods = self.num_vertex_lods();
        if self.top_vertex_lod >= lods {
            self.top_vertex_lod = lods - 1;
        }
        if self.default_height_map_lod >= lods {
            self.default_height_map_lod = lods - 1;
        }
        Ok(self)
    }

    /// Число вершинных LOD = log2(height_map_size)
    #[inline]
    pub fn num_vertex_lods(&self) -> u32 {
        self.height_map_size.trailing_zeros()
    }

    /// Минимальная разница дистанций соседних LOD: от угла блока
    /// до начала геоморфинга
    pub fn min_lod_distance(&self) -> f32 {
        ((self.block_size * self.block_size * 2.0).sqrt() / self.start_bias).ceil()
    }

    pub fn absolute_blend_preload_distance(&self) -> f32 {
        self.lod_texture_start + self.lod_texture_distance + self.blend_preload_distance
    }

    pub fn absolute_normal_preload_distance(&self) -> f32 {
        self.lod_normal_start + self.lod_normal_distance + self.normal_preload_distance
    }

    /// Масштабировать пороги LOD-текстуры
    pub fn apply_lod_texture_modifier(&mut self, modifier: f32) {
        self.lod_texture_start *= modifier;
        self.lod_texture_distance *= modifier;
        self.blend_preload_distance *= modifier;
    }

    /// Масштабировать пороги LOD-нормалей. Нормали начинаются не раньше
    /// конца зоны LOD-текстуры.
    pub fn apply_lod_normal_modifier(&mut self, modifier: f32) {
        self.lod_normal_start = (self.lod_normal_start * modifier)
            .max(self.lod_texture_start + self.lod_texture_distance);
        self.lod_normal_distance *= modifier;
        self.normal_preload_distance *= modifier;
    }

    pub fn apply_bump_modifier(&mut self, modifier: f32) {
        self.bump_fading_start *= modifier;
        self.bump_fading_distance *= modifier;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_num_vertex_lods_from_size() {
        let settings = TerrainSettings::default();
        assert_eq!(settings.num_vertex_lods(), 7);
        assert_eq!(settings.lod_distances.len(), 6);
    }

    #[test]
    fn test_json_resizes_lod_table() {
        let json = r#"{ "height_map_size": 32, "lod_distances": [100.0, 300.0] }"#;
        let settings = TerrainSettings::from_json(json).unwrap();
        assert_eq!(settings.num_vertex_lods(), 5);
        assert_eq!(settings.lod_distances, vec![100.0, 300.0, 600.0, 1200.0]);
        // Остальные поля берутся по умолчанию
        assert_eq!(settings.block_size, 100.0);
    }

    #[test]
    fn test_json_rejects_non_power_of_two() {
        let json = r#"{ "height_map_size": 100 }"#;
        assert!(matches!(
            TerrainSettings::from_json(json),
            Err(TerrainError::NotPowerOfTwo(100))
        ));
    }

    #[test]
    fn test_normal_start_not_before_texture_end() {
        let mut settings = TerrainSettings::default();
        settings.apply_lod_normal_modifier(0.1);
        assert_eq!(
            settings.lod_normal_start,
            settings.lod_texture_start + settings.lod_texture_distance
        );
    }

    #[test]
    fn test_min_lod_distance() {
        let settings = TerrainSettings::default();
        // sqrt(2 * 100^2) / 0.75 = 188.56
        assert_eq!(settings.min_lod_distance(), 189.0);
    }
}
