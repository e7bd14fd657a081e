// ============================================
// Terrain Height Map 2 - Карта высот одного LOD блока
// ============================================
//
// Видимая часть сетки окружена невидимой рамкой (visible offset),
// чтобы нормали на краях блока совпадали с соседями.
// Каждая ячейка делится на два треугольника, диагональ чередуется
// шахматным порядком по (x ^ z) & 1.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use ultraviolet::Vec3;

use crate::terrain::error::TerrainError;

use super::format::{self, VERSION_ABS_QFLOAT};
use super::grid::HeightGrid;
use super::quad_tree::QuadTree;

/// Рамка LOD0 карты высот
pub const DEFAULT_VISIBLE_OFFSET: u32 = 2;

/// Минимальный порог (в метрах) для перехода на квад-дерево
pub const MIN_QUAD_TREE_THRESHOLD: f32 = 4.0;

/// Вызывается после снятия блокировки на запись
pub type UnlockCallback = Box<dyn Fn() + Send + Sync>;

pub struct TerrainHeightMap2 {
    block_size: f32,
    lod_level: u32,
    visible_offset: u32,
    heights: HeightGrid,
    min_height: f32,
    max_height: f32,

    blocks_width: u32,
    blocks_height: u32,
    spacing_x: f32,
    spacing_z: f32,

    /// Строится лениво при первой дальней коллизии
    quad_tree: OnceLock<QuadTree>,
    /// Число запросов, читающих квад-дерево прямо сейчас
    quad_tree_in_use: AtomicU32,

    unlock_callback: Option<UnlockCallback>,
}

impl TerrainHeightMap2 {
    /// `size` - ширина видимой части в вершинах (0 для пустой карты)
    pub fn new(block_size: f32, size: u32, lod_level: u32) -> Self {
        let visible_offset = if lod_level > 0 { 0 } else { DEFAULT_VISIBLE_OFFSET };
        let poles = if size > 0 { size + visible_offset * 2 } else { 0 };
        let mut map = Self {
            block_size,
            lod_level,
            visible_offset,
            heights: HeightGrid::new(poles, poles),
            min_height: 0.0,
            max_height: 0.0,
            blocks_width: 0,
            blocks_height: 0,
            spacing_x: 0.0,
            spacing_z: 0.0,
            quad_tree: OnceLock::new(),
            quad_tree_in_use: AtomicU32::new(0),
            unlock_callback: None,
        };
        map.refresh_internal_dimensions();
        map
    }

    pub fn set_unlock_callback(&mut self, callback: Option<UnlockCallback>) {
        self.unlock_callback = callback;
    }

    /// Пересоздать пустую карту: size ячеек + рамка + 1 вершина
    pub fn create(&mut self, size: u32) -> Result<(), TerrainError> {
        if !size.is_power_of_two() {
            return Err(TerrainError::NotPowerOfTwo(size));
        }
        let poles = size + self.visible_offset * 2 + 1;
        self.min_height = 0.0;
        self.max_height = 0.0;
        self.heights = HeightGrid::new(poles, poles);
        self.invalidate_quad_tree();
        self.refresh_internal_dimensions();
        Ok(())
    }

    /// Загрузить из бинарной секции. При ошибке карта не меняется.
    pub fn load(&mut self, data: &[u8], section: &str) -> Result<(), TerrainError> {
        let decoded = format::decode_height_map(data, section)?;
        self.heights = decoded.grid;
        self.min_height = decoded.min_height;
        self.max_height = decoded.max_height;
        self.invalidate_quad_tree();
        self.refresh_internal_dimensions();
        Ok(())
    }

    /// Сохранить в бинарную секцию (квантованный формат).
    /// Перед записью min/max пересчитываются по реальным данным.
    pub fn save(&mut self) -> Result<Vec<u8>, TerrainError> {
        self.recalc_min_max();
        format::encode_height_map(&self.heights, self.min_height, self.max_height, VERSION_ABS_QFLOAT)
    }

    /// Заблокировать карту. Снятие блокировки на запись пересчитывает
    /// min/max, сбрасывает квад-дерево и зовёт unlock callback.
    pub fn lock(&mut self, read_only: bool) -> HeightMapLock<'_> {
        HeightMapLock { map: self, read_only }
    }

    /// Имя секции высот для LOD: "heights", "heights1", ...
    pub fn height_section_name(base: &str, lod: u32) -> String {
        if lod > 0 {
            format!("{}{}", base, lod)
        } else {
            base.to_string()
        }
    }

    fn refresh_internal_dimensions(&mut self) {
        let edge = self.visible_offset * 2 + 1;
        self.blocks_width = self.heights.width().saturating_sub(edge);
        self.blocks_height = self.heights.height().saturating_sub(edge);
        self.spacing_x = if self.blocks_width > 0 {
            self.block_size / self.blocks_width as f32
        } else {
            0.0
        };
        self.spacing_z = if self.blocks_height > 0 {
            self.block_size / self.blocks_height as f32
        } else {
            0.0
        };
    }

    pub fn recalc_min_max(&mut self) {
        let (lo, hi) = self.heights.min_max();
        self.min_height = lo;
        self.max_height = hi;
    }

    // ---------------- размеры ----------------

    #[inline]
    pub fn block_size(&self) -> f32 {
        self.block_size
    }

    #[inline]
    pub fn lod_level(&self) -> u32 {
        self.lod_level
    }

    #[inline]
    pub fn visible_offset(&self) -> u32 {
        self.visible_offset
    }

    /// Число ячеек по X в видимой части
    #[inline]
    pub fn blocks_width(&self) -> u32 {
        self.blocks_width
    }

    #[inline]
    pub fn blocks_height(&self) -> u32 {
        self.blocks_height
    }

    pub fn vertices_width(&self) -> u32 {
        self.heights.width().saturating_sub(self.visible_offset * 2)
    }

    pub fn vertices_height(&self) -> u32 {
        self.heights.height().saturating_sub(self.visible_offset * 2)
    }

    #[inline]
    pub fn spacing_x(&self) -> f32 {
        self.spacing_x
    }

    #[inline]
    pub fn spacing_z(&self) -> f32 {
        self.spacing_z
    }

    #[inline]
    pub fn min_height(&self) -> f32 {
        self.min_height
    }

    #[inline]
    pub fn max_height(&self) -> f32 {
        self.max_height
    }

    pub fn image(&self) -> &HeightGrid {
        &self.heights
    }

    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }

    pub fn size_in_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.heights.size_in_bytes()
            + self.quad_tree.get().map(|q| q.size_in_bytes()).unwrap_or(0)
    }

    // ---------------- запросы высот ----------------

    /// Высота вершины видимой сетки (с учётом рамки)
    #[inline]
    pub fn height_at_vertex(&self, x: i32, z: i32) -> f32 {
        let off = self.visible_offset as i32;
        self.heights.get(x + off, z + off)
    }

    /// Интерполированная высота в координатах блока, совпадающая
    /// с треугольниками LOD0 меша
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        if self.spacing_x <= 0.0 || self.spacing_z <= 0.0 {
            return 0.0;
        }
        let xs = x / self.spacing_x + self.visible_offset as f32;
        let zs = z / self.spacing_z + self.visible_offset as f32;

        let xf = xs - xs.floor();
        let zf = zs - zs.floor();

        let x_off = xs.floor() as i32;
        let z_off = zs.floor() as i32;

        let h = |dx: i32, dz: i32| self.heights.get(x_off + dx, z_off + dz);

        if (x_off ^ z_off) & 1 != 0 {
            // Диагональ (0,1)-(1,0)
            let h01 = h(0, 1);
            let h10 = h(1, 0);
            if (1.0 - xf) > zf {
                let h00 = h(0, 0);
                h00 + (h10 - h00) * xf + (h01 - h00) * zf
            } else {
                let h11 = h(1, 1);
                h11 + (h01 - h11) * (1.0 - xf) + (h10 - h11) * (1.0 - zf)
            }
        } else {
            // Диагональ (0,0)-(1,1)
            let h00 = h(0, 0);
            let h11 = h(1, 1);
            if xf > zf {
                let h10 = h(1, 0);
                h10 + (h00 - h10) * (1.0 - xf) + (h11 - h10) * zf
            } else {
                let h01 = h(0, 1);
                h01 + (h11 - h01) * xf + (h00 - h01) * (1.0 - zf)
            }
        }
    }

    /// Нормаль в узле полной сетки (координаты включают рамку).
    /// 4 соседа + 4 диагонали с весом sqrt(0.5).
    pub fn normal_at_pole(&self, x: i32, z: i32) -> Vec3 {
        const DIAGONAL: f32 = 0.707_106_78;
        let h = |px: i32, pz: i32| self.heights.get(px, pz);

        let y = self.spacing_x * 2.0 + self.spacing_z * 2.0;
        let mut nx = h(x - 1, z) - h(x + 1, z);
        let mut nz = h(x, z - 1) - h(x, z + 1);

        let val1 = (h(x - 1, z - 1) - h(x + 1, z + 1)) * DIAGONAL;
        let val2 = (h(x - 1, z + 1) - h(x + 1, z - 1)) * DIAGONAL;

        nx += val1 + val2;
        nz += val1 - val2;

        let n = Vec3::new(nx, y, nz);
        if n.mag_sq() > 0.0 {
            n.normalized()
        } else {
            Vec3::unit_y()
        }
    }

    /// Нормаль в координатах блока: билинейная смесь четырёх
    /// нормалей узлов, с быстрыми путями на целых координатах
    pub fn normal_at(&self, x: f32, z: f32) -> Vec3 {
        const FRAC_EPSILON: f32 = 1e-6;
        if self.spacing_x <= 0.0 || self.spacing_z <= 0.0 {
            return Vec3::unit_y();
        }

        let xf = x / self.spacing_x + self.visible_offset as f32;
        let zf = z / self.spacing_z + self.visible_offset as f32;
        let x_frac = xf - xf.floor();
        let z_frac = zf - zf.floor();
        let xi = xf.floor() as i32;
        let zi = zf.floor() as i32;

        let blend = |n: Vec3| if n.mag_sq() > 0.0 { n.normalized() } else { Vec3::unit_y() };

        if x_frac.abs() < FRAC_EPSILON {
            if z_frac.abs() < FRAC_EPSILON {
                return self.normal_at_pole(xi, zi);
            }
            let n1 = self.normal_at_pole(xi, zi) * (1.0 - z_frac);
            let n2 = self.normal_at_pole(xi, zi + 1) * z_frac;
            return blend(n1 + n2);
        } else if z_frac.abs() < FRAC_EPSILON {
            let n1 = self.normal_at_pole(xi, zi) * (1.0 - x_frac);
            let n2 = self.normal_at_pole(xi + 1, zi) * x_frac;
            return blend(n1 + n2);
        }

        let n1 = self.normal_at_pole(xi, zi) * ((1.0 - x_frac) * (1.0 - z_frac));
        let n2 = self.normal_at_pole(xi + 1, zi) * (x_frac * (1.0 - z_frac));
        let n3 = self.normal_at_pole(xi, zi + 1) * ((1.0 - x_frac) * z_frac);
        let n4 = self.normal_at_pole(xi + 1, zi + 1) * (x_frac * z_frac);
        blend(n1 + n2 + n3 + n4)
    }

    // ---------------- квад-дерево ----------------

    /// Размер запроса по XZ, начиная с которого используется квад-дерево
    pub fn quad_tree_threshold(&self) -> f32 {
        (self.spacing_x.max(self.spacing_z) * 4.0).max(MIN_QUAD_TREE_THRESHOLD)
    }

    /// Построить квад-дерево, если его ещё нет. Параллельные вызовы
    /// ждут одно построение, после него чтение не блокируется.
    pub fn ensure_quad_tree_valid(&self) -> &QuadTree {
        self.quad_tree.get_or_init(|| {
            debug_assert_eq!(
                self.quad_tree_in_use.load(Ordering::Acquire),
                0,
                "quad tree rebuilt while in use"
            );
            log::trace!(
                "building terrain quad tree, lod {} ({}x{} cells)",
                self.lod_level,
                self.blocks_width,
                self.blocks_height
            );
            QuadTree::build(self, self.quad_tree_threshold())
        })
    }

    pub fn has_quad_tree(&self) -> bool {
        self.quad_tree.get().is_some()
    }

    /// Захватить квад-дерево на время запроса
    pub(crate) fn use_quad_tree(&self) -> QuadTreeUse<'_> {
        let tree = self.ensure_quad_tree_valid();
        self.quad_tree_in_use.fetch_add(1, Ordering::AcqRel);
        QuadTreeUse { tree, counter: &self.quad_tree_in_use }
    }

    pub fn quad_tree_readers(&self) -> u32 {
        self.quad_tree_in_use.load(Ordering::Acquire)
    }

    fn invalidate_quad_tree(&mut self) {
        debug_assert_eq!(
            self.quad_tree_in_use.load(Ordering::Acquire),
            0,
            "quad tree invalidated while in use"
        );
        self.quad_tree.take();
    }

    fn unlock_after_write(&mut self) {
        self.recalc_min_max();
        self.invalidate_quad_tree();
        if let Some(callback) = &self.unlock_callback {
            callback();
        }
    }
}

/// RAII: счётчик читателей квад-дерева
pub(crate) struct QuadTreeUse<'a> {
    pub tree: &'a QuadTree,
    counter: &'a AtomicU32,
}

impl Drop for QuadTreeUse<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Блокировка карты высот для чтения/редактирования
pub struct HeightMapLock<'a> {
    map: &'a mut TerrainHeightMap2,
    read_only: bool,
}

impl HeightMapLock<'_> {
    pub fn image(&self) -> &HeightGrid {
        &self.map.heights
    }

    /// Доступ на запись; None для блокировки только на чтение
    pub fn image_mut(&mut self) -> Option<&mut HeightGrid> {
        if self.read_only {
            None
        } else {
            Some(&mut self.map.heights)
        }
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }
}

impl Drop for HeightMapLock<'_> {
    fn drop(&mut self) {
        if !self.read_only {
            self.map.unlock_after_write();
        }
    }
}
