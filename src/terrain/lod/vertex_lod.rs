// ============================================
// Terrain Vertex LOD - Выбор вершинного LOD по дистанции
// ============================================
//
// Таблица дистанций: distances[i] - где LOD i сменяется на i+1.
// Последний LOD не переключается.
//
// Блок рядом с границей LOD делится на 4 под-блока:
//   *---+---+    * = начало блока
//   | 0 | 1 |
//   +---+---+
//   | 2 | 3 |
//   +---+---+ +x
//          +z

use ultraviolet::Vec3;

use crate::terrain::settings::TerrainSettings;

/// Дистанция "никогда" для последнего LOD
pub const LAST_LOD_DIST: f32 = 1_000_000.0;

// Направления рёбер, которым нужны вырожденные треугольники
pub const DIRECTION_NEGATIVE_X: u8 = 1;
pub const DIRECTION_POSITIVE_X: u8 = 2;
pub const DIRECTION_NEGATIVE_Z: u8 = 4;
pub const DIRECTION_POSITIVE_Z: u8 = 8;

/// Весь блок рисуется одним LOD
pub const FULL_SUB_BLOCK_MASK: u8 = 0xF;

/// [0] - весь блок, [1..5] - под-блоки 0..3
pub type NeighbourMasks = [u8; 5];

/// Дистанции, на которых вершины плавно переходят к следующему LOD
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MorphRange {
    pub start: f32,
    pub end: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MorphRanges {
    pub main: MorphRange,
    pub sub_block: MorphRange,
}

/// Дистанция блока до камеры и выбранные LOD
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceInfo {
    pub relative_camera_pos: Vec3,
    pub min_distance: f32,
    pub max_distance: f32,
    pub current_vertex_lod: u32,
    pub next_vertex_lod: u32,
}

impl Default for DistanceInfo {
    fn default() -> Self {
        Self {
            relative_camera_pos: Vec3::zero(),
            min_distance: 0.0,
            max_distance: 0.0,
            current_vertex_lod: 0,
            next_vertex_lod: 0,
        }
    }
}

/// Маски под-блоков и соседей для отрисовки без трещин
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LodMasks {
    pub sub_block_mask: u8,
    pub neighbour_masks: NeighbourMasks,
    pub morph_ranges: MorphRanges,
}

/// Проверка ребра между под-блоком и соседним под-блоком снаружи
struct ExternalTest {
    offset: (f32, f32),
    sub_block: usize,
    mask: u8,
}

pub struct TerrainVertexLod {
    /// Исходные дистанции из настроек
    saved_distances: Vec<f32>,
    distances: Vec<f32>,
    block_size: f32,
    start_bias: f32,
    end_bias: f32,
    zoom_factor: f32,
    top_lod: u32,
    constant_lod: bool,
    do_block_split: bool,
}

impl TerrainVertexLod {
    pub fn new(settings: &TerrainSettings) -> Self {
        let mut lod = Self {
            saved_distances: settings.lod_distances.clone(),
            distances: settings.lod_distances.clone(),
            block_size: settings.block_size,
            start_bias: settings.start_bias,
            end_bias: settings.end_bias,
            zoom_factor: settings.zoom_factor,
            top_lod: settings.top_vertex_lod,
            constant_lod: settings.constant_lod,
            do_block_split: settings.do_block_split,
        };
        lod.apply_lod_modifier(1.0);
        lod
    }

    /// Масштабировать таблицу дистанций. Соседние LOD разносятся минимум
    /// на ceil(sqrt(2 * bs^2) / start_bias), иначе блок не успевает
    /// закончить морфинг.
    pub fn apply_lod_modifier(&mut self, modifier: f32) {
        let min_distance = ((2.0 * self.block_size * self.block_size).sqrt() / self.start_bias).ceil();
        let mut last = -min_distance;
        self.distances.clear();

        for (i, saved) in self.saved_distances.iter().enumerate() {
            if i as u32 <= self.top_lod {
                last = -min_distance;
            }
            let mut value = (saved * modifier).floor();
            if value - last < min_distance {
                value = last + min_distance;
            }
            self.distances.push(value);
            last = value;
        }
    }

    /// Число LOD (на один больше, чем дистанций)
    pub fn num_lods(&self) -> u32 {
        self.distances.len() as u32 + 1
    }

    pub fn distances(&self) -> &[f32] {
        &self.distances
    }

    pub fn block_size(&self) -> f32 {
        self.block_size
    }

    pub fn zoom_factor(&self) -> f32 {
        self.zoom_factor
    }

    /// Зум камеры приближает переключения LOD
    pub fn set_zoom_factor(&mut self, zoom: f32) {
        debug_assert!(zoom.abs() > f32::EPSILON, "zoom factor can't be zero");
        if zoom.abs() > f32::EPSILON {
            self.zoom_factor = zoom;
        }
    }

    pub fn top_lod(&self) -> u32 {
        self.top_lod
    }

    pub fn constant_lod(&self) -> bool {
        self.constant_lod
    }

    pub fn set_constant_lod(&mut self, constant: bool) {
        self.constant_lod = constant;
    }

    pub fn set_block_split(&mut self, enabled: bool) {
        self.do_block_split = enabled;
    }

    /// Дистанция, на которой LOD сменяется следующим
    pub fn distance(&self, lod: u32) -> f32 {
        match self.distances.get(lod as usize) {
            Some(d) => d / self.zoom_factor,
            None => LAST_LOD_DIST,
        }
    }

    /// LOD для дистанции блока. Граница не включается в ближний LOD:
    /// d == distances[i] уже даёт LOD i+1.
    pub fn calculate_lod_level(&self, block_distance: f32) -> u32 {
        let d = block_distance * self.zoom_factor;
        let n = self.distances.len() as u32;

        let mut lod = self.top_lod.min(n);
        if !self.constant_lod {
            while lod < n && d >= self.distances[lod as usize] {
                lod += 1;
            }
        }
        lod
    }

    /// Дистанции min/max для принудительно выбранного LOD
    pub fn get_distance_for_lod(&self, lod: u32) -> (f32, f32) {
        let n = self.distances.len() as u32;
        if n == 0 {
            return (LAST_LOD_DIST, LAST_LOD_DIST);
        }
        let lod = lod.min(n - 1);
        let min = self.distances[lod as usize] / self.zoom_factor;
        let max = self.distances[(lod + 1).min(n - 1) as usize] / self.zoom_factor;
        (min, max)
    }

    pub fn calc_morph_range(&self, lod: u32) -> MorphRange {
        let mut start = if lod == 0 { 0.0 } else { self.distance(lod - 1) };
        let mut delta = self.distance(lod) - start;

        if self.constant_lod {
            start = 0.0;
            delta = LAST_LOD_DIST;
        }

        MorphRange {
            start: start + delta * self.start_bias,
            end: start + delta * self.end_bias,
        }
    }

    /// Маски соседей и под-блоков для текущего положения камеры
    pub fn calculate_masks(&self, info: &DistanceInfo) -> LodMasks {
        let bs = self.block_size;
        let cam = info.relative_camera_pos;
        let min_neighbour_distance = bs * std::f32::consts::SQRT_2;
        let block_centre_distance = min_neighbour_distance * 0.5;

        let mut masks = LodMasks {
            morph_ranges: MorphRanges {
                main: self.calc_morph_range(info.current_vertex_lod),
                sub_block: MorphRange::default(),
            },
            ..Default::default()
        };

        let lod_distance = self.distance(info.current_vertex_lod);
        if self.constant_lod || lod_distance > info.min_distance + min_neighbour_distance {
            masks.sub_block_mask = FULL_SUB_BLOCK_MASK;
            return masks;
        }

        let neighbours = [
            (Vec3::new(-bs, 0.0, 0.0), DIRECTION_NEGATIVE_X),
            (Vec3::new(bs, 0.0, 0.0), DIRECTION_POSITIVE_X),
            (Vec3::new(0.0, 0.0, -bs), DIRECTION_NEGATIVE_Z),
            (Vec3::new(0.0, 0.0, bs), DIRECTION_POSITIVE_Z),
        ];
        for (corner, direction) in neighbours {
            if xz_distance(corner, bs, cam) > lod_distance {
                masks.neighbour_masks[0] |= direction;
            }
        }

        if info.current_vertex_lod < 2
            && masks.neighbour_masks[0] != 0
            && lod_distance < info.min_distance + block_centre_distance
            && self.do_block_split
        {
            masks.morph_ranges.sub_block = self.calc_morph_range(info.current_vertex_lod + 1);

            let half = bs * 0.5;
            let offsets = [(0.0, 0.0), (half, 0.0), (0.0, half), (half, half)];
            for (i, (x, z)) in offsets.iter().enumerate() {
                if xz_distance(Vec3::new(*x, 0.0, *z), half, cam) < lod_distance {
                    masks.sub_block_mask |= 1 << i;
                }
            }

            if masks.sub_block_mask != FULL_SUB_BLOCK_MASK {
                internal_sub_block_tests(&mut masks.neighbour_masks, masks.sub_block_mask);
            }
        } else {
            masks.sub_block_mask = FULL_SUB_BLOCK_MASK;
        }

        self.external_sub_block_tests(
            info.current_vertex_lod,
            masks.sub_block_mask,
            cam,
            &mut masks.neighbour_masks,
        );
        masks
    }

    /// Рёбра под-блоков, граничащих с соседними блоками
    fn external_sub_block_tests(
        &self,
        main_lod: u32,
        sub_block_mask: u8,
        cam: Vec3,
        neighbour_masks: &mut NeighbourMasks,
    ) {
        // Соседние под-блоки снаружи, по часовой от -X:
        //       |nz |
        //       |2 3|
        //   ----+-+-+----
        //  nx 1 |0|1| 4 px
        //     0 |2|3| 5
        //   ----+---+----
        //       |7 6|
        //       |pz |
        let h = self.block_size * 0.5;
        let tests = [
            ExternalTest { offset: (-h, 0.0), sub_block: 0, mask: DIRECTION_NEGATIVE_X },
            ExternalTest { offset: (-h, h), sub_block: 2, mask: DIRECTION_NEGATIVE_X },
            ExternalTest { offset: (0.0, -h), sub_block: 0, mask: DIRECTION_NEGATIVE_Z },
            ExternalTest { offset: (h, -h), sub_block: 1, mask: DIRECTION_NEGATIVE_Z },
            ExternalTest { offset: (2.0 * h, 0.0), sub_block: 1, mask: DIRECTION_POSITIVE_X },
            ExternalTest { offset: (2.0 * h, h), sub_block: 3, mask: DIRECTION_POSITIVE_X },
            ExternalTest { offset: (h, 2.0 * h), sub_block: 3, mask: DIRECTION_POSITIVE_Z },
            ExternalTest { offset: (0.0, 2.0 * h), sub_block: 2, mask: DIRECTION_POSITIVE_Z },
        ];

        let main_distance = self.distance(main_lod);
        let sub_distance = self.distance(main_lod + 1);

        for test in &tests {
            let our_distance = if sub_block_mask & (1 << test.sub_block) != 0 {
                main_distance
            } else {
                sub_distance
            };
            let corner = Vec3::new(test.offset.0, 0.0, test.offset.1);
            if xz_distance(corner, h, cam) > our_distance {
                neighbour_masks[1 + test.sub_block] |= test.mask;
            }
        }
    }
}

/// Рёбра между под-блоками разных LOD внутри блока
pub fn internal_sub_block_tests(neighbour_masks: &mut NeighbourMasks, sub_block_mask: u8) {
    let bit = |i: u8| sub_block_mask & (1 << i) != 0;

    // Под-блок 0 против 1 (по X) и 2 (по Z)
    let my = bit(0);
    if my != bit(1) {
        if my {
            neighbour_masks[1] |= DIRECTION_POSITIVE_X;
        } else {
            neighbour_masks[2] |= DIRECTION_NEGATIVE_X;
        }
    }
    if my != bit(2) {
        if my {
            neighbour_masks[1] |= DIRECTION_POSITIVE_Z;
        } else {
            neighbour_masks[3] |= DIRECTION_NEGATIVE_Z;
        }
    }

    // Под-блок 3 против 1 (по Z) и 2 (по X)
    let my = bit(3);
    if my != bit(1) {
        if my {
            neighbour_masks[4] |= DIRECTION_NEGATIVE_Z;
        } else {
            neighbour_masks[2] |= DIRECTION_POSITIVE_Z;
        }
    }
    if my != bit(2) {
        if my {
            neighbour_masks[4] |= DIRECTION_NEGATIVE_X;
        } else {
            neighbour_masks[3] |= DIRECTION_POSITIVE_X;
        }
    }
}

/// Дистанция по XZ от камеры до квадрата [corner, corner + size]
pub fn xz_distance(corner: Vec3, size: f32, camera: Vec3) -> f32 {
    let mut vx = camera.x - corner.x;
    let mut vz = camera.z - corner.z;

    if vx > size {
        vx -= size;
    } else if vx > 0.0 {
        vx = 0.0;
    }
    if vz > size {
        vz -= size;
    } else if vz > 0.0 {
        vz = 0.0;
    }
    (vx * vx + vz * vz).sqrt()
}

/// Ближняя и дальняя точки блока [0, size] по XZ от камеры
pub fn min_max_xz_distance(relative_camera_pos: Vec3, block_size: f32) -> (f32, f32) {
    let half = block_size * 0.5;

    let axis = |c: f32| -> (f32, f32) {
        if c > block_size {
            (c - block_size, c)
        } else if c > 0.0 {
            (0.0, (c - half).abs() + half)
        } else {
            (c, c - block_size)
        }
    };

    let (min_x, max_x) = axis(relative_camera_pos.x);
    let (min_z, max_z) = axis(relative_camera_pos.z);

    (
        (min_x * min_x + min_z * min_z).sqrt(),
        (max_x * max_x + max_z * max_z).sqrt(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_128() -> TerrainSettings {
        TerrainSettings {
            height_map_size: 128,
            lod_distances: vec![200.0, 400.0, 600.0, 800.0, 1200.0, 1600.0],
            ..TerrainSettings::default()
        }
        .validated()
        .unwrap()
    }

    #[test]
    fn test_boundary_distance_selects_next_lod() {
        let lod = TerrainVertexLod::new(&settings_128());
        assert_eq!(lod.num_lods(), 7);
        let d2 = lod.distances()[2];
        assert_eq!(lod.calculate_lod_level(d2), 3);
        assert_eq!(lod.calculate_lod_level(d2 - 0.01), 2);
        assert_eq!(lod.calculate_lod_level(1.0e9), 6);
    }

    #[test]
    fn test_lod_monotonic_with_distance() {
        let lod = TerrainVertexLod::new(&settings_128());
        for w in lod.distances().windows(2) {
            assert!(w[0] < w[1]);
        }
        let mut last = 0;
        for step in 0..400 {
            let level = lod.calculate_lod_level(step as f32 * 5.0);
            assert!(level >= last);
            last = level;
        }
    }

    #[test]
    fn test_modifier_keeps_min_gap() {
        let mut lod = TerrainVertexLod::new(&settings_128());
        lod.apply_lod_modifier(0.1);
        let min_gap = ((2.0f32 * 100.0 * 100.0).sqrt() / 0.75).ceil();
        for w in lod.distances().windows(2) {
            assert!(w[1] - w[0] >= min_gap - 1e-3);
        }
        assert_eq!(lod.distances()[0], 20.0);
    }

    #[test]
    fn test_zoom_scales_distances() {
        let mut lod = TerrainVertexLod::new(&settings_128());
        lod.set_zoom_factor(2.0);
        assert_eq!(lod.distance(0), lod.distances()[0] / 2.0);
        assert_eq!(lod.distance(10), LAST_LOD_DIST);
        let (lo, hi) = lod.get_distance_for_lod(9);
        assert_eq!(lo, hi);
    }

    #[test]
    fn test_morph_range_between_lods() {
        let lod = TerrainVertexLod::new(&settings_128());
        let r = lod.calc_morph_range(1);
        let start = lod.distance(0);
        let delta = lod.distance(1) - start;
        assert!((r.start - (start + delta * 0.75)).abs() < 1e-3);
        assert!((r.end - (start + delta * 0.85)).abs() < 1e-3);
    }

    #[test]
    fn test_internal_sub_block_masks() {
        let run = |mask: u8| {
            let mut nm = NeighbourMasks::default();
            internal_sub_block_tests(&mut nm, mask);
            nm
        };

        assert_eq!(run(0x0), [0; 5]);
        assert_eq!(run(0xF), [0; 5]);

        let nm = run(0x1);
        assert_eq!(nm[0], 0);
        assert_eq!(nm[1], DIRECTION_POSITIVE_X | DIRECTION_POSITIVE_Z);
        assert_eq!(&nm[2..], &[0, 0, 0]);

        let nm = run(0x3);
        assert_eq!(nm, [0, DIRECTION_POSITIVE_Z, DIRECTION_POSITIVE_Z, 0, 0]);

        let nm = run(0x7);
        assert_eq!(nm, [0, 0, DIRECTION_POSITIVE_Z, DIRECTION_POSITIVE_X, 0]);

        let nm = run(0x8);
        assert_eq!(nm, [0, 0, 0, 0, DIRECTION_NEGATIVE_X | DIRECTION_NEGATIVE_Z]);
    }

    #[test]
    fn test_xz_distance_inside_is_zero() {
        let cam = Vec3::new(50.0, 30.0, 50.0);
        assert_eq!(xz_distance(Vec3::zero(), 100.0, cam), 0.0);
        assert_eq!(xz_distance(Vec3::new(100.0, 0.0, 0.0), 100.0, cam), 50.0);

        let (min, max) = min_max_xz_distance(Vec3::new(-30.0, 0.0, 40.0), 100.0);
        assert!((min - 30.0).abs() < 1e-4);
        let expected_max = (130.0f32 * 130.0 + 60.0 * 60.0).sqrt();
        assert!((max - expected_max).abs() < 1e-3);
    }

    #[test]
    fn test_far_block_draws_whole() {
        let lod = TerrainVertexLod::new(&settings_128());
        let info = DistanceInfo {
            relative_camera_pos: Vec3::new(-1000.0, 0.0, 50.0),
            min_distance: 1000.0,
            max_distance: 1100.0,
            current_vertex_lod: lod.calculate_lod_level(1000.0),
            next_vertex_lod: 6,
        };
        let masks = lod.calculate_masks(&info);
        assert_eq!(masks.sub_block_mask, FULL_SUB_BLOCK_MASK);
    }

    #[test]
    fn test_block_near_boundary_splits() {
        let lod = TerrainVertexLod::new(&settings_128());
        // Камера за -X гранью блока, почти на дистанции LOD0
        let d0 = lod.distance(0);
        let cam = Vec3::new(-(d0 - 10.0), 0.0, 10.0);
        let (min, max) = min_max_xz_distance(cam, 100.0);
        let info = DistanceInfo {
            relative_camera_pos: cam,
            min_distance: min,
            max_distance: max,
            current_vertex_lod: lod.calculate_lod_level(min),
            next_vertex_lod: 1,
        };
        assert_eq!(info.current_vertex_lod, 0);

        let masks = lod.calculate_masks(&info);
        // Ближние к камере под-блоки 0 и 2 остаются в LOD0
        assert_eq!(masks.sub_block_mask & 0b0101, 0b0101);
        assert_ne!(masks.sub_block_mask, FULL_SUB_BLOCK_MASK);
        assert!(masks.neighbour_masks[0] & DIRECTION_POSITIVE_X != 0);
    }
}
