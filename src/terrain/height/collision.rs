// ============================================
// Terrain Collision - Столкновения с картой высот
// ============================================
//
// Короткие запросы идут по сетке напрямую (DDA), длинные - через
// квад-дерево. Каждая ячейка проверяется двумя треугольниками с той же
// диагональю, что и в height_at().

use ultraviolet::Vec3;

use crate::terrain::math::{BoundingBox, WorldTriangle};

use super::height_map::TerrainHeightMap2;

/// Раздвижка треугольников ячейки, чтобы луч не проскальзывал по рёбрам
pub const EXTEND_BIAS: f32 = 0.001;

const BOUNDING_BOX_EPSILON: f32 = 0.1;
const HEIGHTMAP_COLLISION_EPSILON: f32 = 0.0001;

/// Получатель столкновений. `dist` - расстояние от начала отрезка
/// (для призмы всегда 0). Вернуть true, чтобы остановить обход.
pub trait TerrainCollisionCallback {
    fn collide(&mut self, triangle: &WorldTriangle, dist: f32) -> bool;
}

/// Ближайшее попадание. Обход идёт от начала отрезка, поэтому
/// останавливаемся на первом.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClosestHit {
    pub hit: Option<(WorldTriangle, f32)>,
}

impl ClosestHit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn distance(&self) -> Option<f32> {
        self.hit.map(|(_, d)| d)
    }
}

impl TerrainCollisionCallback for ClosestHit {
    fn collide(&mut self, triangle: &WorldTriangle, dist: f32) -> bool {
        match self.hit {
            Some((_, best)) if best <= dist => {}
            _ => self.hit = Some((*triangle, dist)),
        }
        true
    }
}

/// Все задетые треугольники
#[derive(Debug, Default)]
pub struct TriangleCollector {
    pub triangles: Vec<WorldTriangle>,
}

impl TerrainCollisionCallback for TriangleCollector {
    fn collide(&mut self, triangle: &WorldTriangle, _dist: f32) -> bool {
        self.triangles.push(*triangle);
        false
    }
}

/// Настройки одного запроса
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollisionOptions {
    /// Быстрый проход по строке сетки для отрезков с постоянным z
    pub along_z_axis: bool,
    /// Всегда идти по сетке, не строя квад-дерево
    pub disable_quad_tree: bool,
}

/// Прямоугольник ячеек [x0, x1) x [z0, z1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub x0: i32,
    pub z0: i32,
    pub x1: i32,
    pub z1: i32,
}

impl CellRange {
    pub fn new(x0: i32, z0: i32, x1: i32, z1: i32) -> Self {
        Self { x0, z0, x1, z1 }
    }

    #[inline]
    pub fn contains(&self, x: i32, z: i32) -> bool {
        x >= self.x0 && x < self.x1 && z >= self.z0 && z < self.z1
    }

    pub fn intersection(&self, other: &CellRange) -> CellRange {
        CellRange::new(
            self.x0.max(other.x0),
            self.z0.max(other.z0),
            self.x1.min(other.x1),
            self.z1.min(other.z1),
        )
    }
}

#[inline]
fn almost_equal(a: f32, b: f32, epsilon: f32) -> bool {
    (a - b).abs() < epsilon
}

impl TerrainHeightMap2 {
    /// Все ячейки видимой части
    pub fn cell_range(&self) -> CellRange {
        CellRange::new(0, 0, self.blocks_width() as i32, self.blocks_height() as i32)
    }

    /// Два треугольника ячейки в координатах блока
    pub fn cell_triangles(&self, x: i32, z: i32) -> (WorldTriangle, WorldTriangle) {
        let sx = self.spacing_x();
        let sz = self.spacing_z();

        let bottom_left = Vec3::new(x as f32 * sx, self.height_at_vertex(x, z), z as f32 * sz);
        let bottom_right =
            Vec3::new((x + 1) as f32 * sx, self.height_at_vertex(x + 1, z), z as f32 * sz);
        let top_left =
            Vec3::new(x as f32 * sx, self.height_at_vertex(x, z + 1), (z + 1) as f32 * sz);
        let top_right = Vec3::new(
            (x + 1) as f32 * sx,
            self.height_at_vertex(x + 1, z + 1),
            (z + 1) as f32 * sz,
        );

        if (x ^ z) & 1 != 0 {
            (
                WorldTriangle::new(bottom_left, top_left, bottom_right),
                WorldTriangle::new(top_left, top_right, bottom_right),
            )
        } else {
            (
                WorldTriangle::new(bottom_left, top_left, top_right),
                WorldTriangle::new(top_right, bottom_right, bottom_left),
            )
        }
    }

    /// Столкновение отрезка с ландшафтом. true если обход остановлен.
    pub fn collide(
        &self,
        start: Vec3,
        end: Vec3,
        callback: &mut dyn TerrainCollisionCallback,
    ) -> bool {
        self.collide_with_options(start, end, CollisionOptions::default(), callback)
    }

    pub fn collide_with_options(
        &self,
        start: Vec3,
        end: Vec3,
        options: CollisionOptions,
        callback: &mut dyn TerrainCollisionCallback,
    ) -> bool {
        if self.is_empty() || self.blocks_width() == 0 {
            return false;
        }

        if options.along_z_axis
            && almost_equal(start.z, end.z, HEIGHTMAP_COLLISION_EPSILON)
            && !almost_equal(start.x, end.x, HEIGHTMAP_COLLISION_EPSILON)
        {
            return self.collide_along_z_axis(start, end, callback);
        }

        let threshold = self.quad_tree_threshold();
        let x_dist = (end.x - start.x).abs();
        let z_dist = (end.z - start.z).abs();

        if (x_dist < threshold && z_dist < threshold) || options.disable_quad_tree {
            return self.grid_collide(start, end, callback);
        }

        let guard = self.use_quad_tree();
        guard.tree.collide(self, start, end, callback)
    }

    /// Столкновение призмы: треугольник `prism`, сдвинутый так,
    /// что его v0 приходит в `end`
    pub fn collide_prism(
        &self,
        prism: &WorldTriangle,
        end: Vec3,
        callback: &mut dyn TerrainCollisionCallback,
    ) -> bool {
        self.collide_prism_with_options(prism, end, CollisionOptions::default(), callback)
    }

    pub fn collide_prism_with_options(
        &self,
        prism: &WorldTriangle,
        end: Vec3,
        options: CollisionOptions,
        callback: &mut dyn TerrainCollisionCallback,
    ) -> bool {
        if self.is_empty() || self.blocks_width() == 0 {
            return false;
        }

        let delta = end - prism.v0;
        let mut bb = prism.bounds();
        let start_size = bb.size();
        bb.add_bounds(end);
        bb.add_bounds(prism.v1 + delta);
        bb.add_bounds(prism.v2 + delta);

        let threshold = self.quad_tree_threshold();
        let short = delta.x.abs() < threshold
            && delta.z.abs() < threshold
            && start_size.x.abs() < threshold
            && start_size.z.abs() < threshold;

        if short || options.disable_quad_tree {
            let range = self.prism_cells(&bb);
            return self.collide_prism_cells(prism, end, range, callback);
        }

        let guard = self.use_quad_tree();
        guard.tree.collide_prism(self, prism, end, &bb, callback)
    }

    /// Ячейки, покрывающие XZ бокс призмы
    pub(crate) fn prism_cells(&self, bb: &BoundingBox) -> CellRange {
        let x_mul = 1.0 / self.spacing_x();
        let z_mul = 1.0 / self.spacing_z();
        CellRange::new(
            (bb.min.x * x_mul) as i32,
            (bb.min.z * z_mul) as i32,
            (bb.max.x * x_mul).ceil() as i32,
            (bb.max.z * z_mul).ceil() as i32,
        )
    }

    pub(crate) fn collide_prism_cells(
        &self,
        prism: &WorldTriangle,
        end: Vec3,
        range: CellRange,
        callback: &mut dyn TerrainCollisionCallback,
    ) -> bool {
        for z in range.z0..range.z1 {
            for x in range.x0..range.x1 {
                if self.check_cell_prism(x, z, prism, end, callback) {
                    return true;
                }
            }
        }
        false
    }

    /// Обход сетки по отрезку, обрезанному боксом всей карты
    fn grid_collide(
        &self,
        start: Vec3,
        end: Vec3,
        callback: &mut dyn TerrainCollisionCallback,
    ) -> bool {
        let bb = BoundingBox::new(
            Vec3::new(0.0, self.min_height(), 0.0),
            Vec3::new(self.block_size(), self.max_height(), self.block_size()),
        );
        let mut s = start;
        let mut e = end;
        if !bb.clip(&mut s, &mut e, BOUNDING_BOX_EPSILON) {
            return false;
        }
        self.walk_segment(start, end, s, e, self.cell_range(), callback)
    }

    /// DDA по ячейкам от `clip_start` до `clip_end` (мировые координаты).
    /// Треугольники проверяются полным отрезком `origin` -> `end`.
    pub(crate) fn walk_segment(
        &self,
        origin: Vec3,
        end: Vec3,
        clip_start: Vec3,
        clip_end: Vec3,
        range: CellRange,
        callback: &mut dyn TerrainCollisionCallback,
    ) -> bool {
        let align_x = self.blocks_width() as f32 / self.block_size();
        let align_z = self.blocks_height() as f32 / self.block_size();

        let mut s = Vec3::new(clip_start.x * align_x, clip_start.y, clip_start.z * align_z);
        let e = Vec3::new(clip_end.x * align_x, clip_end.y, clip_end.z * align_z);

        let mut dir = e - s;
        let xz_len = (dir.x * dir.x + dir.z * dir.z).sqrt();
        if xz_len > f32::EPSILON {
            dir = dir / xz_len;
        }

        let mut grid_x = s.x.floor() as i32;
        let mut grid_z = s.z.floor() as i32;
        let grid_end_x = e.x.floor() as i32;
        let grid_end_z = e.z.floor() as i32;

        let grid_dir_x = if dir.x < 0.0 { -1 } else if dir.x > 0.0 { 1 } else { 0 };
        let grid_dir_z = if dir.z < 0.0 { -1 } else if dir.z > 0.0 { 1 } else { 0 };

        // Каждый шаг сдвигает ячейку к концу или обрывает отрезок
        let mut steps_left = (grid_end_x - grid_x).abs() + (grid_end_z - grid_z).abs() + 2;

        while steps_left > 0
            && ((grid_x != grid_end_x && !almost_equal(s.x, e.x, HEIGHTMAP_COLLISION_EPSILON))
                || (grid_z != grid_end_z
                    && !almost_equal(s.z, e.z, HEIGHTMAP_COLLISION_EPSILON)))
        {
            steps_left -= 1;
            if self.check_cell_segment(grid_x, grid_z, range, origin, end, callback) {
                return true;
            }

            let x_dist_next = if grid_dir_x < 0 {
                grid_x as f32 - s.x
            } else {
                (grid_x + 1) as f32 - s.x
            };
            let x_dist_end = e.x - s.x;
            let x_ending = x_dist_end.abs() < x_dist_next.abs();
            let x_dist = if x_ending { x_dist_end } else { x_dist_next };

            let z_dist_next = if grid_dir_z < 0 {
                grid_z as f32 - s.z
            } else {
                (grid_z + 1) as f32 - s.z
            };
            let z_dist_end = e.z - s.z;
            let z_ending = z_dist_end.abs() < z_dist_next.abs();
            let z_dist = if z_ending { z_dist_end } else { z_dist_next };

            let a = x_dist / dir.x;
            let b = z_dist / dir.z;

            if grid_dir_z == 0 || a < b {
                if x_ending {
                    s = e;
                } else {
                    grid_x += grid_dir_x;
                    s += dir * a;
                }
            } else if z_ending {
                s = e;
            } else {
                grid_z += grid_dir_z;
                s += dir * b;
            }
        }

        self.check_cell_segment(grid_x, grid_z, range, origin, end, callback)
    }

    /// Отрезок с постоянным z: одна строка ячеек, ячейки целиком ниже
    /// отрезка пропускаются без проверки треугольников
    fn collide_along_z_axis(
        &self,
        start: Vec3,
        end: Vec3,
        callback: &mut dyn TerrainCollisionCallback,
    ) -> bool {
        let bb = BoundingBox::new(
            Vec3::new(0.0, self.min_height(), 0.0),
            Vec3::new(self.block_size(), self.max_height(), self.block_size()),
        );
        let mut s = start;
        let mut e = end;
        if !bb.clip(&mut s, &mut e, BOUNDING_BOX_EPSILON) {
            return false;
        }

        let align_x = self.blocks_width() as f32 / self.block_size();
        let align_z = self.blocks_height() as f32 / self.block_size();

        let mut grid_x = (s.x * align_x).floor() as i32;
        let grid_dir_x = if e.x - s.x < 0.0 { -1 } else { 1 };
        let grid_end_x = (e.x * align_x).floor() as i32 + grid_dir_x;
        let grid_z = (s.z * align_z).floor() as i32;

        let range = self.cell_range();
        let slope = (end.y - start.y) / (end.x - start.x);
        let y_at = |x: f32| start.y + (x - start.x) * slope;
        let sx = self.spacing_x();

        while grid_x != grid_end_x {
            if range.contains(grid_x, grid_z) {
                let min_y = y_at(grid_x as f32 * sx).min(y_at((grid_x + 1) as f32 * sx));
                let below = [(0, 0), (1, 0), (0, 1), (1, 1)]
                    .iter()
                    .all(|&(dx, dz)| self.height_at_vertex(grid_x + dx, grid_z + dz) < min_y);

                if !below
                    && self.check_cell_segment(grid_x, grid_z, range, start, end, callback)
                {
                    return true;
                }
            }
            grid_x += grid_dir_x;
        }
        false
    }

    /// Проверить оба треугольника ячейки, ближнее попадание первым
    fn check_cell_segment(
        &self,
        x: i32,
        z: i32,
        range: CellRange,
        start: Vec3,
        end: Vec3,
        callback: &mut dyn TerrainCollisionCallback,
    ) -> bool {
        if !range.contains(x, z) || !self.cell_range().contains(x, z) {
            return false;
        }

        let delta = end - start;
        let dist = delta.mag();
        if dist <= f32::EPSILON {
            return false;
        }
        let dir = delta / dist;

        let (tri_a, tri_b) = self.cell_triangles(x, z);
        let hit_a = tri_a.extended(EXTEND_BIAS).intersects_ray(start, dir, dist);
        let hit_b = tri_b.extended(EXTEND_BIAS).intersects_ray(start, dir, dist);

        match (hit_a, hit_b) {
            (Some(da), Some(db)) => {
                if da <= db {
                    callback.collide(&tri_a, da) || callback.collide(&tri_b, db)
                } else {
                    callback.collide(&tri_b, db) || callback.collide(&tri_a, da)
                }
            }
            (Some(da), None) => callback.collide(&tri_a, da),
            (None, Some(db)) => callback.collide(&tri_b, db),
            (None, None) => false,
        }
    }

    fn check_cell_prism(
        &self,
        x: i32,
        z: i32,
        prism: &WorldTriangle,
        end: Vec3,
        callback: &mut dyn TerrainCollisionCallback,
    ) -> bool {
        if !self.cell_range().contains(x, z) {
            return false;
        }
        let delta = end - prism.v0;
        let (tri_a, tri_b) = self.cell_triangles(x, z);

        if tri_a.intersects_prism(prism, delta) && callback.collide(&tri_a, 0.0) {
            return true;
        }
        tri_b.intersects_prism(prism, delta) && callback.collide(&tri_b, 0.0)
    }

    /// Плотный перебор ячеек под коротким (почти вертикальным) отрезком.
    /// Возвращает расстояние до первого попадания и нормаль треугольника.
    pub fn collide_short_segment(&self, start: Vec3, dir: Vec3, dist: f32) -> Option<(f32, Vec3)> {
        if self.is_empty() || self.blocks_width() == 0 {
            return None;
        }
        let end = start + dir * dist;

        let align_x = self.blocks_width() as f32 / self.block_size();
        let align_z = self.blocks_height() as f32 / self.block_size();

        let (mut beg_x, mut end_x) = ((start.x * align_x) as i32, (end.x * align_x) as i32);
        let (mut beg_z, mut end_z) = ((start.z * align_z) as i32, (end.z * align_z) as i32);
        if beg_x > end_x {
            std::mem::swap(&mut beg_x, &mut end_x);
        }
        if beg_z > end_z {
            std::mem::swap(&mut beg_z, &mut end_z);
        }
        beg_x = beg_x.max(0);
        beg_z = beg_z.max(0);
        end_x = end_x.min(self.blocks_width() as i32 - 1);
        end_z = end_z.min(self.blocks_height() as i32 - 1);

        let sx = self.spacing_x();
        let sz = self.spacing_z();
        let vertex = |x: i32, z: i32| {
            Vec3::new(x as f32 * sx, self.height_at_vertex(x, z), z as f32 * sz)
        };

        for grid_z in beg_z..=end_z {
            for grid_x in beg_x..=end_x {
                let bottom_left = vertex(grid_x, grid_z);
                let bottom_right = vertex(grid_x + 1, grid_z);
                let top_left = vertex(grid_x, grid_z + 1);
                let top_right = vertex(grid_x + 1, grid_z + 1);

                let hit = if (grid_x ^ grid_z) & 1 != 0 {
                    segment_cell_intersection(
                        start, end, bottom_right, top_left, top_right, bottom_left,
                    )
                } else {
                    segment_cell_intersection(
                        start, end, bottom_left, top_right, bottom_right, top_left,
                    )
                };

                if let Some((t, normal)) = hit {
                    let normal = if normal.mag_sq() > 0.0 { normal.normalized() } else { normal };
                    return Some((t * dist, normal));
                }
            }
        }
        None
    }

    /// Треугольники ячеек, которые могут пересекаться с боксом
    pub fn visit_triangles(&self, bb: &BoundingBox, mut visitor: impl FnMut(&WorldTriangle)) {
        if self.is_empty() || self.blocks_width() == 0 || bb.is_empty() {
            return;
        }
        let range = self.prism_cells(bb).intersection(&self.cell_range());

        for z in range.z0..range.z1 {
            for x in range.x0..range.x1 {
                let (tri_a, tri_b) = self.cell_triangles(x, z);
                for tri in [tri_a, tri_b] {
                    let tb = tri.bounds();
                    if tb.max.y >= bb.min.y && tb.min.y <= bb.max.y {
                        visitor(&tri);
                    }
                }
            }
        }
    }
}

/// Пересечение отрезка с парой треугольников ячейки, делящих ребро
/// adj1-adj2. Возвращает параметр t в [0, 1] и ненормированную нормаль.
fn segment_cell_intersection(
    seg_start: Vec3,
    seg_stop: Vec3,
    adj1: Vec3,
    adj2: Vec3,
    pre: Vec3,
    post: Vec3,
) -> Option<(f32, Vec3)> {
    let seg_delta = seg_start - seg_stop;
    let adj1_to_start = seg_start - adj1;
    let adj_edge = adj2 - adj1;

    let e = seg_delta.cross(adj1_to_start);
    let mut v = adj_edge.dot(e);

    let (normal, d, t) = if v >= 0.0 {
        let other_edge = post - adj1;
        let normal = other_edge.cross(adj_edge);
        let d = seg_delta.dot(normal);
        if d < 0.0 || v > d {
            return None;
        }
        let w = -other_edge.dot(e);
        if w < 0.0 || w + v > d {
            return None;
        }
        (normal, d, adj1_to_start.dot(normal))
    } else {
        v = -v;
        let other_edge = pre - adj1;
        let normal = adj_edge.cross(other_edge);
        let d = seg_delta.dot(normal);
        if d < 0.0 || v > d {
            return None;
        }
        let w = other_edge.dot(e);
        if w < 0.0 || w + v > d {
            return None;
        }
        (normal, d, adj1_to_start.dot(normal))
    };

    if t < 0.0 || t > d || d <= 0.0 {
        return None;
    }
    Some((t / d, normal))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_map(height: f32) -> TerrainHeightMap2 {
        let mut map = TerrainHeightMap2::new(64.0, 0, 1);
        map.create(64).unwrap();
        {
            let mut lock = map.lock(false);
            lock.image_mut().unwrap().fill(height);
        }
        map
    }

    fn hilly_map() -> TerrainHeightMap2 {
        let mut map = TerrainHeightMap2::new(64.0, 0, 1);
        map.create(64).unwrap();
        {
            let mut lock = map.lock(false);
            let image = lock.image_mut().unwrap();
            for z in 0..image.height() {
                for x in 0..image.width() {
                    let h = (x as f32 * 0.21).sin() * 3.0 + (z as f32 * 0.13).cos() * 2.0;
                    image.set(x, z, h);
                }
            }
        }
        map
    }

    #[test]
    fn test_long_segment_hits_flat_ground() {
        let map = flat_map(5.0);
        let start = Vec3::new(1.3, 10.0, 0.7);
        let end = Vec3::new(61.3, 0.0, 60.7);
        let expected = (end - start).mag() * 0.5;

        let mut quad = ClosestHit::new();
        assert!(map.collide(start, end, &mut quad));
        assert!(map.has_quad_tree());
        assert!((quad.distance().unwrap() - expected).abs() < 1e-2);

        let mut grid = ClosestHit::new();
        let options = CollisionOptions { disable_quad_tree: true, ..Default::default() };
        assert!(map.collide_with_options(start, end, options, &mut grid));
        assert!((grid.distance().unwrap() - expected).abs() < 1e-2);
        assert_eq!(map.quad_tree_readers(), 0);
    }

    #[test]
    fn test_concurrent_quad_tree_readers() {
        use std::sync::Arc;

        let map = Arc::new(hilly_map());
        let start = Vec3::new(2.2, 12.0, 3.1);
        let end = Vec3::new(58.7, -8.0, 49.3);
        let options = CollisionOptions { disable_quad_tree: true, ..Default::default() };
        let mut reference = ClosestHit::new();
        map.collide_with_options(start, end, options, &mut reference);
        let expected = reference.distance().unwrap();
        assert!(!map.has_quad_tree());

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let map = map.clone();
                std::thread::spawn(move || {
                    let mut hits = 0;
                    for _ in 0..200 {
                        let mut hit = ClosestHit::new();
                        if map.collide(start, end, &mut hit) {
                            assert!((hit.distance().unwrap() - expected).abs() < 1e-3);
                            hits += 1;
                        }
                    }
                    hits
                })
            })
            .collect();

        let hits: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();
        assert_eq!(hits, 8 * 200);
        assert!(map.has_quad_tree());
        assert_eq!(map.quad_tree_readers(), 0);
    }

    #[test]
    fn test_quad_tree_matches_grid_walk() {
        let map = hilly_map();
        let options = CollisionOptions { disable_quad_tree: true, ..Default::default() };
        let rays = [
            (Vec3::new(2.2, 12.0, 3.1), Vec3::new(58.7, -8.0, 49.3)),
            (Vec3::new(60.1, 9.0, 2.4), Vec3::new(5.3, -7.0, 61.9)),
            (Vec3::new(30.5, 20.0, 62.2), Vec3::new(31.7, -20.0, 1.1)),
        ];
        for (start, end) in rays {
            let mut quad = ClosestHit::new();
            let mut grid = ClosestHit::new();
            map.collide(start, end, &mut quad);
            map.collide_with_options(start, end, options, &mut grid);
            let (q, g) = (quad.distance().unwrap(), grid.distance().unwrap());
            assert!((q - g).abs() < 1e-3, "{} vs {}", q, g);
        }
    }

    #[test]
    fn test_segment_above_terrain_misses() {
        let map = hilly_map();
        let mut hit = ClosestHit::new();
        assert!(!map.collide(Vec3::new(1.0, 50.0, 1.0), Vec3::new(63.0, 50.0, 63.0), &mut hit));
        assert!(hit.hit.is_none());
    }

    #[test]
    fn test_along_z_axis_walk_agrees() {
        let map = flat_map(2.0);
        let start = Vec3::new(3.3, 6.0, 20.4);
        let end = Vec3::new(43.3, -2.0, 20.4);

        let mut fast = ClosestHit::new();
        let options = CollisionOptions { along_z_axis: true, ..Default::default() };
        assert!(map.collide_with_options(start, end, options, &mut fast));

        let mut plain = ClosestHit::new();
        assert!(map.collide(start, end, &mut plain));
        assert!((fast.distance().unwrap() - plain.distance().unwrap()).abs() < 1e-3);
    }

    #[test]
    fn test_short_segment_returns_distance_and_normal() {
        let map = flat_map(5.0);
        let (dist, normal) = map
            .collide_short_segment(Vec3::new(10.3, 10.0, 10.7), Vec3::new(0.0, -1.0, 0.0), 20.0)
            .unwrap();
        assert!((dist - 5.0).abs() < 1e-4);
        assert!((normal.y - 1.0).abs() < 1e-5);

        let odd = map
            .collide_short_segment(Vec3::new(11.6, 10.0, 10.2), Vec3::new(0.0, -1.0, 0.0), 20.0)
            .unwrap();
        assert!((odd.0 - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_prism_drop_hits_ground() {
        let map = flat_map(1.0);
        let prism = WorldTriangle::new(
            Vec3::new(10.2, 4.0, 10.2),
            Vec3::new(10.8, 4.0, 10.3),
            Vec3::new(10.3, 4.0, 10.9),
        );
        let mut collector = TriangleCollector::default();
        map.collide_prism(&prism, Vec3::new(10.2, -1.0, 10.2), &mut collector);
        assert!(!collector.triangles.is_empty());

        let mut miss = TriangleCollector::default();
        map.collide_prism(&prism, Vec3::new(10.2, 3.0, 10.2), &mut miss);
        assert!(miss.triangles.is_empty());
    }

    #[test]
    fn test_visit_triangles_under_box() {
        let map = flat_map(0.0);
        let bb = BoundingBox::new(Vec3::new(2.5, -1.0, 2.5), Vec3::new(4.5, 1.0, 3.5));
        let mut count = 0;
        map.visit_triangles(&bb, |_| count += 1);
        // Ячейки x 2..5, z 2..4 по два треугольника
        assert_eq!(count, 3 * 2 * 2);
    }
}
