// ============================================
// Height Map Quad Tree - Квад-дерево боксов над сеткой высот
// ============================================
//
// Плоский массив узлов, дети узла лежат подряд (4 штуки).
// Строится один раз на карту и дальше только читается.

use ultraviolet::Vec3;

use crate::terrain::math::{BoundingBox, WorldTriangle};

use super::collision::{CellRange, TerrainCollisionCallback};
use super::height_map::TerrainHeightMap2;

/// Нет детей
pub const INVALID_INDEX: u32 = u32::MAX;

const CELL_EPSILON: f32 = 0.1;

#[derive(Debug, Clone, Copy)]
pub struct QuadTreeCell {
    pub bounds: BoundingBox,
    pub range: CellRange,
    pub first_child: u32,
}

impl QuadTreeCell {
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.first_child == INVALID_INDEX
    }
}

impl Default for QuadTreeCell {
    fn default() -> Self {
        Self {
            bounds: BoundingBox::empty(),
            range: CellRange::new(0, 0, 0, 0),
            first_child: INVALID_INDEX,
        }
    }
}

#[derive(Debug, Default)]
pub struct QuadTree {
    cells: Vec<QuadTreeCell>,
}

impl QuadTree {
    /// Делим узел, пока его сторона в метрах больше `threshold`
    pub fn build(map: &TerrainHeightMap2, threshold: f32) -> Self {
        let mut tree = Self { cells: Vec::new() };
        let range = map.cell_range();
        if range.x1 <= 0 || range.z1 <= 0 {
            return tree;
        }
        tree.cells.push(QuadTreeCell::default());
        tree.build_cell(0, map, range, threshold);
        tree
    }

    fn build_cell(&mut self, index: usize, map: &TerrainHeightMap2, range: CellRange, threshold: f32) {
        let width = range.x1 - range.x0;
        let depth = range.z1 - range.z0;
        let size = (width as f32 * map.spacing_x()).max(depth as f32 * map.spacing_z());

        if size > threshold && width >= 2 && depth >= 2 {
            let first = self.cells.len();
            self.cells.extend(std::iter::repeat(QuadTreeCell::default()).take(4));

            let mx = range.x0 + width / 2;
            let mz = range.z0 + depth / 2;
            let children = [
                CellRange::new(range.x0, range.z0, mx, mz),
                CellRange::new(mx, range.z0, range.x1, mz),
                CellRange::new(range.x0, mz, mx, range.z1),
                CellRange::new(mx, mz, range.x1, range.z1),
            ];

            let mut bounds = BoundingBox::empty();
            for (i, child) in children.iter().enumerate() {
                self.build_cell(first + i, map, *child, threshold);
                bounds.union(&self.cells[first + i].bounds);
            }
            self.cells[index] = QuadTreeCell { bounds, range, first_child: first as u32 };
        } else {
            self.cells[index] = QuadTreeCell {
                bounds: Self::leaf_bounds(map, range),
                range,
                first_child: INVALID_INDEX,
            };
        }
    }

    fn leaf_bounds(map: &TerrainHeightMap2, range: CellRange) -> BoundingBox {
        let (mut lo, mut hi) = (f32::MAX, f32::MIN);
        for z in range.z0..=range.z1 {
            for x in range.x0..=range.x1 {
                let h = map.height_at_vertex(x, z);
                lo = lo.min(h);
                hi = hi.max(h);
            }
        }
        BoundingBox::new(
            Vec3::new(range.x0 as f32 * map.spacing_x(), lo, range.z0 as f32 * map.spacing_z()),
            Vec3::new(range.x1 as f32 * map.spacing_x(), hi, range.z1 as f32 * map.spacing_z()),
        )
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn root(&self) -> Option<&QuadTreeCell> {
        self.cells.first()
    }

    pub fn size_in_bytes(&self) -> usize {
        self.cells.capacity() * std::mem::size_of::<QuadTreeCell>()
    }

    /// Отрезок: дети обходятся в порядке входа луча в их боксы
    pub fn collide(
        &self,
        map: &TerrainHeightMap2,
        start: Vec3,
        end: Vec3,
        callback: &mut dyn TerrainCollisionCallback,
    ) -> bool {
        if self.cells.is_empty() {
            return false;
        }
        self.collide_cell(0, map, start, end, callback)
    }

    fn collide_cell(
        &self,
        index: u32,
        map: &TerrainHeightMap2,
        start: Vec3,
        end: Vec3,
        callback: &mut dyn TerrainCollisionCallback,
    ) -> bool {
        let cell = &self.cells[index as usize];

        if cell.is_leaf() {
            let mut s = start;
            let mut e = end;
            if !cell.bounds.clip(&mut s, &mut e, CELL_EPSILON) {
                return false;
            }
            return map.walk_segment(start, end, s, e, cell.range, callback);
        }

        let mut order = [(f32::MAX, INVALID_INDEX); 4];
        let mut count = 0;
        for child in cell.first_child..cell.first_child + 4 {
            if let Some((t0, _)) =
                self.cells[child as usize].bounds.segment_range(start, end, CELL_EPSILON)
            {
                order[count] = (t0, child);
                count += 1;
            }
        }
        order[..count].sort_by(|a, b| a.0.total_cmp(&b.0));

        order[..count]
            .iter()
            .any(|&(_, child)| self.collide_cell(child, map, start, end, callback))
    }

    /// Призма: все листья, чьи боксы задевает общий бокс призмы
    pub fn collide_prism(
        &self,
        map: &TerrainHeightMap2,
        prism: &WorldTriangle,
        end: Vec3,
        prism_bounds: &BoundingBox,
        callback: &mut dyn TerrainCollisionCallback,
    ) -> bool {
        if self.cells.is_empty() {
            return false;
        }
        let cells = map.prism_cells(prism_bounds);
        self.collide_prism_cell(0, map, prism, end, prism_bounds, cells, callback)
    }

    #[allow(clippy::too_many_arguments)]
    fn collide_prism_cell(
        &self,
        index: u32,
        map: &TerrainHeightMap2,
        prism: &WorldTriangle,
        end: Vec3,
        prism_bounds: &BoundingBox,
        prism_cells: CellRange,
        callback: &mut dyn TerrainCollisionCallback,
    ) -> bool {
        let cell = &self.cells[index as usize];
        if !cell.bounds.intersects(prism_bounds) {
            return false;
        }
        if cell.is_leaf() {
            let range = cell.range.intersection(&prism_cells);
            return map.collide_prism_cells(prism, end, range, callback);
        }
        (cell.first_child..cell.first_child + 4).any(|child| {
            self.collide_prism_cell(child, map, prism, end, prism_bounds, prism_cells, callback)
        })
    }
}
