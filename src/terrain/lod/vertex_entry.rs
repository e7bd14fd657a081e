// ============================================
// Vertex LOD Entry - Вершинная сетка одного LOD
// ============================================

use crate::terrain::height::TerrainHeightMap2;

/// Вершина ландшафта. morph_height - высота той же точки в следующем
/// (грубом) LOD, шейдер смешивает их по дистанции.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable, Default, PartialEq)]
pub struct TerrainVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub morph_height: f32,
}

impl TerrainVertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], morph_height: f32) -> Self {
        Self { position, normal, morph_height }
    }
}

/// Число вершин на сторону для LOD: LOD0 = size + 1, каждый следующий
/// вдвое реже
#[inline]
pub fn lod_grid_size(lod: u32, num_lods: u32) -> u32 {
    (1u32 << num_lods.saturating_sub(lod)) + 1
}

pub struct VertexLodEntry {
    lod: u32,
    grid_size: u32,
    /// LOD карты высот, из которой построена сетка
    source_lod: u32,
    vertices: Vec<TerrainVertex>,
}

impl VertexLodEntry {
    /// Построить сетку LOD по карте высот любой детальности
    pub fn build(map: &TerrainHeightMap2, lod: u32, num_lods: u32) -> Self {
        let grid_size = lod_grid_size(lod, num_lods);
        let cells = (grid_size - 1) as f32;
        let step = map.block_size() / cells;

        let mut heights = Vec::with_capacity((grid_size * grid_size) as usize);
        for z in 0..grid_size {
            for x in 0..grid_size {
                heights.push(map.height_at(x as f32 * step, z as f32 * step));
            }
        }

        let mut vertices = Vec::with_capacity(heights.len());
        for z in 0..grid_size {
            for x in 0..grid_size {
                let px = x as f32 * step;
                let pz = z as f32 * step;
                let height = heights[(z * grid_size + x) as usize];
                let normal = map.normal_at(px, pz);
                let morph = coarse_height(&heights, grid_size, x, z);
                vertices.push(TerrainVertex::new(
                    [px, height, pz],
                    [normal.x, normal.y, normal.z],
                    morph,
                ));
            }
        }

        log::trace!(
            "built vertex lod {} ({}x{}) from height map lod {}",
            lod,
            grid_size,
            grid_size,
            map.lod_level()
        );

        Self { lod, grid_size, source_lod: map.lod_level(), vertices }
    }

    #[inline]
    pub fn lod(&self) -> u32 {
        self.lod
    }

    #[inline]
    pub fn grid_size(&self) -> u32 {
        self.grid_size
    }

    #[inline]
    pub fn source_lod(&self) -> u32 {
        self.source_lod
    }

    pub fn vertices(&self) -> &[TerrainVertex] {
        &self.vertices
    }

    pub fn vertex(&self, x: u32, z: u32) -> &TerrainVertex {
        &self.vertices[(z * self.grid_size + x) as usize]
    }

    /// Байты вершинного буфера для загрузки в GPU
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn size_in_bytes(&self) -> usize {
        self.vertices.len() * std::mem::size_of::<TerrainVertex>()
    }
}

/// Высота вершины в сетке вдвое реже (с той же шахматной диагональю)
fn coarse_height(heights: &[f32], grid_size: u32, x: u32, z: u32) -> f32 {
    if grid_size < 3 {
        return heights[(z * grid_size + x) as usize];
    }
    let h = |x: u32, z: u32| heights[(z * grid_size + x) as usize];

    let cx = (x / 2).min((grid_size - 1) / 2 - 1);
    let cz = (z / 2).min((grid_size - 1) / 2 - 1);
    let xf = (x as f32 - (cx * 2) as f32) * 0.5;
    let zf = (z as f32 - (cz * 2) as f32) * 0.5;

    let (x0, z0, x1, z1) = (cx * 2, cz * 2, cx * 2 + 2, cz * 2 + 2);
    let (h00, h10, h01, h11) = (h(x0, z0), h(x1, z0), h(x0, z1), h(x1, z1));

    if (cx ^ cz) & 1 != 0 {
        if (1.0 - xf) > zf {
            h00 + (h10 - h00) * xf + (h01 - h00) * zf
        } else {
            h11 + (h01 - h11) * (1.0 - xf) + (h10 - h11) * (1.0 - zf)
        }
    } else if xf > zf {
        h10 + (h00 - h10) * (1.0 - xf) + (h11 - h10) * zf
    } else {
        h01 + (h11 - h01) * xf + (h00 - h01) * (1.0 - zf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sloped_map() -> TerrainHeightMap2 {
        let mut map = TerrainHeightMap2::new(32.0, 0, 0);
        map.create(32).unwrap();
        {
            let mut lock = map.lock(false);
            let image = lock.image_mut().unwrap();
            for z in 0..image.height() {
                for x in 0..image.width() {
                    image.set(x, z, x as f32 * 0.5 + ((x * z) % 3) as f32);
                }
            }
        }
        map
    }

    #[test]
    fn test_grid_sizes() {
        assert_eq!(lod_grid_size(0, 7), 129);
        assert_eq!(lod_grid_size(6, 7), 3);
        assert_eq!(lod_grid_size(7, 7), 2);
    }

    #[test]
    fn test_lod0_vertices_follow_height_map() {
        let map = sloped_map();
        let entry = VertexLodEntry::build(&map, 0, 5);
        assert_eq!(entry.grid_size(), 33);
        for z in 0..33 {
            for x in 0..33 {
                let v = entry.vertex(x, z);
                assert!((v.position[1] - map.height_at_vertex(x as i32, z as i32)).abs() < 1e-4);
            }
        }
        assert_eq!(entry.as_bytes().len(), entry.size_in_bytes());
    }

    #[test]
    fn test_even_vertices_do_not_morph() {
        let map = sloped_map();
        let entry = VertexLodEntry::build(&map, 1, 5);
        for z in (0..entry.grid_size()).step_by(2) {
            for x in (0..entry.grid_size()).step_by(2) {
                let v = entry.vertex(x, z);
                assert!((v.morph_height - v.position[1]).abs() < 1e-5);
            }
        }
    }
}
