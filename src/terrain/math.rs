// ============================================
// Terrain Math - Боксы и треугольники коллизий
// ============================================

use ultraviolet::Vec3;

/// Осевой бокс
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    /// Пустой бокс (min > max), расширяется через add_bounds
    pub fn empty() -> Self {
        Self {
            min: Vec3::new(f32::MAX, f32::MAX, f32::MAX),
            max: Vec3::new(f32::MIN, f32::MIN, f32::MIN),
        }
    }

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn add_bounds(&mut self, p: Vec3) {
        self.min = self.min.min_by_component(p);
        self.max = self.max.max_by_component(p);
    }

    pub fn union(&mut self, other: &BoundingBox) {
        if other.is_empty() {
            return;
        }
        self.add_bounds(other.min);
        self.add_bounds(other.max);
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Пересечение по XZ с другим боксом
    pub fn intersects_xz(&self, other: &BoundingBox) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.intersects_xz(other) && self.min.y <= other.max.y && self.max.y >= other.min.y
    }

    /// Параметрический отрезок [t0, t1] луча start + t*(end-start), t in 0..1,
    /// лежащий внутри бокса, расширенного на epsilon. None если промах.
    pub fn segment_range(&self, start: Vec3, end: Vec3, epsilon: f32) -> Option<(f32, f32)> {
        let dir = end - start;
        let mut t0 = 0.0f32;
        let mut t1 = 1.0f32;

        let starts = [start.x, start.y, start.z];
        let dirs = [dir.x, dir.y, dir.z];
        let mins = [self.min.x - epsilon, self.min.y - epsilon, self.min.z - epsilon];
        let maxs = [self.max.x + epsilon, self.max.y + epsilon, self.max.z + epsilon];

        for axis in 0..3 {
            if dirs[axis].abs() < 1e-12 {
                if starts[axis] < mins[axis] || starts[axis] > maxs[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / dirs[axis];
            let mut near = (mins[axis] - starts[axis]) * inv;
            let mut far = (maxs[axis] - starts[axis]) * inv;
            if near > far {
                std::mem::swap(&mut near, &mut far);
            }
            t0 = t0.max(near);
            t1 = t1.min(far);
            if t0 > t1 {
                return None;
            }
        }
        Some((t0, t1))
    }

    /// Обрезать отрезок боксом. false если отрезок целиком снаружи.
    pub fn clip(&self, start: &mut Vec3, end: &mut Vec3, epsilon: f32) -> bool {
        match self.segment_range(*start, *end, epsilon) {
            Some((t0, t1)) => {
                let dir = *end - *start;
                let s = *start + dir * t0;
                let e = *start + dir * t1;
                *start = s;
                *end = e;
                true
            }
            None => false,
        }
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

/// Треугольник в координатах блока
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldTriangle {
    pub v0: Vec3,
    pub v1: Vec3,
    pub v2: Vec3,
}

impl WorldTriangle {
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        Self { v0, v1, v2 }
    }

    pub fn normal(&self) -> Vec3 {
        (self.v1 - self.v0).cross(self.v2 - self.v0)
    }

    /// Раздвинуть треугольник вдоль рёбер на bias, чтобы попадания
    /// точно в ребро не терялись между соседними треугольниками
    pub fn extended(&self, bias: f32) -> Self {
        let a = (self.v1 - self.v0) * bias;
        let b = (self.v2 - self.v1) * bias;
        let c = (self.v0 - self.v2) * bias;
        Self::new(self.v0 - a + c, self.v1 - b + a, self.v2 - c + b)
    }

    pub fn bounds(&self) -> BoundingBox {
        let mut bb = BoundingBox::empty();
        bb.add_bounds(self.v0);
        bb.add_bounds(self.v1);
        bb.add_bounds(self.v2);
        bb
    }

    /// Пересечение луча start + t*dir (dir нормализован) при t in [0, dist].
    /// Возвращает дистанцию до точки пересечения (Möller–Trumbore).
    pub fn intersects_ray(&self, start: Vec3, dir: Vec3, dist: f32) -> Option<f32> {
        const EPSILON: f32 = 1e-7;
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;
        let p = dir.cross(edge2);
        let det = edge1.dot(p);
        if det.abs() < EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let t_vec = start - self.v0;
        let u = t_vec.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = t_vec.cross(edge1);
        let v = dir.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = edge2.dot(q) * inv_det;
        if t >= 0.0 && t <= dist {
            Some(t)
        } else {
            None
        }
    }

    /// Пересечение отрезка с треугольником
    pub fn intersects_segment(&self, start: Vec3, end: Vec3) -> Option<f32> {
        let delta = end - start;
        let len = delta.mag();
        if len <= f32::EPSILON {
            return None;
        }
        self.intersects_ray(start, delta / len, len)
    }

    /// Пересечение с призмой, заметаемой треугольником `prism` при
    /// сдвиге на `offset`
    pub fn intersects_prism(&self, prism: &WorldTriangle, offset: Vec3) -> bool {
        let p = [prism.v0, prism.v1, prism.v2];

        // Рёбра, заметаемые вершинами призмы
        if p.iter().any(|v| self.intersects_segment(*v, *v + offset).is_some()) {
            return true;
        }

        // Рёбра этого треугольника против граней призмы
        let end = WorldTriangle::new(p[0] + offset, p[1] + offset, p[2] + offset);
        let mut faces = vec![*prism, end];
        for i in 0..3 {
            let a = p[i];
            let b = p[(i + 1) % 3];
            faces.push(WorldTriangle::new(a, b, b + offset));
            faces.push(WorldTriangle::new(a, b + offset, a + offset));
        }

        let edges = [(self.v0, self.v1), (self.v1, self.v2), (self.v2, self.v0)];
        edges.iter().any(|(a, b)| {
            faces
                .iter()
                .any(|face| face.intersects_segment(*a, *b).is_some())
        })
    }
}
