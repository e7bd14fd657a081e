// ============================================
// Height Grid - Квадратная сетка высот
// ============================================

/// Плотный 2D массив высот (row-major, строка = z)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HeightGrid {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl HeightGrid {
    pub fn new(width: u32, height: u32) -> Self {
        debug_assert_eq!(width, height, "height grids are square");
        Self {
            width,
            height,
            data: vec![0.0; width as usize * height as usize],
        }
    }

    /// None для неквадратной сетки или неверной длины данных
    pub fn from_data(width: u32, height: u32, data: Vec<f32>) -> Option<Self> {
        if width != height || data.len() != width as usize * height as usize {
            return None;
        }
        Some(Self { width, height, data })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Высота с зажатием координат в границы сетки
    #[inline]
    pub fn get(&self, x: i32, z: i32) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let x = x.clamp(0, self.width as i32 - 1) as usize;
        let z = z.clamp(0, self.height as i32 - 1) as usize;
        self.data[z * self.width as usize + x]
    }

    #[inline]
    pub fn set(&mut self, x: u32, z: u32, value: f32) {
        let idx = z as usize * self.width as usize + x as usize;
        self.data[idx] = value;
    }

    pub fn row(&self, z: u32) -> &[f32] {
        let w = self.width as usize;
        let start = z as usize * w;
        &self.data[start..start + w]
    }

    pub fn row_mut(&mut self, z: u32) -> &mut [f32] {
        let w = self.width as usize;
        let start = z as usize * w;
        &mut self.data[start..start + w]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Заполнить значением
    pub fn fill(&mut self, value: f32) {
        self.data.iter_mut().for_each(|h| *h = value);
    }

    /// Реальные минимум и максимум; (0, 0) для пустой сетки
    pub fn min_max(&self) -> (f32, f32) {
        if self.data.is_empty() {
            return (0.0, 0.0);
        }
        self.data
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &h| (lo.min(h), hi.max(h)))
    }

    pub fn size_in_bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamped_reads() {
        let mut grid = HeightGrid::new(3, 3);
        grid.set(0, 0, 1.0);
        grid.set(2, 2, 9.0);
        assert_eq!(grid.get(-5, -1), 1.0);
        assert_eq!(grid.get(10, 10), 9.0);
        assert_eq!(grid.min_max(), (0.0, 9.0));
    }

    #[test]
    fn test_from_data_requires_square() {
        assert!(HeightGrid::from_data(4, 8, vec![0.0; 32]).is_none());
        assert!(HeightGrid::from_data(4, 4, vec![0.0; 15]).is_none());
        assert!(HeightGrid::from_data(4, 4, vec![0.0; 16]).is_some());
    }
}
