// ============================================
// Terrain Space - Блоки ландшафта одного пространства
// ============================================
//
// Владеет блоками по ключу сетки. Каждый кадр:
//   update(camera)  - evaluate всех блоков параллельно, затем stream
//   draw(drawer)    - pre_draw + draw загруженных блоков
//
// Ошибка загрузки блока логируется здесь с именем файла.

use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;
use ultraviolet::Vec3;

use super::block::{BlockSource, TerrainBlock2, TerrainDrawer};
use super::context::StreamContext;
use super::error::TerrainError;
use super::gpu::TextureFactory;
use super::height::TerrainCollisionCallback;
use super::math::{BoundingBox, WorldTriangle};
use super::storage::TerrainStorage;

/// Координаты блока в сетке пространства
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockKey {
    pub x: i32,
    pub z: i32,
}

impl BlockKey {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Блок, содержащий мировую точку
    #[inline]
    pub fn from_world(x: f32, z: f32, block_size: f32) -> Self {
        Self {
            x: (x / block_size).floor() as i32,
            z: (z / block_size).floor() as i32,
        }
    }

    #[inline]
    pub fn origin(&self, block_size: f32) -> Vec3 {
        Vec3::new(self.x as f32 * block_size, 0.0, self.z as f32 * block_size)
    }

    /// Имя файла блока: xxxxzzzz в hex
    pub fn file_name(&self) -> String {
        format!("{:04x}{:04x}.cdata", self.x as u16, self.z as u16)
    }
}

/// Пространственная система, в которой блоки зарегистрированы
/// как препятствия
pub trait SpatialObserver: Send + Sync {
    fn block_added(&self, _key: BlockKey, _bounds: &BoundingBox) {}
    fn block_removed(&self, _key: BlockKey) {}
    fn bounds_changed(&self, _key: BlockKey, _bounds: &BoundingBox) {}
}

/// Переводит треугольники блока в мировые координаты
struct WorldCallback<'a> {
    inner: &'a mut dyn TerrainCollisionCallback,
    offset: Vec3,
}

impl TerrainCollisionCallback for WorldCallback<'_> {
    fn collide(&mut self, triangle: &WorldTriangle, dist: f32) -> bool {
        let world = WorldTriangle::new(
            triangle.v0 + self.offset,
            triangle.v1 + self.offset,
            triangle.v2 + self.offset,
        );
        self.inner.collide(&world, dist)
    }
}

pub struct TerrainSpace {
    ctx: StreamContext,
    storage: Arc<dyn TerrainStorage>,
    textures: Arc<dyn TextureFactory>,
    blocks: HashMap<BlockKey, TerrainBlock2>,
    bounds: HashMap<BlockKey, BoundingBox>,
    observer: Option<Box<dyn SpatialObserver>>,
    camera: Vec3,
}

impl TerrainSpace {
    pub fn new(
        ctx: StreamContext,
        storage: Arc<dyn TerrainStorage>,
        textures: Arc<dyn TextureFactory>,
    ) -> Self {
        Self {
            ctx,
            storage,
            textures,
            blocks: HashMap::new(),
            bounds: HashMap::new(),
            observer: None,
            camera: Vec3::zero(),
        }
    }

    pub fn set_observer(&mut self, observer: Box<dyn SpatialObserver>) {
        self.observer = Some(observer);
    }

    pub fn context(&self) -> &StreamContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut StreamContext {
        &mut self.ctx
    }

    #[inline]
    pub fn block_size(&self) -> f32 {
        self.ctx.settings.block_size
    }

    pub fn camera(&self) -> Vec3 {
        self.camera
    }

    // ---------------- блоки ----------------

    /// Загрузить блок. Уже загруженный блок не перечитывается.
    pub fn load_block(&mut self, key: BlockKey) -> Result<(), TerrainError> {
        if self.blocks.contains_key(&key) {
            return Ok(());
        }

        let file_name = key.file_name();
        let source = BlockSource::new(
            &file_name,
            self.block_size(),
            self.storage.clone(),
            self.textures.clone(),
        );
        let origin = key.origin(self.block_size());

        let block = match TerrainBlock2::load(source, origin, self.camera, &self.ctx) {
            Ok(block) => block,
            Err(e) => {
                log::error!("Failed to load terrain block {}: {}", file_name, e);
                return Err(e);
            }
        };

        let bounds = world_bounds(&block);
        if let Some(observer) = &self.observer {
            observer.block_added(key, &bounds);
        }
        self.bounds.insert(key, bounds);
        self.blocks.insert(key, block);
        Ok(())
    }

    /// Выгрузить блок. Фоновые задачи держат свой pin и доработают сами.
    pub fn remove_block(&mut self, key: BlockKey) -> bool {
        self.bounds.remove(&key);
        let removed = self.blocks.remove(&key).is_some();
        if removed {
            if let Some(observer) = &self.observer {
                observer.block_removed(key);
            }
        }
        removed
    }

    pub fn block(&self, key: BlockKey) -> Option<&TerrainBlock2> {
        self.blocks.get(&key)
    }

    pub fn block_mut(&mut self, key: BlockKey) -> Option<&mut TerrainBlock2> {
        self.blocks.get_mut(&key)
    }

    pub fn blocks(&self) -> impl Iterator<Item = (&BlockKey, &TerrainBlock2)> {
        self.blocks.iter()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    // ---------------- кадр ----------------

    /// evaluate всех блоков (параллельно, блоки независимы), затем stream
    pub fn update(&mut self, camera: Vec3) {
        self.camera = camera;
        let ctx = &self.ctx;

        self.blocks
            .par_iter_mut()
            .for_each(|(_, block)| block.evaluate(camera - block.origin(), ctx));

        for (key, block) in self.blocks.iter_mut() {
            block.stream(ctx);

            let bounds = world_bounds(block);
            if self.bounds.get(key) != Some(&bounds) {
                if let Some(observer) = &self.observer {
                    observer.bounds_changed(*key, &bounds);
                }
                self.bounds.insert(*key, bounds);
            }
        }
    }

    /// Нарисовать все готовые блоки. Возвращает число нарисованных.
    pub fn draw(&mut self, drawer: &mut dyn TerrainDrawer) -> usize {
        self.ctx.begin_render_target();
        let ctx = &self.ctx;
        let mut drawn = 0;
        for block in self.blocks.values_mut() {
            if block.pre_draw(ctx, true) && block.draw(drawer) {
                drawn += 1;
            }
        }
        drawn
    }

    pub fn set_reflection_pass(&mut self, reflection: bool) {
        self.ctx.reflection_pass = reflection;
    }

    /// Дождаться всех фоновых загрузок
    pub fn complete_pending(&mut self) {
        for block in self.blocks.values_mut() {
            block.complete_pending();
        }
    }

    pub fn doing_background_task(&self) -> bool {
        self.blocks.values().any(|b| b.doing_background_task())
    }

    // ---------------- запросы ----------------

    /// Высота в мировых координатах, None вне загруженных блоков
    pub fn height_at(&self, x: f32, z: f32) -> Option<f32> {
        let key = BlockKey::from_world(x, z, self.block_size());
        let block = self.blocks.get(&key)?;
        let origin = block.origin();
        Some(block.height_at(x - origin.x, z - origin.z))
    }

    pub fn normal_at(&self, x: f32, z: f32) -> Option<Vec3> {
        let key = BlockKey::from_world(x, z, self.block_size());
        let block = self.blocks.get(&key)?;
        let origin = block.origin();
        Some(block.normal_at(x - origin.x, z - origin.z))
    }

    /// Отрезок в мировых координатах. Блоки проверяются от начала
    /// отрезка; true если обход остановлен.
    pub fn collide(
        &self,
        start: Vec3,
        end: Vec3,
        callback: &mut dyn TerrainCollisionCallback,
    ) -> bool {
        let mut candidates: Vec<(f32, &TerrainBlock2)> = self
            .blocks
            .iter()
            .filter_map(|(key, block)| {
                let bounds = self.bounds.get(key)?;
                let (t0, _) = bounds.segment_range(start, end, 0.0)?;
                Some((t0, block))
            })
            .collect();
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

        for (_, block) in candidates {
            let origin = block.origin();
            let mut world = WorldCallback { inner: &mut *callback, offset: origin };
            if block.collide(start - origin, end - origin, &mut world) {
                return true;
            }
        }
        false
    }

    pub fn texture_memory(&self) -> usize {
        self.blocks.values().map(|b| b.texture_memory()).sum()
    }

    pub fn vertex_memory(&self) -> usize {
        self.blocks.values().map(|b| b.vertex_memory()).sum()
    }

    pub fn height_memory(&self) -> usize {
        self.blocks.values().map(|b| b.height_memory()).sum()
    }
}

/// Бокс блока в мировых координатах
fn world_bounds(block: &TerrainBlock2) -> BoundingBox {
    let bb = block.bounding_box();
    let origin = block.origin();
    BoundingBox::new(bb.min + origin, bb.max + origin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_key_from_world() {
        assert_eq!(BlockKey::from_world(150.0, -10.0, 100.0), BlockKey::new(1, -1));
        assert_eq!(BlockKey::new(1, -1).origin(100.0), Vec3::new(100.0, 0.0, -100.0));
        assert_eq!(BlockKey::new(1, -1).file_name(), "0001ffff.cdata");
    }
}
