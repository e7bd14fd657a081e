// ============================================
// Terrain Block - Стриминг ресурсов одного блока ландшафта
// ============================================
//
// Каждый кадр: evaluate() -> stream() -> pre_draw() -> draw().
//   evaluate  - дистанции, LOD и флаги Required, ничего не грузит
//   stream    - загрузка/выгрузка по флагам
//   pre_draw  - снимок загруженных ресурсов, никогда не ждёт
//
// Дефолтная карта высот всегда в памяти. Запросы высот и столкновений
// берут самую детальную из загруженных.

use std::sync::Arc;

use serde::Deserialize;
use ultraviolet::Vec3;

use crate::terrain::blends::{count_layers, TerrainBlends, TerrainBlendsResource, TextureLayer};
use crate::terrain::context::StreamContext;
use crate::terrain::error::TerrainError;
use crate::terrain::height::{CollisionOptions, TerrainCollisionCallback, TerrainHeightMap2};
use crate::terrain::lod::{
    load_height_map, min_max_xz_distance, DistanceInfo, HeightMapResource, VertexLodManager,
    FULL_SUB_BLOCK_MASK,
};
use crate::terrain::maps::{
    HorizonShadowMap2, TerrainAoMap2, TerrainLodTexture, TerrainNormalMap2,
    HORIZON_SHADOWS_SECTION,
};
use crate::terrain::math::{BoundingBox, WorldTriangle};
use crate::terrain::resource::TaskPoll;

use super::draw_state::{DrawState, LodRenderInfo, TerrainDrawer};
use super::mask::RenderTextureMask;
use super::post_load::{perform_background_steps, PostLoadResult, PostLoadTask};
use super::source::BlockSource;

pub const TERRAIN_BLOCK_META_DATA_SECTION: &str = "TerrainBlockMetaData";

/// Метаданные блока (JSON)
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct BlockMetaData {
    /// Принудительный LOD, -1 - выбирать по дистанции
    pub forced_lod: i32,
}

impl Default for BlockMetaData {
    fn default() -> Self {
        Self { forced_lod: -1 }
    }
}

impl BlockMetaData {
    fn read(source: &BlockSource) -> Self {
        let Some(data) = source.open(TERRAIN_BLOCK_META_DATA_SECTION) else {
            return Self::default();
        };
        match serde_json::from_slice(&data) {
            Ok(meta) => meta,
            Err(e) => {
                log::warn!(
                    "{}: bad {} section, ignoring: {}",
                    source.file_name(),
                    TERRAIN_BLOCK_META_DATA_SECTION,
                    e
                );
                Self::default()
            }
        }
    }
}

pub struct TerrainBlock2 {
    source: Arc<BlockSource>,
    /// Мировая позиция угла блока
    origin: Vec3,
    height_map: Arc<TerrainHeightMap2>,
    detail_height_map: HeightMapResource,
    vertices: VertexLodManager,
    blends: TerrainBlendsResource,
    normal_map: TerrainNormalMap2,
    horizon: Option<HorizonShadowMap2>,
    ao_map: Option<TerrainAoMap2>,
    lod_texture: Option<TerrainLodTexture>,
    post_load: Option<PostLoadTask>,
    forced_lod: i32,
    distance_info: DistanceInfo,
    /// Частичная маска из evaluate(), дополняется в pre_draw()
    load_mask: RenderTextureMask,
    lod_render_info: LodRenderInfo,
    draw_state: DrawState,
}

impl TerrainBlock2 {
    /// Загрузить блок. Ошибка здесь - блок целиком не загружен.
    pub fn load(
        source: Arc<BlockSource>,
        origin: Vec3,
        camera_position: Vec3,
        ctx: &StreamContext,
    ) -> Result<Self, TerrainError> {
        if !source.exists() {
            return Err(TerrainError::SectionNotFound(source.file_name().to_string()));
        }

        let meta = BlockMetaData::read(&source);
        let settings = &ctx.settings;
        let num_lods = ctx.num_vertex_lods();
        let last_lod = num_lods.saturating_sub(1);

        let (detail_lod, default_lod) = if meta.forced_lod < 0 {
            (settings.top_vertex_lod, settings.default_height_map_lod)
        } else {
            let forced = (meta.forced_lod as u32).min(last_lod);
            (forced, forced)
        };

        let height_map = Arc::new(load_height_map(&source, default_lod)?);

        if !source.has_section(HORIZON_SHADOWS_SECTION) {
            return Err(TerrainError::SectionNotFound(source.section(HORIZON_SHADOWS_SECTION)));
        }

        let n_layers = count_layers(&source);
        if n_layers == 0 {
            return Err(TerrainError::NoLayers);
        }

        let mut block = Self {
            origin,
            height_map,
            detail_height_map: HeightMapResource::new(detail_lod),
            vertices: VertexLodManager::new(num_lods),
            blends: TerrainBlendsResource::new(n_layers),
            normal_map: TerrainNormalMap2::new(),
            horizon: None,
            ao_map: None,
            lod_texture: None,
            post_load: None,
            forced_lod: -1,
            distance_info: DistanceInfo::default(),
            load_mask: RenderTextureMask::NONE,
            lod_render_info: LodRenderInfo::default(),
            draw_state: DrawState::default(),
            source,
        };
        block.set_forced_lod(meta.forced_lod);

        block.evaluate(camera_position - origin, ctx);
        block.stream(ctx);

        if ctx.tasks.is_synchronous() {
            let result = perform_background_steps(&block.source);
            block.apply_post_load(result);
        } else {
            block.post_load = Some(PostLoadTask::start(&ctx.tasks, &block.source));
        }

        log::debug!(
            "{}: loaded, default height lod {}, {} layers",
            block.source.file_name(),
            default_lod,
            n_layers
        );
        Ok(block)
    }

    // ---------------- кадр ----------------

    /// Решить, что нужно блоку при данной позиции камеры (в координатах блока)
    pub fn evaluate(&mut self, relative_camera_pos: Vec3, ctx: &StreamContext) {
        let vertex_lod = &ctx.vertex_lod;
        let settings = &ctx.settings;
        let last_lod = self.vertices.lowest_lod();

        let (min_distance, max_distance) =
            min_max_xz_distance(relative_camera_pos, self.block_size());
        let current = vertex_lod.calculate_lod_level(min_distance).min(last_lod);
        let mut info = DistanceInfo {
            relative_camera_pos,
            min_distance,
            max_distance,
            current_vertex_lod: current,
            next_vertex_lod: (current + 1).min(last_lod),
        };

        let forced = self.forced_lod.min(last_lod as i32);
        if forced >= 0 {
            info.current_vertex_lod = forced as u32;
            info.next_vertex_lod = forced as u32;
            let (min, max) = vertex_lod.get_distance_for_lod(forced as u32);
            info.min_distance = min;
            info.max_distance = max;
        }
        self.distance_info = info;

        // Детальная карта нужна для сетки мельче дефолтной или вблизи
        let required_grid =
            VertexLodManager::lod_size(info.current_vertex_lod, self.vertices.num_lods());
        let detail_required = self.detail_height_map.lod() < self.height_map.lod_level()
            && (required_grid.saturating_sub(1) > self.height_map.blocks_width()
                || info.min_distance <= settings.detail_height_map_distance);
        self.detail_height_map.evaluate(detail_required);

        self.vertices.evaluate(info.current_vertex_lod, info.next_vertex_lod);

        self.load_mask = RenderTextureMask::load_flag(
            info.min_distance,
            settings.absolute_blend_preload_distance(),
            settings.absolute_normal_preload_distance(),
        );
        self.lod_render_info.render_texture_mask = self.load_mask;
        self.blends.evaluate(self.load_mask);
        self.normal_map.evaluate(self.load_mask);

        self.draw_state.clear();
    }

    /// Привести ресурсы к флагам evaluate()
    pub fn stream(&mut self, ctx: &StreamContext) {
        self.detail_height_map.stream(&ctx.tasks, &self.source);

        let map = self.highest_lod_height_map().clone();
        self.vertices.stream(&ctx.tasks, &map);

        // Отражение не должно выгружать смеси основной сцены
        if !ctx.reflection_pass {
            self.blends.stream(&ctx.tasks, &self.source);
        }

        self.normal_map.stream(&ctx.tasks, &self.source);
        self.poll_post_load();
    }

    fn poll_post_load(&mut self) {
        let poll = match &self.post_load {
            Some(task) => task.poll(),
            None => return,
        };
        match poll {
            TaskPoll::Pending => {}
            TaskPoll::Ready(result) => {
                self.post_load = None;
                self.apply_post_load(result);
            }
            TaskPoll::Lost => {
                self.post_load = None;
                log::warn!("{}: post load task lost", self.source.file_name());
            }
        }
    }

    /// Публикация результатов post-load задачи (главный поток)
    fn apply_post_load(&mut self, result: PostLoadResult) {
        if let Some(lod_normals) = result.lod_normals {
            self.normal_map.set_lod_normals(lod_normals);
        }
        match result.error {
            None => {
                self.horizon = result.horizon;
                self.ao_map = result.ao_map;
                self.lod_texture = result.lod_texture;
            }
            Some(e) => log::warn!("error loading terrain block {}: {}", self.source.file_name(), e),
        }
    }

    /// Дождаться всех фоновых загрузок блока и опубликовать их
    pub fn complete_pending(&mut self) {
        self.detail_height_map.complete_pending();
        self.vertices.complete_pending();
        self.blends.complete_pending();
        self.normal_map.complete_pending();
        if let Some(task) = self.post_load.take() {
            match task.wait() {
                Ok(result) => self.apply_post_load(result),
                Err(e) => log::warn!("{}: post load task: {}", self.source.file_name(), e),
            }
        }
    }

    /// Подготовить снимок для отрисовки. false - рисовать нечего.
    pub fn pre_draw(&mut self, ctx: &StreamContext, do_substitution: bool) -> bool {
        self.lod_render_info.masks = ctx.vertex_lod.calculate_masks(&self.distance_info);
        self.lod_render_info.render_texture_mask = RenderTextureMask::draw_flag(
            self.load_mask,
            self.distance_info.min_distance,
            self.distance_info.max_distance,
            &ctx.settings,
        );

        if self.draw_state.stamp != Some(ctx.render_target_count) {
            let forced = self.forced_lod.min(self.vertices.lowest_lod() as i32);
            let (current, next) = if forced < 0 {
                (self.distance_info.current_vertex_lod, self.distance_info.next_vertex_lod)
            } else {
                (forced as u32, forced as u32)
            };
            self.draw_state = DrawState {
                current: self.vertices.get_lod(current, do_substitution),
                next: self.vertices.get_lod(next, do_substitution),
                blends: self.blends.blends().cloned(),
                stamp: Some(ctx.render_target_count),
            };
        }

        self.draw_state.is_drawable()
    }

    /// Два прохода: под-блоки текущего LOD, затем остальные следующим LOD
    pub fn draw(&self, drawer: &mut dyn TerrainDrawer) -> bool {
        let Some(current) = &self.draw_state.current else {
            log::warn!("{}: no vertex lod to draw", self.source.file_name());
            return false;
        };

        let info = &self.lod_render_info;
        let next = self.draw_state.next.as_ref();
        let blends = self.draw_state.blends.as_deref();

        // Без следующего LOD весь блок рисуется текущим, возможны трещины
        let sub_block_mask = match next {
            Some(_) => info.masks.sub_block_mask,
            None => FULL_SUB_BLOCK_MASK,
        };

        drawer.draw_lod(
            current,
            info.masks.morph_ranges.main,
            sub_block_mask,
            &info.masks.neighbour_masks,
            blends,
            info.render_texture_mask,
        );

        if sub_block_mask != FULL_SUB_BLOCK_MASK {
            if let Some(next) = next {
                drawer.draw_lod(
                    next,
                    info.masks.morph_ranges.sub_block,
                    sub_block_mask ^ FULL_SUB_BLOCK_MASK,
                    &info.masks.neighbour_masks,
                    blends,
                    info.render_texture_mask,
                );
            }
        }
        true
    }

    // ---------------- запросы ----------------

    /// Самая детальная загруженная карта высот
    pub fn highest_lod_height_map(&self) -> &Arc<TerrainHeightMap2> {
        match self.detail_height_map.height_map() {
            Some(detail) if detail.lod_level() < self.height_map.lod_level() => detail,
            _ => &self.height_map,
        }
    }

    /// Высота в координатах блока
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        self.highest_lod_height_map().height_at(x, z)
    }

    pub fn normal_at(&self, x: f32, z: f32) -> Vec3 {
        self.highest_lod_height_map().normal_at(x, z)
    }

    pub fn collide(
        &self,
        start: Vec3,
        end: Vec3,
        callback: &mut dyn TerrainCollisionCallback,
    ) -> bool {
        self.highest_lod_height_map().collide(start, end, callback)
    }

    pub fn collide_with_options(
        &self,
        start: Vec3,
        end: Vec3,
        options: CollisionOptions,
        callback: &mut dyn TerrainCollisionCallback,
    ) -> bool {
        self.highest_lod_height_map().collide_with_options(start, end, options, callback)
    }

    pub fn collide_prism(
        &self,
        prism: &WorldTriangle,
        end: Vec3,
        callback: &mut dyn TerrainCollisionCallback,
    ) -> bool {
        self.highest_lod_height_map().collide_prism(prism, end, callback)
    }

    /// Бокс покрывает и детальную, и дефолтную карты: их высоты
    /// немного расходятся
    pub fn bounding_box(&self) -> BoundingBox {
        let hm = self.highest_lod_height_map();
        let dhm = &self.height_map;
        let min_h = hm.min_height().min(dhm.min_height());
        let max_h = hm.max_height().max(dhm.max_height());
        let bs = self.block_size();
        BoundingBox::new(Vec3::new(0.0, min_h, 0.0), Vec3::new(bs, max_h, bs))
    }

    pub fn doing_background_task(&self) -> bool {
        self.vertices.is_loading()
            || self.blends.is_loading()
            || self.detail_height_map.is_loading()
            || self.normal_map.is_loading()
            || self.post_load.is_some()
    }

    /// Загружен хотя бы один вершинный LOD
    pub fn ready_to_draw(&self) -> bool {
        self.vertices.get_lod(0, true).is_some()
    }

    pub fn can_draw_lod_texture(&self, ctx: &StreamContext) -> bool {
        ctx.settings.use_lod_texture && self.lod_texture.is_some()
    }

    pub fn texture_memory(&self) -> usize {
        self.blends.texture_memory()
            + self.normal_map.texture_memory()
            + self.horizon.as_ref().map(|h| h.texture_memory()).unwrap_or(0)
            + self.ao_map.as_ref().map(|a| a.texture_memory()).unwrap_or(0)
            + self.lod_texture.as_ref().map(|l| l.texture_memory()).unwrap_or(0)
    }

    pub fn vertex_memory(&self) -> usize {
        self.vertices.vertex_memory()
    }

    pub fn height_memory(&self) -> usize {
        self.height_map.size_in_bytes() + self.detail_height_map.memory()
    }

    pub fn n_layers(&self) -> usize {
        self.blends.n_layers()
    }

    pub fn layer(&self, index: usize) -> Option<Arc<TextureLayer>> {
        self.blends.layer(index)
    }

    // ---------------- доступ ----------------

    pub fn source(&self) -> &Arc<BlockSource> {
        &self.source
    }

    pub fn file_name(&self) -> &str {
        self.source.file_name()
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    #[inline]
    pub fn block_size(&self) -> f32 {
        self.source.block_size()
    }

    pub fn forced_lod(&self) -> i32 {
        self.forced_lod
    }

    /// -1 снимает принудительный LOD
    pub fn set_forced_lod(&mut self, lod: i32) {
        self.forced_lod = lod.clamp(-1, self.vertices.lowest_lod() as i32);
    }

    pub fn distance_info(&self) -> &DistanceInfo {
        &self.distance_info
    }

    pub fn lod_render_info(&self) -> &LodRenderInfo {
        &self.lod_render_info
    }

    pub fn draw_state(&self) -> &DrawState {
        &self.draw_state
    }

    /// Дефолтная (всегда загруженная) карта высот
    pub fn height_map(&self) -> &Arc<TerrainHeightMap2> {
        &self.height_map
    }

    pub fn detail_height_map(&self) -> &HeightMapResource {
        &self.detail_height_map
    }

    pub fn vertices(&self) -> &VertexLodManager {
        &self.vertices
    }

    pub fn blends(&self) -> Option<&Arc<TerrainBlends>> {
        self.blends.blends()
    }

    pub fn blends_resource(&self) -> &TerrainBlendsResource {
        &self.blends
    }

    pub fn normal_map(&self) -> &TerrainNormalMap2 {
        &self.normal_map
    }

    pub fn horizon_map(&self) -> Option<&HorizonShadowMap2> {
        self.horizon.as_ref()
    }

    pub fn ao_map(&self) -> Option<&TerrainAoMap2> {
        self.ao_map.as_ref()
    }

    pub fn lod_texture(&self) -> Option<&TerrainLodTexture> {
        self.lod_texture.as_ref()
    }
}
