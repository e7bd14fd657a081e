// ============================================
// Streaming - Сквозные сценарии стриминга ландшафта
// ============================================

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ultraviolet::Vec3;

use terrain_stream::terrain::blends::TextureLayer;
use terrain_stream::terrain::maps::{encode_normal_map, generate_normal_image};
use terrain_stream::{
    BlockKey, BlockSource, BoundingBox, ClosestHit, CpuTextureFactory, DirectoryStorage,
    DrawRecorder, HorizonShadowMap2, MemoryStorage, NormalMapQuality, ResourceRequired,
    SpatialObserver, StreamContext, StreamMode, TerrainBlock2, TerrainError,
    TerrainHeightMap2, TerrainSettings, TerrainSpace, TerrainStorage,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn settings() -> TerrainSettings {
    TerrainSettings {
        height_map_size: 32,
        lod_distances: vec![200.0, 400.0, 600.0, 800.0],
        stream_mode: StreamMode::Synchronous,
        ..TerrainSettings::default()
    }
    .validated()
    .unwrap()
}

/// Записать полный блок: высоты LOD 0 и 1, нормали, тени и два слоя
fn write_block(storage: &dyn TerrainStorage, file: &str, height: f32) {
    for lod in 0..2 {
        let mut map = TerrainHeightMap2::new(100.0, 0, lod);
        map.create(32 >> lod).unwrap();
        {
            let mut lock = map.lock(false);
            lock.image_mut().unwrap().fill(height);
        }
        let section = TerrainHeightMap2::height_section_name("heights", lod);
        storage.save_section(&format!("{}/{}", file, section), &map.save().unwrap()).unwrap();

        if lod == 0 {
            let normals = generate_normal_image(&map, NormalMapQuality::Nice, 32);
            let data = encode_normal_map(&normals).unwrap();
            storage.save_section(&format!("{}/normals", file), &data).unwrap();
            storage.save_section(&format!("{}/lodNormals", file), &data).unwrap();
        }
    }
    for i in 0..2 {
        let layer = TextureLayer::filled("grass.dds", 16, 16, 200);
        storage
            .save_section(&format!("{}/layer{}", file, i + 1), &layer.encode().unwrap())
            .unwrap();
    }
    let shadows = HorizonShadowMap2::encode(&HorizonShadowMap2::flat_image(8)).unwrap();
    storage.save_section(&format!("{}/horizonShadows", file), &shadows).unwrap();
}

fn space_with_blocks(ctx: StreamContext, keys: &[BlockKey]) -> TerrainSpace {
    let storage = Arc::new(MemoryStorage::new());
    for key in keys {
        write_block(storage.as_ref(), &key.file_name(), 5.0);
    }
    let mut space = TerrainSpace::new(ctx, storage, Arc::new(CpuTextureFactory::new()));
    for key in keys {
        space.load_block(*key).unwrap();
    }
    space
}

fn grid(n: i32) -> Vec<BlockKey> {
    (0..n).flat_map(|x| (0..n).map(move |z| BlockKey::new(x, z))).collect()
}

#[test]
fn test_space_streams_draws_and_answers_queries() {
    init_logger();
    let mut space = space_with_blocks(StreamContext::synchronous(settings()).unwrap(), &grid(2));

    space.update(Vec3::new(50.0, 20.0, 50.0));
    let mut recorder = DrawRecorder::default();
    assert_eq!(space.draw(&mut recorder), 4);
    assert!(!recorder.calls.is_empty());

    let near = space.block(BlockKey::new(0, 0)).unwrap();
    assert!(near.blends().is_some());
    assert_eq!(near.highest_lod_height_map().lod_level(), 0);

    assert!((space.height_at(150.0, 150.0).unwrap() - 5.0).abs() < 0.01);
    assert!(space.height_at(-10.0, 50.0).is_none());

    let mut hit = ClosestHit::new();
    assert!(space.collide(
        Vec3::new(150.0, 100.0, 50.0),
        Vec3::new(150.0, -100.0, 50.0),
        &mut hit
    ));
    let distance = hit.distance().unwrap();
    assert!((distance - 95.0).abs() < 0.05, "distance {}", distance);
    let (triangle, _) = hit.hit.unwrap();
    assert!(triangle.v0.x >= 100.0 && triangle.v0.x <= 200.0);

    assert!(space.texture_memory() > 0);
    assert!(space.vertex_memory() > 0);
    assert!(space.height_memory() > 0);
}

#[test]
fn test_resident_vertex_lods_stay_bounded() {
    init_logger();
    let mut space = space_with_blocks(StreamContext::synchronous(settings()).unwrap(), &grid(2));

    let mut x = -100.0;
    while x < 3000.0 {
        space.update(Vec3::new(x, 10.0, 80.0));
        for (key, block) in space.blocks() {
            assert!(
                block.vertices().loaded_count() <= 2,
                "block {:?} at camera x {} keeps {} lods",
                key,
                x,
                block.vertices().loaded_count()
            );
        }
        x += 75.0;
    }

    // Обратно, с прыжками через несколько LOD
    for x in [2500.0, 10.0, 1200.0, 50.0] {
        space.update(Vec3::new(x, 10.0, 50.0));
        for (_, block) in space.blocks() {
            assert!(block.vertices().loaded_count() <= 2);
        }
    }
}

#[test]
fn test_evaluate_is_idempotent() {
    init_logger();
    let mut space = space_with_blocks(StreamContext::synchronous(settings()).unwrap(), &[BlockKey::new(0, 0)]);
    let ctx = StreamContext::synchronous(settings()).unwrap();
    let block = space.block_mut(BlockKey::new(0, 0)).unwrap();

    let camera = Vec3::new(320.0, 0.0, 40.0);
    block.evaluate(camera, &ctx);
    let info = *block.distance_info();
    let render = *block.lod_render_info();
    let flags = (
        block.detail_height_map().required(),
        block.blends_resource().required(),
    );

    block.evaluate(camera, &ctx);
    assert_eq!(*block.distance_info(), info);
    assert_eq!(*block.lod_render_info(), render);
    assert_eq!(
        (block.detail_height_map().required(), block.blends_resource().required()),
        flags
    );
}

#[test]
fn test_pre_draw_substitutes_missing_lods() {
    init_logger();
    let mut ctx = StreamContext::synchronous(settings()).unwrap();
    let storage = Arc::new(MemoryStorage::new());
    write_block(storage.as_ref(), "b", 0.0);
    let source = BlockSource::new("b", 100.0, storage, Arc::new(CpuTextureFactory::new()));
    let mut block =
        TerrainBlock2::load(source, Vec3::zero(), Vec3::new(50.0, 0.0, 50.0), &ctx).unwrap();
    assert!(block.ready_to_draw());

    // Камера ушла далеко, новые LOD ещё не загружены
    block.evaluate(Vec3::new(2500.0, 0.0, 50.0), &ctx);
    assert_eq!(block.distance_info().current_vertex_lod, 4);

    ctx.begin_render_target();
    assert!(!block.pre_draw(&ctx, false));

    ctx.begin_render_target();
    assert!(block.pre_draw(&ctx, true));
    let current = block.draw_state().current.as_ref().map(|e| e.lod());
    assert_eq!(current, Some(1));

    block.stream(&ctx);
    ctx.begin_render_target();
    assert!(block.pre_draw(&ctx, false));
    assert_eq!(block.draw_state().current.as_ref().map(|e| e.lod()), Some(4));
    assert_eq!(block.vertices().loaded_count(), 1);
}

#[test]
fn test_reflection_pass_does_not_stream_blends() {
    init_logger();
    let mut space = space_with_blocks(StreamContext::synchronous(settings()).unwrap(), &[BlockKey::new(0, 0)]);
    let key = BlockKey::new(0, 0);

    space.update(Vec3::new(2000.0, 0.0, 0.0));
    assert!(space.block(key).unwrap().blends().is_none());

    space.set_reflection_pass(true);
    space.update(Vec3::new(50.0, 0.0, 50.0));
    let block = space.block(key).unwrap();
    assert_eq!(block.blends_resource().required(), ResourceRequired::Yes);
    assert!(block.blends().is_none());

    space.set_reflection_pass(false);
    space.update(Vec3::new(50.0, 0.0, 50.0));
    let block = space.block(key).unwrap();
    assert_eq!(block.n_layers(), 2);
    assert_eq!(block.layer(1).map(|l| l.texture_name.clone()), Some("grass.dds".to_string()));
}

fn async_context() -> StreamContext {
    let settings = TerrainSettings {
        stream_mode: StreamMode::Asynchronous,
        worker_threads: 2,
        ..settings()
    };
    StreamContext::new(settings).unwrap()
}

#[test]
fn test_async_loads_publish_after_completion() {
    init_logger();
    let mut space = space_with_blocks(async_context(), &[BlockKey::new(0, 0)]);
    space.complete_pending();
    space.update(Vec3::new(50.0, 0.0, 50.0));
    space.complete_pending();
    space.update(Vec3::new(50.0, 0.0, 50.0));
    space.complete_pending();

    let block = space.block(BlockKey::new(0, 0)).unwrap();
    assert!(!block.doing_background_task());
    assert!(block.ready_to_draw());
    assert!(block.horizon_map().is_some());
    assert!(block.blends().is_some());
    assert_eq!(block.highest_lod_height_map().lod_level(), 0);
    let entry = block.vertices().get_lod(0, false).unwrap();
    assert_eq!(entry.source_lod(), 0);
}

#[test]
fn test_block_released_during_background_load() {
    init_logger();
    let ctx = async_context();
    let storage = Arc::new(MemoryStorage::new());
    write_block(storage.as_ref(), "b", 0.0);
    let source = BlockSource::new("b", 100.0, storage, Arc::new(CpuTextureFactory::new()));
    let weak = Arc::downgrade(&source);

    let block =
        TerrainBlock2::load(source, Vec3::zero(), Vec3::new(50.0, 0.0, 50.0), &ctx).unwrap();
    drop(block);

    let deadline = Instant::now() + Duration::from_secs(10);
    while ctx.tasks.in_flight() > 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(ctx.tasks.in_flight(), 0);
    assert!(weak.upgrade().is_none());
}

#[derive(Default)]
struct Events {
    added: Vec<BlockKey>,
    removed: Vec<BlockKey>,
    changed: Vec<(BlockKey, BoundingBox)>,
}

struct RecordingObserver(Arc<Mutex<Events>>);

impl SpatialObserver for RecordingObserver {
    fn block_added(&self, key: BlockKey, _bounds: &BoundingBox) {
        self.0.lock().unwrap().added.push(key);
    }

    fn block_removed(&self, key: BlockKey) {
        self.0.lock().unwrap().removed.push(key);
    }

    fn bounds_changed(&self, key: BlockKey, bounds: &BoundingBox) {
        self.0.lock().unwrap().changed.push((key, *bounds));
    }
}

#[test]
fn test_observer_and_load_failures() {
    init_logger();
    let storage = Arc::new(MemoryStorage::new());
    let key = BlockKey::new(3, -2);
    write_block(storage.as_ref(), &key.file_name(), 7.0);

    let events = Arc::new(Mutex::new(Events::default()));
    let mut space = TerrainSpace::new(
        StreamContext::synchronous(settings()).unwrap(),
        storage,
        Arc::new(CpuTextureFactory::new()),
    );
    space.set_observer(Box::new(RecordingObserver(events.clone())));

    space.load_block(key).unwrap();
    assert!(matches!(
        space.load_block(BlockKey::new(9, 9)),
        Err(TerrainError::SectionNotFound(_))
    ));
    assert_eq!(space.block_count(), 1);

    let height = space.height_at(350.0, -150.0).unwrap();
    assert!((height - 7.0).abs() < 0.01);

    assert!(space.remove_block(key));
    assert!(!space.remove_block(key));

    let events = events.lock().unwrap();
    assert_eq!(events.added, vec![key]);
    assert_eq!(events.removed, vec![key]);
}

#[test]
fn test_directory_storage_and_json_settings() {
    init_logger();
    let settings = TerrainSettings::from_json(
        r#"{
            "height_map_size": 32,
            "lod_distances": [200.0, 400.0, 600.0, 800.0],
            "stream_mode": "Synchronous",
            "detail_height_map_distance": 0.0
        }"#,
    )
    .unwrap();
    assert_eq!(settings.num_vertex_lods(), 5);

    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(DirectoryStorage::new(dir.path()));
    let key = BlockKey::new(0, 0);
    write_block(storage.as_ref(), &key.file_name(), 2.0);

    let mut space = TerrainSpace::new(
        StreamContext::new(settings).unwrap(),
        storage,
        Arc::new(CpuTextureFactory::new()),
    );
    space.load_block(key).unwrap();
    space.update(Vec3::new(900.0, 0.0, 50.0));

    let block = space.block(key).unwrap();
    assert_eq!(block.detail_height_map().required(), ResourceRequired::No);
    assert_eq!(block.highest_lod_height_map().lod_level(), 1);
    assert!((space.height_at(20.0, 20.0).unwrap() - 2.0).abs() < 0.01);
}
