// ============================================
// Block Source - Откуда блок грузит свои секции
// ============================================
//
// Фоновые задачи держат PinGuard: пока он жив, счётчик pins блока
// не ноль и источник не освобождается.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crate::terrain::error::TerrainError;
use crate::terrain::gpu::TextureFactory;
use crate::terrain::storage::{require_section, section_path, TerrainStorage};

/// Идентификатор блока для невладеющих обратных ссылок
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u64);

impl BlockId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        BlockId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

pub struct BlockSource {
    id: BlockId,
    file_name: String,
    block_size: f32,
    storage: Arc<dyn TerrainStorage>,
    textures: Arc<dyn TextureFactory>,
    pins: AtomicU32,
}

impl BlockSource {
    pub fn new(
        file_name: &str,
        block_size: f32,
        storage: Arc<dyn TerrainStorage>,
        textures: Arc<dyn TextureFactory>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: BlockId::next(),
            file_name: file_name.to_string(),
            block_size,
            storage,
            textures,
            pins: AtomicU32::new(0),
        })
    }

    #[inline]
    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    #[inline]
    pub fn block_size(&self) -> f32 {
        self.block_size
    }

    pub fn storage(&self) -> &dyn TerrainStorage {
        self.storage.as_ref()
    }

    pub fn textures(&self) -> &dyn TextureFactory {
        self.textures.as_ref()
    }

    /// Полный путь секции блока
    pub fn section(&self, name: &str) -> String {
        section_path(&self.file_name, name)
    }

    pub fn exists(&self) -> bool {
        self.storage.exists(&self.file_name)
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.storage.exists(&self.section(name))
    }

    pub fn open(&self, name: &str) -> Option<Vec<u8>> {
        self.storage.open_section(&self.section(name))
    }

    pub fn require(&self, name: &str) -> Result<Vec<u8>, TerrainError> {
        require_section(self.storage.as_ref(), &self.section(name))
    }

    /// Закрепить блок на время фоновой задачи
    pub fn pin(self: &Arc<Self>) -> PinGuard {
        self.pins.fetch_add(1, Ordering::AcqRel);
        PinGuard { source: self.clone() }
    }

    /// Сколько фоновых задач держат блок
    pub fn pin_count(&self) -> u32 {
        self.pins.load(Ordering::Acquire)
    }
}

pub struct PinGuard {
    source: Arc<BlockSource>,
}

impl PinGuard {
    pub fn source(&self) -> &BlockSource {
        &self.source
    }
}

impl Drop for PinGuard {
    fn drop(&mut self) {
        self.source.pins.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::gpu::CpuTextureFactory;
    use crate::terrain::storage::MemoryStorage;

    #[test]
    fn test_pin_keeps_source_alive() {
        let storage = Arc::new(MemoryStorage::new());
        storage.insert("space/0000.cdata/heights", vec![1, 2, 3]);
        let source = BlockSource::new(
            "space/0000.cdata",
            100.0,
            storage,
            Arc::new(CpuTextureFactory::new()),
        );

        let pin = source.pin();
        assert_eq!(source.pin_count(), 1);

        let weak = Arc::downgrade(&source);
        drop(source);
        assert!(weak.upgrade().is_some());
        assert_eq!(pin.source().open("heights"), Some(vec![1, 2, 3]));

        drop(pin);
        assert!(weak.upgrade().is_none());
    }
}
