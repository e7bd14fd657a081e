// ============================================
// Terrain Storage - Хранилище секций ландшафта
// ============================================
// Блок ландшафта = набор именованных бинарных секций:
// "<block>/heights", "<block>/heights1", "<block>/layer1", ...

mod directory;
mod memory;

pub use directory::DirectoryStorage;
pub use memory::MemoryStorage;

use super::error::TerrainError;

/// Источник секций ландшафта. Вызывается и из фоновых потоков.
pub trait TerrainStorage: Send + Sync {
    /// Прочитать секцию целиком, None если её нет
    fn open_section(&self, path: &str) -> Option<Vec<u8>>;

    /// Записать секцию (перезаписывает существующую)
    fn save_section(&self, path: &str, data: &[u8]) -> Result<(), TerrainError>;

    /// Есть ли блок/секция с таким путём (включая вложенные секции)
    fn exists(&self, path: &str) -> bool;
}

/// Путь дочерней секции блока
#[inline]
pub fn section_path(block: &str, name: &str) -> String {
    format!("{}/{}", block, name)
}

/// Прочитать обязательную секцию
pub fn require_section(
    storage: &dyn TerrainStorage,
    path: &str,
) -> Result<Vec<u8>, TerrainError> {
    storage
        .open_section(path)
        .ok_or_else(|| TerrainError::SectionNotFound(path.to_string()))
}
