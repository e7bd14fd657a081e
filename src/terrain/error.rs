// ============================================
// Terrain Error - Ошибки загрузки и стриминга
// ============================================

use std::fmt;

/// Ошибки загрузки/сохранения ресурсов ландшафта
#[derive(Debug)]
pub enum TerrainError {
    Io(std::io::Error),
    /// Секция не найдена в хранилище
    SectionNotFound(String),
    /// Неверное магическое число в заголовке секции
    InvalidMagic { section: String },
    /// Неизвестная версия формата секции
    UnsupportedVersion { section: String, version: u32 },
    Compression(String),
    Serialize(String),
    Deserialize(String),
    /// Данные секции не соответствуют заголовку
    InvalidData(String),
    /// Не удалось создать/заполнить текстуру
    Texture(String),
    NotPowerOfTwo(u32),
    /// В блоке нет ни одного текстурного слоя
    NoLayers,
    /// Фоновая задача завершилась без результата
    TaskCancelled,
    Config(String),
}

impl fmt::Display for TerrainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerrainError::Io(e) => write!(f, "io error: {}", e),
            TerrainError::SectionNotFound(name) => write!(f, "can't open section '{}'", name),
            TerrainError::InvalidMagic { section } => {
                write!(f, "section '{}' has an invalid magic number", section)
            }
            TerrainError::UnsupportedVersion { section, version } => write!(
                f,
                "section '{}' has unsupported format version {}",
                section, version
            ),
            TerrainError::Compression(e) => write!(f, "compression error: {}", e),
            TerrainError::Serialize(e) => write!(f, "serialize error: {}", e),
            TerrainError::Deserialize(e) => write!(f, "deserialize error: {}", e),
            TerrainError::InvalidData(e) => write!(f, "invalid data: {}", e),
            TerrainError::Texture(e) => write!(f, "texture error: {}", e),
            TerrainError::NotPowerOfTwo(size) => {
                write!(f, "height map size {} is not a power of two", size)
            }
            TerrainError::NoLayers => write!(f, "terrain block has no texture layers"),
            TerrainError::TaskCancelled => write!(f, "background task was dropped"),
            TerrainError::Config(e) => write!(f, "config error: {}", e),
        }
    }
}

impl std::error::Error for TerrainError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TerrainError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TerrainError {
    fn from(e: std::io::Error) -> Self {
        TerrainError::Io(e)
    }
}

impl From<bincode::Error> for TerrainError {
    fn from(e: bincode::Error) -> Self {
        TerrainError::Deserialize(e.to_string())
    }
}
