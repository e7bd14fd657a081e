// ============================================
// GPU Textures - Фабрика текстур для ландшафта
// ============================================
// Ядро стриминга видит текстуры как непрозрачные буферы:
// выделить, заполнить строки, отметить готовой.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use super::error::TerrainError;

/// Формат текселя
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    R8,
    /// Две 8-битные компоненты (нормали: x в старшем байте, z в младшем)
    Rg8,
    Rgba8,
    R16,
    Rgba16,
}

impl TextureFormat {
    #[inline]
    pub fn bytes_per_texel(&self) -> usize {
        match self {
            TextureFormat::R8 => 1,
            TextureFormat::Rg8 | TextureFormat::R16 => 2,
            TextureFormat::Rgba8 => 4,
            TextureFormat::Rgba16 => 8,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub label: &'static str,
}

impl TextureDesc {
    pub fn new(width: u32, height: u32, format: TextureFormat, label: &'static str) -> Self {
        Self { width, height, format, label }
    }

    #[inline]
    pub fn row_pitch(&self) -> usize {
        self.width as usize * self.format.bytes_per_texel()
    }

    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.row_pitch() * self.height as usize
    }
}

/// Заполняемое изображение (аналог залоченной текстуры)
pub struct TextureImage {
    desc: TextureDesc,
    texels: Vec<u8>,
}

impl TextureImage {
    pub fn new(desc: TextureDesc) -> Self {
        let texels = vec![0u8; desc.size_in_bytes()];
        Self { desc, texels }
    }

    pub fn from_texels(desc: TextureDesc, texels: Vec<u8>) -> Result<Self, TerrainError> {
        if texels.len() != desc.size_in_bytes() {
            return Err(TerrainError::Texture(format!(
                "{}: expected {} bytes, got {}",
                desc.label,
                desc.size_in_bytes(),
                texels.len()
            )));
        }
        Ok(Self { desc, texels })
    }

    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let pitch = self.desc.row_pitch();
        let start = y as usize * pitch;
        &mut self.texels[start..start + pitch]
    }

    pub fn texels(&self) -> &[u8] {
        &self.texels
    }
}

/// Резидентная текстура
#[derive(Clone, Debug)]
pub struct Texture {
    id: u64,
    desc: TextureDesc,
    texels: Arc<Vec<u8>>,
}

impl Texture {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    pub fn width(&self) -> u32 {
        self.desc.width
    }

    pub fn height(&self) -> u32 {
        self.desc.height
    }

    pub fn texels(&self) -> &[u8] {
        &self.texels
    }

    pub fn memory_used(&self) -> usize {
        self.desc.size_in_bytes()
    }
}

/// Создание текстур. Реализация рендера может вернуть ошибку
/// (устройство потеряно, не хватило памяти) - ресурс останется
/// выгруженным и повторит попытку на следующем кадре.
pub trait TextureFactory: Send + Sync {
    fn create_texture(&self, image: TextureImage) -> Result<Texture, TerrainError>;
}

/// CPU реализация: текстура просто держит тексели
#[derive(Default)]
pub struct CpuTextureFactory {
    next_id: AtomicU64,
    created: AtomicUsize,
}

impl CpuTextureFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Сколько текстур создано за всё время
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }
}

impl TextureFactory for CpuTextureFactory {
    fn create_texture(&self, image: TextureImage) -> Result<Texture, TerrainError> {
        if image.desc.width == 0 || image.desc.height == 0 {
            return Err(TerrainError::Texture(format!(
                "{}: zero sized texture",
                image.desc.label
            )));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.created.fetch_add(1, Ordering::Relaxed);
        Ok(Texture {
            id,
            desc: image.desc,
            texels: Arc::new(image.texels),
        })
    }
}
