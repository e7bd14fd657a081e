// ============================================
// Map Image - Формат секций текстурных карт блока
// ============================================
// Нормали, тени горизонта, AO и LOD-текстура хранятся одинаково:
// заголовок секции + сжатое тело {width, height, texels}.

use serde::{Deserialize, Serialize};

use crate::terrain::codec::{decode_section, encode_section};
use crate::terrain::error::TerrainError;
use crate::terrain::gpu::{TextureDesc, TextureFormat, TextureImage};

#[derive(Serialize, Deserialize)]
struct MapBody {
    width: u32,
    height: u32,
    texels: Vec<u8>,
}

/// Описание вида карты: магия, версия и формат текселя
#[derive(Clone, Copy, Debug)]
pub struct MapKind {
    pub magic: [u8; 4],
    pub version: u32,
    pub format: TextureFormat,
    pub label: &'static str,
}

impl MapKind {
    pub fn desc(&self, width: u32, height: u32) -> TextureDesc {
        TextureDesc::new(width, height, self.format, self.label)
    }
}

pub fn encode_map(kind: &MapKind, image: &TextureImage) -> Result<Vec<u8>, TerrainError> {
    if image.desc().format != kind.format {
        return Err(TerrainError::Texture(format!(
            "{}: expected {:?}, got {:?}",
            kind.label,
            kind.format,
            image.desc().format
        )));
    }
    let body = MapBody {
        width: image.desc().width,
        height: image.desc().height,
        texels: image.texels().to_vec(),
    };
    encode_section(kind.magic, kind.version, &body)
}

pub fn decode_map(kind: &MapKind, data: &[u8], section: &str) -> Result<TextureImage, TerrainError> {
    let (_, body): (u32, MapBody) = decode_section(data, kind.magic, &[kind.version], section)?;
    if body.width == 0 || body.height == 0 {
        return Err(TerrainError::InvalidData(format!("{}: empty map", section)));
    }
    TextureImage::from_texels(kind.desc(body.width, body.height), body.texels)
        .map_err(|e| TerrainError::InvalidData(format!("{}: {}", section, e)))
}
