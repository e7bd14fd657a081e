// ============================================
// Section Codec - Заголовок + сжатое тело секции
// ============================================
// header{magic, version} (bincode, 8 байт) + ZSTD(bincode(body))
//
// Используется для слоёв текстур, карт нормалей, теней горизонта,
// AO и LOD-текстуры. Неизвестная версия - ошибка загрузки.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::TerrainError;

const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionHeader {
    pub magic: [u8; 4],
    pub version: u32,
}

impl SectionHeader {
    pub const SIZE: usize = 8;

    pub fn new(magic: [u8; 4], version: u32) -> Self {
        Self { magic, version }
    }
}

/// Записать заголовок и сжатое тело
pub fn encode_section<T: Serialize>(
    magic: [u8; 4],
    version: u32,
    body: &T,
) -> Result<Vec<u8>, TerrainError> {
    let mut out = bincode::serialize(&SectionHeader::new(magic, version))
        .map_err(|e| TerrainError::Serialize(e.to_string()))?;
    let raw = bincode::serialize(body).map_err(|e| TerrainError::Serialize(e.to_string()))?;
    let compressed =
        zstd::encode_all(&raw[..], ZSTD_LEVEL).map_err(|e| TerrainError::Compression(e.to_string()))?;
    out.extend_from_slice(&compressed);
    Ok(out)
}

/// Проверить заголовок и вернуть версию и тело
pub fn decode_section<T: DeserializeOwned>(
    data: &[u8],
    magic: [u8; 4],
    supported: &[u32],
    section: &str,
) -> Result<(u32, T), TerrainError> {
    if data.len() < SectionHeader::SIZE {
        return Err(TerrainError::InvalidData(format!(
            "section '{}' is too short for a header",
            section
        )));
    }
    let header: SectionHeader = bincode::deserialize(&data[..SectionHeader::SIZE])?;
    if header.magic != magic {
        return Err(TerrainError::InvalidMagic { section: section.to_string() });
    }
    if !supported.contains(&header.version) {
        return Err(TerrainError::UnsupportedVersion {
            section: section.to_string(),
            version: header.version,
        });
    }

    let raw = zstd::decode_all(&data[SectionHeader::SIZE..])
        .map_err(|e| TerrainError::Compression(format!("{}: {}", section, e)))?;
    let body = bincode::deserialize(&raw)?;
    Ok((header.version, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAGIC: [u8; 4] = *b"tst\0";

    #[test]
    fn test_header_checks() {
        let data = encode_section(MAGIC, 2, &vec![1u16, 2, 3]).unwrap();

        let (version, body): (u32, Vec<u16>) = decode_section(&data, MAGIC, &[1, 2], "t").unwrap();
        assert_eq!(version, 2);
        assert_eq!(body, vec![1, 2, 3]);

        assert!(matches!(
            decode_section::<Vec<u16>>(&data, *b"xxx\0", &[2], "t"),
            Err(TerrainError::InvalidMagic { .. })
        ));
        assert!(matches!(
            decode_section::<Vec<u16>>(&data, MAGIC, &[1], "t"),
            Err(TerrainError::UnsupportedVersion { version: 2, .. })
        ));
    }
}
