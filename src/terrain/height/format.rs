// ============================================
// Height Map Format - Бинарный формат карты высот
// ============================================
// header{magic,width,height,compression,version,minHeight,maxHeight}
// + payload:
// - VERSION_ABS_FLOAT:  сырые f32 (little endian)
// - VERSION_ABS_QFLOAT: i32 миллиметры от minHeight, дельта-кодирование,
//                       ZSTD сжатие
//
// Погрешность квантования <= 0.5 мм.

use serde::{Deserialize, Serialize};

use crate::terrain::error::TerrainError;

use super::grid::HeightGrid;

/// "hmp\0"
pub const HEIGHT_MAP_MAGIC: [u8; 4] = [b'h', b'm', b'p', 0];

pub const VERSION_ABS_FLOAT: u32 = 3;
pub const VERSION_ABS_QFLOAT: u32 = 4;

pub const COMPRESS_RAW: u32 = 0;
pub const COMPRESS_ZSTD: u32 = 1;

/// Шаг квантования (1 мм)
pub const QUANTIZATION_STEP: f32 = 0.001;

const ZSTD_LEVEL: i32 = 3;

/// Заголовок карты высот (28 байт)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeightMapHeader {
    pub magic: [u8; 4],
    pub width: u32,
    pub height: u32,
    pub compression: u32,
    pub version: u32,
    pub min_height: f32,
    pub max_height: f32,
}

impl HeightMapHeader {
    pub fn new(width: u32, height: u32, version: u32, min_height: f32, max_height: f32) -> Self {
        let compression = if version == VERSION_ABS_QFLOAT {
            COMPRESS_ZSTD
        } else {
            COMPRESS_RAW
        };
        Self {
            magic: HEIGHT_MAP_MAGIC,
            width,
            height,
            compression,
            version,
            min_height,
            max_height,
        }
    }

    /// Размер сериализованного заголовка
    pub fn encoded_size() -> usize {
        bincode::serialized_size(&Self::new(0, 0, VERSION_ABS_QFLOAT, 0.0, 0.0)).unwrap_or(28)
            as usize
    }
}

/// Результат декодирования
#[derive(Debug)]
pub struct DecodedHeightMap {
    pub grid: HeightGrid,
    pub min_height: f32,
    pub max_height: f32,
}

/// Закодировать сетку высот
pub fn encode_height_map(
    grid: &HeightGrid,
    min_height: f32,
    max_height: f32,
    version: u32,
) -> Result<Vec<u8>, TerrainError> {
    let header = HeightMapHeader::new(grid.width(), grid.height(), version, min_height, max_height);
    let mut out = bincode::serialize(&header).map_err(|e| TerrainError::Serialize(e.to_string()))?;

    match version {
        VERSION_ABS_FLOAT => {
            out.reserve(grid.size_in_bytes());
            for h in grid.as_slice() {
                out.extend_from_slice(&h.to_le_bytes());
            }
        }
        VERSION_ABS_QFLOAT => {
            let mut raw = Vec::with_capacity(grid.size_in_bytes());
            let mut prev = 0i32;
            for &h in grid.as_slice() {
                let q = ((h - min_height) / QUANTIZATION_STEP).round() as i32;
                raw.extend_from_slice(&q.wrapping_sub(prev).to_le_bytes());
                prev = q;
            }
            let compressed = zstd::encode_all(&raw[..], ZSTD_LEVEL)
                .map_err(|e| TerrainError::Compression(e.to_string()))?;
            out.extend_from_slice(&compressed);
        }
        other => {
            return Err(TerrainError::UnsupportedVersion {
                section: "heights".into(),
                version: other,
            })
        }
    }
    Ok(out)
}

/// Прочитать и проверить заголовок
pub fn decode_header(data: &[u8], section: &str) -> Result<HeightMapHeader, TerrainError> {
    let header_size = HeightMapHeader::encoded_size();
    if data.len() < header_size {
        return Err(TerrainError::InvalidData(format!(
            "section '{}' is too short for a height map header",
            section
        )));
    }
    let header: HeightMapHeader = bincode::deserialize(&data[..header_size])
        .map_err(|e| TerrainError::Deserialize(e.to_string()))?;
    if header.magic != HEIGHT_MAP_MAGIC {
        return Err(TerrainError::InvalidMagic { section: section.to_string() });
    }
    Ok(header)
}

/// Декодировать карту высот. Неизвестная версия - ошибка.
pub fn decode_height_map(data: &[u8], section: &str) -> Result<DecodedHeightMap, TerrainError> {
    let header = decode_header(data, section)?;
    if header.width != header.height {
        return Err(TerrainError::InvalidData(format!(
            "section '{}' has a non-square {}x{} grid",
            section, header.width, header.height
        )));
    }
    let payload = &data[HeightMapHeader::encoded_size()..];

    let (mut min_height, mut max_height) = (header.min_height, header.max_height);
    if max_height < min_height {
        std::mem::swap(&mut min_height, &mut max_height);
    }

    let count = header.width as usize * header.height as usize;
    let heights = match header.version {
        VERSION_ABS_FLOAT => {
            if payload.len() < count * 4 {
                return Err(TerrainError::InvalidData(format!(
                    "section '{}' has {} bytes of heights, expected {}",
                    section,
                    payload.len(),
                    count * 4
                )));
            }
            payload
                .chunks_exact(4)
                .take(count)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect::<Vec<f32>>()
        }
        VERSION_ABS_QFLOAT => {
            let raw = zstd::decode_all(payload).map_err(|_| {
                TerrainError::Compression(format!(
                    "the height map data in '{}' could not be decompressed",
                    section
                ))
            })?;
            if raw.len() != count * 4 {
                return Err(TerrainError::InvalidData(format!(
                    "section '{}' decompressed to {} bytes, expected {}",
                    section,
                    raw.len(),
                    count * 4
                )));
            }
            let mut prev = 0i32;
            raw.chunks_exact(4)
                .map(|b| {
                    let q = prev.wrapping_add(i32::from_le_bytes([b[0], b[1], b[2], b[3]]));
                    prev = q;
                    (min_height + q as f32 * QUANTIZATION_STEP).clamp(min_height, max_height)
                })
                .collect::<Vec<f32>>()
        }
        version => {
            return Err(TerrainError::UnsupportedVersion {
                section: section.to_string(),
                version,
            })
        }
    };

    let grid = HeightGrid::from_data(header.width, header.height, heights).ok_or_else(|| {
        TerrainError::InvalidData(format!("section '{}' has a malformed grid", section))
    })?;

    Ok(DecodedHeightMap { grid, min_height, max_height })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_grid() -> HeightGrid {
        let mut grid = HeightGrid::new(9, 9);
        for z in 0..9 {
            for x in 0..9 {
                grid.set(x, z, (x as f32 * 0.37).sin() * 20.0 + z as f32 * 1.3331);
            }
        }
        grid
    }

    #[test]
    fn test_header_is_28_bytes() {
        assert_eq!(HeightMapHeader::encoded_size(), 28);
    }

    #[test]
    fn test_quantized_payload_within_tolerance() {
        let grid = sample_grid();
        let (lo, hi) = grid.min_max();
        let data = encode_height_map(&grid, lo, hi, VERSION_ABS_QFLOAT).unwrap();
        let decoded = decode_height_map(&data, "heights").unwrap();

        for (a, b) in grid.as_slice().iter().zip(decoded.grid.as_slice()) {
            assert!((a - b).abs() <= 0.002, "{} vs {}", a, b);
            assert!(*b >= decoded.min_height && *b <= decoded.max_height);
        }
    }

    #[test]
    fn test_swapped_min_max_are_fixed() {
        let grid = sample_grid();
        let (lo, hi) = grid.min_max();
        let data = encode_height_map(&grid, hi, lo, VERSION_ABS_FLOAT).unwrap();
        let decoded = decode_height_map(&data, "heights").unwrap();
        assert_eq!(decoded.min_height, lo);
        assert_eq!(decoded.max_height, hi);
        assert_eq!(decoded.grid, grid);
    }

    #[test]
    fn test_unknown_version_fails() {
        let grid = sample_grid();
        let mut data = encode_height_map(&grid, 0.0, 1.0, VERSION_ABS_FLOAT).unwrap();
        // version лежит после magic(4) + width(4) + height(4) + compression(4)
        data[16..20].copy_from_slice(&99u32.to_le_bytes());
        assert!(matches!(
            decode_height_map(&data, "heights"),
            Err(TerrainError::UnsupportedVersion { version: 99, .. })
        ));
    }
}
