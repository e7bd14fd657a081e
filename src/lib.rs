// ============================================
// Terrain Stream - Стриминг и LOD ландшафта
// ============================================
//
// Блоки ландшафта с независимо подгружаемыми ресурсами:
// карты высот по уровням LOD, вершинные LOD, бленды текстур,
// карты нормалей, теней горизонта, AO и LOD-текстуры.

pub mod terrain;

pub use terrain::*;
