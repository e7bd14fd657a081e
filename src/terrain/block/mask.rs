// ============================================
// Render Texture Mask - Какие текстуры блока грузить и рисовать
// ============================================

use std::ops::{BitAnd, BitOr, BitOrAssign, BitXor};

use crate::terrain::settings::TerrainSettings;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RenderTextureMask(u8);

impl RenderTextureMask {
    pub const NONE: Self = Self(0);
    pub const DRAW_LOD: Self = Self(1);
    pub const DRAW_BLEND: Self = Self(2);
    pub const DRAW_BUMP: Self = Self(4);
    pub const PRELOAD_BLEND: Self = Self(8);
    pub const DRAW_LOD_NORMALS: Self = Self(16);
    pub const PRELOAD_NORMALS: Self = Self(32);

    #[inline]
    pub fn bits(&self) -> u8 {
        self.0
    }

    #[inline]
    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn intersects(&self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Частичная маска для evaluate(): что пора подгружать
    pub fn load_flag(
        min_distance: f32,
        blend_preload_distance: f32,
        normal_preload_distance: f32,
    ) -> Self {
        if min_distance <= blend_preload_distance {
            Self::PRELOAD_BLEND | Self::PRELOAD_NORMALS
        } else if min_distance <= normal_preload_distance {
            Self::PRELOAD_NORMALS
        } else {
            Self::DRAW_LOD_NORMALS
        }
    }

    /// Полная маска для отрисовки по частичной маске и дистанциям блока
    pub fn draw_flag(
        partial: Self,
        min_distance: f32,
        max_distance: f32,
        settings: &TerrainSettings,
    ) -> Self {
        let mut mask = partial;
        let bump = settings.bump_mapping
            && min_distance <= settings.bump_fading_start + settings.bump_fading_distance;

        if !settings.use_lod_texture {
            mask |= Self::DRAW_BLEND;
            if bump {
                mask |= Self::DRAW_BUMP;
            }
            return mask;
        }

        let lts = settings.lod_texture_start;
        let lns = settings.lod_normal_start;

        if max_distance >= lts && min_distance < lns + settings.lod_normal_distance {
            mask |= Self::DRAW_LOD;
        }
        if max_distance >= lns {
            mask |= Self::DRAW_LOD_NORMALS;
        }
        if partial.contains(Self::PRELOAD_BLEND)
            && min_distance <= lts + settings.lod_texture_distance
        {
            mask |= Self::DRAW_BLEND;
            if bump {
                mask |= Self::DRAW_BUMP;
            }
        }
        mask
    }

    /// Нужны ли смеси текстурных слоёв
    #[inline]
    pub fn blends_required(&self) -> bool {
        self.intersects(Self::PRELOAD_BLEND | Self::DRAW_BLEND)
    }

    /// Нужна ли качественная карта нормалей
    #[inline]
    pub fn quality_normals_required(&self) -> bool {
        self.contains(Self::PRELOAD_NORMALS)
    }
}

impl BitOr for RenderTextureMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for RenderTextureMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for RenderTextureMask {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitXor for RenderTextureMask {
    type Output = Self;
    fn bitxor(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_flag_bands() {
        let settings = TerrainSettings::default();
        let blend = settings.absolute_blend_preload_distance();
        let normal = settings.absolute_normal_preload_distance();

        let near = RenderTextureMask::load_flag(10.0, blend, normal);
        assert!(near.blends_required());
        assert!(near.quality_normals_required());

        let mid = RenderTextureMask::load_flag(blend + 1.0, blend, normal);
        assert!(!mid.blends_required());
        assert!(mid.quality_normals_required());

        let far = RenderTextureMask::load_flag(normal + 1.0, blend, normal);
        assert_eq!(far, RenderTextureMask::DRAW_LOD_NORMALS);
    }

    #[test]
    fn test_draw_flag_near_block_draws_blends_and_bump() {
        let settings = TerrainSettings::default();
        let partial = RenderTextureMask::load_flag(
            0.0,
            settings.absolute_blend_preload_distance(),
            settings.absolute_normal_preload_distance(),
        );
        let mask = RenderTextureMask::draw_flag(partial, 0.0, 150.0, &settings);
        assert!(mask.contains(RenderTextureMask::DRAW_BLEND | RenderTextureMask::DRAW_BUMP));
        assert!(!mask.contains(RenderTextureMask::DRAW_LOD));
    }

    #[test]
    fn test_draw_flag_without_lod_texture_always_blends() {
        let settings = TerrainSettings { use_lod_texture: false, ..TerrainSettings::default() };
        let mask = RenderTextureMask::draw_flag(RenderTextureMask::NONE, 5000.0, 5100.0, &settings);
        assert!(mask.contains(RenderTextureMask::DRAW_BLEND));
        assert!(!mask.contains(RenderTextureMask::DRAW_BUMP));
    }
}
