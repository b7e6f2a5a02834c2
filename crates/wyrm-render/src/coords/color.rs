/// Normalized RGBA color.
///
/// Channels are 0..1 floats. Grid and overlay draws consume this type
/// directly; the text renderer takes byte colors obtained via
/// [`Color::to_bytes`].
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    #[inline]
    pub const fn white() -> Self {
        Self::new(1.0, 1.0, 1.0, 1.0)
    }

    /// Converts to byte channels by truncation: `(c * 255) as u8`.
    ///
    /// Truncation, not rounding: 0.5 maps to 127. Text cache keys derive
    /// from these bytes, so the rule must stay stable.
    #[inline]
    pub fn to_bytes(self) -> [u8; 3] {
        [
            (self.r.clamp(0.0, 1.0) * 255.0) as u8,
            (self.g.clamp(0.0, 1.0) * 255.0) as u8,
            (self.b.clamp(0.0, 1.0) * 255.0) as u8,
        ]
    }

    /// RGBA as a plain array for uniform/instance upload.
    #[inline]
    pub const fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Scales the RGB channels, forcing alpha to 1. Used when promoting a
    /// scene color to its bloom emitter color.
    #[inline]
    pub fn boosted(self, gain: f32) -> Self {
        Self::new(self.r * gain, self.g * gain, self.b * gain, 1.0)
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite() && self.a.is_finite()
    }
}

impl From<[f32; 4]> for Color {
    fn from([r, g, b, a]: [f32; 4]) -> Self {
        Self { r, g, b, a }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── byte conversion ───────────────────────────────────────────────────

    #[test]
    fn to_bytes_truncates() {
        let c = Color::new(0.0, 0.5, 1.0, 1.0);
        assert_eq!(c.to_bytes(), [0, 127, 255]);
    }

    #[test]
    fn to_bytes_clamps_out_of_range() {
        let c = Color::new(-0.5, 1.5, 0.999, 1.0);
        assert_eq!(c.to_bytes(), [0, 255, 254]);
    }

    // ── bloom boost ───────────────────────────────────────────────────────

    #[test]
    fn boosted_scales_rgb_and_saturates_alpha() {
        let c = Color::new(0.5, 0.25, 1.0, 0.3).boosted(1.4);
        assert!((c.r - 0.7).abs() < 1e-6);
        assert!((c.g - 0.35).abs() < 1e-6);
        assert!((c.b - 1.4).abs() < 1e-6);
        assert_eq!(c.a, 1.0);
    }
}
