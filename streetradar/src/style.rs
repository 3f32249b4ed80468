//! Coverage stroke styling.

use std::fmt;
use std::str::FromStr;
use tiny_skia::{Color, Paint, Shader};

/// Default coverage line color (`#2f7ef5`).
pub const DEFAULT_COLOR: Rgb = Rgb::new(0x2f, 0x7e, 0xf5);
pub const DEFAULT_WEIGHT: f32 = 2.0;
pub const DEFAULT_OPACITY: f32 = 0.8;

/// Opaque 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Error parsing a hex color string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseColorError(pub String);

impl fmt::Display for ParseColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid color '{}': expected #rrggbb or #rgb", self.0)
    }
}

impl std::error::Error for ParseColorError {}

impl FromStr for Rgb {
    type Err = ParseColorError;

    /// Parses `#rrggbb` or the `#rgb` shorthand. The leading `#` is optional.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseColorError(s.to_string());
        let hex = s.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return Err(err());
        }

        let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| err());
        match hex.len() {
            6 => Ok(Self::new(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            3 => {
                // #abc expands to #aabbcc
                let short = |i: usize| channel(&hex[i..i + 1]).map(|v| v * 17);
                Ok(Self::new(short(0)?, short(1)?, short(2)?))
            }
            _ => Err(err()),
        }
    }
}

/// Stroke style applied to every line drawn on a tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileStyle {
    pub color: Rgb,
    /// Stroke width in pixels
    pub weight: f32,
    /// Alpha in `[0, 1]`
    pub opacity: f32,
}

impl Default for TileStyle {
    fn default() -> Self {
        Self {
            color: DEFAULT_COLOR,
            weight: DEFAULT_WEIGHT,
            opacity: DEFAULT_OPACITY,
        }
    }
}

impl TileStyle {
    /// Merges the set fields of a patch into this style.
    ///
    /// Opacity is clamped to `[0, 1]` and weight to be non-negative; NaN
    /// values are ignored.
    pub fn merge(&mut self, patch: &StylePatch) {
        if let Some(color) = patch.color {
            self.color = color;
        }
        if let Some(weight) = patch.weight.filter(|w| !w.is_nan()) {
            self.weight = weight.max(0.0);
        }
        if let Some(opacity) = patch.opacity.filter(|o| !o.is_nan()) {
            self.opacity = opacity.clamp(0.0, 1.0);
        }
    }

    /// Alpha channel as an 8-bit value.
    pub fn alpha(&self) -> u8 {
        (self.opacity.clamp(0.0, 1.0) * 255.0).round() as u8
    }

    /// Anti-aliased solid paint for this style.
    pub fn paint(&self) -> Paint<'static> {
        Paint {
            shader: Shader::SolidColor(Color::from_rgba8(
                self.color.r,
                self.color.g,
                self.color.b,
                self.alpha(),
            )),
            anti_alias: true,
            ..Default::default()
        }
    }
}

/// Partial style update; unset fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StylePatch {
    pub color: Option<Rgb>,
    pub weight: Option<f32>,
    pub opacity: Option<f32>,
}

impl StylePatch {
    pub fn color(mut self, color: Rgb) -> Self {
        self.color = Some(color);
        self
    }

    pub fn weight(mut self, weight: f32) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn opacity(mut self, opacity: f32) -> Self {
        self.opacity = Some(opacity);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.color.is_none() && self.weight.is_none() && self.opacity.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_long_hex() {
        assert_eq!("#2f7ef5".parse::<Rgb>().unwrap(), DEFAULT_COLOR);
        assert_eq!("FF0000".parse::<Rgb>().unwrap(), Rgb::new(255, 0, 0));
    }

    #[test]
    fn test_parse_short_hex() {
        assert_eq!("#0f8".parse::<Rgb>().unwrap(), Rgb::new(0x00, 0xff, 0x88));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for input in ["", "#12", "#12345", "#gggggg", "blue", "#ééé"] {
            assert!(input.parse::<Rgb>().is_err(), "{}", input);
        }
    }

    #[test]
    fn test_display_roundtrip() {
        let color = Rgb::new(0x12, 0xab, 0x00);
        assert_eq!(color.to_string(), "#12ab00");
        assert_eq!(color.to_string().parse::<Rgb>().unwrap(), color);
    }

    #[test]
    fn test_merge_partial_patch() {
        let mut style = TileStyle::default();
        style.merge(&StylePatch::default().weight(5.0));

        assert_eq!(style.weight, 5.0);
        assert_eq!(style.color, DEFAULT_COLOR);
        assert_eq!(style.opacity, DEFAULT_OPACITY);
    }

    #[test]
    fn test_merge_clamps() {
        let mut style = TileStyle::default();
        style.merge(&StylePatch::default().opacity(1.7).weight(-3.0));
        assert_eq!(style.opacity, 1.0);
        assert_eq!(style.weight, 0.0);

        style.merge(&StylePatch::default().opacity(f32::NAN));
        assert_eq!(style.opacity, 1.0);
    }

    #[test]
    fn test_alpha() {
        let style = TileStyle {
            opacity: 0.5,
            ..TileStyle::default()
        };
        assert_eq!(style.alpha(), 128);
    }
}
