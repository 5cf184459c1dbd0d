use crate::error::{Error, Result};
use crate::{FillMode, ShapeKind};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Pixel diameters offered by the brush-size selector, largest first.
pub const BRUSH_SIZES: [u32; 12] = [250, 200, 100, 50, 25, 20, 15, 10, 8, 5, 2, 1];

pub const DEFAULT_BRUSH_SIZE: u32 = 100;
pub const DEFAULT_OPACITY: u8 = 128;

/// Largest accepted canvas edge, in pixels.
pub const MAX_CANVAS_SIDE: u32 = 16384;

/// Brush settings read by every stamp. Passed explicitly into the stamping
/// calls so the painter holds no UI-bound state of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleState {
    pub shape: ShapeKind,
    pub fill: FillMode,
    pub brush_size: u32,
    pub opacity: u8,
}

impl Default for StyleState {
    fn default() -> Self {
        Self {
            shape: ShapeKind::Circle,
            fill: FillMode::Filled,
            brush_size: DEFAULT_BRUSH_SIZE,
            opacity: DEFAULT_OPACITY,
        }
    }
}

impl StyleState {
    pub fn new(shape: ShapeKind, fill: FillMode) -> Self {
        Self { shape, fill, ..Self::default() }
    }

    pub fn set_brush_size(&mut self, size: u32) -> Result<()> {
        if !BRUSH_SIZES.contains(&size) {
            return Err(Error::InvalidBrushSize(size));
        }
        self.brush_size = size;
        log::debug!("brush size changed to {}px", size);
        Ok(())
    }

    pub fn set_opacity(&mut self, opacity: u32) -> Result<()> {
        match u8::try_from(opacity) {
            Ok(a) if a >= 1 => {
                self.opacity = a;
                Ok(())
            }
            _ => Err(Error::InvalidOpacity(opacity)),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !BRUSH_SIZES.contains(&self.brush_size) {
            return Err(Error::InvalidBrushSize(self.brush_size));
        }
        if self.opacity == 0 {
            return Err(Error::InvalidOpacity(0));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
    /// Alpha of the white wash painted over the base image after a reset.
    /// Zero leaves the image untouched.
    pub wash_alpha: u8,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self { width: 600, height: 600, wash_alpha: 200 }
    }
}

impl CanvasConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, ..Self::default() }
    }

    pub fn validate(&self) -> Result<()> {
        let too_large = self.width > MAX_CANVAS_SIDE
            || self.height > MAX_CANVAS_SIDE
            || (self.width as usize)
                .checked_mul(self.height as usize)
                .and_then(|n| n.checked_mul(4))
                .is_none();
        if self.width == 0 || self.height == 0 || too_large {
            return Err(Error::InvalidCanvas { width: self.width, height: self.height });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PainterConfig {
    pub canvas: CanvasConfig,
    pub style: StyleState,
}

impl PainterConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let config: PainterConfig = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.canvas.validate()?;
        self.style.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_controls() {
        let style = StyleState::default();
        assert_eq!(style.shape, ShapeKind::Circle);
        assert_eq!(style.fill, FillMode::Filled);
        assert_eq!(style.brush_size, 100);
        assert_eq!(style.opacity, 128);
        assert!(style.validate().is_ok());
    }

    #[test]
    fn brush_size_must_be_selectable() {
        let mut style = StyleState::default();
        assert!(style.set_brush_size(25).is_ok());
        assert_eq!(style.brush_size, 25);
        assert!(matches!(style.set_brush_size(30), Err(Error::InvalidBrushSize(30))));
        assert_eq!(style.brush_size, 25);
    }

    #[test]
    fn opacity_range_is_one_to_255() {
        let mut style = StyleState::default();
        assert!(style.set_opacity(1).is_ok());
        assert!(style.set_opacity(255).is_ok());
        assert!(matches!(style.set_opacity(0), Err(Error::InvalidOpacity(0))));
        assert!(matches!(style.set_opacity(256), Err(Error::InvalidOpacity(256))));
        assert_eq!(style.opacity, 255);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config = PainterConfig::from_json(
            r#"{ "canvas": { "width": 320 }, "style": { "shape": "triangle", "fill": "outline" } }"#,
        )
        .unwrap();
        assert_eq!(config.canvas.width, 320);
        assert_eq!(config.canvas.height, 600);
        assert_eq!(config.canvas.wash_alpha, 200);
        assert_eq!(config.style.shape, ShapeKind::Triangle);
        assert_eq!(config.style.fill, FillMode::Outline);
        assert_eq!(config.style.opacity, 128);
    }

    #[test]
    fn invalid_json_values_are_rejected() {
        assert!(matches!(
            PainterConfig::from_json(r#"{ "style": { "brush_size": 7 } }"#),
            Err(Error::InvalidBrushSize(7))
        ));
        assert!(matches!(
            PainterConfig::from_json(r#"{ "canvas": { "height": 0 } }"#),
            Err(Error::InvalidCanvas { height: 0, .. })
        ));
        assert!(matches!(PainterConfig::from_json("{ nope"), Err(Error::Config(_))));
    }

    #[test]
    fn oversized_canvas_is_rejected() {
        assert!(matches!(
            PainterConfig::from_json(r#"{ "canvas": { "width": 4294967295, "height": 4294967295 } }"#),
            Err(Error::InvalidCanvas { width: 4294967295, height: 4294967295 })
        ));
        assert!(CanvasConfig::new(MAX_CANVAS_SIDE + 1, 10).validate().is_err());
        assert!(CanvasConfig::new(MAX_CANVAS_SIDE, 10).validate().is_ok());
    }

    #[test]
    fn new_style_keeps_default_brush() {
        let style = StyleState::new(ShapeKind::Line, FillMode::Outline);
        assert_eq!(style.shape, ShapeKind::Line);
        assert_eq!(style.fill, FillMode::Outline);
        assert_eq!(style.brush_size, DEFAULT_BRUSH_SIZE);
        assert_eq!(style.opacity, DEFAULT_OPACITY);
    }
}
