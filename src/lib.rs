pub mod config;
pub mod error;
pub mod logging;
pub mod renderer;
pub mod stamper;

pub use config::{CanvasConfig, PainterConfig, StyleState, BRUSH_SIZES};
pub use error::{Error, Result};
pub use stamper::{LoadTicket, Stamper};

use serde::{Deserialize, Serialize};
use std::slice;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255, a: 255 };
    pub const TRANSPARENT: Color = Color { r: 0, g: 0, b: 0, a: 0 };

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn gray(v: u8) -> Self {
        Self { r: v, g: v, b: v, a: 255 }
    }

    /// Same colour with its alpha channel replaced.
    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }
}

impl From<image::Rgba<u8>> for Color {
    fn from(pixel: image::Rgba<u8>) -> Self {
        let [r, g, b, a] = pixel.0;
        Self { r, g, b, a }
    }
}

impl From<Color> for image::Rgba<u8> {
    fn from(color: Color) -> Self {
        image::Rgba([color.r, color.g, color.b, color.a])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    #[default]
    Circle,
    Square,
    Triangle,
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMode {
    #[default]
    Filled,
    Outline,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Geometry of one stamp as it was drawn. Field names follow the short keys
/// used by the drawing routines: `r` radius, `w` side, `s` stroke weight,
/// `c` colour.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ActionKind {
    CircleFilled { x: f64, y: f64, r: f64, c: Color },
    CircleOutline { x: f64, y: f64, r: f64, s: f64, c: Color },
    SquareFilled { x: f64, y: f64, w: f64, c: Color },
    SquareOutline { x: f64, y: f64, w: f64, s: f64, c: Color },
    TriangleFilled { vertices: [Point; 3], c: Color },
    TriangleOutline { vertices: [Point; 3], s: f64, c: Color },
    Line { x1: f64, y1: f64, x2: f64, y2: f64, s: f64, c: Color },
}

impl ActionKind {
    pub fn type_tag(&self) -> &'static str {
        match self {
            ActionKind::CircleFilled { .. } => "circle-filled",
            ActionKind::CircleOutline { .. } => "circle-outline",
            ActionKind::SquareFilled { .. } => "square-filled",
            ActionKind::SquareOutline { .. } => "square-outline",
            ActionKind::TriangleFilled { .. } => "triangle-filled",
            ActionKind::TriangleOutline { .. } => "triangle-outline",
            ActionKind::Line { .. } => "line",
        }
    }

    pub fn color(&self) -> Color {
        match *self {
            ActionKind::CircleFilled { c, .. }
            | ActionKind::CircleOutline { c, .. }
            | ActionKind::SquareFilled { c, .. }
            | ActionKind::SquareOutline { c, .. }
            | ActionKind::TriangleFilled { c, .. }
            | ActionKind::TriangleOutline { c, .. }
            | ActionKind::Line { c, .. } => c,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    pub id: u64,
    #[serde(flatten)]
    pub kind: ActionKind,
}

impl Action {
    pub fn type_tag(&self) -> &'static str {
        self.kind.type_tag()
    }
}

/// Append-only record of the stamps drawn since the last reset, in z-order.
/// Nothing reads it back to redraw; it describes the canvas, it does not
/// drive it.
#[derive(Debug, Clone, Default)]
pub struct ActionLog {
    actions: Vec<Action>,
    next_id: u64,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a stamp and returns the id it was given.
    pub fn push(&mut self, kind: ActionKind) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.actions.push(Action { id, kind });
        id
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn last(&self) -> Option<&Action> {
        self.actions.last()
    }

    pub fn iter(&self) -> slice::Iter<'_, Action> {
        self.actions.iter()
    }

    pub fn as_slice(&self) -> &[Action] {
        &self.actions
    }

    pub(crate) fn clear(&mut self) {
        self.actions.clear();
        self.next_id = 0;
    }
}

impl<'a> IntoIterator for &'a ActionLog {
    type Item = &'a Action;
    type IntoIter = slice::Iter<'a, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_ids_increase_and_restart_after_clear() {
        let mut log = ActionLog::new();
        let c = Color::gray(10);
        assert_eq!(log.push(ActionKind::CircleFilled { x: 1.0, y: 1.0, r: 2.0, c }), 0);
        assert_eq!(log.push(ActionKind::SquareFilled { x: 1.0, y: 1.0, w: 2.0, c }), 1);
        assert_eq!(log.len(), 2);
        assert_eq!(log.last().map(Action::type_tag), Some("square-filled"));

        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.push(ActionKind::CircleFilled { x: 0.0, y: 0.0, r: 1.0, c }), 0);
    }

    #[test]
    fn actions_serialize_with_type_tag() {
        let action = Action {
            id: 3,
            kind: ActionKind::CircleOutline { x: 5.0, y: 6.0, r: 10.0, s: 2.0, c: Color::new(1, 2, 3, 4) },
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "circle-outline");
        assert_eq!(json["id"], 3);
        assert_eq!(json["r"], 10.0);
        assert_eq!(json["c"]["a"], 4);
    }

    #[test]
    fn with_alpha_keeps_rgb() {
        let c = Color::new(10, 20, 30, 255).with_alpha(7);
        assert_eq!(c, Color::new(10, 20, 30, 7));
        let px: image::Rgba<u8> = c.into();
        assert_eq!(Color::from(px), c);
    }
}
