use crate::config::{CanvasConfig, StyleState};
use crate::error::{Error, Result};
use crate::renderer::{load_system_font, Canvas};
use crate::{ActionKind, ActionLog, Color, FillMode, Point, ShapeKind};
use ab_glyph::FontVec;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageResult, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::{SQRT_2, TAU};
use std::path::Path;

pub const DEFAULT_SCATTER_COUNT: usize = 1000;

const PLACEHOLDER_TEXT: &str = "Waiting for image...";
const PLACEHOLDER_TEXT_SIZE: f32 = 32.0;
const PLACEHOLDER_TEXT_GRAY: u8 = 150;

/// Handle for one pending image load. Only the most recent one is honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

/// Where the source image is in its lifecycle. This is the single readiness
/// signal: stamping only happens in `Ready`.
enum Source {
    Empty,
    Loading { ticket: u64 },
    Ready(RgbaImage),
}

/// Stamps shapes coloured from a background image onto a canvas and keeps a
/// log of what it drew.
pub struct Stamper {
    canvas: Canvas,
    config: CanvasConfig,
    source: Source,
    actions: ActionLog,
    font: Option<FontVec>,
    next_ticket: u64,
}

impl Stamper {
    pub fn new(config: CanvasConfig) -> Result<Self> {
        let font = load_system_font();
        if font.is_none() {
            log::warn!("no system font found, placeholder text falls back to the bitmap face");
        }
        Self::with_font(config, font)
    }

    /// A stamper that skips the system font lookup. Placeholder text uses the
    /// built-in bitmap face.
    pub fn without_font(config: CanvasConfig) -> Result<Self> {
        Self::with_font(config, None)
    }

    pub fn with_font(config: CanvasConfig, font: Option<FontVec>) -> Result<Self> {
        config.validate()?;
        let mut stamper = Self {
            canvas: Canvas::new(config.width, config.height),
            config,
            source: Source::Empty,
            actions: ActionLog::new(),
            font,
            next_ticket: 0,
        };
        stamper.reset();
        Ok(stamper)
    }

    pub fn width(&self) -> u32 {
        self.canvas.width
    }

    pub fn height(&self) -> u32 {
        self.canvas.height
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn actions(&self) -> &ActionLog {
        &self.actions
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.source, Source::Ready(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.source, Source::Loading { .. })
    }

    /// The source image, already scaled to the canvas.
    pub fn source_image(&self) -> Option<&RgbaImage> {
        match &self.source {
            Source::Ready(image) => Some(image),
            _ => None,
        }
    }

    /// Starts a load. The current image is dropped and stamping is ignored
    /// until the matching `complete_load`.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.next_ticket += 1;
        self.source = Source::Loading { ticket: self.next_ticket };
        log::info!("loading image (request {})", self.next_ticket);
        LoadTicket(self.next_ticket)
    }

    /// Finishes a load started by `begin_load`.
    ///
    /// Returns `Ok(false)` when a newer load has been started since, in which
    /// case `decoded` is discarded. A decode failure leaves the painter empty
    /// with the placeholder showing.
    pub fn complete_load(&mut self, ticket: LoadTicket, decoded: ImageResult<DynamicImage>) -> Result<bool> {
        match self.source {
            Source::Loading { ticket: pending } if pending == ticket.0 => {}
            _ => {
                log::debug!("discarding stale image load (request {})", ticket.0);
                return Ok(false);
            }
        }

        match decoded {
            Ok(image) => {
                log::info!("image decoded: {}x{}", image.width(), image.height());
                self.source = Source::Ready(image.to_rgba8());
                self.reset();
                Ok(true)
            }
            Err(err) => {
                log::debug!("image decode failed: {}", err);
                self.source = Source::Empty;
                self.reset();
                Err(Error::Decode(err))
            }
        }
    }

    pub fn load_image<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let ticket = self.begin_load();
        let decoded = image::open(path);
        self.complete_load(ticket, decoded).map(|_| ())
    }

    pub fn load_image_from_memory(&mut self, bytes: &[u8]) -> Result<()> {
        let ticket = self.begin_load();
        let decoded = image::load_from_memory(bytes);
        self.complete_load(ticket, decoded).map(|_| ())
    }

    pub fn load_decoded(&mut self, image: DynamicImage) {
        let ticket = self.begin_load();
        // The ticket was issued just above, so this cannot be stale or fail.
        let _ = self.complete_load(ticket, Ok(image));
    }

    /// Clears the action log and repaints the base layer: the source image
    /// scaled to the canvas under a white wash, or the waiting placeholder.
    pub fn reset(&mut self) {
        self.actions.clear();

        let (width, height) = (self.canvas.width, self.canvas.height);
        match &mut self.source {
            Source::Ready(image) => {
                if image.dimensions() != (width, height) {
                    *image = imageops::resize(&*image, width, height, FilterType::Triangle);
                }
                self.canvas.draw_image(image);
                if self.config.wash_alpha > 0 {
                    self.canvas.fill(Color::WHITE.with_alpha(self.config.wash_alpha));
                }
                log::info!("canvas reset to {}x{} image", width, height);
            }
            Source::Empty | Source::Loading { .. } => {
                let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
                let gray = Color::gray(PLACEHOLDER_TEXT_GRAY);
                self.canvas.fill(Color::WHITE);
                match &self.font {
                    Some(font) => {
                        self.canvas.draw_text_centered(font, PLACEHOLDER_TEXT, PLACEHOLDER_TEXT_SIZE, cx, cy, gray)
                    }
                    None => self.canvas.draw_bitmap_text_centered(PLACEHOLDER_TEXT, PLACEHOLDER_TEXT_SIZE, cx, cy, gray),
                }
                log::debug!("canvas reset to placeholder");
            }
        }
    }

    /// Stamps one shape at (x, y) using the colour under that point.
    /// Ignored when no image is ready or the point is off the canvas.
    pub fn stamp_at(&mut self, x: f64, y: f64, style: &StyleState) {
        if !self.in_bounds(x, y) {
            return;
        }
        let Some(sampled) = self.sample(x, y) else {
            return;
        };

        let color = sampled.with_alpha(style.opacity);
        let size = style.brush_size as f64;

        match (style.shape, style.fill) {
            (ShapeKind::Circle, FillMode::Filled) => self.circle_filled(x, y, size, color),
            (ShapeKind::Circle, FillMode::Outline) => self.circle_outline(x, y, size, color),
            (ShapeKind::Square, FillMode::Filled) => self.square_filled(x, y, size, color),
            (ShapeKind::Square, FillMode::Outline) => self.square_outline(x, y, size, color),
            (ShapeKind::Triangle, FillMode::Filled) => self.triangle_filled(x, y, size, color),
            (ShapeKind::Triangle, FillMode::Outline) => self.triangle_outline(x, y, size, color),
            (ShapeKind::Line, _) => self.line(x, y, size, color),
        }
    }

    /// Stamps `count` points spread uniformly over the canvas.
    ///
    /// The positions come from a generator seeded with `seed`, or with a
    /// fresh random seed when `None`. Returns the seed used, or `None` if no
    /// image is ready.
    pub fn random_scatter(&mut self, count: usize, seed: Option<u64>, style: &StyleState) -> Option<u64> {
        if !self.is_ready() {
            return None;
        }

        let seed = seed.unwrap_or_else(|| rand::thread_rng().gen());
        let mut rng = StdRng::seed_from_u64(seed);
        let (width, height) = (self.canvas.width as f64, self.canvas.height as f64);

        log::debug!("scattering {} stamps with seed {}", count, seed);
        for _ in 0..count {
            let x = rng.gen::<f64>() * width;
            let y = rng.gen::<f64>() * height;
            self.stamp_at(x, y, style);
        }

        Some(seed)
    }

    /// Covers the canvas with filled squares of side `size`, each coloured
    /// from the top-left pixel of its cell.
    ///
    /// The grid is `ceil(width / size)` cells along both axes, also on
    /// non-square canvases: rows past the bottom edge are still stamped
    /// (clipped, sampled as transparent black) and rows are missing when the
    /// canvas is taller than it is wide.
    pub fn pixelate(&mut self, size: u32, style: &StyleState) {
        if !self.is_ready() || size == 0 {
            return;
        }

        let n = self.canvas.width.div_ceil(size);
        let side = size as f64;
        log::debug!("pixelating with {}px cells, {}x{} grid", size, n, n);

        for i in 0..n {
            for j in 0..n {
                let x = (i * size) as f64;
                let y = (j * size) as f64;
                let color = self.sample(x, y).unwrap_or(Color::TRANSPARENT).with_alpha(style.opacity);
                self.square_filled(x + side / 2.0, y + side / 2.0, side, color);
            }
        }
    }

    fn in_bounds(&self, x: f64, y: f64) -> bool {
        x >= 0.0 && y >= 0.0 && x < self.canvas.width as f64 && y < self.canvas.height as f64
    }

    /// Colour of the source pixel containing (x, y); transparent black off
    /// the image. `None` when no image is ready.
    fn sample(&self, x: f64, y: f64) -> Option<Color> {
        let Source::Ready(image) = &self.source else {
            return None;
        };
        if x < 0.0 || y < 0.0 {
            return Some(Color::TRANSPARENT);
        }
        let (px, py) = (x.floor() as u32, y.floor() as u32);
        if px >= image.width() || py >= image.height() {
            return Some(Color::TRANSPARENT);
        }
        Some(Color::from(*image.get_pixel(px, py)))
    }

    fn record(&mut self, kind: ActionKind) {
        self.actions.push(kind);
        if log::log_enabled!(log::Level::Trace) {
            if let Some(action) = self.actions.last() {
                log::trace!("{}", serde_json::to_string(action).unwrap_or_default());
            }
        }
    }

    fn circle_filled(&mut self, x: f64, y: f64, d: f64, c: Color) {
        let r = d / 2.0;
        self.canvas.fill_circle(x, y, r, c);
        self.record(ActionKind::CircleFilled { x, y, r, c });
    }

    fn circle_outline(&mut self, x: f64, y: f64, d: f64, c: Color) {
        let r = d / 2.0;
        let s = r / 5.0;
        self.canvas.stroke_circle(x, y, r, s, c);
        self.record(ActionKind::CircleOutline { x, y, r, s, c });
    }

    fn square_filled(&mut self, x: f64, y: f64, w: f64, c: Color) {
        self.canvas.fill_square(x, y, w, c);
        self.record(ActionKind::SquareFilled { x, y, w, c });
    }

    fn square_outline(&mut self, x: f64, y: f64, w: f64, c: Color) {
        let s = w / 5.0;
        self.canvas.stroke_square(x, y, w, s, c);
        self.record(ActionKind::SquareOutline { x, y, w, s, c });
    }

    fn triangle_filled(&mut self, x: f64, y: f64, w: f64, c: Color) {
        let vertices = triangle_vertices(x, y, w);
        self.canvas.fill_triangle(vertices, c);
        self.record(ActionKind::TriangleFilled { vertices, c });
    }

    fn triangle_outline(&mut self, x: f64, y: f64, w: f64, c: Color) {
        let vertices = triangle_vertices(x, y, w);
        let s = w / 5.0;
        self.canvas.stroke_triangle(vertices, s, c);
        self.record(ActionKind::TriangleOutline { vertices, s, c });
    }

    /// A segment of length `len` through (x, y) at a random angle. The angle
    /// is drawn from the thread generator, not the scatter seed.
    fn line(&mut self, x: f64, y: f64, len: f64, c: Color) {
        let angle = rand::thread_rng().gen_range(0.0..TAU);
        let half = len / 2.0;
        let (sin, cos) = angle.sin_cos();
        let (x1, y1) = (x + half * cos, y + half * sin);
        let (x2, y2) = (x - half * cos, y - half * sin);
        let s = len / 5.0;

        self.canvas.stroke_line(Point::new(x1, y1), Point::new(x2, y2), s, c);
        self.record(ActionKind::Line { x1, y1, x2, y2, s, c });
    }
}

/// Isosceles triangle: base of width `w` at `y + w/2`, apex above the centre.
fn triangle_vertices(x: f64, y: f64, w: f64) -> [Point; 3] {
    [
        Point::new(x - w / 2.0, y + w / 2.0),
        Point::new(x + w / 2.0, y + w / 2.0),
        Point::new(x, y - w * SQRT_2 / 4.0),
    ]
}
