use crate::error::Result;
use crate::{Color, Point};
use ab_glyph::{point, Font, FontVec, PxScale, ScaleFont};
use font_kit::family_name::FamilyName;
use font_kit::properties::Properties;
use font_kit::source::SystemSource;
use image::{imageops, ImageBuffer, RgbaImage};
use std::ops::Range;
use std::path::Path;

/// Immediate-mode raster target. Every draw call blends straight into the
/// pixel buffer; nothing is retained.
pub struct Canvas {
    pub pixels: RgbaImage,
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: ImageBuffer::new(width, height),
            width,
            height,
        }
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Color {
        Color::from(*self.pixels.get_pixel(x, y))
    }

    /// Paints `color` over the whole canvas. An opaque colour replaces the
    /// contents, a translucent one washes over them.
    pub fn fill(&mut self, color: Color) {
        for pixel in self.pixels.pixels_mut() {
            *pixel = blend(Color::from(*pixel), color).into();
        }
    }

    /// Copies `image` into the top-left corner as the new base layer.
    pub fn draw_image(&mut self, image: &RgbaImage) {
        imageops::replace(&mut self.pixels, image, 0, 0);
    }

    pub fn blend_pixel(&mut self, x: u32, y: u32, color: Color) {
        if x >= self.width || y >= self.height {
            return;
        }
        let dst = Color::from(*self.pixels.get_pixel(x, y));
        self.pixels.put_pixel(x, y, blend(dst, color).into());
    }

    pub fn fill_circle(&mut self, cx: f64, cy: f64, r: f64, color: Color) {
        let r2 = r * r;
        self.cover(cx - r, cy - r, cx + r, cy + r, color, |px, py| {
            let dx = px - cx;
            let dy = py - cy;
            dx * dx + dy * dy <= r2
        });
    }

    pub fn stroke_circle(&mut self, cx: f64, cy: f64, r: f64, weight: f64, color: Color) {
        let half = stroke_half(weight);
        let reach = r + half;
        self.cover(cx - reach, cy - reach, cx + reach, cy + reach, color, |px, py| {
            let d = ((px - cx).powi(2) + (py - cy).powi(2)).sqrt();
            (d - r).abs() <= half
        });
    }

    pub fn fill_square(&mut self, cx: f64, cy: f64, w: f64, color: Color) {
        let half = w / 2.0;
        self.cover(cx - half, cy - half, cx + half, cy + half, color, |px, py| {
            inside_square(px, py, cx, cy, half)
        });
    }

    /// Square outline with mitred corners, stroke centred on the edges.
    pub fn stroke_square(&mut self, cx: f64, cy: f64, w: f64, weight: f64, color: Color) {
        let half = stroke_half(weight);
        let outer = w / 2.0 + half;
        let inner = w / 2.0 - half;
        self.cover(cx - outer, cy - outer, cx + outer, cy + outer, color, |px, py| {
            inside_square(px, py, cx, cy, outer) && !(inner > 0.0 && inside_square(px, py, cx, cy, inner))
        });
    }

    pub fn fill_triangle(&mut self, vertices: [Point; 3], color: Color) {
        let [a, b, c] = vertices;
        let (x0, y0, x1, y1) = bounds(&vertices);
        self.cover(x0, y0, x1, y1, color, |px, py| {
            let p = Point::new(px, py);
            let d1 = edge(a, b, p);
            let d2 = edge(b, c, p);
            let d3 = edge(c, a, p);
            let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
            let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
            !(has_neg && has_pos)
        });
    }

    pub fn stroke_triangle(&mut self, vertices: [Point; 3], weight: f64, color: Color) {
        let half = stroke_half(weight);
        let [a, b, c] = vertices;
        let (x0, y0, x1, y1) = bounds(&vertices);
        self.cover(x0 - half, y0 - half, x1 + half, y1 + half, color, |px, py| {
            let p = Point::new(px, py);
            segment_distance(p, a, b) <= half
                || segment_distance(p, b, c) <= half
                || segment_distance(p, c, a) <= half
        });
    }

    /// Line segment with round caps.
    pub fn stroke_line(&mut self, from: Point, to: Point, weight: f64, color: Color) {
        let half = stroke_half(weight);
        let (x0, y0, x1, y1) = bounds(&[from, to]);
        self.cover(x0 - half, y0 - half, x1 + half, y1 + half, color, |px, py| {
            segment_distance(Point::new(px, py), from, to) <= half
        });
    }

    /// Draws a single line of text centred on (cx, cy).
    pub fn draw_text_centered<F: Font>(&mut self, font: &F, text: &str, size: f32, cx: f64, cy: f64, color: Color) {
        let scale = PxScale::from(size);
        let scaled = font.as_scaled(scale);

        let ids: Vec<_> = text.chars().map(|ch| scaled.glyph_id(ch)).collect();
        let advance: f32 = ids.iter().map(|&id| scaled.h_advance(id)).sum();

        let baseline = cy as f32 + (scaled.ascent() + scaled.descent()) / 2.0;
        let mut caret = cx as f32 - advance / 2.0;

        for id in ids {
            let glyph = id.with_scale_and_position(scale, point(caret, baseline));
            caret += scaled.h_advance(id);

            let Some(outlined) = font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                // Hard edges, no antialiasing.
                if coverage <= 0.5 {
                    return;
                }
                let px = bounds.min.x as i64 + gx as i64;
                let py = bounds.min.y as i64 + gy as i64;
                if px >= 0 && py >= 0 {
                    self.blend_pixel(px as u32, py as u32, color);
                }
            });
        }
    }

    /// Fallback for `draw_text_centered` when no outline font is available:
    /// an 8x8 bitmap face scaled up to roughly `size` pixels tall.
    pub fn draw_bitmap_text_centered(&mut self, text: &str, size: f32, cx: f64, cy: f64, color: Color) {
        let scale = (size / 8.0).round().max(1.0) as i64;
        let cell = 8 * scale;
        let count = text.chars().count() as i64;

        let left = cx.round() as i64 - count * cell / 2;
        let top = cy.round() as i64 - cell / 2;

        for (i, ch) in text.chars().enumerate() {
            let Some(rows) = bitmap_glyph(ch) else {
                continue;
            };
            let x0 = left + i as i64 * cell;
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..8 {
                    if (bits >> (7 - col)) & 1 == 0 {
                        continue;
                    }
                    for sy in 0..scale {
                        for sx in 0..scale {
                            let px = x0 + col * scale + sx;
                            let py = top + row as i64 * scale + sy;
                            if px >= 0 && py >= 0 {
                                self.blend_pixel(px as u32, py as u32, color);
                            }
                        }
                    }
                }
            }
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.pixels.save(path)?;
        Ok(())
    }

    /// Blends `color` into every pixel of the clipped box whose centre
    /// satisfies `hit`.
    fn cover<H>(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, color: Color, hit: H)
    where
        H: Fn(f64, f64) -> bool,
    {
        for y in span(y0, y1, self.height) {
            for x in span(x0, x1, self.width) {
                if hit(x as f64 + 0.5, y as f64 + 0.5) {
                    self.blend_pixel(x, y, color);
                }
            }
        }
    }
}

/// Source-over compositing of `src` onto `dst`.
pub fn blend(dst: Color, src: Color) -> Color {
    if src.a == 255 {
        return src;
    }
    if src.a == 0 {
        return dst;
    }

    let a1 = src.a as f64 / 255.0;
    let a0 = dst.a as f64 / 255.0;
    let a = a1 + a0 * (1.0 - a1);

    let channel = |s: u8, d: u8| -> u8 {
        let v = (s as f64 * a1 + d as f64 * a0 * (1.0 - a1)) / a;
        v.round().clamp(0.0, 255.0) as u8
    };

    Color {
        r: channel(src.r, dst.r),
        g: channel(src.g, dst.g),
        b: channel(src.b, dst.b),
        a: (a * 255.0).round().clamp(0.0, 255.0) as u8,
    }
}

/// Looks up a sans-serif face on the host for overlay text.
pub fn load_system_font() -> Option<FontVec> {
    let source = SystemSource::new();
    let families = [
        FamilyName::Title("Arial".into()),
        FamilyName::Title("DejaVu Sans".into()),
        FamilyName::SansSerif,
    ];

    for family in &families {
        let Ok(handle) = source.select_best_match(&[family.clone()], &Properties::new()) else {
            continue;
        };
        let Ok(font) = handle.load() else {
            continue;
        };
        if let Some(data) = font.copy_font_data() {
            if let Ok(font) = FontVec::try_from_vec((*data).clone()) {
                return Some(font);
            }
        }
    }

    None
}

/// Rows of the built-in 8x8 face, most significant bit leftmost. Only the
/// characters the painter draws itself, plus digits and capitals.
fn bitmap_glyph(ch: char) -> Option<[u8; 8]> {
    let rows = match ch {
        ' ' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x18, 0x18, 0x00],
        '!' => [0x18, 0x18, 0x18, 0x18, 0x00, 0x00, 0x18, 0x00],
        '0' => [0x3C, 0x46, 0x4A, 0x52, 0x62, 0x62, 0x3C, 0x00],
        '1' => [0x18, 0x28, 0x08, 0x08, 0x08, 0x08, 0x3E, 0x00],
        '2' => [0x3C, 0x42, 0x02, 0x0C, 0x30, 0x40, 0x7E, 0x00],
        '3' => [0x3C, 0x42, 0x02, 0x1C, 0x02, 0x42, 0x3C, 0x00],
        '4' => [0x08, 0x18, 0x28, 0x48, 0x7E, 0x08, 0x08, 0x00],
        '5' => [0x7E, 0x40, 0x7C, 0x02, 0x02, 0x42, 0x3C, 0x00],
        '6' => [0x3C, 0x40, 0x40, 0x7C, 0x42, 0x42, 0x3C, 0x00],
        '7' => [0x7E, 0x02, 0x04, 0x08, 0x10, 0x20, 0x20, 0x00],
        '8' => [0x3C, 0x42, 0x42, 0x3C, 0x42, 0x42, 0x3C, 0x00],
        '9' => [0x3C, 0x42, 0x42, 0x3E, 0x02, 0x02, 0x3C, 0x00],
        'A' => [0x18, 0x24, 0x42, 0x42, 0x7E, 0x42, 0x42, 0x00],
        'E' => [0x7E, 0x40, 0x40, 0x7C, 0x40, 0x40, 0x7E, 0x00],
        'I' => [0x3E, 0x08, 0x08, 0x08, 0x08, 0x08, 0x3E, 0x00],
        'L' => [0x40, 0x40, 0x40, 0x40, 0x40, 0x40, 0x7E, 0x00],
        'O' => [0x3C, 0x42, 0x42, 0x42, 0x42, 0x42, 0x3C, 0x00],
        'W' => [0x42, 0x42, 0x42, 0x42, 0x5A, 0x66, 0x42, 0x00],
        'a' => [0x00, 0x00, 0x3C, 0x02, 0x3E, 0x42, 0x3E, 0x00],
        'e' => [0x00, 0x00, 0x3C, 0x42, 0x7E, 0x40, 0x3C, 0x00],
        'f' => [0x0C, 0x10, 0x10, 0x7C, 0x10, 0x10, 0x10, 0x00],
        'g' => [0x00, 0x00, 0x3E, 0x42, 0x42, 0x3E, 0x02, 0x3C],
        'i' => [0x08, 0x00, 0x18, 0x08, 0x08, 0x08, 0x1C, 0x00],
        'm' => [0x00, 0x00, 0x76, 0x49, 0x49, 0x49, 0x49, 0x00],
        'n' => [0x00, 0x00, 0x5C, 0x62, 0x42, 0x42, 0x42, 0x00],
        'o' => [0x00, 0x00, 0x3C, 0x42, 0x42, 0x42, 0x3C, 0x00],
        'r' => [0x00, 0x00, 0x5C, 0x62, 0x40, 0x40, 0x40, 0x00],
        's' => [0x00, 0x00, 0x3E, 0x40, 0x3C, 0x02, 0x7C, 0x00],
        't' => [0x10, 0x10, 0x7C, 0x10, 0x10, 0x12, 0x0C, 0x00],
        _ => return None,
    };
    Some(rows)
}

// Hairline strokes still cover one pixel.
fn stroke_half(weight: f64) -> f64 {
    weight.max(1.0) / 2.0
}

fn inside_square(px: f64, py: f64, cx: f64, cy: f64, half: f64) -> bool {
    px >= cx - half && px < cx + half && py >= cy - half && py < cy + half
}

fn edge(a: Point, b: Point, p: Point) -> f64 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len2 = dx * dx + dy * dy;
    let t = if len2 == 0.0 {
        0.0
    } else {
        (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0)
    };
    let qx = a.x + t * dx;
    let qy = a.y + t * dy;
    ((p.x - qx).powi(2) + (p.y - qy).powi(2)).sqrt()
}

fn bounds(points: &[Point]) -> (f64, f64, f64, f64) {
    points.iter().fold(
        (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        |(x0, y0, x1, y1), p| (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
    )
}

fn span(lo: f64, hi: f64, limit: u32) -> Range<u32> {
    if !(lo.is_finite() && hi.is_finite()) {
        return 0..0;
    }
    let start = lo.floor().max(0.0).min(limit as f64) as u32;
    let end = hi.ceil().max(0.0).min(limit as f64) as u32;
    start..end.max(start)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Color = Color::new(255, 0, 0, 255);

    fn white_canvas(w: u32, h: u32) -> Canvas {
        let mut canvas = Canvas::new(w, h);
        canvas.fill(Color::WHITE);
        canvas
    }

    #[test]
    fn blend_half_red_over_white() {
        let out = blend(Color::WHITE, Color::new(255, 0, 0, 128));
        assert_eq!(out.r, 255);
        assert_eq!(out.g, 127);
        assert_eq!(out.a, 255);
        assert_eq!(blend(Color::WHITE, Color::TRANSPARENT), Color::WHITE);
    }

    #[test]
    fn filled_circle_covers_centre_not_corners() {
        let mut canvas = white_canvas(20, 20);
        canvas.fill_circle(10.0, 10.0, 5.0, RED);
        assert_eq!(canvas.get_pixel(10, 10), RED);
        assert_eq!(canvas.get_pixel(6, 10), RED);
        assert_eq!(canvas.get_pixel(5, 5), Color::WHITE);
        assert_eq!(canvas.get_pixel(0, 0), Color::WHITE);
    }

    #[test]
    fn circle_outline_leaves_centre_empty() {
        let mut canvas = white_canvas(40, 40);
        canvas.stroke_circle(20.0, 20.0, 10.0, 2.0, RED);
        assert_eq!(canvas.get_pixel(20, 20), Color::WHITE);
        assert_eq!(canvas.get_pixel(29, 19), RED);
    }

    #[test]
    fn square_fill_and_outline() {
        let mut canvas = white_canvas(30, 30);
        canvas.fill_square(5.0, 5.0, 10.0, RED);
        assert_eq!(canvas.get_pixel(0, 0), RED);
        assert_eq!(canvas.get_pixel(9, 9), RED);
        assert_eq!(canvas.get_pixel(10, 10), Color::WHITE);

        canvas.stroke_square(20.0, 20.0, 10.0, 2.0, RED);
        assert_eq!(canvas.get_pixel(20, 20), Color::WHITE);
        assert_eq!(canvas.get_pixel(15, 20), RED);
        assert_eq!(canvas.get_pixel(14, 14), RED);
    }

    #[test]
    fn triangle_fill_ignores_winding() {
        let cw = [Point::new(2.0, 18.0), Point::new(18.0, 18.0), Point::new(10.0, 2.0)];
        let ccw = [cw[0], cw[2], cw[1]];
        for vertices in [cw, ccw] {
            let mut canvas = white_canvas(20, 20);
            canvas.fill_triangle(vertices, RED);
            assert_eq!(canvas.get_pixel(10, 14), RED);
            assert_eq!(canvas.get_pixel(1, 1), Color::WHITE);
        }
    }

    #[test]
    fn line_is_clipped_to_canvas() {
        let mut canvas = white_canvas(10, 10);
        canvas.stroke_line(Point::new(-20.0, 5.0), Point::new(30.0, 5.0), 2.0, RED);
        for x in 0..10 {
            assert_eq!(canvas.get_pixel(x, 5), RED);
        }
        assert_eq!(canvas.get_pixel(5, 0), Color::WHITE);
    }

    #[test]
    fn shapes_entirely_off_canvas_draw_nothing() {
        let mut canvas = white_canvas(10, 10);
        canvas.fill_circle(-50.0, -50.0, 5.0, RED);
        canvas.fill_square(100.0, 3.0, 4.0, RED);
        assert!(canvas.pixels.pixels().all(|p| Color::from(*p) == Color::WHITE));
    }

    #[test]
    fn bitmap_text_is_centred() {
        let gray = Color::gray(150);
        let mut canvas = white_canvas(100, 40);
        canvas.draw_bitmap_text_centered("OO", 16.0, 50.0, 20.0, gray);

        // Two 16px cells spanning x 34..66, y 12..28.
        let inked: Vec<(u32, u32)> = canvas
            .pixels
            .enumerate_pixels()
            .filter(|(_, _, p)| Color::from(**p) == gray)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!inked.is_empty());
        assert!(inked.iter().all(|&(x, y)| (34..66).contains(&x) && (12..28).contains(&y)));
    }

    #[test]
    fn bitmap_text_skips_unknown_characters_and_clips() {
        let mut canvas = white_canvas(10, 10);
        canvas.draw_bitmap_text_centered("~", 32.0, 5.0, 5.0, RED);
        assert!(canvas.pixels.pixels().all(|p| Color::from(*p) == Color::WHITE));
        canvas.draw_bitmap_text_centered("Waiting", 32.0, 0.0, 0.0, RED);
        assert!(canvas.pixels.pixels().any(|p| Color::from(*p) == RED));
    }

    #[test]
    fn translucent_fill_washes_over_existing_pixels() {
        let mut canvas = Canvas::new(2, 2);
        canvas.fill(Color::new(0, 0, 0, 255));
        canvas.fill(Color::new(255, 255, 255, 200));
        assert_eq!(canvas.get_pixel(1, 1), Color::new(200, 200, 200, 255));
    }
}
