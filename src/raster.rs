//! Page rasteriser – paints one page element into a supersampled bitmap with
//! `tiny-skia` and encodes it as JPEG.
//!
//! The bitmap spans the capture width (the viewport width, from the page's
//! left edge) and the page's full scroll height, times the scale factor. It
//! starts out solid white. Boxes paint in this order: background colour,
//! background image, border, image content, text, list marker, children.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use rustybuzz::{Face as HbFace, UnicodeBuffer};
use thiserror::Error;
use tiny_skia::{
    FillRule, FilterQuality, Paint, Path, PathBuilder, Pixmap, PixmapPaint, Rect, Transform,
};
use ttf_parser::{GlyphId, OutlineBuilder};

use crate::config::ConvertConfig;
use crate::fonts::{FontKey, FontManager};
use crate::inline::decode_data_url;
use crate::layout::{BoxContent, PositionedBox};
use crate::segment::PageElement;
use crate::style::{Color, ComputedStyle, Display, TextAlign, TextDecoration};

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("cannot allocate a {width}x{height} px raster")]
    Allocation { width: u32, height: u32 },

    #[error("JPEG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Capture parameters shared by every page of a conversion.
#[derive(Debug, Clone, Copy)]
pub struct RasterOptions {
    /// Supersampling factor.
    pub scale: f32,
    /// JPEG quality, 1–100.
    pub jpeg_quality: u8,
}

impl RasterOptions {
    pub fn from_config(config: &ConvertConfig) -> Self {
        Self {
            scale: config.scale,
            jpeg_quality: config.jpeg_quality,
        }
    }
}

/// An encoded page bitmap.
#[derive(Debug, Clone)]
pub struct PageRaster {
    pub index: usize,
    pub width_px: u32,
    pub height_px: u32,
    /// Captured area in CSS px.
    pub capture_width: f32,
    pub capture_height: f32,
    pub jpeg: Vec<u8>,
}

/// Paint `page` at `options.scale` and encode it as JPEG.
pub fn rasterize_page(
    page: &PageElement,
    options: &RasterOptions,
    fonts: &FontManager,
) -> Result<PageRaster, RasterError> {
    let capture_height = page.scroll_height.max(1.0);
    let width_px = (page.capture_width * options.scale).round().max(1.0) as u32;
    let height_px = (capture_height * options.scale).ceil().max(1.0) as u32;

    let mut pixmap = Pixmap::new(width_px, height_px).ok_or(RasterError::Allocation {
        width: width_px,
        height: height_px,
    })?;
    pixmap.fill(tiny_skia::Color::WHITE);

    let mut painter = Painter {
        pixmap: &mut pixmap,
        fonts,
        origin_x: page.x,
        origin_y: page.y,
        scale: options.scale,
    };
    painter.paint_box(&page.root);
    log::trace!("Painted page {} at {width_px}x{height_px}", page.index);

    let jpeg = encode_jpeg(&pixmap, options.jpeg_quality)?;
    Ok(PageRaster {
        index: page.index,
        width_px,
        height_px,
        capture_width: page.capture_width,
        capture_height,
        jpeg,
    })
}

fn encode_jpeg(pixmap: &Pixmap, quality: u8) -> Result<Vec<u8>, RasterError> {
    let rgb: Vec<u8> = pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue()]
        })
        .collect();
    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100)).encode(
        &rgb,
        pixmap.width(),
        pixmap.height(),
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(out.into_inner())
}

// ---------------------------------------------------------------------------
// Painting
// ---------------------------------------------------------------------------

struct Painter<'a> {
    pixmap: &'a mut Pixmap,
    fonts: &'a FontManager,
    /// Surface coordinates of the bitmap's top-left corner.
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

impl Painter<'_> {
    fn dx(&self, x: f32) -> f32 {
        (x - self.origin_x) * self.scale
    }

    fn dy(&self, y: f32) -> f32 {
        (y - self.origin_y) * self.scale
    }

    fn paint_box(&mut self, b: &PositionedBox) {
        let s = &b.style;
        if s.display == Display::None {
            return;
        }

        if !s.background_color.is_transparent() {
            self.fill_rect(b.x, b.y, b.width, b.height, s.background_color);
        }
        if let Some(src) = &s.background_image {
            self.draw_image(src, b.x, b.y, b.width, b.height);
        }
        if s.border_width > 0.0 && !s.border_color.is_transparent() {
            self.stroke_border(b);
        }

        match &b.content {
            BoxContent::Image { src } => {
                let (x, y, w, h) = content_rect(b);
                self.draw_image(src, x, y, w, h);
            }
            BoxContent::Text { lines, .. } => self.draw_text_lines(b, lines),
            BoxContent::ListItem { marker } => self.draw_marker(b, marker),
            BoxContent::None => {}
        }

        for child in &b.children {
            self.paint_box(child);
        }
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color) {
        let Some(rect) = Rect::from_xywh(self.dx(x), self.dy(y), w * self.scale, h * self.scale)
        else {
            return;
        };
        self.pixmap
            .fill_rect(rect, &paint_for(color), Transform::identity(), None);
    }

    fn stroke_border(&mut self, b: &PositionedBox) {
        let bw = b.style.border_width;
        let color = b.style.border_color;
        self.fill_rect(b.x, b.y, b.width, bw, color);
        self.fill_rect(b.x, b.y + b.height - bw, b.width, bw, color);
        self.fill_rect(b.x, b.y, bw, b.height, color);
        self.fill_rect(b.x + b.width - bw, b.y, bw, b.height, color);
    }

    /// Draw an embedded image stretched to the given rectangle. Anything that
    /// is not a decodable data URL is skipped.
    fn draw_image(&mut self, src: &str, x: f32, y: f32, w: f32, h: f32) {
        if w <= 0.0 || h <= 0.0 {
            return;
        }
        let Some(image) = decode_data_url(src).and_then(|(_, bytes)| decode_to_pixmap(&bytes))
        else {
            log::trace!("Skipping undecodable image source ({} chars)", src.len());
            return;
        };
        let sx = w * self.scale / image.width() as f32;
        let sy = h * self.scale / image.height() as f32;
        let paint = PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        self.pixmap.draw_pixmap(
            0,
            0,
            image.as_ref(),
            &paint,
            Transform::from_row(sx, 0.0, 0.0, sy, self.dx(x), self.dy(y)),
            None,
        );
    }

    fn draw_text_lines(&mut self, b: &PositionedBox, lines: &[String]) {
        let s = &b.style;
        let key = s.font_key();
        let (cx, cy, cw, _) = content_rect(b);
        let line_height = self.fonts.line_height_px(s.font_size, s.line_height);
        let ascender = self.fonts.ascender_px(s.font_size, &key);
        let half_leading = (line_height - s.font_size) / 2.0;

        for (i, line) in lines.iter().enumerate() {
            let line_width = self.fonts.measure_text_width(line, s.font_size, &key);
            let x = match s.text_align {
                TextAlign::Left => cx,
                TextAlign::Center => cx + (cw - line_width).max(0.0) / 2.0,
                TextAlign::Right => cx + (cw - line_width).max(0.0),
            };
            let baseline = cy + i as f32 * line_height + half_leading + ascender;
            self.draw_text(line, x, baseline, s, &key);

            if s.text_decoration == TextDecoration::Underline {
                let thickness = (s.font_size / 16.0).max(1.0);
                self.fill_rect(x, baseline + s.font_size * 0.1, line_width, thickness, s.color);
            }
        }
    }

    fn draw_marker(&mut self, b: &PositionedBox, marker: &str) {
        let s = &b.style;
        let key = s.font_key();
        let width = self.fonts.measure_text_width(marker, s.font_size, &key);
        let line_height = self.fonts.line_height_px(s.font_size, s.line_height);
        let baseline = b.y
            + s.padding.top
            + (line_height - s.font_size) / 2.0
            + self.fonts.ascender_px(s.font_size, &key);
        self.draw_text(marker, b.x - width - 6.0, baseline, s, &key);
    }

    /// Draw one line of text with its baseline at surface coordinate `y`.
    fn draw_text(&mut self, text: &str, x: f32, y: f32, style: &ComputedStyle, key: &FontKey) {
        if text.trim().is_empty() {
            return;
        }
        let fonts = self.fonts;
        let paint = paint_for(style.color);
        let (bx, by) = (self.dx(x), self.dy(y));
        let size = style.font_size * self.scale;

        match fonts.font_bytes(key) {
            Some(bytes) => {
                for path in glyph_paths(bytes, text, size, bx, by) {
                    self.pixmap
                        .fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
                }
            }
            None => {
                // No outlines available: one block per visible character.
                let advance = size * if key.bold { 0.55 } else { 0.5 };
                for (i, ch) in text.chars().enumerate() {
                    if ch.is_whitespace() {
                        continue;
                    }
                    let left = bx + i as f32 * advance + advance * 0.1;
                    if let Some(rect) =
                        Rect::from_xywh(left, by - size * 0.5, advance * 0.8, size * 0.5)
                    {
                        self.pixmap
                            .fill_rect(rect, &paint, Transform::identity(), None);
                    }
                }
            }
        }
    }
}

/// Content box (inside border and padding) of `b`, as x, y, width, height.
fn content_rect(b: &PositionedBox) -> (f32, f32, f32, f32) {
    let s = &b.style;
    let x = b.x + s.border_width + s.padding.left;
    let y = b.y + s.border_width + s.padding.top;
    let w = b.width - 2.0 * s.border_width - s.padding.left - s.padding.right;
    let h = b.height - 2.0 * s.border_width - s.padding.top - s.padding.bottom;
    (x, y, w.max(0.0), h.max(0.0))
}

fn paint_for(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(
        tiny_skia::Color::from_rgba(
            color.r.clamp(0.0, 1.0),
            color.g.clamp(0.0, 1.0),
            color.b.clamp(0.0, 1.0),
            color.a.clamp(0.0, 1.0),
        )
        .unwrap_or(tiny_skia::Color::BLACK),
    );
    paint.anti_alias = true;
    paint
}

// ---------------------------------------------------------------------------
// Glyphs
// ---------------------------------------------------------------------------

/// Device-space outlines of `text` shaped at `size` px, baseline at
/// (`x`, `y`). Falls back to plain advances when shaping is unavailable.
fn glyph_paths(font: &[u8], text: &str, size: f32, x: f32, y: f32) -> Vec<Path> {
    let Ok(face) = ttf_parser::Face::parse(font, 0) else {
        return Vec::new();
    };
    let units = face.units_per_em().max(1) as f32;
    let scale = size / units;

    let placements: Vec<(u16, f32)> = match HbFace::from_slice(font, 0) {
        Some(hb) => {
            let mut buffer = UnicodeBuffer::new();
            buffer.push_str(text);
            let shaped = rustybuzz::shape(&hb, &[], buffer);
            let mut pen = 0.0f32;
            shaped
                .glyph_infos()
                .iter()
                .zip(shaped.glyph_positions())
                .map(|(info, pos)| {
                    let at = pen + pos.x_offset as f32 * scale;
                    pen += pos.x_advance as f32 * scale;
                    (info.glyph_id as u16, at)
                })
                .collect()
        }
        None => {
            let mut pen = 0.0f32;
            text.chars()
                .map(|ch| {
                    let gid = face.glyph_index(ch).map(|g| g.0).unwrap_or(0);
                    let at = pen;
                    pen += face
                        .glyph_hor_advance(GlyphId(gid))
                        .map(|a| a as f32 * scale)
                        .filter(|a| *a > 0.0)
                        .unwrap_or(size * 0.5);
                    (gid, at)
                })
                .collect()
        }
    };

    placements
        .into_iter()
        .filter(|(gid, _)| *gid != 0)
        .filter_map(|(gid, at)| {
            let mut builder = GlyphPathBuilder::new(x + at, y, scale);
            face.outline_glyph(GlyphId(gid), &mut builder)?;
            builder.finish()
        })
        .collect()
}

/// Maps font units to device pixels. Font y grows upward, the bitmap's y
/// grows downward.
struct GlyphPathBuilder {
    builder: PathBuilder,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

impl GlyphPathBuilder {
    fn new(origin_x: f32, origin_y: f32, scale: f32) -> Self {
        Self {
            builder: PathBuilder::new(),
            origin_x,
            origin_y,
            scale,
        }
    }

    fn px(&self, x: f32) -> f32 {
        self.origin_x + x * self.scale
    }

    fn py(&self, y: f32) -> f32 {
        self.origin_y - y * self.scale
    }

    fn finish(self) -> Option<Path> {
        self.builder.finish()
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (px, py) = (self.px(x), self.py(y));
        self.builder.move_to(px, py);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (px, py) = (self.px(x), self.py(y));
        self.builder.line_to(px, py);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (p1x, p1y, px, py) = (self.px(x1), self.py(y1), self.px(x), self.py(y));
        self.builder.quad_to(p1x, p1y, px, py);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (p1x, p1y) = (self.px(x1), self.py(y1));
        let (p2x, p2y) = (self.px(x2), self.py(y2));
        let (px, py) = (self.px(x), self.py(y));
        self.builder.cubic_to(p1x, p1y, p2x, p2y, px, py);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// Decode image bytes into a premultiplied pixmap.
fn decode_to_pixmap(bytes: &[u8]) -> Option<Pixmap> {
    let rgba = image::load_from_memory(bytes).ok()?.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut pixmap = Pixmap::new(width, height)?;
    for (src, dst) in rgba
        .as_raw()
        .chunks_exact(4)
        .zip(pixmap.data_mut().chunks_exact_mut(4))
    {
        let a = src[3];
        dst[0] = premultiply(src[0], a);
        dst[1] = premultiply(src[1], a);
        dst[2] = premultiply(src[2], a);
        dst[3] = a;
    }
    Some(pixmap)
}

fn premultiply(channel: u8, alpha: u8) -> u8 {
    let prod = channel as u16 * alpha as u16 + 127;
    ((prod + (prod >> 8)) >> 8) as u8
}
