//! Card compositor: draws title, bullets and footer over a background.
//!
//! Layers, back to front:
//! 1. background (raster scaled to cover the canvas, or a solid fill)
//! 2. dim overlay, raster backgrounds only
//! 3. title block
//! 4. bullet blocks, one per point
//! 5. optional footer
//!
//! Layers 1–2 are painted with tiny-skia. Text is emitted as SVG and rasterised
//! by resvg onto the same pixmap so the registered font does its own shaping.

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use thiserror::Error;
use tiny_skia::{Color, IntSize, Paint, Pixmap, Rect, Transform};
use tracing::warn;

use crate::layout::{wrap_text, FontRegistry, LayoutLine, WrappedBlock};
use crate::models::{strip_undrawable, CardContent, CardImage};
use crate::render::background::{BackgroundSpec, Rgb};

const BULLET: &str = "• ";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("card title is empty")]
    EmptyTitle,

    #[error("font family '{0}' is not registered")]
    FontUnresolved(String),

    #[error("could not allocate a {0}x{0} canvas")]
    CanvasAllocation(u32),

    #[error("text layer failed to parse: {0}")]
    TextLayer(#[from] usvg::Error),

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

// ────────────────────────────────────────────────────────────────────────────
// Geometry
// ────────────────────────────────────────────────────────────────────────────

/// Card geometry in pixels. Baselines are absolute canvas coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct CardLayout {
    pub canvas_size: u32,
    pub margin_x: f32,
    pub wrap_width: f32,
    pub title_baseline: f32,
    pub title_font_px: f32,
    pub title_line_height: f32,
    /// Space between the title block and the first bullet.
    pub block_gap: f32,
    pub bullet_font_px: f32,
    pub bullet_line_height: f32,
    /// Extra space between consecutive bullets.
    pub point_gap: f32,
    pub footer_font_px: f32,
    /// Distance from the bottom edge to the footer's last baseline.
    pub footer_offset: f32,
    pub overlay_alpha: f32,
    pub shadow_offset: f32,
}

impl Default for CardLayout {
    fn default() -> Self {
        Self {
            canvas_size: 1080,
            margin_x: 60.0,
            wrap_width: 960.0,
            title_baseline: 120.0,
            title_font_px: 56.0,
            title_line_height: 72.0,
            block_gap: 30.0,
            bullet_font_px: 40.0,
            bullet_line_height: 56.0,
            point_gap: 8.0,
            footer_font_px: 28.0,
            footer_offset: 50.0,
            overlay_alpha: 0.45,
            shadow_offset: 3.0,
        }
    }
}

/// Per-call options for [`Compositor::render`].
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub layout: CardLayout,
    pub footer: Option<String>,
}

/// Text colours chosen for contrast with the background variant.
struct Palette {
    text: Rgb,
    footer: Rgb,
    shadow: Option<(Rgb, f32)>,
}

impl Palette {
    fn for_background(background: &BackgroundSpec) -> Self {
        if background.is_raster() {
            Palette {
                text: Rgb(0xFF, 0xFF, 0xFF),
                footer: Rgb(0xE0, 0xE0, 0xE0),
                shadow: Some((Rgb(0, 0, 0), 0.6)),
            }
        } else {
            Palette {
                text: Rgb(0x11, 0x11, 0x11),
                footer: Rgb(0x55, 0x55, 0x55),
                shadow: None,
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Compositor
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Compositor {
    fonts: Arc<FontRegistry>,
    family: String,
}

impl Compositor {
    pub fn new(fonts: Arc<FontRegistry>) -> Self {
        let family = fonts.family().to_string();
        Self { fonts, family }
    }

    /// Draws text with `family` instead of the registry's own family name.
    pub fn with_family(mut self, family: impl Into<String>) -> Self {
        self.family = family.into();
        self
    }

    /// Renders `content` on `background` and returns the PNG.
    pub fn render(
        &self,
        content: &CardContent,
        background: BackgroundSpec,
        options: &RenderOptions,
    ) -> Result<CardImage, RenderError> {
        if content.title().trim().is_empty() {
            return Err(RenderError::EmptyTitle);
        }
        if !self.fonts.resolves(&self.family) {
            return Err(RenderError::FontUnresolved(self.family.clone()));
        }

        let layout = &options.layout;
        let size = layout.canvas_size;
        let palette = Palette::for_background(&background);
        let dimmed = background.is_raster();

        let mut canvas = paint_background(background, size)?;
        if dimmed {
            paint_overlay(&mut canvas, layout.overlay_alpha);
        }

        let svg = self.text_layer(content, options, &palette);
        let tree = usvg::Tree::from_str(&svg, &self.svg_options())?;
        resvg::render(&tree, Transform::identity(), &mut canvas.as_mut());

        // Every layer is opaque, so the premultiplied buffer is also straight RGBA.
        let rgba = RgbaImage::from_raw(size, size, canvas.data().to_vec())
            .ok_or(RenderError::CanvasAllocation(size))?;
        let mut png = Vec::new();
        DynamicImage::ImageRgba8(rgba)
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;

        Ok(CardImage {
            png: Bytes::from(png),
            width: size,
            height: size,
        })
    }

    /// Lays out every text block of the card, top to bottom.
    ///
    /// Bullets whose last line would cross into the footer band are dropped
    /// rather than drawn off the canvas.
    pub fn layout_blocks(&self, content: &CardContent, options: &RenderOptions) -> CardBlocks {
        let layout = &options.layout;

        let title = wrap_text(
            content.title(),
            layout.wrap_width,
            layout.title_line_height,
            (layout.margin_x, layout.title_baseline),
            |s| self.fonts.measure(s, layout.title_font_px),
        );

        let footer = options
            .footer
            .as_deref()
            .map(strip_undrawable)
            .filter(|f| !f.trim().is_empty())
            .map(|text| {
                let mut block = wrap_text(
                    &text,
                    layout.wrap_width,
                    layout.footer_font_px * 1.2,
                    (layout.margin_x, 0.0),
                    |s| self.fonts.measure(s, layout.footer_font_px),
                );
                // Anchor the last footer line at the fixed offset from the bottom.
                let last = block.lines.last().map(|l| l.baseline_y).unwrap_or(0.0);
                let shift = layout.canvas_size as f32 - layout.footer_offset - last;
                for line in &mut block.lines {
                    line.baseline_y += shift;
                }
                block.cursor_y += shift;
                block
            });

        let limit = match footer.as_ref().and_then(|f| f.lines.first()) {
            Some(first) => first.baseline_y - layout.footer_font_px * 1.2,
            None => layout.canvas_size as f32 - layout.footer_offset,
        };

        let mut cursor = title.cursor_y + layout.block_gap;
        let mut points = Vec::with_capacity(content.points().len());
        for point in content.points() {
            let block = wrap_text(
                &format!("{BULLET}{point}"),
                layout.wrap_width,
                layout.bullet_line_height,
                (layout.margin_x, cursor),
                |s| self.fonts.measure(s, layout.bullet_font_px),
            );
            let bottom = block.lines.last().map_or(cursor, |l| l.baseline_y);
            if bottom > limit {
                warn!(
                    "Dropping {} of {} points: text runs past y={limit}",
                    content.points().len() - points.len(),
                    content.points().len()
                );
                break;
            }
            cursor = block.cursor_y + layout.point_gap;
            points.push(block);
        }

        CardBlocks {
            title,
            points,
            footer,
        }
    }

    fn text_layer(
        &self,
        content: &CardContent,
        options: &RenderOptions,
        palette: &Palette,
    ) -> String {
        let layout = &options.layout;
        let blocks = self.layout_blocks(content, options);
        let size = layout.canvas_size;

        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{size}" height="{size}" viewBox="0 0 {size} {size}">"#
        );
        let text = |svg: &mut String, lines: &[LayoutLine], font_px: f32, color: Rgb| {
            self.push_block(svg, lines, font_px, color, palette, layout)
        };
        text(&mut svg, &blocks.title.lines, layout.title_font_px, palette.text);
        for block in &blocks.points {
            text(&mut svg, &block.lines, layout.bullet_font_px, palette.text);
        }
        if let Some(footer) = &blocks.footer {
            text(&mut svg, &footer.lines, layout.footer_font_px, palette.footer);
        }
        svg.push_str("</svg>");
        svg
    }

    fn push_block(
        &self,
        svg: &mut String,
        lines: &[LayoutLine],
        font_px: f32,
        color: Rgb,
        palette: &Palette,
        layout: &CardLayout,
    ) {
        let family = escape_xml(&self.family);
        for line in lines {
            let text = escape_xml(&line.text);
            if let Some((shadow, opacity)) = palette.shadow {
                svg.push_str(&format!(
                    r#"<text x="{x}" y="{y}" font-family="{family}" font-size="{font_px}" fill="{fill}" fill-opacity="{opacity}">{text}</text>"#,
                    x = line.x + layout.shadow_offset,
                    y = line.baseline_y + layout.shadow_offset,
                    fill = shadow.hex(),
                ));
            }
            svg.push_str(&format!(
                r#"<text x="{x}" y="{y}" font-family="{family}" font-size="{font_px}" fill="{fill}">{text}</text>"#,
                x = line.x,
                y = line.baseline_y,
                fill = color.hex(),
            ));
        }
    }

    fn svg_options(&self) -> usvg::Options<'static> {
        usvg::Options {
            fontdb: self.fonts.fontdb(),
            font_family: self.family.clone(),
            languages: vec!["ta".to_string(), "en".to_string()],
            ..usvg::Options::default()
        }
    }
}

/// Wrapped text blocks for one card.
#[derive(Debug, Clone)]
pub struct CardBlocks {
    pub title: WrappedBlock,
    pub points: Vec<WrappedBlock>,
    pub footer: Option<WrappedBlock>,
}

fn paint_background(background: BackgroundSpec, size: u32) -> Result<Pixmap, RenderError> {
    match background {
        BackgroundSpec::Solid(rgb) => {
            let mut pixmap =
                Pixmap::new(size, size).ok_or(RenderError::CanvasAllocation(size))?;
            pixmap.fill(Color::from_rgba8(rgb.0, rgb.1, rgb.2, 255));
            Ok(pixmap)
        }
        BackgroundSpec::Raster(img) => {
            let img = if img.dimensions() == (size, size) {
                img
            } else {
                DynamicImage::ImageRgba8(img)
                    .resize_to_fill(size, size, FilterType::Triangle)
                    .to_rgba8()
            };
            let mut data = img.into_raw();
            for px in data.chunks_exact_mut(4) {
                // Composite onto white so the canvas stays opaque.
                let a = px[3] as u16;
                for c in &mut px[..3] {
                    *c = ((*c as u16 * a + 255 * (255 - a) + 127) / 255) as u8;
                }
                px[3] = 255;
            }
            let int_size =
                IntSize::from_wh(size, size).ok_or(RenderError::CanvasAllocation(size))?;
            Pixmap::from_vec(data, int_size).ok_or(RenderError::CanvasAllocation(size))
        }
    }
}

fn paint_overlay(canvas: &mut Pixmap, alpha: f32) {
    let Some(rect) = Rect::from_xywh(0.0, 0.0, canvas.width() as f32, canvas.height() as f32)
    else {
        return;
    };
    let mut paint = Paint::default();
    let dim = Color::from_rgba(0.0, 0.0, 0.0, alpha.clamp(0.0, 1.0)).unwrap_or(Color::BLACK);
    paint.set_color(dim);
    canvas.fill_rect(rect, &paint, Transform::identity(), None);
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::font_metrics::test_support::fixture_registry;

    fn compositor() -> Compositor {
        Compositor::new(Arc::new(fixture_registry()))
    }

    fn content(points: usize) -> CardContent {
        CardContent::new(
            "Tamil Nadu government announcement",
            (0..points).map(|i| format!("New rule number {i} in effect")).collect(),
        )
        .unwrap()
    }

    fn decode(card: &CardImage) -> RgbaImage {
        image::load_from_memory(&card.png).unwrap().to_rgba8()
    }

    #[test]
    fn test_render_produces_fixed_size_png_for_zero_to_five_points() {
        let compositor = compositor();
        for n in 0..=5 {
            let card = compositor
                .render(&content(n), BackgroundSpec::default(), &RenderOptions::default())
                .unwrap();
            assert_eq!((card.width, card.height), (1080, 1080));
            assert_eq!(decode(&card).dimensions(), (1080, 1080), "{n} points");
        }
    }

    #[test]
    fn test_render_is_deterministic_on_solid_background() {
        let compositor = compositor();
        let options = RenderOptions {
            footer: Some("askqa.ai".to_string()),
            ..RenderOptions::default()
        };
        let a = compositor
            .render(&content(3), BackgroundSpec::default(), &options)
            .unwrap();
        let b = compositor
            .render(&content(3), BackgroundSpec::default(), &options)
            .unwrap();
        assert_eq!(a.png, b.png);
    }

    #[test]
    fn test_solid_background_draws_dark_title_on_white() {
        let img = decode(
            &compositor()
                .render(&content(0), BackgroundSpec::default(), &RenderOptions::default())
                .unwrap(),
        );
        // Corner untouched by text stays white.
        assert_eq!(img.get_pixel(1075, 1075).0, [255, 255, 255, 255]);
        // Some pixel inside the first title line is inked.
        let inked = (80..125)
            .flat_map(|y| (60..600).map(move |x| (x, y)))
            .any(|(x, y)| img.get_pixel(x, y).0[0] < 128);
        assert!(inked, "title glyphs should be drawn");
    }

    #[test]
    fn test_raster_background_is_scaled_and_dimmed() {
        let red = RgbaImage::from_pixel(300, 200, image::Rgba([255, 0, 0, 255]));
        let img = decode(
            &compositor()
                .render(&content(2), BackgroundSpec::Raster(red), &RenderOptions::default())
                .unwrap(),
        );
        assert_eq!(img.dimensions(), (1080, 1080));
        let [r, g, b, a] = img.get_pixel(1075, 1075).0;
        assert_eq!(a, 255);
        assert!((130..=150).contains(&r), "expected dimmed red, got {r}");
        assert_eq!((g, b), (0, 0));
    }

    #[test]
    fn test_unregistered_family_fails() {
        let err = compositor()
            .with_family("Missing Tamil")
            .render(&content(1), BackgroundSpec::default(), &RenderOptions::default())
            .unwrap_err();
        assert!(matches!(err, RenderError::FontUnresolved(f) if f == "Missing Tamil"));
    }

    #[test]
    fn test_bullets_follow_title_with_gap() {
        let compositor = compositor();
        let options = RenderOptions::default();
        let blocks = compositor.layout_blocks(&content(2), &options);
        let layout = &options.layout;

        assert_eq!(blocks.title.lines[0].baseline_y, layout.title_baseline);
        let first_bullet = &blocks.points[0].lines[0];
        assert!(first_bullet.text.starts_with(BULLET));
        assert_eq!(first_bullet.baseline_y, blocks.title.cursor_y + layout.block_gap);
        assert_eq!(
            blocks.points[1].lines[0].baseline_y,
            blocks.points[0].cursor_y + layout.point_gap
        );
    }

    #[test]
    fn test_sample_text_blocks() {
        let sample = "தமிழக அரசு புதிய அறிவிப்பு\nபுதிய விதிமுறை அமல்\nஜனவரி 10 முதல் அமல்";
        let content = crate::generation::content::split_local(sample).unwrap();
        let blocks = compositor().layout_blocks(&content, &RenderOptions::default());

        let joined = |block: &WrappedBlock| {
            block
                .lines
                .iter()
                .map(|l| l.text.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        };
        assert_eq!(joined(&blocks.title), "தமிழக அரசு புதிய அறிவிப்பு");
        assert_eq!(blocks.points.len(), 2);
        assert_eq!(joined(&blocks.points[0]), "• புதிய விதிமுறை அமல்");
        assert_eq!(joined(&blocks.points[1]), "• ஜனவரி 10 முதல் அமல்");
        assert!(blocks.footer.is_none());
    }

    #[test]
    fn test_long_title_wraps_within_width() {
        let compositor = compositor();
        let options = RenderOptions::default();
        let long = "word ".repeat(60);
        let content = CardContent::new(long, vec![]).unwrap();
        let blocks = compositor.layout_blocks(&content, &options);
        assert!(blocks.title.lines.len() > 1);
        for line in &blocks.title.lines {
            assert!(fixture_registry().measure(&line.text, options.layout.title_font_px) <= 960.0);
        }
    }

    #[test]
    fn test_footer_is_anchored_to_bottom() {
        let options = RenderOptions {
            footer: Some("Source: askqa".to_string()),
            ..RenderOptions::default()
        };
        let blocks = compositor().layout_blocks(&content(1), &options);
        let footer = blocks.footer.unwrap();
        assert_eq!(footer.lines.last().unwrap().baseline_y, 1080.0 - 50.0);
    }

    #[test]
    fn test_points_stop_above_footer() {
        let long = "புதிய விதிமுறை ஜனவரி முதல் அமல் ".repeat(8);
        let content = CardContent::new("Tamil Nadu government announcement", vec![long; 4]).unwrap();
        let options = RenderOptions {
            footer: Some("Source: askqa".to_string()),
            ..RenderOptions::default()
        };
        let blocks = compositor().layout_blocks(&content, &options);
        let footer_top = blocks.footer.as_ref().unwrap().lines[0].baseline_y;

        assert!(!blocks.points.is_empty());
        assert!(blocks.points.len() < 4);
        for block in &blocks.points {
            for line in &block.lines {
                assert!(line.baseline_y < footer_top);
            }
        }
    }

    #[test]
    fn test_points_stop_above_bottom_margin() {
        let long = "புதிய விதிமுறை ஜனவரி முதல் அமல் ".repeat(8);
        let content = CardContent::new("Tamil Nadu government announcement", vec![long; 4]).unwrap();
        let options = RenderOptions::default();
        let blocks = compositor().layout_blocks(&content, &options);

        assert!(blocks.points.len() < 4);
        let limit = 1080.0 - options.layout.footer_offset;
        for line in blocks.points.iter().flat_map(|b| &b.lines) {
            assert!(line.baseline_y <= limit);
        }
    }

    #[test]
    fn test_blank_footer_is_skipped() {
        let options = RenderOptions {
            footer: Some("   ".to_string()),
            ..RenderOptions::default()
        };
        assert!(compositor().layout_blocks(&content(1), &options).footer.is_none());
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml(r#"a<b>&"c'"#), "a&lt;b&gt;&amp;&quot;c&apos;");
    }
}
