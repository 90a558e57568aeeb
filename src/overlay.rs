//! Preview overlay: detection boxes and the status banner.
//!
//! All drawing happens in place on the frame handed to the pre-display
//! callback. Nothing is retained between frames.

use ab_glyph::{FontArc, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;

use crate::detect::{Detection, PixelBox};

pub const DEFAULT_FONT_PATH: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const BOX_THICKNESS: i32 = 2;

pub const BANNER_HEIGHT: u32 = 60;
/// Weight of the banner colour; the frame underneath keeps the rest.
pub const BANNER_OPACITY: f32 = 0.85;

pub const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
pub const TEXT_X: i32 = 20;
pub const TEXT_Y: i32 = 16;
pub const TEXT_SCALE: f32 = 28.0;

/// Draws the overlay for one frame.
#[derive(Clone, Default)]
pub struct OverlayRenderer {
    font: Option<FontArc>,
}

impl OverlayRenderer {
    pub fn new(font: Option<FontArc>) -> Self {
        Self { font }
    }

    /// Renderer that draws banners without text.
    pub fn without_text() -> Self {
        Self { font: None }
    }

    /// Load a TrueType/OpenType font for the banner text.
    pub fn load<P: AsRef<Path>>(font_path: P) -> Result<Self> {
        let font_path = font_path.as_ref();
        let bytes = std::fs::read(font_path)
            .with_context(|| format!("failed to read font {}", font_path.display()))?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| anyhow!("invalid font {}: {}", font_path.display(), e))?;
        Ok(Self::new(Some(font)))
    }

    pub fn has_text(&self) -> bool {
        self.font.is_some()
    }

    /// Draw boxes (when `show_boxes`), then the translucent banner, then the
    /// message on top of the banner.
    pub fn render(
        &self,
        frame: &mut RgbImage,
        detections: &[Detection],
        show_boxes: bool,
        message: &str,
        bg_color: Rgb<u8>,
    ) {
        if show_boxes {
            for detection in detections {
                draw_box(frame, detection.bbox, BOX_COLOR, BOX_THICKNESS);
            }
        }

        blend_banner(frame, bg_color, BANNER_HEIGHT, BANNER_OPACITY);

        if let Some(font) = &self.font {
            draw_text_mut(
                frame,
                TEXT_COLOR,
                TEXT_X,
                TEXT_Y,
                PxScale::from(TEXT_SCALE),
                font,
                message,
            );
        }
    }
}

/// Outline `bbox` with a `thickness`-pixel border growing inwards.
///
/// Boxes with negative extent are skipped. Parts outside the frame are clipped,
/// so boxes of any size (up to `i32::MAX`) are safe to draw.
pub fn draw_box(frame: &mut RgbImage, bbox: PixelBox, color: Rgb<u8>, thickness: i32) {
    let frame_w = i64::from(frame.width());
    let frame_h = i64::from(frame.height());
    for t in 0..i64::from(thickness) {
        let left = i64::from(bbox.x) + t;
        let top = i64::from(bbox.y) + t;
        let right = i64::from(bbox.x) + i64::from(bbox.width) - t;
        let bottom = i64::from(bbox.y) + i64::from(bbox.height) - t;
        if right < left || bottom < top {
            break;
        }
        // Inner rings lie inside outer ones: nothing left to draw.
        if right < 0 || bottom < 0 || left >= frame_w || top >= frame_h {
            break;
        }
        // Edges past the frame are parked one pixel outside it, where
        // nothing is drawn.
        let left = left.max(-1);
        let top = top.max(-1);
        let right = right.min(frame_w);
        let bottom = bottom.min(frame_h);
        let rect = Rect::at(left as i32, top as i32)
            .of_size((right - left + 1) as u32, (bottom - top + 1) as u32);
        draw_hollow_rect_mut(frame, rect, color);
    }
}

/// Composite a full-width band of `color` over the top `height` rows.
pub fn blend_banner(frame: &mut RgbImage, color: Rgb<u8>, height: u32, opacity: f32) {
    let rows = height.min(frame.height());
    let keep = 1.0 - opacity;
    for y in 0..rows {
        for x in 0..frame.width() {
            let pixel = frame.get_pixel_mut(x, y);
            for (channel, banner) in pixel.0.iter_mut().zip(color.0) {
                let mixed = opacity * f32::from(banner) + keep * f32::from(*channel);
                *channel = mixed.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    #[test]
    fn box_outline_is_two_pixels_wide() {
        let mut frame = RgbImage::from_pixel(100, 100, BLACK);
        draw_box(&mut frame, PixelBox::new(10, 70, 20, 10), BOX_COLOR, 2);

        assert_eq!(*frame.get_pixel(10, 70), BOX_COLOR);
        assert_eq!(*frame.get_pixel(30, 80), BOX_COLOR);
        assert_eq!(*frame.get_pixel(11, 71), BOX_COLOR);
        assert_eq!(*frame.get_pixel(29, 79), BOX_COLOR);
        assert_eq!(*frame.get_pixel(12, 72), BLACK);
        assert_eq!(*frame.get_pixel(31, 81), BLACK);
    }

    #[test]
    fn box_partly_outside_frame_is_clipped() {
        let mut frame = RgbImage::from_pixel(20, 20, BLACK);
        draw_box(&mut frame, PixelBox::new(-5, -5, 40, 40), BOX_COLOR, 2);
        assert_eq!(*frame.get_pixel(10, 10), BLACK);
    }

    #[test]
    fn oversized_box_is_clipped_to_visible_edges() {
        let mut frame = RgbImage::from_pixel(20, 20, BLACK);
        draw_box(
            &mut frame,
            PixelBox::new(0, 0, i32::MAX, i32::MAX),
            BOX_COLOR,
            2,
        );
        assert_eq!(*frame.get_pixel(0, 0), BOX_COLOR);
        assert_eq!(*frame.get_pixel(19, 0), BOX_COLOR);
        assert_eq!(*frame.get_pixel(1, 19), BOX_COLOR);
        assert_eq!(*frame.get_pixel(19, 19), BLACK);
        assert_eq!(*frame.get_pixel(10, 10), BLACK);
    }

    #[test]
    fn box_entirely_outside_frame_draws_nothing() {
        let mut frame = RgbImage::from_pixel(20, 20, BLACK);
        draw_box(&mut frame, PixelBox::new(30, 30, 10, 10), BOX_COLOR, 2);
        draw_box(
            &mut frame,
            PixelBox::new(i32::MIN, i32::MIN, 5, 5),
            BOX_COLOR,
            2,
        );
        assert!(frame.pixels().all(|p| *p == BLACK));
    }

    #[test]
    fn negative_extent_box_is_skipped() {
        let mut frame = RgbImage::from_pixel(20, 20, BLACK);
        draw_box(&mut frame, PixelBox::new(10, 10, -4, 5), BOX_COLOR, 2);
        assert!(frame.pixels().all(|p| *p == BLACK));
    }

    #[test]
    fn banner_blends_over_top_rows_only() {
        let mut frame = RgbImage::from_pixel(40, 80, Rgb([100, 100, 100]));
        blend_banner(&mut frame, Rgb([255, 0, 0]), BANNER_HEIGHT, BANNER_OPACITY);

        // 0.85 * 255 + 0.15 * 100 = 231.75; 0.15 * 100 = 15
        assert_eq!(*frame.get_pixel(0, 0), Rgb([232, 15, 15]));
        assert_eq!(*frame.get_pixel(39, 59), Rgb([232, 15, 15]));
        assert_eq!(*frame.get_pixel(0, 60), Rgb([100, 100, 100]));
    }

    #[test]
    fn banner_taller_than_frame_covers_whole_frame() {
        let mut frame = RgbImage::from_pixel(4, 10, BLACK);
        blend_banner(&mut frame, Rgb([0, 255, 0]), BANNER_HEIGHT, BANNER_OPACITY);
        assert!(frame.pixels().all(|p| *p == Rgb([0, 217, 0])));
    }

    #[test]
    fn render_hides_boxes_when_not_requested() {
        let renderer = OverlayRenderer::without_text();
        let mut frame = RgbImage::from_pixel(100, 100, BLACK);
        let detections = [Detection::new(0, 0.9, PixelBox::new(10, 70, 20, 10))];

        renderer.render(&mut frame, &detections, false, "No pedestrian", BLACK);
        assert_eq!(*frame.get_pixel(10, 70), BLACK);

        renderer.render(&mut frame, &detections, true, "Pedestrian", BLACK);
        assert_eq!(*frame.get_pixel(10, 70), BOX_COLOR);
    }

    #[test]
    fn render_draws_white_text_when_font_available() {
        let Ok(renderer) = OverlayRenderer::load(DEFAULT_FONT_PATH) else {
            return;
        };
        let mut frame = RgbImage::from_pixel(400, 100, BLACK);
        renderer.render(&mut frame, &[], false, "No pedestrian, You can Go", BLACK);

        let has_text = (0..BANNER_HEIGHT)
            .flat_map(|y| (0..400).map(move |x| (x, y)))
            .any(|(x, y)| frame.get_pixel(x, y).0.iter().all(|c| *c > 200));
        assert!(has_text);
    }

    #[test]
    fn load_rejects_missing_and_invalid_fonts() -> Result<()> {
        assert!(OverlayRenderer::load("/nonexistent/font.ttf").is_err());
        let file = tempfile::NamedTempFile::new()?;
        std::fs::write(file.path(), b"not a font")?;
        let err = OverlayRenderer::load(file.path()).err().unwrap();
        assert!(err.to_string().contains("invalid font"));
        Ok(())
    }
}
