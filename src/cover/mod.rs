//! Cover image composition.
//!
//! Renders the 1920×1080 "breaking news" style cover used as the CMS featured
//! image. The layout does not depend on the script content:
//!
//! ```text
//! ┌──────────────────────────────────────────┐  #0b1220
//! │            NOTÍCIAS DO DIA               │  title, 22% from the top
//! │          Edição de 06/05/2025            │  subtitle
//! │                              ▄▄▄▄▄▄▄▄▄▄▄▄│
//! │▄▄▄▄▄▄▄▄▄▄▄▄▄▄▄▄▄▄▄▄▄▄▄▄▄▄▄▄▄▄▄▄▄▄▀▀▀▀▀▀▀▀│  red diagonal banner
//! │▀▀▀▀▀▀▀▀▀▀▀▀▀▀                            │
//! │██████████████████████████████████████████│  #173a78 + red bottom strip
//! └──────────────────────────────────────────┘
//! ```

pub mod fonts;

use chrono::{Local, NaiveDate};
use image::imageops::unsharpen;
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_polygon_mut};
use imageproc::point::Point;
use imageproc::rect::Rect;
use std::io::Cursor;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::config::CoverConfig;
use crate::models::CoverImage;
use crate::utils::br_date;
use fonts::{CoverFont, FontSet};

pub const WIDTH: u32 = 1920;
pub const HEIGHT: u32 = 1080;
pub const COVER_FILENAME: &str = "noticias-do-dia-1920x1080.png";

const TOP: [u8; 3] = [0x0b, 0x12, 0x20];
const BOTTOM: [u8; 3] = [0x17, 0x3a, 0x78];
const ACCENT: Rgb<u8> = Rgb([0xc1, 0x12, 0x1f]);
const SHADOW: Rgb<u8> = Rgb([0, 0, 0]);
const TITLE_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const SUBTITLE_COLOR: Rgb<u8> = Rgb([230, 230, 230]);

const TITLE_PX: f32 = 140.0;
const SUBTITLE_PX: f32 = 48.0;
const TITLE_TOP: f32 = 0.22;
const SUBTITLE_GAP: i32 = 24;
const SHADOW_OFFSET: i32 = 3;
const STRIP_HEIGHT: u32 = 6;

#[derive(Debug, Error)]
pub enum CoverError {
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Something that can produce the cover for today's post.
pub trait CoverRenderer {
    fn render(&self) -> Result<CoverImage, CoverError>;
}

impl<R: CoverRenderer + ?Sized> CoverRenderer for &R {
    fn render(&self) -> Result<CoverImage, CoverError> {
        (**self).render()
    }
}

/// `Edição de dd/mm/yyyy`.
pub fn default_subtitle(date: NaiveDate) -> String {
    format!("Edição de {}", br_date(date))
}

/// Draws covers with a fixed layout and a resolved pair of fonts.
#[derive(Debug)]
pub struct CoverCompositor {
    fonts: FontSet,
    title: String,
    subtitle: Option<String>,
}

impl CoverCompositor {
    pub fn new(fonts: FontSet, title: impl Into<String>, subtitle: Option<String>) -> Self {
        Self {
            fonts,
            title: title.into(),
            subtitle,
        }
    }

    /// Resolve fonts and texts from configuration.
    pub fn from_config(config: &CoverConfig) -> Self {
        let fonts = FontSet::resolve(&config.bold_fonts, &config.regular_fonts);
        Self::new(fonts, config.title.clone(), config.subtitle.clone())
    }

    /// Render a cover. `subtitle` defaults to [`default_subtitle`] for today.
    #[instrument(level = "info", skip_all, fields(%title))]
    pub fn compose(&self, title: &str, subtitle: Option<&str>) -> Result<CoverImage, CoverError> {
        let subtitle = subtitle
            .map(str::to_string)
            .unwrap_or_else(|| default_subtitle(Local::now().date_naive()));

        let mut canvas = gradient(WIDTH, HEIGHT);
        draw_banner(&mut canvas);

        let title_y = (HEIGHT as f32 * TITLE_TOP) as i32;
        let title_h = draw_centered(&mut canvas, &self.fonts.bold, title, title_y, TITLE_PX, TITLE_COLOR);
        draw_centered(
            &mut canvas,
            &self.fonts.regular,
            &subtitle,
            title_y + title_h as i32 + SUBTITLE_GAP,
            SUBTITLE_PX,
            SUBTITLE_COLOR,
        );

        let canvas = unsharpen(&canvas, 2.0, 3);

        let mut bytes = Vec::new();
        canvas.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        info!(bytes = bytes.len(), "Cover rendered");

        Ok(CoverImage {
            filename: COVER_FILENAME.to_string(),
            bytes,
            width: WIDTH,
            height: HEIGHT,
        })
    }
}

impl CoverRenderer for CoverCompositor {
    fn render(&self) -> Result<CoverImage, CoverError> {
        self.compose(&self.title, self.subtitle.as_deref())
    }
}

/// Vertical gradient, one colour per row stretched across the width.
fn gradient(width: u32, height: u32) -> RgbImage {
    let rows: Vec<Rgb<u8>> = (0..height)
        .map(|y| {
            let t = y as f32 / height as f32;
            let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
            Rgb([mix(TOP[0], BOTTOM[0]), mix(TOP[1], BOTTOM[1]), mix(TOP[2], BOTTOM[2])])
        })
        .collect();
    RgbImage::from_fn(width, height, |_, y| rows[y as usize])
}

/// Diagonal ribbon across the lower middle plus a thin strip at the bottom.
fn draw_banner(canvas: &mut RgbImage) {
    let (w, h) = (canvas.width() as i32 - 1, canvas.height() as f32);
    let at = |frac: f32| (h * frac) as i32;
    let ribbon = [
        Point::new(0, at(0.68)),
        Point::new(w, at(0.48)),
        Point::new(w, at(0.62)),
        Point::new(0, at(0.82)),
    ];
    draw_polygon_mut(canvas, &ribbon, ACCENT);

    let strip = Rect::at(0, (canvas.height() - STRIP_HEIGHT) as i32).of_size(canvas.width(), STRIP_HEIGHT);
    draw_filled_rect_mut(canvas, strip, ACCENT);
}

/// Draw `text` centred horizontally with a drop shadow; returns its height.
fn draw_centered(canvas: &mut RgbImage, font: &CoverFont, text: &str, y: i32, px: f32, color: Rgb<u8>) -> u32 {
    let (tw, th) = font.text_size(text, px);
    let x = (canvas.width() as i32 - tw as i32) / 2;
    debug!(text, x, y, tw, th, "Placing text");
    font.draw(canvas, SHADOW, x + SHADOW_OFFSET, y + SHADOW_OFFSET, px, text);
    font.draw(canvas, color, x, y, px, text);
    th
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    fn bitmap_compositor() -> CoverCompositor {
        CoverCompositor::new(FontSet::bitmap(), "NOTÍCIAS DO DIA", None)
    }

    #[test]
    fn test_cover_is_png_of_fixed_size_without_system_fonts() {
        let cover = bitmap_compositor().render().unwrap();
        assert_eq!(cover.filename, COVER_FILENAME);
        assert_eq!((cover.width, cover.height), (1920, 1080));
        assert_eq!(&cover.bytes[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory_with_format(&cover.bytes, ImageFormat::Png).unwrap();
        assert_eq!(decoded.dimensions(), (1920, 1080));
    }

    #[test]
    fn test_layout_colours() {
        let cover = bitmap_compositor()
            .compose("X", Some("Edição especial"))
            .unwrap();
        let img = image::load_from_memory_with_format(&cover.bytes, ImageFormat::Png)
            .unwrap()
            .to_rgb8();

        // Top-left is the dark end of the gradient.
        let top = img.get_pixel(5, 5).0;
        assert!(top[2] < 40, "top pixel {top:?}");

        // Left edge below the ribbon is near the blue end.
        let low = img.get_pixel(5, 1040).0;
        assert!(low[2] > 100 && low[0] < 40, "low pixel {low:?}");

        // Middle of the ribbon and the bottom strip are red.
        let ribbon = img.get_pixel(960, 700).0;
        assert!(ribbon[0] > 150 && ribbon[2] < 60, "ribbon pixel {ribbon:?}");
        let strip = img.get_pixel(960, 1078).0;
        assert!(strip[0] > 150, "strip pixel {strip:?}");
    }

    #[test]
    fn test_title_is_drawn_around_22_percent() {
        let cover = bitmap_compositor().compose("NOTÍCIAS DO DIA", None).unwrap();
        let img = image::load_from_memory_with_format(&cover.bytes, ImageFormat::Png)
            .unwrap()
            .to_rgb8();
        let top = (HEIGHT as f32 * TITLE_TOP) as u32;
        let has_white = (top..top + 112)
            .any(|y| (0..WIDTH).any(|x| img.get_pixel(x, y).0.iter().all(|c| *c > 200)));
        assert!(has_white);
        // Nothing white above the title.
        let above = (0..top - 2).any(|y| (0..WIDTH).any(|x| img.get_pixel(x, y).0.iter().all(|c| *c > 200)));
        assert!(!above);
    }

    #[test]
    fn test_very_long_title_still_renders() {
        let title = "MANCHETE ".repeat(40);
        let cover = bitmap_compositor().compose(&title, None).unwrap();
        assert_eq!((cover.width, cover.height), (WIDTH, HEIGHT));
    }

    #[test]
    fn test_default_subtitle_format() {
        let date = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();
        assert_eq!(default_subtitle(date), "Edição de 01/12/2025");
    }

    #[test]
    fn test_gradient_interpolates_per_row() {
        let img = gradient(4, 100);
        assert_eq!(img.get_pixel(0, 0).0, TOP);
        assert_eq!(img.get_pixel(0, 50), img.get_pixel(3, 50));
        let last = img.get_pixel(0, 99).0;
        assert!(last[2] >= 118);
    }
}
