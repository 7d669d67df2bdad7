//! Font resolution for the cover.
//!
//! Candidates are tried in order: configured paths first, then the usual
//! locations for the current OS family. The first file that parses as a font
//! wins. When none does, the built-in 8×8 bitmap font is used, so rendering
//! never depends on what is installed on the machine.

use ab_glyph::{FontVec, PxScale};
use font8x8::{BASIC_FONTS, LATIN_FONTS, UnicodeFonts};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Font files to probe for the current platform, most preferred first.
pub fn platform_candidates(bold: bool) -> Vec<PathBuf> {
    let pick = |b: &str, r: &str| PathBuf::from(if bold { b } else { r });
    if cfg!(windows) {
        vec![
            pick(r"C:\Windows\Fonts\arialbd.ttf", r"C:\Windows\Fonts\arial.ttf"),
            pick(r"C:\Windows\Fonts\segoeuib.ttf", r"C:\Windows\Fonts\segoeui.ttf"),
        ]
    } else {
        vec![
            pick(
                "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
                "/System/Library/Fonts/Supplemental/Arial.ttf",
            ),
            pick(
                "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
                "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            ),
            pick(
                "/usr/share/fonts/truetype/freefont/FreeSansBold.ttf",
                "/usr/share/fonts/truetype/freefont/FreeSans.ttf",
            ),
        ]
    }
}

/// A font the compositor can measure and draw with.
pub enum CoverFont {
    /// A TrueType/OpenType file found on disk.
    Outline { font: FontVec, path: PathBuf },
    /// The built-in 8×8 bitmap font, scaled up by whole pixels.
    Bitmap { bold: bool },
}

impl fmt::Debug for CoverFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverFont::Outline { path, .. } => f.debug_tuple("Outline").field(path).finish(),
            CoverFont::Bitmap { bold } => f.debug_struct("Bitmap").field("bold", bold).finish(),
        }
    }
}

fn load_outline(path: &Path) -> Option<FontVec> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Font candidate not readable");
            return None;
        }
    };
    match FontVec::try_from_vec(bytes) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Font candidate is not a valid font");
            None
        }
    }
}

impl CoverFont {
    /// First loadable candidate, or the bitmap font.
    pub fn resolve(candidates: &[PathBuf], bold: bool) -> Self {
        candidates
            .iter()
            .find_map(|path| {
                load_outline(path).map(|font| {
                    info!(path = %path.display(), bold, "Using font");
                    CoverFont::Outline {
                        font,
                        path: path.clone(),
                    }
                })
            })
            .unwrap_or_else(|| {
                warn!(bold, "No font file found; falling back to built-in bitmap font");
                CoverFont::Bitmap { bold }
            })
    }

    /// Size in pixels of one bitmap cell for a requested font size.
    fn cell(px: f32) -> u32 {
        ((px / 10.0).round() as u32).max(1)
    }

    fn glyph(c: char) -> [u8; 8] {
        BASIC_FONTS
            .get(c)
            .or_else(|| LATIN_FONTS.get(c))
            .unwrap_or([0; 8])
    }

    /// Width and height of `text` rendered at `px`.
    pub fn text_size(&self, text: &str, px: f32) -> (u32, u32) {
        match self {
            CoverFont::Outline { font, .. } => text_size(PxScale::from(px), font, text),
            CoverFont::Bitmap { .. } => {
                let cell = Self::cell(px);
                (text.chars().count() as u32 * 8 * cell, 8 * cell)
            }
        }
    }

    /// Draw `text` with its top-left corner at (`x`, `y`). Clipped to the canvas.
    pub fn draw(&self, canvas: &mut RgbImage, color: Rgb<u8>, x: i32, y: i32, px: f32, text: &str) {
        match self {
            CoverFont::Outline { font, .. } => {
                draw_text_mut(canvas, color, x, y, PxScale::from(px), font, text);
            }
            CoverFont::Bitmap { bold } => {
                let cell = Self::cell(px);
                let step = cell as i32;
                let embolden = if *bold { (step / 4).max(1) } else { 0 };
                for (i, c) in text.chars().enumerate() {
                    let origin_x = x + i as i32 * 8 * step;
                    for (row, bits) in Self::glyph(c).into_iter().enumerate() {
                        for col in 0..8i32 {
                            if bits & (1u8 << col) == 0 {
                                continue;
                            }
                            let px_x = origin_x + col * step;
                            let px_y = y + row as i32 * step;
                            let rect = Rect::at(px_x, px_y).of_size(cell + embolden as u32, cell);
                            draw_filled_rect_mut(canvas, rect, color);
                        }
                    }
                }
            }
        }
    }
}

/// The two faces the cover uses.
#[derive(Debug)]
pub struct FontSet {
    pub bold: CoverFont,
    pub regular: CoverFont,
}

impl FontSet {
    /// Resolve both faces; `extra_*` paths are tried before the platform list.
    pub fn resolve(extra_bold: &[PathBuf], extra_regular: &[PathBuf]) -> Self {
        let bold: Vec<PathBuf> = extra_bold.iter().cloned().chain(platform_candidates(true)).collect();
        let regular: Vec<PathBuf> = extra_regular
            .iter()
            .cloned()
            .chain(platform_candidates(false))
            .collect();
        Self {
            bold: CoverFont::resolve(&bold, true),
            regular: CoverFont::resolve(&regular, false),
        }
    }

    /// Both faces from the built-in bitmap font.
    #[cfg(test)]
    pub fn bitmap() -> Self {
        Self {
            bold: CoverFont::Bitmap { bold: true },
            regular: CoverFont::Bitmap { bold: false },
        }
    }
}
