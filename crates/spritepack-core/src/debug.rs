use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::writer::PlacedFrame;

const TEXT_SCALE: f32 = 12.0;
const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);
const TEXT_MARGIN: i32 = 2;

/// Outline colors, picked per action so neighbouring clips are easy to tell apart.
const PALETTE: [Rgba<u8>; 6] = [
    Rgba([255, 64, 64, 255]),
    Rgba([64, 200, 64, 255]),
    Rgba([64, 128, 255, 255]),
    Rgba([255, 200, 0, 255]),
    Rgba([200, 64, 255, 255]),
    Rgba([0, 220, 220, 255]),
];

/// Renders annotated copies of atlas pages: one outline per placement plus the
/// frame's order index when a font is available.
pub struct DebugRenderer {
    font: Option<FontVec>,
}

impl DebugRenderer {
    /// Create a renderer. Labels are skipped when `font_path` is `None` or unreadable.
    pub fn new(font_path: Option<PathBuf>) -> Self {
        let font = font_path.as_deref().and_then(Self::load_font);
        Self { font }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn save_page(
        &self,
        page: &RgbaImage,
        index: u32,
        frames: &[PlacedFrame],
        basename: &str,
        dir: &Path,
    ) -> Result<()> {
        let img = self.annotate(page, frames);

        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{basename}_{index:03}_debug.png"));
        img.save(&path)?;

        debug!(?path, "saved debug page");
        Ok(())
    }

    /// Draw placement outlines (and labels) over a copy of `page`.
    pub fn annotate(&self, page: &RgbaImage, frames: &[PlacedFrame]) -> RgbaImage {
        let mut img = page.clone();

        for frame in frames {
            if frame.rect.is_empty() {
                continue;
            }
            let rect = Rect::at(frame.rect.x as i32, frame.rect.y as i32)
                .of_size(frame.rect.w, frame.rect.h);
            draw_hollow_rect_mut(&mut img, rect, action_color(&frame.action));

            if let Some(font) = &self.font {
                let label = frame.order_index.to_string();
                draw_text_mut(
                    &mut img,
                    TEXT_COLOR,
                    frame.rect.x as i32 + TEXT_MARGIN,
                    frame.rect.y as i32 + TEXT_MARGIN,
                    PxScale::from(TEXT_SCALE),
                    font,
                    &label,
                );
            }
        }

        img
    }

    fn load_font(path: &Path) -> Option<FontVec> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                warn!(?path, error = %e, "failed to read font file");
                return None;
            }
        };
        match FontVec::try_from_vec(data) {
            Ok(font) => {
                info!(?path, "loaded debug font");
                Some(font)
            }
            Err(e) => {
                warn!(?path, error = %e, "failed to parse font file");
                None
            }
        }
    }
}

fn action_color(action: &str) -> Rgba<u8> {
    let hash = action
        .bytes()
        .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
    PALETTE[hash % PALETTE.len()]
}
