use image::RgbaImage;
use tracing::debug;

use crate::rect::PixelRect;

/// Compute the tight bounding box of pixels with non-zero alpha.
///
/// Returns `None` when every pixel is fully transparent.
pub fn alpha_bounds(image: &RgbaImage) -> Option<PixelRect> {
    let (width, height) = image.dimensions();

    let mut left = width;
    let mut right = 0;
    let mut top = height;
    let mut bottom = 0;
    let mut found = false;

    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel[3] == 0 {
            continue;
        }
        found = true;
        left = left.min(x);
        right = right.max(x);
        top = top.min(y);
        bottom = bottom.max(y);
    }

    if !found {
        debug!(width, height, "image is fully transparent");
        return None;
    }

    // Both edges are inclusive here, so a single opaque pixel yields a 1x1 rect.
    Some(PixelRect {
        x: left,
        y: top,
        w: right - left + 1,
        h: bottom - top + 1,
    })
}

/// Crop `image` to its alpha bounds.
///
/// Fully transparent images yield an empty 0x0 buffer and a zero rect at the origin.
pub fn trim_alpha(image: &RgbaImage) -> (RgbaImage, PixelRect) {
    match alpha_bounds(image) {
        Some(rect) => {
            let trimmed = image::imageops::crop_imm(image, rect.x, rect.y, rect.w, rect.h).to_image();
            (trimmed, rect)
        }
        None => (RgbaImage::new(0, 0), PixelRect::default()),
    }
}
