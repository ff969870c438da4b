use image::RgbaImage;

use crate::error::{Result, SpritePackError};
use crate::rect::{PixelRect, Size};
use crate::trim::trim_alpha;

/// A single alpha-trimmed animation frame, ready to be packed.
///
/// Frames are immutable once built and are moved into the packer exactly once.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Unique name across the whole build; becomes the descriptor key.
    pub name: String,
    /// Animation group this frame belongs to. May be empty.
    pub action: String,
    /// Position within the action's extraction order.
    pub order_index: u32,
    /// Source time of the original sample, in seconds.
    pub timestamp_seconds: f64,
    /// Canvas size the frame was sampled onto, before trimming.
    pub source_size: Size,
    /// Tight bounds of the visible content within `source_size`.
    pub trim_rect: PixelRect,
    /// Trimmed pixel payload, `trim_rect.w` x `trim_rect.h`.
    pub pixels: RgbaImage,
}

impl Frame {
    /// Build a frame from an already-trimmed payload, checking the geometric invariants.
    pub fn new(
        name: impl Into<String>,
        action: impl Into<String>,
        order_index: u32,
        timestamp_seconds: f64,
        source_size: Size,
        trim_rect: PixelRect,
        pixels: RgbaImage,
    ) -> Result<Self> {
        let frame = Frame {
            name: name.into(),
            action: action.into(),
            order_index,
            timestamp_seconds,
            source_size,
            trim_rect,
            pixels,
        };
        frame.validate()?;
        Ok(frame)
    }

    /// Trim a full canvas by alpha and build the frame from the result.
    pub fn from_canvas(
        name: impl Into<String>,
        action: impl Into<String>,
        order_index: u32,
        timestamp_seconds: f64,
        canvas: &RgbaImage,
    ) -> Result<Self> {
        let source_size = Size {
            w: canvas.width(),
            h: canvas.height(),
        };
        let (pixels, trim_rect) = trim_alpha(canvas);
        Frame::new(
            name,
            action,
            order_index,
            timestamp_seconds,
            source_size,
            trim_rect,
            pixels,
        )
    }

    /// True when the trim rect has zero area (fully transparent source).
    pub fn is_degenerate(&self) -> bool {
        self.trim_rect.is_empty()
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(SpritePackError::invalid_frame("<unnamed>", "frame name is empty"));
        }
        if !self.timestamp_seconds.is_finite() || self.timestamp_seconds < 0.0 {
            return Err(SpritePackError::invalid_frame(
                &self.name,
                format!("timestamp {} is not a non-negative number", self.timestamp_seconds),
            ));
        }
        if self.pixels.dimensions() != (self.trim_rect.w, self.trim_rect.h) {
            return Err(SpritePackError::invalid_frame(
                &self.name,
                format!(
                    "pixel buffer is {}x{} but trim rect is {}x{}",
                    self.pixels.width(),
                    self.pixels.height(),
                    self.trim_rect.w,
                    self.trim_rect.h
                ),
            ));
        }
        if !self.is_degenerate() && !self.trim_rect.fits_within(self.source_size) {
            return Err(SpritePackError::invalid_frame(
                &self.name,
                format!(
                    "trim rect {:?} exceeds source size {}x{}",
                    self.trim_rect, self.source_size.w, self.source_size.h
                ),
            ));
        }
        Ok(())
    }
}

/// Descriptor key for the `order_index`-th frame of `action`.
///
/// Zero-padded so that lexical order matches extraction order.
pub fn frame_name(action: &str, order_index: u32) -> String {
    if action.is_empty() {
        format!("frame_{order_index:05}")
    } else {
        format!("{action}_{order_index:05}")
    }
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    #[test]
    fn from_canvas_records_trim_geometry() {
        let mut canvas = RgbaImage::new(32, 32);
        for y in 10..14 {
            for x in 4..20 {
                canvas.put_pixel(x, y, Rgba([1, 2, 3, 255]));
            }
        }

        let frame = Frame::from_canvas("walk_00000", "walk", 0, 0.5, &canvas).unwrap();
        assert_eq!(frame.source_size, Size::square(32));
        assert_eq!(frame.trim_rect, PixelRect::new(4, 10, 16, 4));
        assert_eq!(frame.pixels.dimensions(), (16, 4));
        assert!(!frame.is_degenerate());
    }

    #[test]
    fn transparent_canvas_is_degenerate() {
        let canvas = RgbaImage::new(16, 16);
        let frame = Frame::from_canvas("ghost", "", 0, 0.0, &canvas).unwrap();
        assert!(frame.is_degenerate());
    }

    #[test]
    fn rejects_payload_size_mismatch() {
        let err = Frame::new(
            "bad",
            "idle",
            0,
            0.0,
            Size::square(64),
            PixelRect::new(0, 0, 10, 10),
            RgbaImage::new(9, 10),
        )
        .unwrap_err();
        assert!(matches!(err, SpritePackError::InvalidFrame { .. }));
    }

    #[test]
    fn rejects_trim_outside_source() {
        let err = Frame::new(
            "bad",
            "idle",
            0,
            0.0,
            Size::square(64),
            PixelRect::new(60, 0, 10, 10),
            RgbaImage::new(10, 10),
        )
        .unwrap_err();
        assert!(err.to_string().contains("exceeds source size"));
    }

    #[test]
    fn rejects_negative_timestamp() {
        let err = Frame::new(
            "bad",
            "idle",
            0,
            -1.0,
            Size::square(4),
            PixelRect::new(0, 0, 1, 1),
            RgbaImage::new(1, 1),
        )
        .unwrap_err();
        assert!(err.to_string().contains("timestamp"));
    }

    #[test]
    fn names_are_zero_padded() {
        assert_eq!(frame_name("attack", 7), "attack_00007");
        assert_eq!(frame_name("", 12), "frame_00012");
    }
}
