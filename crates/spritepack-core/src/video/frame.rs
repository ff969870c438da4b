use image::RgbaImage;

/// A single decoded video frame, before sampling and trimming.
pub struct DecodedFrame {
    /// Full-resolution RGBA pixels, alpha taken from the source stream.
    pub image: RgbaImage,
    /// Absolute frame number from the start of the source (0-based).
    pub frame_number: u32,
    /// Elapsed seconds from the start of the source.
    pub timestamp_seconds: f64,
}
