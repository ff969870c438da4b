use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, SpritePackError};
use crate::packer::DEFAULT_PADDING;

/// Canvas side used for sampled video frames when no frame size is configured.
pub const DEFAULT_VIDEO_FRAME_SIZE: u32 = 256;

/// Parameters for an atlas build. Missing fields in a config file take the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackConfig {
    /// Side length of every square atlas page.
    pub page_size: u32,
    /// Gap between frames in a row and between rows.
    pub padding: u32,
    /// Resize every source canvas to this square size before trimming.
    pub frame_size: Option<u32>,
    /// Sampling rate of image-directory inputs, used to derive timestamps.
    pub fps: f64,
    /// Keep every Nth decoded frame of video inputs.
    pub sample_interval: u32,
    /// Prefix for page images and the descriptor file.
    pub basename: String,
    /// Worker threads for frame loading and trimming. `None` uses the rayon default.
    pub threads: Option<usize>,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            page_size: 1024,
            padding: DEFAULT_PADDING,
            frame_size: None,
            fps: 1.0,
            sample_interval: 30,
            basename: "spritesheet".to_string(),
            threads: None,
        }
    }
}

impl PackConfig {
    /// Read a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: PackConfig = serde_json::from_str(&json)?;
        info!(?path, "loaded pack config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(SpritePackError::config("page_size must be > 0"));
        }
        if self.padding >= self.page_size {
            return Err(SpritePackError::config(format!(
                "padding {} must be smaller than page_size {}",
                self.padding, self.page_size
            )));
        }
        if self.frame_size == Some(0) {
            return Err(SpritePackError::config("frame_size must be > 0 when set"));
        }
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(SpritePackError::config(format!("fps must be > 0, got {}", self.fps)));
        }
        if self.sample_interval == 0 {
            return Err(SpritePackError::config("sample_interval must be >= 1"));
        }
        if self.basename.is_empty() {
            return Err(SpritePackError::config("basename must not be empty"));
        }
        if self.threads == Some(0) {
            return Err(SpritePackError::config("threads must be >= 1 when set"));
        }
        Ok(())
    }

    /// File name of the descriptor written next to the pages.
    pub fn descriptor_name(&self) -> String {
        format!("{}.json", self.basename)
    }
}
