//! Turn action inputs (PNG directories or alpha videos) into ordered, trimmed frames.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::RgbaImage;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::{PackConfig, DEFAULT_VIDEO_FRAME_SIZE};
use crate::error::{Result, SpritePackError};
use crate::frame::{frame_name, Frame};
use crate::video::decoder::VideoDecoder;

/// Where an action's frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// Directory of background-free PNG frames, ordered by file name.
    ImageDir(PathBuf),
    /// Video with an alpha plane, sampled every `sample_interval` frames.
    Video(PathBuf),
}

/// One action and its frame source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSource {
    pub action: String,
    pub kind: SourceKind,
}

impl ActionSource {
    pub fn image_dir(action: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            action: action.into(),
            kind: SourceKind::ImageDir(dir.into()),
        }
    }

    pub fn video(action: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            action: action.into(),
            kind: SourceKind::Video(path.into()),
        }
    }

    /// Parse `NAME=PATH`. A directory is read as PNG frames, anything else as a video.
    /// A bare `PATH` uses the file or directory stem as the action name.
    pub fn parse(spec: &str) -> Result<Self> {
        let (action, path) = match spec.split_once('=') {
            Some((action, path)) => (action.to_string(), PathBuf::from(path)),
            None => {
                let path = PathBuf::from(spec);
                let action = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                (action, path)
            }
        };

        if path.as_os_str().is_empty() {
            return Err(SpritePackError::config(format!("missing path in action source '{spec}'")));
        }
        if action.contains(['/', '\\']) {
            return Err(SpritePackError::config(format!("action name '{action}' contains a path separator")));
        }

        let source = if path.is_dir() {
            Self::image_dir(action, path)
        } else {
            Self::video(action, path)
        };
        Ok(source)
    }

    /// Load, resize, and trim every frame of this action, in extraction order.
    pub fn load_frames(&self, config: &PackConfig, pool: &rayon::ThreadPool) -> Result<Vec<Frame>> {
        let frames = match &self.kind {
            SourceKind::ImageDir(dir) => load_image_dir(&self.action, dir, config, pool)?,
            SourceKind::Video(path) => load_video(&self.action, path, config, pool)?,
        };
        info!(action = %self.action, frames = frames.len(), "action frames loaded");
        Ok(frames)
    }
}

/// Build a worker pool for per-frame loading and trimming.
pub fn build_thread_pool(threads: Option<usize>) -> Result<rayon::ThreadPool> {
    if threads == Some(0) {
        return Err(SpritePackError::config("threads must be >= 1 when set"));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| SpritePackError::config(format!("failed to build rayon thread pool: {e}")))
}

/// PNG files in `dir`, sorted by file name.
pub fn list_frame_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_png = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
        if path.is_file() && is_png {
            files.push(path);
        } else {
            debug!(?path, "skipping non-png entry");
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn load_image_dir(
    action: &str,
    dir: &Path,
    config: &PackConfig,
    pool: &rayon::ThreadPool,
) -> Result<Vec<Frame>> {
    let files = list_frame_files(dir)?;
    if files.is_empty() {
        warn!(action, ?dir, "no png frames found");
    }
    info!(action, ?dir, files = files.len(), fps = config.fps, "loading image frames");

    // Indexed parallel collect keeps the original file order.
    pool.install(|| {
        files
            .par_iter()
            .enumerate()
            .map(|(i, path)| -> Result<Frame> {
                let canvas = image::open(path)?.into_rgba8();
                let canvas = fit_canvas(canvas, config.frame_size);
                let order_index = i as u32;
                Frame::from_canvas(
                    frame_name(action, order_index),
                    action,
                    order_index,
                    order_index as f64 / config.fps,
                    &canvas,
                )
            })
            .collect::<Result<Vec<_>>>()
    })
}

fn load_video(
    action: &str,
    path: &Path,
    config: &PackConfig,
    pool: &rayon::ThreadPool,
) -> Result<Vec<Frame>> {
    let mut decoder = VideoDecoder::open(path)?;
    let frame_size = config.frame_size.unwrap_or(DEFAULT_VIDEO_FRAME_SIZE);
    info!(
        action,
        ?path,
        fps = decoder.fps(),
        sample_interval = config.sample_interval,
        frame_size,
        "sampling video frames"
    );

    // Decoding is sequential; only the sampled canvases are kept.
    let mut samples: Vec<(RgbaImage, f64)> = Vec::new();
    while let Some(frame) = decoder.next_frame()? {
        if frame.frame_number % config.sample_interval != 0 {
            continue;
        }
        debug!(action, frame_number = frame.frame_number, "sampled frame");
        let canvas = fit_canvas(frame.image, Some(frame_size));
        samples.push((canvas, frame.timestamp_seconds));
    }

    pool.install(|| {
        samples
            .par_iter()
            .enumerate()
            .map(|(i, (canvas, timestamp))| -> Result<Frame> {
                let order_index = i as u32;
                Frame::from_canvas(
                    frame_name(action, order_index),
                    action,
                    order_index,
                    *timestamp,
                    canvas,
                )
            })
            .collect::<Result<Vec<_>>>()
    })
}

/// Resize to a `size` x `size` canvas when a size is given.
fn fit_canvas(canvas: RgbaImage, size: Option<u32>) -> RgbaImage {
    match size {
        Some(side) if canvas.dimensions() != (side, side) => {
            image::imageops::resize(&canvas, side, side, FilterType::Triangle)
        }
        _ => canvas,
    }
}
