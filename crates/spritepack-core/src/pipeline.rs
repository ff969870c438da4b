use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::PackConfig;
use crate::debug::DebugRenderer;
use crate::descriptor::{Descriptor, DescriptorBuilder};
use crate::error::{Result, SpritePackError};
use crate::frame::Frame;
use crate::packer::ShelfPacker;
use crate::source::{build_thread_pool, ActionSource};
use crate::writer::{AtlasPageWriter, DirStore, PageStore, WrittenPage};

/// A frame that was skipped instead of packed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedFrame {
    pub name: String,
    pub action: String,
    pub reason: String,
}

/// Result of packing one frame sequence.
#[derive(Debug)]
pub struct PackOutcome {
    pub descriptor: Descriptor,
    pub pages: Vec<WrittenPage>,
    pub dropped: Vec<DroppedFrame>,
}

/// Output locations for [`run_build`].
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Directory receiving page images and the descriptor.
    pub output_dir: PathBuf,
    /// Directory for annotated page copies, or None to skip.
    pub debug_dir: Option<PathBuf>,
    /// Font for debug labels.
    pub debug_font: Option<PathBuf>,
}

/// What a finished build produced.
#[derive(Debug)]
pub struct BuildReport {
    pub descriptor_path: PathBuf,
    pub descriptor: Descriptor,
    pub page_images: Vec<PathBuf>,
    pub dropped: Vec<DroppedFrame>,
}

/// Pack frames in order, writing each page as soon as the packer closes it.
///
/// Zero-area frames are dropped and reported. Any other failure aborts before a
/// descriptor exists.
pub fn pack_frames<S: PageStore>(
    frames: impl IntoIterator<Item = Frame>,
    config: &PackConfig,
    writer: &mut AtlasPageWriter<S>,
) -> Result<PackOutcome> {
    config.validate()?;
    let mut packer = ShelfPacker::new(config.page_size, config.padding)?;
    let mut builder = DescriptorBuilder::new(config.page_size);
    let mut pages = Vec::new();
    let mut dropped = Vec::new();

    for frame in frames {
        if frame.is_degenerate() {
            warn!(frame = %frame.name, action = %frame.action, "fully transparent frame, dropping");
            dropped.push(DroppedFrame {
                name: frame.name,
                action: frame.action,
                reason: "empty trim rect".to_string(),
            });
            continue;
        }

        if let Some(page) = packer.place(frame)? {
            let written = writer.write_page(page)?;
            builder.add_page(&written)?;
            pages.push(written);
        }
    }

    let (last, summary) = packer.finish();
    if let Some(page) = last {
        let written = writer.write_page(page)?;
        builder.add_page(&written)?;
        pages.push(written);
    }

    let descriptor = builder.build(&summary)?;
    Ok(PackOutcome {
        descriptor,
        pages,
        dropped,
    })
}

/// Load every action, pack them into shared pages in source order, and write the
/// pages followed by the descriptor into `options.output_dir`.
pub fn run_build(
    sources: &[ActionSource],
    config: &PackConfig,
    options: &BuildOptions,
) -> Result<BuildReport> {
    config.validate()?;
    if sources.is_empty() {
        return Err(SpritePackError::config("no action sources given"));
    }
    let mut seen = HashSet::new();
    for source in sources {
        if !seen.insert(source.action.as_str()) {
            return Err(SpritePackError::config(format!(
                "action '{}' is listed more than once",
                source.action
            )));
        }
    }

    info!(
        actions = sources.len(),
        page_size = config.page_size,
        padding = config.padding,
        output_dir = ?options.output_dir,
        "build starting"
    );

    let store = DirStore::new(&options.output_dir)?;
    let descriptor_path = options.output_dir.join(config.descriptor_name());
    remove_stale_descriptor(&descriptor_path)?;

    let pool = build_thread_pool(config.threads)?;
    let mut frames = Vec::new();
    for source in sources {
        frames.extend(source.load_frames(config, &pool)?);
    }
    info!(total_frames = frames.len(), "frame loading complete");

    let mut writer = AtlasPageWriter::new(config.basename.clone(), store);
    if let Some(dir) = &options.debug_dir {
        writer = writer.with_debug(DebugRenderer::new(options.debug_font.clone()), dir);
    }

    let outcome = pack_frames(frames, config, &mut writer)?;
    outcome.descriptor.write(&descriptor_path)?;

    let page_images = outcome
        .pages
        .iter()
        .map(|p| options.output_dir.join(&p.image))
        .collect();

    info!(
        pages = outcome.pages.len(),
        frames = outcome.descriptor.frames.len(),
        dropped = outcome.dropped.len(),
        ?descriptor_path,
        "build complete"
    );

    Ok(BuildReport {
        descriptor_path,
        descriptor: outcome.descriptor,
        page_images,
        dropped: outcome.dropped,
    })
}

/// A descriptor left over from an earlier run would point at pages this run may
/// overwrite or never produce.
fn remove_stale_descriptor(path: &Path) -> Result<()> {
    if path.exists() {
        warn!(?path, "removing descriptor from a previous build");
        std::fs::remove_file(path)?;
    }
    Ok(())
}
