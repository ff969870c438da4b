mod cli;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use image::RgbaImage;
use tracing::{info, warn};

use spritepack_core::config::PackConfig;
use spritepack_core::descriptor::{reconstruct_frame, Descriptor};
use spritepack_core::pipeline::{self, BuildOptions};
use spritepack_core::source::ActionSource;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();

    match cli.command {
        cli::Command::Pack {
            actions,
            output,
            config,
            page_size,
            padding,
            frame_size,
            fps,
            sample_interval,
            basename,
            threads,
            debug_pages,
            debug_font,
        } => {
            let mut pack_config = match &config {
                Some(path) => PackConfig::load(path)
                    .with_context(|| format!("failed to load config {}", path.display()))?,
                None => PackConfig::default(),
            };
            if let Some(v) = page_size {
                pack_config.page_size = v;
            }
            if let Some(v) = padding {
                pack_config.padding = v;
            }
            if frame_size.is_some() {
                pack_config.frame_size = frame_size;
            }
            if let Some(v) = fps {
                pack_config.fps = v;
            }
            if let Some(v) = sample_interval {
                pack_config.sample_interval = v;
            }
            if let Some(v) = basename {
                pack_config.basename = v;
            }
            if threads.is_some() {
                pack_config.threads = threads;
            }

            let sources = actions
                .iter()
                .map(|spec| {
                    ActionSource::parse(spec)
                        .with_context(|| format!("invalid action source '{spec}'"))
                })
                .collect::<Result<Vec<_>>>()?;

            info!(?output, action_count = sources.len(), ?pack_config, "starting pack");

            let options = BuildOptions {
                output_dir: output,
                debug_dir: debug_pages,
                debug_font,
            };
            let report = pipeline::run_build(&sources, &pack_config, &options)
                .context("atlas build failed; discard the output directory")?;

            for dropped in &report.dropped {
                warn!(frame = %dropped.name, action = %dropped.action, reason = %dropped.reason, "frame dropped");
            }

            info!(
                pages = report.page_images.len(),
                frames = report.descriptor.frames.len(),
                dropped = report.dropped.len(),
                descriptor = ?report.descriptor_path,
                "pack complete"
            );

            Ok(())
        }
        cli::Command::Inspect {
            descriptor,
            reconstruct,
        } => {
            let loaded = Descriptor::load(&descriptor)
                .with_context(|| format!("failed to load descriptor {}", descriptor.display()))?;

            info!(
                sheets = loaded.meta.sheets,
                frames = loaded.frames.len(),
                page_size = loaded.meta.size.w,
                "descriptor is valid"
            );
            for action in loaded.action_names() {
                let frames = loaded.action_frames(action);
                let last_ms = frames.last().map(|(_, r)| r.duration).unwrap_or(0);
                info!(action, frame_count = frames.len(), last_ms, "action");
            }

            if let Some(dir) = reconstruct {
                let base = descriptor.parent().map(Path::to_path_buf).unwrap_or_default();
                write_reconstructed(&loaded, &base, &dir)?;
            }

            Ok(())
        }
    }
}

/// Rebuild every untrimmed frame from its page and save it as `{name}.png`.
fn write_reconstructed(descriptor: &Descriptor, pages_dir: &Path, out: &Path) -> Result<()> {
    std::fs::create_dir_all(out)
        .with_context(|| format!("failed to create {}", out.display()))?;

    let mut pages: HashMap<&str, RgbaImage> = HashMap::new();
    for (name, record) in &descriptor.frames {
        if !pages.contains_key(record.image.as_str()) {
            let path: PathBuf = pages_dir.join(&record.image);
            let page = image::open(&path)
                .with_context(|| format!("failed to open page {}", path.display()))?
                .into_rgba8();
            pages.insert(record.image.as_str(), page);
        }
        let page = &pages[record.image.as_str()];

        let frame = reconstruct_frame(page, record)
            .with_context(|| format!("failed to reconstruct {name}"))?;
        let path = out.join(format!("{name}.png"));
        frame
            .save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    info!(frames = descriptor.frames.len(), ?out, "reconstructed frames written");
    Ok(())
}
