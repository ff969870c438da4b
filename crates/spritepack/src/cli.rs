use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "spritepack", about = "Pack animation frames into sprite atlas pages")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Pack one or more actions into atlas pages plus a descriptor.
    Pack {
        /// Action source as NAME=PATH. PATH is a directory of PNG frames or a video
        /// with an alpha channel. Repeat for each action; order is packing order.
        #[arg(short, long = "action", required = true)]
        actions: Vec<String>,

        /// Directory to write page images and the descriptor into.
        #[arg(short, long)]
        output: PathBuf,

        /// JSON config file. Flags below override its values.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Side length of each square atlas page.
        #[arg(long)]
        page_size: Option<u32>,

        /// Pixels between frames and between rows.
        #[arg(long)]
        padding: Option<u32>,

        /// Resize every frame canvas to this square size before trimming.
        #[arg(long)]
        frame_size: Option<u32>,

        /// Frame rate of PNG-directory inputs, used for frame timestamps.
        #[arg(long)]
        fps: Option<f64>,

        /// Keep every Nth decoded frame of video inputs.
        #[arg(long)]
        sample_interval: Option<u32>,

        /// Name prefix for page images and the descriptor.
        #[arg(long)]
        basename: Option<String>,

        /// Worker threads for loading and trimming frames.
        #[arg(long)]
        threads: Option<usize>,

        /// Directory to save page copies with placement outlines.
        #[arg(long)]
        debug_pages: Option<PathBuf>,

        /// TTF/OTF font for debug page labels.
        #[arg(long, requires = "debug_pages")]
        debug_font: Option<PathBuf>,
    },

    /// Validate a descriptor and summarize its actions.
    Inspect {
        /// Path to the descriptor JSON.
        #[arg(short, long)]
        descriptor: PathBuf,

        /// Rebuild every untrimmed frame into this directory.
        #[arg(long)]
        reconstruct: Option<PathBuf>,
    },
}
