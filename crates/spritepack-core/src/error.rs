pub type Result<T> = std::result::Result<T, SpritePackError>;

/// Errors produced while packing frames and emitting atlas artifacts.
#[derive(thiserror::Error, Debug)]
pub enum SpritePackError {
    #[error("frame {frame} ({width}x{height}) does not fit on a {page_size}x{page_size} page")]
    FrameTooLarge {
        frame: String,
        width: u32,
        height: u32,
        page_size: u32,
    },

    #[error("frame {frame} has an empty trim rect and cannot be packed")]
    DegenerateFrame { frame: String },

    #[error("invalid frame {frame}: {reason}")]
    InvalidFrame { frame: String, reason: String },

    #[error("page {page}: placements of {first} and {second} overlap")]
    OverlapInvariantViolation {
        page: u32,
        first: String,
        second: String,
    },

    #[error("page {page}: placement of {frame} extends past the page bounds")]
    PlacementOutOfBounds { page: u32, frame: String },

    #[error("descriptor build error: {0}")]
    DescriptorBuild(#[from] DescriptorBuildError),

    #[error("config error: {0}")]
    Config(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Reasons a descriptor cannot be assembled or accepted.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DescriptorBuildError {
    #[error("frame name {name} appears on page {first_page} and page {second_page}")]
    DuplicateFrame {
        name: String,
        first_page: u32,
        second_page: u32,
    },

    #[error("page {0} was added twice")]
    DuplicatePage(u32),

    #[error("expected {expected} written pages, missing {missing:?}")]
    MissingPages { expected: u32, missing: Vec<u32> },

    #[error("packer placed {expected} frames but {actual} records were collected")]
    FrameCountMismatch { expected: usize, actual: usize },

    #[error("record {name}: {reason}")]
    InvalidRecord { name: String, reason: String },
}

impl SpritePackError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_frame(frame: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFrame {
            frame: frame.into(),
            reason: reason.into(),
        }
    }
}
