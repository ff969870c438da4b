use std::collections::BTreeMap;
use std::path::PathBuf;

use image::RgbaImage;
use tracing::{debug, error, info};

use crate::debug::DebugRenderer;
use crate::error::{Result, SpritePackError};
use crate::packer::{AtlasPage, Placement};
use crate::rect::{PixelRect, Size};

/// Frame metadata that outlives the pixel payload once a page has been rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedFrame {
    pub name: String,
    pub action: String,
    pub order_index: u32,
    pub timestamp_seconds: f64,
    pub source_size: Size,
    pub trim_rect: PixelRect,
    /// Position on the atlas page.
    pub rect: PixelRect,
}

impl From<&Placement> for PlacedFrame {
    fn from(p: &Placement) -> Self {
        PlacedFrame {
            name: p.frame.name.clone(),
            action: p.frame.action.clone(),
            order_index: p.frame.order_index,
            timestamp_seconds: p.frame.timestamp_seconds,
            source_size: p.frame.source_size,
            trim_rect: p.frame.trim_rect,
            rect: p.rect,
        }
    }
}

/// A page that has been rendered and durably handed to storage.
#[derive(Debug, Clone)]
pub struct WrittenPage {
    pub index: u32,
    pub size: u32,
    /// Artifact name the page was stored under, e.g. `spritesheet_003.png`.
    pub image: String,
    pub frames: Vec<PlacedFrame>,
}

/// Destination for rendered page images.
pub trait PageStore {
    /// Persist `image` under `name`. Must not return until the write is complete.
    fn store(&mut self, name: &str, image: &RgbaImage) -> Result<()>;
}

/// Writes pages as PNG files into a directory.
pub struct DirStore {
    dir: PathBuf,
}

impl DirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        info!(?dir, "page output directory ready");
        Ok(Self { dir })
    }
}

impl PageStore for DirStore {
    fn store(&mut self, name: &str, image: &RgbaImage) -> Result<()> {
        let path = self.dir.join(name);
        image.save(&path).map_err(|e| {
            error!(?path, %e, "failed to save page image");
            e
        })?;
        debug!(?path, "saved page image");
        Ok(())
    }
}

/// Keeps rendered pages in memory, keyed by artifact name.
#[derive(Default)]
pub struct MemoryStore {
    pages: BTreeMap<String, RgbaImage>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&RgbaImage> {
        self.pages.get(name)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

impl PageStore for MemoryStore {
    fn store(&mut self, name: &str, image: &RgbaImage) -> Result<()> {
        self.pages.insert(name.to_string(), image.clone());
        Ok(())
    }
}

/// Artifact name for page `index`: `{basename}_{index:03}.png`.
pub fn page_image_name(basename: &str, index: u32) -> String {
    format!("{basename}_{index:03}.png")
}

/// Renders finished pages and hands them to a [`PageStore`].
pub struct AtlasPageWriter<S: PageStore> {
    basename: String,
    store: S,
    debug: Option<(DebugRenderer, PathBuf)>,
}

impl<S: PageStore> AtlasPageWriter<S> {
    pub fn new(basename: impl Into<String>, store: S) -> Self {
        Self {
            basename: basename.into(),
            store,
            debug: None,
        }
    }

    /// Also save an annotated copy of every page into `dir`.
    pub fn with_debug(mut self, renderer: DebugRenderer, dir: impl Into<PathBuf>) -> Self {
        self.debug = Some((renderer, dir.into()));
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Verify, render, and persist one page. The page is consumed; pixel payloads are
    /// dropped once blitted.
    pub fn write_page(&mut self, page: AtlasPage) -> Result<WrittenPage> {
        let image = render_page(&page)?;
        let name = page_image_name(&self.basename, page.index);
        self.store.store(&name, &image)?;

        let frames: Vec<PlacedFrame> = page.placements.iter().map(PlacedFrame::from).collect();

        if let Some((renderer, dir)) = &self.debug {
            renderer.save_page(&image, page.index, &frames, &self.basename, dir)?;
        }

        info!(
            page = page.index,
            image = %name,
            frames = frames.len(),
            "page written"
        );

        Ok(WrittenPage {
            index: page.index,
            size: page.size,
            image: name,
            frames,
        })
    }
}

/// Check the no-overlap and in-bounds invariants of a page.
pub fn verify_page(page: &AtlasPage) -> Result<()> {
    let bounds = Size::square(page.size);
    for (i, a) in page.placements.iter().enumerate() {
        if !a.rect.fits_within(bounds) {
            error!(page = page.index, frame = %a.frame.name, rect = ?a.rect, "placement out of bounds");
            return Err(SpritePackError::PlacementOutOfBounds {
                page: page.index,
                frame: a.frame.name.clone(),
            });
        }
        for b in &page.placements[i + 1..] {
            if a.rect.intersects(&b.rect) {
                error!(
                    page = page.index,
                    first = %a.frame.name,
                    second = %b.frame.name,
                    "overlapping placements"
                );
                return Err(SpritePackError::OverlapInvariantViolation {
                    page: page.index,
                    first: a.frame.name.clone(),
                    second: b.frame.name.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Render a page onto a transparent square canvas. Frame pixels replace the canvas
/// pixels outright, alpha included.
pub fn render_page(page: &AtlasPage) -> Result<RgbaImage> {
    verify_page(page)?;

    let mut canvas = RgbaImage::new(page.size, page.size);
    for placement in &page.placements {
        if placement.frame.pixels.dimensions() != (placement.rect.w, placement.rect.h) {
            return Err(SpritePackError::invalid_frame(
                &placement.frame.name,
                "pixel buffer does not match its placement rect",
            ));
        }
        image::imageops::replace(
            &mut canvas,
            &placement.frame.pixels,
            placement.rect.x as i64,
            placement.rect.y as i64,
        );
    }
    debug!(page = page.index, placements = page.placements.len(), "page rendered");
    Ok(canvas)
}
