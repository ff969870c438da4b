//! The unified atlas descriptor: every frame name mapped to its page image,
//! placement, and the data needed to rebuild the untrimmed frame.
//!
//! Field names follow the common sprite-atlas JSON layout (`frame`,
//! `spriteSourceSize`, `sourceSize`, `rotated`, `trimmed`, `duration`) so that
//! existing atlas loaders can read the output.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DescriptorBuildError, Result, SpritePackError};
use crate::packer::PackSummary;
use crate::rect::{PixelRect, Size};
use crate::writer::{PlacedFrame, WrittenPage};

pub const APP_NAME: &str = "spritepack";
pub const PIXEL_FORMAT: &str = "RGBA8888";

/// Placement and reconstruction data for one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameRecord {
    /// Page image holding the frame.
    pub image: String,
    /// Where to sample from the page image.
    pub frame: PixelRect,
    pub rotated: bool,
    pub trimmed: bool,
    /// Where the sampled pixels go inside the untrimmed canvas.
    pub sprite_source_size: PixelRect,
    pub source_size: Size,
    pub action: String,
    /// Absolute sample time in milliseconds, not a per-frame delay.
    pub duration: u64,
}

impl FrameRecord {
    fn from_placed(image: &str, placed: &PlacedFrame) -> Self {
        FrameRecord {
            image: image.to_string(),
            frame: placed.rect,
            rotated: false,
            trimmed: true,
            sprite_source_size: placed.trim_rect,
            source_size: placed.source_size,
            action: placed.action.clone(),
            duration: duration_ms(placed.timestamp_seconds),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub app: String,
    pub version: String,
    /// First page image, for loaders that only understand single-page atlases.
    pub image: String,
    /// Every page image, in page order.
    pub images: Vec<String>,
    pub sheets: u32,
    pub format: String,
    /// Page size shared by all pages.
    pub size: Size,
    pub scale: String,
}

/// The finished descriptor. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    pub meta: Meta,
    pub frames: BTreeMap<String, FrameRecord>,
}

/// `round(seconds * 1000)`, clamped at zero.
pub fn duration_ms(timestamp_seconds: f64) -> u64 {
    (timestamp_seconds * 1000.0).round().max(0.0) as u64
}

/// Collects written pages and assembles the descriptor once every page is in.
#[derive(Debug)]
pub struct DescriptorBuilder {
    page_size: u32,
    pages: BTreeMap<u32, String>,
    frames: BTreeMap<String, FrameRecord>,
    frame_pages: BTreeMap<String, u32>,
}

impl DescriptorBuilder {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size,
            pages: BTreeMap::new(),
            frames: BTreeMap::new(),
            frame_pages: BTreeMap::new(),
        }
    }

    /// Add every frame of a written page. Nothing is inserted if any name is taken.
    pub fn add_page(&mut self, page: &WrittenPage) -> std::result::Result<(), DescriptorBuildError> {
        if self.pages.contains_key(&page.index) {
            return Err(DescriptorBuildError::DuplicatePage(page.index));
        }
        if page.size != self.page_size {
            return Err(DescriptorBuildError::InvalidRecord {
                name: page.image.clone(),
                reason: format!("page size {} differs from {}", page.size, self.page_size),
            });
        }

        let mut seen = BTreeSet::new();
        for placed in &page.frames {
            if let Some(&first_page) = self.frame_pages.get(&placed.name) {
                return Err(DescriptorBuildError::DuplicateFrame {
                    name: placed.name.clone(),
                    first_page,
                    second_page: page.index,
                });
            }
            if !seen.insert(placed.name.as_str()) {
                return Err(DescriptorBuildError::DuplicateFrame {
                    name: placed.name.clone(),
                    first_page: page.index,
                    second_page: page.index,
                });
            }
        }

        for placed in &page.frames {
            self.frames
                .insert(placed.name.clone(), FrameRecord::from_placed(&page.image, placed));
            self.frame_pages.insert(placed.name.clone(), page.index);
        }
        self.pages.insert(page.index, page.image.clone());

        debug!(page = page.index, frames = page.frames.len(), "page added to descriptor");
        Ok(())
    }

    /// Assemble the descriptor. Fails unless all `summary.page_count` pages were added
    /// and together hold exactly `summary.placed_frames` frames.
    pub fn build(self, summary: &PackSummary) -> std::result::Result<Descriptor, DescriptorBuildError> {
        let missing: Vec<u32> = (0..summary.page_count)
            .filter(|i| !self.pages.contains_key(i))
            .collect();
        if !missing.is_empty() {
            return Err(DescriptorBuildError::MissingPages {
                expected: summary.page_count,
                missing,
            });
        }
        if let Some((&extra, _)) = self.pages.range(summary.page_count..).next() {
            return Err(DescriptorBuildError::InvalidRecord {
                name: self.pages[&extra].clone(),
                reason: format!("page {extra} is beyond the packed page count {}", summary.page_count),
            });
        }
        if self.frames.len() != summary.placed_frames {
            return Err(DescriptorBuildError::FrameCountMismatch {
                expected: summary.placed_frames,
                actual: self.frames.len(),
            });
        }

        let images: Vec<String> = self.pages.into_values().collect();
        let meta = Meta {
            app: APP_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            image: images.first().cloned().unwrap_or_default(),
            sheets: images.len() as u32,
            images,
            format: PIXEL_FORMAT.to_string(),
            size: Size::square(self.page_size),
            scale: "1".to_string(),
        };

        info!(
            sheets = meta.sheets,
            frames = self.frames.len(),
            "descriptor built"
        );
        Ok(Descriptor {
            meta,
            frames: self.frames,
        })
    }
}

impl Descriptor {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate a descriptor.
    pub fn from_json(json: &str) -> Result<Self> {
        let descriptor: Descriptor = serde_json::from_str(json)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        info!(?path, frames = self.frames.len(), "descriptor written");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check the structural invariants every record must satisfy.
    pub fn validate(&self) -> std::result::Result<(), DescriptorBuildError> {
        let invalid = |name: &str, reason: String| DescriptorBuildError::InvalidRecord {
            name: name.to_string(),
            reason,
        };

        if self.meta.sheets as usize != self.meta.images.len() {
            return Err(invalid(
                "meta",
                format!("sheets is {} but {} images are listed", self.meta.sheets, self.meta.images.len()),
            ));
        }

        for (name, record) in &self.frames {
            if !self.meta.images.contains(&record.image) {
                return Err(invalid(name.as_str(), format!("unknown page image {}", record.image)));
            }
            if record.frame.is_empty() || !record.frame.fits_within(self.meta.size) {
                return Err(invalid(name.as_str(), format!("frame {:?} is outside the page", record.frame)));
            }
            if !record.sprite_source_size.fits_within(record.source_size) {
                return Err(invalid(
                    name.as_str(),
                    format!(
                        "spriteSourceSize {:?} is outside sourceSize {:?}",
                        record.sprite_source_size, record.source_size
                    ),
                ));
            }
            if (record.frame.w, record.frame.h)
                != (record.sprite_source_size.w, record.sprite_source_size.h)
            {
                return Err(invalid(name.as_str(), "frame and spriteSourceSize dimensions differ".to_string()));
            }
            if record.rotated {
                return Err(invalid(name.as_str(), "rotated frames are not supported".to_string()));
            }
        }
        Ok(())
    }

    /// Distinct action names, sorted.
    pub fn action_names(&self) -> Vec<&str> {
        let names: BTreeSet<&str> = self.frames.values().map(|r| r.action.as_str()).collect();
        names.into_iter().collect()
    }

    /// Frames of one action in playback order (by duration, then by name).
    pub fn action_frames(&self, action: &str) -> Vec<(&str, &FrameRecord)> {
        let mut frames: Vec<(&str, &FrameRecord)> = self
            .frames
            .iter()
            .filter(|(_, r)| r.action == action)
            .map(|(n, r)| (n.as_str(), r))
            .collect();
        frames.sort_by(|a, b| a.1.duration.cmp(&b.1.duration).then_with(|| a.0.cmp(b.0)));
        frames
    }
}

/// Rebuild the untrimmed frame: sample `record.frame` from the page and paste it at
/// `spriteSourceSize.{x,y}` on a transparent `sourceSize` canvas.
pub fn reconstruct_frame(page: &RgbaImage, record: &FrameRecord) -> Result<RgbaImage> {
    let page_size = Size {
        w: page.width(),
        h: page.height(),
    };
    if !record.frame.fits_within(page_size) {
        return Err(SpritePackError::from(DescriptorBuildError::InvalidRecord {
            name: record.image.clone(),
            reason: format!("frame {:?} is outside the {}x{} page", record.frame, page_size.w, page_size.h),
        }));
    }

    let region = image::imageops::crop_imm(
        page,
        record.frame.x,
        record.frame.y,
        record.frame.w,
        record.frame.h,
    )
    .to_image();

    let mut canvas = RgbaImage::new(record.source_size.w, record.source_size.h);
    image::imageops::replace(
        &mut canvas,
        &region,
        record.sprite_source_size.x as i64,
        record.sprite_source_size.y as i64,
    );
    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;
    use crate::frame::Frame;
    use crate::packer::pack_all;
    use crate::writer::{AtlasPageWriter, MemoryStore};

    fn placed(name: &str, action: &str, ts: f64, rect: PixelRect) -> PlacedFrame {
        PlacedFrame {
            name: name.to_string(),
            action: action.to_string(),
            order_index: 0,
            timestamp_seconds: ts,
            source_size: Size::square(64),
            trim_rect: PixelRect::new(5, 6, rect.w, rect.h),
            rect,
        }
    }

    fn written(index: u32, frames: Vec<PlacedFrame>) -> WrittenPage {
        WrittenPage {
            index,
            size: 128,
            image: format!("spritesheet_{index:03}.png"),
            frames,
        }
    }

    #[test]
    fn duration_rounds_to_milliseconds() {
        assert_eq!(duration_ms(0.0), 0);
        assert_eq!(duration_ms(1.0), 1000);
        assert_eq!(duration_ms(0.0335), 34);
        assert_eq!(duration_ms(2.0 / 3.0), 667);
    }

    #[test]
    fn builds_records_with_atlas_fields() {
        let mut builder = DescriptorBuilder::new(128);
        builder
            .add_page(&written(0, vec![placed("walk_00000", "walk", 0.5, PixelRect::new(0, 0, 10, 12))]))
            .unwrap();
        builder
            .add_page(&written(1, vec![placed("walk_00001", "walk", 1.5, PixelRect::new(0, 0, 10, 12))]))
            .unwrap();

        let d = builder.build(&PackSummary { page_count: 2, placed_frames: 2 }).unwrap();
        assert_eq!(d.meta.sheets, 2);
        assert_eq!(d.meta.image, "spritesheet_000.png");
        assert_eq!(d.meta.images, vec!["spritesheet_000.png", "spritesheet_001.png"]);
        assert_eq!(d.meta.size, Size::square(128));

        let r = &d.frames["walk_00001"];
        assert_eq!(r.image, "spritesheet_001.png");
        assert_eq!(r.sprite_source_size, PixelRect::new(5, 6, 10, 12));
        assert_eq!(r.duration, 1500);
        assert!(r.trimmed);
        assert!(!r.rotated);

        let json: serde_json::Value = serde_json::from_str(&d.to_json().unwrap()).unwrap();
        let frame = &json["frames"]["walk_00000"];
        assert_eq!(frame["spriteSourceSize"]["x"], 5);
        assert_eq!(frame["sourceSize"]["w"], 64);
        assert_eq!(frame["frame"]["h"], 12);
        assert_eq!(frame["duration"], 500);
        assert_eq!(frame["action"], "walk");
        assert_eq!(json["meta"]["format"], "RGBA8888");
    }

    #[test]
    fn duplicate_name_across_pages_fails() {
        let mut builder = DescriptorBuilder::new(128);
        builder
            .add_page(&written(0, vec![placed("hit_00000", "hit", 0.0, PixelRect::new(0, 0, 4, 4))]))
            .unwrap();
        let err = builder
            .add_page(&written(
                1,
                vec![
                    placed("other", "run", 0.0, PixelRect::new(0, 0, 4, 4)),
                    placed("hit_00000", "run", 0.0, PixelRect::new(6, 0, 4, 4)),
                ],
            ))
            .unwrap_err();
        assert_eq!(
            err,
            DescriptorBuildError::DuplicateFrame {
                name: "hit_00000".into(),
                first_page: 0,
                second_page: 1,
            }
        );
        // The rejected page left nothing behind.
        let d = builder.build(&PackSummary { page_count: 1, placed_frames: 1 }).unwrap();
        assert!(!d.frames.contains_key("other"));
    }

    #[test]
    fn duplicate_page_fails() {
        let mut builder = DescriptorBuilder::new(128);
        builder.add_page(&written(0, vec![])).unwrap();
        assert_eq!(
            builder.add_page(&written(0, vec![])).unwrap_err(),
            DescriptorBuildError::DuplicatePage(0)
        );
    }

    #[test]
    fn build_before_all_pages_fails() {
        let mut builder = DescriptorBuilder::new(128);
        builder
            .add_page(&written(0, vec![placed("a", "", 0.0, PixelRect::new(0, 0, 4, 4))]))
            .unwrap();
        let err = builder
            .build(&PackSummary { page_count: 3, placed_frames: 3 })
            .unwrap_err();
        assert_eq!(
            err,
            DescriptorBuildError::MissingPages { expected: 3, missing: vec![1, 2] }
        );
    }

    #[test]
    fn frame_count_mismatch_fails() {
        let mut builder = DescriptorBuilder::new(128);
        builder
            .add_page(&written(0, vec![placed("a", "", 0.0, PixelRect::new(0, 0, 4, 4))]))
            .unwrap();
        assert!(matches!(
            builder.build(&PackSummary { page_count: 1, placed_frames: 2 }),
            Err(DescriptorBuildError::FrameCountMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn json_round_trip_validates() {
        let mut builder = DescriptorBuilder::new(128);
        builder
            .add_page(&written(0, vec![placed("a", "idle", 0.25, PixelRect::new(2, 2, 4, 4))]))
            .unwrap();
        let d = builder.build(&PackSummary { page_count: 1, placed_frames: 1 }).unwrap();

        let parsed = Descriptor::from_json(&d.to_json().unwrap()).unwrap();
        assert_eq!(parsed, d);

        let mut broken = d.clone();
        broken.frames.get_mut("a").unwrap().image = "missing.png".into();
        let err = Descriptor::from_json(&serde_json::to_string(&broken).unwrap()).unwrap_err();
        assert!(err.to_string().contains("unknown page image"));

        let mut broken = d;
        broken.frames.get_mut("a").unwrap().frame = PixelRect::new(126, 0, 4, 4);
        assert!(broken.validate().is_err());
    }

    #[test]
    fn groups_frames_by_action_in_time_order() {
        let mut builder = DescriptorBuilder::new(128);
        builder
            .add_page(&written(
                0,
                vec![
                    placed("run_00001", "run", 1.0, PixelRect::new(0, 0, 4, 4)),
                    placed("idle_00000", "idle", 0.0, PixelRect::new(6, 0, 4, 4)),
                    placed("run_00000", "run", 0.0, PixelRect::new(12, 0, 4, 4)),
                ],
            ))
            .unwrap();
        let d = builder.build(&PackSummary { page_count: 1, placed_frames: 3 }).unwrap();

        assert_eq!(d.action_names(), vec!["idle", "run"]);
        let run: Vec<&str> = d.action_frames("run").into_iter().map(|(n, _)| n).collect();
        assert_eq!(run, vec!["run_00000", "run_00001"]);
        assert!(d.action_frames("jump").is_empty());
    }

    fn sprite_canvas(seed: u8, size: u32) -> RgbaImage {
        let mut canvas = RgbaImage::new(size, size);
        let x0 = 3 + seed as u32 % 7;
        let y0 = 2 + seed as u32 % 5;
        for y in y0..y0 + 9 + seed as u32 % 4 {
            for x in x0..x0 + 6 + seed as u32 % 8 {
                let a = if (x + y) % 3 == 0 { 128 } else { 255 };
                canvas.put_pixel(x, y, Rgba([seed, x as u8, y as u8, a]));
            }
        }
        canvas
    }

    #[test]
    fn reconstruction_reproduces_source_frames() {
        let canvases: Vec<RgbaImage> = (0..12).map(|i| sprite_canvas(i, 24)).collect();
        let frames = canvases.iter().enumerate().map(|(i, c)| {
            Frame::from_canvas(format!("jump_{i:05}"), "jump", i as u32, i as f64 / 10.0, c).unwrap()
        });
        let (pages, summary) = pack_all(frames, 40, 2).unwrap();
        assert!(pages.len() > 1);

        let mut writer = AtlasPageWriter::new("spritesheet", MemoryStore::new());
        let mut builder = DescriptorBuilder::new(40);
        for page in pages {
            let written = writer.write_page(page).unwrap();
            builder.add_page(&written).unwrap();
        }
        let d = builder.build(&summary).unwrap();
        let store = writer.into_store();

        for (i, canvas) in canvases.iter().enumerate() {
            let record = &d.frames[&format!("jump_{i:05}")];
            let page = store.get(&record.image).unwrap();
            let rebuilt = reconstruct_frame(page, record).unwrap();
            assert_eq!(&rebuilt, canvas, "frame {i} differs after reconstruction");
        }
    }
}
