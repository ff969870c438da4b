use tracing::{debug, info};

use crate::error::{Result, SpritePackError};
use crate::frame::Frame;
use crate::rect::PixelRect;

/// Gap inserted between neighbouring frames in a row and between rows.
pub const DEFAULT_PADDING: u32 = 2;

/// A frame and where it landed on its page.
#[derive(Debug, Clone)]
pub struct Placement {
    pub frame: Frame,
    /// Position on the page. Always the same size as `frame.trim_rect`.
    pub rect: PixelRect,
}

/// One square atlas page and the frames placed on it, in placement order.
#[derive(Debug, Clone)]
pub struct AtlasPage {
    pub index: u32,
    /// Side length in pixels.
    pub size: u32,
    pub placements: Vec<Placement>,
}

/// Totals reported once the packer has consumed its whole input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackSummary {
    pub page_count: u32,
    pub placed_frames: usize,
}

/// Greedy shelf packer: frames go left to right in input order, wrapping to a new
/// row when the current one is full and to a new page when rows run out.
///
/// The packer owns the open page until it is handed back from [`ShelfPacker::place`]
/// or [`ShelfPacker::finish`]. Use one instance per frame sequence.
#[derive(Debug)]
pub struct ShelfPacker {
    page_size: u32,
    padding: u32,
    page_index: u32,
    // Cursors may step past the page edge by up to `padding`, so they are kept wide.
    cursor_x: u64,
    cursor_y: u64,
    row_max_height: u32,
    placements: Vec<Placement>,
    placed_frames: usize,
}

impl ShelfPacker {
    pub fn new(page_size: u32, padding: u32) -> Result<Self> {
        if page_size == 0 {
            return Err(SpritePackError::config("page_size must be > 0"));
        }
        Ok(Self {
            page_size,
            padding,
            page_index: 0,
            cursor_x: 0,
            cursor_y: 0,
            row_max_height: 0,
            placements: Vec::new(),
            placed_frames: 0,
        })
    }

    /// Place one frame. Returns the previous page when this frame forced a new one.
    ///
    /// Oversized and zero-area frames are rejected without touching the packer state.
    pub fn place(&mut self, frame: Frame) -> Result<Option<AtlasPage>> {
        let (w, h) = (frame.trim_rect.w, frame.trim_rect.h);

        if frame.is_degenerate() {
            return Err(SpritePackError::DegenerateFrame { frame: frame.name });
        }
        if w > self.page_size || h > self.page_size {
            return Err(SpritePackError::FrameTooLarge {
                frame: frame.name,
                width: w,
                height: h,
                page_size: self.page_size,
            });
        }

        let page_size = u64::from(self.page_size);
        if self.cursor_x + u64::from(w) > page_size && self.cursor_x > 0 {
            self.cursor_y += u64::from(self.row_max_height) + u64::from(self.padding);
            self.cursor_x = 0;
            self.row_max_height = 0;
            debug!(page = self.page_index, cursor_y = self.cursor_y, "wrapped to new row");
        }

        let mut flushed = None;
        if self.cursor_y + u64::from(h) > page_size {
            flushed = Some(self.flush_page());
        }

        // Both cursors are now within the page, so they fit in u32.
        let rect = PixelRect::new(self.cursor_x as u32, self.cursor_y as u32, w, h);
        debug!(
            frame = %frame.name,
            page = self.page_index,
            x = rect.x,
            y = rect.y,
            w,
            h,
            "placed frame"
        );
        self.placements.push(Placement { frame, rect });
        self.placed_frames += 1;

        self.cursor_x += u64::from(w) + u64::from(self.padding);
        self.row_max_height = self.row_max_height.max(h);

        Ok(flushed)
    }

    /// Close the packer, returning the last open page (if it holds anything).
    pub fn finish(mut self) -> (Option<AtlasPage>, PackSummary) {
        let last = if self.placements.is_empty() {
            None
        } else {
            Some(self.flush_page())
        };

        let summary = PackSummary {
            page_count: self.page_index,
            placed_frames: self.placed_frames,
        };
        info!(
            page_count = summary.page_count,
            placed_frames = summary.placed_frames,
            "packing complete"
        );
        (last, summary)
    }

    /// Hand off the open page and reset the cursor for the next one.
    fn flush_page(&mut self) -> AtlasPage {
        let placements = std::mem::take(&mut self.placements);
        info!(
            page = self.page_index,
            placements = placements.len(),
            "page full, flushing"
        );

        let page = AtlasPage {
            index: self.page_index,
            size: self.page_size,
            placements,
        };

        self.page_index += 1;
        self.cursor_x = 0;
        self.cursor_y = 0;
        self.row_max_height = 0;
        page
    }
}

/// Pack a whole frame sequence and collect every page.
pub fn pack_all(
    frames: impl IntoIterator<Item = Frame>,
    page_size: u32,
    padding: u32,
) -> Result<(Vec<AtlasPage>, PackSummary)> {
    let mut packer = ShelfPacker::new(page_size, padding)?;
    let mut pages = Vec::new();
    for frame in frames {
        if let Some(page) = packer.place(frame)? {
            pages.push(page);
        }
    }
    let (last, summary) = packer.finish();
    pages.extend(last);
    Ok((pages, summary))
}

#[cfg(test)]
mod tests {
    use image::RgbaImage;
    use tracing_test::traced_test;

    use super::*;
    use crate::rect::Size;

    fn frame(name: &str, w: u32, h: u32) -> Frame {
        Frame::new(
            name,
            "test",
            0,
            0.0,
            Size::square(w.max(h)),
            PixelRect::new(0, 0, w, h),
            RgbaImage::new(w, h),
        )
        .unwrap()
    }

    fn rects(page: &AtlasPage) -> Vec<(u32, u32)> {
        page.placements.iter().map(|p| (p.rect.x, p.rect.y)).collect()
    }

    #[test]
    #[traced_test]
    fn three_frames_wrap_into_second_row() {
        let frames = (0..3).map(|i| frame(&format!("f{i}"), 40, 40));
        let (pages, summary) = pack_all(frames, 100, 2).unwrap();

        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].index, 0);
        assert_eq!(rects(&pages[0]), vec![(0, 0), (42, 0), (0, 42)]);
        assert_eq!(summary, PackSummary { page_count: 1, placed_frames: 3 });
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut packer = ShelfPacker::new(64, 2).unwrap();
        let err = packer.place(frame("huge", 70, 70)).unwrap_err();
        assert!(matches!(
            err,
            SpritePackError::FrameTooLarge { width: 70, height: 70, page_size: 64, .. }
        ));

        // State untouched: the next frame still lands at the origin of page 0.
        packer.place(frame("ok", 10, 10)).unwrap();
        let (last, _) = packer.finish();
        let last = last.unwrap();
        assert_eq!(last.index, 0);
        assert_eq!(rects(&last), vec![(0, 0)]);
    }

    #[test]
    fn oversized_in_one_dimension_is_rejected() {
        let mut packer = ShelfPacker::new(64, 2).unwrap();
        assert!(packer.place(frame("tall", 10, 65)).is_err());
        assert!(packer.place(frame("wide", 65, 10)).is_err());
        assert!(packer.place(frame("exact", 64, 64)).unwrap().is_none());
    }

    #[test]
    fn degenerate_frame_is_rejected() {
        let empty = Frame::new(
            "empty",
            "test",
            0,
            0.0,
            Size::square(8),
            PixelRect::default(),
            RgbaImage::new(0, 0),
        )
        .unwrap();
        let mut packer = ShelfPacker::new(64, 2).unwrap();
        assert!(matches!(
            packer.place(empty),
            Err(SpritePackError::DegenerateFrame { .. })
        ));
    }

    #[test]
    fn row_holds_floor_of_page_over_stride() {
        // Stride is 22; after four frames the cursor sits at 88 and 88 + 20 > 100.
        let frames = (0..5).map(|i| frame(&format!("f{i}"), 20, 20));
        let (pages, _) = pack_all(frames, 100, 2).unwrap();
        let xy = rects(&pages[0]);
        assert_eq!(&xy[..4], &[(0, 0), (22, 0), (44, 0), (66, 0)]);
        assert_eq!(xy[4], (0, 22));
    }

    #[test]
    fn row_without_padding_fills_page_exactly() {
        let frames = (0..5).map(|i| frame(&format!("f{i}"), 25, 25));
        let (pages, _) = pack_all(frames, 100, 0).unwrap();
        let xy = rects(&pages[0]);
        assert_eq!(&xy[..4], &[(0, 0), (25, 0), (50, 0), (75, 0)]);
        assert_eq!(xy[4], (0, 25));
    }

    #[test]
    #[traced_test]
    fn overflow_flushes_prior_page() {
        // Two rows of two 40x40 frames fit on a 100px page; the fifth frame overflows.
        let mut packer = ShelfPacker::new(100, 2).unwrap();
        let mut flushed = Vec::new();
        for i in 0..5 {
            if let Some(page) = packer.place(frame(&format!("f{i}"), 40, 40)).unwrap() {
                flushed.push(page);
            }
        }
        assert_eq!(flushed.len(), 1);
        let first = &flushed[0];
        assert_eq!(first.index, 0);
        assert_eq!(first.placements.len(), 4);
        assert_eq!(rects(first), vec![(0, 0), (42, 0), (0, 42), (42, 42)]);
        assert!(logs_contain("placements=4"));

        let (last, summary) = packer.finish();
        let last = last.unwrap();
        assert_eq!(last.index, 1);
        assert_eq!(rects(&last), vec![(0, 0)]);
        assert_eq!(last.placements[0].frame.name, "f4");
        assert_eq!(summary, PackSummary { page_count: 2, placed_frames: 5 });
    }

    #[test]
    fn mixed_heights_use_tallest_in_row() {
        let frames = vec![frame("a", 30, 10), frame("b", 30, 25), frame("c", 30, 5), frame("d", 30, 5)];
        let (pages, _) = pack_all(frames, 100, 2).unwrap();
        // a, b, c fill the first row (0, 32, 64); d wraps below the tallest (25 + 2).
        assert_eq!(rects(&pages[0]), vec![(0, 0), (32, 0), (64, 0), (0, 27)]);
    }

    #[test]
    fn empty_input_yields_no_pages() {
        let (pages, summary) = pack_all(Vec::new(), 128, 2).unwrap();
        assert!(pages.is_empty());
        assert_eq!(summary, PackSummary { page_count: 0, placed_frames: 0 });
    }

    #[test]
    fn placements_never_overlap() {
        let sizes = [(13, 7), (40, 40), (5, 60), (61, 3), (22, 22), (64, 10), (1, 1), (30, 50)];
        let frames = (0..40).map(|i| {
            let (w, h) = sizes[i % sizes.len()];
            frame(&format!("f{i}"), w, h)
        });
        let (pages, summary) = pack_all(frames, 64, 2).unwrap();
        assert_eq!(summary.placed_frames, 40);
        assert_eq!(pages.len() as u32, summary.page_count);

        for page in &pages {
            for (i, a) in page.placements.iter().enumerate() {
                assert!(a.rect.fits_within(Size::square(page.size)));
                for b in &page.placements[i + 1..] {
                    assert!(!a.rect.intersects(&b.rect), "{:?} overlaps {:?}", a.rect, b.rect);
                }
            }
        }
    }

    #[test]
    fn zero_page_size_is_a_config_error() {
        let err = ShelfPacker::new(0, 2).unwrap_err();
        assert!(matches!(err, SpritePackError::Config(_)));
        assert!(pack_all(vec![frame("a", 1, 1)], 0, 2).is_err());
    }

    #[test]
    fn huge_padding_puts_each_frame_on_its_own_page() {
        let mut packer = ShelfPacker::new(1024, u32::MAX).unwrap();
        assert!(packer.place(frame("a", 10, 10)).unwrap().is_none());

        // The row wraps past the page bottom, so the first page is flushed.
        let first = packer.place(frame("b", 10, 10)).unwrap().unwrap();
        assert_eq!(rects(&first), vec![(0, 0)]);

        let (last, summary) = packer.finish();
        let last = last.unwrap();
        assert_eq!(last.index, 1);
        assert_eq!(rects(&last), vec![(0, 0)]);
        assert_eq!(summary, PackSummary { page_count: 2, placed_frames: 2 });
    }

    #[test]
    fn packing_is_deterministic() {
        let run = || {
            let frames = (0..25).map(|i| frame(&format!("f{i}"), 10 + (i * 7) % 30, 5 + (i * 11) % 35));
            let (pages, _) = pack_all(frames, 80, 2).unwrap();
            pages
                .iter()
                .flat_map(|p| p.placements.iter().map(move |pl| (p.index, pl.frame.name.clone(), pl.rect)))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
