use std::fmt;

use image::{GrayImage, Luma};

pub const EDITABLE: u8 = 255;
pub const PRESERVED: u8 = 0;

/// fraction of the image width and height covered by the editable rectangle
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoverageRatio {
    width: f64,
    height: f64,
}

impl CoverageRatio {
    pub const DEFAULT: Self = Self { width: 0.8, height: 0.7 };

    pub fn new(width: f64, height: f64) -> Option<Self> {
        let valid = |ratio: f64| ratio.is_finite() && ratio > 0. && ratio <= 1.;
        (valid(width) && valid(height)).then_some(Self { width, height })
    }

    /// parses `<width>x<height>`, e.g. `0.8x0.7`
    pub fn parse(value: &str) -> Option<Self> {
        let (width, height) = value.trim().split_once(['x', 'X'])?;
        Self::new(width.trim().parse().ok()?, height.trim().parse().ok()?)
    }
}

impl Default for CoverageRatio {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for CoverageRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// pixel rectangle with inclusive bounds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Rect {
    pub const fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaskArtifact {
    pub width: u32,
    pub height: u32,
    pub region: Rect,
}

impl MaskArtifact {
    pub fn build(width: u32, height: u32, ratio: CoverageRatio) -> Self {
        let (left, right) = centered_span(width, ratio.width);
        let (top, bottom) = centered_span(height, ratio.height);

        Self { width, height, region: Rect { left, top, right, bottom } }
    }

    pub fn rasterize(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([if self.region.contains(x, y) { EDITABLE } else { PRESERVED }])
        })
    }
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "ratio is within (0, 1], so the span fits in u32"
)]
fn centered_span(length: u32, ratio: f64) -> (u32, u32) {
    let span = (f64::from(length) * ratio).round() as u32;
    let start = (length - span) / 2;
    let end = (start + span).min(length.saturating_sub(1));
    (start, end)
}
