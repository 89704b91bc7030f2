use imageproc::point::Point;

use crate::frame::BinaryMask;

/// Axis-aligned bounding rectangle in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest box enclosing every point. `None` for an empty slice.
    pub fn enclosing(points: &[Point<i32>]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        let min_x = min_x.max(0) as u32;
        let min_y = min_y.max(0) as u32;
        Some(Self {
            x: min_x,
            y: min_y,
            width: (max_x.max(0) as u32) - min_x + 1,
            height: (max_y.max(0) as u32) - min_y + 1,
        })
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.x <= other.x
            && self.y <= other.y
            && self.right() >= other.right()
            && self.bottom() >= other.bottom()
    }
}

/// A changed region that survived the minimum-area filter.
#[derive(Clone, Debug)]
pub struct DetectedRegion {
    pub bounds: BoundingBox,
    /// Polygon area enclosed by the contour, in square pixels.
    pub area: f64,
    /// Outer boundary the region was derived from.
    pub contour: Vec<Point<i32>>,
}

/// Result of running detection on one frame.
#[derive(Clone, Debug)]
pub struct DetectionResult {
    pub regions: Vec<DetectedRegion>,
    /// Dilated binary mask the regions were extracted from.
    pub mask: BinaryMask,
}

impl DetectionResult {
    /// No regions, all-zero mask.
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            regions: Vec::new(),
            mask: BinaryMask::empty(width, height),
        }
    }

    pub fn motion_detected(&self) -> bool {
        !self.regions.is_empty()
    }

    pub fn motion_count(&self) -> usize {
        self.regions.len()
    }
}
