/// Frame-space geometry
///
/// Regions are axis-aligned rectangles in source-frame pixel coordinates.
use serde::{Deserialize, Serialize};

/// A point in frame coordinates (sub-pixel)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Axis-aligned rectangle (goal region, target bounds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Region {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build from two corners, in any order
    pub fn from_corners(a: Point, b: Point) -> Self {
        let x = a.x.min(b.x);
        let y = a.y.min(b.y);
        Self::new(x, y, (a.x - b.x).abs(), (a.y - b.y).abs())
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Half-open containment: left/top edges inclusive, right/bottom exclusive
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// Intersection with another rectangle, `None` when they do not overlap
    pub fn intersect(&self, other: &Region) -> Option<Region> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());

        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        Some(Region::new(x1, y1, x2 - x1, y2 - y1))
    }

    /// Clip to `[0, width) x [0, height)`.
    ///
    /// Returns `None` for zero-area regions, non-finite coordinates and
    /// regions entirely outside the frame.
    pub fn clip(&self, width: u32, height: u32) -> Option<Region> {
        if ![self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
        {
            return None;
        }
        if self.is_empty() {
            return None;
        }
        self.intersect(&Region::new(0.0, 0.0, width as f32, height as f32))
    }

    /// Scale all coordinates by `factor`
    pub fn scaled(&self, factor: f32) -> Region {
        Region::new(
            self.x * factor,
            self.y * factor,
            self.width * factor,
            self.height * factor,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_contains_is_half_open() {
        let region = Region::new(90.0, 40.0, 20.0, 20.0);
        assert!(region.contains(&Point::new(90.0, 40.0)));
        assert!(region.contains(&Point::new(100.0, 50.0)));
        assert!(!region.contains(&Point::new(110.0, 50.0)));
        assert!(!region.contains(&Point::new(100.0, 60.0)));
    }

    #[test]
    fn test_clip_partially_outside() {
        let region = Region::new(-10.0, 20.0, 50.0, 500.0);
        let clipped = region.clip(200, 100).unwrap();
        assert_eq!(clipped, Region::new(0.0, 20.0, 40.0, 80.0));
    }

    #[test]
    fn test_clip_entirely_outside() {
        assert!(Region::new(300.0, 300.0, 50.0, 50.0).clip(200, 100).is_none());
        assert!(Region::new(-60.0, 0.0, 50.0, 50.0).clip(200, 100).is_none());
    }

    #[test]
    fn test_clip_zero_area_and_nan() {
        assert!(Region::new(10.0, 10.0, 0.0, 30.0).clip(200, 100).is_none());
        assert!(Region::new(10.0, 10.0, 30.0, -5.0).clip(200, 100).is_none());
        assert!(Region::new(f32::NAN, 10.0, 30.0, 30.0).clip(200, 100).is_none());
    }

    #[test]
    fn test_from_corners_normalizes() {
        let region = Region::from_corners(Point::new(110.0, 60.0), Point::new(90.0, 40.0));
        assert_eq!(region, Region::new(90.0, 40.0, 20.0, 20.0));
        assert_eq!(region.center(), Point::new(100.0, 50.0));
    }
}
