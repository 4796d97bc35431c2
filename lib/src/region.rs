use serde::{Deserialize, Serialize};

/// Axis-aligned box. Units depend on the [Space](crate::Space) of the owning region.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> BoundingBox {
        BoundingBox {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2., self.y + self.height / 2.)
    }

    /// True if the two boxes share interior area. Touching edges do not overlap.
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    fn scale(&self, sx: f64, sy: f64) -> BoundingBox {
        BoundingBox {
            x: self.x * sx,
            y: self.y * sy,
            width: self.width * sx,
            height: self.height * sy,
        }
    }
}

/// Coordinate space of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Space {
    /// Device pixels of the source image
    Pixels,
    /// Fractions in [0, 1] of the source image width and height
    Normalized,
}

/// Row and column of a square on a fixed grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridIndex {
    pub row: usize,
    pub col: usize,
}

impl GridIndex {
    pub fn new(row: usize, col: usize) -> GridIndex {
        GridIndex { row, col }
    }
}

/// A rectangular area of interest in the source image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub bbox: BoundingBox,
    pub space: Space,
    /// Set when the region comes from a known grid
    pub index: Option<GridIndex>,
    /// Position of the enclosing region in the same region list, for nested sub-regions
    pub parent: Option<usize>,
}

impl Region {
    pub fn pixels(bbox: BoundingBox) -> Region {
        Region {
            bbox,
            space: Space::Pixels,
            index: None,
            parent: None,
        }
    }

    pub fn normalized(bbox: BoundingBox) -> Region {
        Region {
            bbox,
            space: Space::Normalized,
            index: None,
            parent: None,
        }
    }

    pub fn with_index(mut self, row: usize, col: usize) -> Region {
        self.index = Some(GridIndex::new(row, col));
        self
    }

    pub fn with_parent(mut self, parent: usize) -> Region {
        self.parent = Some(parent);
        self
    }

    /// The same region expressed in pixels of a `width` x `height` image.
    pub fn to_pixels(&self, width: u32, height: u32) -> Region {
        match self.space {
            Space::Pixels => self.clone(),
            Space::Normalized => Region {
                bbox: self.bbox.scale(width as f64, height as f64),
                space: Space::Pixels,
                ..self.clone()
            },
        }
    }

    /// The same region expressed as fractions of a `width` x `height` image.
    pub fn to_normalized(&self, width: u32, height: u32) -> Region {
        match self.space {
            Space::Normalized => self.clone(),
            Space::Pixels => Region {
                bbox: self
                    .bbox
                    .scale(1. / width as f64, 1. / height as f64),
                space: Space::Normalized,
                ..self.clone()
            },
        }
    }

    /// Integer pixel bounds `(left, top, right, bottom)`, right and bottom exclusive.
    ///
    /// Coordinates are truncated toward zero and may lie outside the image; clamping is
    /// left to the caller.
    pub fn pixel_bounds(&self, width: u32, height: u32) -> (i64, i64, i64, i64) {
        let b = self.to_pixels(width, height).bbox;
        (
            b.x as i64,
            b.y as i64,
            b.right() as i64,
            b.bottom() as i64,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_normalized_round_trip() {
        let region = Region::normalized(BoundingBox::new(0.123456, 0.5, 0.0371, 0.9))
            .with_index(2, 7)
            .with_parent(4);
        let back = region.to_pixels(1237, 811).to_normalized(1237, 811);
        assert!(close(back.bbox.x, region.bbox.x));
        assert!(close(back.bbox.y, region.bbox.y));
        assert!(close(back.bbox.width, region.bbox.width));
        assert!(close(back.bbox.height, region.bbox.height));
        assert_eq!(back.space, Space::Normalized);
        assert_eq!(back.index, Some(GridIndex::new(2, 7)));
        assert_eq!(back.parent, Some(4));
    }

    #[test]
    fn test_pixel_bounds_truncate() {
        let region = Region::pixels(BoundingBox::new(7.5, 57.5, 35., 35.));
        assert_eq!(region.pixel_bounds(450, 450), (7, 57, 42, 92));
        let region = Region::normalized(BoundingBox::new(0.25, 0.5, 0.5, 0.25));
        assert_eq!(region.pixel_bounds(200, 100), (50, 50, 150, 75));
    }

    #[test]
    fn test_overlaps() {
        let a = BoundingBox::new(0., 0., 10., 10.);
        let b = BoundingBox::new(10., 0., 10., 10.);
        let c = BoundingBox::new(5., 5., 10., 10.);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
    }
}
