use crate::error::Error;
use crate::region::{BoundingBox, Region};
use image::GrayImage;
use log::debug;

/// How much of a grid a locator promises to cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    /// Every square of a `grid_size` x `grid_size` board is located
    Complete { grid_size: usize },
    /// Any number of regions; addressed on a `grid_size` board when the size is known
    Partial { grid_size: Option<usize> },
}

/// Computes the regions of interest of a board image.
pub trait Locator: Send + Sync {
    /// Locate the regions to classify, in source image coordinates.
    ///
    /// Sub-regions refer to their enclosing region by position in the returned list.
    fn locate(&self, image: &GrayImage) -> Result<Vec<Region>, Error>;

    fn coverage(&self) -> Coverage;
}

/// Splits the image in a fixed `grid_size` x `grid_size` grid of equal squares.
///
/// Each square is inset by `margin_percent` of the square width on all sides, which keeps the
/// grid lines out of the regions.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedGrid {
    grid_size: usize,
    margin_percent: f64,
}

impl FixedGrid {
    /// # Errors
    /// `InvalidInput` if `grid_size` is zero or the margin is not in [0, 50).
    pub fn new(grid_size: usize, margin_percent: f64) -> Result<FixedGrid, Error> {
        if grid_size == 0 {
            return Err(Error::InvalidInput("grid size must be positive".into()));
        }
        if !(0.0..50.0).contains(&margin_percent) {
            return Err(Error::InvalidInput(format!(
                "margin {}% not in [0, 50)",
                margin_percent
            )));
        }
        Ok(FixedGrid {
            grid_size,
            margin_percent,
        })
    }

    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    /// The regions of a `width` x `height` image in row-major order, in pixels.
    ///
    /// # Example
    /// ```
    /// # use sudoku_ocr::{FixedGrid, Error};
    /// let grid = FixedGrid::new(9, 0.)?;
    /// let regions = grid.regions(450, 450)?;
    /// assert_eq!(regions.len(), 81);
    /// let r = &regions[2 * 9 + 3];
    /// assert_eq!((r.bbox.x, r.bbox.y, r.bbox.width, r.bbox.height), (150., 100., 50., 50.));
    /// # Ok::<(), Error>(())
    /// ```
    pub fn regions(&self, width: u32, height: u32) -> Result<Vec<Region>, Error> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidInput(format!(
                "image size {}x{}",
                width, height
            )));
        }
        let n = self.grid_size;
        let dx = width as f64 / n as f64;
        let dy = height as f64 / n as f64;
        // the same inset is used vertically
        let d = dx * self.margin_percent / 100.;
        let (w, h) = (dx - 2. * d, dy - 2. * d);
        if w <= 0. || h <= 0. {
            return Err(Error::InvalidInput(format!(
                "margin {}% leaves no room in a {:.1}x{:.1} square",
                self.margin_percent, dx, dy
            )));
        }
        debug!("grid {}x{} square {:.2}x{:.2} inset {:.2}", n, n, dx, dy, d);
        let mut regions = Vec::with_capacity(n * n);
        for row in 0..n {
            for col in 0..n {
                let bbox = BoundingBox::new(col as f64 * dx + d, row as f64 * dy + d, w, h);
                regions.push(Region::pixels(bbox).with_index(row, col));
            }
        }
        Ok(regions)
    }
}

impl Locator for FixedGrid {
    fn locate(&self, image: &GrayImage) -> Result<Vec<Region>, Error> {
        self.regions(image.width(), image.height())
    }

    fn coverage(&self) -> Coverage {
        Coverage::Complete {
            grid_size: self.grid_size,
        }
    }
}

/// The full square at `row`, `col` of a `grid_size` board spanning the whole image, in pixels.
pub fn grid_square(grid_size: usize, width: u32, height: u32, row: usize, col: usize) -> Region {
    let dx = width as f64 / grid_size as f64;
    let dy = height as f64 / grid_size as f64;
    Region::pixels(BoundingBox::new(col as f64 * dx, row as f64 * dy, dx, dy)).with_index(row, col)
}
