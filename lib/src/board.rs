use crate::classifier::Prediction;
use crate::layout::{grid_square, Coverage};
use crate::region::{GridIndex, Region};
use image::GrayImage;
use log::{debug, warn};
use std::fmt;

/// Why a cell has no classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Absence {
    /// The region could not be cropped from the image
    InvalidRegion,
    /// The classifier declined or returned nothing usable
    NoResult,
    /// The classifier did not answer in time
    Timeout,
    /// The region was judged empty before classification
    Blank,
    /// No region was located for this square
    NotLocated,
}

/// The classification outcome of one cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Classified(Prediction),
    Absent(Absence),
}

/// A region bound to its cropped image and classification outcome.
#[derive(Debug, Clone)]
pub struct Cell {
    pub region: Region,
    pub crop: Option<GrayImage>,
    pub outcome: Outcome,
    /// Set by the assembler when the confidence is below the configured threshold
    pub low_confidence: bool,
}

impl Cell {
    pub fn new(region: Region, crop: Option<GrayImage>, outcome: Outcome) -> Cell {
        Cell {
            region,
            crop,
            outcome,
            low_confidence: false,
        }
    }

    fn unlocated(region: Region) -> Cell {
        Cell::new(region, None, Outcome::Absent(Absence::NotLocated))
    }

    pub fn prediction(&self) -> Option<&Prediction> {
        match &self.outcome {
            Outcome::Classified(p) => Some(p),
            Outcome::Absent(_) => None,
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.prediction().map(|p| p.label.as_str())
    }

    pub fn confidence(&self) -> Option<f32> {
        self.prediction().map(|p| p.confidence)
    }

    pub fn absence(&self) -> Option<Absence> {
        match self.outcome {
            Outcome::Classified(_) => None,
            Outcome::Absent(reason) => Some(reason),
        }
    }

    /// An empty board square
    pub fn is_empty(&self) -> bool {
        self.prediction().is_none()
    }

    // classified beats absent, then higher confidence; ties keep the incumbent
    fn beats(&self, other: &Cell) -> bool {
        match (self.confidence(), other.confidence()) {
            (Some(a), Some(b)) => a > b,
            (Some(_), None) => true,
            _ => false,
        }
    }
}

/// Run-level conditions that did not stop the scan.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// The detector failed; the board is empty
    DetectionFailed(String),
    /// The locator did not cover every square of a fixed grid
    IncompleteBoard { expected: usize, found: usize },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Warning::DetectionFailed(msg) => write!(f, "detection failed: {}", msg),
            Warning::IncompleteBoard { expected, found } => {
                write!(f, "incomplete board: located {} of {} cells", found, expected)
            }
        }
    }
}

/// The recognized board: one [Cell] for every square, in row-major order.
#[derive(Debug, Clone)]
pub struct Board {
    size: usize,
    cells: Vec<Cell>,
    unplaced: Vec<Cell>,
}

impl Board {
    /// Number of rows and columns
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&Cell> {
        if row < self.size && col < self.size {
            self.cells.get(row * self.size + col)
        } else {
            None
        }
    }

    pub fn label(&self, row: usize, col: usize) -> Option<&str> {
        self.get(row, col).and_then(|cell| cell.label())
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        // chunks panics on zero
        self.cells.chunks(self.size.max(1))
    }

    /// Cells that could not be given a square.
    pub fn unplaced(&self) -> &[Cell] {
        &self.unplaced
    }

    /// Number of squares with a classification
    pub fn filled(&self) -> usize {
        self.cells.iter().filter(|cell| !cell.is_empty()).count()
    }

    pub fn labels(&self) -> Vec<Vec<Option<String>>> {
        self.rows()
            .map(|row| row.iter().map(|cell| cell.label().map(String::from)).collect())
            .collect()
    }

    /// Pairs of squares that repeat a label in the same row, column or box.
    ///
    /// Boxes are only checked when the board size is a perfect square.
    pub fn conflicts(&self) -> Vec<(GridIndex, GridIndex)> {
        let n = self.size;
        let k = (1..=n).find(|k| k * k >= n).filter(|k| k * k == n);
        let filled: Vec<(GridIndex, &str)> = self
            .cells
            .iter()
            .enumerate()
            .filter_map(|(i, cell)| cell.label().map(|l| (GridIndex::new(i / n, i % n), l)))
            .collect();
        let mut conflicts = Vec::new();
        for (i, &(a, la)) in filled.iter().enumerate() {
            for &(b, lb) in filled[i + 1..].iter() {
                if la != lb {
                    continue;
                }
                let same_box =
                    k.map_or(false, |k| a.row / k == b.row / k && a.col / k == b.col / k);
                if a.row == b.row || a.col == b.col || same_box {
                    conflicts.push((a, b));
                }
            }
        }
        conflicts
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = self
            .rows()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.label().unwrap_or("."))
                    .collect::<Vec<_>>()
                    .join("")
            })
            .collect::<Vec<String>>()
            .join("\n");
        write!(f, "{}", text)
    }
}

/// Reduces classified cells to a [Board].
#[derive(Debug, Clone, Default)]
pub struct Assembler {
    confidence_threshold: Option<f32>,
}

impl Assembler {
    pub fn new(confidence_threshold: Option<f32>) -> Assembler {
        Assembler {
            confidence_threshold,
        }
    }

    /// Place `cells` on a board for an image of `width` x `height` pixels.
    ///
    /// Cells carry their square in `region.index`. Cells without one are addressed by the
    /// square that contains their center when `coverage` names a grid size; otherwise they end
    /// up unplaced. Squares nobody claims get an empty cell spanning the whole square.
    ///
    /// Never fails: a fixed grid that is not fully covered yields
    /// [Warning::IncompleteBoard](crate::Warning::IncompleteBoard) next to the best-effort board.
    pub fn assemble(
        &self,
        cells: Vec<Cell>,
        coverage: Coverage,
        width: u32,
        height: u32,
    ) -> (Board, Vec<Warning>) {
        let (n, complete) = match coverage {
            Coverage::Complete { grid_size } => (grid_size, true),
            Coverage::Partial { grid_size } => (grid_size.unwrap_or(0), false),
        };
        let mut slots: Vec<Option<Cell>> = (0..n * n).map(|_| None).collect();
        let mut unplaced = Vec::new();
        for mut cell in cells.into_iter() {
            if let (Some(threshold), Some(confidence)) =
                (self.confidence_threshold, cell.confidence())
            {
                cell.low_confidence = confidence < threshold;
            }
            if cell.region.index.is_none() && !complete && n > 0 {
                cell.region.index = containing_square(&cell.region, n, width, height);
            }
            let slot = match cell.region.index {
                Some(GridIndex { row, col }) if row < n && col < n => &mut slots[row * n + col],
                _ => {
                    unplaced.push(cell);
                    continue;
                }
            };
            let keep_current = slot.as_ref().map_or(false, |current| !cell.beats(current));
            if keep_current {
                unplaced.push(cell);
            } else if let Some(previous) = slot.replace(cell) {
                unplaced.push(previous);
            }
        }
        let found = slots.iter().filter(|s| s.is_some()).count();
        let mut warnings = Vec::new();
        if complete && found < n * n {
            warn!("located {} of {} cells", found, n * n);
            warnings.push(Warning::IncompleteBoard {
                expected: n * n,
                found,
            });
        }
        let cells: Vec<Cell> = slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.unwrap_or_else(|| Cell::unlocated(grid_square(n, width, height, i / n, i % n)))
            })
            .collect();
        let low = cells.iter().filter(|c| c.low_confidence).count();
        if low > 0 {
            debug!("{} cells below confidence threshold", low);
        }
        let board = Board {
            size: n,
            cells,
            unplaced,
        };
        (board, warnings)
    }
}

fn containing_square(region: &Region, n: usize, width: u32, height: u32) -> Option<GridIndex> {
    if width == 0 || height == 0 {
        return None;
    }
    let (cx, cy) = region.to_pixels(width, height).bbox.center();
    if cx < 0. || cy < 0. || cx >= width as f64 || cy >= height as f64 {
        return None;
    }
    let col = (cx / (width as f64 / n as f64)) as usize;
    let row = (cy / (height as f64 / n as f64)) as usize;
    Some(GridIndex::new(row.min(n - 1), col.min(n - 1)))
}
