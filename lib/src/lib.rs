//! An OCR library that reads the digits of a puzzle board from a photo
//!
//! The board image is split in regions, one per square, either by a fixed grid or by an
//! external text detector. Every region is cropped with a little padding and handed to an image
//! classifier, and the answers are assembled into a [Board].
//!
//! The classifier is an external capability behind the [Classifier] trait. It is created once
//! and shared by all scans; [LazyClassifier] defers loading the model to its first use, and
//! [TemplateClassifier] is a self-contained implementation based on template matching.
//!
//! # Basic usage
//! ```no_run
//! # use std::sync::Arc;
//! # use sudoku_ocr::{Error, Recognizer, ScanConfig, TemplateClassifier};
//! let classifier = TemplateClassifier::from_dir("templates")?;
//! let recognizer = Recognizer::fixed_grid(ScanConfig::default(), Arc::new(classifier))?;
//! let scan = recognizer.recognize_from_file("tests/board.png")?;
//! println!("{}", scan.board);
//! # Ok::<(), Error>(())
//! ```
//! This example would show the recognized digits displayed as a string.
//!
//! Where: `.` is an empty square.
//!
//! ```text
//! 53..7....
//! 6..195...
//! .98....6.
//! 8...6...3
//! 4..8.3..1
//! 7...2...6
//! .6....28.
//! ...419..5
//! ....8..79
//! ```

mod board;
mod classifier;
mod config;
mod detect;
mod error;
mod extract;
mod layout;
mod recognizer;
mod region;
mod stats;
mod template;
mod utils;

pub use board::{Absence, Assembler, Board, Cell, Outcome, Warning};
pub use classifier::{Classifier, ClassifierAdapter, ClassifierError, LazyClassifier, Prediction};
pub use config::{CharacterExtent, DetectionConfig, Origin, Padding, ScanConfig};
pub use detect::{
    DetectionLocator, DetectorError, TextDetector, TextObservation, LOW_DETECTION_CONFIDENCE,
};
pub use error::Error;
pub use extract::CellExtractor;
pub use layout::{grid_square, Coverage, FixedGrid, Locator};
pub use recognizer::{Recognizer, Scan};
pub use region::{BoundingBox, GridIndex, Region, Space};
pub use stats::ImageStats;
pub use template::TemplateClassifier;
pub use utils::{collage, encode_png, save_cells};
