use crate::board::{Absence, Assembler, Board, Cell, Outcome, Warning};
use crate::classifier::{Classifier, ClassifierAdapter};
use crate::config::ScanConfig;
use crate::detect::{DetectionLocator, TextDetector};
use crate::extract::{interior, CellExtractor};
use crate::layout::{FixedGrid, Locator};
use crate::region::Region;
use crate::stats::ImageStats;
use crate::Error;
use image::GrayImage;
use log::{debug, info, warn};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

/// Holds the result of a board scan.
#[derive(Debug, Clone)]
pub struct Scan {
    pub board: Board,
    /// Every located region, text lines included; `Region::parent` indexes into this list
    pub regions: Vec<Region>,
    /// Conditions that did not stop the scan, such as a failed detection
    pub warnings: Vec<Warning>,
}

/// Board recognizer
pub struct Recognizer {
    config: ScanConfig,
    locator: Box<dyn Locator>,
    classifier: ClassifierAdapter,
    extractor: CellExtractor,
    assembler: Assembler,
    pool: OnceLock<ThreadPool>,
}

impl Recognizer {
    /// Create a recognizer that locates regions with `locator` and labels them with `classifier`.
    ///
    /// The classifier is shared, never reloaded, for every scan made with this recognizer.
    ///
    /// # Errors
    /// `InvalidInput` if the configuration is not valid.
    pub fn new(
        config: ScanConfig,
        locator: Box<dyn Locator>,
        classifier: Arc<dyn Classifier>,
    ) -> Result<Recognizer, Error> {
        config.validate()?;
        let classifier = ClassifierAdapter::new(classifier).with_timeout(config.timeout());
        let extractor = CellExtractor::new(config.padding);
        let assembler = Assembler::new(config.confidence_threshold);
        Ok(Recognizer {
            config,
            locator,
            classifier,
            extractor,
            assembler,
            pool: OnceLock::new(),
        })
    }

    /// Recognizer that splits the board image in a fixed grid.
    pub fn fixed_grid(
        config: ScanConfig,
        classifier: Arc<dyn Classifier>,
    ) -> Result<Recognizer, Error> {
        let locator = FixedGrid::new(config.grid_size, config.margin_percent)?;
        Recognizer::new(config, Box::new(locator), classifier)
    }

    /// Recognizer that classifies the characters found by a text detector.
    ///
    /// Detected cells are placed on a board of `config.grid_size` unless the detection
    /// settings name their own size.
    pub fn with_detector(
        config: ScanConfig,
        classifier: Arc<dyn Classifier>,
        detector: Arc<dyn TextDetector>,
    ) -> Result<Recognizer, Error> {
        let mut detection = config.detection.clone();
        detection.grid_size = detection.grid_size.or(Some(config.grid_size));
        let locator = DetectionLocator::new(detector, detection);
        Recognizer::new(config, Box::new(locator), classifier)
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Recognize a board image.
    ///
    /// The recognition process consists of these phases:
    /// 1. Locate the regions of interest
    /// 2. Crop every region that has no sub-regions and classify the crops, in parallel when
    ///    the classifier allows it
    /// 3. Assemble the cells into a board
    ///
    /// # Errors
    /// * `InvalidInput` for an empty image or a locator that rejects the image
    /// * `ClassifierUnavailable` if the classifier can not run; no partial board is returned
    ///
    /// Failed detection, failed crops, missing or late classifications do not fail the scan;
    /// they show up as warnings and empty squares.
    pub fn recognize(&self, image: &GrayImage) -> Result<Scan, Error> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::InvalidInput(format!("image size {}x{}", width, height)));
        }
        self.classifier.ensure_ready()?;
        let coverage = self.locator.coverage();
        let regions = match self.locator.locate(image) {
            Ok(regions) => regions,
            Err(Error::DetectionFailed(msg)) => {
                warn!("region detection failed: {}", msg);
                let (board, mut warnings) =
                    self.assembler.assemble(Vec::new(), coverage, width, height);
                warnings.push(Warning::DetectionFailed(msg));
                return Ok(Scan {
                    board,
                    regions: Vec::new(),
                    warnings,
                });
            }
            Err(err) => return Err(err),
        };

        let parents: HashSet<usize> = regions.iter().filter_map(|r| r.parent).collect();
        let targets: Vec<(usize, &Region)> = regions
            .iter()
            .enumerate()
            .filter(|(i, _)| !parents.contains(i))
            .collect();
        let stats = self.config.blank_threshold.map(|_| ImageStats::new(image));
        let stats = stats.as_ref();

        let pool = self.pool()?;
        let workers = pool.map_or(1, |pool| pool.current_num_threads());
        let now = Instant::now();
        let cells: Vec<Cell> = if let (Some(pool), true) = (pool, targets.len() > 1) {
            pool.install(|| {
                targets
                    .par_iter()
                    .map(|&(index, region)| self.scan_cell(image, index, region, stats))
                    .collect::<Result<Vec<_>, Error>>()
            })?
        } else {
            targets
                .iter()
                .map(|&(index, region)| self.scan_cell(image, index, region, stats))
                .collect::<Result<Vec<_>, Error>>()?
        };
        let classified = cells.iter().filter(|cell| !cell.is_empty()).count();
        info!(
            "classified {} of {} regions with {} workers in {:?}",
            classified,
            cells.len(),
            workers,
            now.elapsed()
        );

        let (board, warnings) = self.assembler.assemble(cells, coverage, width, height);
        Ok(Scan {
            board,
            regions,
            warnings,
        })
    }

    pub fn recognize_from_file<P: AsRef<Path>>(&self, path: P) -> Result<Scan, Error> {
        let gray = image::open(path)?.into_luma8();
        self.recognize(&gray)
    }

    pub fn recognize_from_memory(&self, data: &[u8]) -> Result<Scan, Error> {
        let gray = image::load_from_memory(data)?.into_luma8();
        self.recognize(&gray)
    }

    fn workers(&self) -> usize {
        let limit = self.classifier.concurrency_limit();
        self.config.max_concurrency.map_or(limit, |max| max.min(limit))
    }

    /// The worker pool, built on the first scan when the classifier is ready and knows its
    /// limit. `None` when classification runs on the calling thread.
    fn pool(&self) -> Result<Option<&ThreadPool>, Error> {
        if let Some(pool) = self.pool.get() {
            return Ok(Some(pool));
        }
        let workers = self.workers();
        if workers <= 1 {
            return Ok(None);
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("sudoku-ocr-{}", i))
            .build()?;
        Ok(Some(self.pool.get_or_init(|| pool)))
    }

    /// Crop and classify one region. Only errors that must abort the scan are returned.
    fn scan_cell(
        &self,
        image: &GrayImage,
        index: usize,
        region: &Region,
        stats: Option<&ImageStats>,
    ) -> Result<Cell, Error> {
        let crop = match self.extractor.extract(image, region, index) {
            Ok(crop) => crop,
            Err(err @ Error::InvalidRegion { .. }) => {
                warn!("{}", err);
                return Ok(Cell::new(
                    region.clone(),
                    None,
                    Outcome::Absent(Absence::InvalidRegion),
                ));
            }
            Err(err) => return Err(err),
        };

        if let (Some(threshold), Some(stats)) = (self.config.blank_threshold, stats) {
            if let Some(rect) = interior(region, image.width(), image.height()) {
                let (mean, std) = stats.area_stats(&rect);
                if std < threshold {
                    debug!("region {} blank: mean {:.3} std {:.3}", index, mean, std);
                    let outcome = Outcome::Absent(Absence::Blank);
                    return Ok(Cell::new(region.clone(), Some(crop), outcome));
                }
            }
        }

        let outcome = match self.classifier.classify(&crop) {
            Ok(prediction) => {
                debug!("region {}: {:?}", index, prediction);
                Outcome::Classified(prediction)
            }
            Err(Error::NoResult) => {
                warn!("region {}: classifier produced no result", index);
                Outcome::Absent(Absence::NoResult)
            }
            Err(Error::ClassifierTimeout(timeout)) => {
                warn!("region {}: classifier timed out after {:?}", index, timeout);
                Outcome::Absent(Absence::Timeout)
            }
            Err(err) => return Err(err),
        };
        Ok(Cell::new(region.clone(), Some(crop), outcome))
    }
}
