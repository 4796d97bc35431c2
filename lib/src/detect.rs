//! Regions reported by an external text detector.
//!
//! The detector sees the whole board image and answers with text lines, each optionally broken
//! down into character boxes. [DetectionLocator] turns those observations into [Region]s: a
//! line becomes a region, and each of its characters becomes a sub-region pointing back at it.

use crate::config::{CharacterExtent, DetectionConfig, Origin};
use crate::error::Error;
use crate::layout::{Coverage, Locator};
use crate::region::{BoundingBox, Region};
use crate::utils::encode_png;
use image::GrayImage;
use log::{debug, warn};
use std::fmt;
use std::sync::Arc;

/// Text lines reported with a lower confidence are logged; they are still used.
pub const LOW_DETECTION_CONFIDENCE: f32 = 0.5;

/// A detected text line in normalized image coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct TextObservation {
    pub bounding_box: BoundingBox,
    pub confidence: f32,
    /// Character boxes, in reading order
    pub character_boxes: Vec<BoundingBox>,
}

/// Failure reported by a detector.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorError(pub String);

impl fmt::Display for DetectorError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An external text-region detection capability.
pub trait TextDetector: Send + Sync {
    /// Detect text in an encoded still image.
    fn detect(&self, image: &[u8]) -> Result<Vec<TextObservation>, DetectorError>;
}

/// Locates regions by asking a [TextDetector].
#[derive(Clone)]
pub struct DetectionLocator {
    detector: Arc<dyn TextDetector>,
    config: DetectionConfig,
}

impl DetectionLocator {
    pub fn new(detector: Arc<dyn TextDetector>, config: DetectionConfig) -> DetectionLocator {
        DetectionLocator { detector, config }
    }

    /// Convert detector observations to regions.
    ///
    /// Lines come first in the output, each followed by its characters.
    pub fn normalize(&self, observations: &[TextObservation]) -> Vec<Region> {
        let mut regions = Vec::new();
        for observation in observations.iter() {
            let line = self.orient(observation.bounding_box);
            let parent = regions.len();
            regions.push(Region::normalized(line));
            for &ch in observation.character_boxes.iter() {
                let ch = self.orient(ch);
                let bbox = match self.config.character_extent {
                    CharacterExtent::Own => ch,
                    CharacterExtent::Line => BoundingBox::new(ch.x, line.y, ch.width, line.height),
                };
                regions.push(Region::normalized(bbox).with_parent(parent));
            }
        }
        regions
    }

    fn orient(&self, bbox: BoundingBox) -> BoundingBox {
        match self.config.origin {
            Origin::TopLeft => bbox,
            Origin::BottomLeft => {
                BoundingBox::new(bbox.x, 1. - bbox.bottom(), bbox.width, bbox.height)
            }
        }
    }
}

impl Locator for DetectionLocator {
    fn locate(&self, image: &GrayImage) -> Result<Vec<Region>, Error> {
        let data = encode_png(image)?;
        let observations = self
            .detector
            .detect(&data)
            .map_err(|err| Error::DetectionFailed(err.0))?;
        if observations.is_empty() && self.config.expect_regions {
            return Err(Error::DetectionFailed("no text regions found".into()));
        }
        let low = observations
            .iter()
            .filter(|o| o.confidence < LOW_DETECTION_CONFIDENCE)
            .count();
        if low > 0 {
            warn!(
                "{} of {} text regions have confidence below {}",
                low,
                observations.len(),
                LOW_DETECTION_CONFIDENCE
            );
        }
        let regions = self.normalize(&observations);
        debug!(
            "detector found {} text regions, {} regions in total",
            observations.len(),
            regions.len()
        );
        Ok(regions)
    }

    fn coverage(&self) -> Coverage {
        let grid_size = if self.config.place_on_grid {
            self.config.grid_size
        } else {
            None
        };
        Coverage::Partial { grid_size }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Result<Vec<TextObservation>, DetectorError>);

    impl TextDetector for Fixed {
        fn detect(&self, image: &[u8]) -> Result<Vec<TextObservation>, DetectorError> {
            assert!(!image.is_empty());
            self.0.clone()
        }
    }

    fn line() -> TextObservation {
        TextObservation {
            bounding_box: BoundingBox::new(0.1, 0.2, 0.6, 0.1),
            confidence: 0.9,
            character_boxes: vec![
                BoundingBox::new(0.1, 0.22, 0.05, 0.06),
                BoundingBox::new(0.3, 0.21, 0.05, 0.08),
            ],
        }
    }

    fn locator(
        result: Result<Vec<TextObservation>, DetectorError>,
        config: DetectionConfig,
    ) -> DetectionLocator {
        DetectionLocator::new(Arc::new(Fixed(result)), config)
    }

    #[test]
    fn test_characters_keep_own_extent() {
        let locator = locator(Ok(vec![line()]), DetectionConfig::default());
        let regions = locator.locate(&GrayImage::new(10, 10)).unwrap();
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[0].parent, None);
        assert_eq!(regions[1].parent, Some(0));
        assert_eq!(regions[2].parent, Some(0));
        assert_eq!(regions[1].bbox, BoundingBox::new(0.1, 0.22, 0.05, 0.06));
        assert_eq!(regions[2].bbox, BoundingBox::new(0.3, 0.21, 0.05, 0.08));
    }

    #[test]
    fn test_characters_take_line_extent() {
        let config = DetectionConfig {
            character_extent: CharacterExtent::Line,
            ..DetectionConfig::default()
        };
        let regions = locator(Ok(vec![line()]), config).normalize(&[line()]);
        assert_eq!(regions[1].bbox, BoundingBox::new(0.1, 0.2, 0.05, 0.1));
        assert_eq!(regions[2].bbox, BoundingBox::new(0.3, 0.2, 0.05, 0.1));
    }

    #[test]
    fn test_bottom_left_origin() {
        let config = DetectionConfig {
            origin: Origin::BottomLeft,
            ..DetectionConfig::default()
        };
        let obs = TextObservation {
            bounding_box: BoundingBox::new(0.5, 0.0, 0.25, 0.25),
            confidence: 1.,
            character_boxes: Vec::new(),
        };
        let regions = locator(Ok(Vec::new()), config).normalize(&[obs]);
        assert_eq!(regions[0].bbox, BoundingBox::new(0.5, 0.75, 0.25, 0.25));
    }

    #[test]
    fn test_low_confidence_lines_kept() {
        let mut faint = line();
        faint.confidence = LOW_DETECTION_CONFIDENCE / 2.;
        let regions = locator(Ok(vec![faint]), DetectionConfig::default())
            .locate(&GrayImage::new(10, 10))
            .unwrap();
        assert_eq!(regions.len(), 3);
    }

    #[test]
    fn test_coverage() {
        let config = DetectionConfig {
            grid_size: Some(4),
            ..DetectionConfig::default()
        };
        let placed = locator(Ok(Vec::new()), config.clone());
        assert_eq!(placed.coverage(), Coverage::Partial { grid_size: Some(4) });
        let config = DetectionConfig {
            place_on_grid: false,
            ..config
        };
        let unplaced = locator(Ok(Vec::new()), config);
        assert_eq!(unplaced.coverage(), Coverage::Partial { grid_size: None });
    }

    #[test]
    fn test_detection_failed() {
        let failing = locator(Err(DetectorError("busy".into())), DetectionConfig::default());
        assert!(matches!(
            failing.locate(&GrayImage::new(10, 10)),
            Err(Error::DetectionFailed(_))
        ));
        let empty = locator(Ok(Vec::new()), DetectionConfig::default());
        assert!(matches!(
            empty.locate(&GrayImage::new(10, 10)),
            Err(Error::DetectionFailed(_))
        ));
        let config = DetectionConfig {
            expect_regions: false,
            ..DetectionConfig::default()
        };
        let allowed = locator(Ok(Vec::new()), config);
        assert!(allowed.locate(&GrayImage::new(10, 10)).unwrap().is_empty());
    }
}
