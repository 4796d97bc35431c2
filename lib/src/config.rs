use crate::Error;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_GRID_SIZE: usize = 9;
pub const DEFAULT_MARGIN_PERCENT: f64 = 15.;

/// Extra pixels added around a region before cropping.
///
/// The default is generous at the bottom to keep descenders and serifs of handwritten digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Padding {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Padding {
    pub fn none() -> Padding {
        Padding {
            left: 0,
            top: 0,
            right: 0,
            bottom: 0,
        }
    }
}

impl Default for Padding {
    fn default() -> Self {
        Padding {
            left: 1,
            top: 1,
            right: 1,
            bottom: 8,
        }
    }
}

/// Vertical extent used for character boxes nested in a detected text line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CharacterExtent {
    /// Each character keeps its own y-origin and height
    Own,
    /// Characters take the y-origin and height of their text line
    Line,
}

/// Where a detector puts the origin of its normalized boxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    TopLeft,
    /// y grows upward from the bottom edge of the image
    BottomLeft,
}

/// Settings for the detection-based region locator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub character_extent: CharacterExtent,
    pub origin: Origin,
    /// Treat an empty detection as a failure
    pub expect_regions: bool,
    /// Address detected cells by row and column; when false they all end up unplaced
    pub place_on_grid: bool,
    /// Board size for placing detected cells; `None` follows [ScanConfig::grid_size]
    pub grid_size: Option<usize>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        DetectionConfig {
            character_extent: CharacterExtent::Own,
            origin: Origin::TopLeft,
            expect_regions: true,
            place_on_grid: true,
            grid_size: None,
        }
    }
}

/// Settings for a board scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Number of rows and columns of the fixed grid
    pub grid_size: usize,
    /// Inset of each grid region, in percent of the cell width
    pub margin_percent: f64,
    pub padding: Padding,
    /// Classifications below this confidence are flagged, not dropped
    pub confidence_threshold: Option<f32>,
    /// Regions whose pixel standard deviation (0..1 scale) is below this are blank
    pub blank_threshold: Option<f64>,
    /// Upper bound on concurrent classifier calls; the classifier's own limit always applies
    pub max_concurrency: Option<usize>,
    /// Per-call classifier timeout in milliseconds
    pub timeout_ms: Option<u64>,
    pub detection: DetectionConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            grid_size: DEFAULT_GRID_SIZE,
            margin_percent: DEFAULT_MARGIN_PERCENT,
            padding: Padding::default(),
            confidence_threshold: None,
            blank_threshold: None,
            max_concurrency: None,
            timeout_ms: None,
            detection: DetectionConfig::default(),
        }
    }
}

impl ScanConfig {
    pub fn new() -> ScanConfig {
        ScanConfig::default()
    }

    /// Read a JSON configuration. Missing fields take their default value.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<ScanConfig, Error> {
        let text = fs::read_to_string(path)?;
        let config: ScanConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_grid_size(mut self, grid_size: usize) -> Self {
        self.grid_size = grid_size;
        self
    }

    pub fn with_margin_percent(mut self, margin_percent: f64) -> Self {
        self.margin_percent = margin_percent;
        self
    }

    pub fn with_padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = Some(threshold);
        self
    }

    pub fn with_blank_threshold(mut self, threshold: f64) -> Self {
        self.blank_threshold = Some(threshold);
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = Some(max_concurrency);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_detection(mut self, detection: DetectionConfig) -> Self {
        self.detection = detection;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Check that all values are usable.
    /// # Errors
    /// `InvalidInput` naming the first offending field.
    pub fn validate(&self) -> Result<(), Error> {
        if self.grid_size == 0 {
            return Err(Error::InvalidInput("grid_size must be positive".into()));
        }
        if !(0.0..50.0).contains(&self.margin_percent) {
            return Err(Error::InvalidInput(format!(
                "margin_percent {} not in [0, 50)",
                self.margin_percent
            )));
        }
        if let Some(t) = self.confidence_threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(Error::InvalidInput(format!(
                    "confidence_threshold {} not in [0, 1]",
                    t
                )));
            }
        }
        if let Some(t) = self.blank_threshold {
            if !t.is_finite() || t < 0. {
                return Err(Error::InvalidInput(format!("blank_threshold {}", t)));
            }
        }
        if self.max_concurrency == Some(0) {
            return Err(Error::InvalidInput("max_concurrency must be positive".into()));
        }
        if self.timeout_ms == Some(0) {
            return Err(Error::InvalidInput("timeout_ms must be positive".into()));
        }
        if self.detection.grid_size == Some(0) {
            return Err(Error::InvalidInput("detection.grid_size must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScanConfig::default();
        assert_eq!(config.grid_size, 9);
        assert_eq!(config.margin_percent, 15.);
        assert_eq!(config.padding, Padding { left: 1, top: 1, right: 1, bottom: 8 });
        assert_eq!(config.confidence_threshold, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let json = r#"{
            "grid_size": 4,
            "timeout_ms": 250,
            "detection": { "character_extent": "Line" }
        }"#;
        let config: ScanConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.grid_size, 4);
        assert_eq!(config.timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.detection.character_extent, CharacterExtent::Line);
        assert_eq!(config.detection.origin, Origin::TopLeft);
        assert_eq!(config.detection.grid_size, None);
        assert!(config.detection.place_on_grid);
        assert_eq!(config.margin_percent, DEFAULT_MARGIN_PERCENT);
    }

    #[test]
    fn test_validate() {
        assert!(ScanConfig::new().with_grid_size(0).validate().is_err());
        assert!(ScanConfig::new().with_margin_percent(50.).validate().is_err());
        assert!(ScanConfig::new().with_confidence_threshold(1.5).validate().is_err());
        assert!(ScanConfig::new().with_max_concurrency(0).validate().is_err());
        assert!(ScanConfig::new().with_margin_percent(0.).validate().is_ok());
    }
}
