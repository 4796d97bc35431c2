use std::io;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad grid parameters or a zero-size image. Aborts the run.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The region detector failed or found nothing where something was expected.
    #[error("Region detection failed: {0}")]
    DetectionFailed(String),
    /// A region is empty or lies outside the image after padding and clamping.
    #[error("Region {index} can not be cropped from a {width}x{height} image")]
    InvalidRegion {
        index: usize,
        width: u32,
        height: u32,
    },
    /// The classifier can not run at all. Aborts the run.
    #[error("Classifier unavailable: {0}")]
    ClassifierUnavailable(String),
    /// The classifier ran but produced no usable result.
    #[error("Classifier produced no result")]
    NoResult,
    #[error("Classifier did not answer within {0:?}")]
    ClassifierTimeout(Duration),
    #[error("Board incomplete: located {found} of {expected} cells")]
    IncompleteBoard { expected: usize, found: usize },
    #[error("Worker pool could not be created")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("I/O error")]
    Io(#[from] io::Error),
    /// Error decoding or encoding an image
    #[error("Image could not be processed")]
    Image(#[from] image::error::ImageError),
    #[error("Configuration could not be read")]
    Config(#[from] serde_json::Error),
}

impl Error {
    /// Returns true for failures that are recovered per cell or per run and never abort a scan.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::DetectionFailed(_)
                | Error::InvalidRegion { .. }
                | Error::NoResult
                | Error::ClassifierTimeout(_)
                | Error::IncompleteBoard { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_kinds() {
        assert!(Error::NoResult.is_recoverable());
        assert!(Error::ClassifierTimeout(Duration::from_millis(5)).is_recoverable());
        assert!(Error::DetectionFailed("none".into()).is_recoverable());
        assert!(!Error::ClassifierUnavailable("not loaded".into()).is_recoverable());
        assert!(!Error::InvalidInput("grid size 0".into()).is_recoverable());
    }
}
