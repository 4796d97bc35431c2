use crate::error::Error;
use crate::utils::encode_png;
use image::GrayImage;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, OnceLock, PoisonError};
use std::thread;
use std::time::Duration;

/// Best-guess label for a sub-image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    /// In [0, 1]
    pub confidence: f32,
}

impl Prediction {
    pub fn new<S: Into<String>>(label: S, confidence: f32) -> Prediction {
        Prediction {
            label: label.into(),
            confidence,
        }
    }
}

/// Failure reported by a classifier.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierError {
    /// The model is not loaded or failed internally; no classification is possible
    Unavailable(String),
    /// The model ran but declined this image
    Rejected(String),
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ClassifierError::Unavailable(msg) => write!(f, "unavailable: {}", msg),
            ClassifierError::Rejected(msg) => write!(f, "rejected: {}", msg),
        }
    }
}

/// An external image classification capability.
///
/// Implementations hold a model that is loaded once and shared by all calls, so `classify`
/// must be callable from several threads at once.
pub trait Classifier: Send + Sync {
    /// Classify an encoded still image. Candidates are returned best first.
    fn classify(&self, image: &[u8]) -> Result<Vec<Prediction>, ClassifierError>;

    /// False if the model can not be used at all.
    fn is_ready(&self) -> bool {
        true
    }

    /// Number of calls the model can safely serve at the same time.
    fn concurrency_limit(&self) -> usize {
        1
    }
}

/// Counts the classifier calls that are still running, abandoned ones included.
struct Permits {
    free: Mutex<usize>,
    released: Condvar,
}

/// A running call; the slot is freed on drop.
struct Permit(Arc<Permits>);

impl Permits {
    fn new(limit: usize) -> Permits {
        Permits {
            free: Mutex::new(limit),
            released: Condvar::new(),
        }
    }

    /// Wait for a free slot, at most `timeout` when given. `None` if the wait timed out.
    fn acquire(self: &Arc<Self>, timeout: Option<Duration>) -> Option<Permit> {
        // a poisoned count is still a valid count
        let free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        let mut free = match timeout {
            Some(timeout) => {
                let (free, _) = self
                    .released
                    .wait_timeout_while(free, timeout, |free| *free == 0)
                    .unwrap_or_else(PoisonError::into_inner);
                free
            }
            None => self
                .released
                .wait_while(free, |free| *free == 0)
                .unwrap_or_else(PoisonError::into_inner),
        };
        if *free == 0 {
            return None;
        }
        *free -= 1;
        Some(Permit(Arc::clone(self)))
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        let mut free = self.0.free.lock().unwrap_or_else(PoisonError::into_inner);
        *free += 1;
        self.0.released.notify_one();
    }
}

/// Sends cell images to a shared [Classifier] and reduces the answer to a single [Prediction].
///
/// No more than `concurrency_limit()` calls run at the same time. A call that timed out keeps
/// its slot until the classifier really returns.
#[derive(Clone)]
pub struct ClassifierAdapter {
    classifier: Arc<dyn Classifier>,
    timeout: Option<Duration>,
    permits: Arc<OnceLock<Arc<Permits>>>,
}

impl ClassifierAdapter {
    pub fn new(classifier: Arc<dyn Classifier>) -> ClassifierAdapter {
        ClassifierAdapter {
            classifier,
            timeout: None,
            permits: Arc::new(OnceLock::new()),
        }
    }

    /// Give up on a call after `timeout`. The call itself can not be interrupted and is left to
    /// finish on its own thread.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> ClassifierAdapter {
        self.timeout = timeout;
        self
    }

    pub fn ensure_ready(&self) -> Result<(), Error> {
        if self.classifier.is_ready() {
            Ok(())
        } else {
            Err(Error::ClassifierUnavailable("model not ready".into()))
        }
    }

    pub fn concurrency_limit(&self) -> usize {
        self.classifier.concurrency_limit().max(1)
    }

    /// Classify a cell image.
    ///
    /// # Errors
    /// * `ClassifierUnavailable` if the model can not run
    /// * `NoResult` if the model declined or returned no usable candidate
    /// * `ClassifierTimeout` if the model did not answer in time
    pub fn classify(&self, img: &GrayImage) -> Result<Prediction, Error> {
        let data = encode_png(img)?;
        // sized on first use, when a lazily loaded model knows its limit
        let permits = self
            .permits
            .get_or_init(|| Arc::new(Permits::new(self.concurrency_limit())));
        let permit = match permits.acquire(self.timeout) {
            Some(permit) => permit,
            None => {
                debug!("no free classifier slot within {:?}", self.timeout);
                return Err(Error::ClassifierTimeout(self.timeout.unwrap_or_default()));
            }
        };
        let candidates = match self.timeout {
            Some(timeout) => self.call_with_timeout(data, timeout, permit)?,
            None => {
                let candidates = self.classifier.classify(&data);
                drop(permit);
                candidates
            }
        };
        let candidates = candidates.map_err(|err| match err {
            ClassifierError::Unavailable(msg) => Error::ClassifierUnavailable(msg),
            ClassifierError::Rejected(msg) => {
                debug!("classifier rejected image: {}", msg);
                Error::NoResult
            }
        })?;
        let best = candidates.into_iter().next().ok_or(Error::NoResult)?;
        if best.confidence.is_nan() {
            return Err(Error::NoResult);
        }
        Ok(Prediction {
            confidence: best.confidence.max(0.).min(1.),
            ..best
        })
    }

    fn call_with_timeout(
        &self,
        data: Vec<u8>,
        timeout: Duration,
        permit: Permit,
    ) -> Result<Result<Vec<Prediction>, ClassifierError>, Error> {
        let classifier = Arc::clone(&self.classifier);
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("classify".into())
            .spawn(move || {
                let result = classifier.classify(&data);
                drop(permit);
                // the receiver is gone after a timeout
                let _ = tx.send(result);
            })?;
        match rx.recv_timeout(timeout) {
            Ok(result) => Ok(result),
            Err(RecvTimeoutError::Timeout) => Err(Error::ClassifierTimeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(Error::ClassifierUnavailable(
                "classifier call panicked".into(),
            )),
        }
    }
}

type Loader<C> = Box<dyn Fn() -> Result<C, String> + Send + Sync>;

/// A classifier whose model is loaded on first use and then kept for the lifetime of the handle.
///
/// A failed load is final: the handle stays unavailable and the loader is not retried.
pub struct LazyClassifier<C> {
    model: OnceLock<Result<C, String>>,
    loader: Loader<C>,
}

impl<C: Classifier> LazyClassifier<C> {
    pub fn new<F>(loader: F) -> LazyClassifier<C>
    where
        F: Fn() -> Result<C, String> + Send + Sync + 'static,
    {
        LazyClassifier {
            model: OnceLock::new(),
            loader: Box::new(loader),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.model.get(), Some(Ok(_)))
    }

    fn model(&self) -> Result<&C, ClassifierError> {
        let model = self.model.get_or_init(|| {
            info!("loading classifier model");
            (self.loader)()
        });
        model
            .as_ref()
            .map_err(|msg| ClassifierError::Unavailable(msg.clone()))
    }
}

impl<C: Classifier> Classifier for LazyClassifier<C> {
    fn classify(&self, image: &[u8]) -> Result<Vec<Prediction>, ClassifierError> {
        self.model()?.classify(image)
    }

    fn is_ready(&self) -> bool {
        self.model().map(|m| m.is_ready()).unwrap_or(false)
    }

    fn concurrency_limit(&self) -> usize {
        self.model().map(|m| m.concurrency_limit()).unwrap_or(1)
    }
}
