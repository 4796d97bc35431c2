use pyo3::{
    create_exception,
    exceptions::PyException,
    prelude::*,
    types::{PyBytes, PyDict},
    wrap_pyfunction, PyErr,
};
use std::sync::Arc;
use sudoku_ocr::{Classifier, ClassifierError, Prediction, Recognizer, ScanConfig, Scan};

create_exception!(pysudoku_ocr, SudokuOcrException, PyException);

/// A python callable used as classifier.
///
/// It is called with the PNG encoded crop and returns a `(label, confidence)` tuple, or `None`
/// when it can not read the crop.
struct PyClassifier {
    callable: PyObject,
}

impl Classifier for PyClassifier {
    fn classify(&self, image: &[u8]) -> Result<Vec<Prediction>, ClassifierError> {
        Python::with_gil(|py| {
            let bytes = PyBytes::new_bound(py, image);
            let result = self
                .callable
                .call1(py, (bytes,))
                .map_err(|err| ClassifierError::Unavailable(err.to_string()))?;
            if result.is_none(py) {
                return Ok(Vec::new());
            }
            let (label, confidence): (String, f32) = result
                .extract(py)
                .map_err(|err| ClassifierError::Rejected(err.to_string()))?;
            Ok(vec![Prediction::new(label, confidence)])
        })
    }
}

fn process_result(scan: &Scan, py: Python) -> PyResult<PyObject> {
    let board = &scan.board;
    let confidence: Vec<Vec<Option<f32>>> = board
        .rows()
        .map(|row| row.iter().map(|cell| cell.confidence()).collect())
        .collect();
    let low_confidence: Vec<(usize, usize)> = board
        .cells()
        .iter()
        .filter(|cell| cell.low_confidence)
        .filter_map(|cell| cell.region.index)
        .map(|index| (index.row, index.col))
        .collect();
    let warnings: Vec<String> = scan.warnings.iter().map(|w| w.to_string()).collect();
    let dict = PyDict::new_bound(py);
    dict.set_item("labels", board.labels())?;
    dict.set_item("confidence", confidence)?;
    dict.set_item("low_confidence", low_confidence)?;
    dict.set_item("warnings", warnings)?;
    dict.set_item("text", board.to_string())?;
    Ok(dict.into_any().unbind())
}

fn recognizer(classifier: PyObject, grid_size: usize, margin: f64) -> PyResult<Recognizer> {
    let config = ScanConfig::default()
        .with_grid_size(grid_size)
        .with_margin_percent(margin);
    let classifier = Arc::new(PyClassifier { callable: classifier });
    Ok(Recognizer::fixed_grid(config, classifier).map_err(SudokuOcrError::from)?)
}

#[pyfunction]
#[pyo3(signature = (path, classifier, grid_size=9, margin=15.0))]
fn recognize_board_from_file(
    py: Python,
    path: String,
    classifier: PyObject,
    grid_size: usize,
    margin: f64,
) -> PyResult<PyObject> {
    let recognizer = recognizer(classifier, grid_size, margin)?;
    let scan = py
        .allow_threads(|| recognizer.recognize_from_file(&path))
        .map_err(SudokuOcrError::from)?;
    process_result(&scan, py)
}

#[pyfunction]
#[pyo3(signature = (data, classifier, grid_size=9, margin=15.0))]
fn recognize_board_from_memory(
    py: Python,
    data: &[u8],
    classifier: PyObject,
    grid_size: usize,
    margin: f64,
) -> PyResult<PyObject> {
    let recognizer = recognizer(classifier, grid_size, margin)?;
    let scan = py
        .allow_threads(|| recognizer.recognize_from_memory(data))
        .map_err(SudokuOcrError::from)?;
    process_result(&scan, py)
}

/// Wrapper around sudoku_ocr::Error so we convert to PyErr
struct SudokuOcrError(sudoku_ocr::Error);

impl From<sudoku_ocr::Error> for SudokuOcrError {
    fn from(err: sudoku_ocr::Error) -> SudokuOcrError {
        SudokuOcrError(err)
    }
}

impl From<SudokuOcrError> for PyErr {
    fn from(err: SudokuOcrError) -> PyErr {
        PyErr::new::<SudokuOcrException, String>(err.0.to_string())
    }
}

#[pymodule]
fn pysudoku_ocr(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("SudokuOcrException", m.py().get_type_bound::<SudokuOcrException>())?;
    m.add_function(wrap_pyfunction!(recognize_board_from_file, m)?)?;
    m.add_function(wrap_pyfunction!(recognize_board_from_memory, m)?)?;
    Ok(())
}
