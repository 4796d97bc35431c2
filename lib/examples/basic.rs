use anyhow::Result;
use std::sync::Arc;
use sudoku_ocr::{Recognizer, ScanConfig, TemplateClassifier};

fn main() -> Result<()> {
    let classifier = TemplateClassifier::from_dir("templates")?;
    let recognizer = Recognizer::fixed_grid(ScanConfig::default(), Arc::new(classifier))?;
    let scan = recognizer.recognize_from_file("boards/board.png")?;
    println!("Board:\n{}", scan.board);
    Ok(())
}
