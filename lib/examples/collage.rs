use anyhow::{Context, Result};
use std::sync::Arc;
use sudoku_ocr::{collage, save_cells, Recognizer, ScanConfig, TemplateClassifier};

fn run() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let path = args.next().expect("Usage: collage BOARD TEMPLATES");
    let templates = args.next().expect("Usage: collage BOARD TEMPLATES");

    let classifier = TemplateClassifier::from_dir(&templates)?;
    let recognizer = Recognizer::fixed_grid(ScanConfig::default(), Arc::new(classifier))?;
    let scan = recognizer
        .recognize_from_file(&path)
        .with_context(|| format!("Failed to recognize {}", path))?;
    eprintln!("read board from {}", path);

    let collage = collage(&scan.board)?;
    collage.save("collage.png")?;
    let saved = save_cells("cells", &scan.board)?;
    eprintln!("saved {} cells", saved.len());
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{:?}", err);
    }
}
