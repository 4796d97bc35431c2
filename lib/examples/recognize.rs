use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;
use sudoku_ocr::{Recognizer, ScanConfig, TemplateClassifier};

fn run() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let usage = "Usage: recognize BOARD TEMPLATES [CONFIG]";
    let path = args.next().expect(usage);
    let templates = args.next().expect(usage);
    let config = match args.next() {
        Some(config) => ScanConfig::from_file(&config)
            .with_context(|| format!("Failed to read {}", config))?,
        None => ScanConfig::default(),
    };

    let classifier = TemplateClassifier::from_dir(&templates)
        .with_context(|| format!("Failed to load templates from {}", templates))?;
    eprintln!("loaded templates {:?}", classifier.labels().collect::<Vec<_>>());
    let recognizer = Recognizer::fixed_grid(config, Arc::new(classifier))?;

    let t0 = Instant::now();
    let scan = recognizer
        .recognize_from_file(&path)
        .with_context(|| format!("Failed to recognize {}", path))?;
    println!("recognize board took {:?}", t0.elapsed());
    println!("{}", scan.board);
    for warning in scan.warnings.iter() {
        println!("warning: {}", warning);
    }
    for (a, b) in scan.board.conflicts() {
        println!("conflict: {:?} and {:?}", a, b);
    }
    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("{:?}", err);
    }
}
