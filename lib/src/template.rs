use crate::classifier::{Classifier, ClassifierError, Prediction};
use crate::error::Error;
use image::imageops::{resize, FilterType};
use image::GrayImage;
use imageproc::contrast::{otsu_level, threshold};
use imageproc::template_matching::{find_extremes, match_template, MatchTemplateMethod};
use log::debug;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::thread;

/// Labels a cell by comparing it with a set of glyph templates.
///
/// The cell is scaled to the size of each template, binarized, and scored with the normalized
/// sum of squared errors. Confidence is `1 - error`, clamped to [0, 1].
pub struct TemplateClassifier {
    templates: Vec<(String, GrayImage)>,
}

impl TemplateClassifier {
    /// # Errors
    /// `InvalidInput` if there are no templates or a template is empty.
    pub fn new(templates: Vec<(String, GrayImage)>) -> Result<TemplateClassifier, Error> {
        if templates.is_empty() {
            return Err(Error::InvalidInput("no templates".into()));
        }
        if let Some((label, _)) = templates
            .iter()
            .find(|(_, t)| t.width() == 0 || t.height() == 0)
        {
            return Err(Error::InvalidInput(format!("template {} is empty", label)));
        }
        Ok(TemplateClassifier { templates })
    }

    /// Load every `<label>.png` in `dir`.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<TemplateClassifier, Error> {
        let mut templates = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map_or(true, |ext| ext != "png") {
                continue;
            }
            let label = match path.file_stem() {
                Some(stem) => stem.to_string_lossy().into_owned(),
                None => continue,
            };
            let template = image::open(&path)?.into_luma8();
            templates.push((label, template));
        }
        templates.sort_by(|a, b| a.0.cmp(&b.0));
        debug!("loaded {} templates", templates.len());
        TemplateClassifier::new(templates)
    }

    /// Load templates from encoded images.
    pub fn from_memory(templates: &[(&str, &[u8])]) -> Result<TemplateClassifier, Error> {
        let templates = templates
            .iter()
            .map(|(label, buf)| -> Result<(String, GrayImage), Error> {
                Ok((label.to_string(), image::load_from_memory(buf)?.into_luma8()))
            })
            .collect::<Result<Vec<_>, Error>>()?;
        TemplateClassifier::new(templates)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.templates.iter().map(|(label, _)| label.as_str())
    }

    /// Score `cell` against every template, best match first.
    pub fn match_templates(&self, cell: &GrayImage) -> Vec<Prediction> {
        let method = MatchTemplateMethod::SumOfSquaredErrorsNormalized;
        let mut scaled: HashMap<(u32, u32), GrayImage> = HashMap::new();
        let mut matches = self
            .templates
            .iter()
            .map(|(label, template)| {
                let (w, h) = template.dimensions();
                let tile = scaled.entry((w, h)).or_insert_with(|| {
                    let tile = resize(cell, w, h, FilterType::Triangle);
                    // convert to binary image improves the template match accuracy
                    let level = otsu_level(&tile);
                    threshold(&tile, level)
                });
                let error = find_extremes(&match_template(tile, template, method)).min_value;
                (label, error)
            })
            .filter(|(_, error)| !error.is_nan())
            .collect::<Vec<_>>();
        matches.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        matches
            .into_iter()
            .map(|(label, error)| Prediction::new(label.as_str(), (1. - error).max(0.).min(1.)))
            .collect()
    }
}

impl Classifier for TemplateClassifier {
    fn classify(&self, image: &[u8]) -> Result<Vec<Prediction>, ClassifierError> {
        let cell = image::load_from_memory(image)
            .map_err(|err| ClassifierError::Rejected(err.to_string()))?
            .into_luma8();
        if cell.width() == 0 || cell.height() == 0 {
            return Err(ClassifierError::Rejected("empty image".into()));
        }
        Ok(self.match_templates(&cell))
    }

    fn concurrency_limit(&self) -> usize {
        thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}
