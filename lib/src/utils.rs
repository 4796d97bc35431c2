use crate::board::Board;
use crate::error::Error;
use image::imageops::{resize, FilterType};
use image::{DynamicImage, GenericImage, GrayImage, ImageBuffer, ImageOutputFormat};
use std::fs;
use std::path::{Path, PathBuf};

/// Encode an image as PNG, the format handed to classifiers and detectors.
pub fn encode_png(img: &GrayImage) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(img.clone()).write_to(&mut buf, ImageOutputFormat::Png)?;
    Ok(buf)
}

/// Create a collage of all cell crops of a board, one board row per collage row.
///
/// Crops are resized to the size of the first crop. Squares without a crop stay black.
pub fn collage(board: &Board) -> Result<GrayImage, Error> {
    let first = board.cells().iter().find_map(|cell| cell.crop.as_ref());
    let (w, h) = match first {
        Some(crop) => crop.dimensions(),
        None => return Ok(GrayImage::new(0, 0)),
    };
    let n = board.size() as u32;
    let mut collage: GrayImage = ImageBuffer::new(w * n, h * n);
    let filter = FilterType::Lanczos3;
    for (i, cell) in board.cells().iter().enumerate() {
        let crop = match &cell.crop {
            Some(crop) => crop,
            None => continue,
        };
        let (row, col) = (i as u32 / n, i as u32 % n);
        let mut dest = collage.sub_image(col * w, row * h, w, h);
        if crop.dimensions() != (w, h) {
            let resized = resize(crop, w, h, filter);
            dest.copy_from(&resized, 0, 0)?;
        } else {
            dest.copy_from(crop, 0, 0)?;
        }
    }
    Ok(collage)
}

/// Save the crop of every square as `r{row}c{col}.png`, with `_{label}` appended for
/// classified squares. Returns the written paths.
pub fn save_cells<P: AsRef<Path>>(dir: P, board: &Board) -> Result<Vec<PathBuf>, Error> {
    fs::create_dir_all(dir.as_ref())?;
    let n = board.size();
    let mut saved = Vec::new();
    for (i, cell) in board.cells().iter().enumerate() {
        let crop = match &cell.crop {
            Some(crop) => crop,
            None => continue,
        };
        let name = match cell.label() {
            Some(label) => format!("r{}c{}_{}.png", i / n, i % n, label),
            None => format!("r{}c{}.png", i / n, i % n),
        };
        let path = dir.as_ref().join(name);
        crop.save(&path)?;
        saved.push(path);
    }
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Absence, Assembler, Cell, Outcome};
    use crate::classifier::Prediction;
    use crate::layout::{Coverage, FixedGrid};
    use image::Luma;

    fn board() -> Board {
        let cells = FixedGrid::new(3, 0.)
            .unwrap()
            .regions(30, 30)
            .unwrap()
            .into_iter()
            .enumerate()
            .map(|(i, region)| {
                let crop = GrayImage::from_pixel(10, 10, Luma([i as u8 * 20]));
                let outcome = if i == 4 {
                    Outcome::Absent(Absence::NoResult)
                } else {
                    Outcome::Classified(Prediction::new(format!("{}", i), 1.))
                };
                Cell::new(region, Some(crop), outcome)
            })
            .collect();
        Assembler::default()
            .assemble(cells, Coverage::Complete { grid_size: 3 }, 30, 30)
            .0
    }

    #[test]
    fn test_encode_png() {
        let img = GrayImage::from_pixel(3, 2, Luma([7u8]));
        let data = encode_png(&img).unwrap();
        let back = image::load_from_memory(&data).unwrap().into_luma8();
        assert_eq!(back, img);
    }

    #[test]
    fn test_collage() {
        let img = collage(&board()).unwrap();
        assert_eq!(img.dimensions(), (30, 30));
        assert_eq!(img.get_pixel(25, 5)[0], 40);
        assert_eq!(img.get_pixel(5, 25)[0], 120);
    }

    #[test]
    fn test_save_cells() {
        let dir = std::env::temp_dir().join(format!("sudoku-ocr-cells-{}", std::process::id()));
        let saved = save_cells(&dir, &board()).unwrap();
        assert_eq!(saved.len(), 9);
        assert!(dir.join("r0c1_1.png").exists());
        assert!(dir.join("r1c1.png").exists());
        fs::remove_dir_all(&dir).unwrap();
    }
}
