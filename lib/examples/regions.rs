use anyhow::{Context, Result};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use sudoku_ocr::{CellExtractor, FixedGrid, Padding};

fn run() -> Result<()> {
    let path = std::env::args().nth(1).expect("Usage: regions BOARD");
    eprintln!("read image from {}", path);
    let img = image::open(&path)
        .with_context(|| format!("Failed to open {}", path))?
        .into_rgba8();
    let (width, height) = img.dimensions();

    let regions = FixedGrid::new(9, 15.)?.regions(width, height)?;
    let extractor = CellExtractor::new(Padding::default());

    // draw the regions in red and the padded crops in blue
    let red = image::Rgba([255, 0, 0, 255]);
    let blue = image::Rgba([0, 0, 255, 255]);
    let mut img = img;
    for (i, region) in regions.iter().enumerate() {
        let (x0, y0, x1, y1) = region.pixel_bounds(width, height);
        let rect = Rect::at(x0 as i32, y0 as i32).of_size((x1 - x0) as u32, (y1 - y0) as u32);
        draw_hollow_rect_mut(&mut img, rect, red);
        let crop = extractor.crop_rect(region, i, width, height)?;
        let rect = Rect::at(crop.x as i32, crop.y as i32).of_size(crop.width, crop.height);
        draw_hollow_rect_mut(&mut img, rect, blue);
        eprintln!("  Region {}: {:?} crop {:?}", i, region.index, crop);
    }
    img.save("regions.png")?;
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{}", err);
    }
}
