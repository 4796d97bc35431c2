use crate::config::Padding;
use crate::error::Error;
use crate::region::Region;
use image::math::Rect;
use image::{GenericImageView, GrayImage};

/// Crops classifier-ready sub-images out of a source image.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CellExtractor {
    padding: Padding,
}

impl CellExtractor {
    pub fn new(padding: Padding) -> CellExtractor {
        CellExtractor { padding }
    }

    /// The pixel rectangle to crop for `region`: the region grown by the padding, clamped to
    /// the image.
    ///
    /// # Errors
    /// `InvalidRegion` if nothing of the padded region lies inside the image. `index` is only
    /// used to name the region in the error.
    pub fn crop_rect(
        &self,
        region: &Region,
        index: usize,
        width: u32,
        height: u32,
    ) -> Result<Rect, Error> {
        let invalid = Error::InvalidRegion {
            index,
            width,
            height,
        };
        let (left, top, right, bottom) = region.pixel_bounds(width, height);
        if right <= left || bottom <= top {
            return Err(invalid);
        }
        let p = &self.padding;
        let left = (left - p.left as i64).max(0);
        let top = (top - p.top as i64).max(0);
        let right = (right + p.right as i64).min(width as i64);
        let bottom = (bottom + p.bottom as i64).min(height as i64);
        if right <= left || bottom <= top {
            return Err(invalid);
        }
        Ok(Rect {
            x: left as u32,
            y: top as u32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        })
    }

    /// Crop the padded `region` out of `img`.
    pub fn extract(
        &self,
        img: &GrayImage,
        region: &Region,
        index: usize,
    ) -> Result<GrayImage, Error> {
        let r = self.crop_rect(region, index, img.width(), img.height())?;
        Ok(img.view(r.x, r.y, r.width, r.height).to_image())
    }
}

/// The part of `region` that lies inside a `width` x `height` image, without padding.
pub(crate) fn interior(region: &Region, width: u32, height: u32) -> Option<Rect> {
    let (left, top, right, bottom) = region.pixel_bounds(width, height);
    let (left, top) = (left.max(0), top.max(0));
    let (right, bottom) = (right.min(width as i64), bottom.min(height as i64));
    if right <= left || bottom <= top {
        return None;
    }
    Some(Rect {
        x: left as u32,
        y: top as u32,
        width: (right - left) as u32,
        height: (bottom - top) as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::BoundingBox;
    use image::{ImageBuffer, Luma};

    fn extractor() -> CellExtractor {
        CellExtractor::new(Padding::default())
    }

    #[test]
    fn test_padding_applied() {
        let region = Region::pixels(BoundingBox::new(100.5, 50.2, 40., 30.));
        let r = extractor().crop_rect(&region, 0, 450, 450).unwrap();
        // bounds (100, 50, 140, 80) grown by (1, 1, 1, 8)
        assert_eq!(
            r,
            Rect {
                x: 99,
                y: 49,
                width: 42,
                height: 39
            }
        );
    }

    #[test]
    fn test_clamped_at_edges() {
        let extractor = extractor();
        let corners = [
            BoundingBox::new(0., 0., 20., 20.),
            BoundingBox::new(-15., -15., 30., 30.),
            BoundingBox::new(190., 90., 30., 30.),
            BoundingBox::new(185., 0., 15., 100.),
            BoundingBox::new(0., 95., 200., 5.),
        ];
        for (i, bbox) in corners.iter().enumerate() {
            let r = extractor
                .crop_rect(&Region::pixels(*bbox), i, 200, 100)
                .unwrap();
            assert!(r.width > 0 && r.height > 0);
            assert!(r.x + r.width <= 200, "{:?}", r);
            assert!(r.y + r.height <= 100, "{:?}", r);
        }
    }

    #[test]
    fn test_outside_is_invalid() {
        let extractor = extractor();
        let outside = Region::pixels(BoundingBox::new(300., 20., 10., 10.));
        assert!(matches!(
            extractor.crop_rect(&outside, 7, 200, 100),
            Err(Error::InvalidRegion { index: 7, .. })
        ));
        let empty = Region::pixels(BoundingBox::new(10., 10., 0., 10.));
        assert!(matches!(
            extractor.crop_rect(&empty, 0, 200, 100),
            Err(Error::InvalidRegion { .. })
        ));
    }

    #[test]
    fn test_extract_normalized() {
        let img: GrayImage = ImageBuffer::from_fn(100, 100, |x, y| Luma([(x + y) as u8]));
        let region = Region::normalized(BoundingBox::new(0.1, 0.2, 0.3, 0.4));
        let crop = CellExtractor::new(Padding::none())
            .extract(&img, &region, 0)
            .unwrap();
        assert_eq!(crop.dimensions(), (30, 40));
        assert_eq!(crop.get_pixel(0, 0)[0], 30);
    }

    #[test]
    fn test_interior() {
        let region = Region::pixels(BoundingBox::new(-5., 10., 20., 200.));
        assert_eq!(
            interior(&region, 100, 100),
            Some(Rect {
                x: 0,
                y: 10,
                width: 15,
                height: 90
            })
        );
        let region = Region::pixels(BoundingBox::new(150., 10., 20., 20.));
        assert_eq!(interior(&region, 100, 100), None);
    }
}
