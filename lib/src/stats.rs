use image::{math::Rect, GrayImage, ImageBuffer, Luma};
use imageproc::integral_image::{integral_image, integral_squared_image, sum_image_pixels};

type IntegralImage = ImageBuffer<Luma<u64>, Vec<u64>>;

/// Constant-time pixel statistics over arbitrary rectangles of one image.
pub struct ImageStats {
    integral: IntegralImage,
    integral_squared: IntegralImage,
}

impl ImageStats {
    pub fn new(img: &GrayImage) -> ImageStats {
        let integral: IntegralImage = integral_image::<_, u64>(img);
        let integral_squared: IntegralImage = integral_squared_image::<_, u64>(img);
        ImageStats {
            integral,
            integral_squared,
        }
    }

    /// Calculate mean and standard deviation for the pixels in `rect`, on a 0..1 scale.
    ///
    /// `rect` must be non-empty and inside the image.
    pub fn area_stats(&self, rect: &Rect) -> (f64, f64) {
        let (left, top, right, bottom) = (
            rect.x,
            rect.y,
            rect.x + rect.width - 1,
            rect.y + rect.height - 1,
        );
        let sum = sum_image_pixels(&self.integral, left, top, right, bottom);
        let var = variance(
            &self.integral,
            &self.integral_squared,
            left,
            top,
            right,
            bottom,
        );
        let count = rect.width as u64 * rect.height as u64;
        // rounding can push a flat area slightly below zero
        (sum[0] as f64 / count as f64 / 256., var.max(0.).sqrt() / 256.)
    }
}

/// This is a modified copy of [imageproc::integral_image::variance]()
fn variance(
    integral_image: &IntegralImage,
    integral_squared_image: &IntegralImage,
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
) -> f64 {
    let n = (right - left + 1) as f64 * (bottom - top + 1) as f64;
    let sum_sq = sum_image_pixels(integral_squared_image, left, top, right, bottom)[0];
    let sum = sum_image_pixels(integral_image, left, top, right, bottom)[0];
    (sum_sq as f64 - (sum as f64).powi(2) / n) / n
}
