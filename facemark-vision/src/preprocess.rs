use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use imageproc::contrast::equalize_histogram;

/// One pyramid level down: Gaussian smoothing then half resolution,
/// rounding odd sizes up.
pub fn downscale(frame: &RgbImage) -> RgbImage {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return frame.clone();
    }
    imageops::resize(
        frame,
        (width + 1) / 2,
        (height + 1) / 2,
        FilterType::Gaussian,
    )
}

/// Luma conversion followed by histogram equalization, the input the face
/// cascade is trained on.
pub fn equalized_gray(frame: &RgbImage) -> GrayImage {
    let gray = imageops::grayscale(frame);
    if gray.width() == 0 || gray.height() == 0 {
        return gray;
    }
    equalize_histogram(&gray)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_downscale_rounds_up() {
        let frame = RgbImage::new(641, 479);
        let small = downscale(&frame);
        assert_eq!(small.dimensions(), (321, 240));
    }

    #[test]
    fn test_equalized_gray_keeps_dimensions() {
        let frame = RgbImage::from_fn(32, 16, |x, y| Rgb([x as u8 * 4, y as u8 * 8, 100]));
        let gray = equalized_gray(&frame);
        assert_eq!(gray.dimensions(), (32, 16));
    }

    #[test]
    fn test_equalization_stretches_narrow_range() {
        // Intensities packed into 100..=115 should spread across the range
        let frame = RgbImage::from_fn(16, 16, |x, _| {
            let v = 100 + x as u8;
            Rgb([v, v, v])
        });
        let gray = equalized_gray(&frame);
        let min = gray.pixels().map(|p| p[0]).min().unwrap();
        let max = gray.pixels().map(|p| p[0]).max().unwrap();
        assert!(max - min > 200, "range {}..{} not stretched", min, max);
    }

    #[test]
    fn test_empty_frame_passes_through() {
        let frame = RgbImage::new(0, 0);
        assert_eq!(downscale(&frame).dimensions(), (0, 0));
        assert_eq!(equalized_gray(&frame).dimensions(), (0, 0));
    }
}
