use crate::Errors;
use anyhow::Result;
use image::imageops::{resize, FilterType};
use image::RgbImage;
use ndarray::Array4;

/// Checks that the frame has pixels
///
pub fn validate_frame(frame: &RgbImage) -> Result<()> {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        Err(Errors::InvalidFrame(width, height).into())
    } else {
        Ok(())
    }
}

/// Converts the frame into the `1x3xHxW` network input
///
/// The frame is stretched to `width x height` without keeping the aspect ratio, channels
/// stay in RGB order, and the values are scaled to `[0, 1]`.
///
pub fn blob_from_image(frame: &RgbImage, width: u32, height: u32) -> Result<Array4<f32>> {
    validate_frame(frame)?;

    let resized;
    let source = if frame.dimensions() == (width, height) {
        frame
    } else {
        resized = resize(frame, width, height, FilterType::Triangle);
        &resized
    };

    let mut blob = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
    for (x, y, pixel) in source.enumerate_pixels() {
        for c in 0..3 {
            blob[[0, c, y as usize, x as usize]] = pixel.0[c] as f32 / 255.0;
        }
    }
    Ok(blob)
}

#[cfg(test)]
mod tests {
    use crate::utils::blob::blob_from_image;
    use crate::{Errors, EPS};
    use image::{Rgb, RgbImage};

    #[test]
    fn layout_and_scale() {
        let mut frame = RgbImage::from_pixel(4, 2, Rgb([255, 0, 51]));
        frame.put_pixel(3, 1, Rgb([0, 255, 0]));
        let blob = blob_from_image(&frame, 4, 2).unwrap();
        assert_eq!(blob.shape(), &[1, 3, 2, 4]);
        assert!((blob[[0, 0, 0, 0]] - 1.0).abs() < EPS);
        assert!(blob[[0, 1, 0, 0]].abs() < EPS);
        assert!((blob[[0, 2, 0, 0]] - 0.2).abs() < EPS);
        assert!(blob[[0, 0, 1, 3]].abs() < EPS);
        assert!((blob[[0, 1, 1, 3]] - 1.0).abs() < EPS);
    }

    #[test]
    fn resized() {
        let frame = RgbImage::from_pixel(64, 48, Rgb([255, 255, 255]));
        let blob = blob_from_image(&frame, 32, 32).unwrap();
        assert_eq!(blob.shape(), &[1, 3, 32, 32]);
        assert!(blob.iter().all(|v| (v - 1.0).abs() < 1e-3));
    }

    #[test]
    fn empty_frame() {
        let frame = RgbImage::new(0, 0);
        let err = blob_from_image(&frame, 32, 32).unwrap_err();
        assert_eq!(err.downcast_ref::<Errors>(), Some(&Errors::InvalidFrame(0, 0)));
    }
}
