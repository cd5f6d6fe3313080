use crate::utils::bbox::BoundingBox;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;

/// Color of boxes kept by trackers
pub const TRACKED_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Color of boxes that spawned a new tracker
pub const NEW_DETECTION_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

/// Draws the box outline with the given line thickness
///
/// The outline grows inwards so the drawing never leaves the box area.
///
pub fn draw_box(frame: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>, thickness: u32) {
    for i in 0..thickness {
        let inset = i as f32;
        let b = BoundingBox::new(
            bbox.x() + inset,
            bbox.y() + inset,
            bbox.width() - 2.0 * inset,
            bbox.height() - 2.0 * inset,
        );
        if !b.is_valid() {
            break;
        }
        draw_hollow_rect_mut(frame, b.into(), color);
    }
}

#[cfg(test)]
mod tests {
    use crate::utils::bbox::BoundingBox;
    use crate::utils::draw::{draw_box, TRACKED_COLOR};
    use image::{Rgb, RgbImage};

    #[test]
    fn outline() {
        let white = Rgb([255, 255, 255]);
        let mut frame = RgbImage::from_pixel(20, 20, white);
        draw_box(&mut frame, &BoundingBox::new(2.0, 2.0, 10.0, 10.0), TRACKED_COLOR, 2);
        assert_eq!(*frame.get_pixel(2, 2), TRACKED_COLOR);
        assert_eq!(*frame.get_pixel(3, 5), TRACKED_COLOR);
        assert_eq!(*frame.get_pixel(11, 11), TRACKED_COLOR);
        assert_eq!(*frame.get_pixel(6, 6), white);
        assert_eq!(*frame.get_pixel(15, 15), white);
    }

    #[test]
    fn outside_frame() {
        let white = Rgb([255, 255, 255]);
        let mut frame = RgbImage::from_pixel(10, 10, white);
        draw_box(&mut frame, &BoundingBox::new(50.0, 50.0, 10.0, 10.0), TRACKED_COLOR, 2);
        assert!(frame.pixels().all(|p| *p == white));
    }
}
