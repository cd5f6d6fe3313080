use crate::utils::bbox::BoundingBox;
use crate::{Errors, EPS};
use anyhow::Result;
use nalgebra::{Matrix3, Point2, Point3};

/// Default focal length in pixels
pub const DEFAULT_FOCAL_LENGTH: f32 = 1000.0;

/// Default principal point, the center of a 640x480 frame
pub const DEFAULT_PRINCIPAL_POINT: (f32, f32) = (320.0, 240.0);

/// Pinhole camera intrinsics with the same focal length along both axes
///
/// The values are not calibrated: the location produced by [`locate`](CameraIntrinsics::locate)
/// is a rough estimate where the depth is inversely proportional to the box width, which implicitly
/// assumes that all the persons have the same width.
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    focal_length: f32,
    principal_point: Point2<f32>,
}

impl Default for CameraIntrinsics {
    fn default() -> Self {
        Self::new(
            DEFAULT_FOCAL_LENGTH,
            DEFAULT_PRINCIPAL_POINT.0,
            DEFAULT_PRINCIPAL_POINT.1,
        )
    }
}

impl CameraIntrinsics {
    /// Constructor
    ///
    /// # Parameters
    /// * `focal_length` - focal length in pixels, must be positive;
    /// * `cx`, `cy` - the principal point in pixels.
    ///
    pub fn new(focal_length: f32, cx: f32, cy: f32) -> Self {
        assert!(
            focal_length > 0.0,
            "The focal length is expected to be a positive float"
        );
        Self {
            focal_length,
            principal_point: Point2::new(cx, cy),
        }
    }

    pub fn focal_length(&self) -> f32 {
        self.focal_length
    }

    pub fn principal_point(&self) -> Point2<f32> {
        self.principal_point
    }

    /// The camera matrix `K`
    ///
    pub fn matrix(&self) -> Matrix3<f32> {
        let f = self.focal_length;
        let (cx, cy) = (self.principal_point.x, self.principal_point.y);
        Matrix3::new(f, 0.0, cx, 0.0, f, cy, 0.0, 0.0, 1.0)
    }

    /// Estimates the location of the object enclosed by the box
    ///
    /// `x` and `y` are the coordinates of the box center on the normalized image plane, `z` is
    /// `focal_length / width`.
    ///
    pub fn locate(&self, bbox: &BoundingBox) -> Result<Point3<f32>> {
        if bbox.width() < EPS {
            return Err(Errors::DegenerateBox(bbox.width()).into());
        }

        let (u, v) = bbox.center();
        let x = (u - self.principal_point.x) / self.focal_length;
        let y = (v - self.principal_point.y) / self.focal_length;
        let z = self.focal_length / bbox.width();

        Ok(Point3::new(x, y, z))
    }
}
