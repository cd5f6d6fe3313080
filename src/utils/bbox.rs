use crate::{EstimateClose, EPS};
use std::cmp::Ordering;

/// Bounding box in the format (x, y, width, height), where (x, y) is the top-left corner
///
#[derive(Clone, Default, Debug, Copy)]
pub struct BoundingBox {
    _x: f32,
    _y: f32,
    _width: f32,
    _height: f32,
}

impl BoundingBox {
    /// Constructor
    ///
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            _x: x,
            _y: y,
            _width: width,
            _height: height,
        }
    }

    /// Builds the box from its center and dimensions
    ///
    pub fn from_center(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self::new(cx - width / 2.0, cy - height / 2.0, width, height)
    }

    pub fn x(&self) -> f32 {
        self._x
    }

    pub fn y(&self) -> f32 {
        self._y
    }

    pub fn width(&self) -> f32 {
        self._width
    }

    pub fn height(&self) -> f32 {
        self._height
    }

    pub fn right(&self) -> f32 {
        self._x + self._width
    }

    pub fn bottom(&self) -> f32 {
        self._y + self._height
    }

    pub fn center(&self) -> (f32, f32) {
        (self._x + self._width / 2.0, self._y + self._height / 2.0)
    }

    pub fn area(&self) -> f32 {
        self._width * self._height
    }

    /// Box has a positive area
    ///
    pub fn is_valid(&self) -> bool {
        self._width > 0.0 && self._height > 0.0
    }

    /// Moves the box keeping its dimensions
    ///
    pub fn shift(&self, dx: f32, dy: f32) -> Self {
        Self::new(self._x + dx, self._y + dy, self._width, self._height)
    }

    /// Grows the box around its center
    ///
    /// # Parameters
    /// * `scale` - the multiplier for both width and height
    ///
    pub fn scale(&self, scale: f32) -> Self {
        let (cx, cy) = self.center();
        Self::from_center(cx, cy, self._width * scale, self._height * scale)
    }

    /// Clips the box to the area `[0, width) x [0, height)`.
    ///
    /// Returns `None` if nothing remains after clipping.
    ///
    pub fn clip(&self, width: f32, height: f32) -> Option<Self> {
        let x0 = self._x.max(0.0);
        let y0 = self._y.max(0.0);
        let x1 = self.right().min(width);
        let y1 = self.bottom().min(height);
        let res = Self::new(x0, y0, x1 - x0, y1 - y0);
        if res.is_valid() {
            Some(res)
        } else {
            None
        }
    }

    /// Area of the intersection of two boxes, `0.0` if they don't overlap
    ///
    pub fn intersection(l: &BoundingBox, r: &BoundingBox) -> f32 {
        let (x1, y1) = (l._x.max(r._x), l._y.max(r._y));
        let (x2, y2) = (l.right().min(r.right()), l.bottom().min(r.bottom()));

        let int_width = x2 - x1;
        let int_height = y2 - y1;

        if int_width > 0.0 && int_height > 0.0 {
            int_width * int_height
        } else {
            0.0
        }
    }

    /// Intersection over union, `0.0` for boxes without an area
    ///
    pub fn iou(l: &BoundingBox, r: &BoundingBox) -> f32 {
        let intersection = BoundingBox::intersection(l, r);
        let union = l.area() + r.area() - intersection;
        if union > EPS {
            intersection / union
        } else {
            0.0
        }
    }
}

impl EstimateClose for BoundingBox {
    /// Allows comparing bboxes
    ///
    fn almost_same(&self, other: &Self, eps: f32) -> bool {
        (self._x - other._x).abs() < eps
            && (self._y - other._y).abs() < eps
            && (self._width - other._width).abs() < eps
            && (self._height - other._height).abs() < eps
    }
}

impl PartialOrd for BoundingBox {
    /// Boxes are ordered by area
    ///
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.area().partial_cmp(&other.area())
    }
}

impl PartialEq<Self> for BoundingBox {
    fn eq(&self, other: &Self) -> bool {
        self.almost_same(other, EPS)
    }
}

impl From<BoundingBox> for imageproc::rect::Rect {
    /// The box is rounded to whole pixels; at least one pixel is kept in every dimension
    ///
    fn from(b: BoundingBox) -> Self {
        imageproc::rect::Rect::at(b._x.round() as i32, b._y.round() as i32).of_size(
            (b._width.round() as u32).max(1),
            (b._height.round() as u32).max(1),
        )
    }
}
