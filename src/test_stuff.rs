use crate::detector::DetectionNetwork;
use crate::trackers::VisualTracker;
use crate::utils::bbox::BoundingBox;
use crate::utils::blob::validate_frame;
use crate::Errors;
use anyhow::Result;
use image::{Rgb, RgbImage};
use ndarray::{Array2, Array4, ArrayD, Axis};
use rand::distributions::Uniform;
use rand::prelude::ThreadRng;
use rand::Rng;

/// Class names of the COCO dataset in the order used by YOLO networks
///
pub const COCO_CLASSES: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorbike",
    "aeroplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "sofa",
    "pottedplant",
    "bed",
    "diningtable",
    "toilet",
    "tvmonitor",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

pub fn coco_class_names() -> Vec<String> {
    COCO_CLASSES.iter().map(|c| c.to_string()).collect()
}

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const SILHOUETTE: Rgb<u8> = Rgb([20, 20, 20]);

pub fn white_frame(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, WHITE)
}

/// White frame with solid dark rectangles standing for persons
///
pub fn silhouette_frame(width: u32, height: u32, silhouettes: &[BoundingBox]) -> RgbImage {
    let mut frame = white_frame(width, height);
    for s in silhouettes {
        if let Some(s) = s.clip(width as f32, height as f32) {
            let (x0, y0) = (s.x().round() as u32, s.y().round() as u32);
            let (x1, y1) = (
                (s.right().round() as u32).min(width),
                (s.bottom().round() as u32).min(height),
            );
            for y in y0..y1 {
                for x in x0..x1 {
                    frame.put_pixel(x, y, SILHOUETTE);
                }
            }
        }
    }
    frame
}

/// Network that reports dark areas of the input as persons
///
/// Columns containing dark pixels are grouped into runs; every run produces one row with the
/// bounds of the dark pixels in it, the `person` score `0.95` and zero scores for the other
/// COCO classes.
///
pub struct SilhouetteNetwork {
    input_size: (u32, u32),
    score: f32,
}

impl Default for SilhouetteNetwork {
    fn default() -> Self {
        Self::new((320, 240), 0.95)
    }
}

impl SilhouetteNetwork {
    pub fn new(input_size: (u32, u32), score: f32) -> Self {
        Self { input_size, score }
    }
}

impl DetectionNetwork for SilhouetteNetwork {
    fn input_size(&self) -> (u32, u32) {
        self.input_size
    }

    fn forward(&self, blob: &Array4<f32>) -> Result<Vec<ArrayD<f32>>> {
        let (height, width) = (blob.shape()[2], blob.shape()[3]);
        let image = blob.index_axis(Axis(0), 0);
        let is_dark = |x: usize, y: usize| (0..3).all(|c| image[[c, y, x]] < 0.5);

        let mut runs: Vec<(usize, usize, usize, usize)> = Vec::new();
        let mut current: Option<(usize, usize, usize, usize)> = None;

        for x in 0..width {
            let dark_rows = (0..height).filter(|y| is_dark(x, *y)).collect::<Vec<_>>();
            if let (Some(&top), Some(&bottom)) = (dark_rows.first(), dark_rows.last()) {
                if let Some(run) = current.as_mut() {
                    run.1 = x;
                    run.2 = run.2.min(top);
                    run.3 = run.3.max(bottom);
                } else {
                    current = Some((x, x, top, bottom));
                }
            } else if let Some(run) = current.take() {
                runs.push(run);
            }
        }
        if let Some(run) = current.take() {
            runs.push(run);
        }

        let cols = 5 + COCO_CLASSES.len();
        let mut rows = Array2::<f32>::zeros((runs.len(), cols));
        for (i, (x0, x1, y0, y1)) in runs.into_iter().enumerate() {
            let (w, h) = ((x1 - x0 + 1) as f32, (y1 - y0 + 1) as f32);
            rows[[i, 0]] = (x0 as f32 + w / 2.0) / width as f32;
            rows[[i, 1]] = (y0 as f32 + h / 2.0) / height as f32;
            rows[[i, 2]] = w / width as f32;
            rows[[i, 3]] = h / height as f32;
            rows[[i, 4]] = 1.0;
            rows[[i, 5]] = self.score;
        }

        Ok(vec![rows.into_dyn()])
    }
}

/// Network that returns the same outputs for every input
///
pub struct FixedRowsNetwork {
    outputs: Vec<ArrayD<f32>>,
}

impl FixedRowsNetwork {
    pub fn new(outputs: Vec<ArrayD<f32>>) -> Self {
        Self { outputs }
    }
}

impl DetectionNetwork for FixedRowsNetwork {
    fn input_size(&self) -> (u32, u32) {
        (32, 32)
    }

    fn forward(&self, _blob: &Array4<f32>) -> Result<Vec<ArrayD<f32>>> {
        Ok(self.outputs.clone())
    }
}

/// Tracker that keeps its initial box while the box center stays dark
///
#[derive(Default)]
pub struct SilhouetteTracker {
    bbox: Option<BoundingBox>,
}

impl SilhouetteTracker {
    pub fn boxed() -> Box<dyn VisualTracker> {
        Box::<SilhouetteTracker>::default()
    }
}

impl VisualTracker for SilhouetteTracker {
    fn init(&mut self, frame: &RgbImage, bbox: &BoundingBox) -> Result<()> {
        validate_frame(frame)?;
        self.bbox = Some(*bbox);
        Ok(())
    }

    fn update(&mut self, frame: &RgbImage) -> Result<Option<BoundingBox>> {
        let bbox = self.bbox.ok_or(Errors::TrackerNotInitialized)?;
        validate_frame(frame)?;
        let (cx, cy) = bbox.center();
        let (x, y) = (cx as u32, cy as u32);
        if x >= frame.width() || y >= frame.height() {
            return Ok(None);
        }
        if frame.get_pixel(x, y).0.iter().all(|c| *c < 128) {
            Ok(Some(bbox))
        } else {
            Ok(None)
        }
    }
}

/// Generates a silhouette drifting randomly across the frame
///
pub struct SilhouetteGen {
    bbox: BoundingBox,
    frame_size: (u32, u32),
    gen: ThreadRng,
    dist: Uniform<f32>,
}

impl SilhouetteGen {
    /// # Parameters
    /// * `bbox` - the initial silhouette;
    /// * `frame_size` - `(width, height)` of generated frames;
    /// * `drift` - maximal shift of the silhouette between frames along every axis.
    ///
    pub fn new(bbox: BoundingBox, frame_size: (u32, u32), drift: f32) -> Self {
        assert!(drift > 0.0, "Drift must be positive");
        Self {
            bbox,
            frame_size,
            gen: rand::thread_rng(),
            dist: Uniform::new(-drift, drift),
        }
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }
}

impl Iterator for SilhouetteGen {
    type Item = (RgbImage, BoundingBox);

    fn next(&mut self) -> Option<Self::Item> {
        let (width, height) = self.frame_size;
        let dx = self.gen.sample(&self.dist);
        let dy = self.gen.sample(&self.dist);
        let moved = self.bbox.shift(dx, dy);
        if moved.x() >= 0.0
            && moved.y() >= 0.0
            && moved.right() <= width as f32
            && moved.bottom() <= height as f32
        {
            self.bbox = moved;
        }
        let frame = silhouette_frame(width, height, &[self.bbox]);
        Some((frame, self.bbox))
    }
}
