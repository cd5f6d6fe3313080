use crate::utils::bbox::BoundingBox;
use anyhow::Result;
use image::RgbImage;

/// Detection-to-track association policies
pub mod association;

/// Correlation template tracker
pub mod template;

/// Single object visual tracker
///
/// The tracker is seeded with a box on a frame and then follows the object on the subsequent
/// frames until it reports the loss of the track.
///
pub trait VisualTracker {
    /// Seeds the tracker with the object box on the frame
    ///
    fn init(&mut self, frame: &RgbImage, bbox: &BoundingBox) -> Result<()>;

    /// Locates the object on the next frame
    ///
    /// Returns `Ok(None)` when the object is lost; the tracker must not be used after that.
    ///
    fn update(&mut self, frame: &RgbImage) -> Result<Option<BoundingBox>>;
}

/// Creates trackers for new detections
///
pub trait TrackerFactory {
    fn create(&self) -> Box<dyn VisualTracker>;
}

impl<F> TrackerFactory for F
where
    F: Fn() -> Box<dyn VisualTracker>,
{
    fn create(&self) -> Box<dyn VisualTracker> {
        self()
    }
}

/// The state of the tracked object in the current frame
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// The tracker was created from a detection of this frame
    New,
    /// The tracker followed the object to this frame
    Active,
}

/// Tracker handle paired with the last known box of the object
///
pub struct TrackedObject {
    id: u64,
    tracker: Box<dyn VisualTracker>,
    bbox: BoundingBox,
    length: usize,
}

impl TrackedObject {
    pub(crate) fn new(id: u64, tracker: Box<dyn VisualTracker>, bbox: BoundingBox) -> Self {
        Self {
            id,
            tracker,
            bbox,
            length: 1,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The last known box
    ///
    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    /// The number of frames the object has been tracked through
    ///
    pub fn length(&self) -> usize {
        self.length
    }

    /// Moves the tracker to the frame
    ///
    /// Returns `false` when the tracker lost the object.
    ///
    pub(crate) fn update(&mut self, frame: &RgbImage) -> Result<bool> {
        match self.tracker.update(frame)? {
            Some(bbox) => {
                self.bbox = bbox;
                self.length += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
