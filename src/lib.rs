//! Human detection with short-lived visual tracking.
//!
//! A [`HumanDetector`](detector::HumanDetector) runs an object-detection network over video frames
//! and keeps the `person` boxes that survive non-max suppression. A
//! [`HumanDetectorTracker`](pipeline::HumanDetectorTracker) owns a collection of visual trackers,
//! refreshes them on every frame, spawns new ones for uncovered detections, and reports an
//! approximate 3D location for each tracked person.
//!

/// Detection network adapters and detection decoding
pub mod detector;

/// Frame-by-frame orchestration of detection and tracking
pub mod pipeline;

/// Visual trackers and the detection-to-track association policies
pub mod trackers;

/// Geometry, suppression, camera model and frame helpers
pub mod utils;

/// Synthetic networks, trackers and frames used by tests and demos
pub mod test_stuff;

pub mod prelude;

use thiserror::Error;

/// Errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Errors {
    /// The frame has no pixels.
    ///
    #[error("Frame is empty or malformed ({0}x{1}).")]
    InvalidFrame(u32, u32),
    /// The box is too narrow to estimate the distance to it.
    ///
    #[error("Bounding box width {0} is too small to estimate the location.")]
    DegenerateBox(f32),
    /// The network file is missing or cannot be loaded.
    ///
    #[error("Unable to load the network from `{0}`: {1}")]
    ModelFile(String, String),
    /// The class name list is missing or empty.
    ///
    #[error("Unable to load class names from `{0}`: {1}")]
    ClassList(String, String),
    /// The target class is not found in the class name list.
    ///
    #[error("Class `{0}` is not present in the class name list.")]
    MissingClass(String),
    /// The network config file is missing or does not define a valid input size.
    ///
    #[error("Invalid network config `{0}`: {1}")]
    NetworkConfig(String, String),
    /// The inference backend cannot run on the requested target.
    ///
    #[error("Inference target {0:?} is not supported by the backend.")]
    UnsupportedInferenceTarget(detector::InferenceTarget),
    /// The network produced an output that cannot be decoded into rows.
    ///
    #[error("Malformed network output: {0}")]
    MalformedOutput(String),
    /// `update` was called before `init`.
    ///
    #[error("Tracker must be initialized before being updated.")]
    TrackerNotInitialized,
}

pub(crate) const EPS: f32 = 0.00001;

/// The trait is used to compare objects with floating point fields within the tolerance
///
pub trait EstimateClose {
    fn almost_same(&self, other: &Self, eps: f32) -> bool;
}
