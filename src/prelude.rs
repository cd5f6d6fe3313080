pub use crate::detector::onnx::OnnxNetwork;
pub use crate::detector::{
    Detection, DetectionNetwork, DetectorOptions, HumanDetector, InferenceTarget, ModelPaths,
};
pub use crate::pipeline::{HumanDetectorTracker, HumanDetectorTrackerOptions, TrackedHuman};
pub use crate::trackers::association::AssociationPolicy;
pub use crate::trackers::template::{TemplateTracker, TemplateTrackerOptions};
pub use crate::trackers::{TrackState, TrackerFactory, VisualTracker};
pub use crate::utils::bbox::BoundingBox;
pub use crate::utils::camera::CameraIntrinsics;
pub use crate::Errors;
