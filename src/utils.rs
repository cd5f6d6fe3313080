/// Bounding boxes
pub mod bbox;

/// Non maximum suppression implementation for detected boxes
pub mod nms;

/// Pinhole camera model used to estimate the location of boxes
pub mod camera;

/// Conversion of frames into network input tensors
pub mod blob;

/// Frame annotation
pub mod draw;
