use crate::utils::bbox::BoundingBox;
use crate::utils::blob::{blob_from_image, validate_frame};
use crate::utils::nms::nms;
use crate::Errors;
use anyhow::Result;
use image::RgbImage;
use log::debug;
use ndarray::{Array4, ArrayD, ArrayView2};
use std::fs;
use std::path::{Path, PathBuf};

/// Darknet `.cfg` parsing
pub mod net_config;

/// `tract` ONNX backend
pub mod onnx;

use self::net_config::NetConfig;
use self::onnx::OnnxNetwork;

/// Default minimal class confidence of a detection
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Default IoU above which overlapping detections are suppressed
pub const DEFAULT_NMS_THRESHOLD: f32 = 0.4;

/// Default network input size when neither the options nor the config file define it
pub const DEFAULT_INPUT_SIZE: (u32, u32) = (640, 640);

/// Default class to detect
pub const DEFAULT_TARGET_CLASS: &str = "person";

/// The number of leading values in a network output row before the class scores:
/// `cx, cy, w, h, objectness`
pub const ROW_BOX_FIELDS: usize = 5;

/// Clipped boxes with a side shorter than a pixel are dropped
pub const MIN_BOX_SIDE: f32 = 1.0;

/// The device the network runs on
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InferenceTarget {
    #[default]
    Cpu,
    Gpu,
}

/// The network is the source of raw per-box class scores
///
/// Every output is interpreted as a set of rows `[cx, cy, w, h, objectness, scores...]`, where
/// the box coordinates are normalized to `[0, 1]` and the last axis holds the row values.
///
pub trait DetectionNetwork {
    /// `(width, height)` of the expected input
    fn input_size(&self) -> (u32, u32);

    /// Runs inference on a `1x3xHxW` blob
    fn forward(&self, blob: &Array4<f32>) -> Result<Vec<ArrayD<f32>>>;
}

/// Files the detector is loaded from
///
#[derive(Debug, Clone)]
pub struct ModelPaths {
    /// Serialized ONNX network
    pub model: PathBuf,
    /// Darknet-style config defining the network input size
    pub config: Option<PathBuf>,
    /// Class names, one per line, in the order of the network's class scores
    pub classes: PathBuf,
}

impl ModelPaths {
    pub fn new(
        model: impl AsRef<Path>,
        config: impl AsRef<Path>,
        classes: impl AsRef<Path>,
    ) -> Self {
        Self {
            model: model.as_ref().to_path_buf(),
            config: Some(config.as_ref().to_path_buf()),
            classes: classes.as_ref().to_path_buf(),
        }
    }

    pub fn without_config(model: impl AsRef<Path>, classes: impl AsRef<Path>) -> Self {
        Self {
            model: model.as_ref().to_path_buf(),
            config: None,
            classes: classes.as_ref().to_path_buf(),
        }
    }
}

/// Detector configuration
///
#[derive(Debug, Clone)]
pub struct DetectorOptions {
    confidence_threshold: f32,
    nms_threshold: f32,
    target_class: String,
    input_size: Option<(u32, u32)>,
    inference_target: InferenceTarget,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            nms_threshold: DEFAULT_NMS_THRESHOLD,
            target_class: DEFAULT_TARGET_CLASS.to_string(),
            input_size: None,
            inference_target: InferenceTarget::default(),
        }
    }
}

impl DetectorOptions {
    /// Rows with the best class score not greater than the threshold are dropped
    ///
    pub fn confidence_threshold(mut self, threshold: f32) -> Self {
        assert!(
            (0.0..=1.0).contains(&threshold),
            "Confidence threshold must be within [0, 1]"
        );
        self.confidence_threshold = threshold;
        self
    }

    /// Detections are suppressed when their IoU with a better one is greater than the threshold
    ///
    pub fn nms_threshold(mut self, threshold: f32) -> Self {
        assert!(
            (0.0..=1.0).contains(&threshold),
            "NMS threshold must be within [0, 1]"
        );
        self.nms_threshold = threshold;
        self
    }

    /// The class name to keep, the name must be present in the class list
    ///
    pub fn target_class(mut self, name: &str) -> Self {
        self.target_class = name.to_string();
        self
    }

    /// Overrides the input size defined by the network config
    ///
    pub fn input_size(mut self, width: u32, height: u32) -> Self {
        assert!(width > 0 && height > 0, "Input size must be positive");
        self.input_size = Some((width, height));
        self
    }

    pub fn inference_target(mut self, target: InferenceTarget) -> Self {
        self.inference_target = target;
        self
    }
}

/// Candidate box produced by the detector for a single frame
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub class_id: usize,
}

/// Reads the class list, one name per line
///
pub fn load_class_names(path: &Path) -> Result<Vec<String>> {
    let class_error = |e: String| Errors::ClassList(path.display().to_string(), e);
    let content = fs::read_to_string(path).map_err(|e| class_error(e.to_string()))?;
    let names = content
        .lines()
        .map(|l| l.trim().to_string())
        .collect::<Vec<_>>();

    if names.iter().all(|n| n.is_empty()) {
        return Err(class_error("no class names found".to_string()).into());
    }

    Ok(names)
}

/// Detects objects of a single class, by default `person`
///
pub struct HumanDetector<N: DetectionNetwork = OnnxNetwork> {
    network: N,
    class_names: Vec<String>,
    target_class_id: usize,
    options: DetectorOptions,
}

impl HumanDetector<OnnxNetwork> {
    /// Loads the ONNX network and the class list
    ///
    /// The input size is taken from the options, then from the `[net]` section of the config,
    /// and defaults to [`DEFAULT_INPUT_SIZE`].
    ///
    pub fn new(paths: &ModelPaths, options: DetectorOptions) -> Result<Self> {
        let class_names = load_class_names(&paths.classes)?;

        let config_size = match &paths.config {
            Some(config) => {
                let cfg = NetConfig::load(config)?;
                Some((cfg.width, cfg.height))
            }
            None => None,
        };
        let input_size = options
            .input_size
            .or(config_size)
            .unwrap_or(DEFAULT_INPUT_SIZE);

        let network = OnnxNetwork::load(&paths.model, input_size, options.inference_target)?;
        Self::with_network(network, class_names, options)
    }
}

impl<N: DetectionNetwork> HumanDetector<N> {
    /// Builds the detector around an already loaded network
    ///
    pub fn with_network(
        network: N,
        class_names: Vec<String>,
        options: DetectorOptions,
    ) -> Result<Self> {
        let target_class_id = class_names
            .iter()
            .position(|n| *n == options.target_class)
            .ok_or_else(|| Errors::MissingClass(options.target_class.clone()))?;

        Ok(Self {
            network,
            class_names,
            target_class_id,
            options,
        })
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn target_class_id(&self) -> usize {
        self.target_class_id
    }

    pub fn options(&self) -> &DetectorOptions {
        &self.options
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    /// Detects the target class objects on the frame
    ///
    /// Returns the detections that survived non-max suppression, best first. The boxes are in
    /// frame pixels and clipped to the frame.
    ///
    pub fn detect(&self, frame: &RgbImage) -> Result<Vec<Detection>> {
        validate_frame(frame)?;

        let (width, height) = self.network.input_size();
        let blob = blob_from_image(frame, width, height)?;
        let outputs = self.network.forward(&blob)?;

        let mut candidates = Vec::new();
        for output in &outputs {
            let rows = output_rows(output)?;
            candidates.extend(self.decode(rows, frame.width() as f32, frame.height() as f32));
        }

        let scored = candidates
            .iter()
            .map(|d: &Detection| (d.bbox, d.confidence))
            .collect::<Vec<_>>();

        let detections = nms(
            &scored,
            self.options.nms_threshold,
            Some(self.options.confidence_threshold),
        )
        .into_iter()
        .map(|i| candidates[i])
        .collect::<Vec<_>>();

        debug!(
            "{} candidate(s) of class `{}`, {} after NMS",
            candidates.len(),
            self.options.target_class,
            detections.len()
        );

        Ok(detections)
    }

    fn decode(&self, rows: ArrayView2<f32>, frame_width: f32, frame_height: f32) -> Vec<Detection> {
        rows.outer_iter()
            .filter_map(|row| {
                let (class_id, confidence) = row
                    .iter()
                    .skip(ROW_BOX_FIELDS)
                    .copied()
                    .enumerate()
                    .fold((0, f32::MIN), |best, (i, score)| {
                        if score > best.1 {
                            (i, score)
                        } else {
                            best
                        }
                    });

                if class_id >= self.class_names.len()
                    || class_id != self.target_class_id
                    || confidence <= self.options.confidence_threshold
                {
                    return None;
                }

                let bbox = BoundingBox::from_center(
                    row[0] * frame_width,
                    row[1] * frame_height,
                    row[2] * frame_width,
                    row[3] * frame_height,
                )
                .clip(frame_width, frame_height)
                .filter(|b| b.width() >= MIN_BOX_SIDE && b.height() >= MIN_BOX_SIDE)?;

                Some(Detection {
                    bbox,
                    confidence,
                    class_id,
                })
            })
            .collect()
    }
}

/// Views the output as rows where the last axis holds the row values
///
fn output_rows(output: &ArrayD<f32>) -> Result<ArrayView2<'_, f32>> {
    let shape = output.shape();
    if shape.len() < 2 {
        return Err(Errors::MalformedOutput(format!("expected at least 2 axes, got {shape:?}")).into());
    }

    let cols = shape[shape.len() - 1];
    if cols <= ROW_BOX_FIELDS {
        return Err(Errors::MalformedOutput(format!(
            "rows must contain class scores after {ROW_BOX_FIELDS} box fields, got {cols} values"
        ))
        .into());
    }

    let rows = output.len() / cols;
    let view = output
        .view()
        .into_shape((rows, cols))
        .map_err(|e| Errors::MalformedOutput(e.to_string()))?;
    Ok(view)
}
