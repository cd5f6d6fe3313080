use crate::detector::{DetectionNetwork, InferenceTarget};
use crate::Errors;
use anyhow::Result;
use log::debug;
use ndarray::{Array4, ArrayD, IxDyn};
use std::path::Path;
use tract_onnx::prelude::*;

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX detection network executed by `tract` on the CPU
///
pub struct OnnxNetwork {
    model: Model,
    input_size: (u32, u32),
}

impl OnnxNetwork {
    /// Loads and optimizes the network for the fixed `1x3xHxW` input
    ///
    /// # Parameters
    /// * `path` - the serialized ONNX network;
    /// * `input_size` - `(width, height)` of the network input;
    /// * `target` - the device to run inference on, only [`InferenceTarget::Cpu`] is supported.
    ///
    pub fn load(path: &Path, input_size: (u32, u32), target: InferenceTarget) -> Result<Self> {
        if target != InferenceTarget::Cpu {
            return Err(Errors::UnsupportedInferenceTarget(target).into());
        }

        let model_error = |e: String| Errors::ModelFile(path.display().to_string(), e);

        if !path.is_file() {
            return Err(model_error("file not found".to_string()).into());
        }

        let (width, height) = input_size;
        let model = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|m| {
                m.with_input_fact(0, f32::fact([1, 3, height as usize, width as usize]).into())
            })
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(|e| model_error(e.to_string()))?;

        debug!(
            "Loaded network {} with the input {}x{}",
            path.display(),
            width,
            height
        );

        Ok(Self { model, input_size })
    }
}

impl DetectionNetwork for OnnxNetwork {
    fn input_size(&self) -> (u32, u32) {
        self.input_size
    }

    fn forward(&self, blob: &Array4<f32>) -> Result<Vec<ArrayD<f32>>> {
        let shape = blob.shape().to_vec();
        let data = blob.as_standard_layout();
        let data = data
            .as_slice()
            .ok_or_else(|| Errors::MalformedOutput("input is not contiguous".to_string()))?;
        let input = Tensor::from_shape(&shape, data)?;
        let outputs = self.model.run(tvec!(input.into()))?;

        outputs
            .iter()
            .map(|output| -> Result<ArrayD<f32>> {
                let view = output.to_array_view::<f32>()?;
                let array =
                    ArrayD::from_shape_vec(IxDyn(view.shape()), view.iter().copied().collect())?;
                Ok(array)
            })
            .collect()
    }
}
