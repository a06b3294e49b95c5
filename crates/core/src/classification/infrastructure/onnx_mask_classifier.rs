/// Mask classifier using ONNX Runtime via `ort`.
///
/// Wraps a MobileNetV2-style three-class model exported from Keras, which
/// takes NHWC float32 input and yields one softmax row per face.
use std::path::Path;

use ndarray::{ArrayView4, Axis};

use crate::classification::domain::mask_classifier::MaskClassifier;
use crate::classification::domain::mask_prediction::MaskPrediction;
use crate::detection::infrastructure::execution_provider::build_session;

/// Faces per inference call.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Number of classes in the softmax output.
const NUM_CLASSES: usize = 3;

/// How crop pixels are scaled before inference.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InputScaling {
    /// Pass `0..=255` values through unchanged.
    #[default]
    Raw,
    /// MobileNetV2 convention: `x / 127.5 - 1`, mapping to `[-1, 1]`.
    MobileNetV2,
}

impl InputScaling {
    fn apply(&self, value: f32) -> f32 {
        match self {
            InputScaling::Raw => value,
            InputScaling::MobileNetV2 => value / 127.5 - 1.0,
        }
    }
}

/// Mask classifier backed by an ONNX Runtime session.
pub struct OnnxMaskClassifier {
    session: ort::session::Session,
    batch_size: usize,
    scaling: InputScaling,
}

impl OnnxMaskClassifier {
    pub fn new(
        model_path: &Path,
        batch_size: usize,
        scaling: InputScaling,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        if batch_size == 0 {
            return Err("batch_size must be >= 1".into());
        }
        let session = build_session(model_path)?;
        log::info!(
            "Loaded mask classifier from {} (batch size {batch_size}, {scaling:?} input)",
            model_path.display()
        );
        Ok(Self {
            session,
            batch_size,
            scaling,
        })
    }
}

impl MaskClassifier for OnnxMaskClassifier {
    fn classify(
        &mut self,
        faces: ArrayView4<'_, f32>,
    ) -> Result<Vec<MaskPrediction>, Box<dyn std::error::Error>> {
        let mut predictions = Vec::with_capacity(faces.len_of(Axis(0)));

        for chunk in faces.axis_chunks_iter(Axis(0), self.batch_size) {
            let input = scale_input(chunk, self.scaling);
            let input_value = ort::value::Tensor::from_array(input)?;
            let outputs = self.session.run(ort::inputs![input_value])?;
            if outputs.len() == 0 {
                return Err("mask classifier produced no outputs".into());
            }
            let tensor = outputs[0].try_extract_array::<f32>()?;
            let data = tensor.as_slice().ok_or("Cannot get prediction slice")?;
            predictions.extend(parse_predictions(data, tensor.shape(), chunk.len_of(Axis(0)))?);
        }

        Ok(predictions)
    }
}

/// Copies a chunk into an owned, contiguous tensor with scaling applied.
fn scale_input(chunk: ArrayView4<'_, f32>, scaling: InputScaling) -> ndarray::Array4<f32> {
    match scaling {
        InputScaling::Raw => chunk.to_owned(),
        _ => chunk.mapv(|v| scaling.apply(v)),
    }
}

/// Decode an `[n, 3]` softmax tensor, checking it matches the batch.
fn parse_predictions(
    data: &[f32],
    shape: &[usize],
    expected: usize,
) -> Result<Vec<MaskPrediction>, Box<dyn std::error::Error>> {
    if shape.len() != 2 || shape[1] != NUM_CLASSES {
        return Err(format!("Unexpected mask classifier output shape: {shape:?}").into());
    }
    if shape[0] != expected {
        return Err(format!(
            "mask classifier returned {} rows for a batch of {expected}",
            shape[0]
        )
        .into());
    }
    data.chunks_exact(NUM_CLASSES)
        .take(expected)
        .map(|row| {
            MaskPrediction::from_scores(row).ok_or_else(|| "malformed prediction row".into())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array4;

    #[test]
    fn test_raw_scaling_is_identity() {
        let faces = Array4::<f32>::from_elem((2, 4, 4, 3), 200.0);
        let scaled = scale_input(faces.view(), InputScaling::Raw);
        assert_eq!(scaled, faces);
    }

    #[test]
    fn test_mobilenet_scaling_maps_to_unit_range() {
        let mut faces = Array4::<f32>::zeros((1, 1, 2, 3));
        faces[[0, 0, 1, 0]] = 255.0;
        let scaled = scale_input(faces.view(), InputScaling::MobileNetV2);
        assert_relative_eq!(scaled[[0, 0, 0, 0]], -1.0);
        assert_relative_eq!(scaled[[0, 0, 1, 0]], 1.0);
    }

    #[test]
    fn test_scale_input_is_contiguous_for_chunks() {
        let faces = Array4::<f32>::zeros((5, 2, 2, 3));
        let chunks: Vec<_> = faces
            .axis_chunks_iter(Axis(0), 2)
            .map(|c| scale_input(c, InputScaling::Raw))
            .collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].shape(), &[1, 2, 2, 3]);
        assert!(chunks.iter().all(|c| c.is_standard_layout()));
    }

    #[test]
    fn test_parse_predictions_in_order() {
        let data = [0.9, 0.05, 0.05, 0.1, 0.2, 0.7];
        let preds = parse_predictions(&data, &[2, 3], 2).unwrap();
        assert_eq!(preds[0], MaskPrediction::new(0.9, 0.05, 0.05));
        assert_eq!(preds[1], MaskPrediction::new(0.1, 0.2, 0.7));
    }

    #[test]
    fn test_parse_predictions_rejects_wrong_class_count() {
        assert!(parse_predictions(&[0.5, 0.5], &[1, 2], 1).is_err());
    }

    #[test]
    fn test_parse_predictions_rejects_row_count_mismatch() {
        let data = [0.9, 0.05, 0.05];
        assert!(parse_predictions(&data, &[1, 3], 2).is_err());
    }
}
