use ndarray::ArrayView4;

use crate::classification::domain::mask_prediction::MaskPrediction;

/// Domain interface for batched mask-state classification.
///
/// `faces` is `[n, height, width, 3]` float32 RGB in `0..=255`. Must return
/// exactly one prediction per face, in input order. Implementations may
/// split the batch internally.
pub trait MaskClassifier: Send {
    fn classify(
        &mut self,
        faces: ArrayView4<'_, f32>,
    ) -> Result<Vec<MaskPrediction>, Box<dyn std::error::Error>>;
}
