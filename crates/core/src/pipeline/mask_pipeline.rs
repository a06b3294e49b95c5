use ndarray::Axis;

use crate::classification::domain::mask_classifier::MaskClassifier;
use crate::classification::domain::mask_prediction::MaskPrediction;
use crate::detection::domain::face_locator::FaceLocator;
use crate::pipeline::face_crop::{expand_and_clamp, extract_face, CropMargins, DEFAULT_CROP_SIZE};
use crate::pipeline::pipeline_error::PipelineError;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Detections at or below this confidence are discarded.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Tunables for [`MaskPipeline`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineConfig {
    /// Strict lower bound: a detection passes only if `confidence > threshold`.
    pub confidence_threshold: f32,
    pub margins: CropMargins,
    pub crop_size: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            margins: CropMargins::default(),
            crop_size: DEFAULT_CROP_SIZE,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(PipelineError::Config(format!(
                "confidence threshold must be between 0.0 and 1.0, got {}",
                self.confidence_threshold
            )));
        }
        if self.crop_size == 0 {
            return Err(PipelineError::Config("crop size must be positive".into()));
        }
        let m = self.margins;
        if m.left < 0 || m.top < 0 || m.right < 0 || m.bottom < 0 {
            return Err(PipelineError::Config(format!(
                "crop margins must be non-negative, got {m:?}"
            )));
        }
        Ok(())
    }
}

/// Boxes and mask predictions for one frame, index-aligned.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FramePredictions {
    boxes: Vec<BoundingBox>,
    predictions: Vec<MaskPrediction>,
}

impl FramePredictions {
    pub fn new(
        boxes: Vec<BoundingBox>,
        predictions: Vec<MaskPrediction>,
    ) -> Result<Self, PipelineError> {
        if boxes.len() != predictions.len() {
            return Err(PipelineError::PredictionCountMismatch {
                expected: boxes.len(),
                actual: predictions.len(),
            });
        }
        Ok(Self { boxes, predictions })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn boxes(&self) -> &[BoundingBox] {
        &self.boxes
    }

    pub fn predictions(&self) -> &[MaskPrediction] {
        &self.predictions
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BoundingBox, &MaskPrediction)> {
        self.boxes.iter().zip(self.predictions.iter())
    }

    pub fn into_parts(self) -> (Vec<BoundingBox>, Vec<MaskPrediction>) {
        (self.boxes, self.predictions)
    }
}

/// Per-frame face localisation and batched mask classification.
///
/// Holds configuration only. The inference engines are passed in on every
/// call and nothing carries over between frames.
#[derive(Clone, Debug, Default)]
pub struct MaskPipeline {
    config: PipelineConfig,
}

impl MaskPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Locates faces, crops every confident one and classifies them in a
    /// single batch.
    ///
    /// The classifier is not invoked when no face survives filtering.
    pub fn detect_and_predict(
        &self,
        frame: &Frame,
        locator: &mut dyn FaceLocator,
        classifier: &mut dyn MaskClassifier,
    ) -> Result<FramePredictions, PipelineError> {
        if frame.is_empty() {
            return Err(PipelineError::EmptyFrame {
                width: frame.width(),
                height: frame.height(),
                len: frame.data().len(),
            });
        }

        let detections = locator.locate(frame).map_err(PipelineError::Locate)?;
        let (width, height) = (frame.width(), frame.height());

        let mut boxes = Vec::new();
        let mut faces = Vec::new();
        for det in detections
            .iter()
            .filter(|d| d.confidence > self.config.confidence_threshold)
        {
            let bbox = expand_and_clamp(
                det.to_pixel_box(width, height),
                &self.config.margins,
                width,
                height,
            );
            match extract_face(frame, bbox, self.config.crop_size)? {
                Some(face) => {
                    faces.push(face);
                    boxes.push(bbox);
                }
                None => log::warn!(
                    "Skipping empty face box {bbox:?} in frame {}",
                    frame.index()
                ),
            }
        }

        log::debug!(
            "Frame {}: {} candidates, {} faces to classify",
            frame.index(),
            detections.len(),
            faces.len()
        );

        if faces.is_empty() {
            return Ok(FramePredictions::empty());
        }

        let views: Vec<_> = faces.iter().map(|f| f.view()).collect();
        let batch = ndarray::stack(Axis(0), &views)
            .map_err(|e| PipelineError::InvalidCrop(e.to_string()))?;
        let predictions = classifier
            .classify(batch.view())
            .map_err(PipelineError::Classify)?;

        FramePredictions::new(boxes, predictions)
    }
}

/// Runs [`MaskPipeline::detect_and_predict`] with the default configuration.
pub fn detect_and_predict(
    frame: &Frame,
    locator: &mut dyn FaceLocator,
    classifier: &mut dyn MaskClassifier,
) -> Result<FramePredictions, PipelineError> {
    MaskPipeline::default().detect_and_predict(frame, locator, classifier)
}
