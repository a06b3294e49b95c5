use crate::detection::domain::face_detection::FaceDetection;
use crate::shared::frame::Frame;

/// Domain interface for face localisation.
///
/// Returns every candidate the engine produced, unfiltered; confidence
/// filtering is the caller's decision. `&mut self` because inference
/// sessions need exclusive access while running.
pub trait FaceLocator: Send {
    fn locate(&mut self, frame: &Frame) -> Result<Vec<FaceDetection>, Box<dyn std::error::Error>>;
}
