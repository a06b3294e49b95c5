use crate::pipeline::mask_pipeline::FramePredictions;
use crate::shared::frame::Frame;

/// Draws classification results onto a frame in place.
pub trait FrameAnnotator: Send {
    fn annotate(
        &self,
        frame: &mut Frame,
        predictions: &FramePredictions,
    ) -> Result<(), Box<dyn std::error::Error>>;
}
