use std::path::Path;

use crate::classification::domain::mask_classifier::MaskClassifier;
use crate::detection::domain::face_locator::FaceLocator;
use crate::pipeline::mask_pipeline::{FramePredictions, MaskPipeline};
use crate::rendering::domain::frame_annotator::FrameAnnotator;
use crate::video::domain::image_writer::ImageWriter;
use crate::video::domain::video_reader::VideoReader;

/// Single-image run: read → detect and classify → annotate → write.
pub struct AnnotateImageUseCase {
    reader: Box<dyn VideoReader>,
    image_writer: Box<dyn ImageWriter>,
    locator: Box<dyn FaceLocator>,
    classifier: Box<dyn MaskClassifier>,
    annotator: Box<dyn FrameAnnotator>,
    pipeline: MaskPipeline,
}

impl AnnotateImageUseCase {
    pub fn new(
        reader: Box<dyn VideoReader>,
        image_writer: Box<dyn ImageWriter>,
        locator: Box<dyn FaceLocator>,
        classifier: Box<dyn MaskClassifier>,
        annotator: Box<dyn FrameAnnotator>,
        pipeline: MaskPipeline,
    ) -> Self {
        Self {
            reader,
            image_writer,
            locator,
            classifier,
            annotator,
            pipeline,
        }
    }

    /// Classifies every face in `input_path`. The annotated image is saved
    /// only when `output_path` is given.
    pub fn execute(
        &mut self,
        input_path: &Path,
        output_path: Option<&Path>,
    ) -> Result<FramePredictions, Box<dyn std::error::Error>> {
        self.reader.open(input_path)?;
        let frame = self.reader.frames().next().ok_or("No frames in image")?;
        self.reader.close();
        let mut frame = frame?;

        let predictions = self.pipeline.detect_and_predict(
            &frame,
            self.locator.as_mut(),
            self.classifier.as_mut(),
        )?;
        for (bbox, prediction) in predictions.iter() {
            log::info!("{} at {:?}", prediction.caption(), bbox);
        }

        if let Some(path) = output_path {
            self.annotator.annotate(&mut frame, &predictions)?;
            self.image_writer.write(path, &frame)?;
        }

        Ok(predictions)
    }
}
