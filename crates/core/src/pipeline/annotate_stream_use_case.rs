use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::classification::domain::mask_classifier::MaskClassifier;
use crate::detection::domain::face_locator::FaceLocator;
use crate::pipeline::mask_pipeline::MaskPipeline;
use crate::pipeline::pipeline_logger::{
    NullPipelineLogger, PipelineLogger, METRIC_FACES, STAGE_ANNOTATE, STAGE_PREDICT, STAGE_WRITE,
};
use crate::rendering::domain::frame_annotator::FrameAnnotator;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

/// Called after every frame with `(frames_processed, total_frames)`.
/// Returning `false` stops the run.
pub type ProgressCallback = Box<dyn Fn(usize, usize) -> bool + Send>;

/// What to do with a frame whose detection or classification failed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrameErrorPolicy {
    /// Pass the frame through without overlay and keep going.
    #[default]
    Skip,
    /// Abort the run with the error.
    Halt,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub frames_processed: usize,
    pub frames_skipped: usize,
    pub faces_detected: usize,
}

/// Read → detect and classify → annotate → write, one frame at a time.
///
/// Reader and writer failures always end the run. Pipeline failures follow
/// the [`FrameErrorPolicy`].
pub struct AnnotateStreamUseCase {
    reader: Box<dyn VideoReader>,
    locator: Box<dyn FaceLocator>,
    classifier: Box<dyn MaskClassifier>,
    annotator: Box<dyn FrameAnnotator>,
    pipeline: MaskPipeline,
    output: Option<(Box<dyn VideoWriter>, PathBuf)>,
    logger: Box<dyn PipelineLogger>,
    error_policy: FrameErrorPolicy,
    max_frames: Option<usize>,
    on_progress: Option<ProgressCallback>,
}

impl AnnotateStreamUseCase {
    pub fn new(
        reader: Box<dyn VideoReader>,
        locator: Box<dyn FaceLocator>,
        classifier: Box<dyn MaskClassifier>,
        annotator: Box<dyn FrameAnnotator>,
        pipeline: MaskPipeline,
    ) -> Self {
        Self {
            reader,
            locator,
            classifier,
            annotator,
            pipeline,
            output: None,
            logger: Box::new(NullPipelineLogger),
            error_policy: FrameErrorPolicy::default(),
            max_frames: None,
            on_progress: None,
        }
    }

    pub fn with_output(mut self, writer: Box<dyn VideoWriter>, path: &Path) -> Self {
        self.output = Some((writer, path.to_path_buf()));
        self
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_error_policy(mut self, policy: FrameErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn with_max_frames(mut self, max_frames: Option<usize>) -> Self {
        self.max_frames = max_frames.filter(|&n| n > 0);
        self
    }

    pub fn with_progress(mut self, on_progress: ProgressCallback) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub fn execute(&mut self, source: &Path) -> Result<StreamSummary, Box<dyn std::error::Error>> {
        let metadata = self.reader.open(source)?;

        if let Some((writer, path)) = self.output.as_mut() {
            if let Err(e) = writer.open(path, &metadata) {
                self.reader.close();
                return Err(e);
            }
        }

        let total = match (self.max_frames, metadata.total_frames) {
            (Some(max), 0) => max,
            (Some(max), t) => max.min(t),
            (None, t) => t,
        };

        let result = self.run_frames(total);

        self.reader.close();
        let close_result = match self.output.as_mut() {
            Some((writer, _)) => writer.close(),
            None => Ok(()),
        };
        self.logger.summary();

        let summary = result?;
        close_result?;
        log::info!(
            "Processed {} frames ({} skipped), {} faces classified",
            summary.frames_processed,
            summary.frames_skipped,
            summary.faces_detected
        );
        Ok(summary)
    }

    fn run_frames(&mut self, total: usize) -> Result<StreamSummary, Box<dyn std::error::Error>> {
        let Self {
            reader,
            locator,
            classifier,
            annotator,
            pipeline,
            output,
            logger,
            error_policy,
            max_frames,
            on_progress,
        } = self;

        let mut summary = StreamSummary::default();

        for frame_result in reader.frames() {
            let mut frame = frame_result?;

            let start = Instant::now();
            let outcome = pipeline.detect_and_predict(&frame, locator.as_mut(), classifier.as_mut());
            logger.timing(STAGE_PREDICT, elapsed_ms(start));

            match outcome {
                Ok(predictions) => {
                    for (bbox, prediction) in predictions.iter() {
                        log::debug!(
                            "Frame {}: {} at {:?}",
                            frame.index(),
                            prediction.caption(),
                            bbox
                        );
                    }
                    summary.faces_detected += predictions.len();
                    logger.metric(METRIC_FACES, predictions.len() as f64);

                    let start = Instant::now();
                    annotator.annotate(&mut frame, &predictions)?;
                    logger.timing(STAGE_ANNOTATE, elapsed_ms(start));
                }
                Err(e) => match error_policy {
                    FrameErrorPolicy::Halt => return Err(e.into()),
                    FrameErrorPolicy::Skip => {
                        log::warn!("Frame {} left unannotated: {e}", frame.index());
                        summary.frames_skipped += 1;
                    }
                },
            }

            if let Some((writer, _)) = output.as_mut() {
                let start = Instant::now();
                writer.write(&frame)?;
                logger.timing(STAGE_WRITE, elapsed_ms(start));
            }

            summary.frames_processed += 1;
            logger.progress(summary.frames_processed, total);

            if let Some(callback) = on_progress.as_ref() {
                if !callback(summary.frames_processed, total) {
                    log::info!("Stopped after {} frames", summary.frames_processed);
                    break;
                }
            }
            if max_frames.is_some_and(|max| summary.frames_processed >= max) {
                break;
            }
        }

        Ok(summary)
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
