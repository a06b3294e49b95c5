use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Sink for annotated frames.
pub trait VideoWriter: Send {
    /// Prepares an output of the size and rate described by `metadata`.
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>>;

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;

    /// Flushes buffered frames and finalises the container.
    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}
