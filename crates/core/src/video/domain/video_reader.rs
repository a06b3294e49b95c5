use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// A source of frames: a video file, a still image, or a capture device.
///
/// Frames come out in capture order, in BGR unless the frame says otherwise.
pub trait VideoReader: Send {
    /// Opens the source and returns its metadata. For capture devices
    /// `path` is the device name (e.g. `/dev/video0`).
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>>;

    /// Lazily yields frames until the source is exhausted.
    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;

    fn close(&mut self);
}
