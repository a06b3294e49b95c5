use std::path::PathBuf;

/// Describes a frame source: a video file, a still image, or a live camera.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    /// 0.0 when unknown (still images, some capture devices).
    pub fps: f64,
    /// 0 when unknown or unbounded (live cameras).
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
    pub is_live: bool,
}
