use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

/// Serves a still image as a one-frame source.
///
/// The image is decoded with the `image` crate, optionally scaled to a target
/// width, and handed out in BGR order like every other source.
pub struct ImageFileReader {
    target_width: Option<u32>,
    frame: Option<Frame>,
}

impl ImageFileReader {
    pub fn new() -> Self {
        Self {
            target_width: None,
            frame: None,
        }
    }

    /// Scale to `width` pixels wide, keeping the aspect ratio. `None` or
    /// `Some(0)` keeps the original size.
    pub fn with_target_width(mut self, width: Option<u32>) -> Self {
        self.target_width = width.filter(|&w| w > 0);
        self
    }
}

impl Default for ImageFileReader {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoReader for ImageFileReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        let mut rgb = image::open(path)?.to_rgb8();

        if let Some(tw) = self.target_width {
            let (w, h) = rgb.dimensions();
            if tw != w && w > 0 {
                let th = ((h as u64 * tw as u64) / w as u64).max(1) as u32;
                rgb = image::imageops::resize(&rgb, tw, th, image::imageops::FilterType::Triangle);
            }
        }

        let (width, height) = rgb.dimensions();
        let mut data = rgb.into_raw();
        for px in data.chunks_exact_mut(3) {
            px.swap(0, 2);
        }
        self.frame = Some(Frame::new(data, width, height, 3, 0));

        log::info!("Opened image {} ({width}x{height})", path.display());

        Ok(VideoMetadata {
            width,
            height,
            fps: 0.0,
            total_frames: 1,
            codec: String::new(),
            source_path: Some(path.to_path_buf()),
            is_live: false,
        })
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        match self.frame.take() {
            Some(frame) => Box::new(std::iter::once(Ok(frame))),
            None => Box::new(std::iter::once(Err("ImageFileReader: not opened".into()))),
        }
    }

    fn close(&mut self) {
        self.frame = None;
    }
}
