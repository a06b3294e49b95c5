use std::path::Path;

use crate::shared::frame::{Frame, PixelFormat};
use crate::video::domain::image_writer::ImageWriter;

/// Saves an annotated frame with the `image` crate, reordering BGR pixels
/// to RGB first.
pub struct ImageFileWriter;

impl ImageFileWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageFileWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageWriter for ImageFileWriter {
    fn write(&self, path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        if frame.channels() != 3 {
            return Err(format!("cannot save a {}-channel frame", frame.channels()).into());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let rgb = match frame.pixel_format() {
            PixelFormat::Rgb => frame.data().to_vec(),
            PixelFormat::Bgr => frame.to_pixel_format(PixelFormat::Rgb).data().to_vec(),
        };
        let img = image::RgbImage::from_raw(frame.width(), frame.height(), rgb)
            .ok_or("Frame buffer does not match its dimensions")?;

        img.save(path)?;
        log::info!("Saved {}", path.display());
        Ok(())
    }
}
