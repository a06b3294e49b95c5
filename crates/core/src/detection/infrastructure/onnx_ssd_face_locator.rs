/// ResNet-10 SSD face locator using ONNX Runtime via `ort`.
///
/// Builds the fixed 300×300 mean-subtracted blob the model was trained on,
/// runs inference, and decodes every candidate row without filtering.
use std::path::Path;

use crate::detection::domain::face_detection::FaceDetection;
use crate::detection::domain::face_locator::FaceLocator;
use crate::detection::infrastructure::execution_provider::build_session;
use crate::shared::frame::{Frame, PixelFormat};

/// Detector input resolution (square).
pub const DETECTION_INPUT_SIZE: u32 = 300;

/// Per-channel mean subtracted from the blob, in B, G, R order.
///
/// Fixed by the model's training; changing it silently degrades detection.
pub const DETECTION_MEAN_BGR: [f32; 3] = [104.0, 177.0, 123.0];

/// Values per output row: `[image_id, label, confidence, x1, y1, x2, y2]`.
const ROW_LEN: usize = 7;

/// Face locator backed by an ONNX Runtime session.
pub struct OnnxSsdFaceLocator {
    session: ort::session::Session,
}

impl OnnxSsdFaceLocator {
    /// Load the SSD face detector from an ONNX file.
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let session = build_session(model_path)?;
        log::info!("Loaded face detector from {}", model_path.display());
        Ok(Self { session })
    }
}

impl FaceLocator for OnnxSsdFaceLocator {
    fn locate(&mut self, frame: &Frame) -> Result<Vec<FaceDetection>, Box<dyn std::error::Error>> {
        if frame.is_empty() {
            return Err(format!(
                "cannot locate faces in empty frame ({}x{}, {} bytes)",
                frame.width(),
                frame.height(),
                frame.data().len()
            )
            .into());
        }

        let blob = blob_from_frame(frame, DETECTION_INPUT_SIZE, DETECTION_MEAN_BGR)?;
        let input_value = ort::value::Tensor::from_array(blob)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("face detector produced no outputs".into());
        }

        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        let data = tensor.as_slice().ok_or("Cannot get detection slice")?;
        parse_detections(data, &shape)
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Resize to `size × size` (bilinear), subtract the per-channel mean and lay
/// out as NCHW float32 with no scaling.
///
/// Channels stay in BGR order; RGB frames are swapped first.
fn blob_from_frame(
    frame: &Frame,
    size: u32,
    mean_bgr: [f32; 3],
) -> Result<ndarray::Array4<f32>, Box<dyn std::error::Error>> {
    let bgr = match frame.pixel_format() {
        PixelFormat::Bgr => None,
        PixelFormat::Rgb => Some(frame.to_pixel_format(PixelFormat::Bgr)),
    };
    let src = bgr.as_ref().unwrap_or(frame);

    // `RgbImage` is only a 3-channel container here; channel order is untouched.
    let img = image::RgbImage::from_raw(src.width(), src.height(), src.data().to_vec())
        .ok_or("frame buffer does not match its dimensions")?;
    let resized = image::imageops::resize(&img, size, size, image::imageops::FilterType::Triangle);

    let s = size as usize;
    let mut blob = ndarray::Array4::<f32>::zeros((1, 3, s, s));
    for (x, y, px) in resized.enumerate_pixels() {
        for c in 0..3 {
            blob[[0, c, y as usize, x as usize]] = px.0[c] as f32 - mean_bgr[c];
        }
    }
    Ok(blob)
}

// ---------------------------------------------------------------------------
// Postprocessing
// ---------------------------------------------------------------------------

/// Decode a `[1, 1, N, 7]` detection tensor into candidates.
fn parse_detections(
    data: &[f32],
    shape: &[usize],
) -> Result<Vec<FaceDetection>, Box<dyn std::error::Error>> {
    if shape.len() != 4 || shape[3] != ROW_LEN {
        return Err(format!("Unexpected face detector output shape: {shape:?}").into());
    }
    let num_rows = shape[0] * shape[1] * shape[2];
    if data.len() < num_rows * ROW_LEN {
        return Err(format!(
            "face detector output has {} values, expected {}",
            data.len(),
            num_rows * ROW_LEN
        )
        .into());
    }

    Ok(data
        .chunks_exact(ROW_LEN)
        .take(num_rows)
        .map(|row| FaceDetection::new(row[2], [row[3], row[4], row[5], row[6]]))
        .collect())
}
