use ndarray::{s, Array3};

use crate::pipeline::pipeline_error::PipelineError;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::{Frame, PixelFormat};

/// Side length of the square classifier input.
pub const DEFAULT_CROP_SIZE: u32 = 224;

/// Extra pixels added around a detected face before cropping.
///
/// The detector's boxes sit tight on the face and tend to cut off the chin
/// and forehead, which is where mask placement is most visible.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropMargins {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Default for CropMargins {
    fn default() -> Self {
        Self {
            left: 15,
            top: 15,
            right: 15,
            bottom: 20,
        }
    }
}

/// Grows `bbox` by `margins` and clamps every coordinate into
/// `[0, width - 1] × [0, height - 1]`.
///
/// The result may be degenerate when the detection lies outside the frame.
pub fn expand_and_clamp(
    bbox: BoundingBox,
    margins: &CropMargins,
    width: u32,
    height: u32,
) -> BoundingBox {
    let max_x = width as i32 - 1;
    let max_y = height as i32 - 1;
    BoundingBox::new(
        clamp_coord(bbox.start_x.saturating_sub(margins.left), max_x),
        clamp_coord(bbox.start_y.saturating_sub(margins.top), max_y),
        clamp_coord(bbox.end_x.saturating_add(margins.right), max_x),
        clamp_coord(bbox.end_y.saturating_add(margins.bottom), max_y),
    )
}

fn clamp_coord(value: i32, max: i32) -> i32 {
    value.min(max).max(0)
}

/// Cuts `bbox` out of `frame`, converts it to RGB and resizes it to
/// `size × size`, returning `[size, size, 3]` float32 in `0..=255`.
///
/// Returns `Ok(None)` for a degenerate box; there is nothing to classify.
pub fn extract_face(
    frame: &Frame,
    bbox: BoundingBox,
    size: u32,
) -> Result<Option<Array3<f32>>, PipelineError> {
    if bbox.is_degenerate() {
        return Ok(None);
    }
    if frame.channels() != 3 {
        return Err(PipelineError::InvalidCrop(format!(
            "expected 3 channels, frame has {}",
            frame.channels()
        )));
    }
    if !bbox.is_within(frame.width() + 1, frame.height() + 1) {
        return Err(PipelineError::InvalidCrop(format!(
            "{bbox:?} exceeds {}x{} frame",
            frame.width(),
            frame.height()
        )));
    }

    let (x0, x1) = (bbox.start_x as usize, bbox.end_x as usize);
    let (y0, y1) = (bbox.start_y as usize, bbox.end_y as usize);
    let src = frame.as_ndarray();
    let region = src.slice(s![y0..y1, x0..x1, ..]);
    let rgb: Vec<u8> = match frame.pixel_format() {
        PixelFormat::Bgr => region.slice(s![.., .., ..;-1]).iter().copied().collect(),
        PixelFormat::Rgb => region.iter().copied().collect(),
    };

    let crop = image::RgbImage::from_raw(bbox.width() as u32, bbox.height() as u32, rgb)
        .ok_or_else(|| PipelineError::InvalidCrop(format!("buffer mismatch for {bbox:?}")))?;
    let resized = image::imageops::resize(&crop, size, size, image::imageops::FilterType::Triangle);

    let s = size as usize;
    let pixels = resized.into_raw().into_iter().map(f32::from).collect();
    Array3::from_shape_vec((s, s, 3), pixels)
        .map(Some)
        .map_err(|e| PipelineError::InvalidCrop(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_detection::FaceDetection;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn frame_with_pixel(w: u32, h: u32, at: (usize, usize), bgr: [u8; 3]) -> Frame {
        let mut data = vec![0u8; (w * h * 3) as usize];
        let offset = (at.1 * w as usize + at.0) * 3;
        data[offset..offset + 3].copy_from_slice(&bgr);
        Frame::new(data, w, h, 3, 0)
    }

    fn uniform_frame(w: u32, h: u32, bgr: [u8; 3]) -> Frame {
        let data = bgr.iter().copied().cycle().take((w * h * 3) as usize).collect();
        Frame::new(data, w, h, 3, 0)
    }

    // ── Geometry ─────────────────────────────────────────────────────

    #[test]
    fn test_default_margins() {
        let m = CropMargins::default();
        assert_eq!((m.left, m.top, m.right, m.bottom), (15, 15, 15, 20));
    }

    #[test]
    fn test_expand_inside_frame_adds_margins() {
        let b = expand_and_clamp(
            BoundingBox::new(100, 100, 200, 200),
            &CropMargins::default(),
            400,
            300,
        );
        assert_eq!(b, BoundingBox::new(85, 85, 215, 220));
    }

    #[rstest]
    #[case::top_left(BoundingBox::new(5, 3, 50, 50), BoundingBox::new(0, 0, 65, 70))]
    #[case::bottom_right(BoundingBox::new(350, 250, 395, 290), BoundingBox::new(335, 235, 399, 299))]
    #[case::whole_frame(BoundingBox::new(0, 0, 400, 300), BoundingBox::new(0, 0, 399, 299))]
    #[case::negative_coords(BoundingBox::new(-40, -40, 10, 10), BoundingBox::new(0, 0, 25, 30))]
    fn test_expand_clamps_to_frame(#[case] input: BoundingBox, #[case] expected: BoundingBox) {
        let b = expand_and_clamp(input, &CropMargins::default(), 400, 300);
        assert_eq!(b, expected);
        assert!(b.is_within(400, 300));
    }

    #[test]
    fn test_expand_outside_frame_collapses() {
        let b = expand_and_clamp(
            BoundingBox::new(500, 400, 600, 500),
            &CropMargins::default(),
            400,
            300,
        );
        assert!(b.is_degenerate());
        assert!(b.is_within(400, 300));
    }

    #[test]
    fn test_expand_always_within_bounds() {
        let margins = CropMargins::default();
        for x in (-100..=500).step_by(37) {
            for y in (-100..=400).step_by(41) {
                let b = expand_and_clamp(BoundingBox::new(x, y, x + 60, y + 80), &margins, 400, 300);
                assert!(b.start_x >= 0 && b.start_y >= 0, "{b:?}");
                assert!(b.end_x <= 399 && b.end_y <= 299, "{b:?}");
            }
        }
    }

    #[rstest]
    #[case::huge_end_x([0.0, 0.0, 1.0e12, 1.0], BoundingBox::new(0, 0, 399, 299))]
    #[case::huge_negative_start([-1.0e12, -1.0e12, 0.5, 0.5], BoundingBox::new(0, 0, 215, 170))]
    #[case::all_extreme([-1.0e12, -1.0e12, 1.0e12, 1.0e12], BoundingBox::new(0, 0, 399, 299))]
    fn test_expand_saturates_extreme_detections(
        #[case] normalized: [f32; 4],
        #[case] expected: BoundingBox,
    ) {
        let raw = FaceDetection::new(0.9, normalized).to_pixel_box(400, 300);
        let b = expand_and_clamp(raw, &CropMargins::default(), 400, 300);
        assert_eq!(b, expected);
        assert!(b.is_within(400, 300));
    }

    #[test]
    fn test_expand_at_integer_limits() {
        let b = expand_and_clamp(
            BoundingBox::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX),
            &CropMargins::default(),
            400,
            300,
        );
        assert_eq!(b, BoundingBox::new(0, 0, 399, 299));
    }

    // ── Extraction ───────────────────────────────────────────────────

    #[test]
    fn test_extract_face_shape() {
        let frame = uniform_frame(64, 48, [10, 20, 30]);
        let face = extract_face(&frame, BoundingBox::new(4, 4, 40, 30), DEFAULT_CROP_SIZE)
            .unwrap()
            .unwrap();
        assert_eq!(face.shape(), &[224, 224, 3]);
    }

    #[test]
    fn test_extract_face_converts_bgr_to_rgb() {
        let frame = uniform_frame(32, 32, [10, 20, 30]);
        let face = extract_face(&frame, BoundingBox::new(0, 0, 16, 16), 8)
            .unwrap()
            .unwrap();
        assert_relative_eq!(face[[3, 3, 0]], 30.0);
        assert_relative_eq!(face[[3, 3, 1]], 20.0);
        assert_relative_eq!(face[[3, 3, 2]], 10.0);
    }

    #[test]
    fn test_extract_face_keeps_rgb_frames() {
        let frame = uniform_frame(32, 32, [10, 20, 30]).with_pixel_format(PixelFormat::Rgb);
        let face = extract_face(&frame, BoundingBox::new(0, 0, 16, 16), 8)
            .unwrap()
            .unwrap();
        assert_relative_eq!(face[[0, 0, 0]], 10.0);
    }

    #[test]
    fn test_extract_face_reads_only_the_box() {
        // A single white pixel outside the box must not leak into the crop
        let frame = frame_with_pixel(20, 20, (15, 15), [255, 255, 255]);
        let face = extract_face(&frame, BoundingBox::new(0, 0, 10, 10), 10)
            .unwrap()
            .unwrap();
        assert!(face.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_extract_face_end_is_exclusive() {
        let frame = frame_with_pixel(20, 20, (10, 5), [255, 255, 255]);
        let face = extract_face(&frame, BoundingBox::new(0, 0, 10, 10), 10)
            .unwrap()
            .unwrap();
        assert!(face.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_extract_face_degenerate_box_is_skipped() {
        let frame = uniform_frame(20, 20, [1, 2, 3]);
        let face = extract_face(&frame, BoundingBox::new(19, 5, 19, 15), DEFAULT_CROP_SIZE).unwrap();
        assert!(face.is_none());
    }

    #[test]
    fn test_extract_face_rejects_box_past_frame() {
        let frame = uniform_frame(20, 20, [1, 2, 3]);
        let result = extract_face(&frame, BoundingBox::new(0, 0, 30, 10), DEFAULT_CROP_SIZE);
        assert!(matches!(result, Err(PipelineError::InvalidCrop(_))));
    }
}
