use crate::shared::bounding_box::BoundingBox;

/// One candidate face reported by a [`FaceLocator`](super::face_locator::FaceLocator).
///
/// Coordinates are normalized to `[0, 1]` over the detector's input space and
/// map to frame pixels by scaling with `(W, H, W, H)`. Values slightly
/// outside `[0, 1]` are possible and are left to the caller to clamp.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceDetection {
    pub confidence: f32,
    /// `[start_x, start_y, end_x, end_y]`, normalized.
    pub bbox: [f32; 4],
}

impl FaceDetection {
    pub fn new(confidence: f32, bbox: [f32; 4]) -> Self {
        Self { confidence, bbox }
    }

    /// Scales the normalized box into pixel space of a `width × height`
    /// frame. Fractional pixels are truncated toward zero; no clamping.
    pub fn to_pixel_box(&self, width: u32, height: u32) -> BoundingBox {
        let (w, h) = (width as f32, height as f32);
        BoundingBox::new(
            (self.bbox[0] * w) as i32,
            (self.bbox[1] * h) as i32,
            (self.bbox[2] * w) as i32,
            (self.bbox[3] * h) as i32,
        )
    }
}
