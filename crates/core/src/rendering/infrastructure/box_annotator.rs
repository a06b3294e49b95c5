use ab_glyph::{FontRef, PxScale};
use image::{ImageBuffer, Rgb};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::pipeline::mask_pipeline::FramePredictions;
use crate::rendering::domain::frame_annotator::FrameAnnotator;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::{Frame, PixelFormat};

pub const DEFAULT_LINE_THICKNESS: u32 = 2;
pub const DEFAULT_BAR_HEIGHT: u32 = 6;
/// Caption line height in pixels.
pub const DEFAULT_CAPTION_SCALE: f32 = 14.0;

/// Vertical gap between the caption, the confidence bar and the box.
const GAP: i32 = 2;

static CAPTION_FONT: &[u8] = include_bytes!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/DejaVuSans-Bold.ttf"
));

/// Drawing surface over a frame's own buffer. `Rgb` only fixes the layout;
/// colours are passed in the frame's channel order.
type FrameCanvas<'a> = ImageBuffer<Rgb<u8>, &'a mut [u8]>;

/// Draws each face as an outlined rectangle in its label colour, with a
/// caption such as `without mask: 70.00%` and a bar whose width tracks the
/// winning probability stacked above it.
///
/// When the stack does not fit above the box it moves just inside the top
/// edge. Everything is clipped to the frame.
pub struct BoxAnnotator {
    thickness: i32,
    bar_height: i32,
    caption_scale: PxScale,
    font: FontRef<'static>,
}

impl BoxAnnotator {
    pub fn new(
        thickness: u32,
        bar_height: u32,
        caption_scale: f32,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            thickness: thickness.max(1) as i32,
            bar_height: bar_height as i32,
            caption_scale: PxScale::from(caption_scale.max(1.0)),
            font: FontRef::try_from_slice(CAPTION_FONT)?,
        })
    }

    pub fn with_defaults() -> Result<Self, Box<dyn std::error::Error>> {
        Self::new(DEFAULT_LINE_THICKNESS, DEFAULT_BAR_HEIGHT, DEFAULT_CAPTION_SCALE)
    }

    /// Returns `(caption_top, bar_top)` for `b`.
    fn layout(&self, b: &BoundingBox) -> (i32, i32) {
        let caption_height = self.caption_scale.y.ceil() as i32;
        let bar_top = b.start_y - GAP - self.bar_height;
        let caption_top = bar_top - GAP - caption_height;
        if caption_top >= 0 {
            return (caption_top, bar_top);
        }
        let bar_top = b.start_y + self.thickness;
        (bar_top + self.bar_height + GAP, bar_top)
    }

    fn draw_outline(&self, canvas: &mut FrameCanvas<'_>, b: &BoundingBox, color: Rgb<u8>) {
        // Box ends are inclusive
        let (w, h) = (b.width() + 1, b.height() + 1);
        for inset in 0..self.thickness {
            let (iw, ih) = (w - 2 * inset, h - 2 * inset);
            if iw <= 0 || ih <= 0 {
                break;
            }
            let rect = Rect::at(b.start_x + inset, b.start_y + inset).of_size(iw as u32, ih as u32);
            draw_hollow_rect_mut(canvas, rect, color);
        }
    }

    fn draw_bar(
        &self,
        canvas: &mut FrameCanvas<'_>,
        b: &BoundingBox,
        top: i32,
        probability: f32,
        color: Rgb<u8>,
    ) {
        let filled = ((b.width() + 1) as f32 * probability.clamp(0.0, 1.0)).round() as u32;
        if filled == 0 || self.bar_height == 0 {
            return;
        }
        let rect = Rect::at(b.start_x, top).of_size(filled, self.bar_height as u32);
        draw_filled_rect_mut(canvas, rect, color);
    }
}

impl FrameAnnotator for BoxAnnotator {
    fn annotate(
        &self,
        frame: &mut Frame,
        predictions: &FramePredictions,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if frame.channels() != 3 {
            return Err(format!("cannot draw on a {}-channel frame", frame.channels()).into());
        }
        let pixel_format = frame.pixel_format();
        let (width, height) = (frame.width(), frame.height());
        let mut canvas: FrameCanvas<'_> = ImageBuffer::from_raw(width, height, frame.data_mut())
            .ok_or("Frame buffer does not match its dimensions")?;

        for (bbox, prediction) in predictions.iter() {
            let (label, probability) = prediction.decide();
            let color = Rgb(in_pixel_format(label.color_bgr(), pixel_format));
            let (caption_top, bar_top) = self.layout(bbox);

            self.draw_outline(&mut canvas, bbox, color);
            self.draw_bar(&mut canvas, bbox, bar_top, probability, color);
            draw_text_mut(
                &mut canvas,
                color,
                bbox.start_x,
                caption_top,
                self.caption_scale,
                &self.font,
                &prediction.caption(),
            );
        }
        Ok(())
    }
}

fn in_pixel_format(bgr: [u8; 3], format: PixelFormat) -> [u8; 3] {
    match format {
        PixelFormat::Bgr => bgr,
        PixelFormat::Rgb => [bgr[2], bgr[1], bgr[0]],
    }
}
