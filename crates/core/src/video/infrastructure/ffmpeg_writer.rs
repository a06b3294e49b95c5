use std::path::Path;

use crate::shared::frame::{Frame, PixelFormat};
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_writer::VideoWriter;

/// Frame rate used when the source does not report one (most cameras).
pub const FALLBACK_FPS: i32 = 30;

/// Encodes annotated frames to MPEG-4 via ffmpeg-next.
///
/// YUV 4:2:0 needs even dimensions, so odd sizes are scaled down by one
/// pixel on encode.
pub struct FfmpegWriter {
    state: Option<EncoderState>,
}

struct EncoderState {
    octx: ffmpeg_next::format::context::Output,
    encoder: ffmpeg_next::codec::encoder::video::Encoder,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    fps: i32,
    frame_count: usize,
}

// Safety: FfmpegWriter is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegWriter {}

impl FfmpegWriter {
    pub fn new() -> Self {
        Self { state: None }
    }
}

impl Default for FfmpegWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn output_fps(fps: f64) -> i32 {
    let rounded = fps.round() as i32;
    if rounded <= 0 {
        FALLBACK_FPS
    } else {
        rounded
    }
}

fn even_dimension(v: u32) -> u32 {
    (v & !1).max(2)
}

impl EncoderState {
    fn drain(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let ost_time_base = self
            .octx
            .stream(0)
            .ok_or("output stream missing")?
            .time_base();
        let mut encoded = ffmpeg_next::Packet::empty();
        while self.encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(0);
            encoded.rescale_ts(ffmpeg_next::Rational(1, self.fps), ost_time_base);
            encoded.write_interleaved(&mut self.octx)?;
        }
        Ok(())
    }
}

impl VideoWriter for FfmpegWriter {
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        if metadata.width == 0 || metadata.height == 0 {
            return Err(format!(
                "cannot encode {}x{} video",
                metadata.width, metadata.height
            )
            .into());
        }

        let mut octx = ffmpeg_next::format::output(path)?;
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4)
            .ok_or("MPEG4 encoder not found")?;
        let mut ost = octx.add_stream(Some(codec))?;

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;

        let (enc_w, enc_h) = (even_dimension(metadata.width), even_dimension(metadata.height));
        let fps = output_fps(metadata.fps);
        encoder_ctx.set_width(enc_w);
        encoder_ctx.set_height(enc_h);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, fps));
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps, 1)));
        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder_ctx.open_with(ffmpeg_next::Dictionary::new())?;
        ost.set_parameters(&encoder);
        octx.write_header()?;

        let scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::BGR24,
            metadata.width,
            metadata.height,
            ffmpeg_next::format::Pixel::YUV420P,
            enc_w,
            enc_h,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        log::info!(
            "Writing {} ({enc_w}x{enc_h} MPEG-4, {fps} fps)",
            path.display()
        );

        self.state = Some(EncoderState {
            octx,
            encoder,
            scaler,
            width: metadata.width,
            height: metadata.height,
            fps,
            frame_count: 0,
        });
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let state = self.state.as_mut().ok_or("FfmpegWriter: not opened")?;
        if frame.width() != state.width || frame.height() != state.height || frame.channels() != 3
        {
            return Err(format!(
                "frame {} is {}x{}x{}, writer expects {}x{}x3",
                frame.index(),
                frame.width(),
                frame.height(),
                frame.channels(),
                state.width,
                state.height
            )
            .into());
        }

        let converted;
        let src = match frame.pixel_format() {
            PixelFormat::Bgr => frame.data(),
            PixelFormat::Rgb => {
                converted = frame.to_pixel_format(PixelFormat::Bgr);
                converted.data()
            }
        };

        let mut bgr_frame = ffmpeg_next::util::frame::video::Video::new(
            ffmpeg_next::format::Pixel::BGR24,
            state.width,
            state.height,
        );
        let stride = bgr_frame.stride(0);
        let row_len = state.width as usize * 3;
        let data = bgr_frame.data_mut(0);
        for row in 0..state.height as usize {
            data[row * stride..row * stride + row_len]
                .copy_from_slice(&src[row * row_len..(row + 1) * row_len]);
        }

        let mut yuv_frame = ffmpeg_next::util::frame::video::Video::empty();
        state.scaler.run(&bgr_frame, &mut yuv_frame)?;
        yuv_frame.set_pts(Some(state.frame_count as i64));

        state.encoder.send_frame(&yuv_frame)?;
        state.drain()?;
        state.frame_count += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let Some(mut state) = self.state.take() else {
            return Ok(());
        };
        state.encoder.send_eof()?;
        state.drain()?;
        state.octx.write_trailer()?;
        log::info!("Encoded {} frames", state.frame_count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::domain::video_reader::VideoReader;
    use crate::video::infrastructure::ffmpeg_reader::FfmpegReader;

    fn metadata(w: u32, h: u32, fps: f64) -> VideoMetadata {
        VideoMetadata {
            width: w,
            height: h,
            fps,
            total_frames: 0,
            codec: String::new(),
            source_path: None,
            is_live: false,
        }
    }

    fn solid_frame(w: u32, h: u32, bgr: [u8; 3], index: usize) -> Frame {
        let data = bgr.iter().copied().cycle().take((w * h * 3) as usize).collect();
        Frame::new(data, w, h, 3, index)
    }

    #[test]
    fn test_writes_readable_video() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");

        let mut writer = FfmpegWriter::new();
        writer.open(&path, &metadata(160, 120, 30.0)).unwrap();
        for i in 0..4 {
            writer.write(&solid_frame(160, 120, [40, 80, 120], i)).unwrap();
        }
        writer.close().unwrap();

        let mut reader = FfmpegReader::new();
        let meta = reader.open(&path).unwrap();
        assert_eq!((meta.width, meta.height), (160, 120));
        assert_eq!(reader.frames().count(), 4);
    }

    #[test]
    fn test_colours_survive_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.mp4");

        let mut writer = FfmpegWriter::new();
        writer.open(&path, &metadata(64, 64, 30.0)).unwrap();
        // Pure red in BGR
        writer.write(&solid_frame(64, 64, [20, 20, 220], 0)).unwrap();
        writer.close().unwrap();

        let mut reader = FfmpegReader::new();
        reader.open(&path).unwrap();
        let frame = reader.frames().next().unwrap().unwrap();
        let centre = (32 * 64 + 32) * 3;
        let px = &frame.data()[centre..centre + 3];
        assert!(px[2] > 150 && px[0] < 80, "got {px:?}");
    }

    #[test]
    fn test_rgb_frames_are_converted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.mp4");

        let mut writer = FfmpegWriter::new();
        writer.open(&path, &metadata(64, 64, 30.0)).unwrap();
        let frame =
            solid_frame(64, 64, [220, 20, 20], 0).with_pixel_format(PixelFormat::Rgb);
        writer.write(&frame).unwrap();
        writer.close().unwrap();

        let mut reader = FfmpegReader::new();
        reader.open(&path).unwrap();
        let decoded = reader.frames().next().unwrap().unwrap();
        let centre = (32 * 64 + 32) * 3;
        assert!(decoded.data()[centre + 2] > 150);
    }

    #[test]
    fn test_odd_dimensions_are_encoded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odd.mp4");

        let mut writer = FfmpegWriter::new();
        writer.open(&path, &metadata(101, 75, 0.0)).unwrap();
        writer.write(&solid_frame(101, 75, [0, 0, 0], 0)).unwrap();
        writer.close().unwrap();

        let mut reader = FfmpegReader::new();
        let meta = reader.open(&path).unwrap();
        assert_eq!((meta.width, meta.height), (100, 74));
    }

    #[test]
    fn test_mismatched_frame_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = FfmpegWriter::new();
        writer
            .open(&dir.path().join("out.mp4"), &metadata(64, 64, 30.0))
            .unwrap();
        assert!(writer.write(&solid_frame(32, 32, [0, 0, 0], 0)).is_err());
        writer.close().unwrap();
    }

    #[test]
    fn test_write_before_open_fails() {
        let mut writer = FfmpegWriter::new();
        assert!(writer.write(&solid_frame(8, 8, [0, 0, 0], 0)).is_err());
    }

    #[test]
    fn test_close_without_open_is_noop() {
        let mut writer = FfmpegWriter::new();
        assert!(writer.close().is_ok());
        assert!(writer.close().is_ok());
    }

    #[test]
    fn test_output_fps_falls_back_for_cameras() {
        assert_eq!(output_fps(0.0), 30);
        assert_eq!(output_fps(-1.0), 30);
        assert_eq!(output_fps(29.97), 30);
        assert_eq!(output_fps(25.0), 25);
    }

    #[test]
    fn test_even_dimension() {
        assert_eq!(even_dimension(101), 100);
        assert_eq!(even_dimension(100), 100);
        assert_eq!(even_dimension(1), 2);
    }
}
