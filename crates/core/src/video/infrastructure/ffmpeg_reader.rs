use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

/// Decodes a video file or a capture device via ffmpeg-next.
///
/// Every frame is converted to packed BGR24 and, when a target width is set,
/// scaled to that width with the aspect ratio kept.
pub struct FfmpegReader {
    input_format: Option<String>,
    target_width: Option<u32>,
    input_ctx: Option<ffmpeg_next::format::context::Input>,
    video_stream_index: usize,
}

// Safety: FfmpegReader is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegReader {}

impl FfmpegReader {
    /// Reader for container files; the format is probed.
    pub fn new() -> Self {
        Self {
            input_format: None,
            target_width: None,
            input_ctx: None,
            video_stream_index: 0,
        }
    }

    /// Reader for a capture device opened through libavdevice, e.g.
    /// `v4l2` with `/dev/video0`. The source passed to `open` is the device
    /// name understood by that format.
    pub fn camera(input_format: &str) -> Self {
        Self {
            input_format: Some(input_format.to_string()),
            ..Self::new()
        }
    }

    /// Scale frames to `width` pixels wide. `None` or `Some(0)` keeps the
    /// source size.
    pub fn with_target_width(mut self, width: Option<u32>) -> Self {
        self.target_width = width.filter(|&w| w > 0);
        self
    }

    pub fn is_live(&self) -> bool {
        self.input_format.is_some()
    }
}

impl Default for FfmpegReader {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoReader for FfmpegReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let ictx = open_input(path, self.input_format.as_deref())?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;

        let video_stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let (width, height) = target_size(decoder.width(), decoder.height(), self.target_width);
        let is_live = self.is_live();

        let metadata = VideoMetadata {
            width,
            height,
            fps,
            total_frames: if is_live { 0 } else { stream.frames().max(0) as usize },
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
            is_live,
        };

        log::info!(
            "Opened {} {} ({}x{} -> {width}x{height}, {fps:.1} fps)",
            if is_live { "camera" } else { "video" },
            path.display(),
            decoder.width(),
            decoder.height(),
        );

        self.video_stream_index = video_stream_index;
        self.input_ctx = Some(ictx);

        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        let target_width = self.target_width;
        let video_stream_index = self.video_stream_index;
        let Some(ictx) = self.input_ctx.as_mut() else {
            return Box::new(std::iter::once(Err("FfmpegReader: not opened".into())));
        };

        match FfmpegFrameIter::new(ictx, video_stream_index, target_width) {
            Ok(iter) => Box::new(iter),
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }

    fn close(&mut self) {
        self.input_ctx = None;
    }
}

fn open_input(
    path: &Path,
    input_format: Option<&str>,
) -> Result<ffmpeg_next::format::context::Input, Box<dyn std::error::Error>> {
    let Some(name) = input_format else {
        return Ok(ffmpeg_next::format::input(path)?);
    };

    ffmpeg_next::device::register_all();
    let format = ffmpeg_next::device::input::video()
        .find(|f| f.name() == name)
        .ok_or_else(|| format!("capture format '{name}' is not available in this ffmpeg build"))?;

    let ctx = ffmpeg_next::format::open_with(
        path,
        &ffmpeg_next::format::Format::Input(format),
        ffmpeg_next::Dictionary::new(),
    )?;
    match ctx {
        ffmpeg_next::format::context::Context::Input(input) => Ok(input),
        _ => Err(format!("'{}' did not open as an input", path.display()).into()),
    }
}

/// Output size for a source of `width × height` scaled to `target_width`,
/// keeping the aspect ratio. The height is truncated.
fn target_size(width: u32, height: u32, target_width: Option<u32>) -> (u32, u32) {
    match target_width {
        Some(tw) if tw > 0 && tw != width && width > 0 => {
            let th = (height as u64 * tw as u64 / width as u64).max(1) as u32;
            (tw, th)
        }
        _ => (width, height),
    }
}

/// Lazy iterator that decodes one frame at a time.
struct FfmpegFrameIter<'a> {
    ictx: &'a mut ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    video_stream_index: usize,
    frame_index: usize,
    flushing: bool,
    done: bool,
}

impl<'a> FfmpegFrameIter<'a> {
    fn new(
        ictx: &'a mut ffmpeg_next::format::context::Input,
        video_stream_index: usize,
        target_width: Option<u32>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let stream = ictx
            .stream(video_stream_index)
            .ok_or("Video stream disappeared")?;
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let (width, height) = target_size(decoder.width(), decoder.height(), target_width);
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg_next::format::Pixel::BGR24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        Ok(Self {
            ictx,
            decoder,
            scaler,
            width,
            height,
            video_stream_index,
            frame_index: 0,
            flushing: false,
            done: false,
        })
    }

    fn try_receive(&mut self) -> Option<Result<Frame, Box<dyn std::error::Error>>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return None;
        }

        let mut bgr_frame = ffmpeg_next::util::frame::video::Video::empty();
        if let Err(e) = self.scaler.run(&decoded, &mut bgr_frame) {
            return Some(Err(Box::new(e)));
        }

        let pixels = extract_packed_pixels(&bgr_frame, self.width, self.height);
        let frame = Frame::new(pixels, self.width, self.height, 3, self.frame_index);
        self.frame_index += 1;
        Some(Ok(frame))
    }
}

impl Iterator for FfmpegFrameIter<'_> {
    type Item = Result<Frame, Box<dyn std::error::Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if let Some(result) = self.try_receive() {
            return Some(result);
        }

        if self.flushing {
            self.done = true;
            return None;
        }

        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                if let Some(result) = self.try_receive() {
                    return Some(result);
                }
                self.done = true;
                return None;
            };

            if stream.index() != self.video_stream_index {
                continue;
            }

            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }

            if let Some(result) = self.try_receive() {
                return Some(result);
            }
        }
    }
}

/// Copies a packed 3-byte-per-pixel plane, dropping row padding.
fn extract_packed_pixels(
    frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = frame.stride(0);
    let data = frame.data(0);
    let row_len = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_len]);
    }
    pixels
}
