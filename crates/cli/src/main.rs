use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, ValueEnum};

use maskwatch_core::classification::domain::mask_classifier::MaskClassifier;
use maskwatch_core::classification::infrastructure::onnx_mask_classifier::{
    InputScaling, OnnxMaskClassifier, DEFAULT_BATCH_SIZE,
};
use maskwatch_core::detection::domain::face_locator::FaceLocator;
use maskwatch_core::detection::infrastructure::onnx_ssd_face_locator::OnnxSsdFaceLocator;
use maskwatch_core::pipeline::annotate_image_use_case::AnnotateImageUseCase;
use maskwatch_core::pipeline::annotate_stream_use_case::{AnnotateStreamUseCase, FrameErrorPolicy};
use maskwatch_core::pipeline::infrastructure::threaded_frame_source::{
    FrameDropPolicy, ThreadedFrameSource,
};
use maskwatch_core::pipeline::mask_pipeline::{MaskPipeline, PipelineConfig};
use maskwatch_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use maskwatch_core::rendering::infrastructure::box_annotator::BoxAnnotator;
use maskwatch_core::shared::constants::{
    BUNDLED_MODEL_DIR, DEFAULT_CAMERA_DEVICE, DEFAULT_CAMERA_FORMAT, DEFAULT_FRAME_WIDTH,
    FACE_MODEL_NAME, IMAGE_EXTENSIONS, MASK_MODEL_NAME,
};
use maskwatch_core::shared::model_resolver;
use maskwatch_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use maskwatch_core::video::infrastructure::ffmpeg_writer::FfmpegWriter;
use maskwatch_core::video::infrastructure::image_file_reader::ImageFileReader;
use maskwatch_core::video::infrastructure::image_file_writer::ImageFileWriter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OnError {
    /// Write the frame without overlay and continue.
    Skip,
    /// Stop at the first failing frame.
    Halt,
}

/// Face-mask detection for a camera, a video file, or a still image.
#[derive(Parser, Debug)]
#[command(name = "maskwatch")]
struct Cli {
    /// Input video or image file. Reads from the camera when omitted.
    input: Option<PathBuf>,

    /// Write the annotated video or image here.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Capture device, e.g. /dev/video0 (used when no input file is given).
    #[arg(long)]
    camera: Option<String>,

    /// libavdevice input format for the camera.
    #[arg(long, default_value = DEFAULT_CAMERA_FORMAT)]
    camera_format: String,

    /// Face detector ONNX model (default: cache, then ./models).
    #[arg(long)]
    face_model: Option<PathBuf>,

    /// Mask classifier ONNX model (default: cache, then ./models).
    #[arg(long)]
    mask_model: Option<PathBuf>,

    /// Download the face detector from here if it is not found locally.
    #[arg(long)]
    face_model_url: Option<String>,

    /// Download the mask classifier from here if it is not found locally.
    #[arg(long)]
    mask_model_url: Option<String>,

    /// Faces must score above this detection confidence (0.0-1.0).
    #[arg(long, default_value = "0.5")]
    confidence: f32,

    /// Resize frames to this width before processing (0 keeps the source size).
    #[arg(long, default_value_t = DEFAULT_FRAME_WIDTH)]
    width: u32,

    /// Faces per classifier inference call.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Scale classifier input to [-1, 1] instead of passing raw 0-255 pixels.
    #[arg(long)]
    mobilenet_scaling: bool,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<usize>,

    /// What to do when a frame fails detection or classification.
    #[arg(long, value_enum, default_value = "skip")]
    on_error: OnError,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let pipeline = MaskPipeline::new(PipelineConfig {
        confidence_threshold: cli.confidence,
        ..PipelineConfig::default()
    })?;
    let locator = build_locator(&cli)?;
    let classifier = build_classifier(&cli)?;

    match cli.input.as_deref() {
        Some(input) if is_image(input) => run_image(&cli, input, pipeline, locator, classifier),
        Some(input) => run_stream(
            &cli,
            input,
            FfmpegReader::new(),
            FrameDropPolicy::Block,
            pipeline,
            locator,
            classifier,
        ),
        None => {
            let device = cli.camera.as_deref().unwrap_or(DEFAULT_CAMERA_DEVICE);
            log::info!("Starting camera {device} ({})", cli.camera_format);
            run_stream(
                &cli,
                Path::new(device),
                FfmpegReader::camera(&cli.camera_format),
                FrameDropPolicy::KeepLatest,
                pipeline,
                locator,
                classifier,
            )
        }
    }
}

fn run_image(
    cli: &Cli,
    input: &Path,
    pipeline: MaskPipeline,
    locator: Box<dyn FaceLocator>,
    classifier: Box<dyn MaskClassifier>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut use_case = AnnotateImageUseCase::new(
        Box::new(ImageFileReader::new().with_target_width(Some(cli.width))),
        Box::new(ImageFileWriter::new()),
        locator,
        classifier,
        Box::new(BoxAnnotator::with_defaults()?),
        pipeline,
    );
    let predictions = use_case.execute(input, cli.output.as_deref())?;
    log::info!("{} faces classified in {}", predictions.len(), input.display());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_stream(
    cli: &Cli,
    source: &Path,
    reader: FfmpegReader,
    drop_policy: FrameDropPolicy,
    pipeline: MaskPipeline,
    locator: Box<dyn FaceLocator>,
    classifier: Box<dyn MaskClassifier>,
) -> Result<(), Box<dyn std::error::Error>> {
    let reader = reader.with_target_width(Some(cli.width));
    let source_reader = ThreadedFrameSource::new(Box::new(reader), drop_policy);

    let mut use_case = AnnotateStreamUseCase::new(
        Box::new(source_reader),
        locator,
        classifier,
        Box::new(BoxAnnotator::with_defaults()?),
        pipeline,
    )
    .with_logger(Box::new(StdoutPipelineLogger::default()))
    .with_error_policy(match cli.on_error {
        OnError::Skip => FrameErrorPolicy::Skip,
        OnError::Halt => FrameErrorPolicy::Halt,
    })
    .with_max_frames(cli.max_frames);

    if let Some(output) = cli.output.as_deref() {
        use_case = use_case.with_output(Box::new(FfmpegWriter::new()), output);
    }

    use_case.execute(source)?;
    if let Some(output) = cli.output.as_deref() {
        log::info!("Output written to {}", output.display());
    }
    Ok(())
}

fn build_locator(cli: &Cli) -> Result<Box<dyn FaceLocator>, Box<dyn std::error::Error>> {
    let path = resolve_model(
        cli.face_model.as_deref(),
        FACE_MODEL_NAME,
        cli.face_model_url.as_deref(),
    )?;
    Ok(Box::new(OnnxSsdFaceLocator::new(&path)?))
}

fn build_classifier(cli: &Cli) -> Result<Box<dyn MaskClassifier>, Box<dyn std::error::Error>> {
    let path = resolve_model(
        cli.mask_model.as_deref(),
        MASK_MODEL_NAME,
        cli.mask_model_url.as_deref(),
    )?;
    let scaling = if cli.mobilenet_scaling {
        InputScaling::MobileNetV2
    } else {
        InputScaling::Raw
    };
    Ok(Box::new(OnnxMaskClassifier::new(
        &path,
        cli.batch_size,
        scaling,
    )?))
}

fn resolve_model(
    explicit: Option<&Path>,
    name: &str,
    url: Option<&str>,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(format!("Model file not found: {}", path.display()).into());
        }
        return Ok(path.to_path_buf());
    }

    log::info!("Resolving model: {name}");
    let label = name.to_string();
    let path = model_resolver::resolve(
        name,
        url,
        Some(Path::new(BUNDLED_MODEL_DIR)),
        Some(Box::new(move |done, total| download_progress(&label, done, total))),
    )?;
    Ok(path)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(input) = &cli.input {
        if !input.exists() {
            return Err(format!("Input file not found: {}", input.display()).into());
        }
        if cli.camera.is_some() {
            return Err("Give either an input file or --camera, not both".into());
        }
    }
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    if cli.batch_size == 0 {
        return Err("Batch size must be at least 1".into());
    }
    if cli.max_frames == Some(0) {
        return Err("--max-frames must be at least 1".into());
    }
    if let Some(output) = &cli.output {
        // A camera produces a stream, so it needs a video output like a video input does
        let image_input = cli.input.as_deref().is_some_and(is_image);
        if image_input != is_image(output) {
            return Err(format!(
                "Output {} must be {} like the input",
                output.display(),
                if image_input { "an image" } else { "a video" }
            )
            .into());
        }
    }
    for path in [&cli.face_model, &cli.mask_model].into_iter().flatten() {
        if path.is_dir() {
            return Err(format!("Model path is a directory: {}", path.display()).into());
        }
    }
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn download_progress(name: &str, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {name}... {pct}%");
    } else {
        eprint!("\rDownloading {name}... {downloaded} bytes");
    }
    if total > 0 && downloaded >= total {
        eprintln!();
    }
}
