/// ResNet-10 SSD face detector (300×300 input), exported to ONNX.
pub const FACE_MODEL_NAME: &str = "res10_300x300_ssd.onnx";

/// MobileNetV2-based three-class mask classifier, exported to ONNX.
pub const MASK_MODEL_NAME: &str = "mask_classifier.onnx";

/// Directory searched for models shipped alongside the binary.
pub const BUNDLED_MODEL_DIR: &str = "models";

/// Frames are resized to this width before processing (0 disables resizing).
pub const DEFAULT_FRAME_WIDTH: u32 = 400;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

#[cfg(target_os = "linux")]
pub const DEFAULT_CAMERA_FORMAT: &str = "v4l2";
#[cfg(target_os = "linux")]
pub const DEFAULT_CAMERA_DEVICE: &str = "/dev/video0";

#[cfg(target_os = "macos")]
pub const DEFAULT_CAMERA_FORMAT: &str = "avfoundation";
#[cfg(target_os = "macos")]
pub const DEFAULT_CAMERA_DEVICE: &str = "0";

#[cfg(target_os = "windows")]
pub const DEFAULT_CAMERA_FORMAT: &str = "dshow";
#[cfg(target_os = "windows")]
pub const DEFAULT_CAMERA_DEVICE: &str = "video=Integrated Camera";

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub const DEFAULT_CAMERA_FORMAT: &str = "v4l2";
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub const DEFAULT_CAMERA_DEVICE: &str = "/dev/video0";
