use ndarray::{ArrayView3, ArrayViewMut3};

/// Channel order of a 3-channel frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PixelFormat {
    /// Capture order; the face detector is trained on BGR input.
    #[default]
    Bgr,
    Rgb,
}

/// A single video/image frame: contiguous 8-bit pixels in row-major order.
///
/// Readers deliver frames in [`PixelFormat::Bgr`]; conversion to RGB
/// happens only where a consumer requires it (classifier crops, encoders).
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
    pixel_format: PixelFormat,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
            pixel_format: PixelFormat::Bgr,
        }
    }

    pub fn with_pixel_format(mut self, pixel_format: PixelFormat) -> Self {
        self.pixel_format = pixel_format;
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// True when the frame has no pixels or its buffer disagrees with its
    /// declared dimensions.
    pub fn is_empty(&self) -> bool {
        self.width == 0
            || self.height == 0
            || self.channels == 0
            || self.data.len()
                != (self.width as usize) * (self.height as usize) * (self.channels as usize)
    }

    /// Returns a copy with the first and third channel swapped if the
    /// requested format differs from the current one.
    pub fn to_pixel_format(&self, pixel_format: PixelFormat) -> Frame {
        if pixel_format == self.pixel_format || self.channels < 3 {
            return self.clone().with_pixel_format(pixel_format);
        }
        let mut data = self.data.clone();
        for px in data.chunks_exact_mut(self.channels as usize) {
            px.swap(0, 2);
        }
        Frame {
            data,
            width: self.width,
            height: self.height,
            channels: self.channels,
            index: self.index,
            pixel_format,
        }
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        ArrayViewMut3::from_shape(self.shape(), &mut self.data)
            .expect("Frame data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
