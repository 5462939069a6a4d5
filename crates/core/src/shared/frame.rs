use ndarray::ArrayView3;

/// A decoded image: contiguous RGB bytes in row-major order.
///
/// Format conversion happens at I/O boundaries only; the pipeline
/// treats pixel data as opaque and hands it to the detection and
/// embedding capabilities unchanged.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8) -> Self {
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
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
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

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Extracts the `[x1, x2) × [y1, y2)` sub-image as a new frame.
    ///
    /// Coordinates must already be clamped to frame bounds.
    pub fn crop(&self, x1: usize, y1: usize, x2: usize, y2: usize) -> Frame {
        let channels = self.channels as usize;
        let crop_w = x2 - x1;
        let crop_h = y2 - y1;

        let src = self.as_ndarray();
        let mut data = Vec::with_capacity(crop_w * crop_h * channels);

        for row in y1..y2 {
            for col in x1..x2 {
                for c in 0..channels {
                    data.push(src[[row, col, c]]);
                }
            }
        }

        Frame::new(data, crop_w as u32, crop_h as u32, self.channels)
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
