use ndarray::ArrayView2;

/// A decoded still image: contiguous pixel bytes in row-major order.
///
/// Decoding happens at the storage boundary; detection only ever sees
/// frames, never files.
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

    /// Single-channel intensity copy of this frame.
    ///
    /// Uses the ITU-R BT.601 luma weights in 14-bit fixed point, which is
    /// what Haar cascades were trained against. A fourth (alpha) channel is
    /// ignored; single-channel frames are returned unchanged.
    pub fn to_intensity(&self) -> Frame {
        match self.channels {
            1 => self.clone(),
            3 | 4 => {
                let step = self.channels as usize;
                let data = self
                    .data
                    .chunks_exact(step)
                    .map(|px| {
                        let (r, g, b) = (px[0] as u32, px[1] as u32, px[2] as u32);
                        ((r * 4899 + g * 9617 + b * 1868 + (1 << 13)) >> 14) as u8
                    })
                    .collect();
                Frame::new(data, self.width, self.height, 1)
            }
            n => {
                // Unknown layouts: average every channel.
                let step = n.max(1) as usize;
                let data = self
                    .data
                    .chunks_exact(step)
                    .map(|px| (px.iter().map(|&v| v as u32).sum::<u32>() / step as u32) as u8)
                    .collect();
                Frame::new(data, self.width, self.height, 1)
            }
        }
    }

    /// `(height, width)` view of a single-channel frame.
    pub fn as_gray_ndarray(&self) -> ArrayView2<'_, u8> {
        debug_assert_eq!(self.channels, 1, "gray view requires a single channel");
        ArrayView2::from_shape((self.height as usize, self.width as usize), &self.data)
            .expect("Frame data length must match dimensions")
    }
}
