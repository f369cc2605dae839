//! Raw frame and frame-batch types.

use bytes::Bytes;

use crate::PipelineError;

/// A single decoded video frame in packed RGB24 layout.
///
/// `data` holds `width * height * 3` bytes, rows top to bottom. Frames are
/// cheap to clone: the pixel payload is a reference-counted [`Bytes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Bytes,
}

impl Frame {
    /// Number of interleaved channels per pixel.
    pub const CHANNELS: usize = 3;

    /// Byte length of one RGB24 frame of the given dimensions.
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * Self::CHANNELS
    }

    /// Wrap an RGB24 pixel buffer, validating its length against the
    /// dimensions.
    pub fn from_rgb24(width: u32, height: u32, data: Bytes) -> Result<Self, PipelineError> {
        let expected = Self::byte_len(width, height);
        if data.len() != expected {
            return Err(PipelineError::InvalidFrame {
                reason: format!(
                    "{}x{} frame needs {} bytes, got {}",
                    width,
                    height,
                    expected,
                    data.len()
                ),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// An ordered run of frames moving through the pipeline as one unit.
///
/// Batches have a fixed capacity; the final batch of a stream may be partial.
/// Ownership transfers stage to stage, there is no shared mutation.
#[derive(Debug, Clone)]
pub struct FrameBatch {
    frames: Vec<Frame>,
}

impl FrameBatch {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            frames: Vec::with_capacity(capacity),
        }
    }

    pub fn from_frames(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }
}
