//! Conversion between RGB24 frames and normalized float batches.
//!
//! The super-resolution collaborator consumes `N x H x W x C` f32 tensors with
//! values in `[0, 1]` and produces the same layout at the upscaled
//! dimensions.

use bytes::Bytes;

use crate::{Frame, PipelineError};

/// A dense NHWC f32 batch.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameTensor {
    pub data: Vec<f32>,
    pub n: usize,
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl FrameTensor {
    pub fn len(&self) -> usize {
        self.n * self.height * self.width * self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Normalize a batch of equally-sized frames to `[0, 1]` floats.
///
/// All frames must share the dimensions of the first; the pipeline feeds one
/// source, so a mismatch means the decoder misbehaved.
pub fn preprocess_batch(frames: &[Frame]) -> Result<FrameTensor, PipelineError> {
    let Some(first) = frames.first() else {
        return Err(PipelineError::InvalidFrame {
            reason: "cannot preprocess an empty batch".into(),
        });
    };
    let (width, height) = (first.width(), first.height());

    let mut data = Vec::with_capacity(frames.len() * Frame::byte_len(width, height));
    for frame in frames {
        if frame.width() != width || frame.height() != height {
            return Err(PipelineError::InvalidFrame {
                reason: format!(
                    "mixed frame sizes in batch: {}x{} vs {}x{}",
                    frame.width(),
                    frame.height(),
                    width,
                    height
                ),
            });
        }
        data.extend(frame.data().iter().map(|&b| f32::from(b) / 255.0));
    }

    Ok(FrameTensor {
        data,
        n: frames.len(),
        height: height as usize,
        width: width as usize,
        channels: Frame::CHANNELS,
    })
}

/// Convert an inferred tensor back to RGB24 frames, rounding and clamping to
/// the byte range.
pub fn postprocess_batch(tensor: FrameTensor) -> Result<Vec<Frame>, PipelineError> {
    if tensor.channels != Frame::CHANNELS {
        return Err(PipelineError::InvalidFrame {
            reason: format!("expected {} channels, got {}", Frame::CHANNELS, tensor.channels),
        });
    }
    if tensor.data.len() != tensor.len() {
        return Err(PipelineError::InvalidFrame {
            reason: format!(
                "tensor data length {} does not match {}x{}x{}x{}",
                tensor.data.len(),
                tensor.n,
                tensor.height,
                tensor.width,
                tensor.channels
            ),
        });
    }

    let frame_len = tensor.height * tensor.width * tensor.channels;
    let mut frames = Vec::with_capacity(tensor.n);
    for chunk in tensor.data.chunks_exact(frame_len) {
        let bytes: Vec<u8> = chunk
            .iter()
            .map(|&v| (v * 255.0).round().clamp(0.0, 255.0) as u8)
            .collect();
        frames.push(Frame::from_rgb24(
            tensor.width as u32,
            tensor.height as u32,
            Bytes::from(bytes),
        )?);
    }
    Ok(frames)
}
