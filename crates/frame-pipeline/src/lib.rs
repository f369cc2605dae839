//! # Frame Pipeline
//!
//! This crate provides the media-frame processing pipeline used for video
//! super-resolution: a three-stage producer/consumer pipeline (decode/batch →
//! infer → encode/write) connected by bounded channels, with a single-slot
//! perceptual-hash cache that skips inference for hash-identical consecutive
//! frames.
//!
//! ## Guarantees
//!
//! - Output frame count equals input frame count, in input order.
//! - Peak buffered memory is bounded by `queue_capacity × batch_size` frames;
//!   a stalled downstream stage backpressures upstream stages via queue-full
//!   blocking.
//! - Any stage failure aborts the whole run and surfaces a single error.

use thiserror::Error;

mod dedup;
mod frame;
mod pipeline;
mod tensor;

pub use dedup::{BatchPlan, DedupCache, FrameHash};
pub use frame::{Frame, FrameBatch};
pub use pipeline::{FramePipeline, PipelineConfig, PipelineStats};
pub use tensor::{FrameTensor, postprocess_batch, preprocess_batch};

/// Common error type for pipeline operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("invalid frame: {reason}")]
    InvalidFrame { reason: String },

    #[error("inference failed: {source}")]
    Inference {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("stage {stage} failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// A source of decoded frames, read in presentation order.
///
/// Implementations are synchronous; the pipeline drives them from a blocking
/// task, so reads may block.
pub trait FrameSource: Send {
    /// Read the next frame, or `Ok(None)` once the source is exhausted.
    fn read_frame(&mut self) -> Result<Option<Frame>, PipelineError>;
}

/// A destination for processed frames, written in presentation order.
pub trait FrameSink: Send {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), PipelineError>;

    /// Flush and close the destination. Called exactly once, after the last
    /// frame, on the clean-shutdown path only.
    fn finish(&mut self) -> Result<(), PipelineError>;
}

/// The super-resolution inference collaborator.
///
/// `infer` is synchronous and must be safe for concurrent invocation (or the
/// implementation must serialize internally); one handle may be shared across
/// concurrent pipeline runs.
pub trait Upscaler: Send + Sync {
    /// Spatial scale factor applied to both dimensions (e.g. 2 for x2 models).
    fn scale_factor(&self) -> u32;

    /// Run inference on a normalized NHWC batch, returning a batch with the
    /// same `n` and dimensions multiplied by [`Self::scale_factor`].
    fn infer(
        &self,
        input: FrameTensor,
    ) -> Result<FrameTensor, Box<dyn std::error::Error + Send + Sync>>;
}
