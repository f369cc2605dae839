//! # Video Processor
//!
//! Orchestrates one video job end to end: fetch, audio extraction, metadata
//! probe, NSFW screening, transcription, the super-resolution frame pipeline
//! for the top quality rung, ladder transcodes for the lower rungs, and
//! artifact publication.
//!
//! Every ML model and the object store sit behind the collaborator traits in
//! [`collaborators`]; this crate owns sequencing and policy, not inference.

use thiserror::Error;

pub mod collaborators;
pub mod ladder;
pub mod nsfw;
pub mod subtitles;

mod config;
mod orchestrator;

pub use config::ProcessorConfig;
pub use orchestrator::{Collaborators, VideoJobSpec, VideoProcessor};

use frame_pipeline::PipelineError;
use media_tools::ToolError;

/// Why a job failed. One value per job; workers record its message and move
/// on, nothing is retried automatically.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The source media is unreadable or unsupported.
    #[error("invalid input: {reason}")]
    Input { reason: String },

    /// An external model call failed.
    #[error("{name} collaborator failed: {source}")]
    Collaborator {
        name: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The encode/decode tool exited abnormally.
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
