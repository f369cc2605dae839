//! # Media Tools
//!
//! Wrappers around the external encode/decode tools (ffmpeg/ffprobe), which
//! are treated as opaque subprocesses with exit-code success semantics:
//! metadata probing, audio extraction, audio/video muxing, quality-ladder
//! transcodes, NSFW sample-frame extraction, and raw RGB24 frame pipes that
//! plug into the frame pipeline's source/sink seams.

use thiserror::Error;

pub mod command;
mod ffmpeg;
mod probe;
mod rawpipe;

pub use ffmpeg::{extract_audio, mux, sample_frames, transcode_scale};
pub use probe::{MediaInfo, probe};
pub use rawpipe::{RawFrameDecoder, RawFrameEncoder};

/// Errors from external tool invocations.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: &'static str,
        status: String,
        stderr: String,
    },

    #[error("could not read media metadata: {reason}")]
    Probe { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
