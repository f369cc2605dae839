//! Trait seams for everything the orchestrator does not own: the artifact
//! store and the ML models. Production deployments plug in real backends;
//! tests and local runs use in-process fakes.
//!
//! Inference for super-resolution is a separate seam, `frame_pipeline::Upscaler`,
//! because it runs inside the blocking pipeline stages rather than on the
//! async orchestrator path.

use std::path::Path;

/// Errors cross the seam type-erased; the orchestrator only attributes and
/// reports them, it never matches on them.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The artifact store. Keys are `folder/name` paths.
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>, BoxError>;

    /// Upload `local_path` under `folder`, keeping its file name.
    async fn put(&self, folder: &str, local_path: &Path) -> Result<(), BoxError>;

    async fn exists(&self, key: &str) -> Result<bool, BoxError>;
}

/// One time-aligned piece of recognized speech.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    pub start_secs: f64,
    pub end_secs: f64,
    pub text: String,
}

/// Speech recognition output for a whole audio track.
#[derive(Debug, Clone)]
pub struct Transcript {
    /// ISO 639-1 code detected by the model ("en", "ja", ...).
    pub language: String,
    pub segments: Vec<TranscriptSegment>,
}

#[async_trait::async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> Result<Transcript, BoxError>;
}

#[async_trait::async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, from_lang: &str, to_lang: &str)
    -> Result<String, BoxError>;
}

/// Voice cloning for the dub track: speak `text` in `lang` with the voice
/// heard in `reference_audio`. Returns encoded audio bytes.
#[async_trait::async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        reference_audio: &Path,
        lang: &str,
    ) -> Result<Vec<u8>, BoxError>;
}

/// Content-screening label for one sampled frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageLabel {
    Safe,
    Explicit,
}

/// Image classifier for screening. Synchronous: callers dispatch it to a
/// blocking thread alongside the frame decoding it screens.
pub trait FrameClassifier: Send + Sync {
    fn classify(&self, image: &[u8]) -> Result<ImageLabel, BoxError>;
}
