//! Per-job stage sequencing.
//!
//! One job runs fetch → audio extraction → probe → NSFW screen →
//! transcription → ladder → frame pipeline for the upscaled rung → one
//! transcode per lower rung → publish. The order is fixed; every stage works
//! inside a per-job temp directory and nothing reaches storage until the
//! whole job has succeeded.

use std::path::PathBuf;
use std::sync::Arc;

use frame_pipeline::{FramePipeline, Upscaler};
use job_queue::{JobHandle, JobId, JobRunner, JobStage};
use media_tools::{RawFrameDecoder, RawFrameEncoder};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::collaborators::{
    FrameClassifier, SpeechSynthesizer, Storage, Transcriber, TranscriptSegment, Translator,
};
use crate::{ProcessError, ProcessorConfig, ladder, nsfw, subtitles};

/// What a submission carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoJobSpec {
    /// Storage key of the uploaded source video.
    pub source_key: String,
    /// Storage folder that receives every artifact of this job.
    pub output_folder: String,
}

/// The external seams one processor instance works against. All handles are
/// shared across workers, so each backend must tolerate concurrent calls or
/// serialize internally.
#[derive(Clone)]
pub struct Collaborators {
    pub storage: Arc<dyn Storage>,
    pub transcriber: Arc<dyn Transcriber>,
    pub translator: Arc<dyn Translator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub classifier: Arc<dyn FrameClassifier>,
    pub upscaler: Arc<dyn Upscaler>,
}

/// Machine-readable job summary published next to the media artifacts.
#[derive(Debug, Serialize)]
struct Manifest {
    job_id: String,
    source_key: String,
    width: u32,
    height: u32,
    fps: f64,
    duration_secs: f64,
    language: Option<String>,
    qualities: Vec<u32>,
    artifacts: Vec<String>,
    frames_in: u64,
    frames_inferred: u64,
    frames_reused: u64,
}

/// Runs whole video jobs. Plug into a `JobQueue` and share across workers.
pub struct VideoProcessor {
    config: ProcessorConfig,
    collab: Collaborators,
}

impl VideoProcessor {
    pub fn new(config: ProcessorConfig, collab: Collaborators) -> Self {
        Self { config, collab }
    }

    async fn process(
        &self,
        id: JobId,
        spec: &VideoJobSpec,
        handle: &JobHandle,
    ) -> Result<String, ProcessError> {
        let storage = &self.collab.storage;
        if !storage
            .exists(&spec.source_key)
            .await
            .map_err(|source| ProcessError::Collaborator {
                name: "storage",
                source,
            })?
        {
            return Err(ProcessError::Input {
                reason: format!("source {} not found in storage", spec.source_key),
            });
        }

        // Everything below works inside this directory; it is dropped whole
        // on any failure, so failed jobs publish nothing.
        let workdir = tempfile::tempdir()?;
        let work = workdir.path();

        let source = work.join("source.mp4");
        let bytes = storage
            .get(&spec.source_key)
            .await
            .map_err(|source| ProcessError::Collaborator {
                name: "storage",
                source,
            })?;
        tokio::fs::write(&source, bytes).await?;

        handle.advance(JobStage::ExtractingAudio);
        let audio = media_tools::extract_audio(&source, &work.join("audio.mp3")).await?;

        // probe rejects sources without a usable video stream.
        let info = media_tools::probe(&source).await?;
        info!(
            %id,
            width = info.width,
            height = info.height,
            fps = info.fps,
            duration = info.duration_secs,
            "source probed"
        );

        handle.advance(JobStage::ScreeningNsfw);
        let flagged = nsfw::screen(
            &source,
            work,
            info.duration_secs,
            Arc::clone(&self.collab.classifier),
            &self.config.nsfw,
        )
        .await?;
        if flagged {
            return Err(ProcessError::Input {
                reason: "source flagged by content screening".into(),
            });
        }

        handle.advance(JobStage::Transcribing);
        let mut artifacts: Vec<PathBuf> = Vec::new();
        let mut language = None;
        if let Some(audio_path) = &audio {
            artifacts.push(audio_path.clone());
            let transcript = self
                .collab
                .transcriber
                .transcribe(audio_path)
                .await
                .map_err(|source| ProcessError::Collaborator {
                    name: "transcriber",
                    source,
                })?;

            let native = work.join(format!("subtitles_{}.vtt", transcript.language));
            tokio::fs::write(&native, subtitles::to_vtt(&transcript.segments)).await?;
            artifacts.push(native);

            if transcript.language != "en" {
                let translated = self
                    .translate_segments(&transcript.segments, &transcript.language)
                    .await?;
                let en = work.join("subtitles_en.vtt");
                tokio::fs::write(&en, subtitles::to_vtt(&translated)).await?;
                artifacts.push(en);

                let text: Vec<&str> = translated.iter().map(|s| s.text.as_str()).collect();
                let dub = self
                    .collab
                    .synthesizer
                    .synthesize(&text.join(" "), audio_path, "en")
                    .await
                    .map_err(|source| ProcessError::Collaborator {
                        name: "synthesizer",
                        source,
                    })?;
                let dub_path = work.join("dub_en.mp3");
                tokio::fs::write(&dub_path, dub).await?;
                artifacts.push(dub_path);
            }
            language = Some(transcript.language);
        }

        let rungs = ladder::ladder(info.height);
        let scale = self.collab.upscaler.scale_factor();
        let up_w = info.width * scale;
        let up_h = info.height * scale;

        handle.advance(JobStage::Upscaling);
        let raw_upscaled = work.join("upscaled_raw.mp4");
        let decoder = RawFrameDecoder::open(&source, info.width, info.height)?;
        let encoder = RawFrameEncoder::create(&raw_upscaled, up_w, up_h, info.fps)?;
        let stats = FramePipeline::new(self.config.pipeline.clone())
            .run(
                Box::new(decoder),
                Box::new(encoder),
                Arc::clone(&self.collab.upscaler),
            )
            .await?;

        let top = work.join(format!("{up_h}p.mp4"));
        media_tools::mux(&raw_upscaled, audio.as_deref(), &top, ladder::crf_for(up_h)).await?;
        artifacts.push(top.clone());

        handle.advance(JobStage::Transcoding);
        for &rung in rungs.iter().filter(|&&r| r < up_h) {
            let dst = work.join(format!("{rung}p.mp4"));
            media_tools::transcode_scale(&top, &dst, rung, ladder::crf_for(rung)).await?;
            artifacts.push(dst);
        }

        let manifest = Manifest {
            job_id: id.to_string(),
            source_key: spec.source_key.clone(),
            width: info.width,
            height: info.height,
            fps: info.fps,
            duration_secs: info.duration_secs,
            language,
            qualities: rungs,
            artifacts: artifacts
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .collect(),
            frames_in: stats.frames_in,
            frames_inferred: stats.inferred,
            frames_reused: stats.reused,
        };
        let manifest_path = work.join("manifest.json");
        let json = serde_json::to_vec_pretty(&manifest).map_err(std::io::Error::other)?;
        tokio::fs::write(&manifest_path, json).await?;
        artifacts.push(manifest_path);

        for artifact in &artifacts {
            storage
                .put(&spec.output_folder, artifact)
                .await
                .map_err(|source| ProcessError::Collaborator {
                    name: "storage",
                    source,
                })?;
        }
        info!(%id, folder = %spec.output_folder, count = artifacts.len(), "artifacts published");

        Ok(spec.output_folder.clone())
    }

    async fn translate_segments(
        &self,
        segments: &[TranscriptSegment],
        from_lang: &str,
    ) -> Result<Vec<TranscriptSegment>, ProcessError> {
        let mut out = Vec::with_capacity(segments.len());
        for seg in segments {
            let text = self
                .collab
                .translator
                .translate(&seg.text, from_lang, "en")
                .await
                .map_err(|source| ProcessError::Collaborator {
                    name: "translator",
                    source,
                })?;
            out.push(TranscriptSegment {
                start_secs: seg.start_secs,
                end_secs: seg.end_secs,
                text,
            });
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl JobRunner for VideoProcessor {
    type Spec = VideoJobSpec;

    async fn run(
        &self,
        id: JobId,
        spec: &VideoJobSpec,
        handle: &JobHandle,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        self.process(id, spec, handle).await.map_err(Into::into)
    }
}
