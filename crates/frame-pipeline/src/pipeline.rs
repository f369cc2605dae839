//! Three-stage bounded-channel frame pipeline.
//!
//! Decode/Batch → Infer → Encode/Write, one blocking task per stage, joined
//! by two bounded mpsc channels. An explicit [`StageMessage::End`] sentinel is
//! propagated stage to stage exactly once on the clean path; a channel that
//! closes *without* the sentinel means the peer stage aborted, and the run
//! surfaces that stage's error instead.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{
    DedupCache, Frame, FrameBatch, FrameHash, FrameSink, FrameSource, PipelineError, Upscaler,
    postprocess_batch, preprocess_batch,
};

/// Tuning knobs for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Frames per batch (B). The final batch may be partial.
    pub batch_size: usize,
    /// Capacity (Q) of each inter-stage queue, in batches. Peak buffered
    /// memory is O(Q x B) frames.
    pub queue_capacity: usize,
    /// Dedup hash stride is `upscaler.scale_factor() * hash_stride_factor`.
    pub hash_stride_factor: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 4,
            queue_capacity: 8,
            hash_stride_factor: 10,
        }
    }
}

/// Counters reported by a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames_in: u64,
    pub frames_out: u64,
    pub inferred: u64,
    pub reused: u64,
}

enum StageMessage {
    Batch(FrameBatch),
    End,
}

/// The media frame pipeline. One instance per job run; queues and the dedup
/// cache are exclusive to the run and discarded with it.
pub struct FramePipeline {
    config: PipelineConfig,
}

impl FramePipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let config = PipelineConfig {
            batch_size: config.batch_size.max(1),
            queue_capacity: config.queue_capacity.max(1),
            hash_stride_factor: config.hash_stride_factor.max(1),
        };
        Self { config }
    }

    /// Stream every frame of `source` through `upscaler` into `sink`.
    ///
    /// Returns once all three stages have finished. On any stage failure the
    /// remaining stages unwind via channel closure and the first causal error
    /// is returned; whatever the sink received is the caller's to discard.
    pub async fn run(
        &self,
        source: Box<dyn FrameSource>,
        sink: Box<dyn FrameSink>,
        upscaler: Arc<dyn Upscaler>,
    ) -> Result<PipelineStats, PipelineError> {
        let (decode_tx, infer_rx) = mpsc::channel::<StageMessage>(self.config.queue_capacity);
        let (infer_tx, encode_rx) = mpsc::channel::<StageMessage>(self.config.queue_capacity);

        let batch_size = self.config.batch_size;
        let hash_stride = upscaler.scale_factor() as usize * self.config.hash_stride_factor;

        let decode = tokio::task::spawn_blocking(move || decode_stage(source, decode_tx, batch_size));
        let infer =
            tokio::task::spawn_blocking(move || infer_stage(infer_rx, infer_tx, upscaler, hash_stride));
        let encode = tokio::task::spawn_blocking(move || encode_stage(encode_rx, sink));

        let decode_res = flatten_join(decode.await, "decode");
        let infer_res = flatten_join(infer.await, "infer");
        let encode_res = flatten_join(encode.await, "encode");

        // A stage that observes its peer's channel closing reports
        // ChannelClosed; the stage that actually failed carries the causal
        // error. Prefer the causal one.
        let mut causal: Option<PipelineError> = None;
        let mut unwound: Option<PipelineError> = None;
        let mut stats = PipelineStats::default();

        match decode_res {
            Ok(n) => stats.frames_in = n,
            Err(e) => sort_error(e, &mut causal, &mut unwound),
        }
        match infer_res {
            Ok((inferred, reused)) => {
                stats.inferred = inferred;
                stats.reused = reused;
            }
            Err(e) => sort_error(e, &mut causal, &mut unwound),
        }
        match encode_res {
            Ok(n) => stats.frames_out = n,
            Err(e) => sort_error(e, &mut causal, &mut unwound),
        }

        if let Some(e) = causal.or(unwound) {
            return Err(e);
        }

        if stats.frames_out != stats.frames_in {
            return Err(PipelineError::InvalidFrame {
                reason: format!(
                    "frame count mismatch: {} in, {} out",
                    stats.frames_in, stats.frames_out
                ),
            });
        }

        info!(
            frames = stats.frames_in,
            inferred = stats.inferred,
            reused = stats.reused,
            "frame pipeline finished"
        );
        Ok(stats)
    }
}

fn flatten_join<T>(
    joined: Result<Result<T, PipelineError>, tokio::task::JoinError>,
    stage: &'static str,
) -> Result<T, PipelineError> {
    match joined {
        Ok(res) => res,
        Err(e) => Err(PipelineError::Stage {
            stage,
            source: Box::new(std::io::Error::other(e.to_string())),
        }),
    }
}

fn sort_error(e: PipelineError, causal: &mut Option<PipelineError>, unwound: &mut Option<PipelineError>) {
    let slot = match e {
        PipelineError::ChannelClosed(_) => unwound,
        _ => causal,
    };
    if slot.is_none() {
        *slot = Some(e);
    }
}

fn decode_stage(
    mut source: Box<dyn FrameSource>,
    tx: mpsc::Sender<StageMessage>,
    batch_size: usize,
) -> Result<u64, PipelineError> {
    let mut frames_read = 0u64;
    let mut batch = FrameBatch::with_capacity(batch_size);

    while let Some(frame) = source.read_frame()? {
        frames_read += 1;
        batch.push(frame);
        if batch.len() == batch_size {
            let full = std::mem::replace(&mut batch, FrameBatch::with_capacity(batch_size));
            if tx.blocking_send(StageMessage::Batch(full)).is_err() {
                return Err(PipelineError::ChannelClosed("infer stage went away"));
            }
        }
    }

    if !batch.is_empty() && tx.blocking_send(StageMessage::Batch(batch)).is_err() {
        return Err(PipelineError::ChannelClosed("infer stage went away"));
    }
    if tx.blocking_send(StageMessage::End).is_err() {
        return Err(PipelineError::ChannelClosed("infer stage went away"));
    }

    debug!(frames_read, "decode stage done");
    Ok(frames_read)
}

fn infer_stage(
    mut rx: mpsc::Receiver<StageMessage>,
    tx: mpsc::Sender<StageMessage>,
    upscaler: Arc<dyn Upscaler>,
    hash_stride: usize,
) -> Result<(u64, u64), PipelineError> {
    let mut cache = DedupCache::new();
    let mut inferred = 0u64;
    let mut reused = 0u64;

    loop {
        match rx.blocking_recv() {
            Some(StageMessage::Batch(batch)) => {
                let frames = batch.into_frames();
                let hashes: Vec<FrameHash> = frames
                    .iter()
                    .map(|f| FrameHash::of(f, hash_stride))
                    .collect();
                let plan = cache.plan(&hashes);

                let outputs = if plan.unique.is_empty() {
                    Vec::new()
                } else {
                    let unique: Vec<Frame> =
                        plan.unique.iter().map(|&i| frames[i].clone()).collect();
                    let tensor = preprocess_batch(&unique)?;
                    let out = upscaler
                        .infer(tensor)
                        .map_err(|source| PipelineError::Inference { source })?;
                    postprocess_batch(out)?
                };

                inferred += plan.unique.len() as u64;
                reused += plan.duplicates(frames.len()) as u64;
                debug!(
                    batch = frames.len(),
                    unique = plan.unique.len(),
                    "inferred batch"
                );

                let merged = cache.merge(&plan, &hashes, outputs)?;
                if tx
                    .blocking_send(StageMessage::Batch(FrameBatch::from_frames(merged)))
                    .is_err()
                {
                    return Err(PipelineError::ChannelClosed("encode stage went away"));
                }
            }
            Some(StageMessage::End) => {
                if tx.blocking_send(StageMessage::End).is_err() {
                    return Err(PipelineError::ChannelClosed("encode stage went away"));
                }
                return Ok((inferred, reused));
            }
            None => return Err(PipelineError::ChannelClosed("decode stage went away")),
        }
    }
}

fn encode_stage(
    mut rx: mpsc::Receiver<StageMessage>,
    mut sink: Box<dyn FrameSink>,
) -> Result<u64, PipelineError> {
    let mut frames_written = 0u64;
    loop {
        match rx.blocking_recv() {
            Some(StageMessage::Batch(batch)) => {
                for frame in batch.frames() {
                    sink.write_frame(frame)?;
                    frames_written += 1;
                }
            }
            Some(StageMessage::End) => {
                sink.finish()?;
                debug!(frames_written, "encode stage done");
                return Ok(frames_written);
            }
            None => return Err(PipelineError::ChannelClosed("infer stage went away")),
        }
    }
}
