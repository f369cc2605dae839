//! Single-slot frame deduplication cache.
//!
//! Consecutive video frames are frequently identical (static scenes, credits,
//! low-motion anime). Hashing a spatially subsampled copy of each frame is
//! much cheaper than running super-resolution on it, so the infer stage keeps
//! the hash and inferred output of the *last unique frame only* and reuses
//! that output for every immediately-following frame with the same hash.
//!
//! This is deliberately not an LRU: one slot, valid only against the
//! preceding frame in decode order. The hash is not cryptographic in purpose;
//! a collision merely substitutes the output of a recent, nearly identical
//! frame and is accepted as a quality/performance tradeoff.

use md5::{Digest, Md5};

use crate::{Frame, PipelineError};

/// Perceptual hash of a subsampled frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHash([u8; 16]);

impl FrameHash {
    /// Hash every `stride`-th pixel of every `stride`-th row.
    ///
    /// The stride is chosen by the caller as `scale_factor * 10`, coarse
    /// enough that near-duplicate consecutive frames collapse to equal
    /// hashes.
    pub fn of(frame: &Frame, stride: usize) -> Self {
        let stride = stride.max(1);
        let width = frame.width() as usize;
        let height = frame.height() as usize;
        let data = frame.data();

        let mut hasher = Md5::new();
        for y in (0..height).step_by(stride) {
            let row = &data[y * width * Frame::CHANNELS..];
            for x in (0..width).step_by(stride) {
                let px = x * Frame::CHANNELS;
                hasher.update(&row[px..px + Frame::CHANNELS]);
            }
        }
        Self(hasher.finalize().into())
    }
}

/// Which frames of a batch need inference.
///
/// `unique` holds the batch indices (ascending) whose hash differed from the
/// running last-unique hash; every other index reuses the output of the
/// closest preceding unique frame (or the cache slot, when the batch opens
/// with duplicates of the previous batch's tail).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    pub unique: Vec<usize>,
}

impl BatchPlan {
    pub fn duplicates(&self, batch_len: usize) -> usize {
        batch_len - self.unique.len()
    }
}

/// The single cache slot: hash and inferred output of the last unique frame,
/// carried batch to batch within one pipeline run.
#[derive(Debug, Default)]
pub struct DedupCache {
    last_hash: Option<FrameHash>,
    last_output: Option<Frame>,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Partition a batch's hashes into unique and duplicate slots.
    ///
    /// The comparison hash is updated incrementally across the batch: in a
    /// batch hashing to `{A, A, B}`, only indices 0 and 2 are unique. With an
    /// empty cache (first batch of a run) the first frame is always unique.
    pub fn plan(&self, hashes: &[FrameHash]) -> BatchPlan {
        let mut last = self.last_hash;
        let mut unique = Vec::with_capacity(hashes.len());
        for (i, hash) in hashes.iter().enumerate() {
            if last != Some(*hash) {
                unique.push(i);
                last = Some(*hash);
            }
        }
        BatchPlan { unique }
    }

    /// Reassemble a full output batch from the inferred outputs of the unique
    /// frames, filling duplicate slots with the closest preceding unique
    /// output, and advance the cache slot to the batch's last unique frame.
    ///
    /// `outputs` must contain exactly one frame per `plan.unique` entry, in
    /// the same order.
    pub fn merge(
        &mut self,
        plan: &BatchPlan,
        hashes: &[FrameHash],
        outputs: Vec<Frame>,
    ) -> Result<Vec<Frame>, PipelineError> {
        if outputs.len() != plan.unique.len() {
            return Err(PipelineError::InvalidFrame {
                reason: format!(
                    "dedup merge got {} outputs for {} unique frames",
                    outputs.len(),
                    plan.unique.len()
                ),
            });
        }

        let mut merged = Vec::with_capacity(hashes.len());
        let mut outputs = outputs.into_iter();
        let mut unique = plan.unique.iter().copied().peekable();
        let mut current = self.last_output.take();
        let mut current_hash = self.last_hash;

        for (i, hash) in hashes.iter().enumerate() {
            if unique.peek() == Some(&i) {
                unique.next();
                // Checked above: one output per unique index.
                let frame = outputs.next().ok_or_else(|| PipelineError::InvalidFrame {
                    reason: "dedup merge ran out of inferred outputs".into(),
                })?;
                current = Some(frame.clone());
                current_hash = Some(*hash);
                merged.push(frame);
            } else {
                let frame = current.clone().ok_or_else(|| PipelineError::InvalidFrame {
                    reason: "duplicate slot with no preceding unique frame".into(),
                })?;
                merged.push(frame);
            }
        }

        self.last_hash = current_hash;
        self.last_output = current;
        Ok(merged)
    }
}
