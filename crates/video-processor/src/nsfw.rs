//! Content screening over sampled frames.
//!
//! One frame every `sample_interval_secs` is classified; each flagged sample
//! stands for one interval of playback, and the video is flagged when the
//! flagged duration exceeds `flagged_fraction_threshold` of the total. Both
//! knobs are heuristics carried over from the existing service, kept
//! configurable rather than baked in.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::ProcessError;
use crate::collaborators::{FrameClassifier, ImageLabel};

#[derive(Debug, Clone)]
pub struct NsfwConfig {
    /// Seconds of playback per sampled frame.
    pub sample_interval_secs: f64,
    /// Flag the video once flagged samples cover more than this fraction of
    /// its duration.
    pub flagged_fraction_threshold: f64,
}

impl Default for NsfwConfig {
    fn default() -> Self {
        Self {
            sample_interval_secs: 1.0,
            flagged_fraction_threshold: 0.10,
        }
    }
}

/// Screen `input`, using `workdir` for the sampled PNGs.
pub async fn screen(
    input: &Path,
    workdir: &Path,
    duration_secs: f64,
    classifier: Arc<dyn FrameClassifier>,
    config: &NsfwConfig,
) -> Result<bool, ProcessError> {
    let sample_dir = workdir.join("nsfw_samples");
    tokio::fs::create_dir_all(&sample_dir).await?;
    let frames =
        media_tools::sample_frames(input, &sample_dir, config.sample_interval_secs).await?;
    let sampled = frames.len();

    let mut images = Vec::with_capacity(sampled);
    for frame in &frames {
        images.push(tokio::fs::read(frame).await?);
    }

    let flagged = classify_samples(images, classifier).await?;

    let flagged_verdict = verdict(
        flagged,
        sampled,
        config.sample_interval_secs,
        duration_secs,
        config.flagged_fraction_threshold,
    );
    if flagged_verdict {
        warn!(flagged, sampled, duration_secs, "video flagged by screening");
    } else {
        info!(flagged, sampled, "screening passed");
    }
    Ok(flagged_verdict)
}

/// Count flagged samples. Classification is model inference; it runs off the
/// async scheduler, and any failure there, including a panicking model
/// binding, is attributed to the classifier collaborator.
async fn classify_samples(
    images: Vec<Vec<u8>>,
    classifier: Arc<dyn FrameClassifier>,
) -> Result<usize, ProcessError> {
    tokio::task::spawn_blocking(move || -> Result<usize, ProcessError> {
        let mut flagged = 0usize;
        for image in &images {
            let label = classifier
                .classify(image)
                .map_err(|source| ProcessError::Collaborator {
                    name: "classifier",
                    source,
                })?;
            if label == ImageLabel::Explicit {
                flagged += 1;
            }
        }
        Ok(flagged)
    })
    .await
    .map_err(|source| ProcessError::Collaborator {
        name: "classifier",
        source: Box::new(source),
    })?
}

/// Pure verdict rule. Each flagged sample counts as `interval_secs` of
/// flagged playback; for sources without a usable duration the sample count
/// itself is the denominator.
fn verdict(
    flagged: usize,
    sampled: usize,
    interval_secs: f64,
    duration_secs: f64,
    threshold: f64,
) -> bool {
    if sampled == 0 {
        return false;
    }
    let fraction = if duration_secs > 0.0 {
        flagged as f64 * interval_secs / duration_secs
    } else {
        flagged as f64 / sampled as f64
    };
    fraction > threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::BoxError;

    /// Flags any image whose first byte is 1.
    struct ByteClassifier;

    impl FrameClassifier for ByteClassifier {
        fn classify(&self, image: &[u8]) -> Result<ImageLabel, BoxError> {
            Ok(if image.first() == Some(&1) {
                ImageLabel::Explicit
            } else {
                ImageLabel::Safe
            })
        }
    }

    struct PanickyClassifier;

    impl FrameClassifier for PanickyClassifier {
        fn classify(&self, _image: &[u8]) -> Result<ImageLabel, BoxError> {
            panic!("model handle poisoned");
        }
    }

    #[tokio::test]
    async fn classify_samples_counts_flagged_frames() {
        let images = vec![vec![1], vec![0], vec![1], vec![0]];
        let flagged = classify_samples(images, Arc::new(ByteClassifier))
            .await
            .unwrap();
        assert_eq!(flagged, 2);
    }

    #[tokio::test]
    async fn classifier_panic_is_attributed_to_the_classifier() {
        let err = classify_samples(vec![vec![0u8; 4]], Arc::new(PanickyClassifier))
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                ProcessError::Collaborator {
                    name: "classifier",
                    ..
                }
            ),
            "got {err:?}"
        );
    }

    #[test]
    fn below_threshold_passes() {
        // 5 flagged seconds of 60 is under 10%.
        assert!(!verdict(5, 60, 1.0, 60.0, 0.10));
    }

    #[test]
    fn above_threshold_flags() {
        assert!(verdict(7, 60, 1.0, 60.0, 0.10));
    }

    #[test]
    fn threshold_is_exclusive() {
        assert!(!verdict(6, 60, 1.0, 60.0, 0.10));
    }

    #[test]
    fn no_samples_never_flags() {
        assert!(!verdict(0, 0, 1.0, 0.0, 0.10));
    }

    #[test]
    fn zero_duration_falls_back_to_sample_fraction() {
        assert!(verdict(2, 10, 1.0, 0.0, 0.10));
        assert!(!verdict(1, 10, 1.0, 0.0, 0.10));
    }

    #[test]
    fn interval_scales_flagged_duration() {
        // 3 flagged samples at 5s each cover 15 of 60 seconds.
        assert!(verdict(3, 12, 5.0, 60.0, 0.10));
    }
}
