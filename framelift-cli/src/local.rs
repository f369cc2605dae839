//! Built-in collaborators for local runs: a filesystem artifact store, a
//! software nearest-neighbour upscaler standing in for the real model, and
//! no-op language/screening models. Production deployments replace each of
//! these behind the same traits.

use std::path::{Path, PathBuf};

use frame_pipeline::{FrameTensor, Upscaler};
use video_processor::collaborators::{
    BoxError, FrameClassifier, ImageLabel, SpeechSynthesizer, Storage, Transcriber, Transcript,
    Translator,
};

/// Artifact store rooted at a local directory; keys are relative paths.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait::async_trait]
impl Storage for LocalStorage {
    async fn get(&self, key: &str) -> Result<Vec<u8>, BoxError> {
        Ok(tokio::fs::read(self.root.join(key)).await?)
    }

    async fn put(&self, folder: &str, local_path: &Path) -> Result<(), BoxError> {
        let name = local_path
            .file_name()
            .ok_or("artifact path has no file name")?;
        let dir = self.root.join(folder);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::copy(local_path, dir.join(name)).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, BoxError> {
        Ok(tokio::fs::try_exists(self.root.join(key)).await?)
    }
}

/// Integer-factor nearest-neighbour upscale, done in software. Slow and
/// blocky next to a real model, but exercises the whole pipeline without
/// inference hardware.
pub struct NearestNeighbourUpscaler {
    factor: u32,
}

impl NearestNeighbourUpscaler {
    pub fn new(factor: u32) -> Self {
        Self {
            factor: factor.max(1),
        }
    }
}

impl Upscaler for NearestNeighbourUpscaler {
    fn scale_factor(&self) -> u32 {
        self.factor
    }

    fn infer(&self, input: FrameTensor) -> Result<FrameTensor, BoxError> {
        if input.data.len() != input.len() {
            return Err("tensor data length does not match its shape".into());
        }
        let f = self.factor as usize;
        let (n, h, w, c) = (input.n, input.height, input.width, input.channels);
        let (oh, ow) = (h * f, w * f);

        let mut data = vec![0.0f32; n * oh * ow * c];
        for i in 0..n {
            for oy in 0..oh {
                let sy = oy / f;
                for ox in 0..ow {
                    let sx = ox / f;
                    let src = ((i * h + sy) * w + sx) * c;
                    let dst = ((i * oh + oy) * ow + ox) * c;
                    data[dst..dst + c].copy_from_slice(&input.data[src..src + c]);
                }
            }
        }

        Ok(FrameTensor {
            data,
            n,
            height: oh,
            width: ow,
            channels: c,
        })
    }
}

/// Reports an empty English transcript, which also disables the translation
/// and dub steps downstream.
pub struct NullTranscriber;

#[async_trait::async_trait]
impl Transcriber for NullTranscriber {
    async fn transcribe(&self, _audio: &Path) -> Result<Transcript, BoxError> {
        Ok(Transcript {
            language: "en".to_string(),
            segments: Vec::new(),
        })
    }
}

pub struct IdentityTranslator;

#[async_trait::async_trait]
impl Translator for IdentityTranslator {
    async fn translate(&self, text: &str, _from: &str, _to: &str) -> Result<String, BoxError> {
        Ok(text.to_string())
    }
}

pub struct NullSynthesizer;

#[async_trait::async_trait]
impl SpeechSynthesizer for NullSynthesizer {
    async fn synthesize(&self, _: &str, _: &Path, _: &str) -> Result<Vec<u8>, BoxError> {
        Ok(Vec::new())
    }
}

/// Screens nothing out; every sampled frame is safe.
pub struct AllowAllClassifier;

impl FrameClassifier for AllowAllClassifier {
    fn classify(&self, _image: &[u8]) -> Result<ImageLabel, BoxError> {
        Ok(ImageLabel::Safe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_neighbour_doubles_each_pixel() {
        // One 2x1 frame: pixel A then pixel B.
        let input = FrameTensor {
            data: vec![0.1, 0.2, 0.3, 0.7, 0.8, 0.9],
            n: 1,
            height: 1,
            width: 2,
            channels: 3,
        };
        let out = NearestNeighbourUpscaler::new(2).infer(input).unwrap();

        assert_eq!((out.n, out.height, out.width, out.channels), (1, 2, 4, 3));
        // Row layout: A A B B, twice.
        let row: Vec<f32> = vec![0.1, 0.2, 0.3, 0.1, 0.2, 0.3, 0.7, 0.8, 0.9, 0.7, 0.8, 0.9];
        assert_eq!(out.data[..12], row[..]);
        assert_eq!(out.data[12..], row[..]);
    }

    #[test]
    fn factor_one_is_identity() {
        let input = FrameTensor {
            data: vec![0.5; 12],
            n: 2,
            height: 1,
            width: 2,
            channels: 3,
        };
        let out = NearestNeighbourUpscaler::new(1).infer(input.clone()).unwrap();
        assert_eq!(out, input);
    }

    #[tokio::test]
    async fn local_storage_round_trips() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalStorage::new(root.path().to_path_buf());

        let artifact = root.path().join("clip.mp4");
        std::fs::write(&artifact, b"media bytes").unwrap();
        store.put("uploads", &artifact).await.unwrap();

        assert!(store.exists("uploads/clip.mp4").await.unwrap());
        assert!(!store.exists("uploads/other.mp4").await.unwrap());
        assert_eq!(store.get("uploads/clip.mp4").await.unwrap(), b"media bytes");
    }
}
