//! Failure-path behavior of the orchestrator, driven through the worker
//! pool with in-process collaborator fakes. These paths stop before any
//! external tool is spawned.

use std::path::Path;
use std::sync::{Arc, Mutex};

use frame_pipeline::{FrameTensor, Upscaler};
use job_queue::{JobQueue, JobStatus};
use video_processor::collaborators::{
    BoxError, FrameClassifier, ImageLabel, SpeechSynthesizer, Storage, Transcriber, Transcript,
    Translator,
};
use video_processor::{Collaborators, ProcessorConfig, VideoJobSpec, VideoProcessor};

#[derive(Default)]
struct FakeStorage {
    keys: Vec<String>,
    fail_get: bool,
    puts: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl Storage for FakeStorage {
    async fn get(&self, key: &str) -> Result<Vec<u8>, BoxError> {
        if self.fail_get {
            return Err("object store unavailable".into());
        }
        Ok(format!("contents of {key}").into_bytes())
    }

    async fn put(&self, folder: &str, local_path: &Path) -> Result<(), BoxError> {
        self.puts
            .lock()
            .unwrap()
            .push(format!("{folder}/{}", local_path.display()));
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, BoxError> {
        Ok(self.keys.iter().any(|k| k == key))
    }
}

struct NullModels;

#[async_trait::async_trait]
impl Transcriber for NullModels {
    async fn transcribe(&self, _audio: &Path) -> Result<Transcript, BoxError> {
        Err("not expected in these tests".into())
    }
}

#[async_trait::async_trait]
impl Translator for NullModels {
    async fn translate(&self, text: &str, _from: &str, _to: &str) -> Result<String, BoxError> {
        Ok(text.to_string())
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for NullModels {
    async fn synthesize(&self, _: &str, _: &Path, _: &str) -> Result<Vec<u8>, BoxError> {
        Ok(Vec::new())
    }
}

impl FrameClassifier for NullModels {
    fn classify(&self, _image: &[u8]) -> Result<ImageLabel, BoxError> {
        Ok(ImageLabel::Safe)
    }
}

impl Upscaler for NullModels {
    fn scale_factor(&self) -> u32 {
        1
    }

    fn infer(&self, input: FrameTensor) -> Result<FrameTensor, BoxError> {
        Ok(input)
    }
}

fn processor(storage: Arc<FakeStorage>) -> VideoProcessor {
    let models = Arc::new(NullModels);
    VideoProcessor::new(
        ProcessorConfig::default(),
        Collaborators {
            storage,
            transcriber: models.clone(),
            translator: models.clone(),
            synthesizer: models.clone(),
            classifier: models.clone(),
            upscaler: models,
        },
    )
}

async fn run_to_terminal(storage: Arc<FakeStorage>) -> job_queue::Job {
    let queue = JobQueue::new(processor(storage));
    let id = queue
        .submit(VideoJobSpec {
            source_key: "uploads/clip.mp4".into(),
            output_folder: "outputs/clip".into(),
        })
        .unwrap();
    queue.start(1);
    queue.shutdown().await;
    queue.status(id).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_source_fails_and_publishes_nothing() {
    let storage = Arc::new(FakeStorage::default());
    let job = run_to_terminal(storage.clone()).await;

    assert_eq!(job.status, JobStatus::Failed);
    let error = job.error.unwrap();
    assert!(error.contains("not found"), "unexpected error: {error}");
    assert!(storage.puts.lock().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn storage_failure_is_attributed_and_publishes_nothing() {
    let storage = Arc::new(FakeStorage {
        keys: vec!["uploads/clip.mp4".into()],
        fail_get: true,
        puts: Mutex::new(Vec::new()),
    });
    let job = run_to_terminal(storage.clone()).await;

    assert_eq!(job.status, JobStatus::Failed);
    let error = job.error.unwrap();
    assert!(error.contains("storage"), "unexpected error: {error}");
    assert!(storage.puts.lock().unwrap().is_empty());
}
