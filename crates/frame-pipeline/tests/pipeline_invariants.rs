//! End-to-end properties of the three-stage pipeline: frame count and order
//! preservation, dedup accounting, backpressure, and failure propagation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, mpsc};

use bytes::Bytes;
use frame_pipeline::{
    Frame, FramePipeline, FrameSink, FrameSource, FrameTensor, PipelineConfig, PipelineError,
    Upscaler,
};

/// 1x1 frame whose red channel encodes a sequence number.
fn tagged_frame(tag: u8) -> Frame {
    Frame::from_rgb24(1, 1, Bytes::from(vec![tag, 0, 0])).unwrap()
}

struct VecSource {
    frames: std::vec::IntoIter<Frame>,
    reads: Arc<AtomicU64>,
}

impl VecSource {
    fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into_iter(),
            reads: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl FrameSource for VecSource {
    fn read_frame(&mut self) -> Result<Option<Frame>, PipelineError> {
        let next = self.frames.next();
        if next.is_some() {
            self.reads.fetch_add(1, Ordering::SeqCst);
        }
        Ok(next)
    }
}

#[derive(Clone, Default)]
struct CollectSink {
    frames: Arc<Mutex<Vec<Frame>>>,
    finished: Arc<AtomicU64>,
}

impl FrameSink for CollectSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), PipelineError> {
        self.frames.lock().unwrap().push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), PipelineError> {
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Identity model: counts how many frames it was actually asked to infer.
struct CountingUpscaler {
    inferred: AtomicU64,
}

impl CountingUpscaler {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inferred: AtomicU64::new(0),
        })
    }
}

impl Upscaler for CountingUpscaler {
    fn scale_factor(&self) -> u32 {
        1
    }

    fn infer(
        &self,
        input: FrameTensor,
    ) -> Result<FrameTensor, Box<dyn std::error::Error + Send + Sync>> {
        self.inferred.fetch_add(input.n as u64, Ordering::SeqCst);
        Ok(input)
    }
}

fn config(batch_size: usize, queue_capacity: usize) -> PipelineConfig {
    PipelineConfig {
        batch_size,
        queue_capacity,
        // Stride 1: every pixel hashed, so distinct tags never collide.
        hash_stride_factor: 1,
    }
}

#[tokio::test]
async fn preserves_count_and_order_across_batch_and_queue_sizes() {
    // 10 is not divisible by 3 or 4, exercising the partial final batch.
    let tags: Vec<u8> = (0..10).collect();

    for (batch_size, queue_capacity) in [(1, 1), (3, 1), (4, 8), (10, 2), (16, 8)] {
        let frames: Vec<Frame> = tags.iter().map(|&t| tagged_frame(t)).collect();
        let sink = CollectSink::default();
        let stats = FramePipeline::new(config(batch_size, queue_capacity))
            .run(
                Box::new(VecSource::new(frames)),
                Box::new(sink.clone()),
                CountingUpscaler::new(),
            )
            .await
            .unwrap();

        assert_eq!(stats.frames_in, 10, "B={batch_size} Q={queue_capacity}");
        assert_eq!(stats.frames_out, 10, "B={batch_size} Q={queue_capacity}");
        let written = sink.frames.lock().unwrap();
        let out_tags: Vec<u8> = written.iter().map(|f| f.data()[0]).collect();
        assert_eq!(out_tags, tags, "B={batch_size} Q={queue_capacity}");
        assert_eq!(sink.finished.load(Ordering::SeqCst), 1);
    }
}

#[tokio::test]
async fn duplicate_frames_skip_inference_but_still_appear_in_output() {
    // A A B | B C C  (batch size 3): only A, B, C hit the model; the second B
    // is a cross-batch reuse of the carried cache slot.
    let frames = vec![
        tagged_frame(1),
        tagged_frame(1),
        tagged_frame(2),
        tagged_frame(2),
        tagged_frame(3),
        tagged_frame(3),
    ];
    let upscaler = CountingUpscaler::new();
    let sink = CollectSink::default();

    let stats = FramePipeline::new(config(3, 2))
        .run(
            Box::new(VecSource::new(frames)),
            Box::new(sink.clone()),
            upscaler.clone(),
        )
        .await
        .unwrap();

    assert_eq!(stats.inferred, 3);
    assert_eq!(stats.reused, 3);
    assert_eq!(upscaler.inferred.load(Ordering::SeqCst), 3);
    let out_tags: Vec<u8> = sink
        .frames
        .lock()
        .unwrap()
        .iter()
        .map(|f| f.data()[0])
        .collect();
    assert_eq!(out_tags, vec![1, 1, 2, 2, 3, 3]);
}

/// Sink that consumes one frame per permit, so the test controls consumer
/// progress from outside.
struct GatedSink {
    permits: mpsc::Receiver<()>,
    written: Arc<AtomicU64>,
}

impl FrameSink for GatedSink {
    fn write_frame(&mut self, _frame: &Frame) -> Result<(), PipelineError> {
        self.permits
            .recv()
            .map_err(|_| PipelineError::ChannelClosed("permit gate"))?;
        self.written.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), PipelineError> {
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stalled_consumer_backpressures_producer() {
    let total = 64u64;
    let source = VecSource::new((0..total as u8).map(tagged_frame).collect());
    let reads = source.reads.clone();
    let (permit_tx, permit_rx) = mpsc::channel();
    let written = Arc::new(AtomicU64::new(0));
    let sink = GatedSink {
        permits: permit_rx,
        written: written.clone(),
    };

    let pipeline = FramePipeline::new(config(1, 1));
    let handle = tokio::spawn(async move {
        pipeline
            .run(Box::new(source), Box::new(sink), CountingUpscaler::new())
            .await
    });

    // With B=1 and Q=1 a fully stalled sink leaves room for at most one batch
    // in each queue plus one in flight per stage.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let stalled_at = reads.load(Ordering::SeqCst);
    assert!(stalled_at < total, "producer ran ahead: {stalled_at}");
    assert!(stalled_at <= 6, "queues not bounding memory: {stalled_at}");

    // No progress while the consumer is stalled.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert_eq!(reads.load(Ordering::SeqCst), stalled_at);

    // Release the consumer; the producer drains the rest.
    for _ in 0..total {
        permit_tx.send(()).unwrap();
    }
    let stats = handle.await.unwrap().unwrap();
    assert_eq!(stats.frames_out, total);
    assert_eq!(written.load(Ordering::SeqCst), total);
}

struct FailingSource {
    remaining: u32,
}

impl FrameSource for FailingSource {
    fn read_frame(&mut self) -> Result<Option<Frame>, PipelineError> {
        if self.remaining == 0 {
            return Err(PipelineError::Io(std::io::Error::other(
                "unreadable source media",
            )));
        }
        self.remaining -= 1;
        Ok(Some(tagged_frame(self.remaining as u8)))
    }
}

#[tokio::test]
async fn source_failure_aborts_run_with_causal_error() {
    let err = FramePipeline::new(config(2, 2))
        .run(
            Box::new(FailingSource { remaining: 5 }),
            Box::new(CollectSink::default()),
            CountingUpscaler::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Io(_)), "got {err:?}");
}

struct FailingUpscaler;

impl Upscaler for FailingUpscaler {
    fn scale_factor(&self) -> u32 {
        2
    }

    fn infer(
        &self,
        _input: FrameTensor,
    ) -> Result<FrameTensor, Box<dyn std::error::Error + Send + Sync>> {
        Err("model session lost".into())
    }
}

#[tokio::test]
async fn inference_failure_aborts_run_with_causal_error() {
    let frames = (0..8).map(tagged_frame).collect();
    let err = FramePipeline::new(config(4, 2))
        .run(
            Box::new(VecSource::new(frames)),
            Box::new(CollectSink::default()),
            Arc::new(FailingUpscaler),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Inference { .. }), "got {err:?}");
}
