mod cli;
mod local;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::Parser;
use frame_pipeline::PipelineConfig;
use job_queue::{JobId, JobQueue, JobStatus};
use tracing::error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use video_processor::collaborators::Storage;
use video_processor::nsfw::NsfwConfig;
use video_processor::{Collaborators, ProcessorConfig, VideoJobSpec, VideoProcessor};

use crate::cli::{Args, Commands, OutputFormat};
use crate::local::{
    AllowAllClassifier, IdentityTranslator, LocalStorage, NearestNeighbourUpscaler,
    NullSynthesizer, NullTranscriber,
};

const DEFAULT_LOG_FILTER: &str =
    "framelift=info,frame_pipeline=info,job_queue=info,media_tools=info,video_processor=info";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(args).await {
        error!("{e:#}");
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    match args.command {
        Commands::Process {
            files,
            workers,
            batch_size,
            queue_capacity,
            scale_factor,
            output_dir,
            nsfw_threshold,
            sample_interval,
            output,
        } => {
            let config = ProcessorConfig {
                pipeline: PipelineConfig {
                    batch_size,
                    queue_capacity,
                    ..PipelineConfig::default()
                },
                nsfw: NsfwConfig {
                    sample_interval_secs: sample_interval,
                    flagged_fraction_threshold: nsfw_threshold,
                },
            };
            process(files, workers, scale_factor, output_dir, config, output).await
        }
    }
}

async fn process(
    files: Vec<PathBuf>,
    workers: usize,
    scale_factor: u32,
    output_dir: PathBuf,
    config: ProcessorConfig,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let storage = Arc::new(LocalStorage::new(output_dir));
    let collaborators = Collaborators {
        storage: storage.clone(),
        transcriber: Arc::new(NullTranscriber),
        translator: Arc::new(IdentityTranslator),
        synthesizer: Arc::new(NullSynthesizer),
        classifier: Arc::new(AllowAllClassifier),
        upscaler: Arc::new(NearestNeighbourUpscaler::new(scale_factor)),
    };

    let queue = JobQueue::new(VideoProcessor::new(config, collaborators));
    let mut ids = Vec::with_capacity(files.len());
    for file in &files {
        let name = file
            .file_name()
            .with_context(|| format!("{} has no file name", file.display()))?
            .to_string_lossy()
            .into_owned();
        let stem = file
            .file_stem()
            .unwrap_or(file.as_os_str())
            .to_string_lossy()
            .into_owned();

        storage
            .put("uploads", file)
            .await
            .map_err(|e| anyhow!("uploading {}: {e}", file.display()))?;
        let id = queue.submit(VideoJobSpec {
            source_key: format!("uploads/{name}"),
            output_folder: format!("outputs/{stem}"),
        })?;
        ids.push(id);
    }

    queue.start(workers);
    queue.shutdown().await;

    report(&queue, &ids, output)
}

fn report(
    queue: &JobQueue<VideoProcessor>,
    ids: &[JobId],
    output: OutputFormat,
) -> anyhow::Result<()> {
    let mut failed = 0usize;
    let mut jobs = Vec::with_capacity(ids.len());
    for &id in ids {
        let job = queue.status(id)?;
        if job.status == JobStatus::Failed {
            failed += 1;
        }
        jobs.push(job);
    }

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&jobs)?),
        OutputFormat::Pretty => {
            for job in &jobs {
                let detail = job
                    .result
                    .as_deref()
                    .or(job.error.as_deref())
                    .unwrap_or("-");
                println!("{}  {:?}  {detail}", job.id, job.status);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} jobs failed", ids.len());
    }
    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
