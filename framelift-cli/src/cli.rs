use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "framelift",
    version,
    about = "Framelift - video upscaling and quality-ladder pipeline"
)]
pub struct Args {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log errors only.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Submit local video files as jobs and run the pool until every job
    /// settles.
    Process {
        /// Input video files.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Worker pool size.
        #[arg(long, default_value_t = 2)]
        workers: usize,

        /// Frames per inference batch.
        #[arg(long, default_value_t = 4)]
        batch_size: usize,

        /// Inter-stage queue capacity, in batches.
        #[arg(long, default_value_t = 8)]
        queue_capacity: usize,

        /// Upscale factor of the built-in software model.
        #[arg(long, default_value_t = 2)]
        scale_factor: u32,

        /// Root directory of the filesystem artifact store.
        #[arg(long, default_value = "framelift-store", env = "FRAMELIFT_STORE")]
        output_dir: PathBuf,

        /// Flag a video once flagged samples cover more than this fraction
        /// of its duration.
        #[arg(long, default_value_t = 0.10)]
        nsfw_threshold: f64,

        /// Seconds of playback per screened sample frame.
        #[arg(long, default_value_t = 1.0)]
        sample_interval: f64,

        /// Final per-job status report format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        output: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
}
