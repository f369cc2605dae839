use frame_pipeline::PipelineConfig;

use crate::nsfw::NsfwConfig;

/// Knobs for every job run by one processor instance.
#[derive(Debug, Clone, Default)]
pub struct ProcessorConfig {
    pub pipeline: PipelineConfig,
    pub nsfw: NsfwConfig,
}
