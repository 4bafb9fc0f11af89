use std::path::PathBuf;
use std::time::Duration;

use crate::config::{Config, InternetConfig, LocalStrategy};

pub struct PipelineConfig {
    pub media_root: PathBuf,
    pub language: String,
    pub local_strategy: LocalStrategy,
    pub internet: InternetConfig,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            media_root: config.media_root.clone(),
            language: config.segmentation.language.clone(),
            local_strategy: config.local_matching.strategy,
            internet: config.internet.clone(),
        }
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.internet.request_delay_ms)
    }
}
