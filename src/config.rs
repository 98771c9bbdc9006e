//! Runtime configuration.
//!
//! Everything except credentials can come from a JSON file; every field has a default so an
//! empty object (or no file at all) is a valid configuration. Credentials are supplied from the
//! environment or the command line and never live in this struct.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::foundation::core::{DEFAULT_BUDGET_BYTES, Dimensions};
use crate::foundation::error::{StickerError, StickerResult};

/// Environment variable holding comma-separated API tokens in priority order.
pub const TOKENS_ENV: &str = "STICKERKIT_TOKENS";

pub const DEFAULT_QUALITY_LADDER: [u8; 7] = [75, 60, 50, 40, 30, 25, 20];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub api_base: String,
    /// Overrides the pack title in sticker metadata.
    pub pack_name: Option<String>,
    pub publisher: Option<String>,
    pub default_emoji: String,
    pub budget_bytes: u64,
    pub target_size: u32,
    pub quality_ladder: Vec<u8>,
    pub reduced_fps: u32,
    pub animated_fps: u32,
    pub raster_quality: u8,
    pub ffmpeg_program: PathBuf,
    pub renderer_program: PathBuf,
    pub process_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub retry: RetryConfig,
    pub container_delay_ms: u64,
    pub document_delay_ms: u64,
    pub duplicate_window_secs: u64,
    pub duplicate_capacity: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 5_000,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.telegram.org".to_string(),
            pack_name: None,
            publisher: None,
            default_emoji: "🤖".to_string(),
            budget_bytes: DEFAULT_BUDGET_BYTES,
            target_size: 512,
            quality_ladder: DEFAULT_QUALITY_LADDER.to_vec(),
            reduced_fps: 10,
            animated_fps: 15,
            raster_quality: 75,
            ffmpeg_program: PathBuf::from("ffmpeg"),
            renderer_program: PathBuf::from("lottie_convert.py"),
            process_timeout_secs: 120,
            http_timeout_secs: 30,
            retry: RetryConfig::default(),
            container_delay_ms: 1_000,
            document_delay_ms: 700,
            duplicate_window_secs: 300,
            duplicate_capacity: 256,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> StickerResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_str(&text)
            .map_err(|e| StickerError::config(format!("{}: {e}", path.display())))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> StickerResult<()> {
        if self.budget_bytes == 0 {
            return Err(StickerError::config("budget_bytes must be non-zero"));
        }
        if self.target_size == 0 {
            return Err(StickerError::config("target_size must be non-zero"));
        }
        if self.quality_ladder.is_empty() {
            return Err(StickerError::config("quality_ladder must not be empty"));
        }
        if self.quality_ladder.windows(2).any(|w| w[0] <= w[1]) {
            return Err(StickerError::config(
                "quality_ladder must be strictly decreasing",
            ));
        }
        if self.quality_ladder.iter().any(|&q| q > 100) || self.raster_quality > 100 {
            return Err(StickerError::config("quality values must be within 0..=100"));
        }
        if self.reduced_fps == 0 || self.animated_fps == 0 {
            return Err(StickerError::config("frame rates must be non-zero"));
        }
        if self.retry.attempts == 0 {
            return Err(StickerError::config("retry.attempts must be at least 1"));
        }
        if self.default_emoji.trim().is_empty() {
            return Err(StickerError::config("default_emoji must not be blank"));
        }
        Ok(())
    }

    pub fn target(&self) -> Dimensions {
        Dimensions {
            width: self.target_size,
            height: self.target_size,
        }
    }

    pub fn process_timeout(&self) -> Duration {
        Duration::from_secs(self.process_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Split a comma-separated token list, dropping blanks, keeping order.
pub fn split_tokens(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
