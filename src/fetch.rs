use std::time::Duration;

use tracing::{debug, warn};

use crate::classify::fetch_reference;
use crate::config::RetryConfig;
use crate::foundation::core::{AssetDescriptor, Credential, FetchResult};
use crate::foundation::error::{StickerError, StickerResult};
use crate::provider::{ProviderError, StickerSource};

const PNG_MAGIC: [u8; 4] = [0x89, b'P', b'N', b'G'];
const RIFF_MAGIC: [u8; 4] = *b"RIFF";

/// Bounded exponential backoff: `base * 2^(attempt-1)`, capped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            attempts: cfg.attempts.max(1),
            base: Duration::from_millis(cfg.base_delay_ms),
            cap: Duration::from_millis(cfg.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Wait before the retry that follows failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// Run `op` until it succeeds, fails non-transiently, or attempts run out.
    pub fn run<T>(
        &self,
        what: &str,
        mut op: impl FnMut() -> Result<T, ProviderError>,
    ) -> Result<T, ProviderError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op() {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() && attempt < self.attempts => {
                    let wait = self.delay_after(attempt);
                    warn!(
                        what,
                        attempt,
                        of = self.attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "retrying"
                    );
                    std::thread::sleep(wait);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Downloads one asset: location lookup, then byte download, each under [`RetryPolicy`].
pub struct AssetFetcher<'a> {
    source: &'a dyn StickerSource,
    retry: RetryPolicy,
}

impl<'a> AssetFetcher<'a> {
    pub fn new(source: &'a dyn StickerSource, retry: RetryPolicy) -> Self {
        Self { source, retry }
    }

    #[tracing::instrument(skip_all, fields(asset = descriptor.number()))]
    pub fn fetch(
        &self,
        descriptor: &AssetDescriptor,
        credential: &Credential,
    ) -> StickerResult<FetchResult> {
        let file_ref = fetch_reference(descriptor);
        if file_ref.is_empty() {
            return Err(StickerError::fetch(format!(
                "sticker {} has no file reference",
                descriptor.number()
            )));
        }

        let location = self
            .retry
            .run("file location", || {
                self.source.file_location(credential, file_ref)
            })
            .map_err(|e| {
                StickerError::fetch(format!(
                    "sticker {}: location lookup failed: {e}",
                    descriptor.number()
                ))
            })?;

        let bytes = self
            .retry
            .run("download", || self.source.download(credential, &location))
            .map_err(|e| {
                StickerError::fetch(format!(
                    "sticker {}: download failed: {e}",
                    descriptor.number()
                ))
            })?;

        let source_extension =
            extension_of(&location).unwrap_or_else(|| sniff_extension(&bytes).to_string());
        debug!(
            bytes = bytes.len(),
            ext = %source_extension,
            "asset downloaded"
        );

        Ok(FetchResult {
            descriptor: descriptor.clone(),
            bytes,
            source_extension,
            location,
        })
    }
}

/// Lowercased extension of the last path segment, if it has one.
pub fn extension_of(location: &str) -> Option<String> {
    let name = location.rsplit('/').next().unwrap_or(location);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Guess an extension from the first four payload bytes, defaulting to the container format.
pub fn sniff_extension(bytes: &[u8]) -> &'static str {
    match bytes.get(..4) {
        Some(head) if head == RIFF_MAGIC => "webp",
        Some(head) if head == PNG_MAGIC => "png",
        _ => "webp",
    }
}
