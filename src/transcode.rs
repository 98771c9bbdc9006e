//! Raw asset bytes -> size-bounded WebP.
//!
//! Raster input takes a single encoder pass. Vector animations walk an ordered tier list:
//! frame-sequence render, the quality ladder, one reduced frame-rate encode, the smallest
//! oversize artifact, a direct render, and finally the untouched bytes as a document.

use std::fmt;
use std::path::Path;

use tracing::{debug, warn};

use crate::classify::{VECTOR_EXTENSION, is_native_container};
use crate::config::PipelineConfig;
use crate::encode::lottie;
use crate::encode::{EncodeRequest, MediaEngine, Motion, VectorTarget};
use crate::foundation::core::{MediaKind, TranscodeJob};
use crate::foundation::error::{StickerError, StickerResult};
use crate::observe::{LifecycleEvent, PipelineObserver};
use crate::scratch::AssetScratch;

/// Mime type for vector stickers delivered as raw documents.
pub const VECTOR_MIME: &str = "application/x-tgsticker";

/// One step of the transcoding plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tier {
    Passthrough,
    Raster { quality: u8 },
    FrameSequence,
    Ladder { quality: u8 },
    ReducedFps { quality: u8, fps: u32 },
    Direct,
    Document,
}

impl Tier {
    fn stage(self) -> String {
        match self {
            Self::Passthrough => "passthrough".to_string(),
            Self::Raster { .. } => "raster".to_string(),
            Self::FrameSequence => "frames".to_string(),
            Self::Ladder { quality } => format!("q{quality}"),
            Self::ReducedFps { quality, fps } => format!("q{quality}_{fps}fps"),
            Self::Direct => "direct".to_string(),
            Self::Document => "document".to_string(),
        }
    }

    fn motion(self) -> Motion {
        match self {
            Self::ReducedFps { fps, .. } => Motion::Animated { fps: Some(fps) },
            _ => Motion::Animated { fps: None },
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raster { quality } => write!(f, "raster q{quality}"),
            Self::ReducedFps { quality, fps } => write!(f, "q{quality}@{fps}fps"),
            other => f.write_str(&other.stage()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TranscodeOutput {
    Container {
        bytes: Vec<u8>,
        tier: Tier,
        /// Larger than the budget; delivered anyway.
        oversize: bool,
    },
    Document {
        bytes: Vec<u8>,
        mime_type: &'static str,
    },
}

impl TranscodeOutput {
    pub fn oversize(&self) -> bool {
        matches!(self, Self::Container { oversize: true, .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscodeSettings {
    pub quality_ladder: Vec<u8>,
    pub reduced_fps: u32,
    pub animated_fps: u32,
    pub raster_quality: u8,
}

impl Default for TranscodeSettings {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for TranscodeSettings {
    fn from(cfg: &PipelineConfig) -> Self {
        Self {
            quality_ladder: cfg.quality_ladder.clone(),
            reduced_fps: cfg.reduced_fps,
            animated_fps: cfg.animated_fps,
            raster_quality: cfg.raster_quality,
        }
    }
}

impl TranscodeSettings {
    /// Ladder rungs in order, then the reduced frame-rate encode at the lowest rung.
    pub fn vector_plan(&self) -> Vec<Tier> {
        let floor = self.quality_ladder.last().copied().unwrap_or(20);
        self.quality_ladder
            .iter()
            .map(|&quality| Tier::Ladder { quality })
            .chain(std::iter::once(Tier::ReducedFps {
                quality: floor,
                fps: self.reduced_fps,
            }))
            .collect()
    }
}

struct Candidate {
    bytes: Vec<u8>,
    tier: Tier,
}

pub struct Transcoder<'a> {
    engine: &'a dyn MediaEngine,
    observer: &'a dyn PipelineObserver,
    settings: TranscodeSettings,
}

impl<'a> Transcoder<'a> {
    pub fn new(
        engine: &'a dyn MediaEngine,
        observer: &'a dyn PipelineObserver,
        settings: TranscodeSettings,
    ) -> Self {
        Self {
            engine,
            observer,
            settings,
        }
    }

    /// Scratch files are issued from `scratch` and removed when it is dropped.
    #[tracing::instrument(
        skip_all,
        fields(asset = job.asset.descriptor.number(), kind = %job.kind, bytes = job.asset.bytes.len())
    )]
    pub fn transcode(
        &self,
        job: &TranscodeJob<'_>,
        scratch: &AssetScratch<'_>,
    ) -> StickerResult<TranscodeOutput> {
        match job.kind {
            MediaKind::VectorAnimation => Ok(self.vector(job, scratch)),
            _ if is_native_container(job.asset) => {
                self.attempt(job, Tier::Passthrough);
                let bytes = job.asset.bytes.clone();
                let oversize = over_budget(job, &bytes);
                Ok(TranscodeOutput::Container {
                    bytes,
                    tier: Tier::Passthrough,
                    oversize,
                })
            }
            kind => self.raster(job, scratch, kind),
        }
    }

    fn raster(
        &self,
        job: &TranscodeJob<'_>,
        scratch: &AssetScratch<'_>,
        kind: MediaKind,
    ) -> StickerResult<TranscodeOutput> {
        let quality = self.settings.raster_quality;
        let tier = Tier::Raster { quality };
        let input = scratch.path("input", &job.asset.source_extension);
        std::fs::write(&input, &job.asset.bytes)
            .map_err(|e| StickerError::transcode(format!("stage raster input: {e}")))?;

        let output = scratch.path(&tier.stage(), "webp");
        let motion = if kind.is_animated() {
            Motion::Animated {
                fps: Some(self.settings.animated_fps),
            }
        } else {
            Motion::Still
        };
        self.attempt(job, tier);
        self.engine.encode(&EncodeRequest {
            input: &input,
            output: &output,
            target: job.target,
            quality,
            motion,
        })?;
        let bytes = read_output(&output)?;
        let oversize = over_budget(job, &bytes);
        Ok(TranscodeOutput::Container {
            bytes,
            tier,
            oversize,
        })
    }

    fn vector(&self, job: &TranscodeJob<'_>, scratch: &AssetScratch<'_>) -> TranscodeOutput {
        match lottie::probe(&job.asset.bytes) {
            Ok(info) => debug!(
                fps = info.frame_rate,
                width = info.width,
                height = info.height,
                frames = info.frame_count(),
                duration_secs = info.duration_secs(),
                "vector header"
            ),
            Err(e) => warn!(error = %e, "vector header unreadable, rendering anyway"),
        }

        let input = scratch.path("input", VECTOR_EXTENSION);
        if let Err(e) = std::fs::write(&input, &job.asset.bytes) {
            warn!(error = %e, "could not stage vector input");
            return self.document(job);
        }

        let mut best: Option<Candidate> = None;
        let frames = scratch.path(&Tier::FrameSequence.stage(), VectorTarget::FrameSequence.extension());
        self.attempt(job, Tier::FrameSequence);
        match self
            .engine
            .render_vector(&input, &frames, VectorTarget::FrameSequence)
        {
            Ok(()) => {
                for tier in self.settings.vector_plan() {
                    let Some(bytes) = self.encode_frames(job, scratch, &frames, tier) else {
                        continue;
                    };
                    if !over_budget(job, &bytes) {
                        return TranscodeOutput::Container {
                            bytes,
                            tier,
                            oversize: false,
                        };
                    }
                    debug!(%tier, bytes = bytes.len(), budget = job.budget, "over budget");
                    if best.as_ref().is_none_or(|b| bytes.len() < b.bytes.len()) {
                        best = Some(Candidate { bytes, tier });
                    }
                }
            }
            Err(e) => warn!(error = %e, "frame sequence render failed"),
        }

        if let Some(Candidate { bytes, tier }) = best {
            warn!(%tier, bytes = bytes.len(), budget = job.budget, "no tier fits, keeping smallest");
            return TranscodeOutput::Container {
                bytes,
                tier,
                oversize: true,
            };
        }

        let direct = scratch.path(&Tier::Direct.stage(), VectorTarget::Container.extension());
        self.attempt(job, Tier::Direct);
        match self
            .engine
            .render_vector(&input, &direct, VectorTarget::Container)
            .and_then(|()| read_output(&direct))
        {
            Ok(bytes) => {
                let oversize = over_budget(job, &bytes);
                return TranscodeOutput::Container {
                    bytes,
                    tier: Tier::Direct,
                    oversize,
                };
            }
            Err(e) => warn!(error = %e, "direct vector render failed"),
        }

        self.document(job)
    }

    fn encode_frames(
        &self,
        job: &TranscodeJob<'_>,
        scratch: &AssetScratch<'_>,
        frames: &Path,
        tier: Tier,
    ) -> Option<Vec<u8>> {
        let quality = match tier {
            Tier::Ladder { quality } | Tier::ReducedFps { quality, .. } => quality,
            _ => return None,
        };
        let output = scratch.path(&tier.stage(), "webp");
        self.attempt(job, tier);
        let encoded = self
            .engine
            .encode(&EncodeRequest {
                input: frames,
                output: &output,
                target: job.target,
                quality,
                motion: tier.motion(),
            })
            .and_then(|()| read_output(&output));
        match encoded {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(%tier, error = %e, "encode failed, trying next tier");
                None
            }
        }
    }

    fn document(&self, job: &TranscodeJob<'_>) -> TranscodeOutput {
        self.attempt(job, Tier::Document);
        warn!("vector sticker could not be converted, falling back to a document");
        TranscodeOutput::Document {
            bytes: job.asset.bytes.clone(),
            mime_type: VECTOR_MIME,
        }
    }

    fn attempt(&self, job: &TranscodeJob<'_>, tier: Tier) {
        self.observer.on_event(&LifecycleEvent::TranscodeAttempt {
            asset: job.asset.descriptor.number(),
            tier,
        });
    }
}

fn over_budget(job: &TranscodeJob<'_>, bytes: &[u8]) -> bool {
    bytes.len() as u64 > job.budget
}

fn read_output(path: &Path) -> StickerResult<Vec<u8>> {
    let bytes = std::fs::read(path)
        .map_err(|e| StickerError::transcode(format!("read '{}': {e}", path.display())))?;
    if bytes.is_empty() {
        return Err(StickerError::transcode(format!(
            "'{}' is empty",
            path.display()
        )));
    }
    Ok(bytes)
}
