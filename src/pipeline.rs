//! Per-pack orchestration.
//!
//! One run resolves the pack once, then drives every asset through fetch, classify, transcode,
//! metadata and delivery in pack order. Asset failures are recorded and the loop moves on; only
//! pack-level failures (resolution, configuration, duplicate request) end a run early.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{info, warn};

use crate::classify::classify;
use crate::config::PipelineConfig;
use crate::container::{MetadataBlock, inject};
use crate::dedup::RecentPacks;
use crate::delivery::{Delivery, DeliveryKind, DeliverySink};
use crate::encode::MediaEngine;
use crate::fetch::{AssetFetcher, RetryPolicy};
use crate::foundation::core::{AssetDescriptor, PackRequest, TranscodeJob};
use crate::foundation::error::{StickerError, StickerResult};
use crate::observe::{LifecycleEvent, PipelineObserver, TracingObserver};
use crate::provider::StickerSource;
use crate::provider::credentials::CredentialProvider;
use crate::resolve::{PackResolver, ResolvedPack};
use crate::scratch::ScratchDir;
use crate::transcode::{TranscodeOutput, TranscodeSettings, Transcoder};

static TRACING_OBSERVER: TracingObserver = TracingObserver;

/// Shared cancel switch, checked before every asset.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub enum AssetOutcome {
    Delivered { via: DeliveryKind, oversize: bool },
    Skipped(StickerError),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OutcomeSummary {
    pub total: usize,
    pub delivered: usize,
    pub document_fallback_count: usize,
    pub oversize_count: usize,
    /// Includes cancelled assets.
    pub skipped: usize,
    pub cancelled: usize,
}

impl OutcomeSummary {
    pub fn record(&mut self, outcome: &AssetOutcome) {
        self.total += 1;
        match outcome {
            AssetOutcome::Delivered { via, oversize } => {
                self.delivered += 1;
                if *via == DeliveryKind::Document {
                    self.document_fallback_count += 1;
                }
                if *oversize {
                    self.oversize_count += 1;
                }
            }
            AssetOutcome::Skipped(reason) => {
                self.skipped += 1;
                if matches!(reason, StickerError::Cancelled(_)) {
                    self.cancelled += 1;
                }
            }
        }
    }
}

impl fmt::Display for OutcomeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} stickers delivered", self.delivered, self.total)?;
        if self.document_fallback_count > 0 {
            write!(
                f,
                "\n{} sent as documents (vector animations could not be converted)",
                self.document_fallback_count
            )?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct PackReport {
    pub pack_id: String,
    pub title: Option<String>,
    /// `(0-based index, outcome)` in pack order.
    pub outcomes: Vec<(usize, AssetOutcome)>,
    pub summary: OutcomeSummary,
}

pub struct Orchestrator<'a> {
    source: &'a dyn StickerSource,
    engine: &'a dyn MediaEngine,
    observer: &'a dyn PipelineObserver,
    config: PipelineConfig,
    recent: RecentPacks,
    cancel: CancelFlag,
    scratch_parent: Option<PathBuf>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        source: &'a dyn StickerSource,
        engine: &'a dyn MediaEngine,
        config: PipelineConfig,
    ) -> StickerResult<Self> {
        config.validate()?;
        let recent = RecentPacks::new(
            Duration::from_secs(config.duplicate_window_secs),
            config.duplicate_capacity,
        );
        Ok(Self {
            source,
            engine,
            observer: &TRACING_OBSERVER,
            config,
            recent,
            cancel: CancelFlag::new(),
            scratch_parent: None,
        })
    }

    pub fn with_observer(mut self, observer: &'a dyn PipelineObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Create the per-run scratch directory under `parent` instead of the system temp dir.
    pub fn with_scratch_parent(mut self, parent: impl Into<PathBuf>) -> Self {
        self.scratch_parent = Some(parent.into());
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    #[tracing::instrument(skip_all, fields(pack = %request.pack_id))]
    pub fn run(
        &mut self,
        request: &PackRequest,
        credentials: &dyn CredentialProvider,
        sink: &mut dyn DeliverySink,
    ) -> StickerResult<PackReport> {
        if !self.recent.check_and_insert(&request.pack_id) {
            return Err(StickerError::Duplicate(request.pack_id.clone()));
        }
        let resolved = match self.resolve(request, credentials) {
            Ok(resolved) => resolved,
            Err(e) => {
                self.recent.forget(&request.pack_id);
                return Err(e);
            }
        };
        self.process_pack(&resolved, sink)
    }

    fn resolve(
        &self,
        request: &PackRequest,
        credentials: &dyn CredentialProvider,
    ) -> StickerResult<ResolvedPack> {
        let credentials = credentials.credentials()?;
        PackResolver::new(self.source).resolve(&request.pack_id, &credentials)
    }

    fn process_pack(
        &self,
        resolved: &ResolvedPack,
        sink: &mut dyn DeliverySink,
    ) -> StickerResult<PackReport> {
        let scratch = match &self.scratch_parent {
            Some(parent) => ScratchDir::new_in(parent)?,
            None => ScratchDir::new()?,
        };
        let total = resolved.assets.len();
        let pack_name = self.pack_name(resolved);
        let fetcher = AssetFetcher::new(self.source, RetryPolicy::from(&self.config.retry));
        let transcoder = Transcoder::new(
            self.engine,
            self.observer,
            TranscodeSettings::from(&self.config),
        );

        sink.begin(&resolved.pack_id, total)?;
        info!(total, %pack_name, "processing pack");

        let mut summary = OutcomeSummary::default();
        let mut outcomes = Vec::with_capacity(total);
        for descriptor in &resolved.assets {
            let number = descriptor.number();
            let outcome = if self.cancel.is_cancelled() {
                AssetOutcome::Skipped(StickerError::Cancelled(number))
            } else {
                let step = AssetStep {
                    resolved,
                    pack_name: &pack_name,
                    fetcher: &fetcher,
                    transcoder: &transcoder,
                    scratch: &scratch,
                };
                match self.process_asset(&step, descriptor, sink) {
                    Ok((via, oversize)) => AssetOutcome::Delivered { via, oversize },
                    Err(e) if e.is_asset_scoped() => AssetOutcome::Skipped(e),
                    Err(e) => {
                        warn!(asset = number, error = %e, "unexpected error kind, skipping asset");
                        AssetOutcome::Skipped(e)
                    }
                }
            };

            match &outcome {
                AssetOutcome::Delivered { via, oversize } => {
                    self.observer.on_event(&LifecycleEvent::Delivered {
                        asset: number,
                        via: *via,
                        oversize: *oversize,
                    });
                    if number < total {
                        std::thread::sleep(self.delivery_delay(*via));
                    }
                }
                AssetOutcome::Skipped(reason) => {
                    let reason = reason.to_string();
                    self.observer.on_event(&LifecycleEvent::Skipped {
                        asset: number,
                        reason: &reason,
                    });
                }
            }
            summary.record(&outcome);
            outcomes.push((descriptor.index, outcome));
        }

        sink.end()?;
        info!(
            delivered = summary.delivered,
            total = summary.total,
            documents = summary.document_fallback_count,
            oversize = summary.oversize_count,
            skipped = summary.skipped,
            "pack finished"
        );
        Ok(PackReport {
            pack_id: resolved.pack_id.clone(),
            title: resolved.title.clone(),
            outcomes,
            summary,
        })
    }

    fn process_asset(
        &self,
        step: &AssetStep<'_>,
        descriptor: &AssetDescriptor,
        sink: &mut dyn DeliverySink,
    ) -> StickerResult<(DeliveryKind, bool)> {
        let number = descriptor.number();
        self.observer
            .on_event(&LifecycleEvent::FetchStart { asset: number });
        let fetched = step.fetcher.fetch(descriptor, &step.resolved.credential)?;

        let kind = classify(descriptor, &fetched);
        self.observer
            .on_event(&LifecycleEvent::Classified { asset: number, kind });

        let asset_scratch = step.scratch.asset(descriptor.index);
        let job = TranscodeJob {
            asset: &fetched,
            kind,
            budget: self.config.budget_bytes,
            target: self.config.target(),
        };

        match step.transcoder.transcode(&job, &asset_scratch)? {
            TranscodeOutput::Container { bytes, .. } => {
                let meta = MetadataBlock::new(
                    step.pack_name,
                    &descriptor.emoji_hints,
                    &self.config.default_emoji,
                )
                .with_publisher(self.config.publisher.clone());
                let finished = inject(&bytes, &meta)?;
                let oversize = finished.len() as u64 > job.budget;
                if oversize {
                    warn!(
                        asset = number,
                        bytes = finished.len(),
                        budget = job.budget,
                        "final sticker exceeds the size budget"
                    );
                }
                sink.deliver(Delivery::Sticker {
                    index: descriptor.index,
                    bytes: &finished,
                })?;
                Ok((DeliveryKind::Container, oversize))
            }
            TranscodeOutput::Document { bytes, mime_type } => {
                let file_name = format!("{}_{number}.tgs", step.resolved.pack_id);
                sink.deliver(Delivery::Document {
                    index: descriptor.index,
                    bytes: &bytes,
                    mime_type,
                    file_name: &file_name,
                })?;
                Ok((DeliveryKind::Document, false))
            }
        }
    }

    /// Configured name, else the pack title, else the pack id.
    fn pack_name(&self, resolved: &ResolvedPack) -> String {
        [self.config.pack_name.as_deref(), resolved.title.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|n| !n.is_empty())
            .unwrap_or(resolved.pack_id.as_str())
            .to_string()
    }

    fn delivery_delay(&self, via: DeliveryKind) -> Duration {
        Duration::from_millis(match via {
            DeliveryKind::Container => self.config.container_delay_ms,
            DeliveryKind::Document => self.config.document_delay_ms,
        })
    }
}

/// Per-pack collaborators shared by every asset.
struct AssetStep<'s> {
    resolved: &'s ResolvedPack,
    pack_name: &'s str,
    fetcher: &'s AssetFetcher<'s>,
    transcoder: &'s Transcoder<'s>,
    scratch: &'s ScratchDir,
}
