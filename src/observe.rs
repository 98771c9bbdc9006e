//! Single lifecycle hook for the pipeline.

use tracing::{debug, info, warn};

use crate::delivery::DeliveryKind;
use crate::foundation::core::MediaKind;
use crate::transcode::Tier;

/// Points in an asset's traversal that observers get to see. `asset` is the 1-based number.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEvent<'a> {
    FetchStart { asset: usize },
    Classified { asset: usize, kind: MediaKind },
    TranscodeAttempt { asset: usize, tier: Tier },
    Delivered { asset: usize, via: DeliveryKind, oversize: bool },
    Skipped { asset: usize, reason: &'a str },
}

pub trait PipelineObserver {
    fn on_event(&self, event: &LifecycleEvent<'_>);
}

/// Default observer: structured `tracing` events.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_event(&self, event: &LifecycleEvent<'_>) {
        match *event {
            LifecycleEvent::FetchStart { asset } => debug!(asset, "fetch start"),
            LifecycleEvent::Classified { asset, kind } => debug!(asset, %kind, "classified"),
            LifecycleEvent::TranscodeAttempt { asset, tier } => {
                debug!(asset, %tier, "transcode attempt")
            }
            LifecycleEvent::Delivered {
                asset,
                via,
                oversize,
            } => info!(asset, ?via, oversize, "delivered"),
            LifecycleEvent::Skipped { asset, reason } => warn!(asset, reason, "skipped"),
        }
    }
}
