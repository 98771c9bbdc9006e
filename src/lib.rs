#![forbid(unsafe_code)]

pub mod classify;
pub mod config;
pub mod container;
pub mod dedup;
pub mod delivery;
pub mod encode;
pub mod fetch;
pub mod foundation;
pub mod observe;
pub mod pipeline;
pub mod provider;
pub mod resolve;
pub mod scratch;
pub mod transcode;

pub use config::{PipelineConfig, TOKENS_ENV};
pub use container::{MetadataBlock, WebpContainer, inject, read_metadata};
pub use delivery::{Delivery, DeliveryKind, DeliverySink, DirectorySink, InMemorySink};
pub use encode::ffmpeg::ExternalEngine;
pub use encode::{EncodeRequest, MediaEngine, Motion, VectorTarget};
pub use foundation::core::{
    AnimationFlags, AssetDescriptor, Credential, DeclaredKind, Dimensions, FetchResult, MediaKind,
    PackRequest, TranscodeJob,
};
pub use foundation::error::{StickerError, StickerResult};
pub use observe::{LifecycleEvent, PipelineObserver, TracingObserver};
pub use pipeline::{AssetOutcome, CancelFlag, Orchestrator, OutcomeSummary, PackReport};
pub use provider::credentials::{CredentialProvider, StaticCredentials};
pub use provider::http::BotApiSource;
pub use provider::{ProviderError, RemotePack, RemoteSticker, StickerSource};
pub use transcode::{Tier, TranscodeOutput, Transcoder};
