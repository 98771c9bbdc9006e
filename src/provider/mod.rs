//! Remote sticker provider boundary.
//!
//! [`StickerSource`] is the narrow surface the resolver and fetcher need. [`http::BotApiSource`]
//! talks to the real Bot API; tests plug in scripted sources.

pub mod credentials;
pub mod http;

use crate::foundation::core::{AnimationFlags, AssetDescriptor, Credential};

/// Transport/provider failure, classified for retry and credential fallback decisions.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("credential rejected")]
    Unauthorized,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Map an HTTP status to the provider error taxonomy.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => Self::Unauthorized,
            400 | 404 => Self::NotFound(message),
            408 | 429 => Self::Transient(format!("HTTP {status}: {message}")),
            s if s >= 500 => Self::Transient(format!("HTTP {status}: {message}")),
            _ => Self::Status { status, message },
        }
    }
}

/// One sticker entry as the provider reports it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemoteSticker {
    pub file_ref: String,
    pub thumb_ref: Option<String>,
    pub flags: AnimationFlags,
    pub emojis: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemotePack {
    pub name: String,
    pub title: Option<String>,
    pub stickers: Vec<RemoteSticker>,
}

impl RemotePack {
    /// Descriptors in provider order.
    pub fn descriptors(&self) -> Vec<AssetDescriptor> {
        self.stickers
            .iter()
            .enumerate()
            .map(|(index, s)| {
                let mut d = AssetDescriptor::new(index, s.file_ref.clone())
                    .with_flags(s.flags)
                    .with_emojis(s.emojis.iter().cloned());
                d.thumb_ref = s.thumb_ref.clone();
                d
            })
            .collect()
    }
}

pub trait StickerSource {
    /// Look up a pack by name.
    fn sticker_set(&self, credential: &Credential, pack_id: &str)
    -> Result<RemotePack, ProviderError>;

    /// Resolve a file reference to a downloadable location (a provider-relative path).
    fn file_location(&self, credential: &Credential, file_ref: &str)
    -> Result<String, ProviderError>;

    /// Download the bytes behind a location returned by [`StickerSource::file_location`].
    fn download(&self, credential: &Credential, location: &str) -> Result<Vec<u8>, ProviderError>;
}
