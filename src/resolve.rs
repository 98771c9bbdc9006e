use tracing::{info, warn};

use crate::foundation::core::{AssetDescriptor, Credential};
use crate::foundation::error::{StickerError, StickerResult};
use crate::provider::{ProviderError, StickerSource};

/// Result of a successful pack lookup.
#[derive(Clone, Debug)]
pub struct ResolvedPack {
    pub pack_id: String,
    pub title: Option<String>,
    /// The credential that resolved the pack; used for every fetch of this run.
    pub credential: Credential,
    pub assets: Vec<AssetDescriptor>,
}

pub struct PackResolver<'a> {
    source: &'a dyn StickerSource,
}

impl<'a> PackResolver<'a> {
    pub fn new(source: &'a dyn StickerSource) -> Self {
        Self { source }
    }

    /// Try each credential in order. Only a rejected credential moves on to the next one; an
    /// empty or unknown pack and every other provider failure end resolution immediately.
    #[tracing::instrument(skip(self, credentials), fields(credentials = credentials.len()))]
    pub fn resolve(
        &self,
        pack_id: &str,
        credentials: &[Credential],
    ) -> StickerResult<ResolvedPack> {
        if credentials.is_empty() {
            return Err(StickerError::config("credential list is empty"));
        }

        for (slot, credential) in credentials.iter().enumerate() {
            match self.source.sticker_set(credential, pack_id) {
                Ok(pack) if !pack.stickers.is_empty() => {
                    info!(slot, stickers = pack.stickers.len(), "pack resolved");
                    return Ok(ResolvedPack {
                        pack_id: pack_id.to_string(),
                        assets: pack.descriptors(),
                        title: pack.title,
                        credential: credential.clone(),
                    });
                }
                Ok(_) => {
                    return Err(StickerError::pack_not_found(format!(
                        "'{pack_id}' is empty"
                    )));
                }
                Err(ProviderError::NotFound(reason)) => {
                    return Err(StickerError::pack_not_found(format!(
                        "'{pack_id}' does not exist: {reason}"
                    )));
                }
                Err(ProviderError::Unauthorized) => {
                    warn!(slot, "credential rejected, trying next");
                }
                Err(other) => {
                    return Err(StickerError::resolution(format!(
                        "pack '{pack_id}': {other}"
                    )));
                }
            }
        }

        Err(StickerError::PackResolutionAuth(pack_id.to_string()))
    }
}
