pub type StickerResult<T> = Result<T, StickerError>;

#[derive(thiserror::Error, Debug)]
pub enum StickerError {
    #[error("pack not found: {0}")]
    PackNotFound(String),

    #[error("every credential was rejected while resolving pack '{0}'")]
    PackResolutionAuth(String),

    #[error("pack resolution error: {0}")]
    PackResolution(String),

    #[error("asset fetch failed: {0}")]
    AssetFetch(String),

    #[error("transcode error: {0}")]
    Transcode(String),

    #[error("container write error: {0}")]
    ContainerWrite(String),

    #[error("delivery error: {0}")]
    Delivery(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("pack '{0}' was already requested recently")]
    Duplicate(String),

    #[error("run cancelled before asset {0}")]
    Cancelled(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StickerError {
    pub fn pack_not_found(msg: impl Into<String>) -> Self {
        Self::PackNotFound(msg.into())
    }

    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::PackResolution(msg.into())
    }

    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::AssetFetch(msg.into())
    }

    pub fn transcode(msg: impl Into<String>) -> Self {
        Self::Transcode(msg.into())
    }

    pub fn container(msg: impl Into<String>) -> Self {
        Self::ContainerWrite(msg.into())
    }

    pub fn delivery(msg: impl Into<String>) -> Self {
        Self::Delivery(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Errors that only cost the current asset; the batch keeps going.
    pub fn is_asset_scoped(&self) -> bool {
        matches!(
            self,
            Self::AssetFetch(_)
                | Self::Transcode(_)
                | Self::ContainerWrite(_)
                | Self::Delivery(_)
                | Self::Cancelled(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            StickerError::fetch("x")
                .to_string()
                .contains("asset fetch failed:")
        );
        assert!(
            StickerError::transcode("x")
                .to_string()
                .contains("transcode error:")
        );
        assert!(
            StickerError::container("x")
                .to_string()
                .contains("container write error:")
        );
        assert!(
            StickerError::PackResolutionAuth("cats".into())
                .to_string()
                .contains("'cats'")
        );
    }

    #[test]
    fn asset_scope_split() {
        assert!(StickerError::transcode("x").is_asset_scoped());
        assert!(StickerError::delivery("x").is_asset_scoped());
        assert!(!StickerError::pack_not_found("x").is_asset_scoped());
        assert!(!StickerError::config("x").is_asset_scoped());
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = StickerError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
