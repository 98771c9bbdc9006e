use crate::config::split_tokens;
use crate::foundation::core::Credential;
use crate::foundation::error::{StickerError, StickerResult};

/// Supplies API credentials in trial order. Performs no network access.
pub trait CredentialProvider {
    fn credentials(&self) -> StickerResult<Vec<Credential>>;
}

/// Fixed token list, typically built from `STICKERKIT_TOKENS` or `--token` flags.
#[derive(Clone, Debug, Default)]
pub struct StaticCredentials {
    tokens: Vec<Credential>,
}

impl StaticCredentials {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens
                .into_iter()
                .map(Into::into)
                .filter(|t: &String| !t.trim().is_empty())
                .map(Credential::new)
                .collect(),
        }
    }

    /// Parse a comma-separated list as found in the environment.
    pub fn from_list(raw: &str) -> Self {
        Self::new(split_tokens(raw))
    }
}

impl CredentialProvider for StaticCredentials {
    fn credentials(&self) -> StickerResult<Vec<Credential>> {
        if self.tokens.is_empty() {
            return Err(StickerError::config(
                "no API credentials configured (set STICKERKIT_TOKENS or pass --token)",
            ));
        }
        Ok(self.tokens.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_is_preserved() {
        let creds = StaticCredentials::from_list("primary, fallback")
            .credentials()
            .unwrap();
        assert_eq!(creds[0].expose(), "primary");
        assert_eq!(creds[1].expose(), "fallback");
    }

    #[test]
    fn empty_list_is_a_config_error() {
        let err = StaticCredentials::new(["", "  "]).credentials().unwrap_err();
        assert!(matches!(err, StickerError::Config(_)));
    }
}
