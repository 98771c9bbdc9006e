use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::foundation::core::{AnimationFlags, Credential};
use crate::foundation::error::{StickerError, StickerResult};
use crate::provider::{ProviderError, RemotePack, RemoteSticker, StickerSource};

const USER_AGENT: &str = concat!("stickerkit/", env!("CARGO_PKG_VERSION"));

/// Bot API client (`getStickerSet`, `getFile`, file download).
///
/// The token is part of the URL path, so URLs are never logged.
pub struct BotApiSource {
    client: Client,
    api_base: String,
}

impl BotApiSource {
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> StickerResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| StickerError::config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    fn method_url(&self, credential: &Credential, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, credential.expose())
    }

    fn call<T: DeserializeOwned>(
        &self,
        credential: &Credential,
        method: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let response = self
            .client
            .get(self.method_url(credential, method))
            .query(query)
            .send()
            .map_err(transport_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(transport_error)?;
        debug!(method, status, bytes = body.len(), "bot api response");
        decode_envelope(status, &body)
    }
}

impl StickerSource for BotApiSource {
    fn sticker_set(
        &self,
        credential: &Credential,
        pack_id: &str,
    ) -> Result<RemotePack, ProviderError> {
        let set: StickerSetBody = self.call(credential, "getStickerSet", &[("name", pack_id)])?;
        Ok(set.into_remote())
    }

    fn file_location(
        &self,
        credential: &Credential,
        file_ref: &str,
    ) -> Result<String, ProviderError> {
        let file: FileBody = self.call(credential, "getFile", &[("file_id", file_ref)])?;
        file.file_path
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ProviderError::Malformed("getFile result has no file_path".into()))
    }

    fn download(&self, credential: &Credential, location: &str) -> Result<Vec<u8>, ProviderError> {
        let url = format!(
            "{}/file/bot{}/{}",
            self.api_base,
            credential.expose(),
            location.trim_start_matches('/')
        );
        let response = self.client.get(url).send().map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::from_status(
                status.as_u16(),
                status.canonical_reason().unwrap_or("download failed"),
            ));
        }
        let bytes = response.bytes().map_err(transport_error)?;
        if bytes.is_empty() {
            return Err(ProviderError::Transient("empty download body".into()));
        }
        Ok(bytes.to_vec())
    }
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_decode() {
        ProviderError::Malformed(e.without_url().to_string())
    } else {
        ProviderError::Transient(e.without_url().to_string())
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<u16>,
}

fn decode_envelope<T: DeserializeOwned>(status: u16, body: &[u8]) -> Result<T, ProviderError> {
    let parsed: Result<Envelope<T>, _> = serde_json::from_slice(body);
    match parsed {
        Ok(env) if env.ok && (200..300).contains(&status) => env
            .result
            .ok_or_else(|| ProviderError::Malformed("response has no result".into())),
        Ok(env) => {
            let code = env.error_code.unwrap_or(status);
            let code = if code == 200 { status.max(400) } else { code };
            Err(ProviderError::from_status(
                code,
                env.description.unwrap_or_else(|| "request failed".into()),
            ))
        }
        Err(_) if !(200..300).contains(&status) => {
            Err(ProviderError::from_status(status, "non-JSON error body"))
        }
        Err(e) => Err(ProviderError::Malformed(e.to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct StickerSetBody {
    name: String,
    title: Option<String>,
    #[serde(default)]
    stickers: Vec<StickerBody>,
}

impl StickerSetBody {
    fn into_remote(self) -> RemotePack {
        RemotePack {
            name: self.name,
            title: self.title,
            stickers: self
                .stickers
                .into_iter()
                .map(StickerBody::into_remote)
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StickerBody {
    file_id: Option<String>,
    thumb: Option<FileBody>,
    thumbnail: Option<FileBody>,
    is_animated: Option<bool>,
    is_video: Option<bool>,
    animated: Option<bool>,
    emoji: Option<EmojiField>,
}

impl StickerBody {
    fn into_remote(self) -> RemoteSticker {
        let thumb_ref = self
            .thumb
            .or(self.thumbnail)
            .and_then(|t| t.file_id)
            .filter(|id| !id.is_empty());
        let emojis = match self.emoji {
            Some(EmojiField::One(e)) => vec![e],
            Some(EmojiField::Many(list)) => list,
            None => Vec::new(),
        };
        RemoteSticker {
            file_ref: self.file_id.unwrap_or_default(),
            thumb_ref,
            flags: AnimationFlags {
                is_animated: self.is_animated,
                is_video: self.is_video,
                animated: self.animated,
            },
            emojis,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EmojiField {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct FileBody {
    file_id: Option<String>,
    file_path: Option<String>,
}
