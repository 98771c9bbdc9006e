use std::fmt;

use crate::foundation::error::{StickerError, StickerResult};

/// Public link prefix the messaging client uses for shareable packs.
pub const PACK_LINK_PREFIX: &str = "https://t.me/addstickers/";

/// Default byte budget for a delivered sticker container (1 MiB).
pub const DEFAULT_BUDGET_BYTES: u64 = 1_048_576;

/// A single pack acquisition request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackRequest {
    pub pack_id: String,
}

impl PackRequest {
    /// Accepts either a bare pack name or a full share link.
    pub fn parse(input: &str) -> StickerResult<Self> {
        let trimmed = input.trim();
        let name = match trimmed.get(..PACK_LINK_PREFIX.len()) {
            Some(head) if head.eq_ignore_ascii_case(PACK_LINK_PREFIX) => {
                &trimmed[PACK_LINK_PREFIX.len()..]
            }
            _ if trimmed.contains("://") => {
                return Err(StickerError::config(format!(
                    "'{trimmed}' is not a sticker pack link (expected {PACK_LINK_PREFIX}<name>)"
                )));
            }
            _ => trimmed,
        };
        let name = name.trim_end_matches('/').trim();
        if name.is_empty() {
            return Err(StickerError::config("could not extract a pack name"));
        }
        Ok(Self {
            pack_id: name.to_string(),
        })
    }
}

/// Opaque API token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tail: String = self
            .0
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        write!(f, "Credential(…{tail})")
    }
}

/// What the provider claims the asset is. Only a hint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeclaredKind {
    Static,
    Animated,
    Unknown,
}

/// Animation flags as reported by the provider; any one of them marks the asset as moving.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AnimationFlags {
    pub is_animated: Option<bool>,
    pub is_video: Option<bool>,
    pub animated: Option<bool>,
}

impl AnimationFlags {
    pub fn any_set(self) -> bool {
        [self.is_animated, self.is_video, self.animated]
            .into_iter()
            .any(|f| f == Some(true))
    }

    pub fn declared_kind(self) -> DeclaredKind {
        if self.any_set() {
            DeclaredKind::Animated
        } else if self.is_animated.is_none() && self.is_video.is_none() && self.animated.is_none()
        {
            DeclaredKind::Unknown
        } else {
            DeclaredKind::Static
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetDescriptor {
    /// 0-based position inside the pack.
    pub index: usize,
    pub file_ref: String,
    pub thumb_ref: Option<String>,
    pub flags: AnimationFlags,
    pub declared_kind: DeclaredKind,
    /// Emojis in provider order.
    pub emoji_hints: Vec<String>,
}

impl AssetDescriptor {
    pub fn new(index: usize, file_ref: impl Into<String>) -> Self {
        Self {
            index,
            file_ref: file_ref.into(),
            thumb_ref: None,
            flags: AnimationFlags::default(),
            declared_kind: DeclaredKind::Unknown,
            emoji_hints: Vec::new(),
        }
    }

    pub fn with_flags(mut self, flags: AnimationFlags) -> Self {
        self.flags = flags;
        self.declared_kind = flags.declared_kind();
        self
    }

    pub fn with_thumb(mut self, thumb_ref: impl Into<String>) -> Self {
        self.thumb_ref = Some(thumb_ref.into());
        self
    }

    pub fn with_emojis<I, S>(mut self, emojis: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.emoji_hints = emojis.into_iter().map(Into::into).collect();
        self
    }

    /// 1-based number used in user-facing names and logs.
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// Raw downloaded asset.
#[derive(Clone, Debug)]
pub struct FetchResult {
    pub descriptor: AssetDescriptor,
    pub bytes: Vec<u8>,
    /// Lowercase extension without the dot, e.g. `webp`, `tgs`, `webm`.
    pub source_extension: String,
    /// Provider location the bytes came from.
    pub location: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MediaKind {
    StaticRaster,
    AnimatedRaster,
    VectorAnimation,
}

impl MediaKind {
    pub fn is_animated(self) -> bool {
        !matches!(self, Self::StaticRaster)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::StaticRaster => "static",
            Self::AnimatedRaster => "animated",
            Self::VectorAnimation => "vector",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const STICKER: Self = Self {
        width: 512,
        height: 512,
    };
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Mutable scratch state for converting one asset.
#[derive(Clone, Copy, Debug)]
pub struct TranscodeJob<'a> {
    pub asset: &'a FetchResult,
    pub kind: MediaKind,
    pub budget: u64,
    pub target: Dimensions,
}

impl<'a> TranscodeJob<'a> {
    pub fn new(asset: &'a FetchResult, kind: MediaKind) -> Self {
        Self {
            asset,
            kind,
            budget: DEFAULT_BUDGET_BYTES,
            target: Dimensions::STICKER,
        }
    }
}
